//! A bounded, on-demand resource pool for expensive-to-create, reusable
//! values (database connection handles, parser instances, scratch arenas).
//!
//! Building a new resource every time one is needed is both inefficient and
//! can exhaust the underlying system under load. `corral` maintains a hard
//! ceiling of lazily constructed resources and hands them out to concurrent
//! callers, queuing acquisitions once the ceiling is reached.
//!
//! The pool is agnostic to the resource type it manages. Implementors of the
//! [`ManageResource`] trait provide the construction logic; capacity
//! accounting, fair reuse, discard, and the drain-then-run
//! [`barrier`](Pool::barrier) are handled here. Acquisition comes in three
//! presentations of the same algorithm: suspending ([`Pool::get`]), blocking
//! ([`Pool::get_blocking`]), and callback-style ([`Pool::get_callback`]).
//!
//! # Example
//!
//! Using an imaginary "foodb" database.
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() {
//!     let manager = FooHandleManager::new("localhost:1234");
//!     let pool = corral::Pool::builder().max_size(8).build(manager);
//!
//!     for _ in 0..20 {
//!         let pool = pool.clone();
//!         tokio::spawn(async move {
//!             let handle = pool.get().await.unwrap();
//!             // use the handle; dropping it returns it to the pool.
//!         });
//!     }
//! }
//! ```
#![deny(missing_docs, missing_debug_implementations)]

mod api;
pub use api::{Builder, ManageResource, Pool, PooledResource, ReleaseMode, State};

mod dispatch;
mod inner;
mod internals;
mod lock;
