//! Combinators built on the scheduler primitives
//!
//! Everything here is expressed through three primitives only: registering
//! an operation, waiting on a predicate over terminal states, and finishing
//! an operation. The futures are polled by the scheduler like any other
//! operation body, so every suspension inside them is a scheduling point.
//!
//! Most code reaches these through [`Context`](crate::Context):
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_controlled::{Fault, Runtime};
//!
//! let runtime = Runtime::default();
//! runtime
//!     .block_on(|ctx| async move {
//!         let inner = ctx.clone();
//!         let slow = ctx.run(async move {
//!             inner.delay(Duration::from_millis(10)).await;
//!             Ok::<_, Fault>(1)
//!         });
//!         let fast = ctx.from_result(2);
//!
//!         let all = ctx.when_all([slow.clone(), fast.clone()]).await?;
//!         assert_eq!(all, vec![1, 2]);
//!
//!         let winner = ctx.when_any([slow, fast]).await?;
//!         assert!(winner.is_completed());
//!         Ok::<_, Fault>(())
//!     })
//!     .unwrap();
//! ```

mod delay;
mod wait;
mod when_all;
mod when_any;
mod yield_now;

pub use delay::Delay;
pub use yield_now::YieldNow;

pub(crate) use when_all::when_all;
pub(crate) use when_any::when_any;
