//! # testkit-controlled
//!
//! > Controlled task scheduling for systematic concurrency testing
//!
//! **testkit-controlled** runs async test code on a scheduler that owns every
//! interleaving decision. Operations never run in parallel: at each
//! scheduling point a pluggable [`DecisionSource`](decision::DecisionSource)
//! picks the single operation that runs next. The same decisions always
//! produce the same execution, so a flaky race becomes a seed (or a
//! recorded [`DecisionTrace`](decision::DecisionTrace)) you can replay.
//!
//! ## Quick Start
//!
//! ```rust
//! use testkit_controlled::prelude::*;
//!
//! let runtime = Runtime::new(Config::default().with_seed(42));
//! runtime
//!     .block_on(|ctx| async move {
//!         let t1 = ctx.spawn(async { 5 });
//!         let t2 = ctx.spawn(async { 3 });
//!
//!         let winner = ctx.when_any([t1.clone(), t2.clone()]).await?;
//!         let value = winner.result().unwrap();
//!         assert!((winner == t1 && value == 5) || (winner == t2 && value == 3));
//!         Ok::<_, Fault>(())
//!     })
//!     .unwrap();
//! ```
//!
//! ## Features
//!
//! - **Controlled operations** - `run`, `spawn`, `from_result`, `from_fault`
//! - **Combinators** - `when_any`, `when_all`, `delay`, `yield_now`
//! - **Pluggable decisions** - round robin, FIFO, LIFO, seeded random, replay
//! - **Virtual time** - delays that never sleep
//! - **Failure reporting** - captured faults, deadlock detection, step limits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Virtual time backing `delay`
pub mod clock;

pub mod combinator;
pub mod config;
pub mod decision;
pub mod error;
pub mod runtime;
pub mod task;

mod scheduler;

/// Prelude for convenient imports
///
/// ```rust
/// use testkit_controlled::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, DelayPolicy, UnfinishedPolicy};
    pub use crate::decision::{DecisionSource, DecisionTrace, SchedulingPolicy};
    pub use crate::error::{Error, Fault, Result};
    pub use crate::runtime::{Context, Runtime};
    pub use crate::task::{ControlledTask, OperationId, OperationInfo, OperationStatus};
}

// Re-exports
pub use config::{Config, DelayPolicy, UnfinishedPolicy};
pub use decision::{DecisionSource, DecisionTrace, SchedulingPolicy};
pub use error::{Error, Fault, Result};
pub use runtime::{Context, Runtime};
pub use task::{ControlledTask, OperationId, OperationStatus};
