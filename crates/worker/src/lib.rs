//! Worker runtime for the numstab pipeline.
//!
//! Provides classified task spawning, a bounded cell pool with cooperative
//! cancellation, and supervised execution of external programs.

mod class;
mod join_set;
mod pool;
pub mod process;
mod spawn;

pub use class::TaskClass;
pub use join_set::WorkerJoinSet;
pub use pool::CellPool;
pub use process::{ProcessOutcome, ProcessOutput, ProcessSpec};
pub use spawn::{spawn, spawn_blocking};
pub use tokio_util::sync::CancellationToken;
