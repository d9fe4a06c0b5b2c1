//! Orchestration of the precision/optimization instability pipeline.
//!
//! ```text
//! analyze -> configure -> variants -> compile -> validate -> localize -> aggregate
//! ```
//!
//! Each stage is a function in [`stages`] that consumes its predecessor's
//! manifest and produces its own. External programs (the instrumented
//! compiler, cell binaries, the delta-debug minimizer) are driven through
//! [`numstab_worker`] with per-invocation timeouts; their failures are recorded
//! per cell and never abort a stage.

pub mod aggregate;
pub mod compiler;
pub mod config;
pub mod ddebug;
mod error;
pub mod space;
pub mod stages;
pub mod store;
pub mod tools;
pub mod validator;

pub use config::{Backend, RunConfig, Thresholds};
pub use error::{PipelineError, Result};
pub use space::{SelectionMode, SpaceError};
pub use stages::{Layout, StageContext};
