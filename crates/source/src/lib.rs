//! C source analysis for precision experiments.
//!
//! [`extract`] builds the variable catalog of a translation unit, [`mutate`]
//! rewrites selected declarations to another floating-point type, and
//! [`verify`] re-scans the result to prove the rewrite took effect. All three
//! work on a comment-masked view of the source, so commented-out code is never
//! reported or rewritten.

mod catalog;
mod decl;
mod mask;
mod mutate;

pub use catalog::{FunctionSpan, extract, find_functions};
pub use mask::strip_comments;
pub use mutate::{Verification, mutate, verify};
