//! Core types shared by every stage of a run: error kinds, sibling error
//! aggregation and the run-scoped deadline.

pub mod deadline;
pub mod error;

pub use deadline::Deadline;
pub use error::{ErrorContext, ErrorSet, MultiError, StackError, user_friendly_error};
