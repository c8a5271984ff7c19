//! `Conduit` Core — outcome model, structured errors, and validation rules.
//!
//! Every handler and behavior in a `conduit` pipeline reports its result as an
//! [`Outcome`]: expected failures are data, not Rust errors.

pub mod error;
pub mod outcome;
pub mod validation;

pub use error::{ArgumentError, Error, ErrorDetail, NESTING_MARKER};
pub use outcome::{Outcome, OutcomeError};
pub use validation::{Rule, Validator, DEFAULT_VALIDATION_CODE, DEFAULT_VALIDATION_MESSAGE};
