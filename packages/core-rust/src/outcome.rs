//! Success/failure union returned by every handler and behavior.

use crate::error::{ArgumentError, Error};

/// Returned when the value of a failed outcome is read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeError {
    #[error("a failed outcome carries no value")]
    NoValue,
}

/// Result of dispatching a request: a success optionally carrying a value, or
/// a failure carrying exactly one [`Error`].
///
/// Payload-less requests produce `Outcome<()>`. Expected business and
/// validation failures travel as `Failure`, never as a Rust `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T = ()> {
    Success(T),
    Failure(Error),
}

impl Outcome<()> {
    /// Payload-less success.
    pub const fn ok() -> Self {
        Self::Success(())
    }

    /// Folds a collection of outcomes into one.
    ///
    /// All successes yield [`Outcome::ok`]. Otherwise the result is a single
    /// failure with `summary` as its message, carrying, for every failed
    /// outcome in order, that error's own message/code followed by its details
    /// pushed one nesting level deeper.
    ///
    /// The input may be a lazy iterator; it is consumed exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::BlankMessage`] if `summary` is blank and
    /// [`ArgumentError::EmptySequence`] if `outcomes` yields nothing.
    pub fn sequence<T, I>(outcomes: I, summary: &str) -> Result<Self, ArgumentError>
    where
        I: IntoIterator<Item = Outcome<T>>,
    {
        if summary.trim().is_empty() {
            return Err(ArgumentError::BlankMessage);
        }

        let mut seen = 0usize;
        let mut details = Vec::new();
        for outcome in outcomes {
            seen += 1;
            if let Outcome::Failure(error) = outcome {
                details.push(error.summary());
                details.extend(error.details().iter().map(crate::ErrorDetail::nested));
            }
        }

        if seen == 0 {
            return Err(ArgumentError::EmptySequence);
        }
        if details.is_empty() {
            return Ok(Self::ok());
        }
        Ok(Self::Failure(
            Error::trusted(summary.to_string(), None).with_details(details),
        ))
    }
}

impl<T> Outcome<T> {
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    pub const fn failure(error: Error) -> Self {
        Self::Failure(error)
    }

    /// Builds a failure from a message and optional code.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::BlankMessage`] if `message` is blank.
    pub fn fail(message: impl Into<String>, code: Option<&str>) -> Result<Self, ArgumentError> {
        let error = Error::new(message)?;
        Ok(Self::Failure(match code {
            Some(code) => error.with_code(code),
            None => error,
        }))
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The failure's error, or `None` on success.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Borrows the success value.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::NoValue`] on failure.
    pub const fn value(&self) -> Result<&T, OutcomeError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(_) => Err(OutcomeError::NoValue),
        }
    }

    /// Takes the success value.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::NoValue`] on failure.
    pub fn into_value(self) -> Result<T, OutcomeError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(_) => Err(OutcomeError::NoValue),
        }
    }

    /// Converts into a plain `Result` for use with `?`.
    ///
    /// # Errors
    ///
    /// Returns the carried [`Error`] on failure.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Chains a follow-up operation. A failure short-circuits and keeps its
    /// original error.
    pub fn bind<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Success(value) => f(value),
            Self::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Turns a success into a failure carrying `error` when `predicate` rejects
    /// the value. Failures pass through untouched.
    pub fn ensure(self, predicate: impl FnOnce(&T) -> bool, error: Error) -> Self {
        match self {
            Self::Success(value) => {
                if predicate(&value) {
                    Self::Success(value)
                } else {
                    Self::Failure(error)
                }
            }
            failure @ Self::Failure(_) => failure,
        }
    }

    pub fn map_error(self, f: impl FnOnce(Error) -> Error) -> Self {
        match self {
            Self::Success(value) => Self::Success(value),
            Self::Failure(error) => Self::Failure(f(error)),
        }
    }

    /// Drops the success value, keeping only the success/failure state.
    pub fn discard(self) -> Outcome<()> {
        self.map(|_| ())
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Error> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
