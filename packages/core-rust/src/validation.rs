//! Rule aggregation over an [`Outcome`].
//!
//! A [`Validator`] collects predicate rules, evaluates all of them, and folds
//! the failed ones into a single [`Error`] whose details are the failed rules
//! in registration order.
//!
//! ```
//! use conduit_core::{ErrorDetail, Validator};
//!
//! # fn main() -> Result<(), conduit_core::ArgumentError> {
//! let name = "";
//! let age = 12;
//! let outcome = Validator::check(|| !name.is_empty(), ErrorDetail::new("Name is required")?.with_path("User.Name"))
//!     .and_check(|| age >= 18, ErrorDetail::new("Must be an adult")?.with_code("AGE"))
//!     .validate(None, None);
//!
//! assert_eq!(outcome.error().map(|e| e.details().len()), Some(2));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, ErrorDetail};
use crate::outcome::Outcome;

/// Error message used when [`Validator::validate`] is given none.
pub const DEFAULT_VALIDATION_MESSAGE: &str = "One or more validation errors occurred.";
/// Error code used when [`Validator::validate`] is given none.
pub const DEFAULT_VALIDATION_CODE: &str = "VALIDATION_ERROR";

/// One predicate and the detail reported when it returns `false`.
pub struct Rule<'a, T> {
    predicate: Box<dyn FnOnce(&T) -> bool + 'a>,
    detail: ErrorDetail,
}

impl<'a, T> Rule<'a, T> {
    /// A rule evaluated against the starting outcome's success value.
    pub fn new(predicate: impl FnOnce(&T) -> bool + 'a, detail: ErrorDetail) -> Self {
        Self {
            predicate: Box::new(predicate),
            detail,
        }
    }

    /// A rule that ignores the subject.
    pub fn condition(predicate: impl FnOnce() -> bool + 'a, detail: ErrorDetail) -> Self {
        Self::new(move |_: &T| predicate(), detail)
    }

    #[must_use]
    pub const fn detail(&self) -> &ErrorDetail {
        &self.detail
    }
}

impl<T> std::fmt::Debug for Rule<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("detail", &self.detail).finish_non_exhaustive()
    }
}

/// Accumulates rules against a starting outcome.
///
/// If the starting outcome is already a failure, [`validate`](Self::validate)
/// returns it unchanged without evaluating any rule.
#[derive(Debug)]
#[must_use]
pub struct Validator<'a, T = ()> {
    start: Outcome<T>,
    rules: Vec<Rule<'a, T>>,
}

impl<'a> Validator<'a, ()> {
    /// Starts a validator over independent conditions with a success as the
    /// starting outcome.
    pub fn check(predicate: impl FnOnce() -> bool + 'a, detail: ErrorDetail) -> Self {
        Self::check_from(Outcome::ok(), predicate, detail)
    }
}

impl<'a, T> Validator<'a, T> {
    /// Starts a validator over independent conditions with `start` as the
    /// starting outcome.
    pub fn check_from(
        start: Outcome<T>,
        predicate: impl FnOnce() -> bool + 'a,
        detail: ErrorDetail,
    ) -> Self {
        Self::with_rule(start, Rule::condition(predicate, detail))
    }

    /// Starts a validator whose rules inspect `start`'s success value.
    pub fn for_outcome(
        start: Outcome<T>,
        predicate: impl FnOnce(&T) -> bool + 'a,
        detail: ErrorDetail,
    ) -> Self {
        Self::with_rule(start, Rule::new(predicate, detail))
    }

    pub fn with_rule(start: Outcome<T>, rule: Rule<'a, T>) -> Self {
        Self {
            start,
            rules: vec![rule],
        }
    }

    /// Appends a rule over the subject value.
    pub fn and(self, predicate: impl FnOnce(&T) -> bool + 'a, detail: ErrorDetail) -> Self {
        self.and_rule(Rule::new(predicate, detail))
    }

    /// Appends a rule that ignores the subject.
    pub fn and_check(self, predicate: impl FnOnce() -> bool + 'a, detail: ErrorDetail) -> Self {
        self.and_rule(Rule::condition(predicate, detail))
    }

    pub fn and_rule(mut self, rule: Rule<'a, T>) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluates every rule and folds the failures into one error.
    ///
    /// A blank or absent `message` falls back to
    /// [`DEFAULT_VALIDATION_MESSAGE`]; an absent `code` falls back to
    /// [`DEFAULT_VALIDATION_CODE`]. When no rule fails, the starting outcome is
    /// returned as-is.
    pub fn validate(self, message: Option<&str>, code: Option<&str>) -> Outcome<T> {
        let Self { start, rules } = self;

        let failed: Vec<ErrorDetail> = match &start {
            Outcome::Failure(_) => Vec::new(),
            Outcome::Success(subject) => rules
                .into_iter()
                .filter_map(|Rule { predicate, detail }| {
                    if predicate(subject) {
                        None
                    } else {
                        Some(detail)
                    }
                })
                .collect(),
        };

        if failed.is_empty() {
            return start;
        }

        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_VALIDATION_MESSAGE);
        let code = code.unwrap_or(DEFAULT_VALIDATION_CODE);
        Outcome::Failure(
            Error::trusted(message.to_string(), Some(code.to_string())).with_details(failed),
        )
    }
}

impl<T> Outcome<T> {
    /// Starts a [`Validator`] whose rules inspect this outcome's success value.
    pub fn validate_with<'a>(
        self,
        predicate: impl FnOnce(&T) -> bool + 'a,
        detail: ErrorDetail,
    ) -> Validator<'a, T> {
        Validator::for_outcome(self, predicate, detail)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
