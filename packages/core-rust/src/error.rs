//! Structured failure descriptions carried by a failed [`Outcome`](crate::Outcome).
//!
//! An [`Error`] has a message, an optional machine-readable code, and an
//! ordered list of [`ErrorDetail`] entries. Details do not nest structurally;
//! a detail whose message starts with [`NESTING_MARKER`] is rendered one level
//! deeper when the error is displayed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix marking a detail line as nested when an error is displayed.
pub const NESTING_MARKER: char = '>';

// ---------------------------------------------------------------------------
// ArgumentError
// ---------------------------------------------------------------------------

/// Invalid input to one of the outcome-model constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("message must not be empty or whitespace")]
    BlankMessage,
    #[error("cannot sequence an empty collection of outcomes")]
    EmptySequence,
}

fn require_message(message: String) -> Result<String, ArgumentError> {
    if message.trim().is_empty() {
        Err(ArgumentError::BlankMessage)
    } else {
        Ok(message)
    }
}

/// Prefixes `message` with the nesting marker. A message that is already
/// nested gets the marker without a separating space, so markers compound.
fn nest_message(message: &str) -> String {
    if message.starts_with(NESTING_MARKER) {
        format!("{NESTING_MARKER}{message}")
    } else {
        format!("{NESTING_MARKER} {message}")
    }
}

// ---------------------------------------------------------------------------
// ErrorDetail
// ---------------------------------------------------------------------------

/// One entry in an [`Error`]'s detail list.
///
/// Validation failures use `path` to point at the offending field
/// (e.g. `"User.Name"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DetailRepr")]
pub struct ErrorDetail {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl ErrorDetail {
    /// Creates a detail with the given message.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::BlankMessage`] if `message` is empty or whitespace.
    pub fn new(message: impl Into<String>) -> Result<Self, ArgumentError> {
        Ok(Self {
            message: require_message(message.into())?,
            code: None,
            path: None,
        })
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns a copy of this detail pushed one display level deeper.
    #[must_use]
    pub fn nested(&self) -> Self {
        Self {
            message: nest_message(&self.message),
            code: self.code.clone(),
            path: self.path.clone(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(code) = &self.code {
            write!(f, ", Code={code}")?;
        }
        if let Some(path) = &self.path {
            write!(f, ", Path={path}")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct DetailRepr {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

impl TryFrom<DetailRepr> for ErrorDetail {
    type Error = ArgumentError;

    fn try_from(repr: DetailRepr) -> Result<Self, Self::Error> {
        Ok(Self {
            message: require_message(repr.message)?,
            code: repr.code,
            path: repr.path,
        })
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Structured description of a business or validation failure.
///
/// Immutable once built: the `with_*` builders consume and return the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ErrorRepr")]
pub struct Error {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<ErrorDetail>,
}

impl Error {
    /// Creates an error with the given message, no code and no details.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::BlankMessage`] if `message` is empty or whitespace.
    pub fn new(message: impl Into<String>) -> Result<Self, ArgumentError> {
        Ok(Self::trusted(require_message(message.into())?, None))
    }

    /// Builds an error from a message already known to be non-blank.
    pub(crate) fn trusted(message: String, code: Option<String>) -> Self {
        debug_assert!(!message.trim().is_empty());
        Self {
            message,
            code,
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.details.push(detail);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl IntoIterator<Item = ErrorDetail>) -> Self {
        self.details.extend(details);
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn details(&self) -> &[ErrorDetail] {
        &self.details
    }

    /// The error's own message and code as a single detail, without its details.
    #[must_use]
    pub fn summary(&self) -> ErrorDetail {
        ErrorDetail {
            message: self.message.clone(),
            code: self.code.clone(),
            path: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(code) = &self.code {
            write!(f, ", Code={code}")?;
        }
        for detail in &self.details {
            if detail.message.starts_with(NESTING_MARKER) {
                write!(f, "\n{NESTING_MARKER}{detail}")?;
            } else {
                write!(f, "\n{NESTING_MARKER} {detail}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[derive(Deserialize)]
struct ErrorRepr {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

impl TryFrom<ErrorRepr> for Error {
    type Error = ArgumentError;

    fn try_from(repr: ErrorRepr) -> Result<Self, Self::Error> {
        Ok(Self {
            message: require_message(repr.message)?,
            code: repr.code,
            details: repr.details,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
