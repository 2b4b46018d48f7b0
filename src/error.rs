use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;

use sled::transaction::TransactionError;

/// A single rejected field and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field problem found in one input, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Malformed identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Must purchase and receive the product before reviewing")]
    NotEligible,
    #[error("This product has already been reviewed by this author")]
    DuplicateReview,
    #[error("Not permitted to modify this {0}")]
    Forbidden(&'static str),
    #[error("Storage failure: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl FieldErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }
    /// `Ok(())` when nothing was collected, otherwise a `Validation` error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
    /// Storage failure with no underlying error, e.g. a corrupt index entry.
    pub(crate) fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }
    pub(crate) fn storage_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors(vec![FieldError::new(field, message)]))
    }
}

impl From<sled::Error> for EngineError {
    fn from(value: sled::Error) -> Self {
        Self::storage_from("sled operation failed", value)
    }
}

impl From<minicbor::decode::Error> for EngineError {
    fn from(value: minicbor::decode::Error) -> Self {
        Self::storage_from("corrupt document", value)
    }
}

impl From<minicbor::encode::Error<Infallible>> for EngineError {
    fn from(value: minicbor::encode::Error<Infallible>) -> Self {
        Self::storage_from("failed to encode document", value)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        Self::storage_from("file operation failed", value)
    }
}

impl From<TransactionError<EngineError>> for EngineError {
    fn from(value: TransactionError<EngineError>) -> Self {
        match value {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => err.into(),
        }
    }
}
