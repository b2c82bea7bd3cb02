use thiserror::Error;

use crate::host::CapabilityError;

/// Faults that abort the operation they occur in and propagate through
/// enclosing batches, loops and handler calls. Most malformed input is
/// tolerated with a logged warning instead; only the cases below are fatal.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("`{op}` requires `{field}`")]
    MissingField {
        op: &'static str,
        field: &'static str,
    },
    #[error("unknown math function: {0}")]
    UnknownMathFunction(String),
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("function not found on module '{module}': {function}")]
    FunctionNotFound { module: String, function: String },
    #[error("unsupported function body for '{0}'")]
    UnsupportedFunctionBody(String),
    /// A break/continue/return signal escaped past every boundary that could
    /// have absorbed it. The input tree is malformed.
    #[error("stray `{0}` signal outside any enclosing loop or function")]
    StrayControl(&'static str),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),
}

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
