//! opflow is an embeddable interpreter for JSON operation trees: a remote
//! caller (a server, an event handler, another script) sends a declarative
//! tree of operations instead of code, and the interpreter executes it
//! against a set of host-supplied capabilities.
//!
//! The entry point is [`Interpreter::execute`]. Capabilities are injected
//! through [`Host`]; in-memory reference implementations live in
//! [`host::memory`].

pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod host;
pub mod ops;
pub mod registry;
pub mod template;
pub mod value;

// Re-exports
pub use config::InterpreterConfig;
pub use context::Context;
pub use error::{Error, EvalError, EvalResult, InternalResult};
pub use eval::interpreter::{ControlFlow, Interpreter, Outcome};
pub use host::Host;
pub use ops::OpHandler;
pub use value::Value;
