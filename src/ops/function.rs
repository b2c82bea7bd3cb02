use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::registry::DeclaredFunction;
use crate::value::{Map, Value};

use super::OpHandler;

/// `declareFunction`: registers a callable from a parameter list and a
/// body. A record body is stored as-is; a textual body must parse as a
/// JSON operation tree. The name is required and an unusable body is
/// fatal. Declared functions shadow host handlers of the same name.
pub(crate) struct DeclareFunction;

#[async_trait]
impl OpHandler for DeclareFunction {
    async fn execute(&self, op: &Map, interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        let Some(name) = op.get("name").and_then(Value::as_str) else {
            return Err(EvalError::MissingField {
                op: "declareFunction",
                field: "name",
            });
        };
        let params: Vec<String> = match op.get("params") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
        let body = match op.get("body") {
            Some(Value::String(text)) => {
                let parsed: serde_json::Value = serde_json::from_str(text)
                    .map_err(|_| EvalError::UnsupportedFunctionBody(name.to_string()))?;
                Value::from_json(&parsed)
            }
            Some(body @ Value::Map(_)) => body.clone(),
            _ => return Err(EvalError::UnsupportedFunctionBody(name.to_string())),
        };
        debug!(name, params = ?params, "declared function");
        interp
            .registries
            .functions
            .insert(name.to_string(), DeclaredFunction { params, body });
        Ok(Value::Null.into())
    }
}
