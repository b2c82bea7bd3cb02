use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

/// `setVar`: stores into the process-wide variable store, which outlives
/// any single context. Record values execute as operations; scalars
/// template-resolve.
pub(crate) struct SetVar;

#[async_trait]
impl OpHandler for SetVar {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(name) = op.get("name").and_then(Value::as_str) else {
            warn!("setVar without name");
            return Ok(Value::Null.into());
        };
        let value = match op.get("value") {
            Some(node @ (Value::Map(_) | Value::List(_))) => interp.exec_value(node, ctx).await?,
            Some(other) => template::resolve(other, ctx),
            None => Value::Null,
        };
        debug!(name, value = %value, "stored variable");
        interp.registries.vars.insert(name.to_string(), value);
        Ok(Value::Null.into())
    }
}

pub(crate) struct GetVar;

#[async_trait]
impl OpHandler for GetVar {
    async fn execute(&self, op: &Map, interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        let Some(name) = op.get("name").and_then(Value::as_str) else {
            warn!("getVar without name");
            return Ok(Value::Null.into());
        };
        let value = interp
            .registries
            .vars
            .get(name)
            .map(|v| v.clone())
            .unwrap_or(Value::Null);
        debug!(name, value = %value, "retrieved variable");
        Ok(value.into())
    }
}
