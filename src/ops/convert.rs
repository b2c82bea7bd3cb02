use async_trait::async_trait;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::value::{Map, Value};

use super::OpHandler;

#[derive(Debug, Clone, Copy, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
enum TargetType {
    String,
    Number,
    Boolean,
    Json,
    Array,
}

/// `convert`: executes the inner op, then coerces its result. An unknown
/// or absent target type passes the value through; JSON parse failure
/// yields null, never an error.
pub(crate) struct Convert;

#[async_trait]
impl OpHandler for Convert {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let value = interp
            .exec_value(op.get("op").unwrap_or(&Value::Null), ctx)
            .await?;
        let target = op
            .get("targetType")
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<TargetType>().ok());

        let converted = match target {
            Some(TargetType::String) => Value::String(value.to_string()),
            Some(TargetType::Number) => Value::Number(value.to_number()),
            Some(TargetType::Boolean) => Value::Bool(value.truthy()),
            Some(TargetType::Json) => {
                match serde_json::from_str::<serde_json::Value>(&value.to_string()) {
                    Ok(parsed) => Value::from_json(&parsed),
                    Err(_) => Value::Null,
                }
            }
            Some(TargetType::Array) => match value {
                list @ Value::List(_) => list,
                other if other.truthy() => Value::List(vec![other]),
                _ => Value::List(Vec::new()),
            },
            None => value,
        };
        Ok(converted.into())
    }
}

/// `trim`: executes the inner op and trims a string result; non-strings
/// pass through.
pub(crate) struct Trim;

#[async_trait]
impl OpHandler for Trim {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let value = interp
            .exec_value(op.get("op").unwrap_or(&Value::Null), ctx)
            .await?;
        Ok(match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        }
        .into())
    }
}
