use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

#[derive(Debug, Clone, Copy, Default, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    #[default]
    Log,
}

/// `console`: resolves the message (operation or template) and routes it
/// to the leveled tracing sink.
pub(crate) struct Console;

#[async_trait]
impl OpHandler for Console {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let message = match op.get("message") {
            Some(node @ (Value::Map(_) | Value::List(_))) => interp.exec_value(node, ctx).await?,
            Some(other) => template::resolve(other, ctx),
            None => Value::Null,
        };
        let level = op
            .get("level")
            .and_then(Value::as_str)
            .and_then(|l| l.parse::<LogLevel>().ok())
            .unwrap_or_default();
        let text = message.to_string();
        match level {
            LogLevel::Error => error!(target: "opflow::script", "{text}"),
            LogLevel::Warn => warn!(target: "opflow::script", "{text}"),
            LogLevel::Info | LogLevel::Log => info!(target: "opflow::script", "{text}"),
            LogLevel::Debug => debug!(target: "opflow::script", "{text}"),
        }
        Ok(Value::Null.into())
    }
}
