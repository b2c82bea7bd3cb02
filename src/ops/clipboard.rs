use async_trait::async_trait;
use tracing::warn;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

// Clipboard failures (permission, unavailability) degrade silently.

pub(crate) struct CopyText;

#[async_trait]
impl OpHandler for CopyText {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let text = op
            .get("text")
            .map(|t| template::resolve(t, ctx).to_string())
            .unwrap_or_default();
        if let Err(error) = interp.host().clipboard.write_text(&text).await {
            warn!(%error, "clipboard write failed");
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct ReadText;

#[async_trait]
impl OpHandler for ReadText {
    async fn execute(&self, _op: &Map, interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        match interp.host().clipboard.read_text().await {
            Ok(text) => Ok(Value::String(text).into()),
            Err(error) => {
                warn!(%error, "clipboard read failed");
                Ok(Value::Null.into())
            }
        }
    }
}
