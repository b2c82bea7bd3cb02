use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

/// `notify`: asks for permission if needed, then shows the notification.
/// Denied or unavailable notifications are a silent no-op.
pub(crate) struct Notify;

#[async_trait]
impl OpHandler for Notify {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        if !interp.host().notifier.request_permission().await {
            debug!("notification permission not granted");
            return Ok(Value::Null.into());
        }
        let title = op
            .get("title")
            .map(|t| template::resolve(t, ctx).to_string())
            .unwrap_or_else(|| "Notification".to_string());
        let body = op
            .get("body")
            .map(|b| template::resolve(b, ctx).to_string())
            .unwrap_or_default();
        interp.host().notifier.show(&title, &body).await;
        Ok(Value::Null.into())
    }
}
