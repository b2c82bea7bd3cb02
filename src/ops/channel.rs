use std::sync::Weak;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::host::ChannelEvents;
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

/// Bridges channel events back into the interpreter: each declared
/// continuation op re-enters `exec` with the opening context; the message
/// and error continuations receive their payload merged into the op.
struct Callbacks {
    interp: Weak<Interpreter>,
    ctx: Context,
    open_op: Option<Value>,
    message_op: Option<Value>,
    close_op: Option<Value>,
    error_op: Option<Value>,
}

impl Callbacks {
    async fn run(&self, continuation: &Option<Value>, merge: Option<(&str, Value)>) {
        let Some(op) = continuation else {
            return;
        };
        let Some(interp) = self.interp.upgrade() else {
            return;
        };
        let op = match (op, merge) {
            (Value::Map(map), Some((key, payload))) => {
                let mut merged = map.clone();
                merged.insert(key.to_string(), payload);
                Value::Map(merged)
            }
            _ => op.clone(),
        };
        match interp.exec(&op, &self.ctx).await {
            Ok(Outcome::Control(flow)) => {
                debug!(signal = flow.name(), "control signal escaped channel continuation")
            }
            Err(error) => warn!(%error, "channel continuation failed"),
            Ok(_) => {}
        }
    }
}

#[async_trait]
impl ChannelEvents for Callbacks {
    async fn on_open(&self) {
        self.run(&self.open_op, None).await;
    }

    async fn on_message(&self, payload: &str) {
        self.run(&self.message_op, Some(("data", Value::String(payload.to_string()))))
            .await;
    }

    async fn on_close(&self) {
        self.run(&self.close_op, None).await;
    }

    async fn on_error(&self, error: &str) {
        self.run(&self.error_op, Some(("error", Value::String(error.to_string()))))
            .await;
    }
}

pub(crate) struct Connect;

#[async_trait]
impl OpHandler for Connect {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(id) = op.get("id").and_then(Value::as_str) else {
            return Err(EvalError::MissingField {
                op: "wsConnect",
                field: "id",
            });
        };
        let url = op
            .get("url")
            .map(|u| template::resolve(u, ctx).to_string())
            .unwrap_or_default();
        let events = std::sync::Arc::new(Callbacks {
            interp: interp.weak(),
            ctx: ctx.clone(),
            open_op: op.get("onOpen").cloned(),
            message_op: op.get("onMessage").cloned(),
            close_op: op.get("onClose").cloned(),
            error_op: op.get("onError").cloned(),
        });

        match interp.host().channels.connect(&url, events.clone()).await {
            Ok(channel) => {
                interp.registries.channels.insert(id.to_string(), channel);
            }
            Err(error) => {
                // connection failure stays local, routed like a wire error
                warn!(%error, %url, "channel connect failed");
                events.on_error(&error.to_string()).await;
            }
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct Send;

#[async_trait]
impl OpHandler for Send {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(id) = op.get("id").and_then(Value::as_str) else {
            return Ok(Value::Null.into());
        };
        let Some(channel) = interp.registries.channels.get(id).map(|c| c.clone()) else {
            return Ok(Value::Null.into());
        };
        let message = op
            .get("message")
            .map(|m| template::resolve(m, ctx).to_string())
            .unwrap_or_default();
        if let Err(error) = channel.send(&message).await {
            warn!(%error, id, "channel send failed");
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct Close;

#[async_trait]
impl OpHandler for Close {
    async fn execute(&self, op: &Map, interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        let Some(id) = op.get("id").and_then(Value::as_str) else {
            return Ok(Value::Null.into());
        };
        if let Some((_, channel)) = interp.registries.channels.remove(id) {
            channel.close().await;
        }
        Ok(Value::Null.into())
    }
}
