use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::host::KeyValueStore;
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

fn store(interp: &Interpreter, durable: bool) -> &Arc<dyn KeyValueStore> {
    if durable {
        &interp.host().durable
    } else {
        &interp.host().session
    }
}

fn key(op: &Map) -> Option<&str> {
    let key = op.get("key").and_then(Value::as_str);
    if key.is_none() {
        warn!("storage operation without key");
    }
    key
}

pub(crate) struct Set {
    pub durable: bool,
}

#[async_trait]
impl OpHandler for Set {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        if let Some(key) = key(op) {
            let value = op
                .get("value")
                .map(|v| template::resolve(v, ctx).to_string())
                .unwrap_or_default();
            store(interp, self.durable).set(key, &value).await;
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct Get {
    pub durable: bool,
}

#[async_trait]
impl OpHandler for Get {
    async fn execute(&self, op: &Map, interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        let Some(key) = key(op) else {
            return Ok(Value::Null.into());
        };
        let value = store(interp, self.durable).get(key).await;
        Ok(value.map(Value::String).unwrap_or(Value::Null).into())
    }
}

pub(crate) struct Remove {
    pub durable: bool,
}

#[async_trait]
impl OpHandler for Remove {
    async fn execute(&self, op: &Map, interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        if let Some(key) = key(op) {
            store(interp, self.durable).remove(key).await;
        }
        Ok(Value::Null.into())
    }
}
