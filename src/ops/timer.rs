use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::host::TimerTask;
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

fn period(op: &Map, field: &str) -> Duration {
    let ms = op.get(field).map(Value::to_number).unwrap_or(0.0);
    if ms.is_finite() && ms > 0.0 {
        Duration::from_millis(ms as u64)
    } else {
        Duration::ZERO
    }
}

fn timer_id(op: &Map, ctx: &Context) -> String {
    match op.get("id") {
        Some(id) => template::resolve(id, ctx).to_string(),
        None => Uuid::new_v4().to_string(),
    }
}

/// Packages the op's `callback` as a schedulable task. The task holds only
/// a weak interpreter reference: once the host tears the interpreter down,
/// pending fires degrade to no-ops.
fn callback_task(interp: &Interpreter, op: &Map, ctx: &Context) -> Option<TimerTask> {
    let callback = op.get("callback")?.clone();
    let weak = interp.weak();
    let ctx = ctx.clone();
    Some(Arc::new(move || {
        let weak = weak.clone();
        let callback = callback.clone();
        let ctx = ctx.clone();
        Box::pin(async move {
            let Some(interp) = weak.upgrade() else {
                return;
            };
            match interp.exec(&callback, &ctx).await {
                Ok(Outcome::Control(flow)) => {
                    debug!(signal = flow.name(), "control signal escaped timer callback")
                }
                Err(error) => warn!(%error, "timer callback failed"),
                Ok(_) => {}
            }
        })
    }))
}

pub(crate) struct SetTimeout;

#[async_trait]
impl OpHandler for SetTimeout {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        if let Some(task) = callback_task(interp, op, ctx) {
            interp.host().timers.delay(period(op, "ms"), task);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct SetInterval;

#[async_trait]
impl OpHandler for SetInterval {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(task) = callback_task(interp, op, ctx) else {
            return Ok(Value::Null.into());
        };
        let id = timer_id(op, ctx);
        let handle = interp.host().timers.repeat(period(op, "ms"), task);
        // live keys stay unique: a replaced repeating timer is cancelled
        if let Some(replaced) = interp.registries.timers.insert(id, handle) {
            interp.host().timers.cancel(replaced);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct ClearInterval;

#[async_trait]
impl OpHandler for ClearInterval {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        // absent id or unknown id: no-op, never an error
        if let Some(id) = op.get("id").map(|id| template::resolve(id, ctx).to_string()) {
            if let Some((_, handle)) = interp.registries.timers.remove(&id) {
                interp.host().timers.cancel(handle);
            }
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct RequestFrame;

#[async_trait]
impl OpHandler for RequestFrame {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(task) = callback_task(interp, op, ctx) else {
            return Ok(Value::Null.into());
        };
        let id = timer_id(op, ctx);

        // one-shot: the wrapped task deregisters its own handle
        let weak = interp.weak();
        let registry_id = id.clone();
        let wrapped: TimerTask = Arc::new(move || {
            let weak = weak.clone();
            let registry_id = registry_id.clone();
            let task = task.clone();
            Box::pin(async move {
                if let Some(interp) = weak.upgrade() {
                    interp.registries.frames.remove(&registry_id);
                }
                task().await;
            })
        });

        let handle = interp.host().timers.next_frame(wrapped);
        if let Some(replaced) = interp.registries.frames.insert(id, handle) {
            interp.host().timers.cancel_frame(replaced);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct CancelFrame;

#[async_trait]
impl OpHandler for CancelFrame {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        if let Some(id) = op.get("id").map(|id| template::resolve(id, ctx).to_string()) {
            if let Some((_, handle)) = interp.registries.frames.remove(&id) {
                interp.host().timers.cancel_frame(handle);
            }
        }
        Ok(Value::Null.into())
    }
}
