use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::condition;
use crate::eval::interpreter::{ControlFlow, Interpreter, Outcome};
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

/// Dual condition mode shared by `if_` and `for_loop`: with the
/// `_complexCondition` flag the condition field is always a condition
/// tree; without it, an operation node executes and a scalar
/// template-resolves, both judged by truthiness. A plain record cannot be
/// an operation, so it evaluates as a condition tree either way.
async fn op_condition(op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<bool> {
    if op.get("_complexCondition").is_some_and(Value::truthy) {
        return condition::eval(op.get("condition").unwrap_or(&Value::Null), interp, ctx).await;
    }
    match op.get("condition") {
        Some(node @ Value::Map(_)) if node.is_op_node() => {
            Ok(interp.exec_value(node, ctx).await?.truthy())
        }
        Some(node @ Value::Map(_)) => condition::eval(node, interp, ctx).await,
        Some(node @ Value::List(_)) => Ok(interp.exec_value(node, ctx).await?.truthy()),
        Some(other) => Ok(template::resolve(other, ctx).truthy()),
        None => Ok(false),
    }
}

async fn tree_condition(op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<bool> {
    condition::eval(op.get("condition").unwrap_or(&Value::Null), interp, ctx).await
}

/// How one body pass ended, from the owning loop's point of view.
enum BodyExit {
    Normal,
    Break,
    Continue,
    Return(Value),
}

async fn run_body(op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<BodyExit> {
    let body = op.get("body").unwrap_or(&Value::Null);
    Ok(match interp.exec(body, ctx).await? {
        Outcome::Value(_) => BodyExit::Normal,
        Outcome::Control(ControlFlow::Break) => BodyExit::Break,
        Outcome::Control(ControlFlow::Continue) => BodyExit::Continue,
        Outcome::Control(ControlFlow::Return(value)) => BodyExit::Return(value),
    })
}

fn done() -> EvalResult<Outcome> {
    Ok(Value::Null.into())
}

fn returning(value: Value) -> EvalResult<Outcome> {
    Ok(Outcome::Control(ControlFlow::Return(value)))
}

pub(crate) struct If;

#[async_trait]
impl OpHandler for If {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let branch = if op_condition(op, interp, ctx).await? {
            op.get("then")
        } else {
            op.get("else")
        };
        match branch {
            Some(node) => match interp.exec(node, ctx).await? {
                // a signal from the branch travels on to its boundary
                Outcome::Control(flow) => Ok(Outcome::Control(flow)),
                Outcome::Value(_) => done(),
            },
            None => done(),
        }
    }
}

pub(crate) struct While;

#[async_trait]
impl OpHandler for While {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        loop {
            if !tree_condition(op, interp, ctx).await? {
                break;
            }
            match run_body(op, interp, ctx).await? {
                BodyExit::Break => break,
                BodyExit::Continue | BodyExit::Normal => {}
                BodyExit::Return(value) => return returning(value),
            }
        }
        done()
    }
}

pub(crate) struct DoWhile;

#[async_trait]
impl OpHandler for DoWhile {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        loop {
            match run_body(op, interp, ctx).await? {
                BodyExit::Break => break,
                BodyExit::Continue | BodyExit::Normal => {}
                BodyExit::Return(value) => return returning(value),
            }
            if !tree_condition(op, interp, ctx).await? {
                break;
            }
        }
        done()
    }
}

/// Post-test with inverted sense: run the body, stop once the condition
/// holds.
pub(crate) struct LoopUntil;

#[async_trait]
impl OpHandler for LoopUntil {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        loop {
            match run_body(op, interp, ctx).await? {
                BodyExit::Break => break,
                BodyExit::Continue | BodyExit::Normal => {}
                BodyExit::Return(value) => return returning(value),
            }
            if tree_condition(op, interp, ctx).await? {
                break;
            }
        }
        done()
    }
}

pub(crate) struct For;

#[async_trait]
impl OpHandler for For {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        if let Some(init) = op.get("init") {
            interp.exec_value(init, ctx).await?;
        }
        loop {
            if !op_condition(op, interp, ctx).await? {
                break;
            }
            let exit = run_body(op, interp, ctx).await?;
            match exit {
                BodyExit::Break => break,
                // the increment runs after a completed pass and after a
                // continue, but not after a break
                BodyExit::Normal | BodyExit::Continue => {
                    if let Some(increment) = op.get("increment") {
                        interp.exec_value(increment, ctx).await?;
                    }
                }
                BodyExit::Return(value) => return returning(value),
            }
        }
        done()
    }
}

pub(crate) struct Foreach;

impl Foreach {
    /// Runs the body once with item/index bound into a derived context.
    /// Returns the loop-level exit to take, if any.
    async fn iteration(
        op: &Map,
        interp: &Interpreter,
        ctx: &Context,
        item: Value,
        index: Value,
    ) -> EvalResult<Option<Outcome>> {
        let mut loop_ctx = ctx.child();
        if let Some(item_var) = op.get("itemVar").and_then(Value::as_str) {
            loop_ctx.set(item_var.to_string(), item);
        }
        if let Some(index_var) = op.get("indexVar").and_then(Value::as_str) {
            loop_ctx.set(index_var.to_string(), index);
        }
        Ok(match run_body(op, interp, &loop_ctx).await? {
            BodyExit::Normal | BodyExit::Continue => None,
            BodyExit::Break => Some(Value::Null.into()),
            BodyExit::Return(value) => Some(Outcome::Control(ControlFlow::Return(value))),
        })
    }
}

#[async_trait]
impl OpHandler for Foreach {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let collection = match op.get("collection") {
            Some(node) if node.is_op_node() => interp.exec_value(node, ctx).await?,
            Some(node) => node.clone(),
            None => Value::Null,
        };

        match collection {
            Value::Null => {
                debug!("foreach over missing collection, skipping");
            }
            // element collections iterate over a snapshot fixed at loop
            // start; later tree mutation does not change the iteration
            Value::Elements(els) => {
                for (i, el) in els.into_iter().enumerate() {
                    if let Some(outcome) =
                        Self::iteration(op, interp, ctx, Value::Element(el), (i as i64).into())
                            .await?
                    {
                        return Ok(outcome);
                    }
                }
            }
            Value::List(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    if let Some(outcome) =
                        Self::iteration(op, interp, ctx, item, (i as i64).into()).await?
                    {
                        return Ok(outcome);
                    }
                }
            }
            Value::Map(entries) => {
                for (key, value) in entries {
                    if let Some(outcome) =
                        Self::iteration(op, interp, ctx, value, key.into()).await?
                    {
                        return Ok(outcome);
                    }
                }
            }
            other => {
                warn!(
                    collection = other.type_name(),
                    "foreach over unsupported collection"
                );
            }
        }
        done()
    }
}

pub(crate) struct Break;

#[async_trait]
impl OpHandler for Break {
    async fn execute(&self, _op: &Map, _interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        Ok(Outcome::Control(ControlFlow::Break))
    }
}

pub(crate) struct Continue;

#[async_trait]
impl OpHandler for Continue {
    async fn execute(&self, _op: &Map, _interp: &Interpreter, _ctx: &Context) -> EvalResult<Outcome> {
        Ok(Outcome::Control(ControlFlow::Continue))
    }
}

pub(crate) struct Return;

#[async_trait]
impl OpHandler for Return {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let value = match op.get("value") {
            Some(node @ (Value::Map(_) | Value::List(_))) => interp.exec_value(node, ctx).await?,
            Some(other) => template::resolve(other, ctx),
            None => Value::Null,
        };
        returning(value)
    }
}
