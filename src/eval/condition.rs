use async_recursion::async_recursion;
use tracing::warn;

use crate::context::Context;
use crate::error::EvalResult;
use crate::template;
use crate::value::{Map, Value};

use super::interpreter::Interpreter;

/// Evaluates a condition tree: negation, logical group, or binary
/// comparison. An absent or falsy condition is false; a truthy non-record
/// degrades to its own truthiness.
#[async_recursion]
pub(crate) async fn eval(cond: &Value, interp: &Interpreter, ctx: &Context) -> EvalResult<bool> {
    if !cond.truthy() {
        return Ok(false);
    }
    let Value::Map(node) = cond else {
        warn!(condition = ?cond, "condition is not a record, using its truthiness");
        return Ok(true);
    };
    let operator = node.get("operator").and_then(Value::as_str);

    if operator == Some("!") {
        return eval_negation(node, interp, ctx).await;
    }

    if let (Some(Value::List(conditions)), Some(op)) = (node.get("conditions"), operator) {
        // every sub-condition runs: no short-circuit, side effects included
        let mut results = Vec::with_capacity(conditions.len());
        for sub in conditions {
            results.push(eval(sub, interp, ctx).await?);
        }
        return Ok(match op {
            "&&" => results.iter().all(|r| *r),
            "||" => results.iter().any(|r| *r),
            other => {
                warn!(operator = other, "unknown logical group operator");
                false
            }
        });
    }

    eval_binary(node, interp, ctx).await
}

async fn eval_negation(node: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<bool> {
    if let Some(value) = node.get("value") {
        if value.truthy() {
            let result = match value {
                Value::Map(_) => eval(value, interp, ctx).await?,
                other => template::resolve(other, ctx).truthy(),
            };
            return Ok(!result);
        }
    }
    if let Some(Value::List(conditions)) = node.get("conditions") {
        if conditions.len() == 1 {
            return Ok(!eval(&conditions[0], interp, ctx).await?);
        }
    }
    warn!("invalid negation condition");
    Ok(false)
}

async fn eval_binary(node: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<bool> {
    let left = operand(node.get("left"), interp, ctx).await?;
    let right = operand(node.get("right"), interp, ctx).await?;

    Ok(match node.get("operator").and_then(Value::as_str) {
        Some("==") => left.loose_eq(&right),
        Some("===") => left.strict_eq(&right),
        Some("!=") => !left.loose_eq(&right),
        Some("!==") => !left.strict_eq(&right),
        Some(">") => left.compare(&right).is_some_and(|o| o.is_gt()),
        Some(">=") => left.compare(&right).is_some_and(|o| o.is_ge()),
        Some("<") => left.compare(&right).is_some_and(|o| o.is_lt()),
        Some("<=") => left.compare(&right).is_some_and(|o| o.is_le()),
        other => {
            // degraded fallback: the condition record itself is truthy
            warn!(operator = ?other, "unknown binary operator in condition");
            true
        }
    })
}

/// Operands that are records execute as operations; everything else (and
/// any string result) goes through the template resolver.
async fn operand(field: Option<&Value>, interp: &Interpreter, ctx: &Context) -> EvalResult<Value> {
    let raw = match field {
        Some(node @ (Value::Map(_) | Value::List(_))) => interp.exec_value(node, ctx).await?,
        Some(other) => other.clone(),
        None => Value::Null,
    };
    Ok(template::resolve(&raw, ctx))
}
