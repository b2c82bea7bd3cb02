use async_recursion::async_recursion;

use crate::context::Context;
use crate::error::EvalResult;
use crate::template;
use crate::value::{Map, Value};

use super::interpreter::Interpreter;

/// Recursively resolves an arbitrary tree: arrays element-wise, records
/// field by field into a new record (key order kept), strings through the
/// template resolver. A record carrying an operation discriminator is
/// handed whole to the interpreter and replaced by its result; its sibling
/// fields are the operation's to manage, not pre-walked.
#[async_recursion]
pub(crate) async fn resolve(node: &Value, interp: &Interpreter, ctx: &Context) -> EvalResult<Value> {
    match node {
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve(item, interp, ctx).await?);
            }
            Ok(Value::List(out))
        }
        Value::Map(_) if node.is_op_node() => interp.exec_value(node, ctx).await,
        Value::Map(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), resolve(value, interp, ctx).await?);
            }
            Ok(Value::Map(out))
        }
        Value::String(_) => Ok(template::resolve(node, ctx)),
        other => Ok(other.clone()),
    }
}
