use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::template;
use crate::value::{Map, Value};

use super::{run_continuation, OpHandler};

/// `importModule`: loads a module by resolved URL and registers it under a
/// name. Both fields are required and an import failure is fatal, unlike
/// most ops.
pub(crate) struct ImportModule;

#[async_trait]
impl OpHandler for ImportModule {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(name) = op.get("name").and_then(Value::as_str) else {
            return Err(EvalError::MissingField {
                op: "importModule",
                field: "name",
            });
        };
        let Some(url) = op.get("url") else {
            return Err(EvalError::MissingField {
                op: "importModule",
                field: "url",
            });
        };
        let url = template::resolve(url, ctx).to_string();
        let module = interp.host().modules.import(&url).await?;
        interp.registries.modules.insert(name.to_string(), module);
        debug!(name, %url, "imported module");
        Ok(Value::Null.into())
    }
}

/// `callModuleFn`: invokes a named function on an imported module, or —
/// without a module name — on the ambient global scope (declared functions,
/// then host handlers). A missing target is fatal.
pub(crate) struct CallModuleFn;

#[async_trait]
impl OpHandler for CallModuleFn {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(function) = op.get("fn").and_then(Value::as_str) else {
            return Err(EvalError::MissingField {
                op: "callModuleFn",
                field: "fn",
            });
        };
        let args = interp.resolve_args(op.get("args"), ctx).await?;

        let result = match op.get("module").and_then(Value::as_str) {
            Some(module_name) => {
                let Some(module) = interp
                    .registries
                    .modules
                    .get(module_name)
                    .map(|m| m.clone())
                else {
                    return Err(EvalError::ModuleNotFound(module_name.to_string()));
                };
                if !module.exports(function) {
                    return Err(EvalError::FunctionNotFound {
                        module: module_name.to_string(),
                        function: function.to_string(),
                    });
                }
                module.call(function, args).await?
            }
            None => {
                if let Some(declared) =
                    interp.registries.functions.get(function).map(|f| f.clone())
                {
                    interp.invoke_declared(&declared, args, ctx).await?
                } else if let Some(handler) = interp.host().handlers.lookup(function) {
                    handler.call(args).await?
                } else {
                    return Err(EvalError::FunctionNotFound {
                        module: "global".to_string(),
                        function: function.to_string(),
                    });
                }
            }
        };

        // the call's value only reaches the tree through the continuation
        match run_continuation(interp, ctx, op.get("onResult"), "data", result).await? {
            Outcome::Control(flow) => Ok(Outcome::Control(flow)),
            Outcome::Value(_) => Ok(Value::Null.into()),
        }
    }
}
