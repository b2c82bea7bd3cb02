use std::sync::{Arc, Weak};

use async_recursion::async_recursion;
use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use crate::config::InterpreterConfig;
use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::host::Host;
use crate::ops::{self, OpHandler};
use crate::registry::{DeclaredFunction, Registries};
use crate::template;
use crate::value::{Map, Value};

use super::walker;

/// What executing one operation produced: a plain value, or a
/// control-transfer signal travelling to its interception point.
#[derive(Debug, Clone)]
pub enum Outcome {
    Value(Value),
    Control(ControlFlow),
}

/// Non-error, non-local exit. Break and continue are absorbed by the
/// nearest enclosing loop; return by the nearest function-call boundary.
/// Anywhere else they surface as [`EvalError::StrayControl`].
#[derive(Debug, Clone)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

impl ControlFlow {
    pub fn name(&self) -> &'static str {
        match self {
            ControlFlow::Break => "break",
            ControlFlow::Continue => "continue",
            ControlFlow::Return(_) => "return",
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl Outcome {
    /// Unwraps a value, faulting on a signal that has escaped past every
    /// boundary meant to absorb it.
    pub fn into_value(self) -> EvalResult<Value> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Control(flow) => Err(EvalError::StrayControl(flow.name())),
        }
    }
}

/// The operation-tree interpreter: one mutually-recursive asynchronous
/// evaluator dispatching over an open-ended catalogue of op kinds.
///
/// Construction yields an [`Arc`]; background callbacks (timers, channel
/// events) hold only a weak reference, so dropping the last strong handle
/// stops all future callback work.
pub struct Interpreter {
    host: Host,
    pub(crate) registries: Registries,
    pub(crate) config: InterpreterConfig,
    op_handlers: DashMap<String, Arc<dyn OpHandler>>,
    self_ref: Weak<Interpreter>,
}

impl Interpreter {
    pub fn new(host: Host) -> Arc<Self> {
        Self::with_config(host, InterpreterConfig::default())
    }

    pub fn with_config(host: Host, config: InterpreterConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            host,
            registries: Registries::default(),
            config,
            op_handlers: ops::builtin(),
            self_ref: self_ref.clone(),
        })
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// The interpreter's live-resource registries (channels, timers,
    /// modules, variables, declared functions). Custom op handlers reach
    /// shared state through here.
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Extends (or overrides) the op catalogue with a custom kind.
    pub fn register_op(&self, kind: impl Into<String>, handler: Arc<dyn OpHandler>) {
        self.op_handlers.insert(kind.into(), handler);
    }

    pub(crate) fn weak(&self) -> Weak<Interpreter> {
        self.self_ref.clone()
    }

    /// Submits an operation tree for execution. This is the wire entry
    /// point: hard faults and stray control signals surface as `Err`;
    /// callers must handle them — there is no catch-all.
    #[instrument(level = "debug", skip_all)]
    pub async fn execute(&self, op: &serde_json::Value, ctx: &Context) -> EvalResult<Value> {
        self.exec(&Value::from_json(op), ctx).await?.into_value()
    }

    /// Executes one already-converted operation node. Dispatch priority:
    /// batch, handler call, tagged op kind.
    #[async_recursion]
    pub async fn exec(&self, op: &Value, ctx: &Context) -> EvalResult<Outcome> {
        let Value::Map(map) = op else {
            warn!(?op, "ignoring non-record operation");
            return Ok(Value::Null.into());
        };
        if self.config.trace_ops {
            debug!(op = ?map, "executing operation");
        }

        if let Some(Value::List(sub_ops)) = map.get("_ops") {
            for sub in sub_ops {
                if let Outcome::Control(flow) = self.exec(sub, ctx).await? {
                    return Ok(Outcome::Control(flow));
                }
            }
            return Ok(Value::Null.into());
        }

        if map.get("_handler").is_some_and(Value::truthy) {
            return self.call_named(map, ctx).await;
        }

        let Some(kind) = map.get("_op").and_then(Value::as_str) else {
            warn!(op = ?map, "unknown operation record");
            return Ok(Value::Null.into());
        };
        let handler = self.op_handlers.get(kind).map(|h| h.clone());
        match handler {
            Some(handler) => handler.execute(map, self, ctx).await,
            None => {
                warn!(kind, "unknown operation kind");
                Ok(Value::Null.into())
            }
        }
    }

    /// [`Self::exec`], with escaping control signals turned into faults.
    /// For positions where an operation is evaluated for its value and no
    /// loop or function boundary is in sight.
    pub(crate) async fn exec_value(&self, op: &Value, ctx: &Context) -> EvalResult<Value> {
        self.exec(op, ctx).await?.into_value()
    }

    /// Three-way argument classification shared by handler calls, foreign
    /// calls and arithmetic: nested operations execute, composites are
    /// tree-walked, scalars template-resolve.
    pub(crate) async fn resolve_args(
        &self,
        args: Option<&Value>,
        ctx: &Context,
    ) -> EvalResult<Vec<Value>> {
        let Some(Value::List(args)) = args else {
            return Ok(Vec::new());
        };
        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            resolved.push(self.resolve_arg(arg, ctx).await?);
        }
        Ok(resolved)
    }

    async fn resolve_arg(&self, arg: &Value, ctx: &Context) -> EvalResult<Value> {
        if arg.is_op_node() {
            self.exec_value(arg, ctx).await
        } else if matches!(arg, Value::Map(_) | Value::List(_)) {
            walker::resolve(arg, self, ctx).await
        } else {
            Ok(template::resolve(arg, ctx))
        }
    }

    /// Handler dispatch: declared functions shadow host-global handlers.
    async fn call_named(&self, op: &Map, ctx: &Context) -> EvalResult<Outcome> {
        let Some(name) = op.get("fn").and_then(Value::as_str) else {
            warn!("handler call without fn");
            return Ok(Value::Null.into());
        };
        let args = self.resolve_args(op.get("args"), ctx).await?;

        if let Some(declared) = self.registries.functions.get(name).map(|f| f.clone()) {
            return Ok(self.invoke_declared(&declared, args, ctx).await?.into());
        }
        match self.host.handlers.lookup(name) {
            Some(handler) => Ok(Outcome::Value(handler.call(args).await?)),
            None => {
                warn!(name, "handler function not found");
                Ok(Value::Null.into())
            }
        }
    }

    /// Invokes a declared function: parameters bind into a derived context,
    /// the stored body re-enters the interpreter, and a return signal is
    /// absorbed here as the call's value.
    pub(crate) async fn invoke_declared(
        &self,
        function: &DeclaredFunction,
        args: Vec<Value>,
        ctx: &Context,
    ) -> EvalResult<Value> {
        let mut call_ctx = ctx.child();
        for (i, param) in function.params.iter().enumerate() {
            call_ctx.set(param.clone(), args.get(i).cloned().unwrap_or_default());
        }
        match self.exec(&function.body, &call_ctx).await? {
            Outcome::Value(value) => Ok(value),
            Outcome::Control(ControlFlow::Return(value)) => Ok(value),
            Outcome::Control(flow) => Err(EvalError::StrayControl(flow.name())),
        }
    }
}
