//! The operation catalogue. Each wire op kind maps to one [`OpHandler`];
//! the catalogue is open-ended — embedders can register further kinds via
//! [`Interpreter::register_op`](crate::Interpreter::register_op).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::value::{Map, Value};

pub mod channel;
pub mod clipboard;
pub mod console;
pub mod convert;
pub mod element;
pub mod flow;
pub mod function;
pub mod http;
pub mod math;
pub mod module;
pub mod notify;
pub mod storage;
pub mod timer;
pub mod vars;

/// One executable operation kind. Implementations receive the whole
/// operation record and may re-enter the interpreter for nested nodes.
#[async_trait]
pub trait OpHandler: Send + Sync {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context)
        -> EvalResult<Outcome>;
}

/// Merges a payload field into a continuation record and executes it.
/// Continuations that are not records are skipped with a warning.
pub(crate) async fn run_continuation(
    interp: &Interpreter,
    ctx: &Context,
    continuation: Option<&Value>,
    key: &str,
    payload: Value,
) -> EvalResult<Outcome> {
    match continuation {
        None => Ok(Value::Null.into()),
        Some(Value::Map(map)) => {
            let mut merged = map.clone();
            merged.insert(key.to_string(), payload);
            interp.exec(&Value::Map(merged), ctx).await
        }
        Some(other) => {
            warn!(continuation = ?other, "continuation is not a record");
            Ok(Value::Null.into())
        }
    }
}

pub(crate) fn builtin() -> DashMap<String, Arc<dyn OpHandler>> {
    let handlers = DashMap::new();
    let put = |kind: &str, handler: Arc<dyn OpHandler>| {
        handlers.insert(kind.to_string(), handler);
    };

    // element query/mutation
    put("query", Arc::new(element::Query));
    put("getValue", Arc::new(element::GetValue));
    put("setValue", Arc::new(element::SetValue));
    put("getText", Arc::new(element::GetText));
    put("setText", Arc::new(element::SetText));
    put("addClass", Arc::new(element::AddClass));
    put("removeClass", Arc::new(element::RemoveClass));
    put("show", Arc::new(element::Show));
    put("hide", Arc::new(element::Hide));
    put("setAttrs", Arc::new(element::SetAttrs));

    // timers
    put("setTimeout", Arc::new(timer::SetTimeout));
    put("setInterval", Arc::new(timer::SetInterval));
    put("clearInterval", Arc::new(timer::ClearInterval));
    put("requestAnimationFrame", Arc::new(timer::RequestFrame));
    put("cancelAnimationFrame", Arc::new(timer::CancelFrame));

    // duplex channels
    put("wsConnect", Arc::new(channel::Connect));
    put("wsSend", Arc::new(channel::Send));
    put("wsClose", Arc::new(channel::Close));

    // http
    put("fetch", Arc::new(http::Fetch));

    // key-value storage
    put("localSet", Arc::new(storage::Set { durable: true }));
    put("localGet", Arc::new(storage::Get { durable: true }));
    put("localRemove", Arc::new(storage::Remove { durable: true }));
    put("sessionSet", Arc::new(storage::Set { durable: false }));
    put("sessionGet", Arc::new(storage::Get { durable: false }));
    put("sessionRemove", Arc::new(storage::Remove { durable: false }));

    // named variables
    put("setVar", Arc::new(vars::SetVar));
    put("getVar", Arc::new(vars::GetVar));

    // clipboard & notifications
    put("copyText", Arc::new(clipboard::CopyText));
    put("readText", Arc::new(clipboard::ReadText));
    put("notify", Arc::new(notify::Notify));

    // modules & functions
    put("importModule", Arc::new(module::ImportModule));
    put("callModuleFn", Arc::new(module::CallModuleFn));
    put("declareFunction", Arc::new(function::DeclareFunction));

    // control flow
    put("if_", Arc::new(flow::If));
    put("while_loop", Arc::new(flow::While));
    put("do_while_loop", Arc::new(flow::DoWhile));
    put("loop_until", Arc::new(flow::LoopUntil));
    put("for_loop", Arc::new(flow::For));
    put("foreach_loop", Arc::new(flow::Foreach));
    put("break", Arc::new(flow::Break));
    put("continue", Arc::new(flow::Continue));
    put("return", Arc::new(flow::Return));

    // arithmetic, conversion, logging
    put("math", Arc::new(math::Math));
    put("convert", Arc::new(convert::Convert));
    put("trim", Arc::new(convert::Trim));
    put("console", Arc::new(console::Console));

    handlers
}
