use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::error::EvalResult;
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::host::ElementRef;
use crate::template;
use crate::value::{Map, Value};

use super::OpHandler;

/// Resolves the op's selector (single pattern or union of patterns) and
/// queries the host element tree. No selector means no elements.
fn select(op: &Map, interp: &Interpreter, ctx: &Context) -> Vec<ElementRef> {
    match op.get("selector") {
        Some(Value::String(pattern)) => interp
            .host()
            .elements
            .query(&template::resolve_str(pattern, ctx)),
        Some(Value::List(patterns)) => patterns
            .iter()
            .filter_map(Value::as_str)
            .flat_map(|p| interp.host().elements.query(&template::resolve_str(p, ctx)))
            .collect(),
        _ => Vec::new(),
    }
}

fn resolved_field(op: &Map, field: &str, ctx: &Context) -> String {
    op.get(field)
        .map(|v| template::resolve(v, ctx).to_string())
        .unwrap_or_default()
}

pub(crate) struct Query;

#[async_trait]
impl OpHandler for Query {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let found = select(op, interp, ctx).into_iter().next();
        Ok(found.map(Value::Element).unwrap_or(Value::Null).into())
    }
}

pub(crate) struct GetValue;

#[async_trait]
impl OpHandler for GetValue {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        match select(op, interp, ctx).first() {
            Some(el) => Ok(Value::String(el.value()).into()),
            None => {
                debug!("getValue matched no element");
                Ok(Value::Null.into())
            }
        }
    }
}

pub(crate) struct SetValue;

#[async_trait]
impl OpHandler for SetValue {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let value = resolved_field(op, "value", ctx);
        for el in select(op, interp, ctx) {
            el.set_value(&value);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct GetText;

#[async_trait]
impl OpHandler for GetText {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        match select(op, interp, ctx).first() {
            Some(el) => Ok(Value::String(el.text()).into()),
            None => {
                debug!("getText matched no element");
                Ok(Value::Null.into())
            }
        }
    }
}

pub(crate) struct SetText;

#[async_trait]
impl OpHandler for SetText {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let text = resolved_field(op, "value", ctx);
        for el in select(op, interp, ctx) {
            el.set_text(&text);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct AddClass;

#[async_trait]
impl OpHandler for AddClass {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let class = resolved_field(op, "className", ctx);
        for el in select(op, interp, ctx) {
            el.add_class(&class);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct RemoveClass;

#[async_trait]
impl OpHandler for RemoveClass {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let class = resolved_field(op, "className", ctx);
        for el in select(op, interp, ctx) {
            el.remove_class(&class);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct Show;

#[async_trait]
impl OpHandler for Show {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        for el in select(op, interp, ctx) {
            el.set_visible(true);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct Hide;

#[async_trait]
impl OpHandler for Hide {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        for el in select(op, interp, ctx) {
            el.set_visible(false);
        }
        Ok(Value::Null.into())
    }
}

pub(crate) struct SetAttrs;

#[async_trait]
impl OpHandler for SetAttrs {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let Some(Value::Map(attrs)) = op.get("attrs") else {
            return Ok(Value::Null.into());
        };
        for el in select(op, interp, ctx) {
            for (name, raw) in attrs {
                // boolean coercion: true -> present-empty, false/null ->
                // removed, anything else -> its string form
                match template::resolve(raw, ctx) {
                    Value::Bool(false) | Value::Null => el.remove_attr(name),
                    Value::Bool(true) => el.set_attr(name, ""),
                    other => el.set_attr(name, &other.to_string()),
                }
            }
        }
        Ok(Value::Null.into())
    }
}
