use crate::value::{Map, Value};

/// Ambient variable bindings threaded through evaluation. Loops and
/// function calls derive a child context; the parent is never mutated.
#[derive(Clone, Debug, Default)]
pub struct Context {
    bindings: Map,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a JSON object; anything else yields an empty
    /// context.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match Value::from_json(json) {
            Value::Map(bindings) => Self { bindings },
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Shallow-copy derivation point for per-iteration and per-call scopes.
    pub fn child(&self) -> Context {
        self.clone()
    }
}
