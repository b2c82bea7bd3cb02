use std::sync::Arc;

use dashmap::DashMap;

use crate::host::{Channel, Module, TimerHandle};
use crate::value::Value;

/// A callable registered by `declareFunction`: a parameter list plus a
/// stored operation-tree body. Invocation binds parameters into a derived
/// context and re-enters the interpreter on the body.
#[derive(Clone)]
pub struct DeclaredFunction {
    pub params: Vec<String>,
    pub body: Value,
}

/// Process-wide id-keyed maps of live resources, owned by one interpreter
/// instance and injected rather than ambient. Entries outlive any single
/// context and are released only by explicit cancel/close operations or
/// host teardown.
#[derive(Default)]
pub struct Registries {
    pub channels: DashMap<String, Arc<dyn Channel>>,
    pub timers: DashMap<String, TimerHandle>,
    pub frames: DashMap<String, TimerHandle>,
    pub modules: DashMap<String, Arc<dyn Module>>,
    pub vars: DashMap<String, Value>,
    pub functions: DashMap<String, DeclaredFunction>,
}
