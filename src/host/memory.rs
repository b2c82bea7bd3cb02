//! In-memory reference implementations of the host capabilities. They back
//! the crate's tests and give embedders a working starting point to swap
//! out piecewise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::value::Value;

use super::{
    CapabilityError, CapabilityResult, Channel, ChannelEvents, ChannelFactory, Clipboard, Element,
    ElementRef, ElementTree, HandlerRegistry, HostHandler, HttpClient, HttpResponse,
    KeyValueStore, Module, ModuleLoader, Notifier,
};

// ===== Element tree =====

pub struct MemoryElementTree {
    elements: RwLock<Vec<Arc<MemoryElement>>>,
}

impl Default for MemoryElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryElementTree {
    pub fn new() -> Self {
        Self {
            elements: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, element: Arc<MemoryElement>) {
        self.elements.write().unwrap().push(element);
    }

    pub fn remove(&self, id: &str) {
        self.elements.write().unwrap().retain(|el| el.id != id);
    }
}

impl ElementTree for MemoryElementTree {
    fn query(&self, selector: &str) -> Vec<ElementRef> {
        self.elements
            .read()
            .unwrap()
            .iter()
            .filter(|el| el.matches(selector))
            .map(|el| el.clone() as ElementRef)
            .collect()
    }
}

/// A fake element that answers to an id selector (`#id`) plus any extra
/// patterns it was created with.
pub struct MemoryElement {
    id: String,
    selectors: Vec<String>,
    value: Mutex<String>,
    text: Mutex<String>,
    classes: Mutex<Vec<String>>,
    attrs: Mutex<HashMap<String, String>>,
    visible: AtomicBool,
}

impl MemoryElement {
    pub fn new(id: &str, selectors: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            value: Mutex::new(String::new()),
            text: Mutex::new(String::new()),
            classes: Mutex::new(Vec::new()),
            attrs: Mutex::new(HashMap::new()),
            visible: AtomicBool::new(true),
        })
    }

    fn matches(&self, selector: &str) -> bool {
        selector == format!("#{}", self.id) || self.selectors.iter().any(|s| s == selector)
    }

    pub fn current_value(&self) -> String {
        self.value.lock().unwrap().clone()
    }

    pub fn current_text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    pub fn classes(&self) -> Vec<String> {
        self.classes.lock().unwrap().clone()
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.attrs.lock().unwrap().get(name).cloned()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

impl Element for MemoryElement {
    fn value(&self) -> String {
        self.current_value()
    }

    fn set_value(&self, value: &str) {
        *self.value.lock().unwrap() = value.to_string();
    }

    fn text(&self) -> String {
        self.current_text()
    }

    fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }

    fn add_class(&self, class: &str) {
        let mut classes = self.classes.lock().unwrap();
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    fn remove_class(&self, class: &str) {
        self.classes.lock().unwrap().retain(|c| c != class);
    }

    fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    fn set_attr(&self, name: &str, value: &str) {
        self.attrs
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attr(&self, name: &str) {
        self.attrs.lock().unwrap().remove(name);
    }
}

// ===== Key-value storage =====

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

// ===== Duplex channels =====

/// Channel factory keeping every opened session reachable by URL so tests
/// can inject incoming traffic.
#[derive(Default)]
pub struct MemoryChannelFactory {
    sessions: DashMap<String, Arc<MemoryChannel>>,
    refuse: AtomicBool,
}

impl MemoryChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connect attempts fail.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn session(&self, url: &str) -> Option<Arc<MemoryChannel>> {
        self.sessions.get(url).map(|s| s.clone())
    }
}

#[async_trait]
impl ChannelFactory for MemoryChannelFactory {
    async fn connect(
        &self,
        url: &str,
        events: Arc<dyn ChannelEvents>,
    ) -> CapabilityResult<Arc<dyn Channel>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CapabilityError::Failed(format!(
                "connection refused: {url}"
            )));
        }
        let channel = Arc::new(MemoryChannel {
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            events,
        });
        self.sessions.insert(url.to_string(), channel.clone());
        channel.events.on_open().await;
        Ok(channel)
    }
}

pub struct MemoryChannel {
    sent: Mutex<Vec<String>>,
    open: AtomicBool,
    events: Arc<dyn ChannelEvents>,
}

impl MemoryChannel {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Deliver an incoming message to the interpreter side.
    pub async fn push(&self, payload: &str) {
        if self.is_open() {
            self.events.on_message(payload).await;
        }
    }

    pub async fn fail(&self, error: &str) {
        self.events.on_error(error).await;
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&self, message: &str) -> CapabilityResult<()> {
        if !self.is_open() {
            return Err(CapabilityError::Failed("channel closed".to_string()));
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.events.on_close().await;
        }
    }
}

// ===== HTTP =====

/// Canned-response HTTP stub: requests match stubbed URLs exactly,
/// anything else fails.
#[derive(Default)]
pub struct MemoryHttp {
    routes: DashMap<String, (u16, Vec<u8>)>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MemoryHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.routes.insert(url.to_string(), (status, body.into()));
    }

    /// Every performed request with its resolved options, in order.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MemoryHttp {
    async fn fetch(&self, url: &str, options: &Value) -> CapabilityResult<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));
        match self.routes.get(url) {
            Some(route) => {
                let (status, body) = route.clone();
                Ok(HttpResponse { status, body })
            }
            None => Err(CapabilityError::Failed(format!(
                "no response stubbed for {url}"
            ))),
        }
    }
}

// ===== Clipboard =====

#[derive(Default)]
pub struct MemoryClipboard {
    content: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.content.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> CapabilityResult<()> {
        *self.content.lock().unwrap() = text.to_string();
        Ok(())
    }

    async fn read_text(&self) -> CapabilityResult<String> {
        Ok(self.contents())
    }
}

// ===== Notifications =====

pub struct MemoryNotifier {
    granted: bool,
    shown: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn granted() -> Self {
        Self {
            granted: true,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn request_permission(&self) -> bool {
        self.granted
    }

    async fn show(&self, title: &str, body: &str) {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

// ===== Modules =====

/// Module loader resolving URLs against pre-registered modules.
#[derive(Default)]
pub struct MemoryModuleLoader {
    modules: DashMap<String, Arc<dyn Module>>,
}

impl MemoryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, url: &str, module: Arc<dyn Module>) {
        self.modules.insert(url.to_string(), module);
    }
}

#[async_trait]
impl ModuleLoader for MemoryModuleLoader {
    async fn import(&self, url: &str) -> CapabilityResult<Arc<dyn Module>> {
        self.modules
            .get(url)
            .map(|m| m.clone())
            .ok_or_else(|| CapabilityError::Failed(format!("unknown module url: {url}")))
    }
}

pub type HandlerFn =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, CapabilityResult<Value>> + Send + Sync>;

/// A module built from named closures.
#[derive(Default)]
pub struct FnModule {
    functions: DashMap<String, HandlerFn>,
}

impl FnModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define<F>(&self, name: &str, function: F)
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        self.functions.insert(
            name.to_string(),
            Arc::new(move |args| {
                let function = function.clone();
                Box::pin(async move { Ok(function(args)) })
            }),
        );
    }
}

#[async_trait]
impl Module for FnModule {
    fn exports(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }

    async fn call(&self, function: &str, args: Vec<Value>) -> CapabilityResult<Value> {
        let Some(f) = self.functions.get(function).map(|f| f.clone()) else {
            return Err(CapabilityError::Failed(format!(
                "module function not found: {function}"
            )));
        };
        f(args).await
    }
}

// ===== Handlers =====

struct FnHandler(HandlerFn);

#[async_trait]
impl HostHandler for FnHandler {
    async fn call(&self, args: Vec<Value>) -> CapabilityResult<Value> {
        (self.0)(args).await
    }
}

/// Global handler registry backed by a concurrent map.
#[derive(Default)]
pub struct MemoryHandlers {
    handlers: DashMap<String, Arc<dyn HostHandler>>,
}

impl MemoryHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, handler: Arc<dyn HostHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Register a synchronous closure as a handler.
    pub fn register_fn<F>(&self, name: &str, function: F)
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        self.register(
            name,
            Arc::new(FnHandler(Arc::new(move |args| {
                let function = function.clone();
                Box::pin(async move { Ok(function(args)) })
            }))),
        );
    }
}

impl HandlerRegistry for MemoryHandlers {
    fn lookup(&self, name: &str) -> Option<Arc<dyn HostHandler>> {
        self.handlers.get(name).map(|h| h.clone())
    }
}
