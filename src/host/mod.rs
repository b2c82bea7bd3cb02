//! Capability seams the embedding host supplies. The interpreter only ever
//! touches the outside world through these traits; [`Host::in_memory`]
//! wires up the reference implementations used by tests and by embedders
//! getting started.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::value::Value;

pub mod http;
pub mod memory;
pub mod timer;

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("capability not supported by this host: {0}")]
    Unsupported(&'static str),
    #[error("permission denied: {0}")]
    Denied(String),
    #[error("{0}")]
    Failed(String),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

pub type ElementRef = Arc<dyn Element>;

/// One element of the host's element tree. Mutations apply immediately.
pub trait Element: Send + Sync {
    fn value(&self) -> String;
    fn set_value(&self, value: &str);
    fn text(&self) -> String;
    fn set_text(&self, text: &str);
    fn add_class(&self, class: &str);
    fn remove_class(&self, class: &str);
    fn set_visible(&self, visible: bool);
    fn set_attr(&self, name: &str, value: &str);
    fn remove_attr(&self, name: &str);
}

pub trait ElementTree: Send + Sync {
    /// All elements matching a single selector pattern, in tree order.
    fn query(&self, selector: &str) -> Vec<ElementRef>;
}

/// String-keyed, string-valued storage. The host supplies two independent
/// instances: one durable, one scoped to the session.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}

/// Callbacks a channel implementation fires back into the interpreter.
#[async_trait]
pub trait ChannelEvents: Send + Sync {
    async fn on_open(&self);
    async fn on_message(&self, payload: &str);
    async fn on_close(&self);
    async fn on_error(&self, error: &str);
}

#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, message: &str) -> CapabilityResult<()>;
    async fn close(&self);
}

#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        events: Arc<dyn ChannelEvents>,
    ) -> CapabilityResult<Arc<dyn Channel>>;
}

pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// `options` is the already-resolved request record
    /// (method/headers/body). Body extraction happens in the fetch op.
    async fn fetch(&self, url: &str, options: &Value) -> CapabilityResult<HttpResponse>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> CapabilityResult<()>;
    async fn read_text(&self) -> CapabilityResult<String>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether display permission is (now) granted, prompting if needed.
    async fn request_permission(&self) -> bool;
    async fn show(&self, title: &str, body: &str);
}

/// A dynamically imported code module: a named set of callables.
#[async_trait]
pub trait Module: Send + Sync {
    fn exports(&self, function: &str) -> bool;
    async fn call(&self, function: &str, args: Vec<Value>) -> CapabilityResult<Value>;
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn import(&self, url: &str) -> CapabilityResult<Arc<dyn Module>>;
}

#[async_trait]
pub trait HostHandler: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> CapabilityResult<Value>;
}

/// Global function registry: handler-name to callable lookup.
pub trait HandlerRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<dyn HostHandler>>;
}

/// Opaque cancellation token issued by a [`TimerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub type TimerTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub trait TimerService: Send + Sync {
    fn delay(&self, after: Duration, task: TimerTask);
    fn repeat(&self, every: Duration, task: TimerTask) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle);
    fn next_frame(&self, task: TimerTask) -> TimerHandle;
    fn cancel_frame(&self, handle: TimerHandle);
}

/// Capability bundle injected into the interpreter. Replace individual
/// fields to wire a real host.
#[derive(Clone)]
pub struct Host {
    pub elements: Arc<dyn ElementTree>,
    pub durable: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub channels: Arc<dyn ChannelFactory>,
    pub http: Arc<dyn HttpClient>,
    pub clipboard: Arc<dyn Clipboard>,
    pub notifier: Arc<dyn Notifier>,
    pub modules: Arc<dyn ModuleLoader>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub timers: Arc<dyn TimerService>,
}

impl Host {
    /// Fully in-memory host: reference implementations for every
    /// capability, with tokio-backed timers.
    pub fn in_memory() -> Self {
        Self {
            elements: Arc::new(memory::MemoryElementTree::new()),
            durable: Arc::new(memory::MemoryStore::new()),
            session: Arc::new(memory::MemoryStore::new()),
            channels: Arc::new(memory::MemoryChannelFactory::new()),
            http: Arc::new(memory::MemoryHttp::new()),
            clipboard: Arc::new(memory::MemoryClipboard::new()),
            notifier: Arc::new(memory::MemoryNotifier::granted()),
            modules: Arc::new(memory::MemoryModuleLoader::new()),
            handlers: Arc::new(memory::MemoryHandlers::new()),
            timers: Arc::new(timer::TokioTimers::new(Duration::from_millis(16))),
        }
    }
}
