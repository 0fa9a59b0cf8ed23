//! API entry point and concurrent request helpers.

use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::{ClientOptions, Token};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::protocol::Reply;
use crate::service::{kind, Context, Service};
use crate::statistics::Statistics;
use crate::transport::{ReqwestTransport, Transport};
use crate::websocket::WebSocketService;

/// Client context. Every request made through it acts as the given account.
///
/// # Example
///
/// ```no_run
/// use flowthings::{member, Api, Params, Token};
///
/// #[tokio::main]
/// async fn main() -> flowthings::Result<()> {
///     let api = Api::new(Token::new("account", "token"));
///
///     let flow = api.flow().read("f5548ea4c68056d1b5a0b49a5", None).await?;
///     println!("flow: {}", flow);
///
///     let hot = api
///         .drop("f5548ea4c68056d1b5a0b49a5")
///         .find_many(Params::new().filter(member("elems").field("temp").gt(30)).limit(10))
///         .await?;
///     println!("hot drops: {}", hot);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Api {
    ctx: Context,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("account", &self.ctx.creds.account)
            .field("options", &self.ctx.options)
            .finish()
    }
}

impl Api {
    pub fn new(creds: Token) -> Self {
        Self::with_options(creds, ClientOptions::default())
    }

    pub fn with_options(creds: Token, options: ClientOptions) -> Self {
        Self::with_transport(creds, options, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        creds: Token,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            ctx: Context {
                creds,
                options: Arc::new(options),
                transport,
            },
        }
    }

    pub fn creds(&self) -> &Token {
        &self.ctx.creds
    }

    /// Switch accounts. Services created afterwards use the new credentials.
    pub fn set_creds(&mut self, creds: Token) {
        self.ctx.creds = creds;
    }

    pub fn options(&self) -> &ClientOptions {
        &self.ctx.options
    }

    fn service<K: kind::Resource>(&self) -> Service<K> {
        Service::new(self.ctx.clone())
    }

    pub fn root(&self) -> Service<kind::Root> {
        self.service()
    }

    /// Request an arbitrary path under the account root.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        data: Option<Value>,
        params: impl Into<Option<Params>>,
    ) -> Result<Reply> {
        self.root().request(method, path, data, params).await
    }

    pub fn identity(&self) -> Service<kind::Identity> {
        self.service()
    }

    pub fn group(&self) -> Service<kind::Group> {
        self.service()
    }

    pub fn track(&self) -> Service<kind::Track> {
        self.service()
    }

    pub fn api_task(&self) -> Service<kind::ApiTask> {
        self.service()
    }

    pub fn mqtt(&self) -> Service<kind::MqttTask> {
        self.service()
    }

    pub fn rss(&self) -> Service<kind::RssTask> {
        self.service()
    }

    pub fn device(&self) -> Service<kind::Device> {
        self.service()
    }

    pub fn flow(&self) -> Service<kind::Flow> {
        self.service()
    }

    /// Drops of one flow.
    pub fn drop(&self, flow_id: &str) -> Service<kind::Drop> {
        Service::for_flow(self.ctx.clone(), flow_id)
    }

    /// Unscoped drop endpoint, for creating drops by flow path.
    pub fn drops(&self) -> Service<kind::DropRoot> {
        self.service()
    }

    pub fn token(&self) -> Service<kind::Token> {
        self.service()
    }

    pub fn share(&self) -> Service<kind::Share> {
        self.service()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::new(self.service())
    }

    pub fn websocket(&self) -> WebSocketService {
        WebSocketService::new(self.ctx.clone())
    }
}

/// Queue of requests run concurrently and collected in submission order.
///
/// ```no_run
/// # use flowthings::{Api, Batch};
/// # async fn run(api: Api) -> flowthings::Result<()> {
/// let flows = api.flow();
/// let drops = api.drop("f1");
///
/// let mut batch = Batch::new();
/// batch.push(async move { flows.read("f1", None).await });
/// batch.push(async move { drops.read("d1", None).await });
/// let results = batch.results().await?;
/// assert_eq!(results.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Batch<'a> {
    queue: Vec<BoxFuture<'a, Result<Value>>>,
}

impl<'a> Batch<'a> {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    pub fn push<F>(&mut self, request: F) -> &mut Self
    where
        F: Future<Output = Result<Value>> + Send + 'a,
    {
        self.queue.push(request.boxed());
        self
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// All results, or the first error.
    pub async fn results(self) -> Result<Vec<Value>> {
        future::try_join_all(self.queue).await
    }

    /// Every outcome, errors included, in submission order.
    pub async fn settle(self) -> Vec<Result<Value>> {
        future::join_all(self.queue).await
    }
}

/// A request started in the background; the result is awaited on first use.
pub struct Lazy<T> {
    handle: Option<JoinHandle<Result<T>>>,
    value: Option<T>,
}

impl<T: Send + 'static> Lazy<T> {
    /// Spawn `request` on the current tokio runtime.
    pub fn spawn<F>(request: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(request)),
            value: None,
        }
    }

    /// Wait for the result if it has not arrived yet.
    pub async fn force(&mut self) -> Result<&T> {
        if let Some(handle) = self.handle.take() {
            let value = handle.await.map_err(|e| Error::Task(e.to_string()))??;
            self.value = Some(value);
        }
        self.value
            .as_ref()
            .ok_or_else(|| Error::Task("result already consumed by a failed request".to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some() || self.handle.as_ref().is_some_and(|h| h.is_finished())
    }

    pub async fn unwrap(mut self) -> Result<T> {
        self.force().await?;
        self.value
            .take()
            .ok_or_else(|| Error::Task("result already consumed".to_string()))
    }
}
