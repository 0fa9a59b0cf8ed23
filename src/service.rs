//! Resource services: typed handles for one platform resource path.
//!
//! Every resource shares the same request plumbing in [`Service`]; which
//! verbs are available depends on the capability markers of its kind.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{ClientOptions, Token};
use crate::error::{Error, PlatformError, PlatformErrorKind, Result};
use crate::filter::Filter;
use crate::params::{Modify, Params};
use crate::protocol::{Reply, ResponseEnvelope};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// State shared by every service created from one [`crate::Api`].
#[derive(Clone)]
pub(crate) struct Context {
  pub creds: Token,
  pub options: Arc<ClientOptions>,
  pub transport: Arc<dyn Transport>,
}

impl Context {
  pub fn api_base(&self) -> String {
    format!(
      "{}://{}/v{}/{}",
      self.options.http_scheme(),
      self.options.host,
      self.options.version,
      self.creds.account
    )
  }
}

/// Resource kinds and the capabilities each one supports.
pub mod kind {
  /// A resource reachable under a fixed path.
  pub trait Resource {
    const PATH: &'static str;
  }

  /// read, read_many, find
  pub trait Findable {}
  /// create
  pub trait Creatable {}
  /// update, update_many, save
  pub trait Updatable: Creatable {}
  /// delete
  pub trait Destroyable {}

  macro_rules! resource {
    ($(#[$meta:meta])* $name:ident, $path:expr $(, $cap:ident)*) => {
      $(#[$meta])*
      #[derive(Debug, Clone, Copy)]
      pub struct $name;

      impl Resource for $name {
        const PATH: &'static str = $path;
      }

      $(impl $cap for $name {})*
    };
  }

  resource!(
    /// Account root; only raw requests.
    Root, ""
  );
  resource!(Identity, "/identity", Findable, Creatable, Updatable, Destroyable);
  resource!(Group, "/group", Findable, Creatable, Updatable, Destroyable);
  resource!(Track, "/track", Findable, Creatable, Updatable, Destroyable);
  resource!(ApiTask, "/api-task", Findable, Creatable, Updatable, Destroyable);
  resource!(MqttTask, "/mqtt", Findable, Creatable, Updatable, Destroyable);
  resource!(RssTask, "/rss", Findable, Creatable, Updatable, Destroyable);
  resource!(Device, "/device", Findable, Creatable, Updatable, Destroyable);
  resource!(Flow, "/flow", Findable, Creatable, Updatable, Destroyable);
  resource!(
    /// Drops of a single flow, at `/drop/<flow id>`.
    Drop, "/drop", Findable, Creatable, Updatable, Destroyable
  );
  resource!(
    /// Unscoped `/drop`; create only, the flow is taken from the model's `path`.
    DropRoot, "/drop", Creatable
  );
  resource!(Token, "/token", Findable, Creatable, Destroyable);
  resource!(Share, "/share", Findable, Creatable, Destroyable);
  resource!(Statistics, "/statistics");
  resource!(Session, "/session");
}

use kind::{Creatable, Destroyable, Findable, Updatable};

/// What [`Service::find`] should look up.
#[derive(Debug, Clone)]
pub enum Lookup {
  Id(String),
  Ids(Vec<String>),
  Search(Params),
}

impl From<&str> for Lookup {
  fn from(id: &str) -> Self {
    Lookup::Id(id.to_string())
  }
}

impl From<String> for Lookup {
  fn from(id: String) -> Self {
    Lookup::Id(id)
  }
}

impl From<Vec<String>> for Lookup {
  fn from(ids: Vec<String>) -> Self {
    Lookup::Ids(ids)
  }
}

impl From<Vec<&str>> for Lookup {
  fn from(ids: Vec<&str>) -> Self {
    Lookup::Ids(ids.into_iter().map(str::to_string).collect())
  }
}

impl From<Params> for Lookup {
  fn from(params: Params) -> Self {
    Lookup::Search(params)
  }
}

impl From<Filter> for Lookup {
  fn from(filter: Filter) -> Self {
    Lookup::Search(Params::new().filter(filter))
  }
}

impl From<Vec<Filter>> for Lookup {
  fn from(filters: Vec<Filter>) -> Self {
    Lookup::Search(Params::new().filters(filters))
  }
}

/// A model to update: either a full JSON object or tracked changes.
#[derive(Debug, Clone)]
pub enum Model {
  Plain(Value),
  Modified(Modify),
}

impl Model {
  fn raw_id(&self) -> Option<&Value> {
    match self {
      Model::Plain(value) => value.get("id"),
      Model::Modified(modify) => modify.model().get("id"),
    }
  }

  /// Any `id` key counts, whatever its value.
  fn has_id(&self) -> bool {
    self.raw_id().is_some()
  }

  /// String ids are used as-is and numeric ids in their decimal form.
  fn id(&self) -> Option<String> {
    match self.raw_id()? {
      Value::String(id) => Some(id.clone()),
      Value::Number(id) => Some(id.to_string()),
      _ => None,
    }
  }

  /// The id and the payload to send for it.
  fn into_update(self) -> Result<(String, Value)> {
    let id = self
      .id()
      .ok_or_else(|| Error::InvalidArgument("model has no string or numeric `id`".to_string()))?;
    let payload = match self {
      Model::Plain(value) => value,
      Model::Modified(modify) => Value::Object(modify.done().1),
    };
    Ok((id, payload))
  }
}

impl From<Value> for Model {
  fn from(value: Value) -> Self {
    Model::Plain(value)
  }
}

impl From<Modify> for Model {
  fn from(modify: Modify) -> Self {
    Model::Modified(modify)
  }
}

/// What [`Service::save`] should persist.
#[derive(Debug, Clone)]
pub enum Save {
  One(Model),
  Many(Vec<Model>),
}

impl From<Value> for Save {
  fn from(value: Value) -> Self {
    match value {
      Value::Array(items) => Save::Many(items.into_iter().map(Model::Plain).collect()),
      other => Save::One(Model::Plain(other)),
    }
  }
}

impl From<Modify> for Save {
  fn from(modify: Modify) -> Self {
    Save::One(Model::Modified(modify))
  }
}

impl From<Model> for Save {
  fn from(model: Model) -> Self {
    Save::One(model)
  }
}

impl From<Vec<Model>> for Save {
  fn from(models: Vec<Model>) -> Self {
    Save::Many(models)
  }
}

/// Body of a drop aggregation request.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
  output: Vec<String>,
  group_by: Option<Vec<String>>,
  filter: Option<Filter>,
  rules: Option<Vec<(String, Filter)>>,
  sorts: Option<Vec<String>>,
}

impl Aggregation {
  /// Aggregate outputs such as `$avg:temp` or `$count:id`.
  pub fn new<S: Into<String>>(output: impl IntoIterator<Item = S>) -> Self {
    Self {
      output: output.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  pub fn group_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
    self.group_by = Some(fields.into_iter().map(Into::into).collect());
    self
  }

  pub fn filter(mut self, filter: Filter) -> Self {
    self.filter = Some(filter);
    self
  }

  pub fn rule(mut self, name: impl Into<String>, filter: Filter) -> Self {
    self.rules.get_or_insert_with(Vec::new).push((name.into(), filter));
    self
  }

  pub fn sorts<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
    self.sorts = Some(fields.into_iter().map(Into::into).collect());
    self
  }

  pub fn to_body(&self) -> Result<Value> {
    let mut body = Map::new();
    body.insert("output".to_string(), Value::from(self.output.clone()));
    if let Some(group_by) = &self.group_by {
      body.insert("groupBy".to_string(), Value::from(group_by.clone()));
    }
    if let Some(filter) = &self.filter {
      body.insert("filter".to_string(), Value::from(filter.render()?));
    }
    if let Some(rules) = &self.rules {
      let mut rendered = Map::new();
      for (name, filter) in rules {
        rendered.insert(name.clone(), Value::from(filter.render()?));
      }
      body.insert("rules".to_string(), Value::Object(rendered));
    }
    if let Some(sorts) = &self.sorts {
      body.insert("sorts".to_string(), Value::from(sorts.clone()));
    }
    Ok(Value::Object(body))
  }
}

/// Handle for one resource path. Cheap to clone.
pub struct Service<K> {
  ctx: Context,
  base: String,
  path: String,
  _kind: PhantomData<K>,
}

impl<K> Clone for Service<K> {
  fn clone(&self) -> Self {
    Self {
      ctx: self.ctx.clone(),
      base: self.base.clone(),
      path: self.path.clone(),
      _kind: PhantomData,
    }
  }
}

impl<K> std::fmt::Debug for Service<K> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Service")
      .field("base", &self.base)
      .field("path", &self.path)
      .finish()
  }
}

impl<K: kind::Resource> Service<K> {
  pub(crate) fn new(ctx: Context) -> Self {
    let base = ctx.api_base();
    Self::with_base(ctx, base, K::PATH.to_string())
  }
}

impl<K> Service<K> {
  pub(crate) fn with_base(ctx: Context, base: String, path: String) -> Self {
    Self {
      ctx,
      base,
      path,
      _kind: PhantomData,
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn creds(&self) -> &Token {
    &self.ctx.creds
  }

  pub(crate) fn options(&self) -> &ClientOptions {
    &self.ctx.options
  }

  pub fn url(&self, sub_path: &str) -> String {
    format!("{}{}{}", self.base, self.path, sub_path)
  }

  /// Send a request as-is and return the raw response.
  pub async fn raw_request(
    &self,
    method: &str,
    sub_path: &str,
    data: Option<Value>,
    query: Vec<(String, String)>,
  ) -> Result<HttpResponse> {
    let request = HttpRequest {
      method: method.to_string(),
      url: self.url(sub_path),
      query,
      body: data,
      creds: self.ctx.creds.clone(),
    };
    info!(method = %request.method, url = %request.url, query = ?request.query, "platform request");
    let response = self.ctx.transport.send(request).await?;
    info!(status = response.status, bytes = response.body.len(), "platform response");
    Ok(response)
  }

  /// Send a request and decode the platform envelope.
  ///
  /// The client's default params are merged under `params`. A 2xx/3xx
  /// response yields its `body`; anything else becomes
  /// [`Error::Platform`].
  pub async fn request(
    &self,
    method: &str,
    sub_path: &str,
    data: Option<Value>,
    params: impl Into<Option<Params>>,
  ) -> Result<Reply> {
    let params = Params::from(self.ctx.options.params.clone())
      .merge(params.into().unwrap_or_default());
    let wants_refs = params.wants_refs();
    let query = params.to_query()?;

    let response = self.raw_request(method, sub_path, data, query).await?;

    if (200..400).contains(&response.status) {
      let envelope: ResponseEnvelope = serde_json::from_slice(&response.body)?;
      return Ok(Reply {
        body: envelope.body,
        references: wants_refs.then_some(envelope.head.references),
      });
    }

    Err(self.platform_error(method, sub_path, &response).into())
  }

  fn platform_error(&self, method: &str, sub_path: &str, response: &HttpResponse) -> PlatformError {
    let (status, errors) = match serde_json::from_slice::<ResponseEnvelope>(&response.body) {
      Ok(envelope) if envelope.head.status != 0 => (envelope.head.status, envelope.head.errors),
      Ok(envelope) => (response.status, envelope.head.errors),
      Err(e) => {
        debug!(error = %e, "undecodable error response");
        (response.status, Vec::new())
      }
    };
    PlatformError {
      kind: PlatformErrorKind::from_status(status),
      status,
      errors,
      account: Some(self.ctx.creds.account.clone()),
      method: Some(method.to_string()),
      path: Some(format!("{}{}", self.path, sub_path)),
    }
  }
}

fn id_path(id: &str) -> String {
  format!("/{}", urlencoding::encode(id))
}

impl<K: Findable> Service<K> {
  pub async fn read(&self, id: &str, params: impl Into<Option<Params>>) -> Result<Value> {
    Ok(self.request("GET", &id_path(id), None, params).await?.body)
  }

  /// Like [`Service::read`], but a 404 yields `default`. Other errors are
  /// still returned.
  pub async fn read_or_else(
    &self,
    id: &str,
    default: Value,
    params: impl Into<Option<Params>>,
  ) -> Result<Value> {
    match self.read(id, params).await {
      Err(e) if e.is_not_found() => Ok(default),
      other => other,
    }
  }

  /// Fetch several resources with one `MGET`; returns a map of id to resource.
  pub async fn read_many<S: Into<String>>(
    &self,
    ids: impl IntoIterator<Item = S>,
    params: impl Into<Option<Params>>,
  ) -> Result<Value> {
    let ids: Vec<Value> = ids.into_iter().map(|id| Value::String(id.into())).collect();
    Ok(self.request("MGET", "", Some(Value::Array(ids)), params).await?.body)
  }

  /// Parameterized search.
  pub async fn find_many(&self, params: impl Into<Option<Params>>) -> Result<Value> {
    Ok(self.request("GET", "", None, params).await?.body)
  }

  /// Search and also return the referenced resources.
  pub async fn find_with_refs(&self, params: Params) -> Result<(Value, Value)> {
    let reply = self.request("GET", "", None, params.refs(true)).await?;
    Ok((reply.body, reply.references.unwrap_or(Value::Null)))
  }

  /// Dispatch on the lookup: one id reads, a list of ids uses `MGET`,
  /// anything else searches.
  pub async fn find(&self, lookup: impl Into<Lookup>) -> Result<Value> {
    match lookup.into() {
      Lookup::Id(id) => self.read(&id, None).await,
      Lookup::Ids(ids) => self.read_many(ids, None).await,
      Lookup::Search(params) => self.find_many(params).await,
    }
  }
}

impl<K: Creatable> Service<K> {
  pub async fn create(&self, model: Value, params: impl Into<Option<Params>>) -> Result<Value> {
    Ok(self.request("POST", "", Some(model), params).await?.body)
  }
}

impl<K: Updatable> Service<K> {
  /// `PUT` the model. A [`Modify`] sends only its changed fields.
  pub async fn update(
    &self,
    model: impl Into<Model>,
    params: impl Into<Option<Params>>,
  ) -> Result<Value> {
    let (id, payload) = model.into().into_update()?;
    Ok(self.request("PUT", &id_path(&id), Some(payload), params).await?.body)
  }

  /// Bulk update with one `MPUT`, keyed by model id.
  pub async fn update_many<M: Into<Model>>(
    &self,
    models: impl IntoIterator<Item = M>,
    params: impl Into<Option<Params>>,
  ) -> Result<Value> {
    let mut data = Map::new();
    for model in models {
      let (id, payload) = model.into().into_update()?;
      data.insert(id, payload);
    }
    Ok(self.request("MPUT", "", Some(Value::Object(data)), params).await?.body)
  }

  /// Create or update depending on the model: lists are bulk-updated,
  /// tracked changes and models with an `id` are updated, anything else is
  /// created.
  pub async fn save(&self, model: impl Into<Save>, params: impl Into<Option<Params>>) -> Result<Value> {
    match model.into() {
      Save::Many(models) => self.update_many(models, params).await,
      Save::One(model @ Model::Modified(_)) => self.update(model, params).await,
      Save::One(model) if model.has_id() => self.update(model, params).await,
      Save::One(Model::Plain(value)) => self.create(value, params).await,
    }
  }
}

impl<K: Destroyable> Service<K> {
  pub async fn delete(
    &self,
    id: &str,
    data: Option<Value>,
    params: impl Into<Option<Params>>,
  ) -> Result<Value> {
    Ok(self.request("DELETE", &id_path(id), data, params).await?.body)
  }
}

impl Service<kind::Drop> {
  pub(crate) fn for_flow(ctx: Context, flow_id: &str) -> Self {
    let base = ctx.api_base();
    let path = format!("/drop/{}", urlencoding::encode(flow_id));
    Self::with_base(ctx, base, path)
  }

  /// Delete every drop in the flow.
  pub async fn delete_all(&self) -> Result<Value> {
    Ok(self.request("DELETE", "", None, None).await?.body)
  }

  pub async fn aggregate(&self, aggregation: &Aggregation) -> Result<Value> {
    let body = aggregation.to_body()?;
    Ok(self.request("POST", "/aggregate", Some(body), None).await?.body)
  }
}
