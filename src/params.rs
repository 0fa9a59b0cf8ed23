//! Query parameter builder and incremental model updates.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::filter::Filter;

#[derive(Debug, Clone)]
enum FilterParam {
    Raw(String),
    Expr(Filter),
}

/// Query parameters for a platform request.
///
/// Filters are kept as expressions and only rendered when the request is
/// built, so an invalid literal surfaces as an error from the request call.
///
/// # Example
/// ```
/// use flowthings::{member, Params};
///
/// let query = Params::new()
///     .limit(10)
///     .refs(true)
///     .only(["name", "path"])
///     .filter(member("temp").gt(30))
///     .to_query()
///     .unwrap();
///
/// assert!(query.contains(&("filter".to_string(), "temp > 30".to_string())));
/// assert!(query.contains(&("refs".to_string(), "1".to_string())));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Map<String, Value>,
    filter: Option<FilterParam>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the platform to return referenced resources alongside the body.
    pub fn refs(mut self, toggle: bool) -> Self {
        self.values
            .insert("refs".to_string(), Value::from(if toggle { 1 } else { 0 }));
        self
    }

    /// Restrict the returned fields.
    pub fn only<S: AsRef<str>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        let joined = fields
            .into_iter()
            .map(|f| f.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.values.insert("only".to_string(), Value::from(joined));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.values.insert("limit".to_string(), Value::from(n));
        self
    }

    pub fn start(mut self, n: usize) -> Self {
        self.values.insert("start".to_string(), Value::from(n));
        self
    }

    /// Set an arbitrary parameter.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(FilterParam::Expr(filter));
        self
    }

    /// Several filters, combined left-to-right with AND. An empty input
    /// clears the filter.
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filter = Filter::all(filters).map(FilterParam::Expr);
        self
    }

    /// A pre-rendered filter string, sent as-is.
    pub fn filter_raw(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(FilterParam::Raw(filter.into()));
        self
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub fn wants_refs(&self) -> bool {
        match self.values.get("refs") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "1" | "true"),
            _ => false,
        }
    }

    /// Overlay `other` on top of these params; `other` wins on conflicts.
    pub fn merge(mut self, other: Params) -> Self {
        self.values.extend(other.values);
        if other.filter.is_some() {
            self.filter = other.filter;
        }
        self
    }

    /// Parameter values as JSON, with the filter rendered.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        let mut map = self.values.clone();
        if let Some(filter) = &self.filter {
            let rendered = match filter {
                FilterParam::Raw(s) => s.clone(),
                FilterParam::Expr(f) => f.render()?,
            };
            map.insert("filter".to_string(), Value::from(rendered));
        }
        Ok(map)
    }

    /// Parameters as URL query pairs.
    pub fn to_query(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .to_map()?
            .into_iter()
            .map(|(k, v)| (k, query_value(&v)))
            .collect())
    }
}

impl From<Map<String, Value>> for Params {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            filter: None,
        }
    }
}

impl From<Filter> for Params {
    fn from(filter: Filter) -> Self {
        Params::new().filter(filter)
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Wraps a model and records field changes, so updates send only the diff.
///
/// # Example
/// ```
/// use flowthings::Modify;
/// use serde_json::json;
///
/// let model = json!({"id": "f1", "foo": "bar"});
/// let (updated, diff) = Modify::from_value(&model).unwrap().set("baz", "qux").done();
///
/// assert_eq!(updated["foo"], "bar");
/// assert_eq!(diff.len(), 1);
/// assert_eq!(diff["baz"], "qux");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Modify {
    model: Map<String, Value>,
    changes: Map<String, Value>,
}

impl Modify {
    pub fn new(model: Map<String, Value>) -> Self {
        Self {
            model,
            changes: Map::new(),
        }
    }

    /// Wrap a JSON object. Fails for any other JSON value.
    pub fn from_value(model: &Value) -> Result<Self> {
        match model {
            Value::Object(map) => Ok(Self::new(map.clone())),
            other => Err(Error::InvalidArgument(format!(
                "model must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn modify(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.model.insert(key.clone(), value.clone());
        self.changes.insert(key, value);
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.modify(key, value);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.model.get("id").and_then(Value::as_str)
    }

    pub fn model(&self) -> &Map<String, Value> {
        &self.model
    }

    pub fn changes(&self) -> &Map<String, Value> {
        &self.changes
    }

    /// The updated model and the changed fields.
    pub fn done(self) -> (Map<String, Value>, Map<String, Value>) {
        (self.model, self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::member;
    use serde_json::json;

    #[test]
    fn test_empty_params() {
        assert!(Params::new().to_query().unwrap().is_empty());
    }

    #[test]
    fn test_refs_only_limit() {
        let map = Params::new()
            .limit(10)
            .refs(true)
            .only(["name", "path"])
            .to_map()
            .unwrap();
        assert_eq!(map["limit"], json!(10));
        assert_eq!(map["refs"], json!(1));
        assert_eq!(map["only"], json!("name,path"));
    }

    #[test]
    fn test_refs_false() {
        let params = Params::new().refs(false);
        assert_eq!(params.to_map().unwrap()["refs"], json!(0));
        assert!(!params.wants_refs());
        assert!(Params::new().refs(true).wants_refs());
    }

    #[test]
    fn test_filters_fold_with_and() {
        let map = Params::new()
            .filters([member("a").eq(1), member("b").eq(true)])
            .to_map()
            .unwrap();
        assert_eq!(map["filter"], json!("(a == 1) && (b == true)"));
    }

    #[test]
    fn test_filter_raw() {
        let query = Params::new().filter_raw("foo == 1").to_query().unwrap();
        assert_eq!(query, vec![("filter".to_string(), "foo == 1".to_string())]);
    }

    #[test]
    fn test_invalid_filter_surfaces_on_render() {
        let params = Params::new().filter(member("a").eq(json!([1])));
        assert!(matches!(params.to_query(), Err(Error::InvalidPrimitive(_))));
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = Params::new().limit(5).set("hints", false);
        let merged = base.merge(Params::new().limit(20).filter(member("x").eq(1)));
        let map = merged.to_map().unwrap();
        assert_eq!(map["limit"], json!(20));
        assert_eq!(map["hints"], json!(false));
        assert_eq!(map["filter"], json!("x == 1"));
    }

    #[test]
    fn test_modify_tracks_changes() {
        let mut m = Modify::from_value(&json!({"id": "f1", "foo": "bar"})).unwrap();
        m.modify("foo", "baz");
        assert_eq!(m.id(), Some("f1"));
        let (model, changes) = m.done();
        assert_eq!(Value::Object(model), json!({"id": "f1", "foo": "baz"}));
        assert_eq!(Value::Object(changes), json!({"foo": "baz"}));
    }

    #[test]
    fn test_modify_rejects_non_object() {
        assert!(Modify::from_value(&json!([1, 2])).is_err());
    }
}
