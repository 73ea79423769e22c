//! Cache key derivation from a resource name and query parameters

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters in canonical form
///
/// Parameters are kept sorted by name, absent values are dropped, and a
/// repeated name keeps the value supplied last. Two sets built from the same
/// pairs in any order encode identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Add a parameter that may be absent. `None` also drops an earlier value
    /// under the same name.
    pub fn with_opt<V: fmt::Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => {
                let mut params = self;
                params.params.remove(&name.into());
                params
            }
        }
    }

    /// Builds parameters from the fields of a JSON object
    ///
    /// `null` fields are dropped, strings are used verbatim, numbers and
    /// booleans use their plain form, arrays and objects are compact JSON.
    /// Anything other than an object yields no parameters.
    pub fn from_json(value: &Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };

        fields
            .iter()
            .map(|(name, value)| (name.as_str(), render_json(value)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Encodes as `name=value` pairs joined by `&`, sorted by name
    pub fn encode(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for QueryParams
where
    K: Into<String>,
    V: fmt::Display,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |params, (name, value)| params.with_opt(name, value))
    }
}

fn render_json(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Derives the cache key for `base` queried with `params`
///
/// Returns `base` unchanged when there are no parameters, otherwise
/// `"{base}?{name=value&...}"` with parameters sorted by name.
///
/// # Example
/// ```
/// use sprintcache::cache::{derive_key, QueryParams};
///
/// let key = derive_key("listings", &QueryParams::new().with("page", 2).with("category", "saas"));
/// assert_eq!(key, "listings?category=saas&page=2");
/// ```
pub fn derive_key(base: &str, params: &QueryParams) -> String {
    if params.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, params.encode())
    }
}
