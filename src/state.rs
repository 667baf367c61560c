//! Typed access to a resource's JSON attribute map.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Attribute map of one resource or data-source instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    attrs: Map<String, Value>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a state value. `null` yields an empty map.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        match value {
            Value::Object(attrs) => Ok(Self { attrs }),
            Value::Null => Ok(Self::default()),
            other => Err(ProviderError::InvalidRequest(format!(
                "expected an object for resource state, got {}",
                other
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.attrs)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// ID, or an error if the state has none.
    pub fn require_id(&self) -> Result<&str, ProviderError> {
        self.id()
            .ok_or_else(|| ProviderError::InvalidRequest("resource state has no id".to_string()))
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.attrs.insert("id".to_string(), Value::String(id.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key).filter(|v| !v.is_null())
    }

    /// Whether `key` holds a non-null, non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_str(key).map(str::to_string)
    }

    /// Required string attribute.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.get_str(key).ok_or_else(|| {
            ProviderError::Validation(format!("attribute `{}` is required", key))
        })
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
    }

    /// String list (or set); non-string elements are skipped.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested block list as attribute maps.
    pub fn get_list(&self, key: &str) -> Vec<ResourceData> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_object().cloned())
                    .map(|attrs| ResourceData { attrs })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// Set only when `value` is present; leaves the attribute untouched otherwise.
    pub fn set_opt<T: Into<Value>>(&mut self, key: &str, value: Option<T>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn set_string_map(&mut self, key: &str, map: &BTreeMap<String, String>) {
        let obj: Map<String, Value> = map
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.attrs.insert(key.to_string(), Value::Object(obj));
    }

    pub fn set_list(&mut self, key: &str, items: Vec<ResourceData>) {
        let list = items.into_iter().map(ResourceData::into_value).collect();
        self.attrs.insert(key.to_string(), Value::Array(list));
    }

    fn non_empty(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key).filter(|v| !is_empty_value(v))
    }

    /// Whether `key` differs between `prior` and `self`. Null, absent and
    /// empty values are alike.
    pub fn has_change(&self, prior: &ResourceData, key: &str) -> bool {
        !same_value(prior.non_empty(key), self.non_empty(key), false)
    }

    /// Like [`has_change`](Self::has_change), ignoring element order.
    pub fn has_set_change(&self, prior: &ResourceData, key: &str) -> bool {
        !same_value(prior.non_empty(key), self.non_empty(key), true)
    }

    /// Whether any of `keys` changed.
    pub fn has_changes(&self, prior: &ResourceData, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(prior, k))
    }
}

/// `null`, `""`, `[]` and `{}`.
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(attrs) => attrs.is_empty(),
        _ => false,
    }
}

/// Compare two optional values; `unordered` compares arrays as multisets.
pub(crate) fn same_value(before: Option<&Value>, after: Option<&Value>, unordered: bool) -> bool {
    match (before, after) {
        (None, None) => true,
        (Some(Value::Array(a)), Some(Value::Array(b))) if unordered => {
            let mut a: Vec<String> = a.iter().map(Value::to_string).collect();
            let mut b: Vec<String> = b.iter().map(Value::to_string).collect();
            a.sort();
            b.sort();
            a == b
        },
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl From<Map<String, Value>> for ResourceData {
    fn from(attrs: Map<String, Value>) -> Self {
        Self { attrs }
    }
}
