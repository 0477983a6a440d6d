//! Positional option slots and the values bound to them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// How a raw token is turned into an option value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// The token is passed through as a string.
    #[default]
    Default,
    /// The token is parsed as a number.
    Number,
}

/// One positional option slot of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSpec {
    /// Key under which the bound value is exposed to the action.
    pub name: String,

    /// Whether the action supplies its own default when the token is missing.
    #[serde(default)]
    pub has_default_value: bool,

    /// Coercion applied to the token.
    #[serde(default, rename = "type")]
    pub kind: OptionKind,
}

impl OptionSpec {
    /// Create a required string option.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_default_value: false,
            kind: OptionKind::Default,
        }
    }

    /// Tolerate a missing token for this option.
    pub fn with_default(mut self) -> Self {
        self.has_default_value = true;
        self
    }

    /// Parse the token as a number.
    pub fn number(mut self) -> Self {
        self.kind = OptionKind::Number;
        self
    }
}

/// Coerce a raw token according to the option kind.
///
/// Returns `None` when a numeric option receives something that is not a
/// finite number.
pub fn coerce(kind: OptionKind, token: &str) -> Option<Value> {
    match kind {
        OptionKind::Default => Some(Value::String(token.to_string())),
        OptionKind::Number => {
            let trimmed = token.trim();
            if let Ok(integer) = trimmed.parse::<i64>() {
                return Some(Value::from(integer));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
    }
}

/// Option values bound for one invocation, keyed by option name.
///
/// Options declared with a default value and not provided are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Create an empty option bag.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Get a bound value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get a bound value as a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Get a bound value as a float.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Get a bound value as an integer.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Check whether a value was bound for this option.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of bound options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no option was bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the bound options, in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The bound options as a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_default_passes_through() {
        assert_eq!(coerce(OptionKind::Default, "42"), Some(json!("42")));
        assert_eq!(coerce(OptionKind::Default, ""), Some(json!("")));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce(OptionKind::Number, "42"), Some(json!(42)));
        assert_eq!(coerce(OptionKind::Number, "-3"), Some(json!(-3)));
        assert_eq!(coerce(OptionKind::Number, "2.5"), Some(json!(2.5)));
        assert_eq!(coerce(OptionKind::Number, " 7 "), Some(json!(7)));
    }

    #[test]
    fn test_coerce_number_rejects_garbage() {
        assert_eq!(coerce(OptionKind::Number, "abc"), None);
        assert_eq!(coerce(OptionKind::Number, "NaN"), None);
        assert_eq!(coerce(OptionKind::Number, "inf"), None);
        assert_eq!(coerce(OptionKind::Number, ""), None);
    }

    #[test]
    fn test_option_spec_deserialize() {
        let spec: OptionSpec =
            serde_json::from_value(json!({"name": "count", "hasDefaultValue": true, "type": "number"}))
                .unwrap();
        assert_eq!(spec, OptionSpec::new("count").with_default().number());

        let spec: OptionSpec = serde_json::from_value(json!({"name": "path"})).unwrap();
        assert!(!spec.has_default_value);
        assert_eq!(spec.kind, OptionKind::Default);
    }

    #[test]
    fn test_options_accessors() {
        let mut options = Options::new();
        options.insert("name", json!("quire"));
        options.insert("count", json!(3));

        assert_eq!(options.get_str("name"), Some("quire"));
        assert_eq!(options.get_i64("count"), Some(3));
        assert_eq!(options.get_f64("count"), Some(3.0));
        assert!(!options.contains("missing"));
        assert_eq!(options.len(), 2);
        assert_eq!(options.into_value(), json!({"name": "quire", "count": 3}));
    }

    #[test]
    fn test_options_keep_insertion_order() {
        let mut options = Options::new();
        options.insert("zeta", json!(1));
        options.insert("alpha", json!(2));

        let names: Vec<&str> = options.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
