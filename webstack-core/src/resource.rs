//! Resource - Declared resources and the values of their attributes

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Provider type token (e.g., "aws:ec2:Vpc", "gcp:storage:Bucket")
    pub resource_type: String,
    /// Logical name, also used as the binding name in references
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Provider prefix of the type token ("aws" for "aws:ec2:Vpc")
    pub fn provider(&self) -> &str {
        self.resource_type
            .split(':')
            .next()
            .unwrap_or(&self.resource_type)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding_name, attribute_path).
    /// The path may index into lists, e.g. `names[0]`.
    ResourceRef(String, String),
    /// String concatenation resolved by the apply engine
    Interpolation(Vec<Value>),
    /// Base64 encoding of a string that is only known at apply time
    Base64(Box<Value>),
    /// JSON serialisation of a structure that is only known at apply time
    Json(Box<Value>),
    /// Sensitive value, redacted in previews
    Secret(Box<Value>),
    /// Path to a packaged archive (function code)
    FileArchive(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// List of string literals
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    pub fn reference(binding: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::ResourceRef(binding.into(), attribute.into())
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Concatenate parts into one string value.
    ///
    /// Adjacent literals are merged; a concatenation of literals collapses to
    /// a plain `Value::String`.
    pub fn interpolate(parts: Vec<Value>) -> Self {
        let mut merged: Vec<Value> = Vec::new();
        for part in parts {
            let part = match part {
                Value::Interpolation(inner) => {
                    merged.extend(inner);
                    continue;
                }
                Value::Int(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => other,
            };
            if let Value::String(s) = &part {
                if s.is_empty() {
                    continue;
                }
                if let Some(Value::String(prev)) = merged.last_mut() {
                    prev.push_str(s);
                    continue;
                }
            }
            merged.push(part);
        }

        match merged.len() {
            0 => Value::String(String::new()),
            1 if matches!(merged[0], Value::String(_)) => merged.remove(0),
            _ => Value::Interpolation(merged),
        }
    }

    /// Base64-encode a value. Literal strings are encoded immediately.
    pub fn base64(inner: Value) -> Self {
        match inner {
            Value::String(s) => Value::String(STANDARD.encode(s.as_bytes())),
            other => Value::Base64(Box::new(other)),
        }
    }

    /// Serialise a structure to a JSON string. Structures without
    /// references are serialised immediately.
    pub fn json(inner: Value) -> Self {
        match inner.to_literal_json() {
            Some(json) => Value::String(json.to_string()),
            None => Value::Json(Box::new(inner)),
        }
    }

    pub fn secret(inner: Value) -> Self {
        match inner {
            Value::Secret(_) => inner,
            other => Value::Secret(Box::new(other)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// All (binding, attribute) pairs referenced from this value
    pub fn references(&self) -> Vec<(String, String)> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references(&self, refs: &mut Vec<(String, String)>) {
        match self {
            Value::ResourceRef(binding, attr) => refs.push((binding.clone(), attr.clone())),
            Value::List(items) | Value::Interpolation(items) => {
                for item in items {
                    item.collect_references(refs);
                }
            }
            Value::Map(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                for key in keys {
                    map[key].collect_references(refs);
                }
            }
            Value::Base64(inner) | Value::Json(inner) | Value::Secret(inner) => {
                inner.collect_references(refs)
            }
            Value::String(_) | Value::Int(_) | Value::Bool(_) | Value::FileArchive(_) => {}
        }
    }

    /// Whether the value is fully known before apply (no references)
    pub fn is_resolved(&self) -> bool {
        self.references().is_empty()
    }

    pub fn contains_secret(&self) -> bool {
        match self {
            Value::Secret(_) => true,
            Value::List(items) | Value::Interpolation(items) => {
                items.iter().any(Value::contains_secret)
            }
            Value::Map(map) => map.values().any(Value::contains_secret),
            Value::Base64(inner) | Value::Json(inner) => inner.contains_secret(),
            _ => false,
        }
    }

    /// Convert to plain JSON when the value holds literals only
    pub fn to_literal_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::String(s) => Some(serde_json::Value::String(s.clone())),
            Value::Int(n) => Some(serde_json::Value::from(*n)),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::List(items) => items
                .iter()
                .map(Value::to_literal_json)
                .collect::<Option<Vec<_>>>()
                .map(serde_json::Value::Array),
            Value::Map(map) => {
                let mut object = serde_json::Map::new();
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                for key in keys {
                    object.insert(key.clone(), map[key].to_literal_json()?);
                }
                Some(serde_json::Value::Object(object))
            }
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Desired state of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// Bindings this resource must be created after, beyond its references
    pub depends_on: Vec<String>,
    /// If true, this is a data source (lookup) that is never created
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            depends_on: Vec::new(),
            read_only: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the attribute only when a value is present
    pub fn with_optional_attribute(self, key: impl Into<String>, value: Option<Value>) -> Self {
        match value {
            Some(v) => self.with_attribute(key, v),
            None => self,
        }
    }

    /// Tag the resource with a `Name` tag
    pub fn with_name_tag(self, name: impl Into<String>) -> Self {
        self.with_attribute("tags", Value::map([("Name", Value::String(name.into()))]))
    }

    pub fn with_depends_on(mut self, binding: impl Into<String>) -> Self {
        self.depends_on.push(binding.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }

    pub fn binding(&self) -> &str {
        &self.id.name
    }

    /// All references made by attributes, in attribute-name order
    pub fn references(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.attributes.keys().collect();
        keys.sort();
        keys.into_iter()
            .flat_map(|k| self.attributes[k].references())
            .collect()
    }

    /// Bindings this resource depends on, through references or `depends_on`
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.references()
            .into_iter()
            .map(|(binding, _)| binding)
            .chain(self.depends_on.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_provider_prefix() {
        let id = ResourceId::new("aws:ec2:Vpc", "main");
        assert_eq!(id.provider(), "aws");
        assert_eq!(id.to_string(), "aws:ec2:Vpc.main");
    }

    #[test]
    fn interpolate_merges_adjacent_literals() {
        let value = Value::interpolate(vec![
            Value::string("host="),
            Value::reference("db", "address"),
            Value::string(":"),
            Value::Int(3306),
            Value::string("/app"),
        ]);
        assert_eq!(
            value,
            Value::Interpolation(vec![
                Value::string("host="),
                Value::reference("db", "address"),
                Value::string(":3306/app"),
            ])
        );
    }

    #[test]
    fn interpolate_of_literals_collapses() {
        let value = Value::interpolate(vec![Value::string("a"), Value::string("b")]);
        assert_eq!(value, Value::string("ab"));
    }

    #[test]
    fn base64_encodes_literals_eagerly() {
        assert_eq!(Value::base64(Value::string("hello")), Value::string("aGVsbG8="));
        let deferred = Value::base64(Value::interpolate(vec![
            Value::string("x="),
            Value::reference("topic", "arn"),
        ]));
        assert!(matches!(deferred, Value::Base64(_)));
    }

    #[test]
    fn json_serialises_literals_eagerly() {
        let value = Value::json(Value::map([("Version", Value::string("2012-10-17"))]));
        assert_eq!(value, Value::string(r#"{"Version":"2012-10-17"}"#));

        let deferred = Value::json(Value::map([("Resource", Value::reference("table", "arn"))]));
        assert!(matches!(deferred, Value::Json(_)));
    }

    #[test]
    fn references_are_collected_from_nested_values() {
        let value = Value::map([
            (
                "a",
                Value::List(vec![Value::reference("vpc", "id"), Value::string("x")]),
            ),
            ("b", Value::secret(Value::reference("key", "privateKey"))),
        ]);
        assert_eq!(
            value.references(),
            vec![
                ("vpc".to_string(), "id".to_string()),
                ("key".to_string(), "privateKey".to_string()),
            ]
        );
        assert!(value.contains_secret());
        assert!(!value.is_resolved());
    }

    #[test]
    fn dependencies_include_depends_on() {
        let resource = Resource::new("aws:ec2:Route", "public")
            .with_attribute("gateway_id", Value::reference("igw", "id"))
            .with_depends_on("vpc");
        let deps: Vec<_> = resource.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["igw".to_string(), "vpc".to_string()]);
    }

    #[test]
    fn name_tag_sets_tags_map() {
        let resource = Resource::new("aws:ec2:Vpc", "main").with_name_tag("main-vpc");
        assert_eq!(
            resource.attributes.get("tags"),
            Some(&Value::map([("Name", Value::string("main-vpc"))]))
        );
    }
}
