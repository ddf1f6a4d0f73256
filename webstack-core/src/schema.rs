//! Schema - Define type schemas for resources
//!
//! Providers define a schema for each resource type so that every declared
//! resource can be type-checked before the stack is rendered.

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::resource::{Resource, Value};

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map with free-form keys (tags, environment variables)
    Map(Box<AttributeType>),
    /// Structured object whose keys follow provider naming
    Object,
    /// Packaged archive (function code)
    Archive,
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            // References are only known at apply time; any type may hold one
            (_, Value::ResourceRef(_, _)) => Ok(()),
            (_, Value::Secret(inner)) => self.validate(inner),

            (
                AttributeType::String,
                Value::String(_) | Value::Interpolation(_) | Value::Base64(_) | Value::Json(_),
            ) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),
            (AttributeType::Object, Value::Map(_)) => Ok(()),
            (AttributeType::Archive, Value::FileArchive(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                if v.is_resolved() {
                    validate(v).map_err(|message| TypeError::ValidationFailed { message })
                } else {
                    Ok(())
                }
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Object => "Object".to_string(),
            AttributeType::Archive => "Archive".to_string(),
        }
    }

    /// Whether keys inside values of this type are free-form (not provider names)
    pub fn has_free_form_keys(&self) -> bool {
        match self {
            AttributeType::Map(_) => true,
            AttributeType::Custom { base, .. } => base.has_free_form_keys(),
            _ => false,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Unknown resource type '{resource_type}'")]
    UnknownResourceType { resource_type: String },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
            Value::Interpolation(_) => "Interpolation".to_string(),
            Value::Base64(_) => "Base64".to_string(),
            Value::Json(_) => "Json".to_string(),
            Value::Secret(_) => "Secret".to_string(),
            Value::FileArchive(_) => "FileArchive".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Provider-side property name when it differs from the camelCase form
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            default: None,
            description: None,
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// Provider type token (e.g., "aws:ec2:Vpc")
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    /// Lookup function rather than a managed resource
    pub data_source: bool,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            data_source: false,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn data_source(mut self) -> Self {
        self.data_source = true;
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        let mut required: Vec<_> = self
            .attributes
            .values()
            .filter(|s| s.required && s.default.is_none())
            .map(|s| s.name.as_str())
            .collect();
        required.sort();
        for name in required {
            if !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired {
                    name: name.to_string(),
                });
            }
        }

        let mut names: Vec<_> = attributes.keys().collect();
        names.sort();
        for name in names {
            match self.attributes.get(name) {
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(&attributes[name]) {
                        errors.push(TypeError::AttributeError {
                            name: name.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Schemas for every resource type known to the loaded providers
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ResourceSchema) {
        self.schemas.insert(schema.resource_type.clone(), schema);
    }

    pub fn extend(&mut self, schemas: impl IntoIterator<Item = ResourceSchema>) {
        for schema in schemas {
            self.register(schema);
        }
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.schemas.get(resource_type)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate one resource against its schema
    pub fn validate_resource(&self, resource: &Resource) -> Result<(), Vec<TypeError>> {
        match self.get(&resource.id.resource_type) {
            Some(schema) => schema.validate(&resource.attributes),
            None => Err(vec![TypeError::UnknownResourceType {
                resource_type: resource.id.resource_type.clone(),
            }]),
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// IPv4 CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    /// IPv6 CIDR block type (e.g., "::/0")
    pub fn ipv6_cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Ipv6Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_ipv6_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }
}

/// Parse an IPv4 CIDR block (e.g., "10.0.0.0/16") into address and prefix
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8), String> {
    let (ip, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("Invalid CIDR format '{}': expected IP/prefix", cidr))?;

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }
    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }
    let addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| format!("Invalid IP address '{}'", ip))?;

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok((addr, p)),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    parse_cidr(cidr).map(|_| ())
}

/// Validate IPv6 CIDR block format (e.g., "2600:1f18::/56")
pub fn validate_ipv6_cidr(cidr: &str) -> Result<(), String> {
    let (ip, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("Invalid IPv6 CIDR format '{}': expected IP/prefix", cidr))?;
    ip.parse::<Ipv6Addr>()
        .map_err(|_| format!("Invalid IPv6 address '{}'", ip))?;
    match prefix.parse::<u8>() {
        Ok(p) if p <= 128 => Ok(()),
        _ => Err(format!(
            "Invalid prefix length '{}': must be 0-128",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::reference("vpc", "id")).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["a".to_string(), "b".to_string()]);
        assert!(t.validate(&Value::String("a".to_string())).is_ok());
        assert!(t.validate(&Value::String("c".to_string())).is_err());
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(100)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
    }

    #[test]
    fn secret_validates_inner_value() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::secret(Value::string("pw"))).is_ok());
        assert!(t.validate(&Value::secret(Value::Int(1))).is_err());
    }

    #[test]
    fn custom_type_skips_check_for_unresolved_values() {
        let t = types::cidr();
        assert!(t.validate(&Value::reference("vpc", "cidrBlock")).is_ok());
        assert!(t.validate(&Value::string("not-a-cidr")).is_err());
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", types::positive_int()))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool));

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("my-resource".to_string()));
        attrs.insert("count".to_string(), Value::Int(5));
        attrs.insert("enabled".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("bucket")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let attrs = HashMap::new();
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::MissingRequired { .. }));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let schema = ResourceSchema::new("bucket");
        let mut attrs = HashMap::new();
        attrs.insert("colour".to_string(), Value::string("red"));
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(&errors[0], TypeError::UnknownAttribute { name } if name == "colour"));
    }

    #[test]
    fn registry_reports_unknown_resource_type() {
        let registry = SchemaRegistry::new();
        let resource = Resource::new("aws:ec2:Nope", "x");
        let errors = registry.validate_resource(&resource).unwrap_err();
        assert!(matches!(errors[0], TypeError::UnknownResourceType { .. }));
    }

    #[test]
    fn map_type_has_free_form_keys() {
        assert!(AttributeType::Map(Box::new(AttributeType::String)).has_free_form_keys());
        assert!(!AttributeType::Object.has_free_form_keys());
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();

        // Valid CIDRs
        assert!(t.validate(&Value::string("10.0.0.0/16")).is_ok());
        assert!(t.validate(&Value::string("192.168.1.0/24")).is_ok());
        assert!(t.validate(&Value::string("0.0.0.0/0")).is_ok());
        assert!(t.validate(&Value::string("255.255.255.255/32")).is_ok());

        // Invalid CIDRs
        assert!(t.validate(&Value::string("10.0.0.0")).is_err()); // no prefix
        assert!(t.validate(&Value::string("10.0.0.0/33")).is_err()); // prefix too large
        assert!(t.validate(&Value::string("10.0.0.256/16")).is_err()); // octet > 255
        assert!(t.validate(&Value::string("10.0.0/16")).is_err()); // only 3 octets
        assert!(t.validate(&Value::string("invalid")).is_err()); // not a CIDR
        assert!(t.validate(&Value::Int(42)).is_err()); // wrong type
    }

    #[test]
    fn validate_ipv6_cidr_type() {
        let t = types::ipv6_cidr();
        assert!(t.validate(&Value::string("::/0")).is_ok());
        assert!(t.validate(&Value::string("2600:1f18:abcd::/56")).is_ok());
        assert!(t.validate(&Value::string("::/129")).is_err());
        assert!(t.validate(&Value::string("10.0.0.0/8")).is_err());
    }

    #[test]
    fn parse_cidr_returns_address_and_prefix() {
        let (addr, prefix) = parse_cidr("10.20.0.0/16").unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 20, 0, 0));
        assert_eq!(prefix, 16);
    }
}
