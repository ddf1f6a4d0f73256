//! Render - Turn a stack into a Pulumi YAML program document
//!
//! Attribute names are declared in snake_case and rendered in the
//! provider's lowerCamelCase form. References render as `${binding.attr}`;
//! deferred encodings render as the matching `fn::` builtins.

use heck::ToLowerCamelCase;
use serde_yaml::{Mapping, Value as Yaml};

use crate::resource::{Resource, Value};
use crate::schema::SchemaRegistry;
use crate::stack::Stack;

/// Placeholder for secrets when they are hidden
pub const REDACTED: &str = "[secret]";

/// Error type for rendering
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Dependency cycle between resources")]
    Cycle,

    #[error("Cannot interpolate {kind} value in '{context}'")]
    Interpolation { kind: &'static str, context: String },

    #[error("Failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    fn interpolation(kind: &'static str) -> Self {
        RenderError::Interpolation {
            kind,
            context: String::new(),
        }
    }

    /// Name the attribute or output being rendered, keeping the innermost one
    fn within(self, context: &str) -> Self {
        match self {
            RenderError::Interpolation { kind, context: c } if c.is_empty() => {
                RenderError::Interpolation {
                    kind,
                    context: context.to_string(),
                }
            }
            other => other,
        }
    }
}

/// Rendering options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Render secret values instead of the redaction placeholder
    pub show_secrets: bool,
}

/// A rendered program document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Yaml,
}

impl Document {
    pub fn as_yaml(&self) -> &Yaml {
        &self.root
    }

    pub fn to_yaml(&self) -> Result<String, RenderError> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    pub fn to_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    /// Look up a top-level section ("resources", "variables", "outputs")
    pub fn section(&self, name: &str) -> Option<&Mapping> {
        self.root.get(name).and_then(Yaml::as_mapping)
    }
}

/// Render a stack into a program document
pub fn render(
    stack: &Stack,
    schemas: &SchemaRegistry,
    options: RenderOptions,
) -> Result<Document, RenderError> {
    let renderer = Renderer { schemas, options };
    let order = stack
        .dependency_graph()
        .creation_order()
        .ok_or(RenderError::Cycle)?;

    let mut variables = Mapping::new();
    let mut resources = Mapping::new();
    for name in &order {
        let Some(resource) = stack.get(name) else {
            continue;
        };
        if resource.is_data_source() {
            variables.insert(name.as_str().into(), renderer.invoke(resource)?);
        } else {
            resources.insert(name.as_str().into(), renderer.resource(resource)?);
        }
    }

    let mut outputs = Mapping::new();
    for output in stack.outputs() {
        outputs.insert(
            output.name.as_str().into(),
            renderer
                .value(&output.value, false)
                .map_err(|e| e.within(&output.name))?,
        );
    }

    let mut root = Mapping::new();
    root.insert("name".into(), stack.project().into());
    root.insert("runtime".into(), "yaml".into());
    root.insert(
        "description".into(),
        format!("{} stack {}", stack.project(), stack.name()).into(),
    );
    if !variables.is_empty() {
        root.insert("variables".into(), Yaml::Mapping(variables));
    }
    root.insert("resources".into(), Yaml::Mapping(resources));
    if !outputs.is_empty() {
        root.insert("outputs".into(), Yaml::Mapping(outputs));
    }

    Ok(Document {
        root: Yaml::Mapping(root),
    })
}

/// Provider property name for a snake_case attribute.
///
/// Keys that are not plain snake_case (e.g. `Name`, `DB_HOST`) are kept.
pub fn provider_key(key: &str) -> String {
    let is_snake = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if is_snake {
        key.to_lower_camel_case()
    } else {
        key.to_string()
    }
}

/// Escape a literal so it is not read as an interpolation
fn escape_literal(s: &str) -> String {
    s.replace("${", "$${")
}

struct Renderer<'a> {
    schemas: &'a SchemaRegistry,
    options: RenderOptions,
}

impl Renderer<'_> {
    fn resource(&self, resource: &Resource) -> Result<Yaml, RenderError> {
        let mut out = Mapping::new();
        out.insert("type".into(), resource.id.resource_type.as_str().into());
        let properties = self.properties(resource)?;
        if !properties.is_empty() {
            out.insert("properties".into(), Yaml::Mapping(properties));
        }
        if !resource.depends_on.is_empty() {
            let deps = resource
                .depends_on
                .iter()
                .map(|d| Yaml::String(format!("${{{}}}", d)))
                .collect();
            let mut options = Mapping::new();
            options.insert("dependsOn".into(), Yaml::Sequence(deps));
            out.insert("options".into(), Yaml::Mapping(options));
        }
        Ok(Yaml::Mapping(out))
    }

    fn invoke(&self, resource: &Resource) -> Result<Yaml, RenderError> {
        let mut call = Mapping::new();
        call.insert("function".into(), resource.id.resource_type.as_str().into());
        let arguments = self.properties(resource)?;
        if !arguments.is_empty() {
            call.insert("arguments".into(), Yaml::Mapping(arguments));
        }
        let mut out = Mapping::new();
        out.insert("fn::invoke".into(), Yaml::Mapping(call));
        Ok(Yaml::Mapping(out))
    }

    fn properties(&self, resource: &Resource) -> Result<Mapping, RenderError> {
        let schema = self.schemas.get(&resource.id.resource_type);
        let mut keys: Vec<_> = resource.attributes.keys().collect();
        keys.sort();

        let mut properties = Mapping::new();
        for key in keys {
            let attr_schema = schema.and_then(|s| s.attributes.get(key));
            let name = attr_schema
                .and_then(|a| a.provider_name.clone())
                .unwrap_or_else(|| provider_key(key));
            let free_form = attr_schema.is_some_and(|a| a.attr_type.has_free_form_keys());
            let value = self
                .value(&resource.attributes[key], free_form)
                .map_err(|e| e.within(&format!("{}.{}", resource.id, key)))?;
            properties.insert(name.into(), value);
        }
        Ok(properties)
    }

    fn value(&self, value: &Value, free_form: bool) -> Result<Yaml, RenderError> {
        let yaml = match value {
            Value::String(s) => Yaml::String(escape_literal(s)),
            Value::Int(n) => Yaml::Number((*n).into()),
            Value::Bool(b) => Yaml::Bool(*b),
            Value::List(items) => Yaml::Sequence(
                items
                    .iter()
                    .map(|v| self.value(v, free_form))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                let mut out = Mapping::new();
                for key in keys {
                    let name = if free_form {
                        key.clone()
                    } else {
                        provider_key(key)
                    };
                    out.insert(name.into(), self.value(&map[key], free_form)?);
                }
                Yaml::Mapping(out)
            }
            Value::ResourceRef(binding, attr) => {
                Yaml::String(format!("${{{}.{}}}", binding, attr))
            }
            Value::Interpolation(parts) => {
                let text = self.interpolation_text(parts)?;
                if value.contains_secret() && self.options.show_secrets {
                    self.builtin("fn::secret", Yaml::String(text))
                } else {
                    Yaml::String(text)
                }
            }
            Value::Base64(inner) => self.builtin("fn::toBase64", self.value(inner, free_form)?),
            Value::Json(inner) => self.builtin("fn::toJSON", self.value(inner, true)?),
            Value::Secret(inner) => {
                if self.options.show_secrets {
                    self.builtin("fn::secret", self.value(inner, free_form)?)
                } else {
                    Yaml::String(REDACTED.to_string())
                }
            }
            Value::FileArchive(path) => self.builtin("fn::fileArchive", path.as_str().into()),
        };
        Ok(yaml)
    }

    /// Interpolated text; only scalars, references and secrets can be spliced
    fn interpolation_text(&self, parts: &[Value]) -> Result<String, RenderError> {
        let mut text = String::new();
        for part in parts {
            match part {
                Value::String(s) => text.push_str(&escape_literal(s)),
                Value::Int(n) => text.push_str(&n.to_string()),
                Value::Bool(b) => text.push_str(&b.to_string()),
                Value::ResourceRef(binding, attr) => {
                    text.push_str(&format!("${{{}.{}}}", binding, attr))
                }
                Value::Interpolation(inner) => text.push_str(&self.interpolation_text(inner)?),
                Value::Secret(inner) => {
                    if self.options.show_secrets {
                        text.push_str(
                            &self.interpolation_text(std::slice::from_ref(inner.as_ref()))?,
                        )
                    } else {
                        text.push_str(REDACTED)
                    }
                }
                Value::List(_) => return Err(RenderError::interpolation("list")),
                Value::Map(_) => return Err(RenderError::interpolation("map")),
                Value::Base64(_) => return Err(RenderError::interpolation("base64")),
                Value::Json(_) => return Err(RenderError::interpolation("JSON")),
                Value::FileArchive(_) => return Err(RenderError::interpolation("file archive")),
            }
        }
        Ok(text)
    }

    fn builtin(&self, name: &str, argument: Yaml) -> Yaml {
        let mut out = Mapping::new();
        out.insert(name.into(), argument);
        Yaml::Mapping(out)
    }
}
