//! Bootstrap - First-boot user data for the web tier
//!
//! The script writes the application's `.env` file, locks it down to the
//! application user and starts the CloudWatch agent. Values that are only
//! known at apply time (database address, topic ARN) stay references inside
//! the script and are resolved by the apply engine.

use webstack_core::render::REDACTED;
use webstack_core::resource::Value;
use webstack_core::stack::Binding;

use crate::settings::DeploySettings;

/// Error type for bootstrap script assembly
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BootstrapError {
    #[error("Value of {key} contains a line break")]
    LineBreak { key: String },

    #[error("Invalid environment variable name '{key}'")]
    InvalidKey { key: String },

    #[error("{key} is set more than once")]
    DuplicateKey { key: String },

    #[error("Value of {key} is not a scalar and cannot be written to the env file")]
    NotScalar { key: String },
}

const CLOUDWATCH_AGENT_CTL: &str = "/opt/aws/amazon-cloudwatch-agent/bin/amazon-cloudwatch-agent-ctl";

/// The first-boot script and the environment it writes
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapScript {
    env_file_path: String,
    app_user: String,
    cloudwatch_config_path: String,
    entries: Vec<(String, Value)>,
}

impl BootstrapScript {
    pub fn new(
        env_file_path: impl Into<String>,
        app_user: impl Into<String>,
        cloudwatch_config_path: impl Into<String>,
    ) -> Self {
        Self {
            env_file_path: env_file_path.into(),
            app_user: app_user.into(),
            cloudwatch_config_path: cloudwatch_config_path.into(),
            entries: Vec::new(),
        }
    }

    /// Script for the web tier; database and topic keys are written only
    /// when those tiers are deployed
    pub fn for_deployment(
        settings: &DeploySettings,
        database: Option<&Binding>,
        topic: Option<&Binding>,
    ) -> Result<Self, BootstrapError> {
        let b = &settings.bootstrap;
        let mut script = Self::new(
            b.env_file_path.as_str(),
            b.app_user.as_str(),
            b.cloudwatch_agent_config_path.as_str(),
        );
        for path in [&b.env_file_path, &b.app_user, &b.cloudwatch_agent_config_path] {
            reject_line_breaks("bootstrap path", path)?;
        }

        if let (Some(db), Some(instance)) = (&settings.database, database) {
            script.set("DB_USER", Value::string(db.username.as_str()))?;
            script.set("DB_PASSWORD", Value::secret(Value::string(db.password.as_str())))?;
            script.set("DB_HOST", instance.attr("address"))?;
            script.set("DB_DIALECT", Value::string(db.dialect.as_str()))?;
            script.set("DB_NAME", Value::string(db.name.as_str()))?;
        }
        script.set("USERS_CSV_PATH", Value::string(b.users_csv_path.as_str()))?;
        script.set("STATSD_HOST", Value::string(b.statsd_host.as_str()))?;
        script.set("STATSD_PORT", Value::Int(i64::from(b.statsd_port)))?;
        if let Some(topic) = topic {
            script.set("SNS_TOPIC_ARN", topic.arn())?;
        }
        script.set("AWS_REGION", Value::string(settings.region.as_str()))?;
        script.set("LOGS_FILE_PATH", Value::string(b.logs_file_path.as_str()))?;
        Ok(script)
    }

    /// Add one `.env` entry
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), BootstrapError> {
        let valid_key = key
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
            && key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !valid_key {
            return Err(BootstrapError::InvalidKey {
                key: key.to_string(),
            });
        }
        if self.entries.iter().any(|(k, _)| k == key) {
            return Err(BootstrapError::DuplicateKey {
                key: key.to_string(),
            });
        }
        check_value(key, &value)?;
        self.entries.push((key.to_string(), value));
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// One `KEY="value"` line per entry, quotes and backslashes escaped
    pub fn env_lines(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(key, value)| {
                Value::interpolate(vec![
                    Value::string(format!("{}=\"", key)),
                    escape(value),
                    Value::string("\""),
                ])
            })
            .collect()
    }

    /// The whole script as one string value
    pub fn render(&self) -> Value {
        let env = &self.env_file_path;
        let user = &self.app_user;
        let mut parts = vec![Value::string(format!(
            "#!/bin/bash\nset -euo pipefail\nmkdir -p \"$(dirname {env})\"\ncat > {env} <<'ENVFILE'\n"
        ))];
        for line in self.env_lines() {
            parts.push(line);
            parts.push(Value::string("\n"));
        }
        parts.push(Value::string(format!(
            "ENVFILE\nchown {user}:{user} {env}\nchmod 600 {env}\n{CLOUDWATCH_AGENT_CTL} -a fetch-config -m ec2 -c file:{} -s\n",
            self.cloudwatch_config_path
        )));
        Value::interpolate(parts)
    }

    /// Base64 user data for an instance or launch template
    pub fn user_data(&self) -> Value {
        Value::base64(self.render())
    }

    /// Plain-text script, references shown as `${binding.attr}`
    pub fn preview(&self, show_secrets: bool) -> String {
        let mut out = String::new();
        write_text(&mut out, &self.render(), show_secrets);
        out
    }
}

fn reject_line_breaks(key: &str, s: &str) -> Result<(), BootstrapError> {
    if s.contains('\n') || s.contains('\r') {
        Err(BootstrapError::LineBreak {
            key: key.to_string(),
        })
    } else {
        Ok(())
    }
}

fn check_value(key: &str, value: &Value) -> Result<(), BootstrapError> {
    match value {
        Value::String(s) => reject_line_breaks(key, s),
        Value::Interpolation(parts) => parts.iter().try_for_each(|p| check_value(key, p)),
        Value::Secret(inner) => check_value(key, inner),
        Value::Int(_) | Value::Bool(_) | Value::ResourceRef(..) => Ok(()),
        Value::List(_) | Value::Map(_) | Value::Base64(_) | Value::Json(_) | Value::FileArchive(_) => {
            Err(BootstrapError::NotScalar {
                key: key.to_string(),
            })
        }
    }
}

/// Escape `\` and `"` in the literal parts of a value
fn escape(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Interpolation(parts) => Value::Interpolation(parts.iter().map(escape).collect()),
        Value::Secret(inner) => Value::secret(escape(inner)),
        other => other.clone(),
    }
}

fn write_text(out: &mut String, value: &Value, show_secrets: bool) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(&b.to_string()),
        Value::ResourceRef(binding, attr) => out.push_str(&format!("${{{}.{}}}", binding, attr)),
        Value::Interpolation(parts) => {
            for part in parts {
                write_text(out, part, show_secrets);
            }
        }
        Value::Secret(inner) if show_secrets => write_text(out, inner, show_secrets),
        Value::Secret(_) => out.push_str(REDACTED),
        // Rejected by `set`
        Value::List(_) | Value::Map(_) | Value::Base64(_) | Value::Json(_) | Value::FileArchive(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::full_config;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use webstack_core::resource::Resource;
    use webstack_core::stack::Stack;

    const ALL_KEYS: [&str; 11] = [
        "DB_USER",
        "DB_PASSWORD",
        "DB_HOST",
        "DB_DIALECT",
        "DB_NAME",
        "USERS_CSV_PATH",
        "STATSD_HOST",
        "STATSD_PORT",
        "SNS_TOPIC_ARN",
        "AWS_REGION",
        "LOGS_FILE_PATH",
    ];

    fn full_script() -> BootstrapScript {
        let settings = DeploySettings::from_config(&full_config()).unwrap();
        let mut stack = Stack::new("webapp", "dev");
        let db = stack.declare(Resource::new("aws:rds:Instance", "database")).unwrap();
        let topic = stack.declare(Resource::new("aws:sns:Topic", "submissions")).unwrap();
        BootstrapScript::for_deployment(&settings, Some(&db), Some(&topic)).unwrap()
    }

    /// Value part of a `KEY="value"` line
    fn line_value<'a>(text: &'a str, key: &str) -> Vec<&'a str> {
        text.lines()
            .filter_map(|line| line.strip_prefix(&format!("{}=", key)))
            .collect()
    }

    #[test]
    fn one_line_per_key() {
        let text = full_script().preview(true);
        for key in ALL_KEYS {
            assert_eq!(line_value(&text, key).len(), 1, "{}", key);
        }
        let env_lines = text
            .lines()
            .filter(|l| l.split_once('=').is_some_and(|(k, _)| ALL_KEYS.contains(&k)))
            .count();
        assert_eq!(env_lines, ALL_KEYS.len());
    }

    #[test]
    fn quotes_are_escaped() {
        let text = full_script().preview(true);
        for key in ALL_KEYS {
            let value = line_value(&text, key)[0];
            let inner = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or_else(|| panic!("{} is not quoted: {}", key, value));
            let bytes = inner.as_bytes();
            for (i, &b) in bytes.iter().enumerate() {
                if b == b'"' {
                    assert!(i > 0 && bytes[i - 1] == b'\\', "unescaped quote in {}", key);
                }
            }
        }
        assert_eq!(line_value(&text, "DB_PASSWORD"), vec![r#""s3cr\"et""#]);
    }

    #[test]
    fn references_and_secrets_in_preview() {
        let script = full_script();
        let hidden = script.preview(false);
        assert!(hidden.contains("DB_HOST=\"${database.address}\""));
        assert!(hidden.contains("SNS_TOPIC_ARN=\"${submissions.arn}\""));
        assert!(hidden.contains("DB_PASSWORD=\"[secret]\""));
        assert!(!hidden.contains("s3cr"));
    }

    #[test]
    fn script_locks_down_env_file_and_starts_agent() {
        let text = full_script().preview(false);
        assert!(text.starts_with("#!/bin/bash\n"));
        assert!(text.contains("chown webapp:webapp /opt/webapp/.env\n"));
        assert!(text.contains("chmod 600 /opt/webapp/.env\n"));
        assert!(text.contains("-c file:/opt/cloudwatch-config.json"));
        let chown = text.find("chown").unwrap();
        let env_write = text.find("cat > /opt/webapp/.env").unwrap();
        assert!(env_write < chown);
    }

    #[test]
    fn disabled_tiers_omit_their_keys() {
        let config = full_config()
            .with("enableDatabase", "false")
            .with("enableNotifications", "false");
        let settings = DeploySettings::from_config(&config).unwrap();
        let script = BootstrapScript::for_deployment(&settings, None, None).unwrap();
        let keys: Vec<_> = script.keys().collect();
        assert_eq!(
            keys,
            vec![
                "USERS_CSV_PATH",
                "STATSD_HOST",
                "STATSD_PORT",
                "AWS_REGION",
                "LOGS_FILE_PATH"
            ]
        );
    }

    #[test]
    fn literal_script_is_encoded_eagerly() {
        let config = full_config()
            .with("enableDatabase", "false")
            .with("enableNotifications", "false");
        let settings = DeploySettings::from_config(&config).unwrap();
        let script = BootstrapScript::for_deployment(&settings, None, None).unwrap();
        let Value::String(encoded) = script.user_data() else {
            panic!("expected literal user data");
        };
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, script.preview(false));
        assert!(matches!(full_script().user_data(), Value::Base64(_)));
    }

    #[test]
    fn line_breaks_and_bad_keys_are_rejected() {
        let mut script = BootstrapScript::new("/opt/webapp/.env", "webapp", "/opt/cw.json");
        assert_eq!(
            script.set("DB_NAME", Value::string("a\nb")),
            Err(BootstrapError::LineBreak {
                key: "DB_NAME".to_string()
            })
        );
        assert!(matches!(
            script.set("db-name", Value::string("x")),
            Err(BootstrapError::InvalidKey { .. })
        ));
        script.set("DB_NAME", Value::string("x")).unwrap();
        assert!(matches!(
            script.set("DB_NAME", Value::string("y")),
            Err(BootstrapError::DuplicateKey { .. })
        ));
        assert_eq!(
            script.set("ZONES", Value::strings(["a", "b"])),
            Err(BootstrapError::NotScalar {
                key: "ZONES".to_string()
            })
        );
        assert!(matches!(
            script.set("DB_HOST", Value::secret(Value::Json(Box::new(Value::Int(1))))),
            Err(BootstrapError::NotScalar { .. })
        ));
    }
}
