//! Database - Managed relational database in the private subnets

use webstack_core::resource::{Resource, Value};
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::settings::DatabaseSettings;

/// Declared data tier
#[derive(Debug, Clone)]
pub struct Database {
    pub parameter_group: Binding,
    pub subnet_group: Binding,
    pub instance: Binding,
}

impl Database {
    /// Host name the application connects to
    pub fn address(&self) -> Value {
        self.instance.attr("address")
    }
}

pub fn build(
    stack: &mut Stack,
    settings: &DatabaseSettings,
    private_subnets: &[Binding],
    security_group: &Binding,
) -> Result<Database, DeployError> {
    let parameter_group = stack.declare(
        Resource::new("aws:rds:ParameterGroup", "db-parameter-group")
            .with_attribute("family", settings.family.as_str())
            .with_attribute("description", format!("{} parameters", settings.family))
            .with_name_tag("db-parameter-group"),
    )?;

    let subnet_group = stack.declare(
        Resource::new("aws:rds:SubnetGroup", "db-subnet-group")
            .with_attribute(
                "subnet_ids",
                Value::List(private_subnets.iter().map(Binding::id).collect()),
            )
            .with_attribute("description", "Private subnets of the database")
            .with_name_tag("db-subnet-group"),
    )?;

    let instance = stack.declare(
        Resource::new("aws:rds:Instance", "database")
            .with_attribute("identifier", settings.name.as_str())
            .with_attribute("engine", settings.engine.as_str())
            .with_optional_attribute(
                "engine_version",
                settings.engine_version.as_deref().map(Value::string),
            )
            .with_attribute("instance_class", settings.instance_class.as_str())
            .with_attribute("allocated_storage", settings.allocated_storage)
            .with_attribute("db_name", settings.name.as_str())
            .with_attribute("username", settings.username.as_str())
            .with_attribute(
                "password",
                Value::secret(Value::string(settings.password.as_str())),
            )
            .with_attribute("port", i64::from(settings.port))
            .with_attribute("db_subnet_group_name", subnet_group.name_attr())
            .with_attribute("parameter_group_name", parameter_group.name_attr())
            .with_attribute(
                "vpc_security_group_ids",
                Value::List(vec![security_group.id()]),
            )
            .with_attribute("publicly_accessible", false)
            .with_attribute("multi_az", false)
            .with_attribute("skip_final_snapshot", true)
            .with_name_tag("database"),
    )?;

    log::info!(
        "database: {} on {} ({} subnet(s))",
        settings.engine,
        settings.instance_class,
        private_subnets.len()
    );

    Ok(Database {
        parameter_group,
        subnet_group,
        instance,
    })
}
