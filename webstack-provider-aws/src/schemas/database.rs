//! RDS resource schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

/// Engines the data tier supports
pub fn engine() -> AttributeType {
    AttributeType::Enum(vec![
        "mysql".to_string(),
        "mariadb".to_string(),
        "postgres".to_string(),
    ])
}

pub fn parameter_group_schema() -> ResourceSchema {
    ResourceSchema::new("aws:rds:ParameterGroup")
        .with_description("A DB parameter group")
        .attribute(
            AttributeSchema::new("family", AttributeType::String)
                .required()
                .with_description("The parameter group family (e.g., mysql8.0, postgres15)"),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("parameters", aws_types::object_list())
                .with_description("Parameters as { name, value, applyMethod } blocks"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn subnet_group_schema() -> ResourceSchema {
    ResourceSchema::new("aws:rds:SubnetGroup")
        .with_description("A DB subnet group")
        .attribute(
            AttributeSchema::new("subnet_ids", aws_types::string_list())
                .required()
                .with_description("Subnets the database may be placed in"),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn instance_schema() -> ResourceSchema {
    ResourceSchema::new("aws:rds:Instance")
        .with_description("A managed database instance")
        .attribute(
            AttributeSchema::new("engine", engine())
                .required()
                .with_description("Database engine"),
        )
        .attribute(AttributeSchema::new("engine_version", AttributeType::String))
        .attribute(
            AttributeSchema::new("instance_class", AttributeType::String)
                .required()
                .with_description("Instance class (e.g., db.t3.micro)"),
        )
        .attribute(
            AttributeSchema::new("allocated_storage", types::positive_int())
                .with_description("Allocated storage in GiB"),
        )
        .attribute(
            AttributeSchema::new("identifier", AttributeType::String)
                .with_description("Name of the RDS instance"),
        )
        .attribute(
            AttributeSchema::new("db_name", AttributeType::String)
                .with_description("Name of the database created with the instance"),
        )
        .attribute(AttributeSchema::new("username", AttributeType::String).required())
        .attribute(AttributeSchema::new("password", AttributeType::String).required())
        .attribute(AttributeSchema::new("port", aws_types::port_number()))
        .attribute(AttributeSchema::new("db_subnet_group_name", AttributeType::String))
        .attribute(AttributeSchema::new("parameter_group_name", AttributeType::String))
        .attribute(
            AttributeSchema::new("vpc_security_group_ids", aws_types::string_list())
                .with_description("Security groups of the instance"),
        )
        .attribute(AttributeSchema::new("publicly_accessible", AttributeType::Bool))
        .attribute(AttributeSchema::new("multi_az", AttributeType::Bool))
        .attribute(AttributeSchema::new("skip_final_snapshot", AttributeType::Bool))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        parameter_group_schema(),
        subnet_group_schema(),
        instance_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webstack_core::resource::Value;

    #[test]
    fn instance_accepts_secret_password() {
        let mut attrs = HashMap::new();
        attrs.insert("engine".to_string(), Value::string("mysql"));
        attrs.insert("instance_class".to_string(), Value::string("db.t3.micro"));
        attrs.insert("username".to_string(), Value::string("csye6225"));
        attrs.insert(
            "password".to_string(),
            Value::secret(Value::string("s3cret")),
        );
        attrs.insert("allocated_storage".to_string(), Value::Int(20));
        assert!(instance_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn instance_rejects_unknown_engine() {
        let mut attrs = HashMap::new();
        attrs.insert("engine".to_string(), Value::string("oracle"));
        attrs.insert("instance_class".to_string(), Value::string("db.t3.micro"));
        attrs.insert("username".to_string(), Value::string("u"));
        attrs.insert("password".to_string(), Value::string("p"));
        let errors = instance_schema().validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
