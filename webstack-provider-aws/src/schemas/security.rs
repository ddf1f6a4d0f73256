//! Security group schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub fn security_group_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:SecurityGroup")
        .with_description("A security group for a VPC; rules are declared separately")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_description("The VPC ID"),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .with_description("The security group name"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_description("The security group description"),
        )
        .attribute(
            AttributeSchema::new("revoke_rules_on_delete", AttributeType::Bool)
                .with_description("Revoke all rules before deleting the group"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn security_group_rule_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:SecurityGroupRule")
        .with_description("A single ingress or egress rule of a security group")
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(vec!["ingress".to_string(), "egress".to_string()]),
            )
            .required()
            .with_description("Rule direction"),
        )
        .attribute(
            AttributeSchema::new("security_group_id", AttributeType::String)
                .required()
                .with_description("The security group to attach the rule to"),
        )
        .attribute(
            AttributeSchema::new("protocol", aws_types::protocol())
                .required()
                .with_description("The IP protocol (tcp, udp, icmp, -1)"),
        )
        .attribute(
            AttributeSchema::new("from_port", aws_types::port_number())
                .required()
                .with_description("Start of the port range"),
        )
        .attribute(
            AttributeSchema::new("to_port", aws_types::port_number())
                .required()
                .with_description("End of the port range"),
        )
        .attribute(
            AttributeSchema::new("cidr_blocks", AttributeType::List(Box::new(types::cidr())))
                .with_description("IPv4 CIDR ranges"),
        )
        .attribute(
            AttributeSchema::new(
                "ipv6_cidr_blocks",
                AttributeType::List(Box::new(types::ipv6_cidr())),
            )
            .with_description("IPv6 CIDR ranges"),
        )
        .attribute(
            AttributeSchema::new("source_security_group_id", AttributeType::String)
                .with_description("Security group allowed to reach this group"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![security_group_schema(), security_group_rule_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webstack_core::resource::Value;

    fn rule(protocol: &str, from: i64, to: i64) -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        attrs.insert("type".to_string(), Value::string("ingress"));
        attrs.insert("security_group_id".to_string(), Value::reference("app-sg", "id"));
        attrs.insert("protocol".to_string(), Value::string(protocol));
        attrs.insert("from_port".to_string(), Value::Int(from));
        attrs.insert("to_port".to_string(), Value::Int(to));
        attrs
    }

    #[test]
    fn rule_with_source_group_is_valid() {
        let mut attrs = rule("tcp", 8080, 8080);
        attrs.insert(
            "source_security_group_id".to_string(),
            Value::reference("lb-sg", "id"),
        );
        assert!(security_group_rule_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn rule_rejects_bad_ports_and_protocols() {
        assert!(security_group_rule_schema().validate(&rule("tcp", 0, 70000)).is_err());
        assert!(security_group_rule_schema().validate(&rule("http", 80, 80)).is_err());
    }

    #[test]
    fn rule_checks_cidr_lists() {
        let mut attrs = rule("-1", 0, 0);
        attrs.insert(
            "cidr_blocks".to_string(),
            Value::strings(["0.0.0.0/0"]),
        );
        attrs.insert("ipv6_cidr_blocks".to_string(), Value::strings(["::/0"]));
        assert!(security_group_rule_schema().validate(&attrs).is_ok());

        attrs.insert("ipv6_cidr_blocks".to_string(), Value::strings(["0.0.0.0/0"]));
        assert!(security_group_rule_schema().validate(&attrs).is_err());
    }
}
