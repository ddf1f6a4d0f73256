//! Load balancing and Route 53 schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types as aws_types;

fn lb_protocol() -> AttributeType {
    AttributeType::Enum(vec!["HTTP".to_string(), "HTTPS".to_string()])
}

pub fn load_balancer_schema() -> ResourceSchema {
    ResourceSchema::new("aws:lb:LoadBalancer")
        .with_description("An elastic load balancer")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "load_balancer_type",
                AttributeType::Enum(vec![
                    "application".to_string(),
                    "network".to_string(),
                    "gateway".to_string(),
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("internal", AttributeType::Bool))
        .attribute(AttributeSchema::new("security_groups", aws_types::string_list()))
        .attribute(AttributeSchema::new("subnets", aws_types::string_list()).required())
        .attribute(AttributeSchema::new("enable_deletion_protection", AttributeType::Bool))
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn target_group_schema() -> ResourceSchema {
    ResourceSchema::new("aws:lb:TargetGroup")
        .with_description("A load balancer target group")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("port", aws_types::port_number()).required())
        .attribute(AttributeSchema::new("protocol", lb_protocol()).required())
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(
            AttributeSchema::new(
                "target_type",
                AttributeType::Enum(vec![
                    "instance".to_string(),
                    "ip".to_string(),
                    "lambda".to_string(),
                ]),
            ),
        )
        .attribute(
            AttributeSchema::new("health_check", AttributeType::Object).with_description(
                "{ path, port, protocol, interval, timeout, healthyThreshold, unhealthyThreshold, matcher }",
            ),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn listener_schema() -> ResourceSchema {
    ResourceSchema::new("aws:lb:Listener")
        .with_description("A load balancer listener")
        .attribute(AttributeSchema::new("load_balancer_arn", AttributeType::String).required())
        .attribute(AttributeSchema::new("port", aws_types::port_number()).required())
        .attribute(AttributeSchema::new("protocol", lb_protocol()))
        .attribute(
            AttributeSchema::new("default_actions", aws_types::object_list())
                .required()
                .with_description("{ type, targetGroupArn } blocks"),
        )
}

pub fn target_group_attachment_schema() -> ResourceSchema {
    ResourceSchema::new("aws:lb:TargetGroupAttachment")
        .with_description("Registers a target with a target group")
        .attribute(AttributeSchema::new("target_group_arn", AttributeType::String).required())
        .attribute(AttributeSchema::new("target_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("port", aws_types::port_number()))
}

/// Lookup of a hosted zone by domain name.
///
/// Returns `zone_id`, `name`, `name_servers`
pub fn zone_lookup_schema() -> ResourceSchema {
    ResourceSchema::new("aws:route53:getZone")
        .with_description("A Route 53 hosted zone")
        .data_source()
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("private_zone", AttributeType::Bool))
}

pub fn record_schema() -> ResourceSchema {
    ResourceSchema::new("aws:route53:Record")
        .with_description("A Route 53 record")
        .attribute(AttributeSchema::new("zone_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(vec![
                    "A".to_string(),
                    "AAAA".to_string(),
                    "CNAME".to_string(),
                    "TXT".to_string(),
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("ttl", AttributeType::Int))
        .attribute(AttributeSchema::new("records", aws_types::string_list()))
        .attribute(
            AttributeSchema::new("aliases", aws_types::object_list())
                .with_description("{ name, zoneId, evaluateTargetHealth } blocks"),
        )
        .attribute(AttributeSchema::new("allow_overwrite", AttributeType::Bool))
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        load_balancer_schema(),
        target_group_schema(),
        listener_schema(),
        target_group_attachment_schema(),
        zone_lookup_schema(),
        record_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webstack_core::resource::Value;

    #[test]
    fn record_accepts_alias_block() {
        let mut attrs = HashMap::new();
        attrs.insert("zone_id".to_string(), Value::reference("zone", "zoneId"));
        attrs.insert("name".to_string(), Value::string("dev.example.com"));
        attrs.insert("type".to_string(), Value::string("A"));
        attrs.insert(
            "aliases".to_string(),
            Value::List(vec![Value::map([
                ("name", Value::reference("alb", "dnsName")),
                ("zone_id", Value::reference("alb", "zoneId")),
                ("evaluate_target_health", Value::Bool(true)),
            ])]),
        );
        assert!(record_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn listener_requires_default_actions() {
        let mut attrs = HashMap::new();
        attrs.insert("load_balancer_arn".to_string(), Value::reference("alb", "arn"));
        attrs.insert("port".to_string(), Value::Int(80));
        let errors = listener_schema().validate(&attrs).unwrap_err();
        assert!(errors[0].to_string().contains("default_actions"));
    }

    #[test]
    fn zone_lookup_is_a_data_source() {
        assert!(zone_lookup_schema().data_source);
    }
}
