//! VPC resource schema definitions

use webstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub fn vpc_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:Vpc")
        .with_description("An AWS VPC (Virtual Private Cloud)")
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 network range for the VPC, in CIDR notation"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                .with_description("Indicates whether instances launched in the VPC get DNS hostnames. Default: false"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                .with_description("Indicates whether the DNS resolution is supported for the VPC. Default: true"),
        )
        .attribute(
            AttributeSchema::new(
                "instance_tenancy",
                AttributeType::Enum(vec![
                    "default".to_string(),
                    "dedicated".to_string(),
                    "host".to_string(),
                ]),
            )
            .with_description("The allowed tenancy of instances launched into the VPC"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn subnet_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:Subnet")
        .with_description("A subnet in a VPC")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_description("The VPC ID"),
        )
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 CIDR block for the subnet"),
        )
        .attribute(
            AttributeSchema::new("availability_zone", AttributeType::String)
                .with_description("The availability zone for the subnet"),
        )
        .attribute(
            AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                .with_description("Assign a public IPv4 address to instances launched in the subnet"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn internet_gateway_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:InternetGateway")
        .with_description("An internet gateway attached to a VPC")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .with_description("The VPC to attach the gateway to"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn route_table_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:RouteTable")
        .with_description("A route table for a VPC")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_description("The VPC ID"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags_type()))
}

pub fn route_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:Route")
        .with_description("A route in a route table")
        .attribute(
            AttributeSchema::new("route_table_id", AttributeType::String)
                .required()
                .with_description("The route table ID"),
        )
        .attribute(
            AttributeSchema::new("destination_cidr_block", types::cidr())
                .required()
                .with_description("The destination CIDR block"),
        )
        .attribute(
            AttributeSchema::new("gateway_id", AttributeType::String)
                .with_description("Internet gateway ID"),
        )
        .attribute(
            AttributeSchema::new("nat_gateway_id", AttributeType::String)
                .with_description("NAT gateway ID"),
        )
}

pub fn route_table_association_schema() -> ResourceSchema {
    ResourceSchema::new("aws:ec2:RouteTableAssociation")
        .with_description("Associates a subnet with a route table")
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("route_table_id", AttributeType::String).required())
}

/// Lookup of the availability zones of the configured region.
///
/// Returns `names`, `zone_ids` (referenced as `names[0]` etc.)
pub fn availability_zones_schema() -> ResourceSchema {
    ResourceSchema::new("aws:index:getAvailabilityZones")
        .with_description("Availability zones of the current region")
        .data_source()
        .attribute(
            AttributeSchema::new(
                "state",
                AttributeType::Enum(vec![
                    "available".to_string(),
                    "information".to_string(),
                    "impaired".to_string(),
                    "unavailable".to_string(),
                ]),
            )
            .with_description("Only return zones in this state"),
        )
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        vpc_schema(),
        subnet_schema(),
        internet_gateway_schema(),
        route_table_schema(),
        route_schema(),
        route_table_association_schema(),
        availability_zones_schema(),
    ]
}
