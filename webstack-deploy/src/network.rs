//! Network - VPC, gateway, route tables and per-zone subnets

use webstack_core::resource::{Resource, Value};
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::addressing::partition;
use crate::settings::NetworkSettings;

/// Logical name of the availability-zone lookup
pub const ZONES_LOOKUP: &str = "availability-zones";

/// Declared network resources
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: Binding,
    pub internet_gateway: Binding,
    pub public_route_table: Binding,
    pub private_route_table: Binding,
    pub public_route: Binding,
    pub public_subnets: Vec<Binding>,
    pub private_subnets: Vec<Binding>,
    pub associations: Vec<Binding>,
}

pub fn build(stack: &mut Stack, settings: &NetworkSettings) -> Result<Network, DeployError> {
    let names = &settings.names;
    let pairs = partition(&settings.vpc_cidr, settings.zone_count)?;

    let vpc = stack.declare(
        Resource::new("aws:ec2:Vpc", names.vpc.as_str())
            .with_attribute("cidr_block", settings.vpc_cidr.as_str())
            .with_attribute("enable_dns_support", true)
            .with_attribute("enable_dns_hostnames", true)
            .with_name_tag(names.vpc.as_str()),
    )?;

    let internet_gateway = stack.declare(
        Resource::new("aws:ec2:InternetGateway", names.internet_gateway.as_str())
            .with_attribute("vpc_id", vpc.id())
            .with_name_tag(names.internet_gateway.as_str()),
    )?;

    let public_route_table = stack.declare(
        Resource::new("aws:ec2:RouteTable", names.public_route_table.as_str())
            .with_attribute("vpc_id", vpc.id())
            .with_name_tag(names.public_route_table.as_str()),
    )?;

    let private_route_table = stack.declare(
        Resource::new("aws:ec2:RouteTable", names.private_route_table.as_str())
            .with_attribute("vpc_id", vpc.id())
            .with_name_tag(names.private_route_table.as_str()),
    )?;

    let public_route = stack.declare(
        Resource::new("aws:ec2:Route", names.public_route.as_str())
            .with_attribute("route_table_id", public_route_table.id())
            .with_attribute("destination_cidr_block", settings.destination_cidr.as_str())
            .with_attribute("gateway_id", internet_gateway.id()),
    )?;

    // Zone of subnet pair `i`: configured, or the lookup's `names[i]`
    let zones: Vec<Value> = match &settings.availability_zones {
        Some(names) => names.iter().map(|n| Value::string(n.as_str())).collect(),
        None => {
            let lookup = stack.declare(
                Resource::new("aws:index:getAvailabilityZones", ZONES_LOOKUP)
                    .with_attribute("state", "available")
                    .with_read_only(true),
            )?;
            (0..pairs.len())
                .map(|i| lookup.attr(format!("names[{}]", i)))
                .collect()
        }
    };

    let mut public_subnets = Vec::with_capacity(pairs.len());
    let mut private_subnets = Vec::with_capacity(pairs.len());
    let mut associations = Vec::with_capacity(pairs.len() * 2);
    for (pair, zone) in pairs.iter().zip(zones) {
        let i = pair.zone;

        let private_name = format!("{}-{}", names.private_subnet, i);
        let private = stack.declare(
            Resource::new("aws:ec2:Subnet", private_name.as_str())
                .with_attribute("vpc_id", vpc.id())
                .with_attribute("cidr_block", pair.private_cidr.as_str())
                .with_attribute("availability_zone", zone.clone())
                .with_attribute("map_public_ip_on_launch", false)
                .with_name_tag(private_name.as_str()),
        )?;

        let public_name = format!("{}-{}", names.public_subnet, i);
        let public = stack.declare(
            Resource::new("aws:ec2:Subnet", public_name.as_str())
                .with_attribute("vpc_id", vpc.id())
                .with_attribute("cidr_block", pair.public_cidr.as_str())
                .with_attribute("availability_zone", zone)
                .with_attribute("map_public_ip_on_launch", true)
                .with_name_tag(public_name.as_str()),
        )?;

        associations.push(stack.declare(
            Resource::new(
                "aws:ec2:RouteTableAssociation",
                format!("{}-{}", names.public_association, i),
            )
            .with_attribute("subnet_id", public.id())
            .with_attribute("route_table_id", public_route_table.id()),
        )?);
        associations.push(stack.declare(
            Resource::new(
                "aws:ec2:RouteTableAssociation",
                format!("{}-{}", names.private_association, i),
            )
            .with_attribute("subnet_id", private.id())
            .with_attribute("route_table_id", private_route_table.id()),
        )?);

        public_subnets.push(public);
        private_subnets.push(private);
    }

    log::info!(
        "network: {} with {} public and {} private subnet(s)",
        settings.vpc_cidr,
        public_subnets.len(),
        private_subnets.len()
    );

    Ok(Network {
        vpc,
        internet_gateway,
        public_route_table,
        private_route_table,
        public_route,
        public_subnets,
        private_subnets,
        associations,
    })
}
