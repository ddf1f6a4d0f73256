//! Outputs - Stack outputs of a deployment

use webstack_core::resource::Value;
use webstack_core::stack::{Binding, Stack};

use crate::DeployError;
use crate::compute::{Compute, WebTier};
use crate::database::Database;
use crate::edge::{Dns, LoadBalancer};
use crate::network::Network;
use crate::notification::Pipeline;

/// Declared tiers whose identifiers are exported
pub struct Tiers<'a> {
    pub network: &'a Network,
    pub compute: &'a Compute,
    pub database: Option<&'a Database>,
    pub load_balancer: Option<&'a LoadBalancer>,
    pub dns: Option<&'a Dns>,
    pub topic: Option<&'a Binding>,
    pub pipeline: Option<&'a Pipeline>,
}

fn ids(bindings: &[Binding]) -> Value {
    Value::List(bindings.iter().map(Binding::id).collect())
}

/// Export every output of the deployed tiers
pub fn export(
    stack: &mut Stack,
    tiers: &Tiers<'_>,
    domain_name: Option<&str>,
) -> Result<(), DeployError> {
    let network = tiers.network;
    stack.export("vpcId", network.vpc.id())?;
    stack.export("privateSubnetIds", ids(&network.private_subnets))?;
    stack.export("publicSubnetIds", ids(&network.public_subnets))?;
    stack.export("publicRouteTableId", network.public_route_table.id())?;
    stack.export("privateRouteTableId", network.private_route_table.id())?;
    stack.export("internetGatewayId", network.internet_gateway.id())?;
    stack.export("publicRouteId", network.public_route.id())?;

    match &tiers.compute.web {
        WebTier::Instance(instance) => {
            stack.export("instanceId", instance.id())?;
            stack.export("instancePublicIp", instance.attr("publicIp"))?;
        }
        WebTier::AutoScaling(asg) => {
            stack.export("autoScalingGroupId", asg.group.id())?;
            stack.export("autoScalingGroupName", asg.group.name_attr())?;
        }
    }

    if let Some(database) = tiers.database {
        stack.export("databaseHost", database.address())?;
    }
    if let Some(lb) = tiers.load_balancer {
        stack.export("loadBalancerDnsName", lb.dns_name())?;
    }
    if let (Some(_), Some(domain)) = (tiers.dns, domain_name) {
        stack.export("domainName", Value::string(domain))?;
    }
    if let Some(topic) = tiers.topic {
        stack.export("snsTopicArn", topic.arn())?;
    }
    if let Some(pipeline) = tiers.pipeline {
        stack.export("submissionBucket", pipeline.bucket.name_attr())?;
        stack.export("submissionTable", pipeline.table.name_attr())?;
    }

    log::debug!("exported {} output(s)", stack.outputs().len());
    Ok(())
}
