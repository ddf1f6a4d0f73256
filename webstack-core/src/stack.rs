//! Stack - Ordered declarations of resources and outputs
//!
//! A Stack is the desired state of one deployment. Resources are declared
//! in creation order: a resource may only reference bindings declared before
//! it, so the order of declarations is always a valid creation order.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::graph::DependencyGraph;
use crate::resource::{Resource, ResourceId, Value};
use crate::schema::{SchemaRegistry, TypeError};

static BINDING_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("binding name pattern is valid")
});

/// Error type for stack declarations
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Invalid name '{name}': must start with a letter and contain only letters, digits, '-' or '_'")]
    InvalidName { name: String },

    #[error("Resource '{name}' is already declared")]
    DuplicateResource { name: String },

    #[error("{from} references '{target}' before it is declared")]
    ForwardReference { from: String, target: String },

    #[error("Output '{name}' is already exported")]
    DuplicateOutput { name: String },

    #[error("{} validation error(s):\n{}", issues.len(), format_issues(issues))]
    Validation { issues: Vec<ValidationIssue> },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A schema violation on one declared resource
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub resource: ResourceId,
    pub error: TypeError,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.resource, self.error)
    }
}

/// Handle to a declared resource, used to reference its attributes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    name: String,
    resource_type: String,
}

impl Binding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Reference to an attribute of the bound resource
    pub fn attr(&self, path: impl Into<String>) -> Value {
        Value::ResourceRef(self.name.clone(), path.into())
    }

    pub fn id(&self) -> Value {
        self.attr("id")
    }

    pub fn arn(&self) -> Value {
        self.attr("arn")
    }

    pub fn name_attr(&self) -> Value {
        self.attr("name")
    }
}

/// A stack output
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
}

/// Desired state of one deployment
#[derive(Debug, Clone)]
pub struct Stack {
    project: String,
    name: String,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    outputs: Vec<Output>,
}

impl Stack {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            resources: Vec::new(),
            index: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared resources, in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    /// Resources of one type token, in declaration order
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.id.resource_type == resource_type)
    }

    /// Declare a resource after every binding it depends on
    pub fn declare(&mut self, resource: Resource) -> Result<Binding, StackError> {
        let name = resource.binding().to_string();
        if !BINDING_NAME.is_match(&name) {
            return Err(StackError::InvalidName { name });
        }
        if self.index.contains_key(&name) {
            return Err(StackError::DuplicateResource { name });
        }
        for target in resource.dependencies() {
            if !self.index.contains_key(&target) {
                return Err(StackError::ForwardReference {
                    from: resource.id.to_string(),
                    target,
                });
            }
        }

        log::debug!("declare {}", resource.id);
        let binding = Binding {
            name: name.clone(),
            resource_type: resource.id.resource_type.clone(),
        };
        self.index.insert(name, self.resources.len());
        self.resources.push(resource);
        Ok(binding)
    }

    /// Export a stack output
    pub fn export(&mut self, name: impl Into<String>, value: Value) -> Result<(), StackError> {
        let name = name.into();
        if !BINDING_NAME.is_match(&name) {
            return Err(StackError::InvalidName { name });
        }
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(StackError::DuplicateOutput { name });
        }
        for (target, _) in value.references() {
            if !self.index.contains_key(&target) {
                return Err(StackError::ForwardReference {
                    from: format!("output {}", name),
                    target,
                });
            }
        }
        self.outputs.push(Output { name, value });
        Ok(())
    }

    /// Type-check every resource, collecting all issues
    pub fn validate(&self, schemas: &SchemaRegistry) -> Result<(), StackError> {
        let mut issues = Vec::new();
        for resource in &self.resources {
            if let Err(errors) = schemas.validate_resource(resource) {
                issues.extend(errors.into_iter().map(|error| ValidationIssue {
                    resource: resource.id.clone(),
                    error,
                }));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(StackError::Validation { issues })
        }
    }

    /// Build the dependency graph of the declared resources
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for resource in &self.resources {
            graph.add_node(resource.binding(), &resource.id.resource_type);
            let mut seen = HashSet::new();
            let mut keys: Vec<_> = resource.attributes.keys().collect();
            keys.sort();
            for key in keys {
                for (target, attribute) in resource.attributes[key].references() {
                    if seen.insert((target.clone(), attribute.clone())) {
                        graph.add_edge(resource.binding(), &target, &attribute, key);
                    }
                }
            }
            for target in &resource.depends_on {
                graph.add_edge(resource.binding(), target, "", "dependsOn");
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};

    #[test]
    fn declare_returns_binding_with_references() {
        let mut stack = Stack::new("webapp", "dev");
        let vpc = stack.declare(Resource::new("aws:ec2:Vpc", "main")).unwrap();
        assert_eq!(vpc.id(), Value::reference("main", "id"));
        assert_eq!(vpc.resource_type(), "aws:ec2:Vpc");
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn forward_reference_is_rejected() {
        let mut stack = Stack::new("webapp", "dev");
        let result = stack.declare(
            Resource::new("aws:ec2:SecurityGroupRule", "app-from-lb")
                .with_attribute("source_security_group_id", Value::reference("lb-sg", "id")),
        );
        assert!(matches!(
            result,
            Err(StackError::ForwardReference { target, .. }) if target == "lb-sg"
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn depends_on_must_be_declared() {
        let mut stack = Stack::new("webapp", "dev");
        let result = stack.declare(Resource::new("aws:ec2:Route", "r").with_depends_on("igw"));
        assert!(matches!(result, Err(StackError::ForwardReference { .. })));
    }

    #[test]
    fn duplicate_and_invalid_names_are_rejected() {
        let mut stack = Stack::new("webapp", "dev");
        stack.declare(Resource::new("aws:ec2:Vpc", "main")).unwrap();
        assert!(matches!(
            stack.declare(Resource::new("aws:ec2:Subnet", "main")),
            Err(StackError::DuplicateResource { .. })
        ));
        assert!(matches!(
            stack.declare(Resource::new("aws:ec2:Vpc", "application security group")),
            Err(StackError::InvalidName { .. })
        ));
    }

    #[test]
    fn export_checks_references_and_duplicates() {
        let mut stack = Stack::new("webapp", "dev");
        let vpc = stack.declare(Resource::new("aws:ec2:Vpc", "main")).unwrap();
        stack.export("vpcId", vpc.id()).unwrap();
        assert!(matches!(
            stack.export("vpcId", vpc.id()),
            Err(StackError::DuplicateOutput { .. })
        ));
        assert!(matches!(
            stack.export("dbHost", Value::reference("db", "address")),
            Err(StackError::ForwardReference { .. })
        ));
        assert_eq!(stack.outputs().len(), 1);
    }

    #[test]
    fn validate_collects_all_issues() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            ResourceSchema::new("aws:ec2:Vpc")
                .attribute(AttributeSchema::new("cidr_block", AttributeType::String).required()),
        );

        let mut stack = Stack::new("webapp", "dev");
        stack.declare(Resource::new("aws:ec2:Vpc", "a")).unwrap();
        stack.declare(Resource::new("aws:ec2:Unknown", "b")).unwrap();

        match stack.validate(&registry) {
            Err(StackError::Validation { issues }) => {
                assert_eq!(issues.len(), 2);
                assert_eq!(issues[0].resource.name, "a");
                assert_eq!(issues[1].resource.name, "b");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn dependency_graph_follows_references() {
        let mut stack = Stack::new("webapp", "dev");
        let vpc = stack.declare(Resource::new("aws:ec2:Vpc", "vpc")).unwrap();
        stack
            .declare(Resource::new("aws:ec2:Subnet", "subnet").with_attribute("vpc_id", vpc.id()))
            .unwrap();

        let graph = stack.dependency_graph();
        assert_eq!(graph.dependencies_of("subnet").len(), 1);
        assert_eq!(graph.dependents_of("vpc"), &["subnet".to_string()]);
    }
}
