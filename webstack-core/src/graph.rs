//! Graph - Dependency analysis between declared resources

use std::collections::{HashMap, HashSet};

/// Dependency between resources
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    /// Target resource binding name
    pub target: String,
    /// Referenced attribute (e.g., "id"); empty for explicit ordering
    pub attribute: String,
    /// Where this reference is used (e.g., "security_group_id")
    pub used_in: String,
}

/// Dependency graph for the resources of a stack
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Binding names in declaration order
    nodes: Vec<String>,
    /// Binding name -> resource type
    types: HashMap<String, String>,
    /// Resource binding name -> list of dependencies
    pub edges: HashMap<String, Vec<Dependency>>,
    /// Reverse edges: target -> list of resources that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str, resource_type: &str) {
        if !self.types.contains_key(name) {
            self.nodes.push(name.to_string());
        }
        self.types
            .insert(name.to_string(), resource_type.to_string());
    }

    /// Add a dependency edge
    pub fn add_edge(&mut self, from: &str, target: &str, attribute: &str, used_in: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(Dependency {
                target: target.to_string(),
                attribute: attribute.to_string(),
                used_in: used_in.to_string(),
            });
        let dependents = self.reverse_edges.entry(target.to_string()).or_default();
        if !dependents.iter().any(|d| d == from) {
            dependents.push(from.to_string());
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn resource_type(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    /// Resources that depend on nothing
    pub fn root_resources(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| self.dependencies_of(n).is_empty())
            .cloned()
            .collect()
    }

    /// Resources that nothing depends on
    pub fn leaf_resources(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| self.dependents_of(n).is_empty())
            .cloned()
            .collect()
    }

    /// Get direct dependencies of a resource
    pub fn dependencies_of(&self, resource: &str) -> &[Dependency] {
        self.edges.get(resource).map_or(&[], |v| v.as_slice())
    }

    /// Get resources that depend on this resource
    pub fn dependents_of(&self, resource: &str) -> &[String] {
        self.reverse_edges
            .get(resource)
            .map_or(&[], |v| v.as_slice())
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node in &self.nodes {
            if self.has_cycle_util(node, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn has_cycle_util(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> bool {
        if rec_stack.contains(node) {
            return true;
        }
        if visited.contains(node) {
            return false;
        }

        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());

        for dep in self.dependencies_of(node) {
            if self.has_cycle_util(&dep.target, visited, rec_stack) {
                return true;
            }
        }

        rec_stack.remove(node);
        false
    }

    /// Topological creation order; declaration order breaks ties.
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn creation_order(&self) -> Option<Vec<String>> {
        let mut remaining: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| {
                let targets: HashSet<&str> = self
                    .dependencies_of(n)
                    .iter()
                    .map(|d| d.target.as_str())
                    .collect();
                (n.as_str(), targets.len())
            })
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut done: HashSet<&str> = HashSet::new();
        while order.len() < self.nodes.len() {
            let next = self
                .nodes
                .iter()
                .find(|n| !done.contains(n.as_str()) && remaining[n.as_str()] == 0)?;
            done.insert(next.as_str());
            order.push(next.clone());
            for dependent in self.dependents_of(next) {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                }
            }
        }
        Some(order)
    }

    /// Display the graph as a tree, roots first
    pub fn display(&self) -> String {
        self.display_with_color(true)
    }

    /// Display with optional color support
    pub fn display_with_color(&self, use_color: bool) -> String {
        let c = Colors::new(use_color);
        let mut output = String::new();
        let mut visited = HashSet::new();

        for root in self.root_resources() {
            self.display_tree(&mut output, &root, "", true, true, &mut visited, &c);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn display_tree(
        &self,
        output: &mut String,
        node: &str,
        prefix: &str,
        is_last: bool,
        is_root: bool,
        visited: &mut HashSet<String>,
        c: &Colors,
    ) {
        let connector = if is_root {
            String::new()
        } else if is_last {
            format!("{}└── {}", c.dim, c.reset)
        } else {
            format!("{}├── {}", c.dim, c.reset)
        };
        let node_type = self.resource_type(node).unwrap_or("unknown");

        if !visited.insert(node.to_string()) {
            output.push_str(&format!(
                "{}{}{}{}{} {}(see above){}\n",
                prefix, connector, c.white, node, c.reset, c.dim, c.reset
            ));
            return;
        }

        output.push_str(&format!(
            "{}{}{}{}{}: {}{}{}\n",
            prefix, connector, c.white, node, c.reset, c.yellow, node_type, c.reset
        ));

        // Show a child under its most specific parent only: skip dependents
        // that also depend on a sibling dependent of this node
        let direct_dependents = self.dependents_of(node);
        let children: Vec<&String> = direct_dependents
            .iter()
            .filter(|child| {
                !self
                    .dependencies_of(child)
                    .iter()
                    .any(|dep| dep.target != node && direct_dependents.contains(&dep.target))
            })
            .collect();

        let new_prefix = if is_root {
            format!("{}  ", prefix)
        } else {
            format!(
                "{}{}   ",
                prefix,
                if is_last {
                    " ".to_string()
                } else {
                    format!("{}│{}", c.dim, c.reset)
                }
            )
        };

        for (i, child) in children.iter().enumerate() {
            let child_is_last = i == children.len() - 1;
            self.display_tree(output, child, &new_prefix, child_is_last, false, visited, c);
        }
    }
}

/// ANSI color codes for terminal output
struct Colors {
    reset: &'static str,
    dim: &'static str,
    yellow: &'static str,
    white: &'static str,
}

impl Colors {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                reset: "\x1b[0m",
                dim: "\x1b[2m",
                yellow: "\x1b[33m",
                white: "\x1b[97m",
            }
        } else {
            Self {
                reset: "",
                dim: "",
                yellow: "",
                white: "",
            }
        }
    }
}
