//! Loading and validation of workflow definitions.
//!
//! Files are YAML or JSON, selected by extension. Validation enforces
//! referential integrity (agent and dependency references) and acyclicity
//! of the dependency graph; the engine runs it before any task is
//! dispatched, so an invalid definition never reaches the scheduling loop.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::info;

use crate::error::ConfigError;
use crate::model::{TaskDefinition, WorkflowDefinition};

/// Load a workflow definition from a YAML or JSON file.
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<WorkflowDefinition, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let definition: WorkflowDefinition = match extension.as_str() {
        "yaml" | "yml" => {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        "json" => {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    info!(
        workflow = %definition.name,
        tasks = definition.tasks.len(),
        "definition loaded"
    );
    Ok(definition)
}

/// Validate referential integrity and acyclicity of a definition.
pub fn validate(definition: &WorkflowDefinition) -> Result<(), ConfigError> {
    let agent_names: HashSet<&str> = definition.agents.iter().map(|a| a.name.as_str()).collect();
    for task in &definition.tasks {
        if !agent_names.contains(task.agent.as_str()) {
            return Err(ConfigError::UndefinedAgent {
                task: task.name.clone(),
                agent: task.agent.clone(),
            });
        }
    }

    let task_names: HashSet<&str> = definition.tasks.iter().map(|t| t.name.as_str()).collect();
    for task in &definition.tasks {
        for dependency in &task.depends_on {
            if !task_names.contains(dependency.as_str()) {
                return Err(ConfigError::UndefinedDependency {
                    task: task.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    check_cycles(&definition.tasks)
}

fn check_cycles(tasks: &[TaskDefinition]) -> Result<(), ConfigError> {
    let dependencies: HashMap<&str, &[String]> = tasks
        .iter()
        .map(|t| (t.name.as_str(), t.depends_on.as_slice()))
        .collect();

    fn visit<'a>(
        name: &'a str,
        dependencies: &HashMap<&'a str, &'a [String]>,
        visited: &mut HashSet<&'a str>,
        stack: &mut HashSet<&'a str>,
    ) -> bool {
        visited.insert(name);
        stack.insert(name);
        for dep in dependencies.get(name).copied().unwrap_or_default() {
            if !visited.contains(dep.as_str()) {
                if visit(dep, dependencies, visited, stack) {
                    return true;
                }
            } else if stack.contains(dep.as_str()) {
                return true;
            }
        }
        stack.remove(name);
        false
    }

    let mut visited = HashSet::new();
    for task in tasks {
        if !visited.contains(task.name.as_str()) {
            let mut stack = HashSet::new();
            if visit(task.name.as_str(), &dependencies, &mut visited, &mut stack) {
                return Err(ConfigError::CyclicDependency(task.name.clone()));
            }
        }
    }
    Ok(())
}
