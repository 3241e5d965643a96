//! Tasks, instances and the node type that links them

use crate::command::Command;
use crate::iterate::{Iterate, Substitution};
use serde::{Deserialize, Serialize};

/// A child slot in a job or task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// A concrete task
    Task(Task),
    /// A reference to a task defined elsewhere in the job
    Instance(Instance),
    /// A template expanded into several tasks at finalize time
    Iterate(Iterate),
}

impl From<Task> for Node {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<Instance> for Node {
    fn from(instance: Instance) -> Self {
        Self::Instance(instance)
    }
}

impl From<Iterate> for Node {
    fn from(iterate: Iterate) -> Self {
        Self::Iterate(iterate)
    }
}

impl Node {
    pub(crate) fn substituted(&self, subs: &Substitution) -> Self {
        match self {
            Self::Task(task) => Self::Task(task.substituted(subs)),
            Self::Instance(instance) => Self::Instance(Instance {
                target: subs.apply(&instance.target),
            }),
            Self::Iterate(iterate) => Self::Iterate(iterate.substituted(subs)),
        }
    }
}

/// Reference to an existing task, by id or title
///
/// Lets one task be a dependency of several parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Id or title of the referenced task
    pub target: String,
}

impl Instance {
    /// Reference a task by id or title
    #[inline]
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

/// A unit of work with optional children and commands
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    /// Display title
    pub title: String,
    /// Optional id, unique within the job
    pub id: Option<String>,
    /// Service key override
    pub service: Option<String>,
    /// Children run strictly one after another when set
    pub serial_subtasks: bool,
    /// Child nodes
    pub children: Vec<Node>,
    /// Commands run once all children finish
    pub commands: Vec<Command>,
    /// Commands run whether or not the task succeeded
    pub cleanup: Vec<Command>,
    /// Preview command shown by the engine UI
    pub preview: Option<String>,
    /// Free-form metadata string
    pub metadata: Option<String>,
}

impl Task {
    /// Create an empty task
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// With task id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// With service override
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Run children in sequence
    #[must_use]
    pub fn serial(mut self) -> Self {
        self.serial_subtasks = true;
        self
    }

    /// With preview command
    #[must_use]
    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }

    /// With metadata string
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// With a child node
    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// With a command
    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Append a child node
    pub fn add_child(&mut self, child: impl Into<Node>) -> &mut Self {
        self.children.push(child.into());
        self
    }

    /// Append a command
    pub fn add_command(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Append a cleanup command
    pub fn add_cleanup(&mut self, command: Command) -> &mut Self {
        self.cleanup.push(command);
        self
    }

    /// Reference this task from elsewhere in the graph
    ///
    /// Uses the id when present, the title otherwise.
    #[must_use]
    pub fn instance(&self) -> Instance {
        Instance::new(self.id.clone().unwrap_or_else(|| self.title.clone()))
    }

    pub(crate) fn substituted(&self, subs: &Substitution) -> Self {
        Self {
            title: subs.apply(&self.title),
            id: self.id.as_deref().map(|id| subs.apply(id)),
            service: self.service.clone(),
            serial_subtasks: self.serial_subtasks,
            children: self.children.iter().map(|c| c.substituted(subs)).collect(),
            commands: self.commands.iter().map(|c| c.substituted(subs)).collect(),
            cleanup: self.cleanup.iter().map(|c| c.substituted(subs)).collect(),
            preview: self.preview.as_deref().map(|p| subs.apply(p)),
            metadata: self.metadata.as_deref().map(|m| subs.apply(m)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_child_and_command() {
        let mut task = Task::new("Render");
        task.add_child(Task::new("Frame 1"))
            .add_command(Command::new(["prman", "a.rib"]))
            .add_cleanup(Command::new(["rm", "a.rib"]));

        assert_eq!(task.children.len(), 1);
        assert_eq!(task.commands.len(), 1);
        assert_eq!(task.cleanup.len(), 1);
        assert!(!task.serial_subtasks);
    }

    #[test]
    fn serial_without_children_is_allowed() {
        let task = Task::new("Empty").serial();
        assert!(task.serial_subtasks);
        assert!(task.children.is_empty());
    }

    #[test]
    fn instance_prefers_id() {
        assert_eq!(Task::new("Preflight").with_id("pre").instance().target, "pre");
        assert_eq!(Task::new("Preflight").instance().target, "Preflight");
    }
}
