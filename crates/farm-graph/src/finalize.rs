//! Graph finalization
//!
//! Finalizing runs in four passes over a private copy of the job tree:
//! 1. header checks (title, priority)
//! 2. iterate expansion
//! 3. arena collection: titles, ids, commands, instance references
//! 4. instance resolution and a cycle check over the effective DAG
//!
//! Only when every pass succeeds is the tree serialized. The caller's
//! [`Job`] is borrowed immutably throughout.

use crate::command::Command;
use crate::error::GraphError;
use crate::job::Job;
use crate::serialize;
use crate::task::{Node, Task};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Validated, serialized job graph ready for transmission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Nested block text
    pub text: String,
    /// SHA-256 of `text`, lowercase hex
    pub digest: String,
    /// Concrete tasks after iterate expansion
    pub task_count: usize,
    /// Commands across all tasks, cleanup included
    pub command_count: usize,
}

impl SerializedGraph {
    /// Graph text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for SerializedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A task whose iterates have been expanded
#[derive(Debug)]
pub(crate) struct Expanded {
    /// The task itself; its `children` field is left empty
    pub(crate) task: Task,
    pub(crate) children: Vec<Item>,
}

#[derive(Debug)]
pub(crate) enum Item {
    Task(Expanded),
    Instance(String),
}

pub(crate) fn finalize(job: &Job) -> Result<SerializedGraph, GraphError> {
    check_header(job)?;

    let items = expand(job.children.clone())?;

    let mut arena = Arena::default();
    arena.collect(&items, None, &job.title)?;
    arena.check_commands(&job.cleanup, &job.title)?;
    arena.check_dag()?;

    let text = serialize::job(job, &items);
    let digest = hex::encode(Sha256::digest(text.as_bytes()));

    tracing::debug!(
        title = %job.title,
        tasks = arena.tasks.len(),
        commands = arena.command_count,
        "job graph finalized"
    );

    Ok(SerializedGraph {
        text,
        digest,
        task_count: arena.tasks.len(),
        command_count: arena.command_count,
    })
}

fn check_header(job: &Job) -> Result<(), GraphError> {
    if job.title.trim().is_empty() {
        return Err(GraphError::EmptyJobTitle);
    }
    if !job.priority.is_finite() || job.priority < 0.0 {
        return Err(GraphError::InvalidPriority(job.priority.to_string()));
    }
    Ok(())
}

fn expand(nodes: Vec<Node>) -> Result<Vec<Item>, GraphError> {
    let mut items = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Task(task) => items.push(Item::Task(expand_task(task)?)),
            Node::Instance(instance) => items.push(Item::Instance(instance.target)),
            Node::Iterate(iterate) => {
                for clone in iterate.expand_template()? {
                    items.push(Item::Task(expand_task(clone)?));
                }
            }
        }
    }
    Ok(items)
}

fn expand_task(mut task: Task) -> Result<Expanded, GraphError> {
    let children = std::mem::take(&mut task.children);
    Ok(Expanded {
        children: expand(children)?,
        task,
    })
}

#[derive(Default)]
struct Arena<'a> {
    tasks: Vec<&'a Task>,
    edges: Vec<(usize, usize)>,
    /// (owning task, target); `None` owner means the job root
    instances: Vec<(Option<usize>, &'a str)>,
    task_ids: HashSet<&'a str>,
    command_ids: HashSet<&'a str>,
    command_count: usize,
}

impl<'a> Arena<'a> {
    fn collect(
        &mut self,
        items: &'a [Item],
        parent: Option<usize>,
        parent_title: &str,
    ) -> Result<(), GraphError> {
        for item in items {
            match item {
                Item::Instance(target) => self.instances.push((parent, target.as_str())),
                Item::Task(expanded) => {
                    let task = &expanded.task;
                    if task.title.trim().is_empty() {
                        return Err(GraphError::EmptyTaskTitle {
                            parent: parent_title.to_string(),
                        });
                    }
                    if let Some(id) = task.id.as_deref() {
                        if !self.task_ids.insert(id) {
                            return Err(GraphError::DuplicateTaskId(id.to_string()));
                        }
                    }

                    let index = self.tasks.len();
                    self.tasks.push(task);
                    if let Some(parent) = parent {
                        self.edges.push((parent, index));
                    }

                    self.check_commands(&task.commands, &task.title)?;
                    self.check_commands(&task.cleanup, &task.title)?;
                    self.collect(&expanded.children, Some(index), &task.title)?;
                }
            }
        }
        Ok(())
    }

    fn check_commands(&mut self, commands: &'a [Command], owner: &str) -> Result<(), GraphError> {
        for command in commands {
            if command.argv.is_empty() {
                return Err(GraphError::EmptyCommand {
                    task: owner.to_string(),
                });
            }
            if let (Some(atleast), Some(atmost)) = (command.atleast, command.atmost) {
                if atleast > atmost {
                    return Err(GraphError::InvalidSlots {
                        task: owner.to_string(),
                        atleast,
                        atmost,
                    });
                }
            }
            if let Some(id) = command.id.as_deref() {
                if !self.command_ids.insert(id) {
                    return Err(GraphError::DuplicateCommandId(id.to_string()));
                }
            }
            self.command_count += 1;
        }
        Ok(())
    }

    /// Resolve a reference: task id first, then title
    fn resolve(&self, target: &str, by_title: &HashMap<&str, Vec<usize>>) -> Result<usize, GraphError> {
        if let Some(index) = self.tasks.iter().position(|t| t.id.as_deref() == Some(target)) {
            return Ok(index);
        }
        match by_title.get(target).map(Vec::as_slice) {
            Some([index]) => Ok(*index),
            Some(matches) if !matches.is_empty() => Err(GraphError::AmbiguousInstance {
                target: target.to_string(),
                matches: matches.len(),
            }),
            _ => Err(GraphError::DanglingInstance {
                target: target.to_string(),
            }),
        }
    }

    fn check_dag(&self) -> Result<(), GraphError> {
        let mut by_title: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, task) in self.tasks.iter().enumerate() {
            by_title.entry(task.title.as_str()).or_default().push(index);
        }

        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.tasks.len(), self.edges.len());
        let nodes: Vec<NodeIndex> = (0..self.tasks.len()).map(|i| graph.add_node(i)).collect();
        for &(from, to) in &self.edges {
            graph.add_edge(nodes[from], nodes[to], ());
        }

        for &(owner, target) in &self.instances {
            let resolved = self.resolve(target, &by_title)?;
            match owner {
                Some(owner) if owner == resolved => {
                    return Err(GraphError::CycleDetected {
                        title: self.tasks[owner].title.clone(),
                    });
                }
                Some(owner) => {
                    graph.add_edge(nodes[owner], nodes[resolved], ());
                }
                None => {}
            }
        }

        toposort(&graph, None).map_err(|cycle| GraphError::CycleDetected {
            title: self.tasks[graph[cycle.node_id()]].title.clone(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::Iterate;
    use crate::task::Instance;

    fn render_cmd(frame: &str) -> Command {
        Command::new(["prman", frame])
    }

    #[test]
    fn simple_job_finalizes() {
        let job = Job::new("Render", 10.0).with_child(
            Task::new("Frame 1")
                .with_command(render_cmd("1.rib"))
                .with_command(render_cmd("1b.rib")),
        );
        let graph = job.finalize().unwrap();
        assert_eq!(graph.task_count, 1);
        assert_eq!(graph.command_count, 2);
        assert_eq!(graph.digest.len(), 64);
    }

    #[test]
    fn header_checks() {
        assert_eq!(Job::new("  ", 1.0).finalize(), Err(GraphError::EmptyJobTitle));
        assert!(matches!(
            Job::new("j", -1.0).finalize(),
            Err(GraphError::InvalidPriority(_))
        ));
        assert!(matches!(
            Job::new("j", f64::NAN).finalize(),
            Err(GraphError::InvalidPriority(_))
        ));
    }

    #[test]
    fn instance_resolves_by_title() {
        let job = Job::new("j", 1.0)
            .with_child(Task::new("Preflight").with_command(render_cmd("pre")))
            .with_child(Task::new("Render").with_child(Instance::new("Preflight")));
        assert!(job.finalize().is_ok());
    }

    #[test]
    fn instance_prefers_id_over_title() {
        // "shared" is both an id and another task's title; the id wins
        let job = Job::new("j", 1.0)
            .with_child(Task::new("A").with_id("shared"))
            .with_child(Task::new("shared"))
            .with_child(Task::new("shared2").with_child(Instance::new("shared")));
        assert!(job.finalize().is_ok());
    }

    #[test]
    fn ambiguous_instance() {
        let job = Job::new("j", 1.0)
            .with_child(Task::new("Same"))
            .with_child(Task::new("Same"))
            .with_child(Task::new("User").with_child(Instance::new("Same")));
        assert_eq!(
            job.finalize(),
            Err(GraphError::AmbiguousInstance {
                target: "Same".into(),
                matches: 2
            })
        );
    }

    #[test]
    fn instance_of_ancestor_is_a_cycle() {
        let job = Job::new("j", 1.0).with_child(
            Task::new("Outer").with_child(Task::new("Inner").with_child(Instance::new("Outer"))),
        );
        assert!(matches!(job.finalize(), Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn instance_of_self_is_a_cycle() {
        let job = Job::new("j", 1.0).with_child(Task::new("Loop").with_child(Instance::new("Loop")));
        assert_eq!(
            job.finalize(),
            Err(GraphError::CycleDetected { title: "Loop".into() })
        );
    }

    #[test]
    fn mutual_instances_are_a_cycle() {
        let job = Job::new("j", 1.0)
            .with_child(Task::new("A").with_child(Instance::new("B")))
            .with_child(Task::new("B").with_child(Instance::new("A")));
        assert!(matches!(job.finalize(), Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let job = Job::new("j", 1.0)
            .with_child(Task::new("A").with_id("x"))
            .with_child(Task::new("B").with_id("x"));
        assert_eq!(job.finalize(), Err(GraphError::DuplicateTaskId("x".into())));

        let job = Job::new("j", 1.0).with_child(
            Task::new("A")
                .with_command(render_cmd("1").with_id("c"))
                .with_command(render_cmd("2").with_id("c")),
        );
        assert_eq!(job.finalize(), Err(GraphError::DuplicateCommandId("c".into())));
    }

    #[test]
    fn bad_commands_rejected() {
        let job = Job::new("j", 1.0).with_child(Task::new("A").with_command(Command::default()));
        assert_eq!(job.finalize(), Err(GraphError::EmptyCommand { task: "A".into() }));

        let job = Job::new("j", 1.0).with_child(Task::new("A").with_command(render_cmd("1").with_slots(4, 2)));
        assert!(matches!(job.finalize(), Err(GraphError::InvalidSlots { .. })));

        let mut job = Job::new("j", 1.0);
        job.add_cleanup(Command::default());
        assert!(matches!(job.finalize(), Err(GraphError::EmptyCommand { .. })));
    }

    #[test]
    fn iterate_ids_must_stay_unique() {
        let template = Task::new("F ${f}").with_id("fixed");
        let job = Job::new("j", 1.0).with_child(Iterate::new("f", 1, 2, 1, template));
        assert_eq!(job.finalize(), Err(GraphError::DuplicateTaskId("fixed".into())));

        let template = Task::new("F ${f}").with_id("frame-${f}");
        let job = Job::new("j", 1.0).with_child(Iterate::new("f", 1, 2, 1, template));
        assert_eq!(job.finalize().map(|g| g.task_count), Ok(2));
    }

    #[test]
    fn instance_can_target_iterate_clone() {
        let job = Job::new("j", 1.0)
            .with_child(Iterate::new("f", 1, 3, 1, Task::new("Frame ${f}")))
            .with_child(Task::new("Proxy").with_child(Instance::new("Frame 2")));
        assert_eq!(job.finalize().map(|g| g.task_count), Ok(4));
    }

    #[test]
    fn empty_task_title_rejected() {
        let job = Job::new("j", 1.0).with_child(Task::new("Parent").with_child(Task::new("")));
        assert_eq!(
            job.finalize(),
            Err(GraphError::EmptyTaskTitle { parent: "Parent".into() })
        );
    }
}
