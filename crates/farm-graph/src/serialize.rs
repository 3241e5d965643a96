//! Nested block text for finalized graphs
//!
//! Every value is brace-quoted, with `\`, `{` and `}` escaped, so the
//! output is whitespace-insensitive for a Tcl-style reader. Lists are
//! brace-quoted lists of brace-quoted items. Empty optional attributes
//! are omitted.

use crate::command::Command;
use crate::finalize::{Expanded, Item};
use crate::job::Job;
use std::fmt::Write as _;

const INDENT: &str = "    ";

pub(crate) fn job(job: &Job, items: &[Item]) -> String {
    let mut out = Writer::default();
    out.line_start();
    out.push("Job");
    out.attr("title", &job.title);
    out.raw_attr("priority", &format_priority(job.priority));
    out.opt_attr("service", job.service.as_deref());
    out.opt_attr("tier", job.tier.as_deref());
    out.opt_attr("owner", job.owner.as_deref());
    out.list_attr("envkey", &job.envkeys);
    out.list_attr("projects", &job.projects);
    out.list_attr("tags", &job.tags);
    if !job.metadata.is_empty() {
        let pairs: Vec<String> = job.metadata.iter().map(|(k, v)| format!("{k}={v}")).collect();
        out.list_attr("metadata", &pairs);
    }
    out.opt_attr("comment", job.comment.as_deref());
    if job.paused {
        out.raw_attr("paused", "1");
    }
    if !job.dirmaps.is_empty() {
        let maps: Vec<String> = job
            .dirmaps
            .iter()
            .map(|m| format!("{{{} {} {}}}", quote(&m.src), quote(&m.dst), quote(&m.zone)))
            .collect();
        out.raw_attr("dirmaps", &format!("{{{}}}", maps.join(" ")));
    }
    out.subtasks(items);
    out.commands("cleanup", &job.cleanup);
    out.push("\n");
    out.buf
}

#[derive(Default)]
struct Writer {
    buf: String,
    depth: usize,
}

impl Writer {
    fn push(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str(INDENT);
        }
    }

    fn attr(&mut self, name: &str, value: &str) {
        let _ = write!(self.buf, " -{name} {}", quote(value));
    }

    fn raw_attr(&mut self, name: &str, value: &str) {
        let _ = write!(self.buf, " -{name} {value}");
    }

    fn opt_attr(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.attr(name, value);
        }
    }

    fn list_attr(&mut self, name: &str, values: &[String]) {
        if !values.is_empty() {
            self.raw_attr(name, &quote_list(values));
        }
    }

    /// Open ` -name {`, run `body` one level deeper, then close the block
    fn block(&mut self, name: &str, body: impl FnOnce(&mut Self)) {
        let _ = write!(self.buf, " -{name} {{\n");
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line_start();
        self.push("}");
    }

    fn subtasks(&mut self, items: &[Item]) {
        if items.is_empty() {
            return;
        }
        self.block("subtasks", |w| {
            for item in items {
                w.line_start();
                match item {
                    Item::Task(expanded) => w.task(expanded),
                    Item::Instance(target) => {
                        let _ = write!(w.buf, "Instance {}", quote(target));
                    }
                }
                w.push("\n");
            }
        });
    }

    fn task(&mut self, expanded: &Expanded) {
        let task = &expanded.task;
        let _ = write!(self.buf, "Task {}", quote(&task.title));
        self.opt_attr("id", task.id.as_deref());
        self.opt_attr("service", task.service.as_deref());
        if task.serial_subtasks {
            self.raw_attr("serialsubtasks", "1");
        }
        self.opt_attr("preview", task.preview.as_deref());
        self.opt_attr("metadata", task.metadata.as_deref());
        self.subtasks(&expanded.children);
        self.commands("cmds", &task.commands);
        self.commands("cleanup", &task.cleanup);
    }

    fn commands(&mut self, name: &str, commands: &[Command]) {
        if commands.is_empty() {
            return;
        }
        self.block(name, |w| {
            for command in commands {
                w.line_start();
                w.command(command);
                w.push("\n");
            }
        });
    }

    fn command(&mut self, command: &Command) {
        let _ = write!(self.buf, "{} {}", command.kind.keyword(), quote_list(&command.argv));
        self.opt_attr("id", command.id.as_deref());
        self.opt_attr("service", command.service.as_deref());
        self.list_attr("envkey", &command.envkeys);
        self.list_attr("tags", &command.tags);
        if let Some(atleast) = command.atleast {
            self.raw_attr("atleast", &atleast.to_string());
        }
        if let Some(atmost) = command.atmost {
            self.raw_attr("atmost", &atmost.to_string());
        }
        if !command.retry_codes.is_empty() {
            let codes: Vec<String> = command.retry_codes.iter().map(ToString::to_string).collect();
            self.raw_attr("retryrc", &format!("{{{}}}", codes.join(" ")));
        }
    }
}

/// Brace-quote one value
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('{');
    for ch in value.chars() {
        if matches!(ch, '\\' | '{' | '}') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('}');
    out
}

fn quote_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("{{{}}}", items.join(" "))
}

#[allow(clippy::cast_possible_truncation)]
fn format_priority(priority: f64) -> String {
    if priority.fract() == 0.0 && priority.abs() < 1e15 {
        format!("{}", priority as i64)
    } else {
        priority.to_string()
    }
}
