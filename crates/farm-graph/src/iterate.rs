//! Iterate: one template task expanded over a loop variable
//!
//! The loop `from..=to` step `by` is cut into frame chunks and the template
//! is cloned once per chunk. Inside the clone these tokens are replaced:
//!
//! | Token | Value |
//! |---|---|
//! | `${var}` | first value of the chunk |
//! | `${var_last}` | last value of the chunk |
//! | `${var_by}` | effective chunk size |
//! | `${var_index}` | 1-based chunk number |
//! | `${var:N}` | first value zero-padded to `N` digits |
//!
//! A negative `by` walks the range downward: chunks come out in
//! descending order, each still written low-to-high.

use crate::chunk::{chunk, FrameChunk};
use crate::error::GraphError;
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// Template expansion over a loop variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iterate {
    /// Loop variable name, referenced as `${var}`
    pub var: String,
    /// First loop value
    pub from: i64,
    /// Last loop value
    pub to: i64,
    /// Chunk size, sign gives direction
    pub by: i64,
    /// Upper bound on the number of clones
    pub max_chunks: Option<usize>,
    /// Task cloned for each chunk
    pub template: Task,
}

impl Iterate {
    /// Create an iterate over `from..=to` step `by`
    #[must_use]
    pub fn new(var: impl Into<String>, from: i64, to: i64, by: i64, template: Task) -> Self {
        Self {
            var: var.into(),
            from,
            to,
            by,
            max_chunks: None,
            template,
        }
    }

    /// Cap the number of clones
    #[must_use]
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = Some(max_chunks);
        self
    }

    /// Chunks this iterate walks, in iteration order
    ///
    /// # Errors
    /// [`GraphError::ZeroStep`] for `by == 0`, [`GraphError::UnreachableRange`]
    /// when the step points away from `to`, or a chunking error.
    pub fn chunks(&self) -> Result<Vec<FrameChunk>, GraphError> {
        if self.by == 0 {
            return Err(GraphError::ZeroStep {
                var: self.var.clone(),
            });
        }
        let ascending = self.by > 0;
        if (ascending && self.from > self.to) || (!ascending && self.from < self.to) {
            return Err(GraphError::UnreachableRange {
                var: self.var.clone(),
                from: self.from,
                to: self.to,
                by: self.by,
            });
        }

        let step = i64::try_from(self.by.unsigned_abs()).unwrap_or(i64::MAX);
        let max = self.max_chunks.unwrap_or(usize::MAX);

        if ascending {
            return Ok(chunk(self.from, self.to, step, max)?);
        }

        // Walk the mirrored range so the remainder lands at the low end.
        let mirrored = chunk(self.from.saturating_neg(), self.to.saturating_neg(), step, max)?;
        Ok(mirrored
            .into_iter()
            .map(|c| FrameChunk {
                first: c.last.saturating_neg(),
                last: c.first.saturating_neg(),
                by: c.by,
            })
            .collect())
    }

    /// Expand `template` once per chunk of this iterate
    ///
    /// # Errors
    /// Same as [`Iterate::chunks`].
    pub fn expand(&self, template: &Task) -> Result<Vec<Task>, GraphError> {
        let chunks = self.chunks()?;
        tracing::debug!(var = %self.var, clones = chunks.len(), "expanding iterate");

        Ok(chunks
            .iter()
            .enumerate()
            .map(|(index, c)| template.substituted(&Substitution::for_chunk(&self.var, index, c)))
            .collect())
    }

    /// Expand the stored template
    ///
    /// # Errors
    /// Same as [`Iterate::chunks`].
    pub fn expand_template(&self) -> Result<Vec<Task>, GraphError> {
        self.expand(&self.template)
    }

    pub(crate) fn substituted(&self, subs: &Substitution) -> Self {
        Self {
            template: self.template.substituted(subs),
            ..self.clone()
        }
    }
}

/// Token replacement table for one chunk
#[derive(Debug, Clone, Default)]
pub(crate) struct Substitution {
    pairs: Vec<(String, String)>,
    padded: Option<(String, i64)>,
}

impl Substitution {
    pub(crate) fn for_chunk(var: &str, index: usize, chunk: &FrameChunk) -> Self {
        Self {
            pairs: vec![
                (format!("${{{var}}}"), chunk.first.to_string()),
                (format!("${{{var}_last}}"), chunk.last.to_string()),
                (format!("${{{var}_by}}"), chunk.by.to_string()),
                (format!("${{{var}_index}}"), (index + 1).to_string()),
            ],
            padded: Some((format!("${{{var}:"), chunk.first)),
        }
    }

    pub(crate) fn apply(&self, text: &str) -> String {
        if !text.contains("${") {
            return text.to_string();
        }
        let replaced = self
            .pairs
            .iter()
            .fold(text.to_string(), |acc, (token, value)| acc.replace(token, value));
        match &self.padded {
            Some((open, value)) => pad_tokens(&replaced, open, *value),
            None => replaced,
        }
    }
}

/// Replace every `<open>N}` with `value` zero-padded to `N` digits
///
/// Tokens whose width is not a number are left as written.
fn pad_tokens(text: &str, open: &str, value: i64) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        let after = &rest[start + open.len()..];
        let width = after
            .find('}')
            .and_then(|end| after[..end].parse::<usize>().ok().map(|w| (w, end)));
        match width {
            Some((width, end)) => {
                if value < 0 {
                    out.push_str(&format!("-{:0width$}", value.unsigned_abs(), width = width.saturating_sub(1)));
                } else {
                    out.push_str(&format!("{value:0width$}"));
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(open);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
