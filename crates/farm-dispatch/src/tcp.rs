//! Line protocol engine over TCP
//!
//! Requests are a header line followed by exactly `len` bytes of graph text:
//!
//! ```text
//! VALIDATE <len>\n<graph>
//! SPOOL <owner> <len>\n<graph>
//! ```
//!
//! The engine answers with one line: `OK`, `OK <job id>` or `ERR <message>`.

use crate::engine::{DispatchEngine, JobId};
use crate::error::EngineError;
use async_trait::async_trait;
use farm_graph::SerializedGraph;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Engine reached at `host:port`
#[derive(Debug, Clone)]
pub struct TcpEngine {
    addr: String,
}

impl TcpEngine {
    /// Engine at `host:port`
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
        }
    }

    /// Engine address
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn exchange(&self, header: String, body: &str) -> Result<Option<String>, EngineError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| EngineError::Connect {
                addr: self.addr.clone(),
                reason: e.to_string(),
            })?;
        let (read, mut write) = stream.into_split();

        write.write_all(header.as_bytes()).await.map_err(transport)?;
        write.write_all(body.as_bytes()).await.map_err(transport)?;
        write.flush().await.map_err(transport)?;

        let mut line = String::new();
        let n = BufReader::new(read).read_line(&mut line).await.map_err(transport)?;
        if n == 0 {
            return Err(EngineError::Protocol("connection closed before reply".into()));
        }
        parse_reply(&line)
    }
}

fn transport(err: std::io::Error) -> EngineError {
    EngineError::Transport(err.to_string())
}

/// Request header for a validation
#[must_use]
pub fn validate_header(graph: &SerializedGraph) -> String {
    format!("VALIDATE {}\n", graph.text.len())
}

/// Request header for a spool
///
/// # Errors
/// [`EngineError::Protocol`] when `owner` is empty or contains whitespace.
pub fn spool_header(graph: &SerializedGraph, owner: &str) -> Result<String, EngineError> {
    if owner.is_empty() || owner.chars().any(char::is_whitespace) {
        return Err(EngineError::Protocol(format!("invalid owner {owner:?}")));
    }
    Ok(format!("SPOOL {owner} {}\n", graph.text.len()))
}

/// Parse one reply line
///
/// # Errors
/// [`EngineError::Rejected`] for `ERR`, [`EngineError::Protocol`] otherwise.
pub fn parse_reply(line: &str) -> Result<Option<String>, EngineError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == "OK" {
        return Ok(None);
    }
    if let Some(id) = line.strip_prefix("OK ") {
        let id = id.trim();
        return Ok((!id.is_empty()).then(|| id.to_string()));
    }
    if line == "ERR" {
        return Err(EngineError::Rejected(String::new()));
    }
    if let Some(message) = line.strip_prefix("ERR ") {
        return Err(EngineError::Rejected(message.to_string()));
    }
    Err(EngineError::Protocol(format!("unexpected reply {line:?}")))
}

#[async_trait]
impl DispatchEngine for TcpEngine {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn validate(&self, graph: &SerializedGraph) -> Result<(), EngineError> {
        self.exchange(validate_header(graph), &graph.text).await.map(|_| ())
    }

    async fn submit(&self, graph: &SerializedGraph, owner: &str) -> Result<JobId, EngineError> {
        let header = spool_header(graph, owner)?;
        match self.exchange(header, &graph.text).await? {
            Some(id) => Ok(JobId(id)),
            None => Err(EngineError::Protocol("spool reply carried no job id".into())),
        }
    }
}
