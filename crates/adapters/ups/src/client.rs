//! NUT (Network UPS Tools) line-protocol client.
//!
//! The protocol is plain text over TCP (default port 3493):
//!
//! ```text
//! > LIST UPS
//! < BEGIN LIST UPS
//! < UPS main "Server room UPS"
//! < END LIST UPS
//! > LIST VAR main
//! < BEGIN LIST VAR main
//! < VAR main battery.charge "97"
//! < ...
//! < END LIST VAR main
//! ```
//!
//! Error responses are a single `ERR <code>` line.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

/// Failures talking to the NUT daemon.
#[derive(Debug, thiserror::Error)]
pub enum NutError {
    #[error("nut io failed")]
    Io(#[from] std::io::Error),

    /// The daemon answered `ERR <code>`.
    #[error("nut daemon refused: {0}")]
    Refused(String),

    /// A response line did not match the protocol shape.
    #[error("unexpected nut response: {0}")]
    Protocol(String),

    #[error("not connected to nut daemon")]
    NotConnected,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Minimal async client for the NUT daemon.
pub struct NutClient {
    host: String,
    port: u16,
    connection: Mutex<Option<Connection>>,
}

impl NutClient {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection: Mutex::new(None),
        }
    }

    /// Open the TCP connection, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the daemon is unreachable.
    pub async fn connect(&self) -> Result<(), NutError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (read_half, writer) = stream.into_split();
        *self.connection.lock().await = Some(Connection {
            reader: BufReader::new(read_half),
            writer,
        });
        Ok(())
    }

    /// Whether a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Non-async variant for synchronous callers. A slot that is locked is
    /// in the middle of a command, which implies a live connection.
    #[must_use]
    pub fn is_connected_blocking(&self) -> bool {
        match self.connection.try_lock() {
            Ok(guard) => guard.is_some(),
            Err(_) => true,
        }
    }

    /// Send `LOGOUT` and drop the connection. Best effort.
    pub async fn disconnect(&self) {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_mut() {
            let _ = connection.writer.write_all(b"LOGOUT\n").await;
        }
        *guard = None;
    }

    async fn send(connection: &mut Connection, command: &str) -> Result<(), NutError> {
        connection
            .writer
            .write_all(format!("{command}\n").as_bytes())
            .await?;
        Ok(())
    }

    async fn read_line(connection: &mut Connection) -> Result<String, NutError> {
        let mut line = String::new();
        let read = connection.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(NutError::Protocol("connection closed".to_string()));
        }
        let line = line.trim_end().to_string();
        if let Some(code) = line.strip_prefix("ERR ") {
            return Err(NutError::Refused(code.to_string()));
        }
        Ok(line)
    }

    /// Run a command whose response is a `BEGIN <cmd>` … `END <cmd>` block,
    /// returning the payload lines in between.
    async fn command_list(&self, command: &str) -> Result<Vec<String>, NutError> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(NutError::NotConnected)?;

        Self::send(connection, command).await?;

        let first = Self::read_line(connection).await?;
        if !first.starts_with("BEGIN ") {
            return Err(NutError::Protocol(first));
        }

        let mut lines = Vec::new();
        loop {
            let line = Self::read_line(connection).await?;
            if line.starts_with("END ") {
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    /// Names of every UPS the daemon monitors.
    ///
    /// # Errors
    ///
    /// Returns a protocol, refusal, or IO error.
    pub async fn list_ups(&self) -> Result<Vec<String>, NutError> {
        let lines = self.command_list("LIST UPS").await?;
        lines.iter().map(|line| parse_ups_line(line)).collect()
    }

    /// All variables reported for one UPS (e.g. `battery.charge` → `"97"`).
    ///
    /// # Errors
    ///
    /// Returns a protocol, refusal, or IO error.
    pub async fn list_vars(&self, ups_name: &str) -> Result<HashMap<String, String>, NutError> {
        let lines = self.command_list(&format!("LIST VAR {ups_name}")).await?;
        lines
            .iter()
            .map(|line| parse_var_line(line, ups_name))
            .collect()
    }
}

/// Parse `UPS <name> "<description>"`.
fn parse_ups_line(line: &str) -> Result<String, NutError> {
    let rest = line
        .strip_prefix("UPS ")
        .ok_or_else(|| NutError::Protocol(line.to_string()))?;
    let name = rest.split_whitespace().next().unwrap_or_default();
    if name.is_empty() {
        return Err(NutError::Protocol(line.to_string()));
    }
    Ok(name.to_string())
}

/// Parse `VAR <ups> <variable> "<value>"`.
fn parse_var_line(line: &str, ups_name: &str) -> Result<(String, String), NutError> {
    let rest = line
        .strip_prefix("VAR ")
        .and_then(|rest| rest.strip_prefix(ups_name))
        .map(str::trim_start)
        .ok_or_else(|| NutError::Protocol(line.to_string()))?;

    let (variable, value) = rest
        .split_once(' ')
        .ok_or_else(|| NutError::Protocol(line.to_string()))?;
    let value = value.trim().trim_matches('"');
    Ok((variable.to_string(), value.to_string()))
}
