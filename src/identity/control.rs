//! Minimal Tor control-port client
//!
//! Speaks just enough of the control protocol to authenticate and send
//! `SIGNAL NEWNYM`. Replies are `NNN-text` continuation lines terminated by a
//! `NNN text` line; anything other than 250 is an error.

use crate::identity::IdentityUnavailable;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// Authentication methods advertised by `PROTOCOLINFO`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub methods: Vec<String>,
    pub cookie_file: Option<PathBuf>,
}

impl AuthInfo {
    fn supports(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Client for one Tor control endpoint
#[derive(Debug, Clone)]
pub struct TorController {
    endpoint: String,
    password: Option<String>,
}

impl TorController {
    pub fn new(endpoint: impl Into<String>, password: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            password,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Authenticates and asks Tor to switch to clean circuits
    pub async fn signal_newnym(&self) -> Result<(), IdentityUnavailable> {
        let stream = timeout(CONTROL_TIMEOUT, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| {
                IdentityUnavailable::new(format!(
                    "timed out connecting to control port {}",
                    self.endpoint
                ))
            })?
            .map_err(|e| {
                IdentityUnavailable::new(format!(
                    "cannot reach control port {}: {}",
                    self.endpoint, e
                ))
            })?;

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        self.authenticate(&mut reader, &mut write_half).await?;
        command(&mut reader, &mut write_half, "SIGNAL NEWNYM").await?;

        // Best effort; Tor closes the connection either way
        let _ = write_half.write_all(b"QUIT\r\n").await;

        tracing::debug!("Tor accepted NEWNYM on {}", self.endpoint);
        Ok(())
    }

    async fn authenticate<R, W>(
        &self,
        reader: &mut BufReader<R>,
        writer: &mut W,
    ) -> Result<(), IdentityUnavailable>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if let Some(password) = &self.password {
            let line = format!("AUTHENTICATE {}", quote(password));
            return command(reader, writer, &line).await.map(|_| ());
        }

        let reply = command(reader, writer, "PROTOCOLINFO 1").await?;
        let info = parse_protocol_info(&reply);

        if info.supports("NULL") {
            return command(reader, writer, "AUTHENTICATE").await.map(|_| ());
        }

        if info.supports("COOKIE") {
            let path = info.cookie_file.ok_or_else(|| {
                IdentityUnavailable::new("Tor offers cookie auth without a cookie file")
            })?;
            let cookie = tokio::fs::read(&path).await.map_err(|e| {
                IdentityUnavailable::new(format!(
                    "cannot read Tor cookie {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let line = format!("AUTHENTICATE {}", hex::encode(cookie));
            return command(reader, writer, &line).await.map(|_| ());
        }

        Err(IdentityUnavailable::new(format!(
            "no usable control-port auth method (offered: {}); set control-password",
            info.methods.join(",")
        )))
    }
}

/// Sends one command and reads its reply lines
async fn command<R, W>(
    reader: &mut BufReader<R>,
    writer: &mut W,
    line: &str,
) -> Result<Vec<String>, IdentityUnavailable>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let verb = line.split_whitespace().next().unwrap_or_default().to_string();

    writer
        .write_all(format!("{}\r\n", line).as_bytes())
        .await
        .map_err(|e| IdentityUnavailable::new(format!("control port write failed: {}", e)))?;

    let reply = timeout(CONTROL_TIMEOUT, read_reply(reader))
        .await
        .map_err(|_| IdentityUnavailable::new(format!("Tor did not answer {}", verb)))??;

    match reply.last() {
        Some(last) if last.starts_with("250") => Ok(reply),
        Some(last) => Err(IdentityUnavailable::new(format!(
            "Tor rejected {}: {}",
            verb, last
        ))),
        None => Err(IdentityUnavailable::new(format!(
            "empty reply to {}",
            verb
        ))),
    }
}

/// Reads reply lines up to and including the final `NNN ` line
async fn read_reply<R>(reader: &mut BufReader<R>) -> Result<Vec<String>, IdentityUnavailable>
where
    R: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    let mut in_data = false;

    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| IdentityUnavailable::new(format!("control port read failed: {}", e)))?;
        if read == 0 {
            return Err(IdentityUnavailable::new("control port closed the connection"));
        }

        let line = line.trim_end_matches(['\r', '\n']).to_string();

        if in_data {
            if line == "." {
                in_data = false;
            }
            continue;
        }

        let separator = line.as_bytes().get(3).copied();
        let is_final = separator == Some(b' ') || line.len() == 3;
        in_data = separator == Some(b'+');
        lines.push(line);

        if is_final {
            return Ok(lines);
        }
    }
}

/// Extracts the auth methods and cookie path from a `PROTOCOLINFO` reply
pub fn parse_protocol_info(lines: &[String]) -> AuthInfo {
    let mut info = AuthInfo::default();

    for line in lines {
        let Some(rest) = line.strip_prefix("250-AUTH ") else {
            continue;
        };

        for field in split_fields(rest) {
            if let Some(methods) = field.strip_prefix("METHODS=") {
                info.methods = methods.split(',').map(str::to_string).collect();
            } else if let Some(path) = field.strip_prefix("COOKIEFILE=") {
                info.cookie_file = Some(PathBuf::from(unquote(path)));
            }
        }
    }

    info
}

/// Splits on spaces that are not inside a quoted string
fn split_fields(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            ' ' if !quoted => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    inner.replace("\\\"", "\"").replace("\\\\", "\\")
}
