//! A minimal client for the MPD text protocol.
//!
//! Every command is written as a single line and answered by zero or more `key: value` lines,
//! terminated by either `OK` or an `ACK` error line. Only one command may be in flight per
//! connection, which is why callers sharing a connection must serialize access to it.


use tokio::{
    io::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, BufStream},
    net::TcpStream,
};
use tracing::instrument;

use crate::{args::MpdNetwork, playback::PlaybackAttributes};

const GREETING_PREFIX: &str = "OK MPD ";

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum MpdError {
        #[error("I/O error on MPD connection: {0}")]
        Io(#[from] std::io::Error),
        #[error("MPD closed the connection")]
        Closed,
        #[error("unexpected MPD greeting: {0:?}")]
        Greeting(String),
        #[error("MPD error {code}@{index} ({command}): {message}")]
        Ack {
            code: u32,
            index: u32,
            command: String,
            message: String,
        },
        #[error("malformed MPD response line: {0:?}")]
        Malformed(String),
    }
}

pub use error::MpdError;

/// Anything an MPD connection can run over.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

pub struct MpdConnection {
    stream: BufStream<Box<dyn Io>>,
    version: String,
    broken: bool,
}

impl std::fmt::Debug for MpdConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpdConnection")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl MpdConnection {
    /// Connect to MPD and authenticate if a password is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached, does not greet like MPD, or rejects the
    /// password.
    #[instrument(skip(password))]
    pub async fn connect(
        network: MpdNetwork,
        address: &str,
        password: Option<&str>,
    ) -> Result<Self, MpdError> {
        let stream: Box<dyn Io> = match network {
            MpdNetwork::Tcp => Box::new(TcpStream::connect(&*tcp_address(address)).await?),
            #[cfg(unix)]
            MpdNetwork::Unix => Box::new(tokio::net::UnixStream::connect(address).await?),
            #[cfg(not(unix))]
            MpdNetwork::Unix => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix sockets are not available on this platform",
                )
                .into())
            }
        };
        let mut conn = Self::from_stream(stream).await?;
        tracing::info!(version = conn.version(), "Connected to MPD");
        if let Some(password) = password {
            conn.command("password", &[password]).await?;
        }
        Ok(conn)
    }

    /// Wrap an already established stream, consuming the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the first line is not an MPD greeting.
    pub async fn from_stream(stream: impl Io + 'static) -> Result<Self, MpdError> {
        let boxed: Box<dyn Io> = Box::new(stream);
        let mut conn = Self {
            stream: BufStream::new(boxed),
            version: String::new(),
            broken: false,
        };
        let greeting = conn.read_line().await?;
        let Some(version) = greeting.strip_prefix(GREETING_PREFIX) else {
            return Err(MpdError::Greeting(greeting));
        };
        conn.version = version.to_owned();
        Ok(conn)
    }

    /// Protocol version announced by the server.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run a command and collect its `key: value` response.
    ///
    /// Once the connection has failed mid-command it can no longer be trusted to be in step with
    /// the server, and every later command returns [`MpdError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`MpdError::Ack`] if MPD rejects the command, or an I/O or protocol error if the
    /// connection misbehaves.
    pub async fn command(
        &mut self,
        name: &str,
        args: &[&str],
    ) -> Result<Vec<(String, String)>, MpdError> {
        if self.broken {
            return Err(MpdError::Closed);
        }
        let result = self.exchange(name, args).await;
        if matches!(result, Err(MpdError::Io(_) | MpdError::Closed)) {
            tracing::warn!(command = name, "MPD connection is unusable from now on");
            self.broken = true;
        }
        result
    }

    async fn exchange(
        &mut self,
        name: &str,
        args: &[&str],
    ) -> Result<Vec<(String, String)>, MpdError> {
        let mut line = String::from(name);
        for arg in args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        tracing::debug!(command = name, "Sending MPD command");
        line.push('\n');
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(connection_error)?;
        self.stream.flush().await.map_err(connection_error)?;

        // A bad line does not end the reply: keep reading up to `OK` so the next command starts
        // on a clean slate
        let mut pairs = Vec::new();
        let mut malformed = None;
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                return match malformed {
                    Some(line) => Err(MpdError::Malformed(line)),
                    None => Ok(pairs),
                };
            }
            if let Some(ack) = line.strip_prefix("ACK ") {
                return Err(parse_ack(ack).unwrap_or(MpdError::Malformed(line)));
            }
            let Some((key, value)) = line.split_once(": ") else {
                tracing::warn!(command = name, %line, "Malformed MPD response line");
                if malformed.is_none() {
                    malformed = Some(line);
                }
                continue;
            };
            pairs.push((key.to_owned(), value.to_owned()));
        }
    }

    /// `status`: player state, volume, playlist position...
    pub async fn status(&mut self) -> Result<PlaybackAttributes, MpdError> {
        Ok(self.command("status", &[]).await?.into_iter().collect())
    }

    /// `currentsong`: tags of the song being played. Empty if there is none.
    pub async fn current_song(&mut self) -> Result<PlaybackAttributes, MpdError> {
        Ok(self.command("currentsong", &[]).await?.into_iter().collect())
    }

    pub async fn ping(&mut self) -> Result<(), MpdError> {
        self.command("ping", &[]).await.map(drop)
    }

    /// Block until one of `subsystems` changes, returning the names of the changed subsystems.
    pub async fn idle(&mut self, subsystems: &[&str]) -> Result<Vec<String>, MpdError> {
        Ok(self
            .command("idle", subsystems)
            .await?
            .into_iter()
            .filter(|(key, _)| key == "changed")
            .map(|(_, subsystem)| subsystem)
            .collect())
    }

    async fn read_line(&mut self) -> Result<String, MpdError> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await.map_err(connection_error)? == 0 {
            return Err(MpdError::Closed);
        }
        let len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(len);
        Ok(line)
    }
}

/// Report a peer hanging up as [`MpdError::Closed`], whichever direction noticed it first.
fn connection_error(e: std::io::Error) -> MpdError {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::UnexpectedEof => MpdError::Closed,
        _ => MpdError::Io(e),
    }
}

/// MPD listens on all interfaces by default, so ":6600" is taken to mean the local one.
fn tcp_address(address: &str) -> std::borrow::Cow<'_, str> {
    if address.starts_with(':') {
        format!("localhost{address}").into()
    } else {
        address.into()
    }
}

/// Quote a command argument, escaping backslashes and double quotes.
fn quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Parse the part of `ACK [code@index] {command} message` after `ACK `.
fn parse_ack(s: &str) -> Option<MpdError> {
    let (location, rest) = s.strip_prefix('[')?.split_once("] ")?;
    let (code, index) = location.split_once('@')?;
    let (command, message) = rest.strip_prefix('{')?.split_once('}')?;
    Some(MpdError::Ack {
        code: code.parse().ok()?,
        index: index.parse().ok()?,
        command: command.to_owned(),
        message: message.trim_start().to_owned(),
    })
}
