//! Crate error type.

use std::io;

use crate::types::CommandResult;

/// Everything that can go wrong while driving the command server.
#[derive(thiserror::Error, Debug)]
pub enum HgError {
    /// The given path does not exist or has no `.hg` directory.
    #[error("{0}: not a Mercurial repository")]
    InvalidRepository(std::path::PathBuf),

    /// The `hg` process could not be spawned.
    #[error("failed to launch hg server: {0}")]
    ServerLaunchFailed(#[source] io::Error),

    /// The handshake frame was missing or malformed.
    #[error("handshake error: {0}")]
    HandshakeError(String),

    /// The server closed the pipe, or a short read/write occurred.
    #[error("hg server closed the connection")]
    ServerClosed,

    /// The frame stream violated the wire protocol.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The command returned an exit code outside the ones it accepts.
    #[error("command failed with exit code {}: {}{}", .result.exit_code, .result.stdout, .result.stderr)]
    CommandFailed {
        /// The captured stdout/stderr/exit code of the failed command.
        result: CommandResult,
    },

    /// Output from the server could not be parsed into the expected shape.
    #[error("failed to parse command output: {0}")]
    ParseError(String),

    /// A caller-supplied argument was invalid (e.g. an empty file list).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<io::Error> for HgError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => HgError::ServerClosed,
            _ => HgError::ProtocolError(err.to_string()),
        }
    }
}

/// Convenience alias for `Result<T, HgError>`.
pub type Result<T> = std::result::Result<T, HgError>;
