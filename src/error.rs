//! Error types returned at the client/server construction and decode boundaries.

use std::net::AddrParseError;

/// Failure constructing a [`crate::Client`] or [`crate::Server`].
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("failed to resolve server address: {0}")]
    Resolve(#[source] std::io::Error),

    #[error("server address did not resolve to any socket address")]
    NoAddress,

    #[error("invalid bind address: {0}")]
    Address(#[from] AddrParseError),

    #[error("failed to create datagram socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("failed to bind datagram socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to configure socket: {0}")]
    Configure(#[source] std::io::Error),
}

/// Failure decoding a datagram as a [`crate::wire::Packet`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("datagram too short: got {got} bytes, need {want}")]
    TooShort { got: usize, want: usize },

    #[error("bad magic: got {got:#010x}, want {want:#010x}")]
    BadMagic { got: u32, want: u32 },
}
