//! BGP wire format error types.

use thiserror::Error;

/// Errors raised while encoding or parsing BGP messages and path attributes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer ended before the structure was complete
    #[error("incomplete message")]
    Incomplete,

    /// Message marker is not sixteen 0xFF octets
    #[error("bad message marker")]
    Marker,

    /// Header length disagrees with the buffer or the protocol bounds
    #[error("bad message length: {0}")]
    Length(usize),

    /// Message type is not UPDATE
    #[error("unexpected message type {0}")]
    Type(u8),

    /// Encoded message exceeds the negotiated maximum
    #[error("message size limit exceeded: {0}")]
    Size(usize),

    /// Attribute or NLRI contents are malformed
    #[error("malformed attribute {0}")]
    Malformed(u8),

    /// Prefix is invalid for its address family
    #[error("invalid prefix: {0}")]
    Prefix(String),
}
