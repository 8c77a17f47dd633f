//! Messages received from the client.

use std::collections::HashMap;

/// Messages of the startup phase (no type byte, length-prefixed only).
#[derive(Debug, PartialEq, Eq)]
pub enum StartupMessage {
    /// Length + code 80877103: the client asks to negotiate TLS.
    SslRequest,
    /// Length + protocol 196608 + null-terminated parameter pairs.
    Startup {
        /// `user`, `database`, and friends.
        parameters: HashMap<String, String>,
    },
    /// A startup packet with an unknown code.
    Unknown(i32),
}

/// Messages after the handshake (type byte + length + body).
#[derive(Debug, PartialEq, Eq)]
pub enum FrontendMessage {
    /// 'Q': a simple query carrying null-terminated SQL.
    Query(String),
    /// 'X': the client is going away.
    Terminate,
    /// Anything this server does not implement.
    Unknown(u8),
}
