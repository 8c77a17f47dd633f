//! TCP front-end speaking the PostgreSQL wire protocol.
//!
//! One tokio task per connection; each connection runs its statements
//! sequentially against the shared [`Engine`](crate::engine::Engine)
//! through a blocking section. Ctrl-C flips the shutdown flag and stops
//! the accept loop; connections in flight notice the closed peer on their
//! next read.

mod connection;
mod handshake;
mod listener;

pub use connection::Connection;
pub use handshake::handshake;
pub use listener::Server;
