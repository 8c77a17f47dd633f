//! The accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::engine::Engine;

use super::connection::Connection;
use super::handshake::handshake;

/// TCP server: accepts connections and spawns one task per client.
pub struct Server {
    listener: TcpListener,
    engine: Arc<Engine>,
    /// Bounds concurrent connections (`max_connections`).
    connection_permits: Arc<Semaphore>,
}

impl Server {
    /// Creates a server over a bound listener.
    pub fn new(listener: TcpListener, engine: Arc<Engine>, max_connections: u32) -> Self {
        Self {
            listener,
            engine,
            connection_permits: Arc::new(Semaphore::new(max_connections as usize)),
        }
    }

    /// Accepts connections until Ctrl-C.
    ///
    /// Shutdown closes the listener; connections already in flight detect
    /// the closed peer on their next socket read.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        info!(addr = %self.listener.local_addr()?, "server listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            // Transient accept errors (EMFILE and friends)
                            // should not kill the server.
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&self.connection_permits).try_acquire_owned()
                    else {
                        warn!(%peer, "connection limit reached, refusing");
                        drop(stream);
                        continue;
                    };

                    let engine = Arc::clone(&self.engine);
                    tokio::spawn(async move {
                        info!(%peer, "connection accepted");
                        match handshake(stream).await {
                            Ok(framed) => {
                                let connection = Connection::new(framed, engine);
                                if let Err(e) = connection.run().await {
                                    warn!(%peer, error = %e, "connection error");
                                }
                            }
                            Err(e) => {
                                warn!(%peer, error = %e, "handshake failed");
                            }
                        }
                        info!(%peer, "connection closed");
                        drop(permit);
                    });
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        error!(error = %e, "signal handler failed");
                    }
                    info!("shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }
}
