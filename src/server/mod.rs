//! TCP server for the Store and Search calls
//!
//! One task per connection. Each connection carries exactly one call: an
//! `open` frame selects the method, and the server always answers with a
//! final `close` frame carrying the call status.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use crate::rpc::{Frame, FrameReader, FrameWriter, Method, Status, StatusCode};
use crate::storage::PropertyStorage;
use crate::{Error, Result};

pub mod service;

pub use service::{ConfigStoreService, StoreOutcome};

/// Server state
pub struct Server {
    listen: SocketAddr,
    service: ConfigStoreService,
}

impl Server {
    pub fn new(listen: SocketAddr, storage: Arc<dyn PropertyStorage>) -> Self {
        Self {
            listen,
            service: ConfigStoreService::new(storage),
        }
    }

    pub fn service(&self) -> &ConfigStoreService {
        &self.service
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.listen).await?;
        self.serve(listener).await
    }

    /// Serve connections on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. In-flight calls keep running on their
    /// own tasks.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        tracing::info!("Starting server on {}", addr);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down server on {}", addr);
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    let service = self.service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(service, stream).await {
                            tracing::debug!(%peer, "Connection ended with error: {}", e);
                        }
                    });
                }
            }
        }
    }
}

/// Drive one call to completion on `stream`.
pub async fn handle_connection(service: ConfigStoreService, stream: TcpStream) -> Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    let outcome = match reader.next_frame().await {
        Ok(Some(Frame::Open { method: Method::Store, .. })) => {
            tracing::debug!("Store call opened");
            service.store(&mut reader, &mut writer).await
        }
        Ok(Some(Frame::Open { method: Method::Search, query })) => {
            tracing::debug!("Search call opened");
            service.search(query.unwrap_or_default(), &mut writer).await
        }
        Ok(Some(other)) => Err(Error::Status {
            code: StatusCode::InvalidArgument,
            message: format!("expected open frame, got {}", other.kind()),
        }),
        Ok(None) => return Ok(()),
        Err(e) => Err(e),
    };

    let status = match &outcome {
        Ok(()) => Status::ok(),
        Err(e) => {
            tracing::warn!("Call failed: {}", e);
            Status::from(e)
        }
    };

    writer.send_frame(&Frame::Close(status)).await?;
    writer.close().await?;
    outcome
}
