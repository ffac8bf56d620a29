//! Streaming RPC plumbing
//!
//! Frames are newline-delimited JSON over any async byte stream (TCP in
//! production, in-memory duplex pipes in tests). Each half of a connection is
//! wrapped separately so reads and writes can be driven independently.

pub mod frame;

pub use frame::{Frame, Method, Status, StatusCode};

use crate::property::Property;
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

/// Reads frames from the receiving half of a connection.
pub struct FrameReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next frame, or `None` once the peer has closed its sending side.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|e| Error::Transport(format!("malformed frame: {}", e)));
        }
    }
}

/// Writes frames to the sending half of a connection.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut json = serde_json::to_string(frame)?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Half-close: signal that no more frames will be sent.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Inbound half of a property stream.
#[async_trait]
pub trait PropertySource: Send {
    /// Next property, or `None` on a clean end of stream.
    async fn recv(&mut self) -> Result<Option<Property>>;
}

/// Outbound half of a property stream.
#[async_trait]
pub trait PropertySink: Send {
    async fn send(&mut self, property: Property) -> Result<()>;
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PropertySource for FrameReader<R> {
    async fn recv(&mut self) -> Result<Option<Property>> {
        match self.next_frame().await? {
            None => Ok(None),
            Some(Frame::Property(property)) => Ok(Some(property)),
            Some(other) => Err(Error::Transport(format!(
                "unexpected {} frame in property stream",
                other.kind()
            ))),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> PropertySink for FrameWriter<W> {
    async fn send(&mut self, property: Property) -> Result<()> {
        self.send_frame(&Frame::Property(property)).await
    }
}

#[async_trait]
impl PropertySource for tokio::sync::mpsc::Receiver<Property> {
    async fn recv(&mut self) -> Result<Option<Property>> {
        Ok(tokio::sync::mpsc::Receiver::recv(self).await)
    }
}

#[async_trait]
impl PropertySink for tokio::sync::mpsc::Sender<Property> {
    async fn send(&mut self, property: Property) -> Result<()> {
        tokio::sync::mpsc::Sender::send(self, property)
            .await
            .map_err(|_| Error::Transport("receiver dropped".to_string()))
    }
}

#[async_trait]
impl PropertySink for Vec<Property> {
    async fn send(&mut self, property: Property) -> Result<()> {
        self.push(property);
        Ok(())
    }
}
