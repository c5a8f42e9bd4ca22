//! Application-layer consumers of reassembled messages and loss reports.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use log::{debug, info, warn};
use tokio::{
    io::AsyncWrite,
    net::TcpStream,
    sync::{Mutex, mpsc},
};
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};

use crate::{
    error::BoxError,
    segment::MessageId,
    store::{LossNotification, ReassembledMessage},
    wire,
};

/// Outcome forwarded to the application for one logical message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Every segment arrived and the payload was reassembled.
    Message(ReassembledMessage),
    /// Segments stopped arriving and the message was abandoned.
    Lost(LossNotification),
}

impl Delivery {
    /// Identifier of the message this delivery concerns.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::Message(message) => message.message_id(),
            Self::Lost(notification) => notification.message_id,
        }
    }

    /// Sender of the message this delivery concerns.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Message(message) => message.username(),
            Self::Lost(notification) => &notification.username,
        }
    }

    /// Whether this delivery reports a loss.
    #[must_use]
    pub fn is_lost(&self) -> bool { matches!(self, Self::Lost(_)) }
}

/// Consumer of [`Delivery`] values.
///
/// Delivery is at-most-once: the transport never retries a failed call, so
/// implementations own any retry policy.
#[async_trait]
pub trait ApplicationSink: Send + Sync {
    /// Hand one delivery to the application.
    async fn deliver(&self, delivery: Delivery) -> Result<(), BoxError>;
}

#[async_trait]
impl<S: ApplicationSink + ?Sized> ApplicationSink for Arc<S> {
    async fn deliver(&self, delivery: Delivery) -> Result<(), BoxError> {
        (**self).deliver(delivery).await
    }
}

/// Sink that writes every delivery to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl ApplicationSink for LoggingSink {
    async fn deliver(&self, delivery: Delivery) -> Result<(), BoxError> {
        match delivery {
            Delivery::Message(message) => info!(
                "message delivered: message_id={}, username={}, sent_at={}, text={}",
                message.message_id(),
                message.username(),
                message.sent_at(),
                String::from_utf8_lossy(message.payload()),
            ),
            Delivery::Lost(notification) => warn!(
                "message {}: message_id={}, username={}, sent_at={}",
                notification.reason,
                notification.message_id,
                notification.username,
                notification.sent_at,
            ),
        }
        Ok(())
    }
}

/// Sink that forwards deliveries into a bounded channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Delivery>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes its deliveries.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ApplicationSink for ChannelSink {
    async fn deliver(&self, delivery: Delivery) -> Result<(), BoxError> {
        self.tx.send(delivery).await.map_err(|_| "delivery channel closed".into())
    }
}

/// Sink that forwards deliveries to an application service.
///
/// Each delivery is written as one length-delimited
/// [`ApplicationMessage`](crate::wire::ApplicationMessage) JSON record.
/// Loss reports carry `"error": "lost"`.
pub struct JsonSink<W> {
    frames: Mutex<FramedWrite<W, LengthDelimitedCodec>>,
}

impl<W> std::fmt::Debug for JsonSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSink").finish_non_exhaustive()
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonSink<W> {
    /// Write records to `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            frames: Mutex::new(FramedWrite::new(writer, LengthDelimitedCodec::new())),
        }
    }
}

impl JsonSink<TcpStream> {
    /// Connect to the application service at `addr`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the connection cannot be established.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        Ok(Self::new(TcpStream::connect(addr).await?))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ApplicationSink for JsonSink<W> {
    async fn deliver(&self, delivery: Delivery) -> Result<(), BoxError> {
        let record = wire::encode_delivery(&delivery)?;
        debug!(
            "forwarding delivery: message_id={}, username={}, lost={}",
            delivery.message_id(),
            delivery.username(),
            delivery.is_lost(),
        );
        self.frames.lock().await.send(Bytes::from(record)).await?;
        Ok(())
    }
}
