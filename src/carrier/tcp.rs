//! Request/response carrier over length-delimited TCP frames.
//!
//! Each request frame holds one JSON segment record. The server answers
//! every request with one frame: empty on success, or the UTF-8 error text
//! when the segment could not be handled.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::Mutex,
    time::sleep,
};
use tokio_util::{
    codec::{Framed, LengthDelimitedCodec},
    sync::CancellationToken,
    task::TaskTracker,
};

use super::{BackoffConfig, Carrier, SegmentReceiver, receive_record};
use crate::{error::BoxError, segment::Segment, wire};

type SegmentStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Carrier that sends each segment as one TCP request and awaits the reply.
///
/// The connection is opened on first use and reused; any I/O failure drops
/// it so the next send reconnects.
#[derive(Debug)]
pub struct TcpCarrier {
    addr: SocketAddr,
    connection: Mutex<Option<SegmentStream>>,
}

impl TcpCarrier {
    /// Create a carrier targeting `addr`. No connection is made yet.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connection: Mutex::new(None),
        }
    }

    /// Address segments are sent to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr { self.addr }

    async fn exchange(stream: &mut SegmentStream, request: Bytes) -> Result<(), BoxError> {
        stream.send(request).await?;
        match stream.next().await {
            Some(Ok(reply)) if reply.is_empty() => Ok(()),
            Some(Ok(reply)) => Err(String::from_utf8_lossy(&reply).into_owned().into()),
            Some(Err(e)) => Err(e.into()),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }
}

#[async_trait]
impl Carrier for TcpCarrier {
    async fn send(&self, segment: Segment) -> Result<(), BoxError> {
        let request = Bytes::from(wire::encode_segment(&segment)?);
        let mut connection = self.connection.lock().await;
        let mut stream = match connection.take() {
            Some(stream) => stream,
            None => Framed::new(TcpStream::connect(self.addr).await?, LengthDelimitedCodec::new()),
        };
        let result = Self::exchange(&mut stream, request).await;
        let broken = result
            .as_ref()
            .is_err_and(|e| e.downcast_ref::<io::Error>().is_some());
        if !broken {
            *connection = Some(stream);
        }
        result
    }
}

/// Shared handles for the segment accept loop.
#[derive(Clone, Debug, Default)]
pub struct ServeOptions {
    /// Stops the accept loop and every connection task.
    pub shutdown: CancellationToken,
    /// Tracks connection tasks so callers can wait for them.
    pub tracker: TaskTracker,
    /// Retry timing for failed `accept()` calls.
    pub backoff: BackoffConfig,
}

/// Accept segment connections on `listener` until shutdown.
///
/// Each connection is served by a task spawned on `options.tracker`.
/// Accept failures trigger an exponential back-off. Callers wait for
/// in-flight requests with `tracker.close()` followed by `tracker.wait()`.
pub async fn serve_segments<R>(listener: TcpListener, receiver: Arc<R>, options: ServeOptions)
where
    R: SegmentReceiver + ?Sized + 'static,
{
    let ServeOptions {
        shutdown,
        tracker,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    let mut delay = backoff.initial_delay;

    loop {
        select! {
            biased;

            () = shutdown.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    debug!("segment connection accepted: peer={peer}");
                    tracker.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&receiver),
                        shutdown.clone(),
                    ));
                    delay = backoff.initial_delay;
                }
                Err(e) => {
                    let local_addr = listener.local_addr().ok();
                    warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                    sleep(delay).await;
                    delay = backoff.next_delay(delay);
                }
            },
        }
    }
}

async fn serve_connection<R>(
    stream: TcpStream,
    peer: SocketAddr,
    receiver: Arc<R>,
    shutdown: CancellationToken,
) where
    R: SegmentReceiver + ?Sized,
{
    let mut frames = Framed::new(stream, LengthDelimitedCodec::new());
    loop {
        let frame = select! {
            biased;

            () = shutdown.cancelled() => break,
            frame = frames.next() => frame,
        };
        let request = match frame {
            None => break,
            Some(Ok(request)) => request,
            Some(Err(e)) => {
                warn!("segment connection failed: peer={peer}, error={e}");
                break;
            }
        };
        let reply = match receive_record(&*receiver, &request).await {
            Ok(()) => Bytes::new(),
            Err(e) => Bytes::from(e.to_string()),
        };
        if let Err(e) = frames.send(reply).await {
            warn!("failed to answer segment request: peer={peer}, error={e}");
            break;
        }
    }
    debug!("segment connection closed: peer={peer}");
}
