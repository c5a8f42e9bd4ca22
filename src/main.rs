//! Segment transport node.
//!
//! Reads `username: message` lines from stdin, segments each message and
//! sends the segments to `--peer` (or back to itself when no peer is given).
//! Segments arriving on the listener are reassembled and forwarded to
//! `--app-addr` as JSON records, or logged when no application is given.

mod cli;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use segment_transport::{
    ApplicationSink,
    BackoffConfig,
    Carrier,
    ChannelCarrier,
    JsonSink,
    LoggingSink,
    SegmentConsumer,
    ServeOptions,
    TcpCarrier,
    Transport,
    TransportConfig,
    UnknownMessagePolicy,
    serve_segments,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader, stdin},
    net::TcpListener,
    select,
    signal,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::cli::{Cli, Mode};

const LOOPBACK_CAPACITY: usize = 1024;

type Node = Transport<Arc<dyn Carrier>, Arc<dyn ApplicationSink>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = TransportConfig {
        segment_size: cli.segment_size,
        scan_period: Duration::from_millis(cli.scan_period_ms),
        max_segments: cli.max_segments,
        unknown_message_policy: match cli.mode {
            Mode::SenderTracked => UnknownMessagePolicy::Reject,
            Mode::ReceiverOnly => UnknownMessagePolicy::CreateOnFirstSegment,
        },
        ..TransportConfig::default()
    };
    config.validate()?;
    install_metrics(&cli)?;

    let (carrier, consumer): (Arc<dyn Carrier>, Option<SegmentConsumer>) = match cli.peer {
        Some(peer) => (Arc::new(TcpCarrier::new(peer)), None),
        None => {
            let (carrier, consumer) = ChannelCarrier::new(LOOPBACK_CAPACITY);
            (Arc::new(carrier), Some(consumer))
        }
    };
    let sink: Arc<dyn ApplicationSink> = match cli.app_addr {
        Some(addr) => {
            let sink = JsonSink::connect(addr).await?;
            info!("forwarding deliveries: app_addr={addr}");
            Arc::new(sink)
        }
        None => Arc::new(LoggingSink),
    };
    let transport: Arc<Node> = Arc::new(Transport::new(config, carrier, sink)?);

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let listener = TcpListener::bind(cli.listen).await?;
    info!("listening for segments: addr={}", listener.local_addr()?);
    tracker.spawn(serve_segments(
        listener,
        Arc::clone(&transport),
        ServeOptions {
            shutdown: shutdown.clone(),
            tracker: tracker.clone(),
            backoff: BackoffConfig::default(),
        },
    ));
    if let Some(consumer) = consumer {
        let transport = Arc::clone(&transport);
        let token = shutdown.clone();
        tracker.spawn(async move {
            consumer.run(&*transport, token).await;
        });
    }
    tracker.spawn(transport.sweeper().run(shutdown.clone()));

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        select! {
            biased;

            res = signal::ctrl_c() => {
                res?;
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => send_line(&transport, &line).await,
                None => {
                    info!("stdin closed, receiving until interrupted");
                    signal::ctrl_c().await?;
                    break;
                }
            },
        }
    }

    info!("shutting down");
    shutdown.cancel();
    tracker.close();
    tracker.wait().await;
    Ok(())
}

async fn send_line(transport: &Node, line: &str) {
    let Some((username, message)) = line.split_once(':') else {
        if !line.trim().is_empty() {
            warn!("expected `username: message`, got {line:?}");
        }
        return;
    };
    let username = username.trim();
    let message = message.trim_start();
    match transport
        .send_message(username, Bytes::from(message.to_owned()), Utc::now())
        .await
    {
        Ok(message_id) => info!("message sent: message_id={message_id}, username={username}"),
        Err(e) => warn!("failed to send message: username={username}, error={e}"),
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("prometheus exporter listening: addr={addr}");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
#[expect(clippy::unnecessary_wraps, reason = "mirrors the metrics-enabled signature")]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.metrics_addr.is_some() {
        warn!("built without the metrics feature, ignoring --metrics-addr");
    }
    Ok(())
}
