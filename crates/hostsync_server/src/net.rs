//! Line-delimited JSON transport over TCP.
//!
//! Each line read from a connection is one [`RequestEnvelope`]. Requests are
//! handled in their own tasks, so a held listen never blocks the requests
//! behind it; responses are written by a single writer task in completion
//! order and carry the request `id` for correlation.
//!
//! Lines are framed with a [`LinesCodec`] capped at
//! [`ServerConfig::max_line_bytes`](crate::ServerConfig): a peer that exceeds
//! the cap gets one `invalid_argument` response and is disconnected.

use crate::handler::RequestHandler;
use futures_util::StreamExt;
use hostsync_protocol::{ProtocolError, RequestEnvelope, Response};
use hostsync_store::Store;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

/// Accepts connections until the listener fails.
pub async fn serve<S: Store + 'static>(
    listener: TcpListener,
    handler: RequestHandler<S>,
) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "hostsync server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "connection accepted");
        let handler = handler.clone();
        tokio::spawn(async move {
            match handle_connection(stream, handler).await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(err) => warn!(%peer, error = %err, "connection failed"),
            }
        });
    }
}

/// Serves one connection until the peer closes it.
///
/// Requests still in flight when the peer disconnects are dropped; their
/// notices stay queued for the next listen.
pub async fn handle_connection<S: Store + 'static>(
    stream: TcpStream,
    handler: RequestHandler<S>,
) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();

    let writer = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let line = match response.encode() {
                Ok(line) => line,
                Err(err) => {
                    error!(error = %err, "failed to encode response");
                    continue;
                }
            };
            write.write_all(line.as_bytes()).await?;
            write.write_all(b"\n").await?;
        }
        write.shutdown().await
    });

    let limit = handler.server().config().max_line_bytes;
    let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(limit));
    let mut in_flight = JoinSet::new();

    let result = loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    None => break Ok(()),
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!(limit, "request line too long, closing connection");
                        let _ = tx.send(handler.malformed(&ProtocolError::TooLarge { limit }));
                        break Ok(());
                    }
                    Some(Err(LinesCodecError::Io(err))) => break Err(err),
                };
                if line.trim().is_empty() {
                    continue;
                }
                match RequestEnvelope::decode(&line) {
                    Ok(request) => {
                        let handler = handler.clone();
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            let _ = tx.send(handler.handle(request).await);
                        });
                    }
                    Err(err) => {
                        debug!(error = %err, "malformed request");
                        let _ = tx.send(handler.malformed(&err));
                    }
                }
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    };

    in_flight.shutdown().await;
    drop(tx);
    match writer.await {
        Ok(written) => written.and(result),
        Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
    }
}
