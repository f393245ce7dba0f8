//! [`SseTransport`] backed by `reqwest`.

use std::time::Duration;

use futures::StreamExt;
use sse_core::RequestConfig;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::TransportError;
use crate::transport::{Completion, SseTransport, TransportEvent, TransportStream};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Events buffered between the socket and the connection. Once full, the
/// body is not read until the consumer catches up.
pub const CHUNK_CHANNEL_CAPACITY: usize = 16;

/// Streams a GET response body chunk by chunk. No overall request timeout is
/// set since feeds are expected to stay open indefinitely.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl SseTransport for ReqwestTransport {
    fn connect(&self, request: &RequestConfig, cancel: CancellationToken) -> TransportStream {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let url = request.url().clone();
        let headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        tokio::spawn(async move {
            let completion = run_session(client, url, headers, &tx, &cancel).await;
            tracing::debug!(?completion, "Transport session finished");
            let event = TransportEvent::Completed(completion);
            if cancel.is_cancelled() {
                let _ = tx.try_send(event);
            } else {
                forward(&tx, &cancel, event).await;
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

async fn run_session(
    client: reqwest::Client,
    url: Url,
    headers: Vec<(String, String)>,
    tx: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
) -> Completion {
    let mut request = client.get(url);
    for (k, v) in &headers {
        request = request.header(k.as_str(), v.as_str());
    }

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Completion::Cancelled,
        result = request.send() => match result {
            Ok(resp) => resp,
            Err(e) => return Completion::Failed(e.into()),
        },
    };

    let status = response.status();
    if !status.is_success() {
        return Completion::Failed(TransportError::Status(status.as_u16()));
    }

    let opened = TransportEvent::ResponseReceived {
        status: status.as_u16(),
    };
    if !forward(tx, cancel, opened).await {
        return Completion::Cancelled;
    }

    let mut body = response.bytes_stream();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Completion::Cancelled,
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    if !forward(tx, cancel, TransportEvent::Chunk(bytes)).await {
                        return Completion::Cancelled;
                    }
                }
                Some(Err(e)) => return Completion::Failed(e.into()),
                None => return Completion::Finished,
            },
        }
    }
}

/// Send `event`, waiting for room. Returns `false` once the session is
/// cancelled or the connection was dropped.
async fn forward(
    tx: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
    event: TransportEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
