use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::events::{EventSink, Progress};
use crate::request::ResolvedRequest;

use super::{len_u64, read_response, transport_failure};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Streams the body in fixed-size chunks.
///
/// The total upload size is fixed before the connection opens and sent as
/// `Content-Length`; each chunk handed to the connection bumps the
/// cumulative request-progress counter.
#[derive(Debug, Clone)]
pub struct StreamingExecutor {
    http: reqwest::Client,
    chunk_size: usize,
}

impl StreamingExecutor {
    pub fn new(http: reqwest::Client, chunk_size: usize) -> Self {
        Self {
            http,
            chunk_size: chunk_size.max(1),
        }
    }

    pub(crate) async fn exchange(&self, request: &ResolvedRequest, sink: &dyn EventSink) -> Envelope {
        sink.on_before_request();

        let chunk_size = request.chunk_size.unwrap_or(self.chunk_size).max(1);
        let mut builder = self
            .http
            .request(request.method.clone(), request.full_url.clone())
            .headers(request.headers.clone());

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u64>();
        let mut total = 0u64;

        if let Some(ref payload) = request.payload {
            let (body, content_type) = payload.encode();
            total = len_u64(body.len());
            if !request.headers.contains_key(CONTENT_TYPE) {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            let chunks = split_chunks(&body, chunk_size);
            let stream = async_stream::stream! {
                for chunk in chunks {
                    let _ = progress_tx.send(len_u64(chunk.len()));
                    yield Ok::<Bytes, std::io::Error>(chunk);
                }
            };
            builder = builder
                .header(CONTENT_LENGTH, total)
                .body(reqwest::Body::wrap_stream(stream));
        } else {
            drop(progress_tx);
        }

        sink.on_request_start();
        let send = builder.send();
        tokio::pin!(send);

        let mut sent = 0u64;
        let result = loop {
            tokio::select! {
                Some(n) = progress_rx.recv() => {
                    sent += n;
                    sink.on_request_progress(Progress { loaded: sent, total: Some(total) });
                }
                result = &mut send => break result,
            }
        };
        while let Ok(n) = progress_rx.try_recv() {
            sent += n;
            sink.on_request_progress(Progress {
                loaded: sent,
                total: Some(total),
            });
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };
        sink.on_request_end();

        read_response(response, sink).await
    }
}

fn split_chunks(body: &Bytes, size: usize) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(body.len().div_ceil(size));
    let mut offset = 0;
    while offset < body.len() {
        let end = (offset + size).min(body.len());
        chunks.push(body.slice(offset..end));
        offset = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_whole_body() {
        let body = Bytes::from_static(b"abcdefghij");
        let chunks = split_chunks(&body, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], Bytes::from_static(b"ij"));
        assert!(split_chunks(&Bytes::new(), 4).is_empty());
    }
}
