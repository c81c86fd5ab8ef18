use reqwest::header::CONTENT_TYPE;

use crate::envelope::Envelope;
use crate::events::{EventSink, Progress};
use crate::request::ResolvedRequest;

use super::{len_u64, read_response, transport_failure};

/// Sends the whole body in one write. Upload progress is reported once,
/// after the server has accepted the request.
#[derive(Debug, Clone)]
pub struct BufferedExecutor {
    http: reqwest::Client,
}

impl BufferedExecutor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub(crate) async fn exchange(&self, request: &ResolvedRequest, sink: &dyn EventSink) -> Envelope {
        sink.on_before_request();

        let mut builder = self
            .http
            .request(request.method.clone(), request.full_url.clone())
            .headers(request.headers.clone());

        let mut upload = None;
        if let Some(ref payload) = request.payload {
            let (body, content_type) = payload.encode();
            if !request.headers.contains_key(CONTENT_TYPE) {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            upload = Some(len_u64(body.len()));
            builder = builder.body(body);
        }

        sink.on_request_start();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        if let Some(size) = upload {
            sink.on_request_progress(Progress {
                loaded: size,
                total: Some(size),
            });
        }
        sink.on_request_end();

        read_response(response, sink).await
    }
}
