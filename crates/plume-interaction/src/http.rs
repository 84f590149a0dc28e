//! HTTP implementation of the generation transport.
//!
//! Generation output arrives as newline-delimited JSON envelopes on a
//! long-lived response body. The decoder splits the byte stream on newlines
//! and parses each line into exactly one event, preserving delivery order.
//! Transport failures never escape as stream errors: they are folded into a
//! terminal error event so the consumer's fold loop stays uniform.

use crate::transport::{EventStream, GenerationTransport, RenditionKind, TransportConfig};
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use plume_core::error::{PlumeError, Result};
use plume_core::event::StreamEvent;
use plume_core::request::GenerationRequest;
use plume_core::section::SectionBatch;
use plume_core::slot::GenerationSlot;
use reqwest::Client;
use serde_json::json;
use std::collections::VecDeque;
use std::fmt::Display;
use tracing::{debug, warn};

/// Transport implementation over the generation service's HTTP API.
#[derive(Clone)]
pub struct HttpGenerationTransport {
    client: Client,
    config: TransportConfig,
}

impl HttpGenerationTransport {
    /// Creates a transport with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Creates a transport configured from environment variables.
    pub fn from_env() -> Self {
        Self::new(TransportConfig::from_env())
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url)
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };
        json!({
            "slot": request.slot,
            "content": request.content,
            "model": model,
            "source_files": request.source_files,
        })
    }
}

#[async_trait]
impl GenerationTransport for HttpGenerationTransport {
    async fn stream_generation(&self, request: &GenerationRequest) -> EventStream {
        let send = self
            .client
            .post(self.generate_url())
            .json(&self.request_body(request))
            .send();

        // Only the document-chat bootstrap carries a fixed wait for the
        // response to begin; other slots may queue server-side indefinitely.
        let sent = if matches!(request.slot, GenerationSlot::Chat { .. }) {
            match tokio::time::timeout(self.config.bootstrap_timeout, send).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(slot = %request.slot, "bootstrap timed out");
                    return error_stream("The assistant took too long to respond. Please retry.");
                }
            }
        } else {
            send.await
        };

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                warn!(slot = %request.slot, error = %err, "generation request failed");
                return error_stream(format!("Could not reach the generation service: {err}"));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return error_stream(format!("Generation request failed ({status}): {body}"));
        }

        debug!(slot = %request.slot, "generation stream opened");
        decode_lines(response.bytes_stream().boxed()).boxed()
    }

    async fn prepare_shred(&self, file_name: &str) -> Result<SectionBatch> {
        let url = format!("{}/api/shred/prepare", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "file": file_name, "model": self.config.model }))
            .send()
            .await
            .map_err(|err| {
                PlumeError::Transport {
                    message: format!("Shred preparation failed: {err}"),
                    retryable: err.is_connect() || err.is_timeout(),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(PlumeError::transport(format!(
                "Shred preparation failed ({status}): {body}"
            )));
        }

        response
            .json::<SectionBatch>()
            .await
            .map_err(|err| PlumeError::internal(format!("Failed to parse section batch: {err}")))
    }

    async fn export_rendition(&self, content: &str, kind: RenditionKind) -> Result<Vec<u8>> {
        let url = format!("{}/api/export", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "content": content, "format": kind.as_str() }))
            .send()
            .await
            .map_err(|err| PlumeError::export(format!("Export request failed: {err}")))?;

        if !response.status().is_success() {
            // Export failures come back as plain-text bodies.
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(PlumeError::export(format!("Export failed ({status}): {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| PlumeError::export(format!("Failed to read export body: {err}")))?;
        Ok(bytes.to_vec())
    }
}

/// A single-event stream carrying one terminal error.
fn error_stream(message: impl Into<String>) -> EventStream {
    stream::iter(vec![StreamEvent::Error {
        message: message.into(),
    }])
    .boxed()
}

struct DecodeState<S> {
    body: S,
    line_buffer: Vec<u8>,
    decoded: VecDeque<StreamEvent>,
    finished: bool,
}

/// Decodes a chunked byte stream into events, one per complete line.
///
/// A body read failure becomes a terminal error event; a trailing line
/// without a newline is flushed when the body ends.
fn decode_lines<S, B, E>(body: S) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        body,
        line_buffer: Vec::new(),
        decoded: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.decoded.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.line_buffer.extend_from_slice(chunk.as_ref());
                    drain_complete_lines(&mut state.line_buffer, &mut state.decoded);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.decoded.push_back(StreamEvent::Error {
                        message: format!("Stream read failed: {err}"),
                    });
                }
                None => {
                    state.finished = true;
                    if !state.line_buffer.is_empty() {
                        let trailing = std::mem::take(&mut state.line_buffer);
                        push_decoded_line(&trailing, &mut state.decoded);
                    }
                }
            }
        }
    })
}

fn drain_complete_lines(buffer: &mut Vec<u8>, decoded: &mut VecDeque<StreamEvent>) {
    while let Some(newline_index) = buffer.iter().position(|byte| *byte == b'\n') {
        let mut line = buffer.drain(..=newline_index).collect::<Vec<_>>();
        if matches!(line.last(), Some(b'\n')) {
            line.pop();
        }
        if matches!(line.last(), Some(b'\r')) {
            line.pop();
        }
        push_decoded_line(&line, decoded);
    }
}

fn push_decoded_line(line: &[u8], decoded: &mut VecDeque<StreamEvent>) {
    match StreamEvent::parse_line(line) {
        Some(event) => decoded.push_back(event),
        None => {
            if !line.iter().all(|byte| byte.is_ascii_whitespace()) {
                debug!(bytes = line.len(), "skipping undecodable stream line");
            }
        }
    }
}
