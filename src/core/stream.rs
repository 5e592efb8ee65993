//! # Answer Streaming
//!
//! Turns the body of a send-message call into chat events.
//!
//! ```text
//! bytes ──▶ SseDecoder ──▶ SseFrame ──▶ StreamReducer ──▶ StreamEvent ──▶ mpsc
//!                                         (owns the accumulated answer)
//! ```
//!
//! The reducer is synchronous and knows nothing about transport, so every
//! ordering rule can be tested by feeding it frames directly. [`drive`] is the
//! async loop that pulls transport chunks, feeds the reducer, and forwards
//! events until the body ends or the request is cancelled.

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::api::types::{ERROR_EVENT, MESSAGE_END_EVENT};
use crate::api::{ApiError, ByteStream, ChatBackend, ChunkRecord, SendMessageRequest};
use crate::core::conversation::ConversationId;

// ============================================================================
// SSE framing
// ============================================================================

/// One blank-line delimited record of the event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseFrame {
    /// `event:` field, if the server sent one.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`; `None` when the record had none.
    pub data: Option<String>,
}

/// Largest unterminated record kept in the buffer before it is discarded.
const MAX_RECORD_BYTES: usize = 4 * 1024 * 1024;

/// Incremental splitter for `text/event-stream` bodies. Records may arrive
/// split across any number of transport chunks, including mid-character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no blank line.
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `bytes` and returns every record completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        // CRLF and LF line endings are treated alike.
        self.buffer.extend(bytes.iter().copied().filter(|&b| b != b'\r'));

        let mut frames = Vec::new();
        loop {
            // Back up one byte: the first '\n' may have ended the previous push
            let from = self.scanned.saturating_sub(1);
            let Some(offset) = find_blank_line(&self.buffer[from..]) else {
                self.scanned = self.buffer.len();
                break;
            };
            let end = from + offset;
            let record: Vec<u8> = self.buffer.drain(..end + 2).take(end).collect();
            self.scanned = 0;
            if let Some(frame) = parse_record(&String::from_utf8_lossy(&record)) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > MAX_RECORD_BYTES {
            warn!(
                "Unterminated record exceeded {} bytes, discarding {} bytes",
                MAX_RECORD_BYTES,
                self.buffer.len()
            );
            self.buffer.clear();
            self.scanned = 0;
        }
        frames
    }

    /// Flushes a trailing record the server did not terminate with a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buffer);
        parse_record(&String::from_utf8_lossy(&rest))
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parses the field lines of one record. Comment-only or blank records yield `None`.
fn parse_record(record: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut saw_field = false;

    for line in record.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        saw_field = true;
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {} // id, retry
        }
    }

    if !saw_field {
        return None;
    }
    Some(SseFrame {
        event,
        data: if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        },
    })
}

// ============================================================================
// Reducer
// ============================================================================

/// What the reducer tells the session about the answer in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Full answer accumulated so far.
    Update(String),
    /// The backend created the conversation; fires at most once per stream.
    ConversationAssigned(String),
    /// End-of-message sentinel seen; carries the final answer.
    Success(String),
    /// The backend reported an error inside the stream.
    Failed(String),
}

/// Folds decoded records into the accumulated answer.
#[derive(Debug)]
pub struct StreamReducer {
    answer: String,
    conversation: ConversationId,
    finished: bool,
}

impl StreamReducer {
    /// `conversation` is the caller's id at the time the request was sent.
    pub fn new(conversation: ConversationId) -> Self {
        Self {
            answer: String::new(),
            conversation,
            finished: false,
        }
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// True once a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one frame. Never fails: frames without a payload, undecodable
    /// payloads, and payloads without a fragment are skipped.
    pub fn apply(&mut self, frame: &SseFrame) -> Vec<StreamEvent> {
        if self.finished {
            debug!("Frame after terminal event ignored");
            return Vec::new();
        }

        let Some(data) = frame.data.as_deref() else {
            debug!("Frame without payload skipped (event={:?})", frame.event);
            return Vec::new();
        };

        let record: ChunkRecord = match serde_json::from_str(data) {
            Ok(record) => record,
            Err(e) => {
                warn!("Undecodable chunk skipped: {} ({} bytes)", e, data.len());
                return Vec::new();
            }
        };

        match record.event.as_deref().or(frame.event.as_deref()) {
            Some(MESSAGE_END_EVENT) => {
                self.finished = true;
                info!("message_end received: {} answer bytes", self.answer.len());
                return vec![StreamEvent::Success(self.answer.clone())];
            }
            Some(ERROR_EVENT) => {
                self.finished = true;
                let message = record
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "backend reported an error".to_string());
                warn!("Error event in stream: {}", message);
                return vec![StreamEvent::Failed(message)];
            }
            _ => {}
        }

        let Some(fragment) = record.answer.filter(|a| !a.is_empty()) else {
            debug!("Record without answer fragment skipped");
            return Vec::new();
        };

        self.answer.push_str(&fragment);
        let mut events = vec![StreamEvent::Update(self.answer.clone())];

        if let Some(server_id) = record.conversation_id
            && self.conversation.promote(&server_id)
        {
            info!("Conversation assigned by backend: {}", server_id);
            events.push(StreamEvent::ConversationAssigned(server_id));
        }
        events
    }
}

// ============================================================================
// Driver
// ============================================================================

/// How a driven stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A terminal event (`Success` or `Failed`) was emitted.
    Finished,
    /// The body ended without a terminal event.
    Incomplete,
    /// The cancellation token fired first.
    Cancelled,
}

async fn forward(
    reducer: &mut StreamReducer,
    frame: &SseFrame,
    sender: &Sender<StreamEvent>,
) -> Result<(), ApiError> {
    for event in reducer.apply(frame) {
        if sender.send(event).await.is_err() {
            warn!("Stream event send failed: receiver dropped");
            return Err(ApiError::ChannelClosed);
        }
    }
    Ok(())
}

/// Reads `body` to the end, forwarding reducer events in arrival order.
///
/// Transport chunks after the terminal event are still drained so the
/// connection closes cleanly, but they no longer produce events.
pub async fn drive(
    mut body: ByteStream,
    mut reducer: StreamReducer,
    sender: Sender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<StreamOutcome, ApiError> {
    let mut decoder = SseDecoder::new();
    let mut chunk_count = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Stream cancelled after {} chunks", chunk_count);
                return Ok(StreamOutcome::Cancelled);
            }
            next = body.next() => next,
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                warn!("Transport error after {} chunks: {}", chunk_count, e);
                return Err(e);
            }
            None => break,
        };
        chunk_count += 1;
        debug!("Raw chunk received: {} bytes", bytes.len());

        for frame in decoder.push(&bytes) {
            forward(&mut reducer, &frame, &sender).await?;
        }
    }

    if let Some(frame) = decoder.finish() {
        forward(&mut reducer, &frame, &sender).await?;
    }

    let outcome = if reducer.is_finished() {
        StreamOutcome::Finished
    } else {
        warn!(
            "Stream closed without message_end ({} answer bytes)",
            reducer.answer().len()
        );
        StreamOutcome::Incomplete
    };
    info!("Stream ended: {} chunks, outcome={:?}", chunk_count, outcome);
    Ok(outcome)
}

/// Sends `request` and drives its answer stream. Cancellation is honoured
/// while waiting for the response headers as well as during the body.
pub async fn stream_answer(
    backend: &dyn ChatBackend,
    request: &SendMessageRequest,
    conversation: ConversationId,
    sender: Sender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<StreamOutcome, ApiError> {
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Request cancelled before the response arrived");
            return Ok(StreamOutcome::Cancelled);
        }
        body = backend.send_message(request) => body?,
    };
    drive(body, StreamReducer::new(conversation), sender, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn data(json: &str) -> SseFrame {
        SseFrame {
            event: None,
            data: Some(json.to_string()),
        }
    }

    fn temp() -> ConversationId {
        ConversationId::Temporary("temp-1".to_string())
    }

    fn apply_all(reducer: &mut StreamReducer, frames: &[SseFrame]) -> Vec<StreamEvent> {
        frames.iter().flat_map(|f| reducer.apply(f)).collect()
    }

    fn body_of(chunks: Vec<&str>) -> ByteStream {
        let items: Vec<Result<Vec<u8>, ApiError>> =
            chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        Box::pin(futures::stream::iter(items))
    }

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    // -- decoder --

    #[test]
    fn test_decoder_splits_records_on_blank_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"answer\":\"a\"}\n\ndata: {\"answer\":\"b\"}\n\n");
        assert_eq!(frames, vec![data(r#"{"answer":"a"}"#), data(r#"{"answer":"b"}"#)]);
    }

    #[test]
    fn test_decoder_reassembles_split_record() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"ans").is_empty());
        assert!(decoder.push(b"wer\":\"hi\"}\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames, vec![data(r#"{"answer":"hi"}"#)]);
    }

    #[test]
    fn test_decoder_handles_multibyte_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: {\"answer\":\"héllo\"}\n\n".as_bytes();
        // split inside the two-byte 'é'
        let cut = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&bytes[..cut]).is_empty());
        let frames = decoder.push(&bytes[cut..]);
        assert_eq!(frames, vec![data(r#"{"answer":"héllo"}"#)]);
    }

    #[test]
    fn test_decoder_crlf_event_field_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\n\r\nevent: ping\r\n\r\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("ping".to_string()),
                data: None,
            }]
        );
    }

    #[test]
    fn test_decoder_joins_multiline_data_and_flushes_tail() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: line1\ndata: line2").is_empty());
        assert_eq!(decoder.finish(), Some(data("line1\nline2")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_record_spread_over_many_chunks() {
        let mut decoder = SseDecoder::new();
        let answer = "x".repeat(500);
        let bytes = format!("data: {{\"answer\":\"{answer}\"}}\n\ndata: {{}}\n\n");
        let mut frames = Vec::new();
        for chunk in bytes.as_bytes().chunks(3) {
            frames.extend(decoder.push(chunk));
        }
        assert_eq!(
            frames,
            vec![data(&format!("{{\"answer\":\"{answer}\"}}")), data("{}")]
        );
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_discards_oversized_unterminated_record() {
        let mut decoder = SseDecoder::new();
        let mut junk = b"data: ".to_vec();
        junk.resize(MAX_RECORD_BYTES + 1, b'a');
        assert!(decoder.push(&junk).is_empty());
        assert!(decoder.buffer.is_empty());

        // The stream recovers at the next complete record
        let frames = decoder.push(b"data: {\"answer\":\"ok\"}\n\n");
        assert_eq!(frames, vec![data(r#"{"answer":"ok"}"#)]);
    }

    // -- reducer --

    #[test]
    fn test_fragments_then_message_end() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                data(r#"{"answer":"Hel"}"#),
                data(r#"{"answer":"lo"}"#),
                data(r#"{"event":"message_end"}"#),
            ],
        );

        assert_eq!(
            events,
            vec![
                StreamEvent::Update("Hel".to_string()),
                StreamEvent::Update("Hello".to_string()),
                StreamEvent::Success("Hello".to_string()),
            ]
        );
        assert!(reducer.is_finished());
    }

    #[test]
    fn test_no_sentinel_never_succeeds() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[data(r#"{"answer":"a"}"#), data(r#"{"answer":"b"}"#)],
        );

        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Success(_))));
        assert!(!reducer.is_finished());
        assert_eq!(reducer.answer(), "ab");
    }

    #[test]
    fn test_success_fires_once_even_with_repeated_sentinel() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                data(r#"{"answer":"x"}"#),
                data(r#"{"event":"message_end"}"#),
                data(r#"{"answer":"late"}"#),
                data(r#"{"event":"message_end"}"#),
            ],
        );

        let successes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Success(_)))
            .collect();
        assert_eq!(successes, vec![&StreamEvent::Success("x".to_string())]);
        assert_eq!(reducer.answer(), "x");
    }

    #[test]
    fn test_decode_failures_do_not_abort() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                data("{not json"),
                data("garbage"),
                data(r#"{"answer": 12}"#),
                data(r#"{"answer":"ok"}"#),
            ],
        );

        assert_eq!(events, vec![StreamEvent::Update("ok".to_string())]);
    }

    #[test]
    fn test_garbage_then_fragment_assigns_conversation() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                data("{garbage}"),
                data(r#"{"answer":"Hi","conversation_id":"real-1"}"#),
            ],
        );

        assert_eq!(
            events,
            vec![
                StreamEvent::Update("Hi".to_string()),
                StreamEvent::ConversationAssigned("real-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_assignment_fires_once_for_repeated_id() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                data(r#"{"answer":"a","conversation_id":"real-1"}"#),
                data(r#"{"answer":"b","conversation_id":"real-1"}"#),
                data(r#"{"answer":"c","conversation_id":"real-2"}"#),
            ],
        );

        let assigned: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ConversationAssigned(_)))
            .collect();
        assert_eq!(
            assigned,
            vec![&StreamEvent::ConversationAssigned("real-1".to_string())]
        );
    }

    #[test]
    fn test_assigned_conversation_never_reassigned() {
        let mut reducer = StreamReducer::new(ConversationId::Assigned("real-0".to_string()));
        let events = apply_all(
            &mut reducer,
            &[
                data(r#"{"answer":"a","conversation_id":"real-1"}"#),
                data(r#"{"answer":"b","conversation_id":"real-0"}"#),
            ],
        );

        assert!(
            !events
                .iter()
                .any(|e| matches!(e, StreamEvent::ConversationAssigned(_)))
        );
    }

    #[test]
    fn test_empty_fragment_and_missing_payload_skipped() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                SseFrame {
                    event: Some("ping".to_string()),
                    data: None,
                },
                data(r#"{"event":"message","answer":"","conversation_id":"real-1"}"#),
                data(r#"{"event":"workflow_started"}"#),
            ],
        );

        assert!(events.is_empty());
        assert_eq!(reducer.answer(), "");
    }

    #[test]
    fn test_error_event_finishes_with_failure() {
        let mut reducer = StreamReducer::new(temp());
        let events = apply_all(
            &mut reducer,
            &[
                data(r#"{"answer":"part"}"#),
                data(r#"{"event":"error","status":400,"message":"quota exceeded"}"#),
                data(r#"{"event":"message_end"}"#),
            ],
        );

        assert_eq!(
            events,
            vec![
                StreamEvent::Update("part".to_string()),
                StreamEvent::Failed("quota exceeded".to_string()),
            ]
        );
    }

    #[test]
    fn test_sse_event_field_used_when_payload_has_none() {
        let mut reducer = StreamReducer::new(temp());
        let events = reducer.apply(&SseFrame {
            event: Some("message_end".to_string()),
            data: Some("{}".to_string()),
        });
        assert_eq!(events, vec![StreamEvent::Success(String::new())]);
    }

    // -- driver --

    #[tokio::test]
    async fn test_drive_forwards_events_in_order() {
        let body = body_of(vec![
            "data: {\"answer\":\"Hel\",\"conversation_id\":\"real-1\"}\n\nda",
            "ta: {\"answer\":\"lo\",\"conversation_id\":\"real-1\"}\n\n",
            "data: {\"event\":\"message_end\"}\n\n",
        ]);
        let (tx, rx) = mpsc::channel(16);

        let outcome = drive(body, StreamReducer::new(temp()), tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Finished);
        assert_eq!(
            collect(rx).await,
            vec![
                StreamEvent::Update("Hel".to_string()),
                StreamEvent::ConversationAssigned("real-1".to_string()),
                StreamEvent::Update("Hello".to_string()),
                StreamEvent::Success("Hello".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_drive_reports_incomplete_stream() {
        let body = body_of(vec!["data: {\"answer\":\"cut\"}\n\n"]);
        let (tx, rx) = mpsc::channel(16);

        let outcome = drive(body, StreamReducer::new(temp()), tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Incomplete);
        assert_eq!(collect(rx).await, vec![StreamEvent::Update("cut".to_string())]);
    }

    #[tokio::test]
    async fn test_drive_stops_on_cancel() {
        let body: ByteStream = Box::pin(futures::stream::pending::<Result<Vec<u8>, ApiError>>());
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = drive(body, StreamReducer::new(temp()), tx, cancel)
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_drive_propagates_transport_error() {
        let items: Vec<Result<Vec<u8>, ApiError>> = vec![
            Ok(b"data: {\"answer\":\"a\"}\n\n".to_vec()),
            Err(ApiError::Network("connection reset".to_string())),
        ];
        let (tx, rx) = mpsc::channel(16);

        let result = drive(
            Box::pin(futures::stream::iter(items)),
            StreamReducer::new(temp()),
            tx,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(collect(rx).await, vec![StreamEvent::Update("a".to_string())]);
    }

    #[tokio::test]
    async fn test_drive_channel_closed() {
        let body = body_of(vec!["data: {\"answer\":\"a\"}\n\n"]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = drive(body, StreamReducer::new(temp()), tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(ApiError::ChannelClosed)));
    }
}
