//! Exchange mode selection.

use axum::http::{header::ACCEPT, HeaderMap, Uri};

use crate::proxy::types::ExchangeMode;

/// Path fragment marking an event-stream endpoint.
pub const STREAM_PATH_MARKER: &str = "/stream";
/// Media type of server-sent events.
pub const EVENT_STREAM: &str = "text/event-stream";

impl ExchangeMode {
    /// Decide the mode from the request alone, before anything is sent upstream.
    pub fn detect(uri: &Uri, headers: &HeaderMap) -> Self {
        let wants_events = headers
            .get(ACCEPT)
            .is_some_and(|accept| accept.as_bytes() == EVENT_STREAM.as_bytes());

        if uri.path().contains(STREAM_PATH_MARKER) || wants_events {
            ExchangeMode::Streaming
        } else {
            ExchangeMode::Buffered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn detect(path: &str, accept: Option<&'static str>) -> ExchangeMode {
        let mut headers = HeaderMap::new();
        if let Some(accept) = accept {
            headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }
        ExchangeMode::detect(&path.parse().unwrap(), &headers)
    }

    #[test]
    fn stream_segment_selects_streaming() {
        assert_eq!(detect("/events/stream", None), ExchangeMode::Streaming);
        assert_eq!(detect("/api/conversation/42/stream?x=1", None), ExchangeMode::Streaming);
        assert_eq!(detect("/streams/list", None), ExchangeMode::Streaming);
    }

    #[test]
    fn event_stream_accept_selects_streaming() {
        assert_eq!(detect("/events", Some("text/event-stream")), ExchangeMode::Streaming);
    }

    #[test]
    fn accept_must_match_exactly() {
        assert_eq!(
            detect("/events", Some("text/event-stream, */*")),
            ExchangeMode::Buffered
        );
        assert_eq!(detect("/", Some("text/html")), ExchangeMode::Buffered);
        assert_eq!(detect("/index.html", None), ExchangeMode::Buffered);
    }

    #[test]
    fn query_string_is_not_part_of_the_path() {
        assert_eq!(detect("/search?q=/stream", None), ExchangeMode::Buffered);
    }
}
