//! Navigation snippet injection for upstream HTML pages.

use axum::http::{
    header::{CONTENT_ENCODING, CONTENT_TYPE},
    HeaderMap,
};

/// Floating "Portal" button added to every upstream HTML page.
pub const NAV_SNIPPET: &str = r##"
<style>
#portal-nav-btn {
    position: fixed;
    top: 12px;
    right: 12px;
    z-index: 9999;
    padding: 8px 16px;
    background: #2563eb;
    color: white;
    border: none;
    border-radius: 6px;
    font-family: "SF Mono", Monaco, monospace;
    font-size: 14px;
    cursor: pointer;
    text-decoration: none;
    display: flex;
    align-items: center;
    gap: 6px;
    box-shadow: 0 2px 8px rgba(0,0,0,0.15);
    transition: background 0.2s;
}
#portal-nav-btn:hover {
    background: #1d4ed8;
}
</style>
<a id="portal-nav-btn" href="/portal">
    <svg width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2">
        <path d="M3 9l9-7 9 7v11a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2z"></path>
        <polyline points="9 22 9 12 15 12 15 22"></polyline>
    </svg>
    Portal
</a>
"##;

const BODY_CLOSE: &[u8] = b"</body>";

/// Whether the response is an HTML document we can rewrite.
///
/// Compressed bodies are left alone: the closing tag cannot be found in them.
pub fn is_rewritable_html(headers: &HeaderMap) -> bool {
    let html = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/html"));
    let encoded = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|enc| !enc.trim().eq_ignore_ascii_case("identity"));
    html && !encoded
}

/// Insert `snippet` right before the first `</body>`.
///
/// Returns `None` when the body has no closing tag.
pub fn inject_snippet(body: &[u8], snippet: &[u8]) -> Option<Vec<u8>> {
    let at = body
        .windows(BODY_CLOSE.len())
        .position(|window| window == BODY_CLOSE)?;

    let mut out = Vec::with_capacity(body.len() + snippet.len());
    out.extend_from_slice(&body[..at]);
    out.extend_from_slice(snippet);
    out.extend_from_slice(&body[at..]);
    Some(out)
}
