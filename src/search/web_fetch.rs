//! Fetch a search hit's page and reduce it to markdown for the sub-agent.

use std::time::Duration;

use crate::error::AgentError;

/// Fetch a URL and return its content, HTML converted to markdown via `htmd`.
///
/// JSON and plain-text responses are returned as-is. Content longer than
/// `max_chars` is truncated with a marker.
pub async fn fetch_page(url: &str, max_chars: usize) -> Result<String, AgentError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent("Mozilla/5.0 (compatible; maestro/0.1)")
        .build()
        .map_err(|e| AgentError::SearchError(format!("fetch: failed to build client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AgentError::SearchError(format!("fetch {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AgentError::SearchError(format!("fetch {url}: HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = response
        .text()
        .await
        .map_err(|e| AgentError::SearchError(format!("fetch {url}: failed to read body: {e}")))?;

    let output = if content_type.contains("text/html") {
        htmd::convert(&body).unwrap_or(body)
    } else {
        body
    };

    Ok(truncate_chars(&output, max_chars))
}

/// Truncate to `limit` characters on a char boundary, noting the cut.
pub fn truncate_chars(content: &str, limit: usize) -> String {
    let total = content.chars().count();
    if total <= limit {
        return content.to_string();
    }
    let kept: String = content.chars().take(limit).collect();
    format!("{kept}...\n[truncated at {limit} chars, total {total}]")
}
