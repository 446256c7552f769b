//! Web search providers used for retrieval augmentation.
//!
//! DuckDuckGo (zero-config, HTML scraping), Brave Search (API key) and Tavily
//! (API key, can return a direct answer). All return [`SearchResults`].
//!
//! Rate-limited wrappers enforce minimum delays between requests to avoid
//! being blocked by upstream providers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;

use crate::error::AgentError;

/// A single search result with title, URL, and snippet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// What a provider returned for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Direct answer, for providers that synthesize one (Tavily).
    pub answer: Option<String>,
    pub results: Vec<SearchResult>,
}

fn search_err(msg: String) -> AgentError {
    AgentError::SearchError(msg)
}

/// Search DuckDuckGo via the lite HTML endpoint.
///
/// Sends a GET request to `https://lite.duckduckgo.com/lite/` and parses
/// result links, titles, and snippets from the table-based HTML layout
/// using CSS selectors.
pub async fn search_duckduckgo(query: &str, count: usize) -> Result<SearchResults, AgentError> {
    let client = reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0")
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| search_err(format!("failed to build client: {e}")))?;

    let html = client
        .get("https://lite.duckduckgo.com/lite/")
        .query(&[("q", query)])
        .send()
        .await
        .map_err(|e| search_err(format!("DuckDuckGo request failed: {e}")))?
        .text()
        .await
        .map_err(|e| search_err(format!("failed to read DDG response: {e}")))?;

    Ok(SearchResults {
        answer: None,
        results: parse_ddg_lite_html(&html, count),
    })
}

/// Parse DuckDuckGo Lite HTML to extract search results.
///
/// The DDG lite page uses a table layout where result rows contain:
/// - A link (`<a>`) with the result URL and title text
/// - A subsequent row with the snippet text in a `<td>` with class `result-snippet`
fn parse_ddg_lite_html(html: &str, count: usize) -> Vec<SearchResult> {
    use scraper::{Html, Selector};

    let document = Html::parse_document(html);

    let (Ok(link_selector), Ok(snippet_selector)) = (
        Selector::parse("a.result-link"),
        Selector::parse("td.result-snippet"),
    ) else {
        return Vec::new();
    };

    let snippets: Vec<_> = document.select(&snippet_selector).collect();

    document
        .select(&link_selector)
        .enumerate()
        .filter_map(|(i, link)| {
            let title = link.text().collect::<String>().trim().to_string();
            let url = link.value().attr("href").unwrap_or("").trim().to_string();
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let snippet = snippets
                .get(i)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            Some(SearchResult {
                title,
                url,
                snippet,
            })
        })
        .take(count)
        .collect()
}

/// Search using the Brave Search REST API.
///
/// Requires a valid API key (`X-Subscription-Token` header). Results come
/// from the `web.results` array.
pub async fn search_brave(
    query: &str,
    count: usize,
    api_key: &str,
) -> Result<SearchResults, AgentError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| search_err(format!("failed to build client: {e}")))?;

    let resp = client
        .get("https://api.search.brave.com/res/v1/web/search")
        .header("X-Subscription-Token", api_key)
        .header("Accept", "application/json")
        .query(&[("q", query), ("count", &count.to_string())])
        .send()
        .await
        .map_err(|e| search_err(format!("Brave request failed: {e}")))?;

    let status = resp.status();
    match status.as_u16() {
        401 => return Err(search_err("Brave API key is invalid or expired".into())),
        429 => {
            return Err(search_err(
                "Brave Search rate limit exceeded, try again later".into(),
            ));
        }
        _ if !status.is_success() => return Err(search_err(format!("Brave HTTP {status}"))),
        _ => {}
    }

    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| search_err(format!("failed to parse Brave response: {e}")))?;

    Ok(SearchResults {
        answer: None,
        results: parse_brave_json(&body, count),
    })
}

fn parse_brave_json(body: &serde_json::Value, count: usize) -> Vec<SearchResult> {
    body["web"]["results"]
        .as_array()
        .map(|arr| arr.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(|r| {
            Some(SearchResult {
                title: r["title"].as_str()?.to_string(),
                url: r["url"].as_str()?.to_string(),
                snippet: r["description"].as_str().unwrap_or("").to_string(),
            })
        })
        .take(count)
        .collect()
}

/// Search using the Tavily API with a synthesized answer.
pub async fn search_tavily(
    query: &str,
    count: usize,
    api_key: &str,
) -> Result<SearchResults, AgentError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| search_err(format!("failed to build client: {e}")))?;

    let resp = client
        .post("https://api.tavily.com/search")
        .bearer_auth(api_key)
        .json(&json!({
            "query": query,
            "search_depth": "advanced",
            "include_answer": true,
            "max_results": count,
        }))
        .send()
        .await
        .map_err(|e| search_err(format!("Tavily request failed: {e}")))?;

    let status = resp.status();
    if status.as_u16() == 401 {
        return Err(search_err("Tavily API key is invalid".into()));
    }
    if !status.is_success() {
        return Err(search_err(format!("Tavily HTTP {status}")));
    }

    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| search_err(format!("failed to parse Tavily response: {e}")))?;

    Ok(parse_tavily_json(&body, count))
}

fn parse_tavily_json(body: &serde_json::Value, count: usize) -> SearchResults {
    let answer = body["answer"]
        .as_str()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    let results = body["results"]
        .as_array()
        .map(|arr| arr.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(|r| {
            Some(SearchResult {
                title: r["title"].as_str()?.to_string(),
                url: r["url"].as_str()?.to_string(),
                snippet: r["content"].as_str().unwrap_or("").to_string(),
            })
        })
        .take(count)
        .collect();
    SearchResults { answer, results }
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

static DDG_LAST_REQUEST: Mutex<Option<Instant>> = Mutex::new(None);
static BRAVE_LAST_REQUEST: Mutex<Option<Instant>> = Mutex::new(None);
static TAVILY_LAST_REQUEST: Mutex<Option<Instant>> = Mutex::new(None);

pub async fn rate_limited_ddg_search(
    query: &str,
    count: usize,
    rate_limit_secs: f64,
) -> Result<SearchResults, AgentError> {
    enforce_rate_limit(&DDG_LAST_REQUEST, rate_limit_secs).await;
    search_duckduckgo(query, count).await
}

pub async fn rate_limited_brave_search(
    query: &str,
    count: usize,
    api_key: &str,
    rate_limit_secs: f64,
) -> Result<SearchResults, AgentError> {
    enforce_rate_limit(&BRAVE_LAST_REQUEST, rate_limit_secs).await;
    search_brave(query, count, api_key).await
}

pub async fn rate_limited_tavily_search(
    query: &str,
    count: usize,
    api_key: &str,
    rate_limit_secs: f64,
) -> Result<SearchResults, AgentError> {
    enforce_rate_limit(&TAVILY_LAST_REQUEST, rate_limit_secs).await;
    search_tavily(query, count, api_key).await
}

/// Wait if necessary to enforce a minimum interval between requests,
/// then update the last-request timestamp.
async fn enforce_rate_limit(tracker: &Mutex<Option<Instant>>, min_secs: f64) {
    let min_interval = Duration::try_from_secs_f64(min_secs).unwrap_or(Duration::ZERO);

    // Read the last request time (lock released immediately).
    let remaining = {
        let guard = tracker.lock().unwrap_or_else(|e| e.into_inner());
        guard.and_then(|last| min_interval.checked_sub(last.elapsed()))
    };

    if let Some(wait) = remaining {
        tokio::time::sleep(wait).await;
    }

    let mut guard = tracker.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(Instant::now());
}
