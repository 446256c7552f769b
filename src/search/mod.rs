//! Retrieval augmentation for sub-agents: run the orchestrator's search query
//! against the configured provider and render the findings as prompt text.

pub mod web_fetch;
pub mod web_search;

use web_search::SearchResults;

use crate::config::{AppConfig, SearchProviderKind};
use crate::error::AgentError;

/// Characters of the top hit's page kept when enriching snippet-only results.
const TOP_PAGE_CHARS: usize = 3000;

/// Anything that can turn a query into prompt-ready text.
pub trait Searcher: Send + Sync {
    fn search(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<String, AgentError>> + Send;
}

/// Search client built from configuration.
#[derive(Debug, Clone)]
pub struct WebSearcher {
    provider: SearchProviderKind,
    api_key: Option<String>,
    max_results: usize,
    rate_limit_secs: f64,
    fetch_top_result: bool,
}

impl WebSearcher {
    /// Build from config. Brave and Tavily need an API key in the environment
    /// variable named by `search.api_key_env` (defaults `BRAVE_API_KEY` /
    /// `TAVILY_API_KEY`).
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        let default_env = match config.search_provider {
            SearchProviderKind::Duckduckgo => None,
            SearchProviderKind::Brave => Some("BRAVE_API_KEY"),
            SearchProviderKind::Tavily => Some("TAVILY_API_KEY"),
        };
        let api_key = match default_env {
            None => None,
            Some(default_var) => {
                let var = config.search_api_key_env.as_deref().unwrap_or(default_var);
                Some(std::env::var(var).map_err(|_| {
                    AgentError::SearchError(format!(
                        "{:?} search needs an API key in ${var}",
                        config.search_provider
                    ))
                })?)
            }
        };

        Ok(Self {
            provider: config.search_provider,
            api_key,
            max_results: config.search_max_results,
            rate_limit_secs: config.search_rate_limit_secs,
            fetch_top_result: config.search_fetch_top_result,
        })
    }

    async fn raw_search(&self, query: &str) -> Result<SearchResults, AgentError> {
        let key = self.api_key.as_deref().unwrap_or_default();
        match self.provider {
            SearchProviderKind::Duckduckgo => {
                web_search::rate_limited_ddg_search(query, self.max_results, self.rate_limit_secs)
                    .await
            }
            SearchProviderKind::Brave => {
                web_search::rate_limited_brave_search(
                    query,
                    self.max_results,
                    key,
                    self.rate_limit_secs,
                )
                .await
            }
            SearchProviderKind::Tavily => {
                web_search::rate_limited_tavily_search(
                    query,
                    self.max_results,
                    key,
                    self.rate_limit_secs,
                )
                .await
            }
        }
    }
}

impl Searcher for WebSearcher {
    async fn search(&self, query: &str) -> Result<String, AgentError> {
        let results = self.raw_search(query).await?;
        tracing::info!(
            query,
            provider = ?self.provider,
            hits = results.results.len(),
            answered = results.answer.is_some(),
            "Search finished"
        );

        // Snippets alone are thin; read the top page when there is no answer.
        let top_page = match (&results.answer, results.results.first()) {
            (None, Some(top)) if self.fetch_top_result => {
                match web_fetch::fetch_page(&top.url, TOP_PAGE_CHARS).await {
                    Ok(page) => Some(page),
                    Err(e) => {
                        tracing::warn!("Could not fetch top result: {e}");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(render_results(&results, top_page.as_deref()))
    }
}

/// Render results as plain text for a prompt.
pub fn render_results(results: &SearchResults, top_page: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(answer) = &results.answer {
        out.push_str("Answer: ");
        out.push_str(answer);
        out.push_str("\n\n");
    }
    for (i, r) in results.results.iter().enumerate() {
        out.push_str(&format!("{}. {} ({})\n", i + 1, r.title, r.url));
        if !r.snippet.is_empty() {
            out.push_str(&format!("   {}\n", r.snippet));
        }
    }
    if let Some(page) = top_page {
        out.push_str("\nTop result content:\n");
        out.push_str(page);
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str("No results found.");
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_search::SearchResult;

    fn hit(title: &str, url: &str, snippet: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn render_puts_answer_first() {
        let results = SearchResults {
            answer: Some("42".into()),
            results: vec![hit("Guide", "https://g.example", "life")],
        };
        let text = render_results(&results, None);
        assert_eq!(text, "Answer: 42\n\n1. Guide (https://g.example)\n   life");
    }

    #[test]
    fn render_appends_top_page() {
        let results = SearchResults {
            answer: None,
            results: vec![hit("A", "https://a.example", "")],
        };
        let text = render_results(&results, Some("# Heading"));
        assert!(text.starts_with("1. A (https://a.example)\n"));
        assert!(text.ends_with("Top result content:\n# Heading"));
    }

    #[test]
    fn render_empty_results() {
        assert_eq!(
            render_results(&SearchResults::default(), None),
            "No results found."
        );
    }

    #[test]
    fn duckduckgo_needs_no_key() {
        let config = crate::config::PartialConfig::default().finalize();
        let searcher = WebSearcher::from_config(&config).unwrap();
        assert!(searcher.api_key.is_none());
        assert!(searcher.fetch_top_result);
    }

    #[test]
    fn top_page_fetch_follows_config() {
        let config = crate::config::PartialConfig {
            search_fetch_top_result: Some(false),
            ..Default::default()
        }
        .finalize();
        let searcher = WebSearcher::from_config(&config).unwrap();
        assert!(!searcher.fetch_top_result);
    }
}
