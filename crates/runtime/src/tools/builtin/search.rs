//! Web search through the DuckDuckGo instant answer API.

use super::FetchError;
use crate::retry::RetryPolicy;
use crate::tools::{Arguments, ParamSpec, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DUCKDUCKGO_API_URL: &str = "https://api.duckduckgo.com/";
const DEFAULT_RESULTS: i64 = 5;
const MAX_RESULTS: i64 = 10;
const SNIPPET_CHARS: usize = 150;

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebSearch {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl WebSearch {
    pub fn new(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn fetch(&self, query: &str) -> Result<ApiResponse, FetchError> {
        let response = self
            .client
            .get(DUCKDUCKGO_API_URL)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::request("network error", e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchError::Transient(format!("search service returned {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Permanent(format!("search service returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::request("unexpected search response", e))
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "web_search",
            "Search the web for information on any topic. Use this when you need current \
             information, facts, or data from the internet.",
        )
        .param(ParamSpec::string(
            "query",
            "The search query or question to search for on the web.",
        ))
        .param(
            ParamSpec::integer(
                "num_results",
                "Number of search results to return (default: 5, max: 10).",
            )
            .with_default(DEFAULT_RESULTS),
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let query = args.str("query")?.trim();
        if query.is_empty() {
            return Err(ToolError::validation("query", "must not be empty"));
        }
        let limit = args.i64("num_results")?.clamp(1, MAX_RESULTS) as usize;

        let response = self
            .retry
            .run(|| self.fetch(query), FetchError::is_transient)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        let hits = collect_hits(response, limit);
        Ok(Value::String(summarize(query, &hits)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiResponse {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<ApiTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiTopic {
    Entry {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<ApiTopic>,
    },
}

fn collect_hits(response: ApiResponse, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if !response.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: response.heading,
            url: response.abstract_url,
            snippet: response.abstract_text,
        });
    }

    let mut stack: Vec<ApiTopic> = response.related_topics.into_iter().rev().collect();
    while let Some(topic) = stack.pop() {
        if hits.len() >= limit {
            break;
        }
        match topic {
            ApiTopic::Entry { text, first_url } => {
                let title = text.split(" - ").next().unwrap_or(&text).to_string();
                hits.push(SearchHit {
                    title,
                    url: first_url,
                    snippet: text,
                });
            }
            ApiTopic::Group { topics } => stack.extend(topics.into_iter().rev()),
        }
    }
    hits.truncate(limit);
    hits
}

fn summarize(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No search results found for: {query}");
    }
    let mut summary = format!("Search results for '{query}':\n");
    for (i, hit) in hits.iter().enumerate() {
        let snippet: String = hit.snippet.chars().take(SNIPPET_CHARS).collect();
        let ellipsis = if hit.snippet.chars().count() > SNIPPET_CHARS { "..." } else { "" };
        summary.push_str(&format!(
            "\n{}. {}\n   {snippet}{ellipsis}\n   URL: {}\n",
            i + 1,
            hit.title,
            hit.url
        ));
    }
    summary.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> ApiResponse {
        serde_json::from_value(json!({
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [
                {"Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Tools", "Topics": [
                    {"Text": "Clippy - A linter", "FirstURL": "https://duckduckgo.com/Clippy"},
                    {"Text": "Rustfmt - A formatter", "FirstURL": "https://duckduckgo.com/Rustfmt"}
                ]},
                {"Text": "Ferris", "FirstURL": "https://duckduckgo.com/Ferris"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn flattens_grouped_topics_in_order() {
        let hits = collect_hits(fixture(), 10);
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Rust (programming language)", "Cargo", "Clippy", "Rustfmt", "Ferris"]
        );
    }

    #[test]
    fn respects_result_limit() {
        assert_eq!(collect_hits(fixture(), 2).len(), 2);
    }

    #[test]
    fn summary_numbers_hits() {
        let hits = collect_hits(fixture(), 2);
        let summary = summarize("rust", &hits);
        assert!(summary.starts_with("Search results for 'rust':"));
        assert!(summary.contains("1. Rust (programming language)"));
        assert!(summary.contains("2. Cargo"));
        assert!(summary.contains("URL: https://duckduckgo.com/Cargo"));
    }

    #[test]
    fn empty_response_says_so() {
        let hits = collect_hits(ApiResponse::default(), 5);
        assert_eq!(summarize("zzz", &hits), "No search results found for: zzz");
    }

    #[test]
    fn long_snippets_are_truncated() {
        let hits = vec![SearchHit {
            title: "t".into(),
            url: "u".into(),
            snippet: "a".repeat(400),
        }];
        let summary = summarize("q", &hits);
        assert!(summary.contains(&format!("{}...", "a".repeat(SNIPPET_CHARS))));
        assert!(!summary.contains(&"a".repeat(SNIPPET_CHARS + 1)));
    }
}
