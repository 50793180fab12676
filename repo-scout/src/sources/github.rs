use crate::fetcher::Fetcher;
use crate::traits::{CandidateSource, ExcerptSource};
use crate::types::{Candidate, FetchConfig, Result, ScoutError, SearchHits, SearchQuery};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// The index allows at most five `OR` operators per query.
pub const MAX_KEYWORDS_PER_QUERY: usize = 6;
const PER_PAGE: usize = 100;
/// Search results stop at 1000 items (10 pages of 100).
const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    html_url: String,
    description: Option<String>,
    stargazers_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    fork: bool,
    created_at: DateTime<Utc>,
}

impl From<RepoItem> for Candidate {
    fn from(item: RepoItem) -> Self {
        Self {
            full_name: item.full_name,
            url: item.html_url,
            description: item.description.unwrap_or_default(),
            stars: item.stargazers_count,
            language: item.language.unwrap_or_default(),
            topics: item.topics,
            is_fork: item.fork,
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadmeResponse {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// GitHub repository search plus README retrieval.
pub struct GitHubSource {
    fetcher: Fetcher,
    api_url: String,
}

impl GitHubSource {
    pub fn new(fetch_config: FetchConfig, token: Option<&str>, api_url: &str) -> Result<Self> {
        let api_url = url::Url::parse(api_url)?;
        Ok(Self {
            fetcher: Fetcher::new(fetch_config, token)?,
            api_url: api_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    async fn search_group(&self, query: &SearchQuery, keywords: &[String]) -> Result<Vec<Candidate>> {
        let q = build_query(query, keywords);
        let url = format!("{}/search/repositories", self.api_url);
        let mut repos = Vec::new();

        debug!("Searching repositories: {}", q);

        for page in 1..=MAX_PAGES {
            let params = [
                ("q", q.clone()),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];

            let response: SearchResponse = self
                .fetcher
                .get_json(&url, &params)
                .await?
                .ok_or_else(|| ScoutError::SourceUnavailable(format!("{} returned 404", url)))?;

            if response.items.is_empty() {
                break;
            }

            let page_len = response.items.len();
            for item in response.items {
                repos.push(Candidate::from(item));
                if repos.len() >= query.max_results {
                    return Ok(repos);
                }
            }

            if page_len < PER_PAGE {
                break;
            }
        }

        Ok(repos)
    }
}

#[async_trait]
impl CandidateSource for GitHubSource {
    fn source_name(&self) -> String {
        format!("GitHub search ({})", self.api_url)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchHits> {
        let groups: Vec<&[String]> = if query.keywords.is_empty() {
            vec![&query.keywords[..]]
        } else {
            query.keywords.chunks(MAX_KEYWORDS_PER_QUERY).collect()
        };

        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for group in &groups {
            for candidate in self.search_group(query, group).await? {
                if seen.insert(candidate.full_name.clone()) {
                    items.push(candidate);
                }
            }
        }

        info!(
            "Search returned {} repositories across {} quer{}",
            items.len(),
            groups.len(),
            if groups.len() == 1 { "y" } else { "ies" }
        );

        Ok(SearchHits {
            items,
            keywords_applied: true,
        })
    }
}

#[async_trait]
impl ExcerptSource for GitHubSource {
    async fn fetch_excerpt(&self, full_name: &str) -> Result<Option<String>> {
        let url = format!("{}/repos/{}/readme", self.api_url, full_name);
        match self.fetcher.get_json::<ReadmeResponse>(&url, &[]).await? {
            Some(readme) => decode_readme(&readme).map(Some),
            None => Ok(None),
        }
    }
}

/// Build the `q` parameter: creation bound, fork exclusion, optional
/// star floor, and an OR group matched against name, description and README.
pub fn build_query(query: &SearchQuery, keywords: &[String]) -> String {
    let mut q = format!("created:>{} fork:false", query.since.format("%Y-%m-%dT%H:%M:%SZ"));

    if query.min_stars > 0 {
        q.push_str(&format!(" stars:>={}", query.min_stars));
    }

    let terms: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| if k.contains(char::is_whitespace) { format!("\"{}\"", k) } else { k.to_string() })
        .collect();

    if !terms.is_empty() {
        q.push_str(&format!(" ({}) in:name,description,readme", terms.join(" OR ")));
    }

    q
}

fn decode_readme(readme: &ReadmeResponse) -> Result<String> {
    match readme.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = readme.content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| ScoutError::Malformed(format!("README is not valid base64: {}", e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        Some(other) => Err(ScoutError::Malformed(format!("unsupported README encoding: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(keywords: &[&str], min_stars: u64) -> SearchQuery {
        SearchQuery {
            since: Utc.with_ymd_and_hms(2024, 12, 10, 6, 30, 0).unwrap(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            max_results: 100,
            min_stars,
        }
    }

    #[test]
    fn query_without_keywords() {
        let q = query(&[], 0);
        assert_eq!(build_query(&q, &q.keywords), "created:>2024-12-10T06:30:00Z fork:false");
    }

    #[test]
    fn query_with_keywords_and_star_floor() {
        let q = query(&["rust", "machine learning"], 5);
        assert_eq!(
            build_query(&q, &q.keywords),
            "created:>2024-12-10T06:30:00Z fork:false stars:>=5 (rust OR \"machine learning\") in:name,description,readme"
        );
    }

    #[test]
    fn parses_search_items() {
        let body = r#"{
            "total_count": 2,
            "incomplete_results": false,
            "items": [
                {
                    "full_name": "octo/alpha",
                    "html_url": "https://github.com/octo/alpha",
                    "description": null,
                    "stargazers_count": 42,
                    "language": "Rust",
                    "topics": ["cli"],
                    "fork": false,
                    "created_at": "2024-12-11T10:00:00Z"
                },
                {
                    "full_name": "octo/beta",
                    "html_url": "https://github.com/octo/beta",
                    "description": "beta",
                    "stargazers_count": 7,
                    "language": null,
                    "fork": true,
                    "created_at": "2024-12-11T11:00:00Z"
                }
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let candidates: Vec<Candidate> = response.items.into_iter().map(Candidate::from).collect();
        assert_eq!(candidates[0].description, "");
        assert_eq!(candidates[0].topics, vec!["cli".to_string()]);
        assert_eq!(candidates[1].language, "");
        assert!(candidates[1].is_fork);
        assert!(candidates[1].topics.is_empty());
    }

    #[test]
    fn decodes_wrapped_base64_readme() {
        let readme = ReadmeResponse {
            content: "IyBIZWxs\nbyB3b3Js\nZA==\n".to_string(),
            encoding: Some("base64".to_string()),
        };
        assert_eq!(decode_readme(&readme).unwrap(), "# Hello world");
    }

    #[test]
    fn rejects_unknown_encoding() {
        let readme = ReadmeResponse {
            content: "abc".to_string(),
            encoding: Some("utf-16".to_string()),
        };
        assert!(matches!(decode_readme(&readme), Err(ScoutError::Malformed(_))));
    }

    #[test]
    fn rejects_bad_api_url() {
        assert!(GitHubSource::new(FetchConfig::default(), None, "not a url").is_err());
    }
}
