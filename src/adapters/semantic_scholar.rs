//! Semantic Scholar Academic Graph API adapter.

use std::time::Duration;

use serde::Deserialize;

use crate::repositories::rows::Paper;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: usize = 100;
const PAGE_DELAY: Duration = Duration::from_millis(100);

const FIELDS: &str = "title,year,citationCount,venue,authors,fieldsOfStudy,\
                      publicationTypes,influentialCitationCount,referenceCount";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    data: Vec<Paper>,
}

/// Outcome of a paginated search: whatever was collected, plus the error
/// that stopped pagination early, if any.
#[derive(Debug, Default)]
pub struct PaperSearchResult {
    pub papers: Vec<Paper>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SemanticScholarClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SemanticScholarClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, api_key: api_key.to_string(), base_url: BASE_URL.to_string() }
    }

    /// Cursor-paginated paper search with year filtering.
    ///
    /// Collects up to `limit` papers in pages of at most 100, pausing
    /// briefly between pages. Any failure degrades to the papers already
    /// collected.
    pub async fn search_papers(
        &self,
        query: &str,
        year_start: i32,
        year_end: i32,
        limit: usize,
    ) -> PaperSearchResult {
        let mut all_papers: Vec<Paper> = Vec::new();
        let mut error: Option<String> = None;
        let mut offset = 0usize;

        while all_papers.len() < limit {
            let page_limit = PAGE_SIZE.min(limit - all_papers.len());
            let year_range = format!("{}-{}", year_start, year_end);
            let offset_param = offset.to_string();
            let limit_param = page_limit.to_string();
            let mut request = self.http.get(&self.base_url).query(&[
                ("query", query),
                ("year", year_range.as_str()),
                ("fields", FIELDS),
                ("offset", offset_param.as_str()),
                ("limit", limit_param.as_str()),
            ]);
            if !self.api_key.is_empty() {
                request = request.header("x-api-key", &self.api_key);
            }

            let page: SearchResponse = match Self::fetch_page(request).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!("Semantic Scholar search failed: {}", err);
                    error = Some(err.to_string());
                    break;
                },
            };

            if page.data.is_empty() {
                break;
            }
            offset += page.data.len();
            all_papers.extend(page.data);

            if offset as i64 >= page.total {
                break;
            }
            tokio::time::sleep(PAGE_DELAY).await;
        }

        all_papers.truncate(limit);
        PaperSearchResult { papers: all_papers, error }
    }

    async fn fetch_page(request: reqwest::RequestBuilder) -> Result<SearchResponse, reqwest::Error> {
        let response = request.send().await?.error_for_status()?;
        response.json::<SearchResponse>().await
    }
}
