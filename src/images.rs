//! Image provider client: free-text photo search with normalised results.
//!
//! Image activities carry a `search_query` the editor resolves into an
//! actual photo through this client. The wire format follows the Pexels
//! search API (API key in the `Authorization` header, `photos[].src` size
//! variants); everything downstream sees only [`ImageHit`].
//!
//! No retries happen here — a search is one request, and the caller decides
//! whether a failed one is worth repeating.

use crate::error::CourseGenError;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Largest page the provider serves.
const MAX_PER_PAGE: usize = 80;

const HTTP_TIMEOUT_SECS: u64 = 15;

/// One normalised search result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct ImageHit {
    /// Full-size image URL, suitable for the course page.
    pub url: String,
    /// Small variant for editor pickers and previews.
    pub thumbnail_url: String,
    /// Photographer attribution, shown next to the image.
    pub credit: String,
    pub width: u32,
    pub height: u32,
}

/// Client for the photo search service.
pub struct ImageClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ImageClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: "https://api.pexels.com/v1".into(),
        }
    }

    /// Point at an alternative endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search for photos matching `query`.
    ///
    /// `per_page` is clamped to the provider's 1..=80 range.
    ///
    /// # Errors
    /// - [`CourseGenError::InvalidQuery`] — empty or whitespace-only query
    /// - [`CourseGenError::ProviderUnavailable`] — transport failure, auth
    ///   rejection, or any non-success status
    pub async fn search(
        &self,
        query: &str,
        per_page: usize,
    ) -> Result<Vec<ImageHit>, CourseGenError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CourseGenError::InvalidQuery);
        }
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", &per_page.to_string())])
            .send()
            .await
            .map_err(|e| CourseGenError::ProviderUnavailable {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(CourseGenError::ProviderUnavailable {
                detail: format!("API key rejected (HTTP {status})"),
            });
        }
        if !status.is_success() {
            return Err(CourseGenError::ProviderUnavailable {
                detail: format!("HTTP {status}"),
            });
        }

        let page: SearchPage =
            response
                .json()
                .await
                .map_err(|e| CourseGenError::ProviderUnavailable {
                    detail: format!("unreadable response body: {e}"),
                })?;

        let hits: Vec<ImageHit> = page.photos.into_iter().map(Photo::into_hit).collect();
        debug!(query, hits = hits.len(), "image search complete");
        Ok(hits)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    photographer: String,
    src: PhotoSrc,
}

#[derive(Deserialize)]
struct PhotoSrc {
    #[serde(default)]
    large: String,
    #[serde(default)]
    medium: String,
}

impl Photo {
    fn into_hit(self) -> ImageHit {
        ImageHit {
            url: self.src.large,
            thumbnail_url: self.src.medium,
            credit: self.photographer,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_query_rejected_before_any_request() {
        // base_url points nowhere routable; the query gate must fire first.
        let client = ImageClient::new("key").with_base_url("http://127.0.0.1:9");
        let err = client.search("   ", 10).await.unwrap_err();
        assert!(matches!(err, CourseGenError::InvalidQuery));
    }

    #[tokio::test]
    async fn unreachable_provider_is_provider_unavailable() {
        let client = ImageClient::new("key").with_base_url("http://127.0.0.1:9");
        let err = client.search("circuits", 10).await.unwrap_err();
        assert!(matches!(err, CourseGenError::ProviderUnavailable { .. }));
    }

    #[test]
    fn wire_page_normalises() {
        let page: SearchPage = serde_json::from_str(
            r#"{"photos":[{"width":800,"height":600,"photographer":"Ada",
                "src":{"large":"https://img/large.jpg","medium":"https://img/med.jpg"}}]}"#,
        )
        .unwrap();
        let hit = page.photos.into_iter().next().unwrap().into_hit();
        assert_eq!(hit.credit, "Ada");
        assert_eq!(hit.url, "https://img/large.jpg");
        assert_eq!(hit.thumbnail_url, "https://img/med.jpg");
        assert_eq!((hit.width, hit.height), (800, 600));
    }
}
