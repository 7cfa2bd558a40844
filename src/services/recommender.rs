use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};

use crate::{
    error::{AppError, AppResult},
    models::recommender::{EngineFeedback, EngineItem, EngineUser, EngineUserPatch},
    services::metrics,
};

/// External recommendation engine. Identifier lists come back best-first.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<String>>;
    async fn popular(&self, limit: usize) -> AppResult<Vec<String>>;
    async fn recommend_in_category(
        &self,
        user_id: &str,
        category: &str,
        limit: usize,
    ) -> AppResult<Vec<String>>;
    async fn add_user(&self, user_id: &str) -> AppResult<()>;
    async fn add_item(&self, item: &EngineItem) -> AppResult<()>;
    async fn update_user_labels(&self, user_id: &str, labels: Vec<String>) -> AppResult<()>;
    async fn add_like(&self, user_id: &str, item_id: &str) -> AppResult<()>;
    async fn remove_feedback(&self, user_id: &str, item_id: &str) -> AppResult<()>;
}

/// Gorse-compatible HTTP client. Every call is bounded by the client timeout.
#[derive(Clone)]
pub struct GorseClient {
    client: Client,
    base_url: Url,
}

impl GorseClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "recommender URL must be an http(s) base URL: {base_url}"
        );
        Ok(Self { client, base_url })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> AppResult<Response> {
        let result = match request.send().await {
            Ok(resp) if resp.status() == StatusCode::OK => Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Err(AppError::Upstream {
                    status: Some(status.as_u16()),
                    message: format!("{operation}: engine returned {status}: {body}"),
                    retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
                    timed_out: false,
                })
            }
            Err(e) => Err(transport_error(operation, e)),
        };
        metrics::record_recommender(operation, result.is_ok());
        result
    }

    async fn fetch_ids(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> AppResult<Vec<String>> {
        let response = self.send(operation, request).await?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| transport_error(operation, e))
    }
}

fn transport_error(operation: &str, e: reqwest::Error) -> AppError {
    AppError::Upstream {
        status: e.status().map(|s| s.as_u16()),
        message: format!("{operation}: {e}"),
        retryable: e.is_timeout() || e.is_connect(),
        timed_out: e.is_timeout(),
    }
}

#[async_trait]
impl Recommender for GorseClient {
    async fn recommend_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<String>> {
        let url = self.endpoint(&["api", "recommend", "user", user_id]);
        let request = self.client.get(url).query(&[("number", limit)]);
        self.fetch_ids("recommend_for_user", request).await
    }

    async fn popular(&self, limit: usize) -> AppResult<Vec<String>> {
        let url = self.endpoint(&["api", "item", "popular"]);
        let request = self.client.get(url).query(&[("number", limit)]);
        self.fetch_ids("popular", request).await
    }

    async fn recommend_in_category(
        &self,
        user_id: &str,
        category: &str,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let url = self.endpoint(&["api", "recommend", user_id, category]);
        let request = self.client.get(url).query(&[("number", limit)]);
        self.fetch_ids("recommend_in_category", request).await
    }

    async fn add_user(&self, user_id: &str) -> AppResult<()> {
        let body = EngineUser {
            user_id: user_id.to_string(),
        };
        let request = self.client.post(self.endpoint(&["api", "user"])).json(&body);
        self.send("add_user", request).await?;
        Ok(())
    }

    async fn add_item(&self, item: &EngineItem) -> AppResult<()> {
        tracing::debug!(item_id = %item.item_id, categories = ?item.categories, "publishing item");
        let request = self.client.post(self.endpoint(&["api", "item"])).json(item);
        self.send("add_item", request).await?;
        Ok(())
    }

    async fn update_user_labels(&self, user_id: &str, labels: Vec<String>) -> AppResult<()> {
        let body = EngineUserPatch { labels };
        let request = self
            .client
            .patch(self.endpoint(&["api", "user", user_id]))
            .json(&body);
        self.send("update_user_labels", request).await?;
        Ok(())
    }

    async fn add_like(&self, user_id: &str, item_id: &str) -> AppResult<()> {
        let body = vec![EngineFeedback::like(user_id, item_id)];
        let request = self.client.put(self.endpoint(&["api", "feedback"])).json(&body);
        self.send("add_feedback", request).await?;
        Ok(())
    }

    async fn remove_feedback(&self, user_id: &str, item_id: &str) -> AppResult<()> {
        let url = self.endpoint(&["api", "feedback", user_id, item_id]);
        self.send("remove_feedback", self.client.delete(url)).await?;
        Ok(())
    }
}
