use super::BenchmarkSource;
use crate::errors::SourceError;
use crate::model::{Benchmark, BenchmarkSummary, SyncStatus};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// REST client for the benchmark backend.
pub struct HttpSource {
    pub base_url: String,
    pub api_key: Option<String>,
    pub client: reqwest::Client,
}

impl HttpSource {
    /// `timeout` bounds each request as a whole, so a backend that accepts
    /// the connection and never answers surfaces as a transport error.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {}", key)),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, SourceError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T, SourceError> {
        let resp = self.authorize(self.client.get(self.url(path))).send().await?;
        let resp = Self::check(resp, what).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Decode(format!("{}: {}", what, e)))
    }

    async fn post(&self, path: &str, what: &str) -> Result<(), SourceError> {
        let resp = self
            .authorize(self.client.post(self.url(path)))
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await?;
        Self::check(resp, what).await?;
        Ok(())
    }
}

#[async_trait]
impl BenchmarkSource for HttpSource {
    async fn get_benchmark_details(&self, benchmark_id: i64) -> Result<Benchmark, SourceError> {
        self.get_json(
            &format!("/benchmarks/{}", benchmark_id),
            &format!("benchmark {}", benchmark_id),
        )
        .await
    }

    async fn list_benchmarks(&self, use_cache: bool) -> Result<Vec<BenchmarkSummary>, SourceError> {
        self.get_json(&format!("/benchmarks?use_cache={}", use_cache), "benchmark list")
            .await
    }

    async fn get_sync_status(&self, benchmark_id: i64) -> Result<SyncStatus, SourceError> {
        self.get_json(
            &format!("/benchmarks/{}/sync-status", benchmark_id),
            &format!("sync status of benchmark {}", benchmark_id),
        )
        .await
    }

    async fn sync_benchmark(&self, benchmark_id: i64) -> Result<(), SourceError> {
        self.post(
            &format!("/benchmarks/{}/sync", benchmark_id),
            &format!("benchmark {}", benchmark_id),
        )
        .await
    }

    async fn rerun_single_prompt(&self, prompt_id: i64) -> Result<(), SourceError> {
        self.post(
            &format!("/prompts/{}/rerun", prompt_id),
            &format!("prompt {}", prompt_id),
        )
        .await
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
