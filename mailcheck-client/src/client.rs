//! Verification API client struct and builder.

use mailcheck_stream::{NdjsonClient, Request, StreamConfig};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchEvent, BatchEvents, BatchHandler, BatchOutcome, BatchReport};
use crate::error::{ClientError, map_reqwest_error};
use crate::types::{
    AllResults, BatchNames, BatchRequest, Category, CategoryStatistics, EmailResult,
    GlobalStatistics, JobResults, Settings, UpdateBatchName, UpdateBatchNameResponse,
    UpdateSettingsResponse, VerificationStatus, VerifyEmail,
};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Environment variable read by [`VerifyClient::from_env`].
pub const BASE_URL_ENV: &str = "MAILCHECK_API_URL";

/// Client for the email-verification HTTP API.
///
/// # Example
///
/// ```no_run
/// use mailcheck_client::VerifyClient;
///
/// # async fn run() -> Result<(), mailcheck_client::ClientError> {
/// let client = VerifyClient::new().base_url("http://localhost:5000");
/// let stats = client.category_statistics().await?;
/// println!("{} addresses verified", stats.categories.total);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VerifyClient {
    /// API base URL, parsed once when set. Errors surface on the first call.
    pub(crate) base_url: Result<Url, String>,
    /// Shared HTTP client.
    pub(crate) http: reqwest::Client,
    /// Streaming client for the batch endpoint; shares `http`'s pool.
    pub(crate) stream: NdjsonClient,
}

impl VerifyClient {
    /// Create a client pointed at `http://localhost:5000`.
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::new();
        Self {
            base_url: parse_base_url(DEFAULT_BASE_URL),
            stream: NdjsonClient::new().with_http_client(http.clone()),
            http,
        }
    }

    /// Create a client from `MAILCHECK_API_URL`, falling back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new().base_url(url.trim()),
            _ => Self::new(),
        }
    }

    /// Override the API base URL. A path prefix such as `/v1` is kept.
    #[must_use]
    pub fn base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = parse_base_url(url.as_ref());
        self
    }

    /// Use an existing reqwest client for every call.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.stream = self.stream.with_http_client(http.clone());
        self.http = http;
        self
    }

    /// Configure how the batch stream is read.
    #[must_use]
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream = self.stream.config(config);
        self
    }

    /// Append percent-encoded path segments to the base URL.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone().map_err(ClientError::InvalidBaseUrl)?;
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `POST /api/verify/email`.
    pub async fn verify_email(&self, email: &str) -> Result<EmailResult, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::InvalidArgument("email is required"));
        }
        let url = self.endpoint(&["api", "verify", "email"])?;
        self.send_json(Method::POST, url, &VerifyEmail { email }).await
    }

    /// `GET /api/statistics/category`.
    pub async fn category_statistics(&self) -> Result<CategoryStatistics, ClientError> {
        self.get_json(self.endpoint(&["api", "statistics", "category"])?)
            .await
    }

    /// `GET /api/statistics`.
    pub async fn statistics(&self) -> Result<GlobalStatistics, ClientError> {
        self.get_json(self.endpoint(&["api", "statistics"])?).await
    }

    /// `GET /api/statistics/history/email?email=...`.
    ///
    /// The history shape is owned by the server and returned as-is.
    pub async fn email_history(&self, email: &str) -> Result<Value, ClientError> {
        if email.trim().is_empty() {
            return Err(ClientError::InvalidArgument("email is required"));
        }
        let mut url = self.endpoint(&["api", "statistics", "history", "email"])?;
        url.query_pairs_mut().append_pair("email", email);
        self.get_json(url).await
    }

    /// `GET /api/statistics/history?category=...`.
    pub async fn category_history(&self, category: Category) -> Result<Value, ClientError> {
        if category == Category::Unknown {
            return Err(ClientError::InvalidArgument("a known category is required"));
        }
        let mut url = self.endpoint(&["api", "statistics", "history"])?;
        url.query_pairs_mut()
            .append_pair("category", category.as_str());
        self.get_json(url).await
    }

    /// `GET /api/verify/status/{job_id}`.
    pub async fn verification_status(
        &self,
        job_id: &str,
    ) -> Result<VerificationStatus, ClientError> {
        if job_id.trim().is_empty() {
            return Err(ClientError::InvalidArgument("job id is required"));
        }
        self.get_json(self.endpoint(&["api", "verify", "status", job_id])?)
            .await
    }

    /// `GET /api/results`.
    pub async fn results(&self) -> Result<AllResults, ClientError> {
        self.get_json(self.endpoint(&["api", "results"])?).await
    }

    /// `GET /api/results/{job_id}`.
    pub async fn job_results(&self, job_id: &str) -> Result<JobResults, ClientError> {
        if job_id.trim().is_empty() {
            return Err(ClientError::InvalidArgument("job id is required"));
        }
        self.get_json(self.endpoint(&["api", "results", job_id])?)
            .await
    }

    /// `GET /api/batches`.
    pub async fn batch_names(&self) -> Result<BatchNames, ClientError> {
        self.get_json(self.endpoint(&["api", "batches"])?).await
    }

    /// `PUT /api/batches/{batch_id}/name`.
    pub async fn update_batch_name(
        &self,
        batch_id: &str,
        name: &str,
    ) -> Result<UpdateBatchNameResponse, ClientError> {
        if batch_id.trim().is_empty() {
            return Err(ClientError::InvalidArgument("batch id is required"));
        }
        if name.is_empty() {
            return Err(ClientError::InvalidArgument("new batch name is required"));
        }
        let url = self.endpoint(&["api", "batches", batch_id, "name"])?;

        tracing::debug!(batch_id, "renaming batch");
        self.send_json(Method::PUT, url, &UpdateBatchName { name })
            .await
    }

    /// `GET /api/settings`.
    pub async fn settings(&self) -> Result<Settings, ClientError> {
        self.get_json(self.endpoint(&["api", "settings"])?).await
    }

    /// `PUT /api/settings`. Only the features present in `settings` change.
    pub async fn update_settings(
        &self,
        settings: &Settings,
    ) -> Result<UpdateSettingsResponse, ClientError> {
        if settings.is_empty() {
            return Err(ClientError::InvalidArgument("settings data is required"));
        }
        let url = self.endpoint(&["api", "settings"])?;

        tracing::debug!(features = settings.len(), "updating settings");
        self.send_json(Method::PUT, url, settings).await
    }

    /// `POST /api/verify/batch`, streamed.
    ///
    /// Each NDJSON line is classified into a [`BatchEvent`] and handed to
    /// `handler` as it arrives. Returns once the server closes the stream.
    pub async fn verify_batch<H: BatchHandler>(
        &self,
        request: &BatchRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, ClientError> {
        if request.emails.is_empty() {
            return Err(ClientError::InvalidArgument("at least one email is required"));
        }

        let url = self.endpoint(&["api", "verify", "batch"])?;
        let http_request = Request::post(String::from(url))
            .header("accept", "application/json")
            .json(request)?;

        tracing::debug!(emails = request.emails.len(), job_id = ?request.job_id, "starting batch verification");

        let mut events = BatchEvents::new(handler);
        let summary = self.stream.stream(&http_request, &mut events, cancel).await?;
        let outcome = events.into_outcome(summary);

        tracing::debug!(
            job_id = ?outcome.job_id,
            state = ?outcome.state,
            results = outcome.results,
            "batch verification stream closed"
        );
        Ok(outcome)
    }

    /// `POST /api/verify/batch`, returning every event once the job is done.
    pub async fn verify_batch_collect(
        &self,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, ClientError> {
        let mut events = Vec::new();
        let outcome = {
            let mut collect = |event: BatchEvent| events.push(event);
            self.verify_batch(request, &mut collect, cancel).await?
        };
        Ok(BatchReport { outcome, events })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .http
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(%method, url = %url, "sending JSON");
        let response = self
            .http
            .request(method, url)
            .header("accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

impl Default for VerifyClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("{raw}: {e}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("{raw}: cannot be a base URL"));
    }
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let text = response.text().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        tracing::warn!(%status, "verification API returned an error");
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(format!("{e}: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(client: &VerifyClient, segments: &[&str]) -> String {
        client.endpoint(segments).unwrap().to_string()
    }

    #[test]
    fn default_base_url_is_set() {
        let client = VerifyClient::new();
        assert_eq!(endpoint(&client, &["api", "batches"]), "http://localhost:5000/api/batches");
    }

    #[test]
    fn builder_overrides_base_url_with_or_without_slash() {
        for base in ["http://remote:8080", "http://remote:8080/"] {
            let client = VerifyClient::new().base_url(base);
            assert_eq!(endpoint(&client, &["api", "batches"]), "http://remote:8080/api/batches");
        }
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let client = VerifyClient::new().base_url("http://gateway/mailcheck/");
        assert_eq!(
            endpoint(&client, &["api", "settings"]),
            "http://gateway/mailcheck/api/settings"
        );
    }

    #[test]
    fn segments_are_percent_encoded() {
        let client = VerifyClient::new();
        let url = client.endpoint(&["api", "verify", "status", "a/b c"]).unwrap();
        assert_eq!(url.path(), "/api/verify/status/a%2Fb%20c");
    }

    #[test]
    fn stream_config_is_forwarded() {
        let client = VerifyClient::new().stream_config(StreamConfig::default().fail_fast());
        assert_eq!(
            client.stream.stream_config().malformed,
            mailcheck_stream::MalformedPolicy::FailFast
        );
    }

    #[test]
    fn default_impl_matches_new() {
        assert_eq!(VerifyClient::default().base_url, VerifyClient::new().base_url);
    }

    #[tokio::test]
    async fn unparsable_base_url_fails_every_call() {
        let client = VerifyClient::new().base_url("not a url");
        assert!(matches!(
            client.batch_names().await.unwrap_err(),
            ClientError::InvalidBaseUrl(_)
        ));
        let client = VerifyClient::new().base_url("mailto:ops@example.com");
        assert!(matches!(
            client.settings().await.unwrap_err(),
            ClientError::InvalidBaseUrl(_)
        ));
    }

    #[tokio::test]
    async fn empty_job_id_is_rejected_before_io() {
        let client = VerifyClient::new().base_url("http://127.0.0.1:9");
        let err = client.verification_status("  ").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        let err = client.job_results("").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument("job id is required")));
    }

    #[tokio::test]
    async fn empty_rename_arguments_are_rejected() {
        let client = VerifyClient::new().base_url("http://127.0.0.1:9");
        assert!(matches!(
            client.update_batch_name("", "x").await.unwrap_err(),
            ClientError::InvalidArgument("batch id is required")
        ));
        assert!(matches!(
            client.update_batch_name("b1", "").await.unwrap_err(),
            ClientError::InvalidArgument("new batch name is required")
        ));
    }

    #[tokio::test]
    async fn empty_single_and_history_arguments_are_rejected() {
        let client = VerifyClient::new().base_url("http://127.0.0.1:9");
        assert!(matches!(
            client.verify_email(" ").await.unwrap_err(),
            ClientError::InvalidArgument("email is required")
        ));
        assert!(matches!(
            client.email_history("").await.unwrap_err(),
            ClientError::InvalidArgument("email is required")
        ));
        assert!(matches!(
            client.category_history(Category::Unknown).await.unwrap_err(),
            ClientError::InvalidArgument(_)
        ));
        assert!(matches!(
            client.update_settings(&Settings::new()).await.unwrap_err(),
            ClientError::InvalidArgument("settings data is required")
        ));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let client = VerifyClient::new().base_url("http://127.0.0.1:9");
        let mut events = Vec::new();
        let mut handler = |e: BatchEvent| events.push(e);
        let err = client
            .verify_batch(&BatchRequest::new(Vec::<String>::new()), &mut handler, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(events.is_empty());
    }
}
