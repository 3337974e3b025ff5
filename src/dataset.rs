//! Remote financial dataset
//!
//! Every endpoint lives under `GET {url}/api/v1/ticker/<endpoint>` and
//! answers with an envelope `{code, msg, data}`; a non-zero `code` is an
//! error. The base URL and bearer token come from the request's settings,
//! so a dataset handle is connected per request via [`DatasetFactory`].

use crate::error::AgentError;
use crate::models::{JsonMap, TickerDescriptor};
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reporting frequency of statement line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Quarterly,
    Yearly,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        }
    }

    /// Lenient parse for tool arguments; unknown values fall back to quarterly.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "yearly" | "annual" | "annually" => Period::Yearly,
            _ => Period::Quarterly,
        }
    }
}

#[async_trait]
pub trait FinancialData: Send + Sync {
    /// Instruments matching a symbol or company name; empty when nothing matches.
    async fn lookup_ticker(&self, query: &str) -> Result<Vec<TickerDescriptor>>;

    /// Statement line items, newest period first.
    async fn financial_items(
        &self,
        symbol: &str,
        items: &[&str],
        end_date: Option<&str>,
        period: Period,
    ) -> Result<Vec<JsonMap>>;

    async fn financial_metrics(
        &self,
        symbol: &str,
        end_date: Option<&str>,
        period: Period,
    ) -> Result<Vec<JsonMap>>;

    /// Daily bars between two `YYYY-MM-DD` dates.
    async fn prices(&self, symbol: &str, start_date: &str, end_date: &str) -> Result<Vec<JsonMap>>;

    async fn insider_transactions(&self, symbol: &str, end_date: Option<&str>)
        -> Result<Vec<JsonMap>>;

    async fn news(&self, symbol: &str, end_date: Option<&str>) -> Result<Vec<JsonMap>>;

    async fn info(&self, symbol: &str) -> Result<JsonMap>;
}

/// Opens a dataset handle for one request.
pub trait DatasetFactory: Send + Sync {
    fn connect(&self, config: &RunConfig) -> Result<Arc<dyn FinancialData>>;
}

/// Keep rows whose `field` date is on or before `end_date`.
///
/// Dates are ISO strings so lexical order is date order. Rows without the
/// field cannot be placed in time and are dropped.
pub fn filter_until(rows: Vec<JsonMap>, field: &str, end_date: Option<&str>) -> Vec<JsonMap> {
    let Some(end_date) = end_date else {
        return rows;
    };

    rows.into_iter()
        .filter(|row| {
            row.get(field)
                .and_then(Value::as_str)
                .is_some_and(|date| date <= end_date)
        })
        .collect()
}

//
// ================= Retry Policy =================
//

/// Retry schedule for non-2xx responses: `base_delay + step × attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(10),
            step: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Retries without waiting; for tests and local fixtures.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            step: Duration::ZERO,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }
}

//
// ================= HTTP Dataset =================
//

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Connects [`RemoteDataset`]s that share one pooled HTTP client.
pub struct RemoteDatasetFactory {
    client: Client,
    retry: RetryPolicy,
}

impl RemoteDatasetFactory {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, retry }
    }
}

impl Default for RemoteDatasetFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetFactory for RemoteDatasetFactory {
    fn connect(&self, config: &RunConfig) -> Result<Arc<dyn FinancialData>> {
        let settings = config.settings()?;
        let base_url = settings.remote_financial_data_api_url();
        if base_url.is_empty() {
            return Err(AgentError::DatasetError(
                "remoteFinancialDataApiUrl is not configured".to_string(),
            ));
        }

        Ok(Arc::new(RemoteDataset {
            client: self.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: settings.remote_financial_data_api_key(),
            retry: self.retry,
        }))
    }
}

pub struct RemoteDataset {
    client: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl RemoteDataset {
    async fn request<T: DeserializeOwned + Default>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/api/v1/ticker/{}", self.base_url, endpoint);
        let total = self.retry.max_retries + 1;

        let mut attempt = 0;
        let response = loop {
            let outcome = self
                .client
                .get(&url)
                .query(query)
                .bearer_auth(&self.token)
                .send()
                .await;

            let failure = match outcome {
                Ok(response) if response.status().is_success() => break response,
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    format!("{} returned {}: {}", url, status, body)
                }
                Err(e) => format!("request to {} failed: {}", url, e),
            };

            if attempt >= self.retry.max_retries {
                return Err(AgentError::DatasetError(failure));
            }

            let delay = self.retry.delay(attempt);
            warn!(
                attempt = attempt + 1,
                total,
                delay_secs = delay.as_secs(),
                "Dataset request failed, retrying: {}",
                failure
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        let envelope: Envelope = response.json().await.map_err(|e| {
            AgentError::DatasetError(format!("Invalid envelope from {}: {}", url, e))
        })?;

        if envelope.code != 0 {
            return Err(AgentError::DatasetError(format!(
                "Failed to get data from remote dataset. Url: {}, Error: {}, Msg: {}",
                url,
                envelope.code,
                envelope.msg.unwrap_or_default()
            )));
        }

        debug!(endpoint, "Dataset response received");

        if envelope.data.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(envelope.data).map_err(|e| {
            AgentError::DatasetError(format!("Unexpected data shape from {}: {}", endpoint, e))
        })
    }
}

#[async_trait]
impl FinancialData for RemoteDataset {
    async fn lookup_ticker(&self, query: &str) -> Result<Vec<TickerDescriptor>> {
        info!(query, "Looking up ticker");
        self.request("lookup", &[("query", query.to_string())]).await
    }

    async fn financial_items(
        &self,
        symbol: &str,
        items: &[&str],
        end_date: Option<&str>,
        period: Period,
    ) -> Result<Vec<JsonMap>> {
        let mut query = vec![("symbol", symbol.to_string())];
        if !items.is_empty() {
            query.push(("items", items.join(",")));
        }
        query.push(("freq", period.as_str().to_string()));

        let rows = self.request("financial_items", &query).await?;
        Ok(filter_until(rows, "date", end_date))
    }

    async fn financial_metrics(
        &self,
        symbol: &str,
        end_date: Option<&str>,
        period: Period,
    ) -> Result<Vec<JsonMap>> {
        let rows = self
            .request(
                "financial_metrics",
                &[
                    ("symbol", symbol.to_string()),
                    ("freq", period.as_str().to_string()),
                ],
            )
            .await?;
        Ok(filter_until(rows, "date", end_date))
    }

    async fn prices(&self, symbol: &str, start_date: &str, end_date: &str) -> Result<Vec<JsonMap>> {
        self.request(
            "prices",
            &[
                ("symbol", symbol.to_string()),
                ("interval", "1d".to_string()),
                ("start_date", start_date.to_string()),
                ("end_date", end_date.to_string()),
            ],
        )
        .await
    }

    async fn insider_transactions(
        &self,
        symbol: &str,
        end_date: Option<&str>,
    ) -> Result<Vec<JsonMap>> {
        let rows = self
            .request("insider_transactions", &[("symbol", symbol.to_string())])
            .await?;
        Ok(filter_until(rows, "start_date", end_date))
    }

    async fn news(&self, symbol: &str, end_date: Option<&str>) -> Result<Vec<JsonMap>> {
        let rows = self
            .request(
                "news",
                &[("symbol", symbol.to_string()), ("count", "200".to_string())],
            )
            .await?;
        Ok(filter_until(rows, "pub_date", end_date))
    }

    async fn info(&self, symbol: &str) -> Result<JsonMap> {
        self.request("info", &[("symbol", symbol.to_string())]).await
    }
}

//
// ================= In-memory Dataset =================
//

/// Fixture dataset for development & testing
///
/// Lookups are keyed by exact query text. Clones share one lookup log, so
/// handles from [`DatasetFactory::connect`] record into it too.
#[derive(Clone, Default)]
pub struct StaticDataset {
    lookups: HashMap<String, Vec<TickerDescriptor>>,
    financial_items: Vec<JsonMap>,
    financial_metrics: Vec<JsonMap>,
    prices: Vec<JsonMap>,
    insider_transactions: Vec<JsonMap>,
    news: Vec<JsonMap>,
    info: JsonMap,
    failure: Option<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StaticDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticker(mut self, query: &str, matches: Vec<TickerDescriptor>) -> Self {
        self.lookups.insert(query.to_string(), matches);
        self
    }

    pub fn with_financial_items(mut self, rows: Vec<JsonMap>) -> Self {
        self.financial_items = rows;
        self
    }

    pub fn with_financial_metrics(mut self, rows: Vec<JsonMap>) -> Self {
        self.financial_metrics = rows;
        self
    }

    pub fn with_prices(mut self, rows: Vec<JsonMap>) -> Self {
        self.prices = rows;
        self
    }

    pub fn with_insider_transactions(mut self, rows: Vec<JsonMap>) -> Self {
        self.insider_transactions = rows;
        self
    }

    pub fn with_news(mut self, rows: Vec<JsonMap>) -> Self {
        self.news = rows;
        self
    }

    pub fn with_info(mut self, info: JsonMap) -> Self {
        self.info = info;
        self
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Queries passed to `lookup_ticker`, in call order.
    pub fn lookup_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(AgentError::DatasetError(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FinancialData for StaticDataset {
    async fn lookup_ticker(&self, query: &str) -> Result<Vec<TickerDescriptor>> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());
        self.check()?;
        Ok(self.lookups.get(query).cloned().unwrap_or_default())
    }

    async fn financial_items(
        &self,
        _symbol: &str,
        _items: &[&str],
        end_date: Option<&str>,
        _period: Period,
    ) -> Result<Vec<JsonMap>> {
        self.check()?;
        Ok(filter_until(self.financial_items.clone(), "date", end_date))
    }

    async fn financial_metrics(
        &self,
        _symbol: &str,
        end_date: Option<&str>,
        _period: Period,
    ) -> Result<Vec<JsonMap>> {
        self.check()?;
        Ok(filter_until(self.financial_metrics.clone(), "date", end_date))
    }

    async fn prices(&self, _symbol: &str, start_date: &str, end_date: &str) -> Result<Vec<JsonMap>> {
        self.check()?;
        Ok(self
            .prices
            .iter()
            .filter(|row| {
                row.get("date")
                    .and_then(Value::as_str)
                    .is_some_and(|date| date >= start_date && date <= end_date)
            })
            .cloned()
            .collect())
    }

    async fn insider_transactions(
        &self,
        _symbol: &str,
        end_date: Option<&str>,
    ) -> Result<Vec<JsonMap>> {
        self.check()?;
        Ok(filter_until(self.insider_transactions.clone(), "start_date", end_date))
    }

    async fn news(&self, _symbol: &str, end_date: Option<&str>) -> Result<Vec<JsonMap>> {
        self.check()?;
        Ok(filter_until(self.news.clone(), "pub_date", end_date))
    }

    async fn info(&self, _symbol: &str) -> Result<JsonMap> {
        self.check()?;
        Ok(self.info.clone())
    }
}

impl DatasetFactory for StaticDataset {
    fn connect(&self, _config: &RunConfig) -> Result<Arc<dyn FinancialData>> {
        self.check()?;
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rows(value: Value) -> Vec<JsonMap> {
        serde_json::from_value(value).unwrap()
    }

    fn connect(server: &MockServer, retries: u32) -> Arc<dyn FinancialData> {
        let config = RunConfig::with_settings(&json!({
            "remoteFinancialDataApiUrl": format!("{}/", server.uri()),
            "remoteFinancialDataApiKey": "token-1"
        }));
        RemoteDatasetFactory::with_retry(RetryPolicy::immediate(retries))
            .connect(&config)
            .unwrap()
    }

    #[test]
    fn test_retry_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay(0), Duration::from_secs(10));
        assert_eq!(policy.delay(2), Duration::from_secs(20));
    }

    #[test]
    fn test_filter_until() {
        let data = rows(json!([
            {"date": "2024-12-31"},
            {"date": "2023-12-31"},
            {"other": 1}
        ]));

        assert_eq!(filter_until(data.clone(), "date", None).len(), 3);

        let filtered = filter_until(data, "date", Some("2024-06-30"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["date"], "2023-12-31");
    }

    #[test]
    fn test_connect_requires_url() {
        let result = RemoteDatasetFactory::new().connect(&RunConfig::new());
        assert!(matches!(result, Err(AgentError::DatasetError(_))));
    }

    #[tokio::test]
    async fn test_lookup_decodes_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticker/lookup"))
            .and(query_param("query", "Apple Inc."))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "data": [{"symbol": "AAPL", "exchange": "NMS", "regular_market_price": 190.5}]
            })))
            .mount(&server)
            .await;

        let found = connect(&server, 0).lookup_ticker("Apple Inc.").await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].symbol.as_deref(), Some("AAPL"));
        assert_eq!(found[0].regular_market_price, Some(190.5));
    }

    #[tokio::test]
    async fn test_nonzero_code_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticker/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 40001, "msg": "symbol not supported", "data": null
            })))
            .mount(&server)
            .await;

        match connect(&server, 0).info("ZZZ").await {
            Err(AgentError::DatasetError(msg)) => {
                assert!(msg.contains("40001"));
                assert!(msg.contains("symbol not supported"));
            }
            other => panic!("expected DatasetError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticker/news"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticker/news"))
            .and(query_param("count", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": [
                    {"title": "old", "pub_date": "2024-01-02"},
                    {"title": "new", "pub_date": "2025-03-01"}
                ]
            })))
            .mount(&server)
            .await;

        let news = connect(&server, 3)
            .news("AAPL", Some("2024-12-31"))
            .await
            .unwrap();

        assert_eq!(news.len(), 1);
        assert_eq!(news[0]["title"], "old");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticker/prices"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(2)
            .mount(&server)
            .await;

        let result = connect(&server, 1)
            .prices("AAPL", "2024-01-01", "2024-02-01")
            .await;

        match result {
            Err(AgentError::DatasetError(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected DatasetError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_financial_items_query_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticker/financial_items"))
            .and(query_param("symbol", "AAPL"))
            .and(query_param("items", "net_income,revenue"))
            .and(query_param("freq", "yearly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": [{"date": "2024-09-30", "net_income": 93.7}]
            })))
            .mount(&server)
            .await;

        let items = connect(&server, 0)
            .financial_items("AAPL", &["net_income", "revenue"], None, Period::Yearly)
            .await
            .unwrap();

        assert_eq!(items[0]["net_income"], 93.7);
    }

    #[tokio::test]
    async fn test_static_dataset_records_lookups() {
        let dataset = StaticDataset::new().with_ticker(
            "AAPL",
            vec![TickerDescriptor {
                symbol: Some("AAPL".into()),
                ..TickerDescriptor::default()
            }],
        );
        let handle = dataset.connect(&RunConfig::new()).unwrap();

        assert_eq!(handle.lookup_ticker("AAPL").await.unwrap().len(), 1);
        assert!(handle.lookup_ticker("MSFT").await.unwrap().is_empty());
        assert_eq!(dataset.lookup_queries(), vec!["AAPL", "MSFT"]);
    }
}
