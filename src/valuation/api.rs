use crate::error::AppError;
use crate::session::SessionId;
use crate::valuation::source::{BaseValueSource, ValueFetcher};
use crate::valuation::types::parse_valuation_payload;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::Client;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

fn portfolio_value_endpoint(api_base_url: &str, session_id: &SessionId) -> String {
    format!(
        "{}/api/users/{}/stocks/portfolio/value",
        api_base_url.trim_end_matches('/'),
        session_id.as_str()
    )
}

fn realtime_value_endpoint(api_base_url: &str, session_id: &SessionId) -> String {
    portfolio_value_endpoint(api_base_url, session_id) + "/realtime"
}

/// HTTP client for the portfolio backend's valuation endpoints.
#[derive(Debug, Clone)]
pub struct PortfolioApiClient {
    http_client: Client,
    api_base_url: String,
}

impl PortfolioApiClient {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base_url)
    }

    pub fn with_client(http_client: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into(),
        }
    }
}

async fn fetch_valuation(client: Client, endpoint: String) -> Result<f64, AppError> {
    let response = client.get(endpoint).send().await?.error_for_status()?;
    let mut payload = response.bytes().await?.to_vec();
    parse_valuation_payload(&mut payload)
}

impl ValueFetcher for PortfolioApiClient {
    fn fetch_realtime_value(
        &self,
        session_id: &SessionId,
    ) -> BoxFuture<'static, Result<f64, AppError>> {
        let endpoint = realtime_value_endpoint(&self.api_base_url, session_id);
        fetch_valuation(self.http_client.clone(), endpoint).boxed()
    }
}

impl BaseValueSource for PortfolioApiClient {
    fn fetch_base_value(
        &self,
        session_id: &SessionId,
    ) -> BoxFuture<'static, Result<f64, AppError>> {
        let endpoint = portfolio_value_endpoint(&self.api_base_url, session_id);
        fetch_valuation(self.http_client.clone(), endpoint).boxed()
    }
}
