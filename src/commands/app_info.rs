use crate::state::AppState;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfoResponse {
    pub product_name: String,
    pub version: String,
    pub api_base_url: String,
    pub platform: String,
    pub arch: String,
}

pub fn build_app_info_response(
    product_name: String,
    version: String,
    api_base_url: String,
) -> AppInfoResponse {
    AppInfoResponse {
        product_name,
        version,
        api_base_url,
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    }
}

pub fn app_info(state: &AppState) -> AppInfoResponse {
    build_app_info_response(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
        state.config.api_base_url.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_state;
    use crate::valuation::api::DEFAULT_API_BASE_URL;

    #[tokio::test]
    async fn app_info_contains_runtime_metadata() {
        let state = test_state(0.0, 0.0).await;
        let response = app_info(&state);

        assert_eq!(response.product_name, "portfolio-sync");
        assert!(!response.version.is_empty());
        assert_eq!(response.api_base_url, DEFAULT_API_BASE_URL);
        assert!(!response.platform.is_empty());
        assert!(!response.arch.is_empty());
    }
}
