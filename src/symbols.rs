//! Symbol-discovery fallback, used only by the CLI composition root when
//! the scout can't bootstrap an initial symbol set (spec.md is silent on
//! bootstrap; this is a supplemental feature carried over from
//! `original_source/scanner/symbols.py::fetch_all_pairs`).

use crate::error::ScoutError;

const CANDIDATE_PATHS: &[&str] = &["/api/v3/defaultSymbols", "/api/v3/exchangeInfo"];

/// Fetch the full list of trading pairs, trying each candidate REST path in
/// turn and tolerating the couple of response shapes MEXC is known to
/// return (`["BTCUSDT", ...]`, `{"data": [...]}`, `{"symbols": [{"symbol": ...}]}`).
pub async fn fetch_all_pairs(rest_url: &str) -> Result<Vec<String>, ScoutError> {
    let http = reqwest::Client::new();
    let base = rest_url.trim_end_matches('/');

    for candidate in CANDIDATE_PATHS {
        let url = format!("{base}{candidate}");
        let response = match http.get(&url).send().await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let response = match response.error_for_status() {
            Ok(r) => r,
            Err(_) => continue,
        };
        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(_) => continue,
        };
        if let Some(pairs) = extract_pairs(&body) {
            return Ok(pairs);
        }
    }

    Err(ScoutError::UnexpectedShape(
        "unable to fetch symbol list from any known endpoint".to_string(),
    ))
}

fn extract_pairs(body: &serde_json::Value) -> Option<Vec<String>> {
    if let Some(array) = body.as_array() {
        return Some(
            array
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        );
    }
    if let Some(data) = body.get("data").and_then(|v| v.as_array()) {
        return Some(
            data.iter()
                .filter_map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .or_else(|| v.get("symbol").and_then(|s| s.as_str()).map(str::to_string))
                })
                .collect(),
        );
    }
    if let Some(symbols) = body.get("symbols").and_then(|v| v.as_array()) {
        return Some(
            symbols
                .iter()
                .filter_map(|v| v.get("symbol").and_then(|s| s.as_str()).map(str::to_string))
                .collect(),
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn falls_back_to_exchange_info_when_default_symbols_404s() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/defaultSymbols"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbols": [{"symbol": "BTCUSDT"}, {"symbol": "ETHUSDT"}]
            })))
            .mount(&server)
            .await;

        let pairs = fetch_all_pairs(&server.uri()).await.unwrap();
        assert_eq!(pairs, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn plain_array_response_is_used_directly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/defaultSymbols"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["BTCUSDT", "ETHUSDT"])))
            .mount(&server)
            .await;

        let pairs = fetch_all_pairs(&server.uri()).await.unwrap();
        assert_eq!(pairs, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn all_endpoints_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/defaultSymbols"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(fetch_all_pairs(&server.uri()).await.is_err());
    }
}
