use std::time::{Duration, Instant};

use chrono::Local;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::{ACCEPT, REFERER, USER_AGENT};
use crate::error::{AppError, FetchError};
use crate::types::{Envelope, PriceField, PriceSample, Source};

/// Query parameter carrying the JSON-encoded request object.
pub const REQ_DATA_PARAM: &str = "reqData";

/// Build the shared HTTP client: fixed upstream headers and a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(reqwest::header::REFERER, HeaderValue::from_static(REFERER));

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Stateless apart from the pooled client; cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct PriceFetcher {
    client: reqwest::Client,
}

impl PriceFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build the GET for a source. Sources with `params` get them serialized to
    /// JSON and percent-encoded into `reqData`, after any query already in the URL.
    pub fn build_request(&self, source: &Source) -> Result<reqwest::Request, FetchError> {
        let mut req = self.client.get(&source.url);
        if let Some(params) = &source.params {
            let req_data = serde_json::to_string(params)?;
            req = req.query(&[(REQ_DATA_PARAM, req_data)]);
        }
        req.build().map_err(FetchError::from_reqwest)
    }

    /// One GET against one source, mapped to a sample. No retries.
    pub async fn fetch(&self, source: &Source) -> Result<PriceSample, FetchError> {
        let started = Instant::now();
        let req = self.build_request(source)?;

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(FetchError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await.map_err(FetchError::from_reqwest)?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;

        let sample = extract_sample(source, &body)?;
        debug!(
            source = %source.id,
            price = %sample.price,
            change = %sample.change,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched {}",
            source.name,
        );
        Ok(sample)
    }
}

/// Pull price and change out of a decoded body according to the source's envelope.
///
/// Missing objects along the path are treated as empty, so each field falls back
/// to the sentinel on its own. Only an explicit `status: "FAIL"` in a `datas`
/// envelope is an error.
pub fn extract_sample(source: &Source, body: &serde_json::Value) -> Result<PriceSample, FetchError> {
    let result_data = body.get("resultData");

    let container = match source.envelope {
        Envelope::Datas => {
            let status = result_data
                .and_then(|r| r.get("status"))
                .and_then(|s| s.as_str());
            if status == Some("FAIL") {
                return Err(FetchError::UpstreamFailed);
            }
            result_data.and_then(|r| r.get("datas"))
        }
        Envelope::Data => result_data.and_then(|r| r.get("data")),
    };

    let field = |key: &str| PriceField::from_json(container.and_then(|c| c.get(key)));

    Ok(PriceSample {
        price: field(&source.price_key),
        change: field(&source.change_key),
        fetched_at: Local::now(),
    })
}
