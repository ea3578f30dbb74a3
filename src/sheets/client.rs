use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{auth::ServiceAccountKey, SinkError, SinkResult, TokenProvider, UpstreamError};

/// A thin client for the Sheets v4 `values` endpoints of one spreadsheet.
#[derive(Debug)]
pub struct SheetsClient {
    http_client: Client,
    base_url: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Deserialize)]
struct ValueRange {
    // Omitted by the API when the range is empty.
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: String,
        key: ServiceAccountKey,
        timeout: Duration,
    ) -> SinkResult<Self> {
        // `Url::join` replaces the last path segment unless the base ends with a slash.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)
        } else {
            Url::parse(&format!("{base_url}/"))
        }
        .map_err(|er| SinkError::Config(format!("invalid sheets api url '{base_url}': {er}")))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::from)?;
        let tokens = TokenProvider::new(key, http_client.clone())?;

        Ok(Self {
            http_client,
            base_url,
            spreadsheet_id,
            tokens,
        })
    }

    /// Reads the cells of `range`, row by row.
    pub async fn get_values(&self, range: &str) -> SinkResult<Vec<Vec<String>>> {
        let url = self.values_url(range)?;
        let resp = self.send(self.http_client.get(url)).await?;
        let value_range: ValueRange = resp.json().await.map_err(UpstreamError::from)?;

        Ok(value_range.values)
    }

    /// Overwrites `range` with `values`, taken literally.
    pub async fn update_values(&self, range: &str, values: &[Vec<String>]) -> SinkResult<()> {
        let url = self.values_url(range)?;
        let req = self
            .http_client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values,
            });
        self.send(req).await?;

        Ok(())
    }

    /// Appends `values` after the last row of the table in `range`, inserting new rows
    /// instead of overwriting whatever follows it.
    pub async fn append_values(&self, range: &str, values: &[Vec<String>]) -> SinkResult<()> {
        let url = self.values_url(&format!("{range}:append"))?;
        let req = self
            .http_client
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values,
            });
        self.send(req).await?;

        Ok(())
    }

    /// Pushed as path segments so the id and the A1 range get percent-encoded.
    /// A sheet name with `#` or `?` would otherwise end the path early.
    fn values_url(&self, range: &str) -> SinkResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SinkError::Config(format!("invalid sheets api url '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);

        Ok(url)
    }

    async fn send(&self, req: RequestBuilder) -> SinkResult<Response> {
        let token = self.tokens.access_token().await?;
        let resp = req
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(UpstreamError::Status { status, body }.into())
        }
    }
}
