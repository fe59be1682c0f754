// src/store/sheets.rs
//! Google Sheets v4 `values` API client (read + single-row append).
//! Authentication is a bearer token obtained elsewhere.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Store;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/";

pub struct SheetsStore {
    http: Client,
    base_url: Url,
    spreadsheet_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_cells: usize,
}

impl SheetsStore {
    pub fn new(
        spreadsheet_id: &str,
        token: String,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building sheets http client")?;
        Ok(Self {
            http,
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            spreadsheet_id: spreadsheet_id.to_string(),
            token,
        })
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{suffix}` with every segment percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let last = format!("{range}{suffix}");
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets base url cannot be a base"))?
            .pop_if_empty()
            .extend(&[
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                last.as_str(),
            ]);
        Ok(url)
    }
}

/// Cells come back as strings when rendered, but numbers/bools are possible.
fn cell_to_string(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn error_for_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(300).collect();
    bail!("{what}: HTTP {status}: {snippet}")
}

#[async_trait::async_trait]
impl Store for SheetsStore {
    async fn read(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range, "")?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("sheets values.get")?;
        let resp = error_for_status(resp, "sheets values.get").await?;
        let body: ValueRange = resp.json().await.context("decoding values.get body")?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append(&self, range: &str, values: Vec<String>) -> Result<usize> {
        let url = self.values_url(range, ":append")?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&AppendBody {
                values: [values.as_slice()],
            })
            .send()
            .await
            .context("sheets values.append")?;
        let resp = error_for_status(resp, "sheets values.append").await?;
        let body: AppendResponse = resp.json().await.context("decoding values.append body")?;
        Ok(body.updates.map(|u| u.updated_cells).unwrap_or(0))
    }

    fn name(&self) -> &'static str {
        "sheets"
    }
}
