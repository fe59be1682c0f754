// src/ingest/providers/translate.rs
//! LibreTranslate-compatible HTTP translator.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ingest::types::Translator;

pub struct HttpTranslator {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct Req<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

impl HttpTranslator {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building translator http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

fn decode(status: reqwest::StatusCode, body: Resp) -> Result<String> {
    if let Some(err) = body.error {
        return Err(anyhow!("translator error ({status}): {err}"));
    }
    if !status.is_success() {
        return Err(anyhow!("translator HTTP {status}"));
    }
    body.translated_text
        .ok_or_else(|| anyhow!("translator response without translatedText"))
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let req = Req {
            q: text,
            source: source_lang,
            target: target_lang,
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .context("translator request")?;
        let status = resp.status();
        let body: Resp = resp.json().await.context("decoding translator response")?;
        decode(status, body)
    }

    fn name(&self) -> &'static str {
        "libretranslate"
    }
}
