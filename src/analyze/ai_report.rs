//! OpenAI-compatible chat-completions backend for structured reports.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyze::{extract_keywords, summarize, Report, DEFAULT_TOP_K};
use crate::config::ai::AiConfig;
use crate::sentiment::{classify, Sentiment};

pub struct AiReportClient {
    http: reqwest::Client,
    cfg: AiConfig,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// Loose shape the model is asked to return.
#[derive(Debug, Default, Deserialize)]
struct RawReport {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Turn the model's JSON reply into a `Report`, patching blanks from local analysis.
pub fn parse_report_reply(raw: &str, text: &str) -> Result<Report> {
    let r: RawReport = serde_json::from_str(raw.trim()).context("ai report is not json")?;
    let keywords = if r.keywords.is_empty() {
        extract_keywords(text, DEFAULT_TOP_K)
    } else {
        r.keywords
    };
    Ok(Report {
        summary: if r.summary.trim().is_empty() {
            summarize(text)
        } else {
            r.summary.trim().to_string()
        },
        sentiment: Sentiment::from_label(&r.sentiment).unwrap_or_else(|| classify(text)),
        topics: r.topics,
        keywords,
    })
}

fn build_prompt(text: &str) -> String {
    format!(
        "请对下列文本生成结构化政企舆情分析报告，严格输出JSON对象，字段包含：\
         summary(字符串)、sentiment(正面/负面/中性)、topics(字符串数组)、keywords(字符串数组)。\n\n文本：{text}"
    )
}

impl AiReportClient {
    /// None when the config is disabled or has no key.
    pub fn from_config(cfg: &AiConfig) -> Result<Option<Self>> {
        if !cfg.is_usable() {
            return Ok(None);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building ai reqwest client")?;
        Ok(Some(Self {
            http,
            cfg: cfg.clone(),
        }))
    }

    pub async fn report(&self, text: &str) -> Result<Report> {
        let prompt = build_prompt(text);
        let req = Req {
            model: &self.cfg.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &self.cfg.system_prompt,
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.cfg.base_url))
            .bearer_auth(&self.cfg.api_key)
            .json(&req)
            .send()
            .await
            .context("ai chat completions post()")?;
        if !resp.status().is_success() {
            return Err(anyhow!("ai backend returned {}", resp.status()));
        }
        let body: Resp = resp.json().await.context("ai response json")?;
        if let Some(u) = &body.usage {
            info!(target: "analyze", model = %self.cfg.model, total_tokens = u.total_tokens, "ai report usage");
        }
        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default();
        parse_report_reply(content, text)
    }
}
