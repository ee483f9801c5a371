//! SeeChat hypothesis platform client.
//!
//! Endpoints:
//!   POST {api_base}/idea/create_hypothesis: streams concatenated JSON objects;
//!        the one with `data.type == "metadata"` carries the new hypothesis id
//!   POST {api_base}/idea/edit_hypothesis: sets title and markdown summary
//!
//! Authentication: `X-API-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use hypoforge_common::{HypoforgeError, RetryPolicy, SandboxClient};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::formatting::idea_summary;
use crate::models::Hypothesis;
use super::{HypothesisPublisher, PublishError, PublishRequest};

pub const SEECHAT_API_BASE: &str = "https://api.staging.seechat.ai";
pub const SEECHAT_WEB_BASE: &str = "https://staging.seechat.ai";

#[derive(Debug, Serialize)]
struct CreateHypothesisBody<'a> {
    problem: &'a str,
    research_topics: Vec<&'a str>,
    field_of_study_1: &'a str,
    data_source: &'a str,
    is_private: bool,
}

#[derive(Debug, Serialize)]
struct EditHypothesisBody<'a> {
    hypothesis_id: &'a str,
    title: &'a str,
    idea_summary: &'a str,
    is_private: bool,
}

pub struct SeeChatPublisher {
    client:      SandboxClient,
    api_base:    String,
    web_base:    String,
    api_key:     SecretString,
    data_source: String,
    is_private:  bool,
    edit_retry:  RetryPolicy,
}

impl SeeChatPublisher {
    pub fn new(api_key: SecretString, data_source: impl Into<String>, timeout: Duration) -> Result<Self, HypoforgeError> {
        Ok(Self {
            client: SandboxClient::new(timeout)?,
            api_base: SEECHAT_API_BASE.to_string(),
            web_base: SEECHAT_WEB_BASE.to_string(),
            api_key,
            data_source: data_source.into(),
            is_private: false,
            edit_retry: RetryPolicy::default(),
        })
    }

    pub fn with_endpoints(mut self, api_base: impl Into<String>, web_base: impl Into<String>) -> Result<Self, HypoforgeError> {
        let api_base = api_base.into();
        self.client.allow_url_host(&api_base)?;
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.web_base = web_base.into().trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Retry budget for the edit call. Create is never retried: a lost
    /// response would leave a duplicate behind.
    pub fn with_edit_retry(mut self, retry: RetryPolicy) -> Self {
        self.edit_retry = retry;
        self
    }

    pub fn idea_url(&self, remote_id: &str) -> String {
        format!("{}/idea/{}", self.web_base, remote_id)
    }

    async fn create(&self, req: &PublishRequest<'_>) -> Result<String, PublishError> {
        let url = format!("{}/idea/create_hypothesis", self.api_base);
        let body = CreateHypothesisBody {
            problem: &req.statement.text,
            research_topics: req.paper.category.as_deref().into_iter().collect(),
            field_of_study_1: req.field_of_study,
            data_source: &self.data_source,
            is_private: self.is_private,
        };
        let failed = |e: HypoforgeError| PublishError::Failed(e.to_string());

        let http = self.client.post(&url).map_err(failed)?
            .header("X-API-Key", self.api_key.expose_secret())
            .json(&body);
        let resp = self.client.send(http).await.map_err(failed)?;
        let text = resp.text().await.map_err(|e| failed(e.into()))?;

        parse_hypothesis_id(&text)
            .ok_or_else(|| PublishError::Failed("create response carried no hypothesis id".to_string()))
    }

    async fn edit(&self, remote_id: &str, title: &str, summary: &str) -> Result<(), HypoforgeError> {
        let url = format!("{}/idea/edit_hypothesis", self.api_base);
        let body = EditHypothesisBody {
            hypothesis_id: remote_id,
            title,
            idea_summary: summary,
            is_private: self.is_private,
        };
        self.edit_retry
            .run("edit hypothesis", || async {
                let http = self.client.post(&url)?
                    .header("X-API-Key", self.api_key.expose_secret())
                    .json(&body);
                self.client.send(http).await?;
                Ok::<_, HypoforgeError>(())
            })
            .await
    }
}

/// Scan a create response for the metadata event.
/// The body is a run of JSON objects, either back to back or as `data:` lines.
pub fn parse_hypothesis_id(body: &str) -> Option<String> {
    fn from_event(v: &serde_json::Value) -> Option<String> {
        if v["data"]["type"].as_str() != Some("metadata") {
            return None;
        }
        match &v["data"]["content"]["hypothesis_id"] {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    let concatenated = serde_json::Deserializer::from_str(body)
        .into_iter::<serde_json::Value>()
        .map_while(Result::ok)
        .find_map(|v| from_event(&v));
    if concatenated.is_some() {
        return concatenated;
    }

    body.lines()
        .filter_map(|l| {
            let l = l.trim();
            let l = l.strip_prefix("data:").unwrap_or(l).trim();
            serde_json::from_str::<serde_json::Value>(l).ok()
        })
        .find_map(|v| from_event(&v))
}

#[async_trait]
impl HypothesisPublisher for SeeChatPublisher {
    #[instrument(skip_all, fields(title = %req.paper.title))]
    async fn publish(&self, req: PublishRequest<'_>) -> Result<Hypothesis, PublishError> {
        let remote_id = self.create(&req).await?;
        debug!(remote_id = %remote_id, "Hypothesis created");

        let summary = idea_summary(req.paper, req.statement);
        if let Err(e) = self.edit(&remote_id, &req.paper.title, &summary).await {
            debug!(remote_id = %remote_id, error = %e, "Edit failed after create");
            return Err(PublishError::Partial { remote_id, reason: e.to_string() });
        }

        let url = self.idea_url(&remote_id);
        Ok(Hypothesis {
            id: Uuid::new_v4(),
            field_of_study: req.field_of_study.to_string(),
            problem_statement: req.statement.text.clone(),
            source_reference: req.paper.source_url().unwrap_or_else(|| req.paper.title.clone()),
            remote_id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Paper, PreprintServer, ProblemStatement};
    use chrono::NaiveDate;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn paper() -> Paper {
        Paper {
            title: "Lactate in sepsis".to_string(),
            abstract_text: "Background: Sepsis kills.".to_string(),
            authors: vec!["Smith, J.".to_string()],
            publication_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            doi: Some("10.1101/x".to_string()),
            version: Some("1".to_string()),
            category: Some("infectious diseases".to_string()),
            server: PreprintServer::MedRxiv,
        }
    }

    fn publisher(server: &MockServer) -> SeeChatPublisher {
        SeeChatPublisher::new(SecretString::from("sc-key"), "medRxiv", Duration::from_secs(5))
            .unwrap()
            .with_endpoints(server.uri(), "https://staging.seechat.ai")
            .unwrap()
            .with_edit_retry(RetryPolicy { max_retries: 1, base_delay: Duration::from_millis(1) })
    }

    const CREATE_STREAM: &str = r#"{"data":{"type":"status","content":"thinking"}}{"data":{"type":"metadata","content":{"hypothesis_id":"hyp-42"}}}{"data":{"type":"done"}}"#;

    #[test]
    fn test_parse_concatenated_objects() {
        assert_eq!(parse_hypothesis_id(CREATE_STREAM).as_deref(), Some("hyp-42"));
    }

    #[test]
    fn test_parse_sse_lines_and_numeric_ids() {
        let body = "data: {\"data\":{\"type\":\"status\"}}\n\ndata: {\"data\":{\"type\":\"metadata\",\"content\":{\"hypothesis_id\":7}}}\n";
        assert_eq!(parse_hypothesis_id(body).as_deref(), Some("7"));
        assert_eq!(parse_hypothesis_id("not json"), None);
        assert_eq!(parse_hypothesis_id(r#"{"data":{"type":"status"}}"#), None);
    }

    #[tokio::test]
    async fn test_publish_creates_then_edits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idea/create_hypothesis"))
            .and(header("X-API-Key", "sc-key"))
            .and(body_partial_json(serde_json::json!({
                "problem": "Why do sepsis patients die?",
                "research_topics": ["infectious diseases"],
                "field_of_study_1": "Medicine",
                "data_source": "medRxiv",
                "is_private": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(CREATE_STREAM))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idea/edit_hypothesis"))
            .and(body_partial_json(serde_json::json!({
                "hypothesis_id": "hyp-42",
                "title": "Lactate in sepsis"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let p = paper();
        let st = ProblemStatement { text: "Why do sepsis patients die?".to_string() };
        let h = publisher(&server)
            .publish(PublishRequest { field_of_study: "Medicine", statement: &st, paper: &p })
            .await
            .unwrap();
        assert_eq!(h.remote_id, "hyp-42");
        assert_eq!(h.url, "https://staging.seechat.ai/idea/hyp-42");
        assert_eq!(h.field_of_study, "Medicine");
        assert_eq!(h.source_reference, "https://www.medrxiv.org/content/10.1101/xv1");
    }

    #[tokio::test]
    async fn test_create_failure_is_failed_and_skips_edit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idea/create_hypothesis"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idea/edit_hypothesis"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let p = paper();
        let st = ProblemStatement { text: "x".to_string() };
        let err = publisher(&server)
            .publish(PublishRequest { field_of_study: "Medicine", statement: &st, paper: &p })
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Failed(_)));
        assert_eq!(err.remote_id(), None);
    }

    #[tokio::test]
    async fn test_create_without_metadata_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idea/create_hypothesis"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"type":"error"}}"#))
            .mount(&server)
            .await;

        let p = paper();
        let st = ProblemStatement { text: "x".to_string() };
        let err = publisher(&server)
            .publish(PublishRequest { field_of_study: "Medicine", statement: &st, paper: &p })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no hypothesis id"));
    }

    #[tokio::test]
    async fn test_edit_failure_is_partial_with_remote_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idea/create_hypothesis"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CREATE_STREAM))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idea/edit_hypothesis"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let p = paper();
        let st = ProblemStatement { text: "x".to_string() };
        let err = publisher(&server)
            .publish(PublishRequest { field_of_study: "Medicine", statement: &st, paper: &p })
            .await
            .unwrap_err();
        assert_eq!(err.remote_id(), Some("hyp-42"));
    }
}
