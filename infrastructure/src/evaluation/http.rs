//! HTTP adapter for the evaluation service port
//!
//! Talks JSON to the remote evaluation service over two endpoints:
//! `POST /v1/expand` turns an idea into a proposal, `POST /v1/review`
//! asks one evaluator for a structured review. Retry policy is not
//! implemented here; a failed call fails the pipeline step and the
//! broker's redelivery takes over.

use async_trait::async_trait;
use conclave_application::{EvaluationError, EvaluationService};
use conclave_domain::{Evaluator, EvaluatorReview};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ExpandRequest<'a> {
    idea: &'a str,
}

#[derive(Deserialize)]
struct ExpandResponse {
    proposal: String,
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    evaluator: &'a str,
    proposal: &'a str,
}

/// Evaluation service reachable over HTTP
pub struct HttpEvaluationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEvaluationService {
    /// Build a service client for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EvaluationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EvaluationError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<serde_json::Value, EvaluationError> {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EvaluationError::RequestFailed(format!(
                "{} returned {}: {}",
                url, status, detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EvaluationError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl EvaluationService for HttpEvaluationService {
    async fn expand(&self, idea: &str) -> Result<String, EvaluationError> {
        let value = self.post_json("expand", &ExpandRequest { idea }).await?;
        let response: ExpandResponse = serde_json::from_value(value)
            .map_err(|e| EvaluationError::MalformedResponse(e.to_string()))?;
        if response.proposal.trim().is_empty() {
            return Err(EvaluationError::MalformedResponse(
                "expand returned an empty proposal".to_string(),
            ));
        }
        Ok(response.proposal)
    }

    async fn submit(
        &self,
        proposal: &str,
        evaluator: Evaluator,
    ) -> Result<EvaluatorReview, EvaluationError> {
        let value = self
            .post_json(
                "review",
                &ReviewRequest {
                    evaluator: evaluator.as_str(),
                    proposal,
                },
            )
            .await?;
        parse_review(evaluator, value)
    }
}

fn map_transport_error(e: reqwest::Error) -> EvaluationError {
    if e.is_timeout() {
        EvaluationError::Timeout
    } else if e.is_connect() {
        EvaluationError::Unavailable(e.to_string())
    } else {
        EvaluationError::RequestFailed(e.to_string())
    }
}

/// Validate a review document returned by the service
///
/// The response must deserialize, name the evaluator that was asked, and
/// carry an in-range confidence. Anything else is a malformed response,
/// never a silently patched one.
fn parse_review(
    evaluator: Evaluator,
    value: serde_json::Value,
) -> Result<EvaluatorReview, EvaluationError> {
    let review: EvaluatorReview = serde_json::from_value(value)
        .map_err(|e| EvaluationError::MalformedResponse(e.to_string()))?;

    if review.evaluator != evaluator {
        return Err(EvaluationError::MalformedResponse(format!(
            "asked {} but response is from {}",
            evaluator, review.evaluator
        )));
    }
    if !(0.0..=1.0).contains(&review.confidence) {
        return Err(EvaluationError::MalformedResponse(format!(
            "confidence {} out of range",
            review.confidence
        )));
    }
    Ok(review)
}
