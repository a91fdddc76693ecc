//! HTTP request generator for the expense and payment endpoints

use std::time::{Duration, Instant};

use common::config::TargetConfig;
use common::records::{Expense, Payment};
use reqwest::{Client, header::CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{LoadgenError, LoadgenResult};

/// Path of the expense creation endpoint
pub const EXPENSE_PATH: &str = "/api/expense";
/// Path of the payment creation endpoint
pub const PAYMENT_PATH: &str = "/api/payment";
/// Correlation header the target service logs requests under
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Outcome of one POST, successful or not
#[derive(Debug, Clone)]
pub struct Submission {
    /// Response status, `None` when no response arrived
    pub status: Option<u16>,
    /// Time from sending the request to reading the full body
    pub latency: Duration,
    pub body: Option<String>,
    /// Transport, timeout or body-read failure
    pub error: Option<String>,
}

impl Submission {
    fn failed(latency: Duration, error: String) -> Self {
        Self {
            status: None,
            latency,
            body: None,
            error: Some(error),
        }
    }
}

/// Builds and sends expense and payment requests to one target
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    client: Client,
    target: TargetConfig,
}

impl RequestGenerator {
    /// Create a generator with a pooled client honoring the target timeout
    pub fn new(target: &TargetConfig) -> LoadgenResult<Self> {
        let client = Client::builder()
            .timeout(target.timeout())
            .build()
            .map_err(LoadgenError::Client)?;

        Ok(Self {
            client,
            target: target.clone(),
        })
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// POST an expense to `<base>/api/expense`
    pub async fn submit_expense(&self, expense: &Expense) -> Submission {
        self.post_json(EXPENSE_PATH, expense).await
    }

    /// POST a payment to `<base>/api/payment`
    pub async fn submit_payment(&self, payment: &Payment) -> Submission {
        self.post_json(PAYMENT_PATH, payment).await
    }

    /// GET a path on the target and return its status, if any response came back
    pub async fn probe(&self, path: &str) -> Option<u16> {
        match self.client.get(self.target.url(path)).send().await {
            Ok(response) => Some(response.status().as_u16()),
            Err(e) => {
                debug!("Probe of {} failed: {}", path, e);
                None
            }
        }
    }

    async fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> Submission {
        let started = Instant::now();

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => return Submission::failed(started.elapsed(), e.to_string()),
        };

        let response = self
            .client
            .post(self.target.url(path))
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Submission::failed(started.elapsed(), e.to_string()),
        };

        let status = response.status().as_u16();
        let (body, error) = match response.text().await {
            Ok(text) => (Some(text), None),
            Err(e) => (None, Some(e.to_string())),
        };

        Submission {
            status: Some(status),
            latency: started.elapsed(),
            body,
            error,
        }
    }
}
