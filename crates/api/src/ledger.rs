//! HTTP client for the external posting service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use vaultline_core::workflow::{LedgerError, LedgerGateway, PostingInstruction, PostingReceipt};
use vaultline_shared::config::LedgerConfig;

/// Posts approved withdrawals and transfers to the ledger over HTTP.
#[derive(Clone)]
pub struct HttpLedgerGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLedgerGateway {
    /// Creates a gateway targeting `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Creates a gateway from the `[ledger]` configuration section.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn postings_url(&self) -> String {
        format!("{}/postings", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn post(&self, instruction: &PostingInstruction) -> Result<PostingReceipt, LedgerError> {
        let response = self
            .client
            .post(self.postings_url())
            .header("Idempotency-Key", instruction.instance_id.to_string())
            .json(instruction)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("posting request failed: {e}")))?;

        if response.status().is_success() {
            return response
                .json::<PostingReceipt>()
                .await
                .map_err(|e| LedgerError::Unavailable(format!("invalid posting receipt: {e}")));
        }

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("failed reading ledger error body: {e}")))?;
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        tracing::warn!(
            instance_id = %instruction.instance_id,
            status = %status,
            message = %message,
            "Ledger refused posting"
        );

        match status {
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(LedgerError::Rejected(message))
            }
            _ => Err(LedgerError::Unavailable(format!(
                "ledger returned {status}: {message}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::post;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use vaultline_shared::types::{Currency, Money, WorkflowInstanceId};

    async fn spawn_status_server(status: StatusCode, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/postings",
            post(move || {
                let body = body.clone();
                async move { (status, axum::Json(body)) }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}")
    }

    fn instruction() -> PostingInstruction {
        PostingInstruction {
            instance_id: WorkflowInstanceId::new(),
            kind: "withdrawal".into(),
            debit_account: "ACC-1".into(),
            credit_account: None,
            amount: Money::new(dec!(25000), Currency::Usd),
            reference: Some("branch-12".into()),
        }
    }

    #[tokio::test]
    async fn test_post_returns_receipt() {
        let posted_at = Utc::now();
        let base_url = spawn_status_server(
            StatusCode::CREATED,
            json!({ "posting_id": "P-1", "posted_at": posted_at }),
        )
        .await;
        let gateway = HttpLedgerGateway::new(base_url, Duration::from_secs(5));

        let receipt = gateway.post(&instruction()).await.unwrap();
        assert_eq!(receipt.posting_id, "P-1");
    }

    #[tokio::test]
    async fn test_unprocessable_maps_to_rejected() {
        let base_url = spawn_status_server(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "message": "insufficient funds" }),
        )
        .await;
        let gateway = HttpLedgerGateway::new(format!("{base_url}/"), Duration::from_secs(5));

        let result = gateway.post(&instruction()).await;
        assert!(matches!(result, Err(LedgerError::Rejected(m)) if m == "insufficient funds"));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let base_url =
            spawn_status_server(StatusCode::SERVICE_UNAVAILABLE, json!({ "message": "down" }))
                .await;
        let gateway = HttpLedgerGateway::new(base_url, Duration::from_secs(5));

        assert!(matches!(
            gateway.post(&instruction()).await,
            Err(LedgerError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_ledger_is_unavailable() {
        let gateway = HttpLedgerGateway::new("http://127.0.0.1:9", Duration::from_millis(500));
        assert!(matches!(
            gateway.post(&instruction()).await,
            Err(LedgerError::Unavailable(_))
        ));
    }
}
