//! Live wallet backend over the REST wallet API.

use super::{RemoteError, WalletService};
use crate::api::wallet::{DebitRequest, PurchaseRequest};
use crate::domain::{BonusInfo, Decimal, PaymentMethod, Purchase, UserId, Wallet};
use crate::error::WalletError;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for a live wallet backend.
///
/// GETs are retried with exponential backoff on retriable failures for up to
/// `retry_window`; a zero window makes every call one-shot. Purchases and
/// debits are never retried.
#[derive(Debug, Clone)]
pub struct RemoteWalletService {
    client: Client,
    base_url: String,
    retry_window: Duration,
}

impl RemoteWalletService {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry_window: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_window,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, WalletError> {
        let url = self.url(path);
        debug!(url = %url, "wallet api GET");

        if self.retry_window.is_zero() {
            return self.send(self.client.get(&url)).await;
        }

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_window),
            ..Default::default()
        };
        retry(backoff, || async {
            self.send(self.client.get(&url)).await.map_err(|e| match &e {
                WalletError::Remote(remote) if remote.is_retriable() => {
                    backoff::Error::transient(e)
                }
                _ => backoff::Error::permanent(e),
            })
        })
        .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, WalletError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "wallet api POST");
        self.send(self.client.post(&url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, WalletError> {
        let result = async {
            let response = request.send().await.map_err(transport_error)?;
            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| WalletError::Remote(RemoteError::Parse(e.to_string())));
            }
            let body = response.text().await.unwrap_or_default();
            Err(decode_error(status.as_u16(), &body))
        }
        .await;

        if let Err(WalletError::Remote(e)) = &result {
            warn!(error = %e, retriable = e.is_retriable(), "wallet api call failed");
        }
        result
    }
}

fn transport_error(err: reqwest::Error) -> WalletError {
    if err.is_timeout() {
        WalletError::Remote(RemoteError::Timeout)
    } else {
        WalletError::Remote(RemoteError::Network(err.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: Option<String>,
    error: Option<String>,
    user_id: Option<UserId>,
    reason: Option<String>,
    requested: Option<Decimal>,
    available: Option<Decimal>,
}

/// Map a non-2xx response back to the domain error it encodes, or to
/// `RemoteError::Http` when it is not a wallet domain error.
fn decode_error(status: u16, body: &str) -> WalletError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    match (parsed.code.as_deref(), parsed.user_id, parsed.requested, parsed.available) {
        (Some("not_found"), Some(user_id), _, _) => return WalletError::NotFound(user_id),
        (Some("insufficient_balance"), _, Some(requested), Some(available)) => {
            return WalletError::InsufficientBalance {
                requested,
                available,
            }
        }
        (Some("invalid_amount"), _, _, _) => {
            let reason = parsed
                .reason
                .or(parsed.error)
                .unwrap_or_else(|| "rejected by wallet backend".to_string());
            return WalletError::InvalidAmount(reason);
        }
        _ => {}
    }

    let message = parsed
        .error
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    WalletError::Remote(RemoteError::Http { status, message })
}

#[async_trait]
impl WalletService for RemoteWalletService {
    async fn fetch_wallet(&self, user_id: UserId) -> Result<Wallet, WalletError> {
        self.get_json(&format!("/api/wallet/{}", user_id)).await
    }

    async fn purchase(
        &self,
        user_id: UserId,
        amount: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<Purchase, WalletError> {
        let request = PurchaseRequest {
            user_id,
            amount,
            payment_method,
        };
        self.post_json("/api/wallet/purchase", &request).await
    }

    async fn get_history(&self, user_id: UserId) -> Result<Vec<Purchase>, WalletError> {
        self.get_json(&format!("/api/wallet/{}/history", user_id))
            .await
    }

    async fn get_bonus_info(&self) -> Result<BonusInfo, WalletError> {
        self.get_json("/api/wallet/bonus-info").await
    }

    async fn initialize(&self, user_id: UserId) -> Result<Wallet, WalletError> {
        self.post_json(&format!("/api/wallet/{}/initialize", user_id), &())
            .await
    }

    async fn debit(&self, user_id: UserId, amount: Decimal) -> Result<Wallet, WalletError> {
        let request = DebitRequest { user_id, amount };
        self.post_json("/api/wallet/debit", &request).await
    }

    fn kind(&self) -> &'static str {
        "live"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_not_found() {
        let body = r#"{"code":"not_found","error":"wallet not found for user 4","userId":4}"#;
        assert!(matches!(
            decode_error(404, body),
            WalletError::NotFound(id) if id == UserId::new(4)
        ));
    }

    #[test]
    fn test_decode_insufficient_balance() {
        let body = r#"{"code":"insufficient_balance","error":"x","requested":130.01,"available":130}"#;
        match decode_error(409, body) {
            WalletError::InsufficientBalance {
                requested,
                available,
            } => {
                assert_eq!(requested, Decimal::from_str_canonical("130.01").unwrap());
                assert_eq!(available, Decimal::from(130));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_amount() {
        let body = r#"{"code":"invalid_amount","error":"invalid amount: zero","reason":"zero"}"#;
        assert!(matches!(
            decode_error(400, body),
            WalletError::InvalidAmount(reason) if reason == "zero"
        ));
    }

    #[test]
    fn test_decode_unknown_code_is_remote() {
        let body = r#"{"code":"storage_error","error":"disk full"}"#;
        match decode_error(500, body) {
            WalletError::Remote(RemoteError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_non_json_body() {
        match decode_error(502, "Bad Gateway") {
            WalletError::Remote(err) => {
                assert!(err.is_retriable());
                assert_eq!(err.to_string(), "HTTP error 502: Bad Gateway");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let svc = RemoteWalletService::new(
            "http://localhost:9000/",
            Duration::from_secs(1),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(svc.url("/api/wallet/1"), "http://localhost:9000/api/wallet/1");
        assert_eq!(svc.kind(), "live");
    }

    #[tokio::test]
    async fn test_connection_refused_is_retriable_remote_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let svc = RemoteWalletService::new(
            format!("http://{}", addr),
            Duration::from_secs(2),
            Duration::ZERO,
        )
        .unwrap();
        match svc.fetch_wallet(UserId::new(1)).await {
            Err(WalletError::Remote(err)) => assert!(err.is_retriable()),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
