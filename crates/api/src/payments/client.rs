//! Hosted checkout client for a Stripe-compatible payment API.

use std::time::Duration;

use cartwright_core::{CurrencyCode, Money, OrderId, OrderNumber, PaymentId};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::PaymentGatewayError;
use crate::config::PaymentConfig;

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub payment_id: PaymentId,
    pub attempt: i32,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A session created by the provider.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub checkout_url: Option<String>,
    /// Full provider response, stored as the gateway payload.
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Payment provider client.
#[derive(Clone)]
pub struct PaymentClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
    timeout: Duration,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PaymentClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            timeout: config.timeout,
        }
    }

    /// Create a hosted checkout session for one payment.
    ///
    /// The call is bounded by the configured timeout; an elapsed timeout is
    /// reported as [`PaymentGatewayError::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns error if the amount is not representable, the request fails,
    /// times out, or the provider rejects it.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, payment_id = %request.payment_id))]
    pub async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> Result<HostedSession, PaymentGatewayError> {
        let params = session_params(request)?;

        let exchange = async {
            let response = self
                .client
                .post(format!("{}/checkout/sessions", self.api_base))
                .bearer_auth(self.secret_key.expose_secret())
                .form(&params)
                .send()
                .await
                .map_err(|e| PaymentGatewayError::Request(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| PaymentGatewayError::InvalidResponse(e.to_string()))?;
            Ok::<_, PaymentGatewayError>((status, body))
        };

        // The deadline covers the body as well as the headers.
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| PaymentGatewayError::Timeout)??;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            error!(status = status.as_u16(), message = %message, "Payment provider rejected session");
            return Err(PaymentGatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| PaymentGatewayError::InvalidResponse(e.to_string()))?;
        let parsed: SessionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| PaymentGatewayError::InvalidResponse(e.to_string()))?;

        debug!(session_id = %parsed.id, "Checkout session created");

        Ok(HostedSession {
            session_id: parsed.id,
            payment_intent_id: parsed.payment_intent,
            client_secret: parsed.client_secret,
            checkout_url: parsed.url,
            raw,
        })
    }
}

/// Form parameters for a checkout session, in the provider's bracket syntax.
fn session_params(request: &SessionRequest) -> Result<Vec<(String, String)>, PaymentGatewayError> {
    let unit_amount = request.amount.to_minor_units()?;
    let order_id = request.order_id.to_string();
    let order_number = request.order_number.to_string();
    let payment_id = request.payment_id.to_string();
    let attempt = request.attempt.to_string();

    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        ("client_reference_id".to_owned(), order_number.clone()),
        ("line_items[0][quantity]".to_owned(), "1".to_owned()),
        (
            "line_items[0][price_data][currency]".to_owned(),
            request.currency.provider_code().to_owned(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_owned(),
            unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_owned(),
            format!("Order {order_number}"),
        ),
        ("metadata[order_id]".to_owned(), order_id.clone()),
        ("metadata[order_number]".to_owned(), order_number.clone()),
        ("metadata[payment_id]".to_owned(), payment_id.clone()),
        ("metadata[attempt]".to_owned(), attempt.clone()),
        ("payment_intent_data[metadata][order_id]".to_owned(), order_id),
        ("payment_intent_data[metadata][order_number]".to_owned(), order_number),
        ("payment_intent_data[metadata][payment_id]".to_owned(), payment_id),
        ("payment_intent_data[metadata][attempt]".to_owned(), attempt),
    ];

    if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_owned(), email.clone()));
    }

    Ok(params)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;

    fn request(amount: &str) -> SessionRequest {
        SessionRequest {
            order_id: OrderId::new(7),
            order_number: OrderNumber::from_uuid(Uuid::nil()),
            payment_id: PaymentId::new(3),
            attempt: 2,
            amount: Money::new(amount.parse::<Decimal>().unwrap()),
            currency: CurrencyCode::USD,
            customer_email: Some("buyer@example.com".to_owned()),
            success_url: "http://localhost:3000/orders/7".to_owned(),
            cancel_url: "http://localhost:3000/cart".to_owned(),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_params_carry_correlation_metadata() {
        let params = session_params(&request("2800.00")).unwrap();
        assert_eq!(param(&params, "metadata[order_id]"), Some("7"));
        assert_eq!(param(&params, "metadata[payment_id]"), Some("3"));
        assert_eq!(
            param(&params, "payment_intent_data[metadata][payment_id]"),
            Some("3")
        );
        assert_eq!(param(&params, "metadata[attempt]"), Some("2"));
        assert_eq!(
            param(&params, "payment_intent_data[metadata][attempt]"),
            Some("2")
        );
        assert_eq!(
            param(&params, "metadata[order_number]"),
            Some("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(param(&params, "customer_email"), Some("buyer@example.com"));
    }

    #[test]
    fn test_session_params_use_minor_units() {
        let params = session_params(&request("19.99")).unwrap();
        assert_eq!(
            param(&params, "line_items[0][price_data][unit_amount]"),
            Some("1999")
        );
        assert_eq!(
            param(&params, "line_items[0][price_data][currency]"),
            Some("usd")
        );
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0_u8; 8192];
            let _ = socket.read(&mut buf).await;
            // Headers promise a body that never finishes.
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"id\"",
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = PaymentConfig {
            secret_key: SecretString::from("sk_test_abc123".to_string()),
            webhook_secret: SecretString::from("whsec_abc123".to_string()),
            api_base: format!("http://{addr}/v1"),
            currency: CurrencyCode::USD,
            timeout: Duration::from_millis(300),
            webhook_tolerance_secs: 300,
        };
        let result = PaymentClient::new(&config)
            .create_checkout_session(&request("10.00"))
            .await;
        assert!(matches!(result, Err(PaymentGatewayError::Timeout)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = PaymentConfig {
            secret_key: SecretString::from("sk_test_abc123".to_string()),
            webhook_secret: SecretString::from("whsec_abc123".to_string()),
            api_base: "http://127.0.0.1:9/v1/".to_owned(),
            currency: CurrencyCode::USD,
            timeout: Duration::from_secs(1),
            webhook_tolerance_secs: 300,
        };
        let client = PaymentClient::new(&config);
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk_test_abc123"));
        assert!(debug.contains("http://127.0.0.1:9/v1\""));
    }
}
