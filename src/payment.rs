use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("request to payment provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider rejected the request with status {0}")]
    Rejected(u16),

    #[error("simulated payment failure")]
    Simulated,
}

// 1. PaymentGateway Contract
/// PaymentGateway
///
/// Abstracts the external payment provider so handlers can be exercised against
/// `MockPaymentGateway` in tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount` minor units of `currency` and returns
    /// the client secret the front-end confirms the payment with.
    async fn create_payment_intent(&self, amount: i64, currency: &str)
    -> Result<String, PaymentError>;
}

// 2. The Real Implementation (Stripe)
/// StripeGateway
///
/// Talks to the Stripe REST API with a form-encoded `POST /v1/payment_intents`.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct StripePaymentIntent {
    client_secret: String,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("payment_method_types[]", "card"),
        ];

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Rejected(response.status().as_u16()));
        }

        let intent = response.json::<StripePaymentIntent>().await?;
        Ok(intent.client_secret)
    }
}

// 3. The Mock Implementation (For Tests)
/// MockPaymentGateway
///
/// Returns a deterministic client secret derived from the request, or a simulated
/// failure when `should_fail` is set.
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    pub should_fail: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentError> {
        if self.should_fail {
            return Err(PaymentError::Simulated);
        }
        Ok(format!("pi_mock_{amount}_{currency}_secret"))
    }
}

/// PaymentState
///
/// The concrete type used to share the payment gateway across the application state.
pub type PaymentState = Arc<dyn PaymentGateway>;
