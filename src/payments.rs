use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use crate::error::ApiError;

/// Currency every payment intent is created in.
pub const PAYMENT_CURRENCY: &str = "usd";

/// PaymentProvider Contract
///
/// The one operation this service needs from the payment provider. Swapping
/// `StripeClient` for `MockPaymentProvider` keeps handler tests offline.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a payment intent for `amount` minor units of `currency` and
    /// returns the client secret the browser uses to confirm the payment.
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<String, String>;
}

/// to_minor_units
///
/// Converts a price in whole currency units to the smallest unit, rounding to
/// the nearest cent so that 19.99 becomes 1999 rather than 1998.
pub fn to_minor_units(price: f64) -> Result<i64, ApiError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ApiError::BadRequest(
            "price must be a positive amount".to_string(),
        ));
    }
    let amount = (price * 100.0).round();
    if amount < 1.0 {
        return Err(ApiError::BadRequest(
            "price must be at least one cent".to_string(),
        ));
    }
    if amount > i64::MAX as f64 {
        return Err(ApiError::BadRequest("price is too large".to_string()));
    }
    Ok(amount as i64)
}

// --- Stripe ---

#[derive(Deserialize)]
struct PaymentIntentBody {
    client_secret: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

/// StripeClient
///
/// Calls the Stripe REST API (`POST /v1/payment_intents`) with the secret key
/// as bearer credentials. No retries: a failed call surfaces immediately.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: &str, secret_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<String, String> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let form = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("payment_method_types[]", "card".to_string()),
        ];

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(format!("provider returned {status}: {detail}"));
        }

        let intent = response
            .json::<PaymentIntentBody>()
            .await
            .map_err(|e| e.to_string())?;

        tracing::info!(amount, currency, "payment intent created");
        Ok(intent.client_secret)
    }
}

// --- Mock ---

/// MockPaymentProvider
///
/// Records every requested amount and hands back a deterministic client secret.
#[derive(Default)]
pub struct MockPaymentProvider {
    /// When true, every call returns a simulated provider failure.
    pub should_fail: bool,
    requests: Mutex<Vec<(i64, String)>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Amounts and currencies received so far, in call order.
    pub fn requests(&self) -> Vec<(i64, String)> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Payment Error: Simulation requested".to_string());
        }

        match self.requests.lock() {
            Ok(mut requests) => requests.push((amount, currency.to_string())),
            Err(poisoned) => poisoned.into_inner().push((amount, currency.to_string())),
        }

        Ok(format!("pi_mock_{amount}_secret_mock"))
    }
}

/// PaymentState
///
/// Shared handle to the payment provider used by the application state.
pub type PaymentState = Arc<dyn PaymentProvider>;
