use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use summer_camp_api::{
    ApiError, MockPaymentProvider, StripeClient,
    payments::{PAYMENT_CURRENCY, PaymentProvider, to_minor_units},
};
use tokio::net::TcpListener;

// --- Fake provider server ---

#[derive(Debug, Clone)]
struct CapturedCall {
    authorization: Option<String>,
    form: HashMap<String, String>,
}

type Captured = Arc<Mutex<Vec<CapturedCall>>>;

/// Serves `/v1/payment_intents` on an ephemeral port and records each call.
async fn spawn_fake_provider(status: StatusCode) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let app = Router::new().route(
        "/v1/payment_intents",
        post(
            move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                let sink = sink.clone();
                async move {
                    let authorization = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let amount = form.get("amount").cloned().unwrap_or_default();
                    sink.lock().unwrap().push(CapturedCall {
                        authorization,
                        form,
                    });

                    if status.is_success() {
                        (
                            status,
                            Json(json!({
                                "id": "pi_test",
                                "client_secret": format!("pi_test_{amount}_secret_abc")
                            })),
                        )
                    } else {
                        (
                            status,
                            Json(json!({ "error": { "message": "Invalid API Key provided" } })),
                        )
                    }
                }
            },
        ),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, captured)
}

// --- Amount conversion ---

#[test]
fn test_to_minor_units_rounds_to_nearest_cent() {
    assert_eq!(to_minor_units(19.99).unwrap(), 1999);
    assert_eq!(to_minor_units(0.29).unwrap(), 29);
    assert_eq!(to_minor_units(100.0).unwrap(), 10000);
}

#[test]
fn test_to_minor_units_rejects_invalid_prices() {
    for price in [0.0, -1.0, 0.004, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(
            matches!(to_minor_units(price), Err(ApiError::BadRequest(_))),
            "price {price} should be rejected"
        );
    }
    assert!(matches!(to_minor_units(1e300), Err(ApiError::BadRequest(_))));
}

#[test]
fn test_to_minor_units_smallest_charge_is_one_cent() {
    assert_eq!(to_minor_units(0.01).unwrap(), 1);
    assert_eq!(to_minor_units(0.006).unwrap(), 1);
}

// --- Mock provider ---

#[tokio::test]
async fn test_mock_records_requests() {
    let mock = MockPaymentProvider::new();

    let secret = mock.create_payment_intent(1999, PAYMENT_CURRENCY).await.unwrap();
    mock.create_payment_intent(500, PAYMENT_CURRENCY).await.unwrap();

    assert_eq!(secret, "pi_mock_1999_secret_mock");
    assert_eq!(
        mock.requests(),
        vec![(1999, "usd".to_string()), (500, "usd".to_string())]
    );
}

#[tokio::test]
async fn test_mock_failure() {
    let mock = MockPaymentProvider::new_failing();
    let result = mock.create_payment_intent(1999, PAYMENT_CURRENCY).await;

    assert!(result.is_err());
    assert!(mock.requests().is_empty());
}

// --- Stripe client against a local fake ---

#[tokio::test]
async fn test_stripe_client_posts_form_with_bearer_key() {
    let (address, captured) = spawn_fake_provider(StatusCode::OK).await;
    let client = StripeClient::new(&format!("{address}/"), "sk_test_123");

    let secret = client
        .create_payment_intent(1999, PAYMENT_CURRENCY)
        .await
        .unwrap();

    assert_eq!(secret, "pi_test_1999_secret_abc");

    let calls = captured.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer sk_test_123"));
    assert_eq!(calls[0].form.get("amount").map(String::as_str), Some("1999"));
    assert_eq!(calls[0].form.get("currency").map(String::as_str), Some("usd"));
    assert_eq!(
        calls[0].form.get("payment_method_types[]").map(String::as_str),
        Some("card")
    );
}

#[tokio::test]
async fn test_stripe_client_surfaces_provider_error() {
    let (address, _captured) = spawn_fake_provider(StatusCode::UNAUTHORIZED).await;
    let client = StripeClient::new(&address, "sk_test_wrong");

    let err = client
        .create_payment_intent(1999, PAYMENT_CURRENCY)
        .await
        .unwrap_err();

    assert!(err.contains("401"), "unexpected error: {err}");
    assert!(err.contains("Invalid API Key provided"));
}

#[tokio::test]
async fn test_stripe_client_unreachable_provider() {
    // Nothing listens on port 9 locally.
    let client = StripeClient::new("http://127.0.0.1:9", "sk_test_123");
    let result = client.create_payment_intent(1999, PAYMENT_CURRENCY).await;
    assert!(result.is_err());
}
