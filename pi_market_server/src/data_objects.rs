use std::fmt::Display;

use pi_market_engine::db_types::{OrderStatusType, PaymentMetadata};
use pmg_common::MicroPi;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of a webhook delivery from the payment network. `payment_id` is required; its absence
/// is a 400, handled in the route rather than by serde so the response code is explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthParams {
    /// The network access token obtained by the client app.
    pub access_token: String,
    /// Strictly-increasing replay counter; a unix timestamp works fine.
    pub nonce: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovePaymentParams {
    pub payment_id: String,
    /// Amount in µπ.
    pub amount: MicroPi,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletePaymentParams {
    pub txid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPaymentParams {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusParams {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignDriverParams {
    pub driver_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageParams {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelinkParams {
    pub wallet_address: String,
    pub pi_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStoreParams {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceParams {
    pub name: String,
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductParams {
    pub store_id: i64,
    pub name: String,
    pub price: MicroPi,
    pub stock: i64,
    #[serde(default)]
    pub choices: Vec<ChoiceParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiscountParams {
    pub store_id: i64,
    pub code: String,
    pub percent: i64,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub max_uses: i64,
}
