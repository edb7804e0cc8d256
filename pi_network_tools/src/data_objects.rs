use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// A customer paying the app (a checkout).
    UserToApp,
    /// The app paying a user (a payout).
    AppToUser,
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDirection::UserToApp => "user_to_app",
            PaymentDirection::AppToUser => "app_to_user",
        }
    }
}

/// The network reports payment progress as a set of flags rather than a single status field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PaymentStatusFlags {
    pub developer_approved: bool,
    pub transaction_verified: bool,
    pub developer_completed: bool,
    pub cancelled: bool,
    pub user_cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub txid: String,
    pub verified: bool,
    #[serde(rename = "_link", default)]
    pub link: Option<String>,
}

/// A payment as reported by the platform API. `amount` is in whole π on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiPayment {
    pub identifier: String,
    pub user_uid: String,
    pub amount: f64,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    pub direction: PaymentDirection,
    pub status: PaymentStatusFlags,
    #[serde(default)]
    pub transaction: Option<TransactionInfo>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PiPayment {
    pub fn is_terminal(&self) -> bool {
        self.status.developer_completed || self.status.cancelled || self.status.user_cancelled
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncompletePayments {
    pub incomplete_server_payments: Vec<PiPayment>,
}

/// Arguments for creating an application-to-user payment.
#[derive(Debug, Clone, Serialize)]
pub struct A2uPaymentArgs {
    pub amount: f64,
    pub memo: String,
    pub metadata: Value,
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiUser {
    pub uid: String,
    pub username: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
}
