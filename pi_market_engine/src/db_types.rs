use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use pmg_common::MicroPi;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
pub use sqlx::types::Json;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------      PaymentId      ---------------------------------------------------------
/// The identifier assigned to a payment by the external network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct PaymentId(pub String);

impl<S: Into<String>> From<S> for PaymentId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh order id. Order ids are assigned by the gateway, not the network.
    pub fn random() -> Self {
        Self(format!("ord-{:016x}", rand::random::<u64>()))
    }
}

//--------------------------------------  PiPaymentStatus    ---------------------------------------------------------
/// Lifecycle of a payment record. Transitions are monotonic: `Approved` is the only non-terminal
/// state, and a record that has reached `Completed`, `Cancelled` or `Failed` never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PiPaymentStatus {
    /// The payment was approved by the server and is awaiting the network transaction.
    Approved,
    /// The transaction was verified and the payment completed on the network.
    Completed,
    /// The payment was cancelled by the user or the network before completing.
    Cancelled,
    /// The payment failed permanently.
    Failed,
}

impl PiPaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PiPaymentStatus::Approved)
    }
}

impl Display for PiPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PiPaymentStatus::Approved => write!(f, "Approved"),
            PiPaymentStatus::Completed => write!(f, "Completed"),
            PiPaymentStatus::Cancelled => write!(f, "Cancelled"),
            PiPaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PiPaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approved" => Ok(Self::Approved),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PiPaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Approved");
            PiPaymentStatus::Approved
        })
    }
}

//--------------------------------------   PaymentMetadata   ---------------------------------------------------------
/// What the customer actually bought. Stored as tagged JSON on the payment record and validated
/// at the boundary; unknown shapes are rejected rather than carried as opaque blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMetadata {
    /// A multi-line cart checkout against a single store.
    Cart {
        store_id: i64,
        items: Vec<CartLine>,
        delivery_address: String,
        delivery_fee: MicroPi,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discount_code: Option<String>,
    },
    /// A single-product purchase.
    Single { store_id: i64, line: CartLine, delivery_address: String, delivery_fee: MicroPi },
}

impl PaymentMetadata {
    pub fn store_id(&self) -> i64 {
        match self {
            PaymentMetadata::Cart { store_id, .. } | PaymentMetadata::Single { store_id, .. } => *store_id,
        }
    }

    pub fn lines(&self) -> Vec<CartLine> {
        match self {
            PaymentMetadata::Cart { items, .. } => items.clone(),
            PaymentMetadata::Single { line, .. } => vec![line.clone()],
        }
    }

    pub fn delivery_address(&self) -> &str {
        match self {
            PaymentMetadata::Cart { delivery_address, .. } | PaymentMetadata::Single { delivery_address, .. } => {
                delivery_address
            },
        }
    }

    pub fn delivery_fee(&self) -> MicroPi {
        match self {
            PaymentMetadata::Cart { delivery_fee, .. } | PaymentMetadata::Single { delivery_fee, .. } => *delivery_fee,
        }
    }

    pub fn discount_code(&self) -> Option<&str> {
        match self {
            PaymentMetadata::Cart { discount_code, .. } => discount_code.as_deref(),
            PaymentMetadata::Single { .. } => None,
        }
    }
}

/// One purchased line. `choice` selects a product variant with its own stock; `None` means the
/// product's top-level stock applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    pub quantity: i64,
    pub unit_price: MicroPi,
}

//--------------------------------------    PaymentRecord    ---------------------------------------------------------
/// The gateway's ledger row for one external payment. Created on approval, never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRecord {
    pub id: i64,
    pub payment_id: PaymentId,
    pub user_id: i64,
    pub amount: MicroPi,
    pub metadata: Json<PaymentMetadata>,
    pub status: PiPaymentStatus,
    pub txid: Option<String>,
    pub failure_reason: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    /// The payment identifier assigned by the network.
    pub payment_id: PaymentId,
    /// The paying user (gateway user id).
    pub user_id: i64,
    pub amount: MicroPi,
    pub metadata: PaymentMetadata,
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Created by the completion processor; awaiting store confirmation.
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }

    /// The forward transition sequence; `Cancelled` is handled separately since it is reachable
    /// from any non-terminal state.
    pub fn next_in_sequence(&self) -> Option<OrderStatusType> {
        use OrderStatusType::*;
        match self {
            Pending => Some(Confirmed),
            Confirmed => Some(Preparing),
            Preparing => Some(OutForDelivery),
            OutForDelivery => Some(Delivered),
            Delivered | Cancelled => None,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Confirmed => write!(f, "Confirmed"),
            OrderStatusType::Preparing => write!(f, "Preparing"),
            OrderStatusType::OutForDelivery => write!(f, "OutForDelivery"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Preparing" => Ok(Self::Preparing),
            "OutForDelivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------       Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub payment_id: Option<PaymentId>,
    pub store_id: i64,
    pub customer_id: i64,
    /// Snapshot of the purchased lines at completion time. Later product edits do not affect it.
    pub items: Json<Vec<OrderItem>>,
    pub total_amount: MicroPi,
    pub discount_amount: MicroPi,
    pub delivery_fee: MicroPi,
    pub delivery_address: String,
    pub status: OrderStatusType,
    pub driver_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    pub quantity: i64,
    pub unit_price: MicroPi,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub payment_id: Option<PaymentId>,
    pub store_id: i64,
    pub customer_id: i64,
    pub items: Vec<OrderItem>,
    pub total_amount: MicroPi,
    pub discount_amount: MicroPi,
    pub delivery_fee: MicroPi,
    pub delivery_address: String,
}

//--------------------------------------      Payouts        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Recorded but not yet settled, e.g. while the store owner has no linked wallet.
    Pending,
    Completed,
    Failed,
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "Pending"),
            PayoutStatus::Completed => write!(f, "Completed"),
            PayoutStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl From<String> for PayoutStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => Self::Pending,
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            _ => {
                error!("Invalid payout status: {value}. Defaulting to Pending");
                Self::Pending
            },
        }
    }
}

/// One attempted transfer to a store owner. Attempt rows are insert-only; a retry creates a new
/// row rather than mutating a terminal one.
#[derive(Debug, Clone, FromRow)]
pub struct Payout {
    pub id: i64,
    pub order_id: OrderId,
    pub store_id: i64,
    pub amount: MicroPi,
    pub status: PayoutStatus,
    pub txid: Option<String>,
    pub failure_reason: Option<String>,
    pub attempt: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayout {
    pub order_id: OrderId,
    pub store_id: i64,
    pub amount: MicroPi,
    pub status: PayoutStatus,
    pub txid: Option<String>,
    pub failure_reason: Option<String>,
    pub attempt: i64,
}

/// A durable queue row for a payout execution. Retry count and last error are first-class columns
/// so stuck payouts are visible by query rather than buried in logs.
#[derive(Debug, Clone, FromRow)]
pub struct PayoutTask {
    pub id: i64,
    pub order_id: OrderId,
    pub store_id: i64,
    pub amount: MicroPi,
    pub run_at: DateTime<Utc>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Store         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Store {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    /// Ledger address funds are paid out to. Kept in sync with the owner's linked account.
    pub wallet_address: Option<String>,
    /// The owner's user id on the external network; the destination for A2U payments.
    pub pi_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// A store can receive payouts only once its owner has linked a network account.
    pub fn has_payout_destination(&self) -> bool {
        self.pi_user_id.as_deref().map(|s| !s.is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewStore {
    pub owner_id: i64,
    pub name: String,
}

//--------------------------------------      Products       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub price: MicroPi,
    /// Stock for products without choices. Choice-level stock lives on the choices.
    pub stock: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProductChoice {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub stock: i64,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub store_id: i64,
    pub name: String,
    pub price: MicroPi,
    pub stock: i64,
    /// (choice name, choice stock) pairs; empty for plain products.
    pub choices: Vec<(String, i64)>,
}

//--------------------------------------     Discounts       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct DiscountCode {
    pub id: i64,
    pub store_id: i64,
    pub code: String,
    /// Percentage off, 0-100.
    pub percent: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: i64,
    pub uses: i64,
}

impl DiscountCode {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        let not_expired = self.expires_at.map(|t| t > now).unwrap_or(true);
        not_expired && self.uses < self.max_uses
    }

    pub fn discount_on(&self, amount: MicroPi) -> MicroPi {
        MicroPi::from(amount.value() * self.percent.clamp(0, 100) / 100)
    }
}

#[derive(Debug, Clone)]
pub struct NewDiscountCode {
    pub store_id: i64,
    pub code: String,
    pub percent: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: i64,
}

//--------------------------------------   Notifications     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Chat         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Conversation {
    pub id: i64,
    pub order_id: OrderId,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Roles & Users    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Customer,
    StoreOwner,
    Driver,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "Customer"),
            Role::StoreOwner => write!(f, "StoreOwner"),
            Role::Driver => write!(f, "Driver"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Customer" => Ok(Self::Customer),
            "StoreOwner" => Ok(Self::StoreOwner),
            "Driver" => Ok(Self::Driver),
            "Admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// A user's role set, stored as a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles(Vec<Role>);

impl Roles {
    pub fn new(roles: Vec<Role>) -> Self {
        Self(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn with(mut self, role: Role) -> Self {
        if !self.0.contains(&role) {
            self.0.push(role);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl Display for Roles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.iter().map(Role::to_string).collect::<Vec<_>>().join(",");
        write!(f, "{s}")
    }
}

impl TryFrom<String> for Roles {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let roles = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Role::from_str)
            .collect::<Result<Vec<Role>, _>>()?;
        Ok(Self(roles))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub pi_uid: String,
    pub username: String,
    pub wallet_address: Option<String>,
    #[sqlx(try_from = "String")]
    pub roles: Roles,
    pub nonce: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_status_round_trip() {
        for s in [
            PiPaymentStatus::Approved,
            PiPaymentStatus::Completed,
            PiPaymentStatus::Cancelled,
            PiPaymentStatus::Failed,
        ] {
            assert_eq!(s.to_string().parse::<PiPaymentStatus>().unwrap(), s);
        }
        assert!(PiPaymentStatus::Completed.is_terminal());
        assert!(!PiPaymentStatus::Approved.is_terminal());
    }

    #[test]
    fn order_status_sequence() {
        use OrderStatusType::*;
        assert_eq!(Pending.next_in_sequence(), Some(Confirmed));
        assert_eq!(OutForDelivery.next_in_sequence(), Some(Delivered));
        assert_eq!(Delivered.next_in_sequence(), None);
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn metadata_tagging() {
        let json = r#"{
            "type": "cart",
            "store_id": 7,
            "items": [{"product_id": 1, "choice": "large", "quantity": 2, "unit_price": 1500000}],
            "delivery_address": "12 Main Rd",
            "delivery_fee": 2000000,
            "discount_code": "WELCOME10"
        }"#;
        let meta: PaymentMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.store_id(), 7);
        assert_eq!(meta.discount_code(), Some("WELCOME10"));
        assert_eq!(meta.lines().len(), 1);
        let bad = r#"{"type": "mystery", "store_id": 7}"#;
        assert!(serde_json::from_str::<PaymentMetadata>(bad).is_err());
    }

    #[test]
    fn roles_round_trip() {
        let roles = Roles::default().with(Role::Customer).with(Role::StoreOwner);
        let s = roles.to_string();
        assert_eq!(Roles::try_from(s).unwrap(), roles);
        assert!(Roles::try_from("Customer,Pirate".to_string()).is_err());
        assert_eq!(Roles::try_from(String::new()).unwrap(), Roles::default());
    }

    #[test]
    fn discount_maths() {
        let code = DiscountCode {
            id: 1,
            store_id: 1,
            code: "TEN".into(),
            percent: 10,
            expires_at: None,
            max_uses: 5,
            uses: 0,
        };
        assert_eq!(code.discount_on(MicroPi::from_pi(10)), MicroPi::from_pi(1));
        assert!(code.is_usable(Utc::now()));
        let spent = DiscountCode { uses: 5, ..code };
        assert!(!spent.is_usable(Utc::now()));
    }
}
