//! Client-side plumbing for the Pi payment network.
//!
//! Two surfaces live here:
//! * [`PiNetworkApi`] — the platform REST API (payment lifecycle, incomplete-payment listing,
//!   application-to-user payments, bearer-token user lookup).
//! * [`LedgerClient`] — builds, signs and submits transfer transactions against the network's
//!   ledger using a server-held ed25519 seed.

mod api;
mod config;
mod error;
mod ledger;

mod data_objects;

pub mod helpers;

pub use api::PiNetworkApi;
pub use config::PiNetworkConfig;
pub use data_objects::{
    A2uPaymentArgs,
    IncompletePayments,
    PaymentDirection,
    PaymentStatusFlags,
    PiPayment,
    PiUser,
    TransactionInfo,
};
pub use error::{LedgerError, PiApiError};
pub use ledger::LedgerClient;
