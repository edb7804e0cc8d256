//! The payout executor.
//!
//! The engine records payout attempts and owns the durable task queue; this module is the part
//! that actually talks to the payment network and the ledger. One execution drives a single
//! queued task through the state machine described on [`PayoutExecutor::execute`].

use chrono::Utc;
use log::*;
use pi_market_engine::{
    db_types::{NewPayout, Payout, PayoutStatus, PayoutTask, Store},
    traits::{PayoutManagement, StoreManagement},
};
use pi_network_tools::{
    helpers::micro_to_pi_amount,
    A2uPaymentArgs,
    LedgerClient,
    LedgerError,
    PaymentDirection,
    PiApiError,
    PiNetworkApi,
};
use thiserror::Error;

use crate::{config::PayoutConfig, errors::ServerError};

/// Why a transfer run ended without a transaction id.
#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("Payment network error: {0}")]
    Network(#[from] PiApiError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("The destination still has an open payment after every creation attempt")]
    OngoingPaymentConflict,
    #[error("Neither the created payment nor the store carries a destination wallet address")]
    NoDestinationAddress,
}

/// The terminal report of one execution.
#[derive(Debug)]
pub enum PayoutOutcome {
    /// Funds were transferred and the payout recorded with its transaction id.
    Completed(Payout),
    /// The store has no payout destination yet; a pending payout was recorded and the task was
    /// pushed out by the configured retry delay. This cause never records a failure.
    AwaitingLinkage,
    /// A terminal failure was recorded with the captured error.
    Failed(Payout),
}

pub struct PayoutExecutor<B> {
    db: B,
    pi: PiNetworkApi,
    ledger: Option<LedgerClient>,
    config: PayoutConfig,
}

impl<B> PayoutExecutor<B>
where B: PayoutManagement + StoreManagement
{
    pub fn new(db: B, pi: PiNetworkApi, config: PayoutConfig) -> Self {
        let ledger = match LedgerClient::new(&pi.config().ledger_url, &pi.config().wallet_seed) {
            Ok(client) => Some(client),
            Err(LedgerError::MissingSeed) => {
                warn!("💸️ No wallet seed is configured. Payouts will be recorded as failed until one is set.");
                None
            },
            Err(e) => {
                error!("💸️ Could not initialise the ledger client: {e}");
                None
            },
        };
        Self { db, pi, ledger, config }
    }

    /// Runs one queued payout to a terminal report:
    ///
    /// 1. No payout destination on the store → record a `Pending` payout with the reason and
    ///    reschedule the task after the configured delay. Never a failure.
    /// 2. Missing server credentials (API key or wallet seed) → record a terminal `Failed`
    ///    payout; configuration problems do not self-heal on a timer.
    /// 3. Cancel any stuck in-flight app-to-user payment for the destination, since the network
    ///    refuses a second concurrent payment to the same user.
    /// 4. Create the A2U payment, cancel-then-retrying a bounded number of times on an "ongoing
    ///    payment" conflict.
    /// 5. Sign and submit the ledger transfer, then complete the payment with the resulting
    ///    transaction id.
    /// 6. Record `Completed` with the txid, or `Failed` with the captured error from whichever
    ///    step broke. Either way the task leaves the queue and the owner is notified.
    pub async fn execute(&self, task: &PayoutTask) -> Result<PayoutOutcome, ServerError> {
        debug!("💸️ Executing payout task {} for order {} ({})", task.id, task.order_id, task.amount);
        let store = match self.db.fetch_store(task.store_id).await? {
            Some(store) => store,
            None => {
                let payout = self.record(task, PayoutStatus::Failed, None, Some("store no longer exists")).await?;
                self.db.remove_payout_task(task.id).await?;
                return Ok(PayoutOutcome::Failed(payout));
            },
        };
        if !store.has_payout_destination() {
            info!("💸️ Store {} has no payout destination yet. Holding payout for order {}.", store.id, task.order_id);
            self.record(task, PayoutStatus::Pending, None, Some("awaiting payout destination linkage")).await?;
            let run_at = Utc::now() + self.config.retry_delay;
            self.db.reschedule_payout_task(task.id, run_at, Some("awaiting payout destination linkage")).await?;
            return Ok(PayoutOutcome::AwaitingLinkage);
        }
        if self.pi.config().is_mock() || self.ledger.is_none() {
            let reason = "server payment credentials are not configured";
            error!("💸️ {reason}. Payout for order {} recorded as failed.", task.order_id);
            let payout = self.record(task, PayoutStatus::Failed, None, Some(reason)).await?;
            self.notify_owner(&store, &payout).await;
            self.db.remove_payout_task(task.id).await?;
            return Ok(PayoutOutcome::Failed(payout));
        }
        let outcome = match self.run_transfer(task, &store).await {
            Ok(txid) => {
                let payout = self.record(task, PayoutStatus::Completed, Some(&txid), None).await?;
                info!("💸️ Payout {} for order {} completed with txid {txid}", payout.id, task.order_id);
                PayoutOutcome::Completed(payout)
            },
            Err(e) => {
                let reason = e.to_string();
                error!("💸️ Payout for order {} failed: {reason}", task.order_id);
                let payout = self.record(task, PayoutStatus::Failed, None, Some(&reason)).await?;
                PayoutOutcome::Failed(payout)
            },
        };
        match &outcome {
            PayoutOutcome::Completed(p) | PayoutOutcome::Failed(p) => self.notify_owner(&store, p).await,
            PayoutOutcome::AwaitingLinkage => {},
        }
        self.db.remove_payout_task(task.id).await?;
        Ok(outcome)
    }

    /// Steps 3-5: the network and ledger legwork. Any error here becomes a terminal failure on
    /// the attempt row; the caller records it.
    async fn run_transfer(&self, task: &PayoutTask, store: &Store) -> Result<String, PayoutError> {
        let destination = store.pi_user_id.as_deref().unwrap_or_default();
        self.cancel_stuck_payments(destination).await;
        let args = A2uPaymentArgs {
            amount: micro_to_pi_amount(task.amount),
            memo: format!("Payout for order {}", task.order_id),
            metadata: serde_json::json!({ "order_id": task.order_id.as_str() }),
            uid: destination.to_string(),
        };
        let mut created = None;
        for attempt in 1..=self.config.max_create_attempts {
            match self.pi.create_a2u_payment(args.clone()).await {
                Ok(payment) => {
                    created = Some(payment);
                    break;
                },
                Err(PiApiError::OngoingPayment(_)) if attempt < self.config.max_create_attempts => {
                    warn!(
                        "💸️ Ongoing payment conflict for {destination} (attempt {attempt}/{}). Cancelling and retrying.",
                        self.config.max_create_attempts
                    );
                    self.cancel_stuck_payments(destination).await;
                },
                Err(PiApiError::OngoingPayment(_)) => return Err(PayoutError::OngoingPaymentConflict),
                Err(e) => return Err(e.into()),
            }
        }
        let payment = created.ok_or(PayoutError::OngoingPaymentConflict)?;
        let ledger = self.ledger.as_ref().ok_or(PayoutError::Ledger(LedgerError::MissingSeed))?;
        let to_address = payment
            .to_address
            .clone()
            .or_else(|| store.wallet_address.clone())
            .ok_or(PayoutError::NoDestinationAddress)?;
        let txid = ledger.submit_transfer(&to_address, task.amount, &payment.identifier).await?;
        self.pi.complete_payment(&payment.identifier, &txid).await?;
        Ok(txid)
    }

    /// Cancels any in-flight app-to-user payment still open against the destination. Best
    /// effort: failures are logged and the caller proceeds to creation, which will report the
    /// conflict if one remains.
    async fn cancel_stuck_payments(&self, destination: &str) {
        match self.pi.incomplete_server_payments(PaymentDirection::AppToUser, Some(destination)).await {
            Ok(stuck) => {
                for payment in stuck {
                    info!("💸️ Cancelling stuck A2U payment {} to {destination}", payment.identifier);
                    if let Err(e) = self.pi.cancel_payment(&payment.identifier).await {
                        warn!("💸️ Could not cancel stuck payment {}: {e}", payment.identifier);
                    }
                }
            },
            Err(e) => warn!("💸️ Could not list incomplete payments for {destination}: {e}"),
        }
    }

    async fn record(
        &self,
        task: &PayoutTask,
        status: PayoutStatus,
        txid: Option<&str>,
        reason: Option<&str>,
    ) -> Result<Payout, ServerError> {
        let attempt = self.db.payout_attempts_for_order(&task.order_id).await? + 1;
        let payout = self
            .db
            .record_payout(NewPayout {
                order_id: task.order_id.clone(),
                store_id: task.store_id,
                amount: task.amount,
                status,
                txid: txid.map(|s| s.to_string()),
                failure_reason: reason.map(|s| s.to_string()),
                attempt,
            })
            .await?;
        Ok(payout)
    }

    async fn notify_owner(&self, store: &Store, payout: &Payout) {
        let body = match payout.status {
            PayoutStatus::Completed => {
                format!("Payout of {} for order {} has been sent to your wallet", payout.amount, payout.order_id)
            },
            _ => format!(
                "Payout of {} for order {} could not be completed: {}",
                payout.amount,
                payout.order_id,
                payout.failure_reason.as_deref().unwrap_or("unknown error")
            ),
        };
        if let Err(e) = self.db.create_notification(store.owner_id, &body).await {
            warn!("💸️ Could not write payout notification for store owner {}: {e}", store.owner_id);
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
