use chrono::{Duration, Utc};
use log::*;
use pi_market_engine::{traits::PayoutManagement, SqliteDatabase};
use pi_network_tools::PiNetworkApi;
use tokio::task::JoinHandle;

use crate::{
    config::PayoutConfig,
    payout::{PayoutExecutor, PayoutOutcome},
};

/// How many due tasks one worker pass claims.
const CLAIM_BATCH: i64 = 10;

/// Starts the payout worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The worker polls the durable task queue, runs each due task through the executor, and applies
/// attempt-counted exponential backoff when an execution errors internally (as opposed to
/// recording a terminal failure, which removes the task).
pub fn start_payout_worker(db: SqliteDatabase, pi: PiNetworkApi, config: PayoutConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poll = config.poll_interval.to_std().unwrap_or(std::time::Duration::from_secs(15));
        let mut timer = tokio::time::interval(poll);
        let executor = PayoutExecutor::new(db.clone(), pi, config);
        info!("🕰️ Payout worker started (polling every {poll:?})");
        loop {
            timer.tick().await;
            let tasks = match db.due_payout_tasks(CLAIM_BATCH).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!("🕰️ Could not fetch due payout tasks: {e}");
                    continue;
                },
            };
            if !tasks.is_empty() {
                debug!("🕰️ {} payout tasks due", tasks.len());
            }
            for task in tasks {
                match executor.execute(&task).await {
                    Ok(PayoutOutcome::Completed(p)) => {
                        info!("🕰️ Payout {} settled for order {}", p.id, p.order_id)
                    },
                    Ok(PayoutOutcome::AwaitingLinkage) => {
                        info!("🕰️ Payout for order {} is awaiting destination linkage", task.order_id)
                    },
                    Ok(PayoutOutcome::Failed(p)) => {
                        warn!("🕰️ Payout {} failed terminally for order {}", p.id, p.order_id)
                    },
                    Err(e) => {
                        // An internal error (usually the database). Keep the task, back off by
                        // attempt count so a wedged dependency does not get hammered.
                        error!("🕰️ Error executing payout task {}: {e}", task.id);
                        let backoff = Duration::seconds(30 * 2i64.pow(task.attempts.clamp(0, 6) as u32));
                        let run_at = Utc::now() + backoff;
                        if let Err(e) = db.reschedule_payout_task(task.id, run_at, Some(&e.to_string())).await {
                            error!("🕰️ Could not reschedule payout task {}: {e}", task.id);
                        }
                    },
                }
            }
        }
    })
}
