use chrono::{Duration, Utc};
use pi_market_engine::db_types::PayoutStatus;
use pi_network_tools::{PiNetworkApi, PiNetworkConfig};

use crate::{
    config::PayoutConfig,
    endpoint_tests::mocks::{payout, payout_task, store, MockPayoutDb},
    payout::{PayoutExecutor, PayoutOutcome},
};

fn mock_pi() -> PiNetworkApi {
    PiNetworkApi::new(PiNetworkConfig::default()).unwrap()
}

fn five_minute_config() -> PayoutConfig {
    PayoutConfig { retry_delay: Duration::minutes(5), ..PayoutConfig::default() }
}

#[actix_web::test]
async fn missing_destination_holds_the_payout_instead_of_failing_it() {
    let mut db = MockPayoutDb::new();
    db.expect_fetch_store().times(1).returning(|id| Ok(Some(store(id, None))));
    db.expect_payout_attempts_for_order().returning(|_| Ok(0));
    // The recorded payout must be Pending with the linkage reason. Anything else (notably a
    // Failed row) panics the mock.
    db.expect_record_payout()
        .withf(|p| {
            p.status == PayoutStatus::Pending
                && p.failure_reason.as_deref() == Some("awaiting payout destination linkage")
        })
        .times(1)
        .returning(|p| Ok(payout(1, p.order_id.as_str(), p.store_id, p.status)));
    // Exactly one reschedule, roughly five minutes out.
    db.expect_reschedule_payout_task()
        .withf(|task_id, run_at, _| {
            let delta = *run_at - Utc::now();
            *task_id == 7 && delta > Duration::minutes(4) && delta < Duration::minutes(6)
        })
        .times(1)
        .returning(|task_id, run_at, _| {
            let mut task = payout_task(task_id, "ord-a", 5);
            task.run_at = run_at;
            task.attempts = 1;
            Ok(task)
        });
    let executor = PayoutExecutor::new(db, mock_pi(), five_minute_config());
    let outcome = executor.execute(&payout_task(7, "ord-a", 5)).await.unwrap();
    assert!(matches!(outcome, PayoutOutcome::AwaitingLinkage));
}

#[actix_web::test]
async fn missing_credentials_are_a_terminal_failure() {
    let mut db = MockPayoutDb::new();
    // The store has a destination, but the Pi client is in mock mode (no API key, no seed).
    db.expect_fetch_store().times(1).returning(|id| Ok(Some(store(id, Some("uid-owner")))));
    db.expect_payout_attempts_for_order().returning(|_| Ok(1));
    db.expect_record_payout()
        .withf(|p| p.status == PayoutStatus::Failed && p.attempt == 2)
        .times(1)
        .returning(|p| {
            let mut row = payout(2, p.order_id.as_str(), p.store_id, p.status);
            row.failure_reason = p.failure_reason.clone();
            row.attempt = p.attempt;
            Ok(row)
        });
    db.expect_create_notification().times(1).returning(|user_id, body| {
        Ok(pi_market_engine::db_types::Notification {
            id: 1,
            user_id,
            body: body.to_string(),
            is_read: false,
            created_at: Utc::now(),
        })
    });
    db.expect_remove_payout_task().withf(|id| *id == 9).times(1).returning(|_| Ok(()));
    let executor = PayoutExecutor::new(db, mock_pi(), five_minute_config());
    let outcome = executor.execute(&payout_task(9, "ord-b", 5)).await.unwrap();
    match outcome {
        PayoutOutcome::Failed(p) => {
            assert_eq!(p.status, PayoutStatus::Failed);
            assert!(p.failure_reason.unwrap().contains("credentials"));
        },
        other => panic!("expected a terminal failure, got {other:?}"),
    }
}
