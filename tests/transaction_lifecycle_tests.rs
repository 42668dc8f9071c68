mod common;

use std::sync::Arc;

use chrono::Duration;
use saga_farm_tx_tracker::models::status::TransactionStatus;
use saga_farm_tx_tracker::models::transaction::{CreateTransactionRequest, UpdateTransactionRequest};
use saga_farm_tx_tracker::services::pagination::TransactionFilter;
use saga_farm_tx_tracker::services::transaction_service::{CreateOutcome, TransactionError};
use saga_farm_tx_tracker::services::validation::ValidationError;

use crate::common::test_service;

fn plant_seed(id: &str, player: &str) -> CreateTransactionRequest {
    CreateTransactionRequest {
        id: Some(id.to_string()),
        player_id: Some(player.to_string()),
        tx_type: Some("plant_seed".to_string()),
        status: Some("preparing".to_string()),
        seed_type: Some(0),
        amount: Some("100000000".to_string()),
        ..Default::default()
    }
}

fn to(status: TransactionStatus) -> UpdateTransactionRequest {
    UpdateTransactionRequest::status(status)
}

fn fail_with(message: &str) -> UpdateTransactionRequest {
    UpdateTransactionRequest {
        status: Some("failed".to_string()),
        error_message: Some(message.to_string()),
        ..Default::default()
    }
}

/// Plant, advance, reject a step back, fail on relay timeout, retry.
#[test]
fn test_plant_seed_fail_and_retry_scenario() {
    let (service, clock) = test_service();

    service.create(plant_seed("tx1", "p1")).unwrap();

    clock.advance(Duration::seconds(1));
    service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap();

    let err = service.update("tx1", to(TransactionStatus::Preparing)).unwrap_err();
    assert_eq!(
        err,
        TransactionError::InvalidTransition {
            id: "tx1".to_string(),
            from: TransactionStatus::WalletConfirm,
            to: TransactionStatus::Preparing,
        }
    );

    service.update("tx1", to(TransactionStatus::SagaPending)).unwrap();
    let failed = service.update("tx1", fail_with("relay timeout")).unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("relay timeout"));
    assert_eq!(failed.retry_count, 0);

    let retried = service.update("tx1", to(TransactionStatus::SagaPending)).unwrap();
    assert_eq!(retried.status, TransactionStatus::SagaPending);
    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.error_message, None);
}

#[test]
fn test_player_id_with_space_is_rejected() {
    let (service, _) = test_service();
    let err = service.create(plant_seed("tx1", "p 1")).unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Validation(ValidationError::InvalidIdentifier { field: "player_id", .. })
    ));
    assert_eq!(service.count(), 0);
}

#[test]
fn test_get_after_create_matches_input() {
    let (service, _) = test_service();
    let mut input = plant_seed("tx1", "p1");
    input.saga_tx_hash = Some("0xfeed".to_string());
    input.gas_estimate = Some("210000".to_string());

    service.create(input).unwrap();
    let stored = service.get("tx1").unwrap();

    assert_eq!(stored.id, "tx1");
    assert_eq!(stored.player_id, "p1");
    assert_eq!(stored.status, TransactionStatus::Preparing);
    assert_eq!(stored.payload.seed_type(), Some(0));
    assert_eq!(stored.payload.amount(), Some("100000000"));
    assert_eq!(stored.saga_tx_hash.as_deref(), Some("0xfeed"));
    assert_eq!(stored.gas_estimate.as_deref(), Some("210000"));
    assert_eq!(stored.start_time, common::start_time());
    assert_eq!(stored.retry_count, 0);
}

#[test]
fn test_identical_create_twice_is_idempotent() {
    let (service, clock) = test_service();
    let first = service.create(plant_seed("tx1", "p1")).unwrap();
    clock.advance(Duration::minutes(1));
    let second = service.create(plant_seed("tx1", "p1")).unwrap();

    assert!(matches!(first, CreateOutcome::Created(_)));
    assert!(matches!(second, CreateOutcome::Existing(_)));
    assert_eq!(first.transaction(), second.transaction());
    assert_eq!(service.get("tx1").unwrap().last_updated, first.transaction().last_updated);
}

/// Every (from, to) pair is either in the table and succeeds with a strictly
/// later `last_updated`, or is rejected.
#[test]
fn test_transition_table_exhaustively() {
    let path_to = |status: TransactionStatus| -> Vec<UpdateTransactionRequest> {
        match status {
            TransactionStatus::Failed => vec![fail_with("boom")],
            pipeline => TransactionStatus::PIPELINE
                .iter()
                .take_while(|s| **s != pipeline)
                .chain(std::iter::once(&pipeline))
                .filter(|s| **s != TransactionStatus::Preparing)
                .map(|s| to(*s))
                .collect(),
        }
    };

    for from in TransactionStatus::ALL {
        for target in TransactionStatus::ALL {
            let (service, clock) = test_service();
            service.create(plant_seed("tx", "p1")).unwrap();
            for step in path_to(from) {
                service.update("tx", step).unwrap();
            }
            let before = service.get("tx").unwrap();
            assert_eq!(before.status, from);
            clock.advance(Duration::milliseconds(1));

            let patch = if target == TransactionStatus::Failed {
                fail_with("boom")
            } else {
                to(target)
            };
            let result = service.update("tx", patch);

            let legal = from.transition_to(target, before.failed_from).is_some();
            match result {
                Ok(after) => {
                    assert!(legal, "{from} -> {target} should be rejected");
                    assert_eq!(after.status, target);
                    assert!(after.last_updated > before.last_updated);
                }
                Err(err) => {
                    assert!(!legal, "{from} -> {target} should be accepted: {err}");
                    if from.is_terminal() {
                        assert!(matches!(err, TransactionError::TerminalState { .. }), "{err:?}");
                    } else {
                        assert!(matches!(err, TransactionError::InvalidTransition { .. }), "{err:?}");
                    }
                }
            }
        }
    }
}

#[test]
fn test_completed_rejects_everything() {
    let (service, _) = test_service();
    service.create(plant_seed("tx1", "p1")).unwrap();
    for status in &TransactionStatus::PIPELINE[1..] {
        service.update("tx1", to(*status)).unwrap();
    }

    let attach_hash = UpdateTransactionRequest {
        arbitrum_tx_hash: Some("0xabc".to_string()),
        ..Default::default()
    };
    for patch in [attach_hash, fail_with("late"), to(TransactionStatus::ArbitrumPending)] {
        assert!(matches!(
            service.update("tx1", patch),
            Err(TransactionError::TerminalState {
                status: TransactionStatus::Completed,
                ..
            })
        ));
    }
}

#[test]
fn test_failed_rejects_non_retry_updates() {
    let (service, _) = test_service();
    service.create(plant_seed("tx1", "p1")).unwrap();
    service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap();
    service.update("tx1", fail_with("user rejected")).unwrap();

    // retry target must be the status it failed from
    assert!(matches!(
        service.update("tx1", to(TransactionStatus::SagaPending)),
        Err(TransactionError::TerminalState { .. })
    ));
    assert!(matches!(
        service.update("tx1", UpdateTransactionRequest::default()),
        Err(TransactionError::TerminalState { .. })
    ));
    assert_eq!(
        service.get("tx1").unwrap().error_message.as_deref(),
        Some("user rejected")
    );
}

#[test]
fn test_retry_limit_is_enforced() {
    let (service, _) = test_service();
    service.create(plant_seed("tx1", "p1")).unwrap();
    service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap();

    for attempt in 1..=5 {
        service.update("tx1", fail_with("relay timeout")).unwrap();
        let retried = service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap();
        assert_eq!(retried.retry_count, attempt);
    }

    service.update("tx1", fail_with("relay timeout")).unwrap();
    assert_eq!(
        service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap_err(),
        TransactionError::RetryLimitExceeded {
            id: "tx1".to_string(),
            retry_count: 5,
            max_retries: 5,
        }
    );
    assert_eq!(service.get("tx1").unwrap().status, TransactionStatus::Failed);
}

#[test]
fn test_identifiers_attach_along_the_way() {
    let (service, _) = test_service();
    service.create(plant_seed("tx1", "p1")).unwrap();
    service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap();
    service
        .update(
            "tx1",
            UpdateTransactionRequest {
                status: Some("saga_pending".to_string()),
                saga_tx_hash: Some("0xsaga".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    // self-report that only adds the relay ids
    let refreshed = service
        .update(
            "tx1",
            UpdateTransactionRequest {
                status: Some("saga_pending".to_string()),
                axelar_tx_id: Some("axl-42".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(refreshed.status, TransactionStatus::SagaPending);
    assert_eq!(refreshed.saga_tx_hash.as_deref(), Some("0xsaga"));
    assert_eq!(refreshed.axelar_tx_id.as_deref(), Some("axl-42"));

    let err = service
        .update(
            "tx1",
            UpdateTransactionRequest {
                saga_tx_hash: Some("0xother".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Validation(ValidationError::IdentifierAlreadySet {
            field: "saga_tx_hash",
            ..
        })
    ));
}

#[test]
fn test_query_pagination_and_active_only() {
    let (service, clock) = test_service();
    service.create(plant_seed("t1", "p1")).unwrap();
    clock.advance(Duration::seconds(1));
    service.create(plant_seed("t2", "p1")).unwrap();
    clock.advance(Duration::seconds(1));
    service.create(plant_seed("other", "p2")).unwrap();

    let first = service.query("p1", TransactionFilter::new(1, 0)).unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].id, "t1");
    assert_eq!(first.total, 2);
    assert!(first.has_more);

    let second = service.query("p1", TransactionFilter::new(1, 1)).unwrap();
    assert_eq!(second.items[0].id, "t2");
    assert!(!second.has_more);

    service.update("t1", fail_with("wallet closed")).unwrap();
    let active = service
        .query("p1", TransactionFilter::new(10, 0).active_only())
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.items[0].id, "t2");

    let all = service.query("p1", TransactionFilter::new(10, 0)).unwrap();
    assert_eq!(all.total, 2);
}

/// Watchers report the same stage at once; one advances, the rest refresh.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_for_same_stage() {
    let (service, _) = test_service();
    service.create(plant_seed("tx1", "p1")).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.update("tx1", to(TransactionStatus::WalletConfirm)) })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let stored = service.get("tx1").unwrap();
    assert_eq!(stored.status, TransactionStatus::WalletConfirm);
    for outcome in outcomes {
        match outcome {
            Ok(tx) => assert_eq!(tx.status, TransactionStatus::WalletConfirm),
            Err(err) => assert!(matches!(err, TransactionError::Conflict { .. }), "{err:?}"),
        }
    }
}

/// An axelar report racing ahead of the saga acknowledgement never lands out of order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_out_of_order_report_is_rejected() {
    let (service, _) = test_service();
    service.create(plant_seed("tx1", "p1")).unwrap();
    service.update("tx1", to(TransactionStatus::WalletConfirm)).unwrap();

    let service = Arc::new(service);
    let axelar = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.update("tx1", to(TransactionStatus::AxelarProcessing)) })
    };
    let saga = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.update("tx1", to(TransactionStatus::SagaPending)) })
    };

    let axelar = axelar.await.unwrap();
    let saga = saga.await.unwrap();
    assert!(saga.is_ok());

    let stored = service.get("tx1").unwrap();
    match axelar {
        // landed after saga was acknowledged
        Ok(_) => assert_eq!(stored.status, TransactionStatus::AxelarProcessing),
        Err(err) => {
            assert!(matches!(err, TransactionError::InvalidTransition { .. }), "{err:?}");
            assert_eq!(stored.status, TransactionStatus::SagaPending);
        }
    }
}
