// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the durable context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tapline_core::error::CoreError;
use tapline_core::persistence::{Persistence, SqlitePersistence};
use tapline_core::router::CallbackRouter;
use tapline_sdk::{DurableContext, RetryConfig, RetryStrategy, SdkError, WaitOptions};

async fn setup(instance_id: &str) -> (DurableContext, Arc<SqlitePersistence>, CallbackRouter) {
    let persistence = Arc::new(SqlitePersistence::in_memory().await.unwrap());
    let router = CallbackRouter::new(persistence.clone());
    let ctx = DurableContext::new(persistence.clone(), router.clone(), instance_id, "tenant-1");
    ctx.register().await.unwrap();
    (ctx, persistence, router)
}

#[tokio::test]
async fn test_step_runs_body_once() {
    let (ctx, _p, _r) = setup("inst-1").await;
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let first: u32 = ctx
        .step("compute", || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await
        .unwrap();
    assert_eq!(first, 42);

    // Replay: the recorded result comes back without running the body.
    let c = calls.clone();
    let second: u32 = ctx
        .step("compute", || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(99)
        })
        .await
        .unwrap();

    assert_eq!(second, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_step_failure_is_not_recorded() {
    let (ctx, _p, _r) = setup("inst-1").await;

    let err = ctx
        .step::<u32, _, _>("flaky", || async { Err(SdkError::Step("boom".into())) })
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Step(_)));

    // A retried execution runs the step again and may succeed this time.
    let value: u32 = ctx.step("flaky", || async { Ok(7) }).await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn test_steps_advance_instance_checkpoint() {
    let (ctx, persistence, _r) = setup("inst-1").await;

    let _: u32 = ctx.step("first", || async { Ok(1) }).await.unwrap();
    let _: u32 = ctx.step("second", || async { Ok(2) }).await.unwrap();

    let inst = persistence.get_instance("inst-1").await.unwrap().unwrap();
    assert_eq!(inst.checkpoint_id.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_wait_resolves_on_pushed_callback() {
    let (ctx, _persistence, router) = setup("inst-1").await;

    // The registrar hands the token to an external party; here a spawned
    // task plays the bartender and submits after a short delay.
    let (token_tx, mut token_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let submit_router = router.clone();
    let submitter = tokio::spawn(async move {
        let token = token_rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        submit_router
            .submit(&token, b"{\"status\":\"accepted\"}")
            .await
            .unwrap();
    });

    let payload = ctx
        .wait_for_callback(
            "wait-for-acceptance",
            move |token| {
                let token_tx = token_tx.clone();
                async move {
                    token_tx.send(token).map_err(|e| SdkError::Event(e.to_string()))?;
                    Ok(())
                }
            },
            WaitOptions::new(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(payload, b"{\"status\":\"accepted\"}");
    submitter.await.unwrap();
}

#[tokio::test]
async fn test_wait_picks_up_resolution_persisted_before_suspension() {
    let (ctx, _persistence, router) = setup("inst-1").await;

    // Submitting from inside the registrar lands the resolution before the
    // execution ever suspends; the wait must still return it.
    let submit_router = router.clone();
    let payload = ctx
        .wait_for_callback(
            "wait-for-ready",
            move |token| {
                let router = submit_router.clone();
                async move {
                    router
                        .submit(&token, b"ready")
                        .await
                        .map_err(|e| SdkError::Internal(e.to_string()))?;
                    Ok(())
                }
            },
            WaitOptions::new(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(payload, b"ready");
}

#[tokio::test]
async fn test_resolved_wait_short_circuits_on_resume() {
    let persistence = Arc::new(SqlitePersistence::in_memory().await.unwrap());
    let router = CallbackRouter::new(persistence.clone());

    let ctx = DurableContext::new(persistence.clone(), router.clone(), "inst-1", "tenant-1");
    ctx.register().await.unwrap();

    let submit_router = router.clone();
    ctx.wait_for_callback(
        "wait-for-acceptance",
        move |token| {
            let router = submit_router.clone();
            async move {
                router
                    .submit(&token, b"first-run")
                    .await
                    .map_err(|e| SdkError::Internal(e.to_string()))?;
                Ok(())
            }
        },
        WaitOptions::new(Duration::from_secs(5)),
    )
    .await
    .unwrap();

    // Simulate a resume: a fresh context replays the same wait. The journal
    // answers and the registrar must not run again.
    let resumed = DurableContext::new(persistence, router, "inst-1", "tenant-1");
    resumed.register().await.unwrap();

    let registrar_calls = Arc::new(AtomicU32::new(0));
    let c = registrar_calls.clone();
    let payload = resumed
        .wait_for_callback(
            "wait-for-acceptance",
            move |_token| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            WaitOptions::new(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(payload, b"first-run");
    assert_eq!(registrar_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wait_times_out_and_closes_token() {
    let (ctx, _persistence, router) = setup("inst-1").await;

    let token_slot = Arc::new(std::sync::Mutex::new(None::<String>));
    let slot = token_slot.clone();
    let err = ctx
        .wait_for_callback(
            "wait-for-acceptance",
            move |token| {
                let slot = slot.clone();
                async move {
                    *slot.lock().unwrap() = Some(token);
                    Ok(())
                }
            },
            WaitOptions::new(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());

    // The token is closed: a late submission is rejected, not silently
    // applied.
    let token = token_slot.lock().unwrap().clone().unwrap();
    let late = router.submit(&token, b"too-late").await.unwrap_err();
    match late {
        CoreError::CallbackClosed { status, .. } => assert_eq!(status, "expired"),
        other => panic!("expected CallbackClosed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_registrar_retries_transient_failures() {
    let (ctx, _persistence, router) = setup("inst-1").await;

    let attempts = Arc::new(AtomicU32::new(0));
    let (token_tx, mut token_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let submit_router = router.clone();
    let submitter = tokio::spawn(async move {
        let token = token_rx.recv().await.unwrap();
        submit_router.submit(&token, b"ok").await.unwrap();
    });

    let a = attempts.clone();
    let payload = ctx
        .wait_for_callback(
            "wait-for-ready",
            move |token| {
                let a = a.clone();
                let token_tx = token_tx.clone();
                async move {
                    // First two deliveries fail, third goes through.
                    if a.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err(SdkError::Event("publish failed".into()));
                    }
                    token_tx.send(token).map_err(|e| SdkError::Event(e.to_string()))?;
                    Ok(())
                }
            },
            WaitOptions::new(Duration::from_secs(5)).with_retry(RetryConfig::new(
                3,
                1,
                RetryStrategy::ExponentialBackoff,
            )),
        )
        .await
        .unwrap();

    assert_eq!(payload, b"ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    submitter.await.unwrap();
}

#[tokio::test]
async fn test_registrar_exhausts_retries() {
    let (ctx, _persistence, _router) = setup("inst-1").await;

    let err = ctx
        .wait_for_callback(
            "wait-for-ready",
            |_token| async { Err(SdkError::Event("publish failed".into())) },
            WaitOptions::new(Duration::from_secs(5)).with_retry(RetryConfig::new(
                1,
                1,
                RetryStrategy::ExponentialBackoff,
            )),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SdkError::Event(_)));
}

#[tokio::test]
async fn test_completed_and_failed_are_terminal() {
    let (ctx, persistence, _r) = setup("inst-ok").await;
    ctx.completed(b"{\"orderId\":\"inst-ok\"}").await.unwrap();

    let inst = persistence.get_instance("inst-ok").await.unwrap().unwrap();
    assert_eq!(inst.status, "completed");
    assert_eq!(inst.output, Some(b"{\"orderId\":\"inst-ok\"}".to_vec()));

    let ctx2 = DurableContext::new(
        persistence.clone(),
        CallbackRouter::new(persistence.clone()),
        "inst-bad",
        "tenant-1",
    );
    ctx2.register().await.unwrap();
    ctx2.failed("validation failed").await.unwrap();

    let inst = persistence.get_instance("inst-bad").await.unwrap().unwrap();
    assert_eq!(inst.status, "failed");
    assert_eq!(inst.error, Some("validation failed".to_string()));
}

#[tokio::test]
async fn test_suspend_resume_events_are_journaled() {
    let (ctx, persistence, router) = setup("inst-1").await;

    let (token_tx, mut token_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let submit_router = router.clone();
    let submitter = tokio::spawn(async move {
        let token = token_rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        submit_router.submit(&token, b"{}").await.unwrap();
    });

    ctx.wait_for_callback(
        "wait-for-acceptance",
        move |token| {
            let token_tx = token_tx.clone();
            async move {
                token_tx.send(token).map_err(|e| SdkError::Event(e.to_string()))?;
                Ok(())
            }
        },
        WaitOptions::new(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    submitter.await.unwrap();

    let events = persistence.list_events("inst-1", 50, 0).await.unwrap();
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"started"));
    assert!(types.contains(&"suspended"));
    assert!(types.contains(&"resumed"));
}
