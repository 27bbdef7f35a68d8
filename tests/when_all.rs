//! `when_all` aggregation.

mod common;

use testkit_controlled::prelude::*;

use common::{for_each_seed, init_test_logging};

#[derive(Debug, thiserror::Error)]
#[error("left failed")]
struct LeftFailed;

#[derive(Debug, thiserror::Error)]
#[error("right failed")]
struct RightFailed;

#[test]
fn test_when_all_values_in_input_order() {
    let results = for_each_seed(|ctx| async move {
        let inner = ctx.clone();
        let slow = ctx.spawn(async move {
            inner.yield_now().await;
            inner.yield_now().await;
            1
        });
        let fast = ctx.spawn(async { 2 });
        let ready = ctx.from_result(3);

        ctx.when_all([slow, fast, ready]).await
    });

    assert!(results.iter().all(|values| values == &[1, 2, 3]));
}

#[test]
fn test_when_all_empty_completes() {
    init_test_logging();
    let values = Runtime::default()
        .block_on(|ctx| async move { ctx.when_all(Vec::<ControlledTask<u8>>::new()).await })
        .unwrap();
    assert!(values.is_empty());
}

#[test]
fn test_when_all_aggregates_every_fault() {
    for_each_seed(|ctx| async move {
        let left: ControlledTask<i32> = ctx.run(async { Err(LeftFailed) });
        let ok = ctx.spawn(async { 1 });
        let right: ControlledTask<i32> = ctx.run(async { Err(RightFailed) });

        let node = ctx.when_all([left.clone(), ok, right.clone()]);
        let fault = node.join().await.unwrap_err();

        assert!(node.is_faulted());
        let inner = fault.inner_faults();
        assert_eq!(inner.len(), 2);
        assert!(inner[0].is::<LeftFailed>());
        assert!(inner[1].is::<RightFailed>());
        assert!(inner[0].same_cause(&left.fault()?));
        assert!(inner[1].same_cause(&right.fault()?));
        Ok(())
    });
}

#[test]
fn test_when_all_duplicate_fault_counted_once() {
    init_test_logging();
    Runtime::default()
        .block_on(|ctx| async move {
            let failed: ControlledTask<()> = ctx.run(async { Err(LeftFailed) });
            let fault = ctx
                .when_all([failed.clone(), failed])
                .await
                .unwrap_err();
            assert_eq!(fault.inner_faults().len(), 1);
            Ok::<_, Fault>(())
        })
        .unwrap();
}

#[test]
fn test_when_all_waits_for_every_input() {
    for_each_seed(|ctx| async move {
        let inner = ctx.clone();
        let slow = ctx.spawn(async move {
            for _ in 0..4 {
                inner.yield_now().await;
            }
        });
        let fast = ctx.spawn(async {});

        ctx.when_all([slow.clone(), fast.clone()]).await?;
        assert!(slow.is_completed());
        assert!(fast.is_completed());
        Ok(())
    });
}
