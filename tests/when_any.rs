//! `when_any` races: plain, delayed and nested in spawned operations.

mod common;

use std::result::Result;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use testkit_controlled::prelude::*;

use common::{for_each_seed, init_test_logging};

#[derive(Debug, thiserror::Error)]
#[error("invalid operation")]
struct InvalidOperation;

type Entry = Arc<Mutex<Option<i32>>>;

fn writer(ctx: &Context, entry: &Entry, value: i32, delay: bool) -> ControlledTask<()> {
    let entry = Arc::clone(entry);
    let inner = ctx.clone();
    ctx.spawn(async move {
        if delay {
            inner.delay(Duration::from_millis(10)).await;
        }
        *entry.lock() = Some(value);
    })
}

fn producer(ctx: &Context, value: i32, delay: bool) -> ControlledTask<i32> {
    let inner = ctx.clone();
    ctx.spawn(async move {
        if delay {
            inner.delay(Duration::from_millis(10)).await;
        }
        value
    })
}

fn failing_writer(
    ctx: &Context,
    entry: &Entry,
    value: i32,
    delay: bool,
) -> ControlledTask<()> {
    let entry = Arc::clone(entry);
    let inner = ctx.clone();
    ctx.run(async move {
        if delay {
            inner.delay(Duration::from_millis(10)).await;
        }
        *entry.lock() = Some(value);
        Err(InvalidOperation)
    })
}

// ============================================================================
// Scenario bodies
// ============================================================================

async fn race_writers(ctx: Context, delay: bool) -> Result<(), Fault> {
    let entry: Entry = Arc::new(Mutex::new(None));
    let t1 = writer(&ctx, &entry, 5, delay);
    let t2 = writer(&ctx, &entry, 3, delay);

    let node = ctx.when_any([t1, t2]);
    node.join().await?;

    assert!(node.is_completed());
    let value = *entry.lock();
    assert!(value == Some(5) || value == Some(3), "unexpected value {value:?}");
    Ok(())
}

async fn race_results(ctx: Context, delay: bool) -> Result<(), Fault> {
    let t1 = producer(&ctx, 5, delay);
    let t2 = producer(&ctx, 3, delay);

    let winner = ctx.when_any([t1.clone(), t2.clone()]).await?;
    let value = winner.result()?;
    assert!(
        (winner.id() == t1.id() && value == 5) || (winner.id() == t2.id() && value == 3),
        "winner {:?} reported {value}",
        winner.id()
    );
    Ok(())
}

async fn race_faults(ctx: Context, delay: bool) -> Result<(), Fault> {
    let entry: Entry = Arc::new(Mutex::new(None));
    let t1 = failing_writer(&ctx, &entry, 5, delay);
    let t2 = failing_writer(&ctx, &entry, 3, delay);

    let node = ctx.when_any([t1.clone(), t2.clone()]);
    let fault = match node.join().await {
        Ok(winner) => panic!("expected a fault, {:?} completed", winner.id()),
        Err(fault) => fault,
    };

    assert!(node.is_faulted());
    assert!(fault.is::<InvalidOperation>());
    assert!(node.fault()?.same_cause(&fault));

    // Let the loser finish so both causes can be compared.
    let _ = t1.join().await;
    let _ = t2.join().await;
    let from_input = [t1.fault()?, t2.fault()?]
        .iter()
        .filter(|cause| cause.same_cause(&fault))
        .count();
    assert_eq!(from_input, 1, "the fault must be one input's own cause");

    let value = *entry.lock();
    assert!(value == Some(5) || value == Some(3), "unexpected value {value:?}");
    Ok(())
}

/// Runs a scenario inside a spawned operation instead of the entry.
async fn nested<F, Fut>(ctx: Context, scenario: F) -> Result<(), Fault>
where
    F: FnOnce(Context) -> Fut,
    Fut: std::future::Future<Output = Result<(), Fault>> + Send + 'static,
{
    let body = scenario(ctx.clone());
    ctx.run(body).await
}

// ============================================================================
// Scenario A: synchronous writers
// ============================================================================

#[test]
fn test_when_any_with_two_synchronous_tasks() {
    for_each_seed(|ctx| race_writers(ctx, false));
}

#[test]
fn test_when_any_with_two_parallel_synchronous_tasks() {
    for_each_seed(|ctx| nested(ctx, |ctx| race_writers(ctx, false)));
}

// ============================================================================
// Scenario B: delayed writers
// ============================================================================

#[test]
fn test_when_any_with_two_asynchronous_tasks() {
    for_each_seed(|ctx| race_writers(ctx, true));
}

#[test]
fn test_when_any_with_two_parallel_asynchronous_tasks() {
    for_each_seed(|ctx| nested(ctx, |ctx| race_writers(ctx, true)));
}

#[test]
fn test_when_any_with_virtual_time_delays() {
    init_test_logging();
    for seed in common::SEEDS {
        let config = Config::default()
            .with_seed(seed)
            .with_delay_policy(DelayPolicy::VirtualTime);
        Runtime::new(config)
            .block_on(|ctx| race_writers(ctx, true))
            .unwrap();
    }
}

// ============================================================================
// Scenario C: result race
// ============================================================================

#[test]
fn test_when_any_with_two_synchronous_task_with_results() {
    for_each_seed(|ctx| race_results(ctx, false));
}

#[test]
fn test_when_any_with_two_asynchronous_task_with_results() {
    for_each_seed(|ctx| race_results(ctx, true));
}

#[test]
fn test_when_any_with_two_parallel_asynchronous_task_with_results() {
    for_each_seed(|ctx| nested(ctx, |ctx| race_results(ctx, true)));
}

// ============================================================================
// Scenario D: double fault
// ============================================================================

#[test]
fn test_when_any_with_two_synchronous_tasks_with_exception() {
    for_each_seed(|ctx| race_faults(ctx, false));
}

#[test]
fn test_when_any_with_two_asynchronous_tasks_with_exception() {
    for_each_seed(|ctx| race_faults(ctx, true));
}

#[test]
fn test_when_any_with_two_parallel_tasks_with_exception() {
    for_each_seed(|ctx| nested(ctx, |ctx| race_faults(ctx, true)));
}

// ============================================================================
// Winner selection
// ============================================================================

fn winner_value(policy: SchedulingPolicy) -> (OperationId, i32) {
    init_test_logging();
    let runtime = Runtime::new(Config::default().with_policy(policy));
    runtime
        .block_on(|ctx| async move {
            let t1 = ctx.spawn(async { 5 });
            let t2 = ctx.spawn(async { 3 });
            let winner = ctx.when_any([t1, t2]).await?;
            Ok::<_, Fault>((winner.id(), winner.result()?))
        })
        .unwrap()
}

#[test]
fn test_fifo_picks_first_spawned_winner() {
    // Op(0) is the entry, the inputs are Op(1) and Op(2).
    assert_eq!(
        winner_value(SchedulingPolicy::Fifo),
        (OperationId::new(1), 5)
    );
}

#[test]
fn test_lifo_picks_last_spawned_winner() {
    assert_eq!(
        winner_value(SchedulingPolicy::Lifo),
        (OperationId::new(2), 3)
    );
}

#[test]
fn test_seeds_explore_both_winners() {
    let winners = for_each_seed(|ctx| async move {
        let t1 = ctx.spawn(async { 5 });
        let t2 = ctx.spawn(async { 3 });
        let winner = ctx.when_any([t1, t2]).await?;
        winner.result().map_err(Fault::new)
    });

    assert!(winners.contains(&5));
    assert!(winners.contains(&3));
}

#[test]
fn test_already_terminal_input_wins() {
    init_test_logging();
    let runtime = Runtime::new(Config::default().with_policy(SchedulingPolicy::Fifo));
    runtime
        .block_on(|ctx| async move {
            let failed: ControlledTask<i32> = ctx.from_fault(InvalidOperation);
            let pending = ctx.spawn(async { 1 });

            let fault = ctx.when_any([pending, failed.clone()]).await.unwrap_err();
            assert!(fault.same_cause(&failed.fault()?));
            Ok::<_, Fault>(())
        })
        .unwrap();
}

#[test]
fn test_duplicate_inputs_are_tolerated() {
    for_each_seed(|ctx| async move {
        let t = ctx.spawn(async { 7 });
        let winner = ctx.when_any([t.clone(), t.clone(), t.clone()]).await?;
        assert_eq!(winner, t);
        Ok(())
    });
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_no_false_completion() {
    for_each_seed(|ctx| async move {
        let spin = |ctx: &Context, turns: usize, value: i32| {
            let inner = ctx.clone();
            ctx.spawn(async move {
                for _ in 0..turns {
                    inner.yield_now().await;
                }
                value
            })
        };
        let t1 = spin(&ctx, 5, 1);
        let t2 = spin(&ctx, 7, 2);
        let node = ctx.when_any([t1.clone(), t2.clone()]);

        let observed = node.clone();
        let inner = ctx.clone();
        let probe = ctx.spawn(async move {
            while !observed.is_terminal() {
                inner.yield_now().await;
            }
            assert!(t1.is_terminal() || t2.is_terminal());
        });

        node.join().await?;
        probe.await?;
        Ok(())
    });
}

#[test]
fn test_losers_still_complete() {
    init_test_logging();
    for seed in common::SEEDS {
        let runtime = Runtime::new(Config::default().with_seed(seed));
        let (t1, t2) = runtime
            .block_on(|ctx| async move {
                let inner = ctx.clone();
                let t1 = ctx.spawn(async move {
                    inner.yield_now().await;
                    inner.yield_now().await;
                    1
                });
                let t2 = ctx.spawn(async { 2 });
                let _winner = ctx.when_any([t1.clone(), t2.clone()]).await?;
                Ok::<_, Fault>((t1, t2))
            })
            .unwrap();

        assert!(t1.is_completed(), "seed {seed}");
        assert!(t2.is_completed(), "seed {seed}");
        assert!(runtime.unfinished().is_empty());
    }
}

#[test]
fn test_empty_when_any_faults() {
    init_test_logging();
    let runtime = Runtime::default();
    runtime
        .block_on(|ctx| async move {
            let node = ctx.when_any(Vec::<ControlledTask<i32>>::new());
            let fault = node.join().await.unwrap_err();
            assert!(matches!(
                fault.downcast_ref::<Error>(),
                Some(Error::EmptyCombinator)
            ));
            assert!(node.is_faulted());
            Ok::<_, Fault>(())
        })
        .unwrap();
}

#[test]
fn test_foreign_handle_is_rejected() {
    init_test_logging();
    let first = Runtime::default();
    let foreign = first
        .block_on(|ctx| async move { Ok::<_, Fault>(ctx.from_result(1)) })
        .unwrap();

    let second = Runtime::default();
    second
        .block_on(move |ctx| async move {
            let fault = ctx.when_any([foreign]).await.unwrap_err();
            assert!(matches!(
                fault.downcast_ref::<Error>(),
                Some(Error::UnknownOperation(_))
            ));
            Ok::<_, Fault>(())
        })
        .unwrap();
}
