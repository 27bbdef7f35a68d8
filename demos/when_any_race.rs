//! Example: exploring a `when_any` race
//!
//! Runs the same racy program under many seeds and shows that both inputs
//! can win, that the winner always carries its own value, and that a fault
//! from the winner comes back untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use testkit_controlled::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("invalid operation")]
struct InvalidOperation;

fn main() {
    println!("🧰 testkit-controlled - WhenAny races\n");

    example_winner_distribution();
    example_virtual_time();
    example_faulted_winner();

    println!("\n✅ All when_any examples completed!");
}

/// Count which input wins across seeds
fn example_winner_distribution() {
    println!("📌 Example 1: Winner distribution over 100 seeds\n");

    let mut wins: BTreeMap<i32, usize> = BTreeMap::new();
    for seed in 0..100 {
        let runtime = Runtime::new(Config::default().with_seed(seed));
        let value = runtime
            .block_on(|ctx| async move {
                let inner = ctx.clone();
                let t1 = ctx.spawn(async move {
                    inner.delay(Duration::from_millis(5)).await;
                    5
                });
                let t2 = ctx.spawn(async { 3 });
                let winner = ctx.when_any([t1, t2]).await?;
                winner.result().map_err(Fault::new)
            })
            .unwrap();
        *wins.entry(value).or_default() += 1;
    }

    for (value, count) in &wins {
        println!("   value {value} won {count} time(s)");
    }
    println!();
}

/// Delays resolve in virtual time order
fn example_virtual_time() {
    println!("📌 Example 2: Virtual time decides the race\n");

    let config = Config::default().with_delay_policy(DelayPolicy::VirtualTime);
    let runtime = Runtime::new(config);
    let (winner, now) = runtime
        .block_on(|ctx| async move {
            let slow_ctx = ctx.clone();
            let slow = ctx.spawn_named("slow", async move {
                slow_ctx.delay(Duration::from_secs(30)).await;
                "slow"
            });
            let fast_ctx = ctx.clone();
            let fast = ctx.spawn_named("fast", async move {
                fast_ctx.delay(Duration::from_secs(1)).await;
                "fast"
            });
            let winner = ctx.when_any([slow, fast]).await?;
            Ok::<_, Fault>((winner.result()?, ctx.now()))
        })
        .unwrap();

    println!("   winner: {winner}");
    println!("   virtual time at the end of the entry: {now:?}");
    println!("   scheduling steps: {}", runtime.steps());
    println!();
}

/// The winner's fault is returned as is
fn example_faulted_winner() {
    println!("📌 Example 3: Faulted winner\n");

    let runtime = Runtime::default();
    runtime
        .block_on(|ctx| async move {
            let failed: ControlledTask<()> = ctx.from_fault(InvalidOperation);
            let pending = ctx.spawn(async {});

            match ctx.when_any([failed.clone(), pending]).await {
                Ok(_) => println!("   unexpected success"),
                Err(fault) => {
                    println!("   when_any faulted: {fault}");
                    println!("   same cause as the input: {}", fault.same_cause(&failed.fault()?));
                    println!("   is InvalidOperation: {}", fault.is::<InvalidOperation>());
                }
            }
            Ok::<_, Fault>(())
        })
        .unwrap();
    println!();
}
