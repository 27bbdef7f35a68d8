//! Example: reproducing a failing schedule
//!
//! Searches seeds for an interleaving that loses an update, then replays the
//! recorded decision trace to hit the same bug again.

use std::sync::Arc;

use parking_lot::Mutex;
use testkit_controlled::prelude::*;

/// Two operations doing a read-modify-write with a scheduling point in the
/// middle. Returns the final counter.
fn lost_update(runtime: &Runtime) -> Result<u32> {
    let counter = Arc::new(Mutex::new(0_u32));
    let shared = Arc::clone(&counter);
    runtime.block_on(move |ctx| async move {
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let inner = ctx.clone();
                let counter = Arc::clone(&shared);
                ctx.spawn(async move {
                    let read = *counter.lock();
                    inner.yield_now().await;
                    *counter.lock() = read + 1;
                })
            })
            .collect();
        ctx.when_all(workers).await?;
        let value = *shared.lock();
        Ok::<_, Fault>(value)
    })
}

fn main() {
    println!("🧰 testkit-controlled - Replaying a schedule\n");

    let mut failing = None;
    for seed in 0..100 {
        let runtime = Runtime::new(Config::default().with_seed(seed));
        let value = lost_update(&runtime).unwrap();
        if value != 2 {
            println!("   seed {seed}: counter = {value} (lost update)");
            failing = Some(runtime.trace());
            break;
        }
    }

    let Some(trace) = failing else {
        println!("   no seed lost an update");
        return;
    };

    println!("   recorded {} decision(s):", trace.len());
    for decision in trace.iter() {
        println!("     {decision:?}");
    }

    let replay = Runtime::new(Config::default().with_policy(SchedulingPolicy::Replay(trace)));
    let value = lost_update(&replay).unwrap();
    println!("\n   replayed counter = {value}");

    println!("\n✅ Replay completed!");
}
