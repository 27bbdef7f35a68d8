//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Once;

use testkit_controlled::{Config, Context, Fault, Runtime};

static INIT_LOGGING: Once = Once::new();

/// Seeds explored by tests that sweep several schedules.
pub const SEEDS: std::ops::Range<u64> = 0..64;

/// Initialize test logging once per test binary.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Runs `f` once per seed in [`SEEDS`] and collects the results.
pub fn for_each_seed<F, Fut, T>(f: F) -> Vec<T>
where
    F: Fn(Context) -> Fut,
    Fut: Future<Output = Result<T, Fault>> + Send + 'static,
    T: Send + 'static,
{
    init_test_logging();
    SEEDS
        .map(|seed| {
            let runtime = Runtime::new(Config::default().with_seed(seed));
            match runtime.block_on(&f) {
                Ok(value) => value,
                Err(e) => panic!("seed {seed} failed: {e}"),
            }
        })
        .collect()
}
