use std::path::PathBuf;
use std::time::{Duration, Instant};

use itertools::Itertools;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::reporter::Reporter;

/// Minimum interval between progress events during sequential processing.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(60);

/// Worker-pool sizing for the session-parallel import stage.
///
/// `All` sizes the pool to the machine; `Fixed(1)` runs fully sequentially
/// with periodic progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Workers {
    All,
    Fixed(usize),
}

impl Default for Workers {
    fn default() -> Self {
        Workers::All
    }
}

/// Coerces path-like input into a canonical ordered path sequence.
pub fn fix_paths<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    paths.into_iter().map(Into::into).collect()
}

/// Fails with the first missing path, before any processing begins.
pub fn check_paths_exist(paths: &[PathBuf]) -> Result<(), ImportError> {
    for path in paths {
        if !path.exists() {
            return Err(ImportError::MissingPath(path.clone()));
        }
    }
    Ok(())
}

/// Remaps arbitrary integer labels onto a dense zero-based label space,
/// preserving the order of the distinct values.
pub fn squeeze_labels(labels: &[i64]) -> Vec<i64> {
    let ranks: std::collections::BTreeMap<i64, i64> = labels
        .iter()
        .copied()
        .unique()
        .sorted()
        .enumerate()
        .map(|(rank, value)| (value, rank as i64))
        .collect();
    labels.iter().map(|value| ranks[value]).collect()
}

/// Order-preserving parallel map over independent per-session tasks.
///
/// One task per item, no shared mutable state between tasks; results are
/// re-assembled by input index regardless of completion order. The first
/// task error aborts the whole map. `Workers::Fixed(1)` processes items
/// sequentially and emits progress through `reporter` at most once per
/// `PROGRESS_INTERVAL`.
pub fn parallel_map<T, U, F>(
    items: &[T],
    workers: Workers,
    reporter: &dyn Reporter,
    task: F,
) -> Result<Vec<U>, ImportError>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> Result<U, ImportError> + Sync + Send,
{
    match workers {
        Workers::Fixed(1) => {
            let mut results = Vec::with_capacity(items.len());
            let mut last_report = Instant::now();
            for (index, item) in items.iter().enumerate() {
                results.push(task(index, item)?);
                if last_report.elapsed() >= PROGRESS_INTERVAL {
                    reporter.progress(index + 1, items.len());
                    last_report = Instant::now();
                }
            }
            Ok(results)
        }
        _ => {
            let mut builder = ThreadPoolBuilder::new();
            if let Workers::Fixed(threads) = workers {
                builder = builder.num_threads(threads);
            }
            let pool = builder
                .build()
                .map_err(|e| ImportError::ThreadPool(e.to_string()))?;
            pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .map(|(index, item)| task(index, item))
                    .collect()
            })
        }
    }
}
