use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

pub fn run_in_pool<T, F>(cores: usize, context: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(cores)
        .build()
        .context(context)?;
    Ok(pool.install(f))
}

pub fn resolve_threads(cores: usize, tasks: usize) -> usize {
    let capped = cores.clamp(1, tasks.max(1));
    if cores > capped {
        tracing::warn!(
            "Requested threads ({cores}) exceed the number of tasks ({tasks}); using {capped}"
        );
    }
    capped
}

/// Maps `f` over `items`, on a dedicated pool when `cores` is set. Output
/// order always matches input order.
pub fn map_ordered<I, T, F>(items: &[I], cores: Option<usize>, f: F) -> Result<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    match cores {
        Some(cores) if cores > 1 && items.len() > 1 => {
            let threads = resolve_threads(cores, items.len());
            run_in_pool(threads, "build gene worker pool", || {
                items.par_iter().map(&f).collect()
            })
        }
        _ => Ok(items.iter().map(f).collect()),
    }
}
