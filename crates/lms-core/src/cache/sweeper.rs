//! Background expiry sweep

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

/// State that can drop its expired entries
pub(crate) trait Sweep: Send + Sync + 'static {
    fn sweep(&self) -> usize;
}

/// Spawn a task that sweeps `target` every `every` until the target is gone.
///
/// The task only holds a weak reference. Returns `None` when called
/// outside a tokio runtime; expiry is then purely lazy.
pub(crate) fn spawn_sweeper<S: Sweep>(
    cache: &str,
    target: Weak<S>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            warn!(
                "No tokio runtime available, cache {} will only expire entries on access",
                cache
            );
            return None;
        }
    };

    debug!("Starting sweep for cache {} (interval: {:?})", cache, every);
    let cache = cache.to_string();

    Some(handle.spawn(async move {
        let mut ticker = interval(every);

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(target) = target.upgrade() else {
                debug!("Cache {} dropped, stopping sweep", cache);
                break;
            };

            let removed = target.sweep();
            if removed > 0 {
                debug!("Swept {} expired entries from cache {}", removed, cache);
            }
        }
    }))
}
