//! Background purge of expired and terminal selection sessions

use devforge_core::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Spawn a task that calls [`SessionStore::sweep`] every `interval`.
/// The task ends when the returned handle is aborted.
pub fn spawn_sweeper(sessions: Arc<SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = sessions.sweep();
            trace!(purged, "Session sweep");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use devforge_core::{resolver::resolve_static, validate, ActionRequest, PlatformTarget};

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_stale_sessions() {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(10), 8));
        let request = validate(&ActionRequest::new("install").with_tool("java")).unwrap();
        let candidates = resolve_static("java", "latest", PlatformTarget::LinuxDebian)
            .candidates()
            .into_iter()
            .cloned()
            .collect();
        let id = sessions.open("caller", candidates, request);

        let handle = spawn_sweeper(sessions.clone(), Duration::from_secs(5));
        // Expiry after 10s, tombstone purge after another 10s
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(sessions.get(&id).is_none());
        handle.abort();
    }
}
