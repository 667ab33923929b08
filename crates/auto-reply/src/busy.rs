//! Echo suppression.
//!
//! While a conversation is being serviced, and for a short grace period after
//! the bridge last wrote to it, inbound events for that conversation are
//! ignored. This keeps the bridge from answering its own replies when the
//! transport reports them back (self-chat, multi-device echoes).

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

/// Key -> release deadline. `None` means busy until further notice.
#[derive(Debug, Default)]
pub struct BusyGuard {
    entries: Mutex<HashMap<String, Option<Instant>>>,
}

impl BusyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Busy until a release is scheduled. Cancels any pending release.
    pub fn mark_busy(&self, key: &str) {
        self.lock().insert(key.to_string(), None);
    }

    /// Stay busy for `delay` from now, then become free.
    pub fn release_after(&self, key: &str, delay: Duration) {
        self.lock()
            .insert(key.to_string(), Some(Instant::now() + delay));
    }

    pub fn release_now(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn is_busy(&self, key: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(key) {
            None => false,
            Some(None) => true,
            Some(Some(deadline)) if *deadline > Instant::now() => true,
            Some(Some(_)) => {
                entries.remove(key);
                false
            },
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<Instant>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn busy_until_grace_expires() {
        let guard = BusyGuard::new();
        assert!(!guard.is_busy("chat"));

        guard.mark_busy("chat");
        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(guard.is_busy("chat"));

        guard.release_after("chat", GRACE);
        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(guard.is_busy("chat"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!guard.is_busy("chat"));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_during_cooldown_cancels_release() {
        let guard = BusyGuard::new();
        guard.mark_busy("chat");
        guard.release_after("chat", GRACE);
        tokio::time::advance(Duration::from_secs(1)).await;

        guard.mark_busy("chat");
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(guard.is_busy("chat"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent_and_release_is_idempotent() {
        let guard = BusyGuard::new();
        guard.mark_busy("a");
        assert!(!guard.is_busy("b"));

        guard.release_now("a");
        guard.release_now("a");
        assert!(!guard.is_busy("a"));

        guard.release_after("b", GRACE);
        tokio::time::advance(GRACE).await;
        assert!(!guard.is_busy("b"));
        assert!(!guard.is_busy("b"));
    }
}
