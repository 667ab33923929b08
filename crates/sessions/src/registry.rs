use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use {tracing::debug, uuid::Uuid};

/// In-memory session registry keyed by conversation.
///
/// All mutation for a given chat happens inside that chat's dispatcher slot,
/// so the mutex only protects the map itself; it is never held across an
/// `.await`. Read-only inspection (e.g. `/status`) may observe a value that is
/// replaced a moment later.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current token for a chat, if any.
    pub fn get(&self, chat_id: &str) -> Option<String> {
        self.map().get(chat_id).cloned()
    }

    pub fn has(&self, chat_id: &str) -> bool {
        self.map().contains_key(chat_id)
    }

    /// Issue a fresh token for a chat, replacing any existing one.
    pub fn create(&self, chat_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let previous = self.map().insert(chat_id.to_string(), token.clone());
        debug!(chat_id, token, replaced = previous.is_some(), "session created");
        token
    }

    /// Existing token (resume) or a freshly created one (start).
    ///
    /// Returns `(token, is_resume)`.
    pub fn resolve(&self, chat_id: &str) -> (String, bool) {
        let mut map = self.map();
        if let Some(token) = map.get(chat_id) {
            return (token.clone(), true);
        }
        let token = Uuid::new_v4().to_string();
        map.insert(chat_id.to_string(), token.clone());
        debug!(chat_id, token, "session started");
        (token, false)
    }

    /// Forget a chat's token. Returns whether one existed.
    pub fn reset(&self, chat_id: &str) -> bool {
        let removed = self.map().remove(chat_id).is_some();
        if removed {
            debug!(chat_id, "session reset");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashSet};

    #[test]
    fn absent_by_default() {
        let reg = SessionRegistry::new();
        assert!(!reg.has("a"));
        assert_eq!(reg.get("a"), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn get_returns_created_token_until_reset() {
        let reg = SessionRegistry::new();
        let token = reg.create("a");
        assert_eq!(reg.get("a").as_deref(), Some(token.as_str()));
        assert_eq!(reg.get("a").as_deref(), Some(token.as_str()));
        assert!(reg.reset("a"));
        assert!(!reg.has("a"));
        assert_eq!(reg.get("a"), None);
    }

    #[test]
    fn tokens_are_unique_across_keys_and_recreation() {
        let reg = SessionRegistry::new();
        let mut seen = HashSet::new();
        for key in ["a", "b", "c"] {
            for _ in 0..10 {
                assert!(seen.insert(reg.create(key)));
            }
        }
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn create_after_reset_is_fresh() {
        let reg = SessionRegistry::new();
        let first = reg.create("a");
        reg.reset("a");
        let second = reg.create("a");
        assert_ne!(first, second);
        assert!(reg.has("a"));
    }

    #[test]
    fn reset_is_idempotent() {
        let reg = SessionRegistry::new();
        assert!(!reg.reset("nobody"));
        reg.create("a");
        assert!(reg.reset("a"));
        assert!(!reg.reset("a"));
    }

    #[test]
    fn resolve_starts_then_resumes() {
        let reg = SessionRegistry::new();
        let (token, resume) = reg.resolve("a");
        assert!(!resume);
        let (again, resume) = reg.resolve("a");
        assert!(resume);
        assert_eq!(token, again);
        assert!(Uuid::parse_str(&token).is_ok());
    }

    #[test]
    fn keys_are_independent() {
        let reg = SessionRegistry::new();
        let a = reg.create("a");
        let b = reg.create("b");
        reg.reset("a");
        assert_eq!(reg.get("b"), Some(b));
        assert_ne!(reg.get("a"), Some(a));
    }
}
