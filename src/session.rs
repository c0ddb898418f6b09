//! The process-wide table of short-lived approval tokens.
//!
//! This is the only mutable shared state in the core (§5 of the design doc
//! it is built from). It is guarded by a single `Mutex` and critical
//! sections never call out to user prompts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::calling_context::CallingContext;

/// Which gate a cached approval stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Entering the vault PIN recently — stands in for a biometric check.
    Pin,
    /// Approving an SSH/Git signing request — short-circuits the whole
    /// approval pipeline for the TTL window.
    Ssh,
}

/// Per-kind time-to-live constants.
pub const PIN_TTL: Duration = Duration::from_secs(60 * 5);
pub const SSH_TTL: Duration = Duration::from_secs(60 * 60 * 8);

impl SessionKind {
    fn ttl(self) -> Duration {
        match self {
            SessionKind::Pin => PIN_TTL,
            SessionKind::Ssh => SSH_TTL,
        }
    }
}

/// An explicit, `Arc`-shareable handle to the session table.
#[derive(Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<(CallingContext, SessionKind), Instant>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the entry for `(ctx, kind)` with `now + TTL(kind)`.
    pub fn create(&self, ctx: &CallingContext, kind: SessionKind) {
        self.create_with_ttl(ctx, kind, kind.ttl());
    }

    /// Insert or refresh the entry for `(ctx, kind)` with `now + ttl`,
    /// overriding the kind's own TTL constant. Used to seed a Pin session
    /// with `SSH_TTL` after a vault unlock (§4.4), rather than the shorter
    /// `PIN_TTL` a plain `create` would apply.
    pub fn create_with_ttl(&self, ctx: &CallingContext, kind: SessionKind, ttl: Duration) {
        let expiry = Instant::now() + ttl;
        let mut entries = self.entries.lock().unwrap();
        entries.insert((ctx.clone(), kind), expiry);
    }

    /// True iff an entry for `(ctx, kind)` exists and has not expired.
    /// Expired entries are left in place for the next writer to overwrite;
    /// callers must not rely on `verify` pruning the table.
    pub fn verify(&self, ctx: &CallingContext, kind: SessionKind) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(&(ctx.clone(), kind)) {
            Some(expiry) => Instant::now() < *expiry,
            None => false,
        }
    }

    /// Alias for [`Self::verify`], kept distinct for read-legibility at call
    /// sites that are phrased as a question rather than an assertion.
    pub fn get(&self, ctx: &CallingContext, kind: SessionKind) -> bool {
        self.verify(ctx, kind)
    }

    /// Exposes the raw expiry for an entry, for tests elsewhere in the crate
    /// that need to assert *which* TTL a session was seeded with rather than
    /// just whether it currently verifies.
    #[cfg(test)]
    pub fn expiry_for_test(&self, ctx: &CallingContext, kind: SessionKind) -> Option<Instant> {
        self.entries.lock().unwrap().get(&(ctx.clone(), kind)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &str) -> CallingContext {
        CallingContext::unresolved(name)
    }

    #[test]
    fn verify_is_false_before_create() {
        let cache = SessionCache::new();
        assert!(!cache.verify(&ctx("alice"), SessionKind::Ssh));
    }

    #[test]
    fn create_then_verify_succeeds() {
        let cache = SessionCache::new();
        let a = ctx("alice");
        cache.create(&a, SessionKind::Ssh);
        assert!(cache.verify(&a, SessionKind::Ssh));
        assert!(cache.get(&a, SessionKind::Ssh));
    }

    #[test]
    fn sessions_are_scoped_to_calling_context() {
        let cache = SessionCache::new();
        let a = ctx("alice");
        let mut b = a.clone();
        b.process_name = "different-shell".to_string();

        cache.create(&a, SessionKind::Ssh);
        assert!(cache.verify(&a, SessionKind::Ssh));
        assert!(!cache.verify(&b, SessionKind::Ssh));
    }

    #[test]
    fn create_with_ttl_overrides_the_kind_default() {
        let cache = SessionCache::new();
        let a = ctx("alice");
        cache.create_with_ttl(&a, SessionKind::Pin, SSH_TTL);

        let entries = cache.entries.lock().unwrap();
        let expiry = *entries.get(&(a.clone(), SessionKind::Pin)).unwrap();
        drop(entries);

        // A plain `create(.., Pin)` would stamp `now + PIN_TTL`; the
        // override must land well past that.
        assert!(expiry > Instant::now() + PIN_TTL);
        assert!(cache.verify(&a, SessionKind::Pin));
    }

    #[test]
    fn kinds_do_not_cross_satisfy() {
        let cache = SessionCache::new();
        let a = ctx("alice");
        cache.create(&a, SessionKind::Pin);
        assert!(cache.verify(&a, SessionKind::Pin));
        assert!(!cache.verify(&a, SessionKind::Ssh));
    }

    #[test]
    fn expired_entry_does_not_verify() {
        let cache = SessionCache::new();
        let a = ctx("alice");
        // Insert an already-expired entry directly to avoid sleeping in tests.
        let mut entries = cache.entries.lock().unwrap();
        entries.insert(
            (a.clone(), SessionKind::Ssh),
            Instant::now() - Duration::from_secs(1),
        );
        drop(entries);

        assert!(!cache.verify(&a, SessionKind::Ssh));
    }
}
