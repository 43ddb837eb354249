//! Per-message transactional scope.
//!
//! A [`TransactionScope`] is created by the host for each inbound message.
//! Anything resolved while handling that message registers a release hook
//! with [`TransactionScope::on_disposed`]. The hooks fire exactly once when
//! the scope ends, whether it completed, aborted, or was simply dropped.
//!
//! # Example
//!
//! ```
//! use procwire_activation::scope::{ScopeOutcome, TransactionScope};
//!
//! let scope = TransactionScope::new();
//! scope.on_disposed(|outcome| assert_eq!(outcome, ScopeOutcome::Completed));
//! scope.complete();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Hook fired when a scope ends.
type DisposalHook = Box<dyn FnOnce(ScopeOutcome) + Send>;

/// How a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    /// Message processing succeeded.
    Completed,
    /// Message processing failed or was cancelled.
    Aborted,
    /// The scope was dropped without an explicit outcome.
    Abandoned,
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct ScopeState {
    hooks: Vec<DisposalHook>,
    outcome: Option<ScopeOutcome>,
}

/// Lifetime boundary for one inbound message.
///
/// `TransactionScope` is `Send + Sync`; hooks may be registered from any
/// task that holds a reference.
pub struct TransactionScope {
    id: u64,
    state: Mutex<ScopeState>,
}

impl TransactionScope {
    /// Create a new, open scope.
    pub fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(ScopeState {
                hooks: Vec::new(),
                outcome: None,
            }),
        }
    }

    /// Process-unique scope ID, for logging.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register a hook to fire when the scope ends.
    ///
    /// Hooks registered after the scope has ended fire immediately with the
    /// recorded outcome. Firing order among hooks is not guaranteed.
    pub fn on_disposed<F>(&self, hook: F)
    where
        F: FnOnce(ScopeOutcome) + Send + 'static,
    {
        let mut state = self.lock();
        let ended = state.outcome;
        match ended {
            Some(outcome) => {
                drop(state);
                tracing::warn!("Hook registered on ended scope {}; firing now", self.id);
                hook(outcome);
            }
            None => state.hooks.push(Box::new(hook)),
        }
    }

    /// Number of hooks waiting to fire.
    pub fn pending_hooks(&self) -> usize {
        self.lock().hooks.len()
    }

    /// Outcome of the scope, once it has ended.
    pub fn outcome(&self) -> Option<ScopeOutcome> {
        self.lock().outcome
    }

    /// Whether the scope has ended.
    pub fn is_disposed(&self) -> bool {
        self.outcome().is_some()
    }

    /// End the scope successfully.
    pub fn complete(&self) {
        self.end(ScopeOutcome::Completed);
    }

    /// End the scope after a failure or cancellation.
    pub fn abort(&self) {
        self.end(ScopeOutcome::Aborted);
    }

    /// End the scope and fire all hooks. Only the first call has any effect.
    ///
    /// Returns `false` if the scope had already ended.
    pub fn end(&self, outcome: ScopeOutcome) -> bool {
        let hooks = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            std::mem::take(&mut state.hooks)
        };

        tracing::trace!(
            "Scope {} ended ({:?}), firing {} hooks",
            self.id,
            outcome,
            hooks.len()
        );
        for hook in hooks {
            hook(outcome);
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TransactionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.end(ScopeOutcome::Abandoned);
    }
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("id", &self.id)
            .field("outcome", &self.outcome())
            .field("pending_hooks", &self.pending_hooks())
            .finish()
    }
}
