//! Browsing-target resolution and exclusive locking
//!
//! A run executes against one browsing target (a tab, or the currently
//! active tab). The lock is exclusive: only the active run may hold it, and
//! it is released on every exit path via the guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Identifier of a browsing target
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(String);

impl TargetId {
    /// Target for a specific tab
    pub fn tab(tab_id: u64) -> Self {
        Self(format!("tab-{tab_id}"))
    }

    /// The user's currently active tab
    pub fn active() -> Self {
        Self("active-tab".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure to acquire a browsing target
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target {target} is locked by run {holder}")]
    Locked { target: TargetId, holder: String },
}

/// Tracks which runs hold which browsing targets
#[derive(Clone, Default)]
pub struct TargetRegistry {
    locked: Arc<Mutex<HashMap<TargetId, String>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the target a run should execute against
    ///
    /// The first scoped tab wins; without tab scoping the run targets the
    /// active tab.
    pub fn resolve(&self, tab_ids: Option<&[u64]>) -> TargetId {
        let target = match tab_ids.and_then(|ids| ids.first()) {
            Some(tab_id) => TargetId::tab(*tab_id),
            None => TargetId::active(),
        };
        debug!(%target, "TargetRegistry::resolve");
        target
    }

    /// Acquire the exclusive lock on `target` for `run_id`
    pub fn lock(&self, target: TargetId, run_id: &str) -> Result<TargetGuard, TargetError> {
        let mut locked = self.locked.lock().unwrap();
        if let Some(holder) = locked.get(&target) {
            debug!(%target, %holder, "TargetRegistry::lock: already held");
            return Err(TargetError::Locked {
                target,
                holder: holder.clone(),
            });
        }
        debug!(%target, %run_id, "TargetRegistry::lock: acquired");
        locked.insert(target.clone(), run_id.to_string());
        Ok(TargetGuard {
            registry: self.locked.clone(),
            target,
        })
    }

    /// Whether `target` is currently held
    pub fn is_locked(&self, target: &TargetId) -> bool {
        self.locked.lock().unwrap().contains_key(target)
    }

    /// The run currently holding `target`, if any
    pub fn holder(&self, target: &TargetId) -> Option<String> {
        self.locked.lock().unwrap().get(target).cloned()
    }
}

/// Exclusive hold on one browsing target; releases on drop
pub struct TargetGuard {
    registry: Arc<Mutex<HashMap<TargetId, String>>>,
    target: TargetId,
}

impl TargetGuard {
    pub fn target(&self) -> &TargetId {
        &self.target
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        debug!(target = %self.target, "TargetGuard: released");
        self.registry.lock().unwrap().remove(&self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_scoped_tab() {
        let registry = TargetRegistry::new();
        assert_eq!(registry.resolve(Some(&[42, 43])), TargetId::tab(42));
        assert_eq!(registry.resolve(Some(&[])), TargetId::active());
        assert_eq!(registry.resolve(None), TargetId::active());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let registry = TargetRegistry::new();
        let target = TargetId::tab(7);

        let guard = registry.lock(target.clone(), "run-1").unwrap();
        assert!(registry.is_locked(&target));
        assert_eq!(registry.holder(&target), Some("run-1".to_string()));

        match registry.lock(target.clone(), "run-2") {
            Err(TargetError::Locked { holder, .. }) => assert_eq!(holder, "run-1"),
            Ok(_) => panic!("second lock must fail"),
        }

        drop(guard);
        assert!(!registry.is_locked(&target));
        let _guard = registry.lock(target.clone(), "run-2").unwrap();
        assert_eq!(registry.holder(&target), Some("run-2".to_string()));
    }

    #[test]
    fn test_distinct_targets_lock_independently() {
        let registry = TargetRegistry::new();
        let _a = registry.lock(TargetId::tab(1), "run-1").unwrap();
        let _b = registry.lock(TargetId::tab(2), "run-2").unwrap();
        assert!(registry.is_locked(&TargetId::tab(1)));
        assert!(registry.is_locked(&TargetId::tab(2)));
    }
}
