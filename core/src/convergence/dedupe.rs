//! Start dedupe memory: containers a start has already been requested for.
//!
//! This is the only state that outlives a planning pass. The caller owns it:
//! the engine records starts, and the caller clears entries once a container
//! is confirmed started or removed.

use std::collections::HashSet;

use crate::types::service::RestartPolicy;

pub trait StartDedupe {
    fn has(&self, container_id: &str) -> bool;

    fn set(&mut self, container_id: &str);

    fn clear(&mut self, container_id: &str);

    /// Called once the engine reports the container running. Entries for
    /// `restart: no` containers are kept so an exited container is never
    /// started again.
    fn confirm_started(&mut self, container_id: &str, restart: RestartPolicy) {
        if restart != RestartPolicy::No {
            self.clear(container_id);
        }
    }
}

/// Process-local dedupe memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStartDedupe {
    started: HashSet<String>,
}

impl InMemoryStartDedupe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.started.len()
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }
}

impl StartDedupe for InMemoryStartDedupe {
    fn has(&self, container_id: &str) -> bool {
        self.started.contains(container_id)
    }

    fn set(&mut self, container_id: &str) {
        self.started.insert(container_id.to_string());
    }

    fn clear(&mut self, container_id: &str) {
        self.started.remove(container_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_has_clear() {
        let mut dedupe = InMemoryStartDedupe::new();
        assert!(!dedupe.has("abc"));
        dedupe.set("abc");
        assert!(dedupe.has("abc"));
        assert_eq!(dedupe.len(), 1);
        dedupe.clear("abc");
        assert!(dedupe.is_empty());
    }

    #[test]
    fn confirm_keeps_restart_no_entries() {
        let mut dedupe = InMemoryStartDedupe::new();
        dedupe.set("once");
        dedupe.set("always");
        dedupe.confirm_started("once", RestartPolicy::No);
        dedupe.confirm_started("always", RestartPolicy::Always);
        assert!(dedupe.has("once"));
        assert!(!dedupe.has("always"));
    }

    #[test]
    fn usable_as_trait_object() {
        let mut dedupe = InMemoryStartDedupe::new();
        let memory: &mut dyn StartDedupe = &mut dedupe;
        memory.set("x");
        assert!(memory.has("x"));
        memory.confirm_started("x", RestartPolicy::OnFailure);
        assert!(!memory.has("x"));
    }
}
