//! Process-wide registry of probe points, keyed by name.

use std::sync::Arc;

use dashmap::DashMap;

use faultprobe_core::error::{FaultError, Result};
use faultprobe_core::PolicyState;

#[derive(Default)]
pub struct ProbeRegistry {
    probes: DashMap<String, Arc<PolicyState>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self {
            probes: DashMap::new(),
        }
    }

    /// Expose `policy` under its own name. A name that is already taken is
    /// reported as `Unavailable`; the policy itself keeps working.
    pub fn register(&self, policy: Arc<PolicyState>) -> Result<()> {
        let name = policy.name().to_string();
        if name.is_empty() || name.contains('/') {
            return Err(FaultError::Unavailable(format!(
                "probe name {name:?} cannot be exposed"
            )));
        }
        match self.probes.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(FaultError::Unavailable(format!(
                "probe {} already registered",
                e.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(policy);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<PolicyState>> {
        self.probes.remove(name).map(|(_, p)| p)
    }

    pub fn get(&self, name: &str) -> Result<Arc<PolicyState>> {
        self.probes
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| FaultError::UnknownProbe(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.probes.iter().map(|e| e.key().clone()).collect();
        v.sort();
        v
    }

    /// Registered probes, sorted by name.
    pub fn probes(&self) -> Vec<Arc<PolicyState>> {
        let mut v: Vec<Arc<PolicyState>> =
            self.probes.iter().map(|e| Arc::clone(e.value())).collect();
        v.sort_by(|a, b| a.name().cmp(b.name()));
        v
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultprobe_core::error::ErrorCode;

    #[test]
    fn duplicate_name_is_unavailable() {
        let r = ProbeRegistry::new();
        r.register(Arc::new(PolicyState::new("a"))).unwrap();
        let e = r.register(Arc::new(PolicyState::new("a"))).unwrap_err();
        assert_eq!(e.code(), ErrorCode::Unavailable);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn lookup_and_unregister() {
        let r = ProbeRegistry::new();
        let p = Arc::new(PolicyState::new("b"));
        r.register(Arc::clone(&p)).unwrap();
        r.register(Arc::new(PolicyState::new("a"))).unwrap();
        assert_eq!(r.names(), ["a", "b"]);
        assert!(Arc::ptr_eq(&r.get("b").unwrap(), &p));

        assert!(r.unregister("b").is_some());
        assert_eq!(r.get("b").unwrap_err().code(), ErrorCode::UnknownProbe);
    }

    #[test]
    fn unnamed_policy_cannot_be_exposed() {
        let r = ProbeRegistry::new();
        assert!(r.register(Arc::new(PolicyState::default())).is_err());
        assert!(r.is_empty());
    }
}
