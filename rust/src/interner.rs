//! Worker ID interning.
//!
//! Converts string worker IDs to dense integer indices so schedules can store
//! compact slots and per-worker tables can be plain vectors.

use rustc_hash::FxHashMap;

/// Interned worker index (u32 for compact slot storage).
pub type WorkerIdx = u32;

/// Bidirectional map between worker ID strings and dense indices.
///
/// Indices are handed out in insertion order, so the index of a worker equals
/// its position in the configured worker list.
#[derive(Debug, Clone)]
pub struct WorkerInterner {
    to_int: FxHashMap<String, WorkerIdx>,
    from_int: Vec<String>,
}

impl WorkerInterner {
    /// Create a new interner with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_int: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_int: Vec::with_capacity(capacity),
        }
    }

    /// Intern an ID, returning its index and whether it was newly added.
    pub fn intern(&mut self, id: &str) -> (WorkerIdx, bool) {
        if let Some(&idx) = self.to_int.get(id) {
            return (idx, false);
        }
        let idx = self.from_int.len() as WorkerIdx;
        self.from_int.push(id.to_string());
        self.to_int.insert(id.to_string(), idx);
        (idx, true)
    }

    /// Get the index for an ID, if it exists.
    #[inline]
    pub fn get(&self, id: &str) -> Option<WorkerIdx> {
        self.to_int.get(id).copied()
    }

    /// Get the ID for an index.
    #[inline]
    pub fn resolve(&self, idx: WorkerIdx) -> Option<&str> {
        self.from_int.get(idx as usize).map(|s| s.as_str())
    }

    /// Number of interned workers.
    pub fn len(&self) -> usize {
        self.from_int.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_int.is_empty()
    }
}

impl Default for WorkerInterner {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_resolve() {
        let mut interner = WorkerInterner::with_capacity(4);

        let (a, new_a) = interner.intern("ana");
        let (b, new_b) = interner.intern("bruno");
        let (a_again, new_again) = interner.intern("ana");

        assert!(new_a && new_b);
        assert!(!new_again);
        assert_eq!(a, a_again);
        assert_eq!((a, b), (0, 1));

        assert_eq!(interner.resolve(b), Some("bruno"));
        assert_eq!(interner.get("ana"), Some(a));
        assert_eq!(interner.get("carla"), None);
        assert_eq!(interner.resolve(7), None);
        assert_eq!(interner.len(), 2);
    }
}
