use rustc_hash::FxHashMap;
use std::fmt;

use super::entry::Entry;

/// Stable identifier the loader assigns to each loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Association from loaded modules to their entries.
///
/// Ids are never reused, so a stale id after [`unload`](Self::unload) simply
/// misses instead of aliasing a newer module.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    entries: FxHashMap<ModuleId, Entry>,
    next_id: u32,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: Entry) -> ModuleId {
        let id = ModuleId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    pub fn get(&self, id: ModuleId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    /// Remove a module's entry, returning it
    pub fn unload(&mut self, id: ModuleId) -> Option<Entry> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{PackageCache, PackageOptions};
    use crate::loader::ModuleKind;

    fn entry(key: &str) -> Entry {
        Entry::new(
            key,
            "_t",
            ModuleKind::Cjs,
            PackageCache::in_memory(PackageOptions::default()).into_ref(),
        )
    }

    #[test]
    fn test_register_and_unload() {
        let mut registry = EntryRegistry::new();
        let a = registry.register(entry("a"));
        let b = registry.register(entry("b"));

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().cache_key, "a");

        let removed = registry.unload(a).unwrap();
        assert_eq!(removed.cache_key, "a");
        assert!(!registry.contains(a));
        assert!(registry.get(a).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut registry = EntryRegistry::new();
        let a = registry.register(entry("a"));
        registry.unload(a);
        let b = registry.register(entry("b"));

        assert_ne!(a, b);
        assert!(registry.get(a).is_none());
        assert_eq!(b.to_string(), "#1");
    }
}
