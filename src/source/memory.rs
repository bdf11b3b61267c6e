//! In-memory object source.

use hashbrown::HashMap;

use crate::model::{ApplicationId, RawObject};
use crate::Result;
use super::ObjectSource;

/// Raw objects keyed by application id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    objects: HashMap<ApplicationId, RawObject>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object. Returns false (and keeps the existing one) when the id
    /// is already taken.
    pub fn insert(&mut self, object: RawObject) -> bool {
        if self.objects.contains_key(object.id()) {
            tracing::warn!(id = %object.id(), "duplicate application id, keeping first");
            return false;
        }
        self.objects.insert(object.application_id.clone(), object);
        true
    }

    pub fn get(&self, id: &str) -> Option<&RawObject> {
        self.objects.get(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<RawObject> for MemorySource {
    fn from_iter<I: IntoIterator<Item = RawObject>>(iter: I) -> Self {
        let mut source = Self::new();
        for object in iter {
            source.insert(object);
        }
        source
    }
}

impl ObjectSource for MemorySource {
    fn fetch(&self, id: &ApplicationId) -> Result<Option<RawObject>> {
        Ok(self.objects.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_known_and_unknown() {
        let source: MemorySource = [RawObject::new("a", "Wall")].into_iter().collect();
        assert!(source.fetch(&"a".into()).unwrap().is_some());
        assert!(source.fetch(&"b".into()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut source = MemorySource::new();
        assert!(source.insert(RawObject::new("a", "Wall")));
        assert!(!source.insert(RawObject::new("a", "Door")));
        assert_eq!(source.get("a").and_then(|o| o.type_name.as_deref()), Some("Wall"));
        assert_eq!(source.len(), 1);
    }
}
