use crate::vault::Dictionary;
use parking_lot::Mutex;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Front-matter updates queued by stages during a pass, per document name.
///
/// The curator drains the collector after the stages ran; documents with
/// pending updates become rewrite candidates.
#[derive(Debug, Default)]
pub struct FrontMatterCollector {
    updates: Mutex<BTreeMap<String, Dictionary>>,
}

impl FrontMatterCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Into<Value>>(&self, document: &str, key: &str, value: V) {
        self.updates
            .lock()
            .entry(document.to_string())
            .or_default()
            .insert(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.lock().is_empty()
    }

    /// Removes and returns everything queued so far.
    pub fn take(&self) -> BTreeMap<String, Dictionary> {
        std::mem::take(&mut *self.updates.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_accumulate_per_document() {
        let collector = FrontMatterCollector::new();
        collector.set("a", "count", 1);
        collector.set("a", "count", 2);
        collector.set("a", "status", "done");
        collector.set("b", "count", 0);

        let updates = collector.take();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates["a"].integer("count"), Some(2));
        assert_eq!(updates["a"].string("status").as_deref(), Some("done"));
        assert!(collector.is_empty());
    }
}
