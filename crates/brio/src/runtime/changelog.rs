use indexmap::IndexSet;

/// Names whose bindings changed during the current moment. Writes land here
/// only after they have committed; the scheduler drains the set at each
/// moment boundary.
#[derive(Debug, Default)]
pub(crate) struct ChangeLog {
    names: IndexSet<String>,
    pessimistic: bool,
}

/// One moment's worth of drained changes. `pessimistic` means at least one
/// write had no statically extractable name, so every watcher counts as
/// affected.
#[derive(Debug, Default)]
pub(crate) struct ChangedSet {
    pub(crate) names: IndexSet<String>,
    pub(crate) pessimistic: bool,
}

impl ChangedSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.names.is_empty() && !self.pessimistic
    }
}

impl ChangeLog {
    pub(crate) fn mark(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Records a write whose affected name could not be extracted.
    pub(crate) fn mark_all(&mut self) {
        self.pessimistic = true;
    }

    pub(crate) fn drain(&mut self) -> ChangedSet {
        ChangedSet {
            names: std::mem::take(&mut self.names),
            pessimistic: std::mem::take(&mut self.pessimistic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_clears_and_preserves_first_marked_order() {
        let mut log = ChangeLog::default();
        log.mark("b");
        log.mark("a");
        log.mark("b");
        let drained = log.drain();
        let names: Vec<&String> = drained.names.iter().collect();
        assert_eq!(names, ["b", "a"]);
        assert!(!drained.pessimistic);
        assert!(log.drain().is_empty());
    }

    #[test]
    fn pessimistic_marking_survives_until_drain() {
        let mut log = ChangeLog::default();
        log.mark_all();
        assert!(log.drain().pessimistic);
        assert!(!log.drain().pessimistic);
    }
}
