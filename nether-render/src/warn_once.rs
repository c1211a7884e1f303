use hashbrown::HashSet;

/// Emits each advisory warning at most once per owner.
#[derive(Debug, Default)]
pub(crate) struct WarnOnce {
    seen: HashSet<&'static str>,
}

impl WarnOnce {
    /// Log `message` under `key` unless that key already fired.
    pub fn warn(&mut self, key: &'static str, message: impl FnOnce() -> String) -> bool {
        if self.seen.insert(key) {
            tracing::warn!("{}", message());
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_once_per_key() {
        let mut warn = WarnOnce::default();
        assert!(warn.warn("a", || "first".into()));
        assert!(!warn.warn("a", || "again".into()));
        assert!(warn.warn("b", || "other".into()));
    }
}
