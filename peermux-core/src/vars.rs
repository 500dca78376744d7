//! Shared-variable mirrors.

use std::collections::HashMap;

/// Local and remote shared-variable tables.
///
/// The local table holds values this peer published; writes go through the
/// peer handle so the matching frames reach the remote side. The remote
/// table mirrors the other peer's values and is only ever written by
/// inbound frames.
#[derive(Default)]
pub(crate) struct VarTables {
    pub local: HashMap<String, String>,
    pub remote: HashMap<String, String>,
}

impl VarTables {
    /// Stores a local value. Returns true when the stored value actually
    /// changed, which is when an update frame is due.
    pub fn set_local(&mut self, name: &str, value: &str) -> bool {
        match self.local.get(name) {
            Some(current) if current == value => false,
            _ => {
                self.local.insert(name.to_string(), value.to_string());
                true
            }
        }
    }

    /// Removes a local value. Returns false when it was not set.
    pub fn unset_local(&mut self, name: &str) -> bool {
        self.local.remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_change_only_when_value_differs() {
        let mut vars = VarTables::default();
        assert!(vars.set_local("mode", "fast"));
        assert!(!vars.set_local("mode", "fast"));
        assert!(vars.set_local("mode", "slow"));
        assert_eq!(vars.local.get("mode").map(String::as_str), Some("slow"));
    }

    #[test]
    fn unset_is_false_for_missing_names() {
        let mut vars = VarTables::default();
        assert!(!vars.unset_local("ghost"));
        vars.set_local("x", "1");
        assert!(vars.unset_local("x"));
        assert!(vars.local.is_empty());
    }

    #[test]
    fn empty_string_is_a_real_value() {
        let mut vars = VarTables::default();
        assert!(vars.set_local("flag", ""));
        assert!(!vars.set_local("flag", ""));
        assert_eq!(vars.local.get("flag").map(String::as_str), Some(""));
    }
}
