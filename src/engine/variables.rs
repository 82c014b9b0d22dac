//! Variable bindings, scoped to a (stanza, application, substance) triple
//! per Design Note "Variables and stanzas" — no lexical environments, just
//! a flat map keyed by the scope tuple plus the variable name.

use std::collections::HashMap;

use crate::quantity::Quantity;
use crate::streams::types::Scope;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct VarKey {
    stanza: Option<String>,
    application: Option<String>,
    substance: Option<String>,
    name: String,
}

impl VarKey {
    fn new(scope: &Scope, name: &str) -> Self {
        Self {
            stanza: scope.stanza.clone(),
            application: scope.application.clone(),
            substance: scope.substance.clone(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct VariableStore {
    values: HashMap<VarKey, Quantity>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable with a zero value if it isn't already bound;
    /// a no-op when it is (matches `setVariable`'s freedom to also define
    /// implicitly — `defineVariable` is for scripts that want an explicit
    /// declaration point).
    pub fn define(&mut self, scope: &Scope, name: &str) {
        self.values.entry(VarKey::new(scope, name)).or_insert_with(|| Quantity::zero(""));
    }

    pub fn set(&mut self, scope: &Scope, name: &str, value: Quantity) {
        self.values.insert(VarKey::new(scope, name), value);
    }

    /// Unbound variables read as zero rather than erroring — there is no
    /// "variable not found" error variant.
    pub fn get(&self, scope: &Scope, name: &str) -> Quantity {
        self.values
            .get(&VarKey::new(scope, name))
            .cloned()
            .unwrap_or_else(|| Quantity::zero(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unbound_variable_reads_as_zero() {
        let store = VariableStore::new();
        let scope = Scope::default();
        assert!(store.get(&scope, "x").is_zero());
    }

    #[test]
    fn variables_are_scoped_independently() {
        let mut store = VariableStore::new();
        let scope_a = Scope::default().with_application_substance("App A", "Sub");
        let scope_b = Scope::default().with_application_substance("App B", "Sub");
        store.set(&scope_a, "x", Quantity::new(dec!(10), ""));
        assert_eq!(store.get(&scope_a, "x").value, dec!(10));
        assert!(store.get(&scope_b, "x").is_zero());
    }
}
