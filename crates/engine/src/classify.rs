use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use unitsplit_source_parser::{StatementRole, StructuralIndex, UnitKind};

/// Where a non-definition unit is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placement {
    /// `imports.py`, interleaved with constants in source order
    Prelude,

    /// `imports.py`, directly after the import statements
    PreludeImports,

    /// `init.py`, evaluated once every unit file is importable
    Init,

    /// The entry file
    Entry,
}

/// Split of bindings and statements between the prelude, init, and entry files
#[derive(Debug, Clone, Default)]
pub struct BindingPlan {
    /// Placement per unit index, for bindings and statements
    pub placements: BTreeMap<usize, Placement>,

    /// Deferred-init binding units in source order
    pub deferred: Vec<usize>,

    /// Names with at least one deferred-init binding
    pub deferred_names: BTreeSet<String>,

    /// Names that must be read and written through the prelude module
    pub live_names: BTreeSet<String>,

    pub warnings: Vec<String>,
}

impl BindingPlan {
    /// Classify bindings and statements.
    ///
    /// `global_writes` holds every name some definition assigns through `global`.
    pub fn classify(index: &StructuralIndex, global_writes: &BTreeSet<String>) -> Self {
        let definitions = index.definition_names();
        let mut plan = Self::default();
        let mut binding_names: HashSet<&str> = HashSet::new();

        for (idx, unit) in index.units.iter().enumerate() {
            let placement = match unit.kind {
                UnitKind::Binding => {
                    let name = unit.name();
                    binding_names.insert(name);
                    if plan.is_deferred(unit.initializer.as_deref(), &unit.used_names, name, &definitions) {
                        plan.deferred.push(idx);
                        plan.deferred_names.insert(name.to_string());
                        Placement::Init
                    } else {
                        if let Some(target) = unit
                            .used_names
                            .iter()
                            .find(|used| definitions.contains(used.as_str()))
                        {
                            plan.warnings.push(format!(
                                "Constant {name} (line {}) reads {target} and is evaluated before it exists",
                                unit.span.start
                            ));
                        }
                        Placement::Prelude
                    }
                }
                UnitKind::Statement(role) => {
                    let needs_units = unit.used_names.iter().any(|used| {
                        definitions.contains(used.as_str()) || plan.deferred_names.contains(used)
                    });
                    match role {
                        StatementRole::EntryGuard => Placement::Entry,
                        _ if needs_units => Placement::Init,
                        StatementRole::ConditionalImport => Placement::PreludeImports,
                        StatementRole::Plain => Placement::Prelude,
                    }
                }
                _ => continue,
            };
            plan.placements.insert(idx, placement);
        }

        plan.live_names = plan.deferred_names.clone();
        for name in global_writes {
            if binding_names.contains(name.as_str()) {
                plan.live_names.insert(name.clone());
            }
        }

        for warning in &plan.warnings {
            log::warn!("{warning}");
        }
        log::debug!(
            "Classified {} deferred bindings, {} live names",
            plan.deferred.len(),
            plan.live_names.len()
        );
        plan
    }

    /// A binding is deferred when it calls a unit directly, reads a deferred
    /// binding, or rebinds a name already deferred
    fn is_deferred(
        &self,
        initializer: Option<&str>,
        used_names: &BTreeSet<String>,
        name: &str,
        definitions: &HashSet<&str>,
    ) -> bool {
        initializer.is_some_and(|callee| definitions.contains(callee))
            || used_names.iter().any(|used| self.deferred_names.contains(used))
            || self.deferred_names.contains(name)
    }

    pub fn placement(&self, unit: usize) -> Option<Placement> {
        self.placements.get(&unit).copied()
    }

    /// Units with a given placement, in source order
    pub fn units_at(&self, placement: Placement) -> Vec<usize> {
        self.placements
            .iter()
            .filter(|(_, p)| **p == placement)
            .map(|(idx, _)| *idx)
            .collect()
    }

    pub fn is_deferred_unit(&self, unit: usize) -> bool {
        self.deferred.contains(&unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unitsplit_source_parser::SourceParser;

    fn classify(source: &str, global_writes: &[&str]) -> (StructuralIndex, BindingPlan) {
        let index = SourceParser::new().unwrap().parse(source).unwrap();
        let writes = global_writes.iter().map(|s| s.to_string()).collect();
        let plan = BindingPlan::classify(&index, &writes);
        (index, plan)
    }

    #[test]
    fn test_direct_call_is_deferred() {
        let (_, plan) = classify(
            "LIMIT = 10\n\nclass Config:\n    pass\n\nconfig = Config()\nsettings = config.copy()\n",
            &[],
        );

        assert_eq!(plan.placement(0), Some(Placement::Prelude));
        assert_eq!(plan.deferred, vec![2, 3]);
        assert_eq!(
            plan.deferred_names.iter().cloned().collect::<Vec<_>>(),
            vec!["config".to_string(), "settings".to_string()]
        );
        assert_eq!(plan.units_at(Placement::Init), vec![2, 3]);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_rebinding_a_deferred_name_stays_deferred() {
        let (_, plan) = classify(
            "class App:\n    pass\n\napp = App()\napp = None\n",
            &[],
        );
        assert_eq!(plan.deferred, vec![1, 2]);
    }

    #[test]
    fn test_constant_reading_a_unit_warns() {
        let (_, plan) = classify("def f():\n    pass\n\nHANDLERS = [f]\n", &[]);
        assert_eq!(plan.placement(1), Some(Placement::Prelude));
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("HANDLERS"));
    }

    #[test]
    fn test_statement_placement() {
        let (_, plan) = classify(
            "try:\n    import json\nexcept ImportError:\n    json = None\n\n\
             print('loading')\n\n\
             def setup():\n    pass\n\nsetup()\n\n\
             if __name__ == '__main__':\n    setup()\n",
            &[],
        );

        assert_eq!(plan.placement(0), Some(Placement::PreludeImports));
        assert_eq!(plan.placement(1), Some(Placement::Prelude));
        assert_eq!(plan.placement(3), Some(Placement::Init));
        assert_eq!(plan.placement(4), Some(Placement::Entry));
    }

    #[test]
    fn test_global_writes_become_live() {
        let (_, plan) = classify(
            "COUNTER = 0\n\ndef bump():\n    global COUNTER\n    COUNTER += 1\n",
            &["COUNTER", "unbound"],
        );
        assert_eq!(
            plan.live_names.iter().cloned().collect::<Vec<_>>(),
            vec!["COUNTER".to_string()]
        );
        assert!(plan.deferred.is_empty());
    }
}
