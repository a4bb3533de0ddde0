use crate::category::{type_category, FunctionBucket, UTILS_CATEGORY};
use serde::Serialize;
use std::collections::HashMap;
use unitsplit_source_parser::{StructuralIndex, UnitKind};

/// One generated unit file and the definitions it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub category: String,

    /// Tree-relative path, e.g. `core/Base.py`
    pub file: String,

    /// Dotted module path, e.g. `core.Base`
    pub module: String,

    /// Indexes into `StructuralIndex::units`, in source order
    pub units: Vec<usize>,

    /// Distinct unit names in source order
    pub names: Vec<String>,
}

impl Bucket {
    fn new(category: &str, stem: &str) -> Self {
        Self {
            category: category.to_string(),
            file: format!("{category}/{stem}.py"),
            module: format!("{category}.{stem}"),
            units: Vec::new(),
            names: Vec::new(),
        }
    }

    /// File name without directory or extension
    pub fn stem(&self) -> &str {
        self.module.rsplit('.').next().unwrap_or(&self.module)
    }

    fn push(&mut self, unit: usize, name: &str) {
        self.units.push(unit);
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }
}

/// Assignment of every type and free function to a unit file
#[derive(Debug, Clone, Default)]
pub struct BucketPlan {
    /// Ordered by each bucket's first unit
    pub buckets: Vec<Bucket>,
    owners: HashMap<String, usize>,
    unit_buckets: HashMap<usize, usize>,
}

impl BucketPlan {
    pub fn assign(index: &StructuralIndex) -> Self {
        let mut plan = Self::default();
        // Lower-cased path → owning name, so files stay distinct on case-insensitive disks
        let mut taken: HashMap<String, String> = HashMap::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for (unit_idx, unit) in index.units.iter().enumerate() {
            let Some(name) = unit.name.as_deref() else {
                continue;
            };
            let (key, category, stem) = match unit.kind {
                UnitKind::TypeDefinition => {
                    let category = type_category(name);
                    let stem = type_file_stem(&mut taken, category, name);
                    (format!("type:{name}"), category, stem)
                }
                UnitKind::FreeFunction => {
                    let bucket = FunctionBucket::for_name(name);
                    (
                        format!("fn:{}", bucket.file_stem()),
                        UTILS_CATEGORY,
                        bucket.file_stem().to_string(),
                    )
                }
                _ => continue,
            };

            let bucket_idx = *by_key.entry(key).or_insert_with(|| {
                plan.buckets.push(Bucket::new(category, &stem));
                plan.buckets.len() - 1
            });
            plan.buckets[bucket_idx].push(unit_idx, name);
            plan.unit_buckets.insert(unit_idx, bucket_idx);
            plan.owners.insert(name.to_string(), bucket_idx);
        }

        log::debug!(
            "Planned {} unit files across {} categories",
            plan.buckets.len(),
            plan.categories().len()
        );
        plan
    }

    /// Bucket holding the last definition of `name`
    pub fn owner(&self, name: &str) -> Option<&Bucket> {
        self.owner_index(name).map(|idx| &self.buckets[idx])
    }

    pub fn owner_index(&self, name: &str) -> Option<usize> {
        self.owners.get(name).copied()
    }

    pub fn unit_bucket(&self, unit: usize) -> Option<usize> {
        self.unit_buckets.get(&unit).copied()
    }

    pub fn bucket_by_file(&self, file: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.file == file)
    }

    /// Categories in order of first appearance
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for bucket in &self.buckets {
            if !categories.contains(&bucket.category.as_str()) {
                categories.push(&bucket.category);
            }
        }
        categories
    }

    /// Name → tree-relative file for every definition
    pub fn module_mapping(&self) -> impl Iterator<Item = (&str, &str)> {
        self.owners
            .iter()
            .map(|(name, idx)| (name.as_str(), self.buckets[*idx].file.as_str()))
    }
}

fn type_file_stem(taken: &mut HashMap<String, String>, category: &str, name: &str) -> String {
    let mut stem = name.to_string();
    let mut suffix = 2;
    loop {
        let key = format!("{category}/{}", stem.to_lowercase());
        match taken.get(&key) {
            Some(owner) if owner != name => {
                stem = format!("{name}_{suffix}");
                suffix += 1;
            }
            _ => {
                taken.insert(key, name.to_string());
                return stem;
            }
        }
    }
}
