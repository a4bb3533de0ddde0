use crate::plan::BucketPlan;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use unitsplit_graph::DependencyGraph;

/// File-level and category-level ordering of a bucket plan
#[derive(Debug, Clone)]
pub struct TreeLayout {
    /// Unit file → unit file it imports from
    pub files: DependencyGraph,

    /// Category → category it imports from
    pub categories: DependencyGraph,

    /// Dependencies first
    pub category_order: Vec<String>,

    /// Category → its files, dependencies first
    pub file_order: BTreeMap<String, Vec<String>>,

    /// Files in a non-trivial file-level cycle
    pub cyclic_files: BTreeSet<String>,

    /// Categories in a non-trivial category-level cycle
    pub cyclic_categories: BTreeSet<String>,
}

impl TreeLayout {
    pub fn build(plan: &BucketPlan, graph: &DependencyGraph) -> Self {
        let category_of: HashMap<&str, &str> = plan
            .buckets
            .iter()
            .map(|bucket| (bucket.file.as_str(), bucket.category.as_str()))
            .collect();

        let file_edges: Vec<(&str, &str)> = graph
            .edges()
            .into_iter()
            .filter_map(|(from, to)| {
                let from_file = plan.owner(from)?.file.as_str();
                let to_file = plan.owner(to)?.file.as_str();
                (from_file != to_file).then_some((from_file, to_file))
            })
            .collect();
        let files = DependencyGraph::from_edges(
            plan.buckets.iter().map(|bucket| bucket.file.as_str()),
            file_edges.iter().copied(),
        );

        let category_edges: Vec<(&str, &str)> = file_edges
            .iter()
            .map(|(from, to)| (category_of[from], category_of[to]))
            .filter(|(from, to)| from != to)
            .collect();
        let categories = DependencyGraph::from_edges(plan.categories(), category_edges);

        let cyclic_files: BTreeSet<String> = files.mutual_groups().into_iter().flatten().collect();
        let cyclic_categories: BTreeSet<String> =
            categories.mutual_groups().into_iter().flatten().collect();

        let mut file_order: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for category in plan.categories() {
            let members: Vec<&str> = plan
                .buckets
                .iter()
                .filter(|bucket| bucket.category == category)
                .map(|bucket| bucket.file.as_str())
                .collect();
            let inner_edges = file_edges
                .iter()
                .copied()
                .filter(|(from, to)| category_of[from] == category && category_of[to] == category);
            let inner = DependencyGraph::from_edges(members, inner_edges);
            file_order.insert(category.to_string(), inner.load_order());
        }

        let category_order = categories.load_order();
        log::debug!(
            "Layout: {} categories, {} cross-file edges, {} cyclic files",
            category_order.len(),
            files.edge_count(),
            cyclic_files.len()
        );

        Self {
            files,
            categories,
            category_order,
            file_order,
            cyclic_files,
            cyclic_categories,
        }
    }

    /// True when importing `to` from `from` would close a file-level cycle
    pub fn closes_file_cycle(&self, from: &str, to: &str) -> bool {
        from != to && self.files.would_create_cycle(from, to)
    }

    /// Files a category's `__init__.py` may import eagerly
    pub fn eager_files(&self, category: &str) -> Vec<&str> {
        if self.cyclic_categories.contains(category) {
            return Vec::new();
        }
        self.file_order
            .get(category)
            .map(|files| {
                files
                    .iter()
                    .filter(|file| !self.cyclic_files.contains(*file))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Files of a category in load order
    pub fn files_in(&self, category: &str) -> &[String] {
        self.file_order
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unitsplit_graph::DependencyResolver;
    use unitsplit_source_parser::SourceParser;

    fn layout(source: &str) -> TreeLayout {
        let index = SourceParser::new().unwrap().parse(source).unwrap();
        let graph = DependencyResolver::resolve(&index);
        let plan = BucketPlan::assign(&index);
        TreeLayout::build(&plan, &graph)
    }

    #[test]
    fn test_file_order_within_category() {
        let layout = layout(
            "class Derived(Base):\n    pass\n\nclass Base:\n    pass\n\nclass Other:\n    pass\n",
        );
        assert_eq!(
            layout.files_in("core"),
            &["core/Base.py".to_string(), "core/Derived.py".to_string(), "core/Other.py".to_string()]
        );
        assert!(layout.cyclic_files.is_empty());
        assert_eq!(layout.eager_files("core").len(), 3);
    }

    #[test]
    fn test_cross_category_cycle() {
        let layout = layout(
            "class A:\n    def go(self):\n        return f()\n\n\
             def f():\n    return isinstance(1, A)\n\n\
             class B:\n    pass\n",
        );

        assert!(layout.closes_file_cycle("utils/utils.py", "core/A.py"));
        assert!(layout.closes_file_cycle("core/A.py", "utils/utils.py"));
        assert!(layout.cyclic_categories.contains("core"));
        assert!(layout.cyclic_categories.contains("utils"));
        assert!(layout.eager_files("core").is_empty());
        assert_eq!(layout.files_in("core").len(), 2);
    }

    #[test]
    fn test_category_order_puts_dependencies_first() {
        let layout = layout(
            "class RequestHandler(Base):\n    pass\n\nclass Base:\n    pass\n",
        );
        assert_eq!(layout.category_order, vec!["core".to_string(), "handlers".to_string()]);
        assert!(!layout.closes_file_cycle("handlers/RequestHandler.py", "core/Base.py"));
    }
}
