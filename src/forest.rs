use crate::{
    error::{Result, TargetingError},
    target::Target,
};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// An item that can be arranged in a forest through its parent link.
pub trait TreeItem {
    fn id(&self) -> &str;

    fn parent_id(&self) -> Option<&str>;

    fn field(&self, name: &str) -> Option<&str>;
}

impl TreeItem for Target {
    fn id(&self) -> &str {
        Target::id(self)
    }

    fn parent_id(&self) -> Option<&str> {
        Target::parent_id(self)
    }

    fn field(&self, name: &str) -> Option<&str> {
        Target::field(self, name)
    }
}

/// Selects the values returned by [`ForestNode::flatten`].
///
/// Restricting to a depth and to the leaves are mutually exclusive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FlattenOptions {
    depth: Option<usize>,
    only_leaves: bool,
}

impl FlattenOptions {
    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn only_leaves(mut self) -> Self {
        self.only_leaves = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.depth.is_some() && self.only_leaves {
            return Err(TargetingError::InvalidArgument(
                "cannot restrict to both a depth and the leaves".to_string(),
            ));
        }
        Ok(())
    }

    fn accepts<T>(&self, node: &ForestNode<T>) -> bool {
        self.depth.map_or(true, |depth| node.depth == Some(depth))
            && (!self.only_leaves || node.children.is_empty())
    }
}

/// A node of a multi-rooted forest.
///
/// The forest itself is a synthetic node with neither value nor depth whose
/// children are the roots. Equality ignores the order of children.
#[derive(Clone, Debug)]
pub struct ForestNode<T = Target> {
    value: Option<T>,
    children: Vec<ForestNode<T>>,
    depth: Option<usize>,
}

impl<T: PartialEq> PartialEq for ForestNode<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.depth == other.depth
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .all(|child| other.children.contains(child))
    }
}

impl<T> Default for ForestNode<T> {
    fn default() -> Self {
        Self::new(None, vec![], None)
    }
}

impl<T> ForestNode<T> {
    pub fn new(value: Option<T>, children: Vec<ForestNode<T>>, depth: Option<usize>) -> Self {
        Self {
            value,
            children,
            depth,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn children(&self) -> &[ForestNode<T>] {
        &self.children
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The deepest depth annotation in the tree, `None` if nothing is
    /// annotated.
    pub fn max_depth(&self) -> Option<usize> {
        self.children
            .iter()
            .map(ForestNode::max_depth)
            .fold(self.depth, Ord::max)
    }

    /// Every value of the tree in document order.
    pub fn descendants(&self) -> Vec<&T> {
        let mut values = vec![];
        self.collect(&FlattenOptions::default(), &mut values);
        values
    }

    pub fn flatten(&self, options: &FlattenOptions) -> Result<Vec<&T>> {
        options.validate()?;
        let mut values = vec![];
        self.collect(options, &mut values);
        Ok(values)
    }

    fn collect<'a>(&'a self, options: &FlattenOptions, values: &mut Vec<&'a T>) {
        if let Some(value) = &self.value {
            if options.accepts(self) {
                values.push(value);
            }
        }

        for branch in &self.children {
            branch.collect(options, values);
        }
    }
}

impl<T: TreeItem> ForestNode<T> {
    /// Arranges flat parent-linked items into a forest.
    ///
    /// Every parent id that is not itself the id of an item is a maximal
    /// parent: its children become roots at depth 0, in order of first
    /// appearance. Items never reached from a maximal parent are dropped.
    pub fn build(items: impl IntoIterator<Item = T>) -> Self
    where
        T: Clone,
    {
        let items: Vec<T> = items.into_iter().collect();
        let ids: HashSet<&str> = items.iter().map(TreeItem::id).collect();
        let builder = Builder {
            items: &items,
            children_of: items
                .iter()
                .enumerate()
                .into_group_map_by(|&(_, item)| item.parent_id())
                .into_iter()
                .map(|(parent, children)| {
                    (parent, children.into_iter().map(|(index, _)| index).collect())
                })
                .collect(),
        };

        let mut path = vec![];
        let roots: Vec<ForestNode<T>> = items
            .iter()
            .map(TreeItem::parent_id)
            .unique()
            .filter(|parent| match parent {
                Some(parent) => !ids.contains(parent),
                None => true,
            })
            .flat_map(|parent| builder.make_trees(parent, 0, &mut path))
            .collect();

        let forest = Self::new(None, roots, None);
        let placed = forest.descendants().len();
        if placed < items.len() {
            warn!(
                placed,
                dropped = items.len() - placed,
                "some items are not reachable from any root"
            );
        }
        debug!(roots = forest.children.len(), placed, "built forest");
        forest
    }

    /// The first node below this one, depth first, whose value has `field`
    /// set to `value`.
    pub fn get_subtree(&self, field: &str, value: &str) -> Option<&ForestNode<T>> {
        for branch in &self.children {
            if branch.matches(field, value) {
                return Some(branch);
            }
            if let Some(subtree) = branch.get_subtree(field, value) {
                return Some(subtree);
            }
        }
        None
    }

    /// The values of every node that has a match for `field == value`
    /// somewhere below it, searching all branches.
    pub fn get_subtree_parents(&self, field: &str, value: &str) -> Vec<&T> {
        let mut parents = vec![];
        if let Some(node) = &self.value {
            if self.get_subtree(field, value).is_some() {
                parents.push(node);
            }
        }

        for branch in &self.children {
            parents.extend(branch.get_subtree_parents(field, value));
        }
        parents
    }

    /// Keeps the branches holding at least one value whose `key` field is in
    /// `ids`, pruning their children the same way. The value of `self` is
    /// always kept.
    pub fn filter_by_key(&self, key: &str, ids: &HashSet<String>) -> Self
    where
        T: Clone,
    {
        let children = self
            .children
            .iter()
            .filter(|branch| {
                branch
                    .descendants()
                    .into_iter()
                    .filter_map(|value| value.field(key))
                    .any(|id| ids.contains(id))
            })
            .map(|branch| branch.filter_by_key(key, ids))
            .collect();

        Self::new(self.value.clone(), children, self.depth)
    }

    pub fn filter_tree(&self, external_names: &HashSet<String>) -> Self
    where
        T: Clone,
    {
        self.filter_by_key("external_name", external_names)
    }

    fn matches(&self, field: &str, value: &str) -> bool {
        self.value
            .as_ref()
            .is_some_and(|node| node.field(field) == Some(value))
    }
}

impl ForestNode<Target> {
    /// Overwrites, in place, the external name of every target whose id is
    /// in `id_map`.
    pub fn update_external_names(&mut self, id_map: &HashMap<String, String>) {
        if let Some(target) = &mut self.value {
            if let Some(external_name) = id_map.get(target.id()) {
                target.set_external_name(external_name.as_str());
            }
        }

        for branch in &mut self.children {
            branch.update_external_names(id_map);
        }
    }
}

struct Builder<'a, T> {
    items: &'a [T],
    children_of: HashMap<Option<&'a str>, Vec<usize>>,
}

impl<'a, T: TreeItem + Clone> Builder<'a, T> {
    fn make_trees(
        &self,
        parent: Option<&'a str>,
        depth: usize,
        path: &mut Vec<&'a str>,
    ) -> Vec<ForestNode<T>> {
        let Some(children) = self.children_of.get(&parent) else {
            return vec![];
        };

        let mut trees = Vec::with_capacity(children.len());
        for &index in children {
            let item = &self.items[index];
            let id = item.id();
            // Only duplicated ids can lead back to an ancestor.
            if path.contains(&id) {
                warn!(id, depth, "skipping item that repeats an ancestor id");
                continue;
            }

            path.push(id);
            let branches = self.make_trees(Some(id), depth + 1, path);
            path.pop();
            trees.push(ForestNode::new(Some(item.clone()), branches, Some(depth)));
        }
        trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn home() -> Target {
        Target::ad_unit("1").with_name("home").with_external_name("h")
    }

    fn home_us() -> Target {
        Target::ad_unit("2")
            .with_parent("1")
            .with_name("home/us")
            .with_external_name("hu")
    }

    fn home_us_mi() -> Target {
        Target::ad_unit("3")
            .with_parent("2")
            .with_name("home/us/mi")
            .with_external_name("hum")
    }

    fn home_uk() -> Target {
        Target::ad_unit("3")
            .with_parent("1")
            .with_name("home/uk")
            .with_external_name("huk")
    }

    fn entertainment() -> Target {
        Target::ad_unit("1").with_parent("-1").with_name("entertainment")
    }

    fn sports() -> Target {
        Target::ad_unit("2").with_parent("-2").with_name("sports")
    }

    fn news() -> Target {
        Target::ad_unit("3").with_parent("-3").with_name("news")
    }

    fn leaf(target: Target, depth: usize) -> ForestNode {
        ForestNode::new(Some(target), vec![], Some(depth))
    }

    fn forest(roots: Vec<ForestNode>) -> ForestNode {
        ForestNode::new(None, roots, None)
    }

    fn nested_tree() -> ForestNode {
        forest(vec![ForestNode::new(
            Some(home()),
            vec![ForestNode::new(
                Some(home_us()),
                vec![leaf(home_us_mi(), 2)],
                Some(1),
            )],
            Some(0),
        )])
    }

    fn disjoint_tree() -> ForestNode {
        forest(vec![
            leaf(entertainment(), 0),
            leaf(sports(), 0),
            leaf(news(), 0),
        ])
    }

    fn ancestor_tree() -> ForestNode {
        forest(vec![ForestNode::new(
            Some(home()),
            vec![leaf(home_us(), 1), leaf(home_uk(), 1)],
            Some(0),
        )])
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn can_build_an_empty_forest() {
        let forest = ForestNode::<Target>::build(vec![]);

        assert_eq!(ForestNode::default(), forest);
        assert!(forest.is_leaf());
    }

    #[test]
    fn can_build_a_chain() {
        let forest = ForestNode::build(vec![home(), home_us(), home_us_mi()]);

        assert_eq!(nested_tree(), forest);
    }

    #[test]
    fn can_build_disjoint_roots_under_missing_parents() {
        let forest = ForestNode::build(vec![entertainment(), sports(), news()]);

        assert_eq!(disjoint_tree(), forest);
        assert_eq!(
            vec![&entertainment(), &sports(), &news()],
            forest.descendants()
        );
    }

    #[test]
    fn can_build_siblings_under_a_shared_ancestor() {
        let forest = ForestNode::build(vec![home(), home_us(), home_uk()]);

        assert_eq!(ancestor_tree(), forest);
    }

    #[test]
    fn can_build_regardless_of_input_order() {
        let forest = ForestNode::build(vec![home_us_mi(), home_us(), home()]);

        assert_eq!(nested_tree(), forest);
    }

    #[test]
    fn drops_items_caught_in_a_cycle() {
        let first = Target::ad_unit("a").with_parent("b");
        let second = Target::ad_unit("b").with_parent("a");

        let forest = ForestNode::build(vec![first, second, home()]);

        assert_eq!(forest_of_home(), forest);
    }

    fn forest_of_home() -> ForestNode {
        forest(vec![leaf(home(), 0)])
    }

    #[test]
    fn skips_a_duplicated_id_below_itself() {
        let duplicate = Target::ad_unit("1").with_parent("1").with_name("again");

        let forest = ForestNode::build(vec![home(), duplicate]);

        assert_eq!(forest_of_home(), forest);
    }

    #[test]
    fn equality_ignores_the_order_of_children() {
        let reordered = forest(vec![ForestNode::new(
            Some(home()),
            vec![leaf(home_uk(), 1), leaf(home_us(), 1)],
            Some(0),
        )]);

        assert_eq!(ancestor_tree(), reordered);
        assert_ne!(ancestor_tree(), nested_tree());
    }

    #[test]
    fn can_find_a_subtree() {
        let tree = nested_tree();

        let subtree = tree.get_subtree("id", "2");

        assert_eq!(
            Some(&ForestNode::new(
                Some(home_us()),
                vec![leaf(home_us_mi(), 2)],
                Some(1)
            )),
            subtree
        );
    }

    #[test]
    fn return_nothing_when_the_subtree_is_missing() {
        assert_eq!(None, ForestNode::<Target>::default().get_subtree("id", "1"));
        assert_eq!(None, nested_tree().get_subtree("id", "1234"));
    }

    #[test]
    fn can_find_subtree_parents() {
        let tree = nested_tree();

        assert_eq!(vec![&home(), &home_us()], tree.get_subtree_parents("id", "3"));
        assert_eq!(vec![&home()], tree.get_subtree_parents("name", "home/us"));
        assert!(tree.get_subtree_parents("id", "1").is_empty());
    }

    #[test]
    fn can_find_parents_across_branches() {
        let tree = ancestor_tree();

        assert_eq!(vec![&home()], tree.get_subtree_parents("id", "3"));
    }

    #[test]
    fn can_find_parents_of_matches_in_sibling_branches() {
        let detroit = Target::ad_unit("4").with_parent("2").with_name("city");
        let london = Target::ad_unit("5").with_parent("3").with_name("city");
        let tree = ForestNode::build(vec![home(), home_us(), home_uk(), detroit, london]);

        let parents = tree.get_subtree_parents("name", "city");

        assert_eq!(vec![&home(), &home_us(), &home_uk()], parents);
    }

    #[test]
    fn can_compute_the_max_depth() {
        assert_eq!(None, ForestNode::<Target>::default().max_depth());
        assert_eq!(Some(2), nested_tree().max_depth());
        assert_eq!(Some(0), disjoint_tree().max_depth());
        assert_eq!(Some(1), ancestor_tree().max_depth());
    }

    #[test]
    fn can_flatten_every_value() {
        let options = FlattenOptions::default();

        assert!(ForestNode::<Target>::default()
            .flatten(&options)
            .unwrap()
            .is_empty());
        assert_eq!(
            vec![&home(), &home_us(), &home_us_mi()],
            nested_tree().flatten(&options).unwrap()
        );
        assert_eq!(
            vec![&home(), &home_us(), &home_uk()],
            ancestor_tree().flatten(&options).unwrap()
        );
    }

    #[test]
    fn can_flatten_at_a_depth() {
        let tree = nested_tree();

        let at = |depth| tree.flatten(&FlattenOptions::default().at_depth(depth)).unwrap();

        assert_eq!(vec![&home()], at(0));
        assert_eq!(vec![&home_us()], at(1));
        assert_eq!(vec![&home_us_mi()], at(2));
        assert!(at(3).is_empty());
    }

    #[test]
    fn can_flatten_only_leaves() {
        let options = FlattenOptions::default().only_leaves();

        assert_eq!(vec![&home_us_mi()], nested_tree().flatten(&options).unwrap());
        assert_eq!(
            vec![&home_us(), &home_uk()],
            ancestor_tree().flatten(&options).unwrap()
        );
    }

    #[test]
    fn return_an_error_when_flattening_with_conflicting_options() {
        let options = FlattenOptions::default().at_depth(1).only_leaves();
        let tree = nested_tree();

        let result = tree.flatten(&options);

        assert!(matches!(result, Err(TargetingError::InvalidArgument(_))));
    }

    #[test]
    fn can_filter_by_key() {
        assert_eq!(nested_tree(), nested_tree().filter_by_key("id", &ids(&["3"])));
        assert_eq!(
            forest(vec![leaf(home(), 0)]),
            nested_tree().filter_by_key("id", &ids(&["1"]))
        );
        assert_eq!(
            forest(vec![leaf(entertainment(), 0)]),
            disjoint_tree().filter_by_key("id", &ids(&["1"]))
        );
        assert_eq!(
            forest(vec![ForestNode::new(
                Some(home()),
                vec![leaf(home_us(), 1)],
                Some(0)
            )]),
            ancestor_tree().filter_by_key("id", &ids(&["2"]))
        );
    }

    #[test]
    fn filtering_without_matches_keeps_only_the_root() {
        let filtered = nested_tree().filter_by_key("id", &ids(&["42"]));

        assert_eq!(ForestNode::default(), filtered);
    }

    #[test]
    fn can_filter_by_external_name() {
        let filtered = ancestor_tree().filter_tree(&ids(&["huk"]));

        assert_eq!(
            forest(vec![ForestNode::new(
                Some(home()),
                vec![leaf(home_uk(), 1)],
                Some(0)
            )]),
            filtered
        );
    }

    #[test]
    fn can_update_external_names_in_place() {
        let mut tree = nested_tree();
        let id_map = HashMap::from([
            ("1".to_string(), "renamed-home".to_string()),
            ("3".to_string(), "renamed-mi".to_string()),
        ]);

        tree.update_external_names(&id_map);

        let names: Vec<_> = tree
            .descendants()
            .into_iter()
            .map(|target| target.external_name())
            .collect();
        assert_eq!(
            vec![Some("renamed-home"), Some("hu"), Some("renamed-mi")],
            names
        );
    }

    fn arbitrary_items() -> impl Strategy<Value = Vec<Target>> {
        prop::collection::vec(prop::option::of(0..24usize), 1..24).prop_map(|parents| {
            parents
                .into_iter()
                .enumerate()
                .map(|(index, parent)| {
                    let target = Target::ad_unit(index.to_string());
                    // Parents always come earlier, so the input is acyclic.
                    match parent.filter(|parent| *parent < index) {
                        Some(parent) => target.with_parent(parent.to_string()),
                        None => target,
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn building_places_every_acyclic_item(items in arbitrary_items()) {
            let forest = ForestNode::build(items.clone());

            prop_assert_eq!(items.len(), forest.descendants().len());
        }

        #[test]
        fn filtering_by_every_id_keeps_the_forest(items in arbitrary_items()) {
            let forest = ForestNode::build(items.clone());
            let all: HashSet<String> = items.iter().map(|item| item.id().to_string()).collect();

            prop_assert_eq!(&forest, &forest.filter_by_key("id", &all));
        }
    }
}
