//! Minimum working products.
//!
//! Minimality is decided entirely by the tree: a product contains the mandatory closure of the
//! root, and for every group owner it contains exactly one group member (itself expanded the
//! same way). Products are therefore the Cartesian product of the group choices, and no solver
//! is involved.
//!
//! The number of products is exponential in the number of independent groups, so it is counted
//! exactly (with arbitrary precision) before anything is materialized, and enumeration refuses
//! to start when the count exceeds the configured cap.

use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigUint;

use crate::config::{Config, CrossTreePolicy};
use crate::model::{Constraint, FeatureModel, GroupKind};
use crate::types::FeatureId;

/// Error raised by the enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MwpError {
    /// The number of products exceeds `limit`; nothing was enumerated.
    ResourceLimitExceeded { limit: usize, total: BigUint },
}

impl fmt::Display for MwpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MwpError::ResourceLimitExceeded { limit, total } => {
                write!(f, "{} minimum working products exceed the limit of {}", total, limit)
            }
        }
    }
}

impl std::error::Error for MwpError {}

/// A minimum working product, as a sorted set of feature ids.
pub type Product = BTreeSet<FeatureId>;

/// Enumerates minimum working products of a model.
pub struct MwpEnumerator<'a> {
    model: &'a FeatureModel,
    max_configurations: usize,
    cross_tree: CrossTreePolicy,
}

impl<'a> MwpEnumerator<'a> {
    pub fn new(model: &'a FeatureModel) -> Self {
        Self::with_config(model, &Config::default())
    }

    pub fn with_config(model: &'a FeatureModel, config: &Config) -> Self {
        Self {
            model,
            max_configurations: config.max_configurations,
            cross_tree: config.cross_tree,
        }
    }

    /// `feature` plus every feature reachable from it through mandatory children.
    ///
    /// Returned in ascending id order.
    pub fn mandatory_closure(&self, feature: FeatureId) -> Vec<FeatureId> {
        let mut closure = vec![feature];
        let mut i = 0;
        while i < closure.len() {
            let current = self.model.feature(closure[i]);
            closure.extend(
                current
                    .children
                    .iter()
                    .copied()
                    .filter(|&child| self.model.feature(child).mandatory),
            );
            i += 1;
        }
        closure.sort();
        closure
    }

    /// Exact number of products, before deduplication and cross-tree filtering.
    pub fn count(&self) -> BigUint {
        self.count_from(self.model.root())
    }

    fn count_from(&self, feature: FeatureId) -> BigUint {
        let mut total = BigUint::from(1u32);
        for owner in self.mandatory_closure(feature) {
            if self.model.feature(owner).group_kind() == GroupKind::None {
                continue;
            }
            let choices: BigUint = self
                .model
                .feature(owner)
                .group_members
                .iter()
                .map(|&m| self.count_from(m))
                .sum();
            total *= choices;
        }
        total
    }

    /// Enumerates all products as feature ids.
    ///
    /// Fails without enumerating anything if the number of products exceeds the cap.
    pub fn enumerate_ids(&self) -> Result<Vec<Product>, MwpError> {
        let total = self.count();
        if total > BigUint::from(self.max_configurations) {
            log::warn!(
                "Refusing to enumerate {} minimum working products (limit {})",
                total,
                self.max_configurations
            );
            return Err(MwpError::ResourceLimitExceeded {
                limit: self.max_configurations,
                total,
            });
        }

        let products: BTreeSet<Product> = self.products_from(self.model.root()).into_iter().collect();
        let before = products.len();
        let products: Vec<Product> = match self.cross_tree {
            CrossTreePolicy::Ignore => products.into_iter().collect(),
            CrossTreePolicy::Filter => products.into_iter().filter(|p| self.respects_cross_tree(p)).collect(),
        };

        log::info!(
            "Enumerated {} minimum working products ({} dropped by cross-tree constraints)",
            products.len(),
            before - products.len()
        );
        Ok(products)
    }

    /// Enumerates all products as sorted lists of feature names, ordered lexicographically.
    pub fn enumerate(&self) -> Result<Vec<Vec<String>>, MwpError> {
        let mut products: Vec<Vec<String>> = self
            .enumerate_ids()?
            .into_iter()
            .map(|product| {
                let mut names: Vec<String> = product.iter().map(|&id| self.model.name(id).to_string()).collect();
                names.sort();
                names
            })
            .collect();
        products.sort();
        Ok(products)
    }

    /// Products of the subtree at `feature`, assuming `feature` is selected.
    fn products_from(&self, feature: FeatureId) -> Vec<Product> {
        let closure = self.mandatory_closure(feature);
        let mut products: Vec<Product> = vec![closure.iter().copied().collect()];

        for &owner in &closure {
            let owner = self.model.feature(owner);
            if owner.group_kind() == GroupKind::None {
                continue;
            }

            // XOR and OR alike: a minimal choice is exactly one member.
            let choices: Vec<Product> = owner
                .group_members
                .iter()
                .flat_map(|&m| self.products_from(m))
                .collect();

            products = products
                .iter()
                .flat_map(|base| {
                    choices.iter().map(move |choice| base.union(choice).copied().collect::<Product>())
                })
                .collect();
        }

        products
    }

    fn respects_cross_tree(&self, product: &Product) -> bool {
        self.model.constraints().iter().all(|c| match c {
            Constraint::Requires { dependent, required, .. } => {
                !product.contains(dependent) || product.contains(required)
            }
            Constraint::Unresolved(_) => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::document::{FeatureDocument, FeatureNode};

    fn names(products: &[Vec<String>]) -> Vec<Vec<&str>> {
        products.iter().map(|p| p.iter().map(|s| s.as_str()).collect()).collect()
    }

    #[test]
    fn test_root_only() {
        let model = FeatureModel::from_document(&FeatureDocument::new(FeatureNode::new("Root"))).unwrap();
        let mwp = MwpEnumerator::new(&model);
        assert_eq!(mwp.count(), BigUint::from(1u32));
        assert_eq!(names(&mwp.enumerate().unwrap()), vec![vec!["Root"]]);
    }

    #[test]
    fn test_mandatory_closure() {
        let doc = FeatureDocument::new(
            FeatureNode::new("Root")
                .with_feature(FeatureNode::new("M").mandatory().with_feature(FeatureNode::new("MM").mandatory()))
                .with_feature(FeatureNode::new("O").with_feature(FeatureNode::new("OM").mandatory())),
        );
        let model = FeatureModel::from_document(&doc).unwrap();
        let mwp = MwpEnumerator::new(&model);
        let closure: Vec<&str> = mwp.mandatory_closure(model.root()).iter().map(|&id| model.name(id)).collect();
        assert_eq!(closure, ["Root", "M", "MM"]);
        assert_eq!(names(&mwp.enumerate().unwrap()), vec![vec!["M", "MM", "Root"]]);
    }

    #[test]
    fn test_or_group_minimal_is_singletons() {
        let doc = FeatureDocument::new(FeatureNode::new("Root").with_group(
            GroupKind::Or,
            [FeatureNode::new("A"), FeatureNode::new("B"), FeatureNode::new("C")],
        ));
        let model = FeatureModel::from_document(&doc).unwrap();
        assert_eq!(
            names(&MwpEnumerator::new(&model).enumerate().unwrap()),
            vec![vec!["A", "Root"], vec!["B", "Root"], vec!["C", "Root"]]
        );
    }

    #[test]
    fn test_independent_groups_product() {
        let doc = FeatureDocument::new(
            FeatureNode::new("Root")
                .with_group(GroupKind::Xor, [FeatureNode::new("A"), FeatureNode::new("B")])
                .with_feature(
                    FeatureNode::new("M")
                        .mandatory()
                        .with_group(GroupKind::Or, [FeatureNode::new("X"), FeatureNode::new("Y"), FeatureNode::new("Z")]),
                )
                // Optional owner: its group does not contribute.
                .with_feature(FeatureNode::new("O").with_group(GroupKind::Xor, [FeatureNode::new("P"), FeatureNode::new("Q")])),
        );
        let model = FeatureModel::from_document(&doc).unwrap();
        let mwp = MwpEnumerator::new(&model);
        assert_eq!(mwp.count(), BigUint::from(6u32));
        let products = mwp.enumerate().unwrap();
        assert_eq!(products.len(), 6);
        assert!(products.contains(&vec!["A".to_string(), "M".into(), "Root".into(), "Y".into()]));
        assert!(products.iter().all(|p| !p.contains(&"O".to_string())));
    }

    #[test]
    fn test_nested_groups_expand_chosen_member() {
        let doc = FeatureDocument::new(FeatureNode::new("Root").with_group(
            GroupKind::Xor,
            [
                FeatureNode::new("A")
                    .with_feature(FeatureNode::new("A1").mandatory())
                    .with_group(GroupKind::Xor, [FeatureNode::new("A2"), FeatureNode::new("A3")]),
                FeatureNode::new("B"),
            ],
        ));
        let model = FeatureModel::from_document(&doc).unwrap();
        let mwp = MwpEnumerator::new(&model);
        assert_eq!(mwp.count(), BigUint::from(3u32));
        assert_eq!(
            names(&mwp.enumerate().unwrap()),
            vec![vec!["A", "A1", "A2", "Root"], vec!["A", "A1", "A3", "Root"], vec!["B", "Root"]]
        );
    }

    #[test]
    fn test_resource_limit() {
        // 10 independent XOR groups of 4 members: 4^10 products.
        let mut root = FeatureNode::new("Root");
        for g in 0..10 {
            let members: Vec<FeatureNode> = (0..4).map(|m| FeatureNode::new(format!("G{}M{}", g, m))).collect();
            root = root.with_feature(FeatureNode::new(format!("G{}", g)).mandatory().with_group(GroupKind::Xor, members));
        }
        let model = FeatureModel::from_document(&FeatureDocument::new(root)).unwrap();
        let config = Config::default().with_max_configurations(1000);
        let mwp = MwpEnumerator::with_config(&model, &config);

        assert_eq!(mwp.count(), BigUint::from(4u32).pow(10));
        assert_eq!(
            mwp.enumerate(),
            Err(MwpError::ResourceLimitExceeded {
                limit: 1000,
                total: BigUint::from(1_048_576u32),
            })
        );
    }

    #[test]
    fn test_count_exceeding_machine_words() {
        let mut root = FeatureNode::new("Root");
        for g in 0..40 {
            let members: Vec<FeatureNode> = (0..10).map(|m| FeatureNode::new(format!("G{}M{}", g, m))).collect();
            root = root.with_feature(FeatureNode::new(format!("G{}", g)).mandatory().with_group(GroupKind::Or, members));
        }
        let model = FeatureModel::from_document(&FeatureDocument::new(root)).unwrap();
        let mwp = MwpEnumerator::new(&model);
        assert_eq!(mwp.count(), BigUint::from(10u32).pow(40));
        assert!(matches!(mwp.enumerate_ids(), Err(MwpError::ResourceLimitExceeded { limit: 10_000, .. })));
    }

    #[test]
    fn test_cross_tree_filter() {
        let doc = FeatureDocument::new(FeatureNode::new("Root").with_group(
            GroupKind::Xor,
            [FeatureNode::new("A"), FeatureNode::new("B"), FeatureNode::new("C")],
        ))
        .with_constraint("A requires B");
        let model = FeatureModel::from_document(&doc).unwrap();

        let ignore = MwpEnumerator::new(&model).enumerate().unwrap();
        assert_eq!(ignore.len(), 3);

        let config = Config::default().with_cross_tree(CrossTreePolicy::Filter);
        let filtered = MwpEnumerator::with_config(&model, &config).enumerate().unwrap();
        assert_eq!(names(&filtered), vec![vec!["B", "Root"], vec!["C", "Root"]]);
    }
}
