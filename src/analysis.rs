//! Feature-model queries answered by the satisfiability oracle.
//!
//! Every query opens its own oracle session, loads the model's CNF into it once and then solves
//! under different assumptions. The `varisat` session keeps one solver alive for its whole
//! lifetime (inline, or on a single worker thread when a budget is set), so the per-feature
//! solves of [`FeatureAnalyzer::core_features`] and [`FeatureAnalyzer::dead_features`] are
//! incremental.

use std::fmt;

use num_bigint::BigUint;

use crate::config::Config;
use crate::model::FeatureModel;
use crate::mwp::MwpEnumerator;
use crate::oracle::{Backend, OracleError, SatOracle, Varisat};
use crate::types::{FeatureId, Lit};

/// Analyzer for feature model queries
pub struct FeatureAnalyzer<'a, B: Backend = Varisat> {
    model: &'a FeatureModel,
    backend: B,
    config: Config,
}

impl<'a> FeatureAnalyzer<'a, Varisat> {
    pub fn new(model: &'a FeatureModel) -> Self {
        Self::with_backend(model, Varisat::default(), Config::default())
    }
}

impl<'a, B: Backend> FeatureAnalyzer<'a, B> {
    pub fn with_backend(model: &'a FeatureModel, backend: B, config: Config) -> Self {
        Self { model, backend, config }
    }

    fn session(&self) -> B::Session {
        let cnf = self.model.cnf();
        let mut oracle = self.backend.open(cnf.num_vars(), self.config.solve_timeout);
        oracle.load(cnf);
        oracle
    }

    /// Check if the feature model has no valid configuration at all
    pub fn is_void(&self) -> Result<bool, OracleError> {
        Ok(!self.session().solve(&[])?)
    }

    /// Find all core features (features that appear in ALL valid configurations)
    pub fn core_features(&self) -> Result<Vec<FeatureId>, OracleError> {
        let mut oracle = self.session();
        let mut core = Vec::new();
        for id in self.model.ids() {
            // Core iff no valid configuration leaves it out.
            if !oracle.solve(&[id.neg()])? {
                core.push(id);
            }
        }
        Ok(core)
    }

    /// Find all dead features (features that appear in NO valid configuration)
    pub fn dead_features(&self) -> Result<Vec<FeatureId>, OracleError> {
        let mut oracle = self.session();
        let mut dead = Vec::new();
        for id in self.model.ids() {
            if !oracle.solve(&[id.pos()])? {
                dead.push(id);
            }
        }
        Ok(dead)
    }

    /// Check if selecting `a` forces `b` in every valid configuration
    pub fn implies(&self, a: FeatureId, b: FeatureId) -> Result<bool, OracleError> {
        self.never(&[a.pos(), b.neg()])
    }

    /// Check if `a` and `b` never appear together in a valid configuration
    pub fn mutually_exclusive(&self, a: FeatureId, b: FeatureId) -> Result<bool, OracleError> {
        self.never(&[a.pos(), b.pos()])
    }

    fn never(&self, assumptions: &[Lit]) -> Result<bool, OracleError> {
        Ok(!self.session().solve(assumptions)?)
    }

    /// Get statistics about the feature model
    pub fn statistics(&self) -> Result<FeatureModelStatistics, OracleError> {
        let cnf = self.model.cnf();
        Ok(FeatureModelStatistics {
            num_features: self.model.num_features(),
            num_constraints: self.model.constraints().len(),
            num_clauses: cnf.len(),
            num_warnings: cnf.warnings().len(),
            is_void: self.is_void()?,
            num_core_features: self.core_features()?.len(),
            num_dead_features: self.dead_features()?.len(),
            num_minimum_products: MwpEnumerator::with_config(self.model, &self.config).count(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeatureModelStatistics {
    pub num_features: usize,
    pub num_constraints: usize,
    pub num_clauses: usize,
    pub num_warnings: usize,
    pub is_void: bool,
    pub num_core_features: usize,
    pub num_dead_features: usize,
    pub num_minimum_products: BigUint,
}

impl fmt::Display for FeatureModelStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Feature Model Statistics:")?;
        writeln!(f, "  Features:             {}", self.num_features)?;
        writeln!(f, "  Constraints:          {}", self.num_constraints)?;
        writeln!(f, "  Clauses:              {}", self.num_clauses)?;
        writeln!(f, "  Unencoded statements: {}", self.num_warnings)?;
        writeln!(f, "  Void:                 {}", self.is_void)?;
        writeln!(f, "  Core features:        {}", self.num_core_features)?;
        writeln!(f, "  Dead features:        {}", self.num_dead_features)?;
        write!(f, "  Minimum products:     {}", self.num_minimum_products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::document::{FeatureDocument, FeatureNode};
    use crate::model::GroupKind;

    fn model(constraints: &[&str]) -> FeatureModel {
        let mut doc = FeatureDocument::new(
            FeatureNode::new("Root")
                .with_feature(FeatureNode::new("Core").mandatory())
                .with_feature(FeatureNode::new("Opt"))
                .with_group(GroupKind::Xor, [FeatureNode::new("A"), FeatureNode::new("B")]),
        );
        for c in constraints {
            doc = doc.with_constraint(*c);
        }
        FeatureModel::from_document(&doc).unwrap()
    }

    fn names(model: &FeatureModel, ids: Vec<FeatureId>) -> Vec<&str> {
        ids.into_iter().map(|id| model.name(id)).collect()
    }

    #[test]
    fn test_core_and_dead() {
        let model = model(&[]);
        let analyzer = FeatureAnalyzer::new(&model);
        assert!(!analyzer.is_void().unwrap());
        assert_eq!(names(&model, analyzer.core_features().unwrap()), ["Root", "Core"]);
        assert!(analyzer.dead_features().unwrap().is_empty());
    }

    #[test]
    fn test_dead_feature_from_cross_tree() {
        // A needs Opt, Opt needs B, but A and B exclude each other: A is dead.
        let model = model(&["A requires Opt", "Opt requires B"]);
        let analyzer = FeatureAnalyzer::new(&model);
        assert_eq!(names(&model, analyzer.dead_features().unwrap()), ["A"]);
        // With A dead, B is forced.
        assert_eq!(names(&model, analyzer.core_features().unwrap()), ["Root", "Core", "B"]);
    }

    #[test]
    fn test_implies_and_exclusion() {
        let model = model(&["Opt requires B"]);
        let analyzer = FeatureAnalyzer::new(&model);
        let id = |n: &str| model.id_of(n).unwrap();

        assert!(analyzer.implies(id("Opt"), id("B")).unwrap());
        assert!(analyzer.implies(id("A"), id("Root")).unwrap());
        assert!(!analyzer.implies(id("Root"), id("Opt")).unwrap());

        assert!(analyzer.mutually_exclusive(id("A"), id("B")).unwrap());
        assert!(analyzer.mutually_exclusive(id("A"), id("Opt")).unwrap());
        assert!(!analyzer.mutually_exclusive(id("B"), id("Opt")).unwrap());
    }

    #[test]
    fn test_void_model() {
        let model = model(&["Root requires A", "Root requires B"]);
        let analyzer = FeatureAnalyzer::new(&model);
        assert!(analyzer.is_void().unwrap());
    }

    #[test]
    fn test_statistics() {
        let model = model(&["Opt needs A"]);
        let stats = FeatureAnalyzer::new(&model).statistics().unwrap();
        assert_eq!(stats.num_features, 5);
        assert_eq!(stats.num_constraints, 1);
        assert_eq!(stats.num_warnings, 1);
        assert!(!stats.is_void);
        assert_eq!(stats.num_core_features, 2);
        assert_eq!(stats.num_dead_features, 0);
        assert_eq!(stats.num_minimum_products, BigUint::from(2u32));
        assert!(stats.to_string().contains("Minimum products:     2"));
    }
}
