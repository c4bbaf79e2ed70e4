//! CNF representation of a feature model.
//!
//! A [`Cnf`] is an ordered list of [`Clause`]s over feature variables. Every clause remembers
//! which structural rule produced it ([`ClauseOrigin`]), which is what the human-readable logic
//! listing and the DIMACS comments are rendered from.

use std::fmt::{self, Write};

use crate::model::FeatureModel;
use crate::types::{FeatureId, Lit};

/// The structural rule a clause was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseOrigin {
    /// `(root)`
    Root(FeatureId),
    /// `(¬child ∨ parent)`
    ChildImpliesParent { child: FeatureId, parent: FeatureId },
    /// `(¬parent ∨ child)` for a mandatory child.
    Mandatory { parent: FeatureId, child: FeatureId },
    /// `(¬owner ∨ m1 ∨ … ∨ mn)` for an XOR or OR group.
    GroupAtLeastOne { owner: FeatureId, members: Vec<FeatureId> },
    /// `(¬a ∨ ¬b)` for two members of an XOR group.
    GroupAtMostOne { a: FeatureId, b: FeatureId },
    /// `(¬dependent ∨ required)`; `constraint` indexes into the model's constraint list.
    CrossTree {
        constraint: usize,
        dependent: FeatureId,
        required: FeatureId,
    },
}

/// A disjunction of literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub lits: Vec<Lit>,
    pub origin: ClauseOrigin,
}

impl Clause {
    pub fn new(lits: Vec<Lit>, origin: ClauseOrigin) -> Self {
        Self { lits, origin }
    }

    pub fn to_dimacs(&self) -> Vec<i32> {
        self.lits.iter().map(|lit| lit.to_dimacs()).collect()
    }

    /// Whether the clause holds under `value`.
    pub fn is_satisfied_by(&self, value: impl Fn(FeatureId) -> bool) -> bool {
        self.lits.iter().any(|lit| value(lit.feature()) == lit.is_positive())
    }

    /// Renders the clause as a disjunction of feature names, e.g. `¬M ∨ R`.
    pub fn render(&self, model: &FeatureModel) -> String {
        self.lits
            .iter()
            .map(|lit| {
                let name = model.name(lit.feature());
                if lit.is_positive() {
                    name.to_string()
                } else {
                    format!("¬{}", name)
                }
            })
            .collect::<Vec<_>>()
            .join(" ∨ ")
    }

    /// Renders the clause in the infix form of the rule that produced it, e.g. `M → R`.
    pub fn render_rule(&self, model: &FeatureModel) -> String {
        let name = |id: FeatureId| model.name(id);
        match &self.origin {
            ClauseOrigin::Root(root) => name(*root).to_string(),
            ClauseOrigin::ChildImpliesParent { child, parent } => {
                format!("{} → {}", name(*child), name(*parent))
            }
            ClauseOrigin::Mandatory { parent, child } => format!("{} → {}", name(*parent), name(*child)),
            ClauseOrigin::GroupAtLeastOne { owner, members } => {
                let members: Vec<&str> = members.iter().map(|&m| name(m)).collect();
                if members.len() == 1 {
                    format!("{} → {}", name(*owner), members[0])
                } else {
                    format!("{} → ({})", name(*owner), members.join(" ∨ "))
                }
            }
            ClauseOrigin::GroupAtMostOne { a, b } => format!("¬({} ∧ {})", name(*a), name(*b)),
            ClauseOrigin::CrossTree { dependent, required, .. } => {
                format!("{} → {}", name(*dependent), name(*required))
            }
        }
    }
}

/// Non-fatal problem found while encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingWarning {
    /// A constraint statement matched no supported template and contributes no clause.
    UnmatchedConstraint { constraint: usize, statement: String },
}

impl fmt::Display for EncodingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingWarning::UnmatchedConstraint { statement, .. } => {
                write!(f, "constraint `{}` matches no supported template and was not encoded", statement)
            }
        }
    }
}

/// One line of the logic listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicEntry {
    /// A clause in infix form.
    Formula(String),
    /// Passthrough of a statement that could not be encoded.
    Comment(String),
}

impl fmt::Display for LogicEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicEntry::Formula(s) => write!(f, "{}", s),
            LogicEntry::Comment(s) => write!(f, "# {}", s),
        }
    }
}

/// Conjunctive normal form of a feature model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cnf {
    num_vars: usize,
    clauses: Vec<Clause>,
    warnings: Vec<EncodingWarning>,
}

impl Cnf {
    pub fn new(num_vars: usize) -> Self {
        Self {
            num_vars,
            clauses: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn warn(&mut self, warning: EncodingWarning) {
        self.warnings.push(warning);
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn warnings(&self) -> &[EncodingWarning] {
        &self.warnings
    }

    /// Whether the full assignment `value` satisfies every clause.
    pub fn is_satisfied_by(&self, value: impl Fn(FeatureId) -> bool) -> bool {
        self.clauses.iter().all(|c| c.is_satisfied_by(&value))
    }

    /// Human-readable listing: one formula per clause, with unmatched constraint statements
    /// kept as comments at their position among the cross-tree constraints.
    pub fn listing(&self, model: &FeatureModel) -> Vec<LogicEntry> {
        let mut entries = Vec::with_capacity(self.clauses.len() + self.warnings.len());
        let mut pending = self.warnings.iter().peekable();

        for clause in &self.clauses {
            if let ClauseOrigin::CrossTree { constraint, .. } = &clause.origin {
                while let Some(EncodingWarning::UnmatchedConstraint { statement, .. }) =
                    pending.next_if(|w| matches!(w, EncodingWarning::UnmatchedConstraint { constraint: c, .. } if c < constraint))
                {
                    entries.push(LogicEntry::Comment(statement.clone()));
                }
            }
            entries.push(LogicEntry::Formula(clause.render_rule(model)));
        }
        for EncodingWarning::UnmatchedConstraint { statement, .. } in pending {
            entries.push(LogicEntry::Comment(statement.clone()));
        }

        entries
    }

    /// Converts the CNF to DIMACS format.
    ///
    /// Feature names are emitted as `c feature <id> <name>` comment lines before the problem
    /// line, so the output can be read back with names intact.
    pub fn to_dimacs(&self, model: &FeatureModel) -> Result<String, fmt::Error> {
        let mut out = String::new();
        for feature in model.features() {
            writeln!(out, "c feature {} {}", feature.id.id(), feature.name)?;
        }
        for warning in &self.warnings {
            writeln!(out, "c warning: {}", warning)?;
        }
        writeln!(out, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for lit in &clause.lits {
                write!(out, "{} ", lit.to_dimacs())?;
            }
            writeln!(out, "0")?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::document::{FeatureDocument, FeatureNode};

    fn model() -> FeatureModel {
        let doc = FeatureDocument::new(FeatureNode::new("Root").with_feature(FeatureNode::new("A").mandatory()))
            .with_constraint("A needs Root")
            .with_constraint("A requires Root")
            .with_constraint("Root wants A");
        FeatureModel::from_document(&doc).unwrap()
    }

    #[test]
    fn test_clause_render() {
        let model = model();
        let clause = Clause::new(
            vec![Lit::from(-2), Lit::from(1)],
            ClauseOrigin::ChildImpliesParent {
                child: FeatureId::new(2),
                parent: FeatureId::new(1),
            },
        );
        assert_eq!(clause.render(&model), "¬A ∨ Root");
        assert_eq!(clause.render_rule(&model), "A → Root");
        assert_eq!(clause.to_dimacs(), vec![-2, 1]);
    }

    #[test]
    fn test_clause_satisfaction() {
        let clause = Clause::new(vec![Lit::from(-1), Lit::from(2)], ClauseOrigin::Root(FeatureId::new(1)));
        assert!(clause.is_satisfied_by(|f| f.id() == 2));
        assert!(clause.is_satisfied_by(|_| false));
        assert!(!clause.is_satisfied_by(|f| f.id() == 1));
    }

    #[test]
    fn test_listing_keeps_comment_order() {
        let model = model();
        let listing: Vec<String> = model.cnf().listing(&model).iter().map(|e| e.to_string()).collect();
        assert_eq!(
            listing,
            [
                "Root",
                "A → Root",
                "Root → A",
                "# A needs Root",
                "A → Root",
                "# Root wants A"
            ]
        );
    }

    #[test]
    fn test_to_dimacs() {
        let model = model();
        let dimacs = model.cnf().to_dimacs(&model).unwrap();
        let lines: Vec<&str> = dimacs.lines().filter(|l| !l.starts_with("c warning")).collect();
        assert_eq!(
            lines,
            [
                "c feature 1 Root",
                "c feature 2 A",
                "p cnf 2 4",
                "1 0",
                "-2 1 0",
                "-1 2 0",
                "-2 1 0"
            ]
        );
        assert_eq!(dimacs.lines().filter(|l| l.starts_with("c warning")).count(), 2);
    }
}
