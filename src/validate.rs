//! Configuration validation.
//!
//! A candidate selection is turned into a short-lived [`SelectionSession`], converted into unit
//! assumptions, and checked against the model's CNF in a fresh oracle session. A satisfying
//! model is then cross-checked against the feature tree before it is reported.

use std::fmt;

use crate::cnf::ClauseOrigin;
use crate::config::{Config, SelectionMode};
use crate::model::FeatureModel;
use crate::oracle::{Backend, Model, OracleError, SatOracle, Varisat};
use crate::types::{FeatureId, Lit};

/// Why a selection is invalid.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InvalidReason {
    /// No valuation satisfies the CNF together with the selection.
    Unsatisfiable,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Unsatisfiable => write!(f, "unsatisfiable"),
        }
    }
}

/// A structural rule broken by a complete selection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Violation {
    RootNotSelected { root: String },
    MissingParent { feature: String, parent: String },
    MissingMandatory { parent: String, child: String },
    /// The owner is selected but none of its group members is.
    GroupUnsatisfied { owner: String },
    /// Two members of an XOR group are selected together.
    XorConflict { a: String, b: String },
    CrossTreeViolated { dependent: String, required: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RootNotSelected { root } => write!(f, "root feature `{}` is not selected", root),
            Violation::MissingParent { feature, parent } => {
                write!(f, "`{}` is selected without its parent `{}`", feature, parent)
            }
            Violation::MissingMandatory { parent, child } => {
                write!(f, "`{}` is selected without its mandatory child `{}`", parent, child)
            }
            Violation::GroupUnsatisfied { owner } => write!(f, "no member of the group of `{}` is selected", owner),
            Violation::XorConflict { a, b } => write!(f, "`{}` and `{}` are mutually exclusive", a, b),
            Violation::CrossTreeViolated { dependent, required } => {
                write!(f, "`{}` requires `{}`", dependent, required)
            }
        }
    }
}

/// Outcome of a validation request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Validation {
    /// The selection is consistent; the partition comes from the solver's model.
    Valid {
        selected: Vec<String>,
        deselected: Vec<String>,
    },
    /// The selection is inconsistent. `violations` lists the broken rules when the selection is
    /// complete; it is empty in partial mode.
    Invalid {
        reason: InvalidReason,
        violations: Vec<Violation>,
    },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }
}

/// Error raised by a validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A selected name is not a feature of the model.
    UnknownFeature(String),
    /// The oracle failed or ran out of time.
    Oracle(OracleError),
    /// The solver returned a model in which a selected feature's parent is deselected.
    /// This is an encoder contract failure, never a property of the user's selection.
    Inconsistency { feature: String, parent: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownFeature(name) => write!(f, "unknown feature `{}`", name),
            ValidationError::Oracle(e) => write!(f, "{}", e),
            ValidationError::Inconsistency { feature, parent } => write!(
                f,
                "internal error: solver model selects `{}` without its parent `{}`",
                feature, parent
            ),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Oracle(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OracleError> for ValidationError {
    fn from(e: OracleError) -> Self {
        ValidationError::Oracle(e)
    }
}

/// A candidate selection, scoped to a single validation call.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    selected: Vec<bool>,
}

impl SelectionSession {
    /// Resolves `names` against `model`. Duplicated names are harmless; unknown names are not.
    pub fn new<S: AsRef<str>>(model: &FeatureModel, names: &[S]) -> Result<Self, ValidationError> {
        let mut selected = vec![false; model.num_features()];
        for name in names {
            let name = name.as_ref();
            let id = model
                .id_of(name)
                .ok_or_else(|| ValidationError::UnknownFeature(name.to_string()))?;
            selected[id.index()] = true;
        }
        Ok(Self { selected })
    }

    pub fn is_selected(&self, id: FeatureId) -> bool {
        self.selected.get(id.index()).copied().unwrap_or(false)
    }

    pub fn selected(&self) -> impl Iterator<Item = FeatureId> + '_ {
        (0..self.selected.len())
            .filter(|&i| self.selected[i])
            .map(FeatureId::from_index)
    }

    /// Unit assumptions for the oracle.
    pub fn assumptions(&self, mode: SelectionMode) -> Vec<Lit> {
        (0..self.selected.len())
            .map(|i| Lit::new(FeatureId::from_index(i), self.selected[i]))
            .filter(|lit| mode == SelectionMode::Complete || lit.is_positive())
            .collect()
    }

    /// Rules of `model` broken by this selection read as a complete configuration.
    pub fn violations(&self, model: &FeatureModel) -> Vec<Violation> {
        let name = |id: FeatureId| model.name(id).to_string();
        model
            .cnf()
            .clauses()
            .iter()
            .filter(|clause| !clause.is_satisfied_by(|id| self.is_selected(id)))
            .map(|clause| match &clause.origin {
                ClauseOrigin::Root(root) => Violation::RootNotSelected { root: name(*root) },
                ClauseOrigin::ChildImpliesParent { child, parent } => Violation::MissingParent {
                    feature: name(*child),
                    parent: name(*parent),
                },
                ClauseOrigin::Mandatory { parent, child } => Violation::MissingMandatory {
                    parent: name(*parent),
                    child: name(*child),
                },
                ClauseOrigin::GroupAtLeastOne { owner, .. } => Violation::GroupUnsatisfied { owner: name(*owner) },
                ClauseOrigin::GroupAtMostOne { a, b } => Violation::XorConflict {
                    a: name(*a),
                    b: name(*b),
                },
                ClauseOrigin::CrossTree { dependent, required, .. } => Violation::CrossTreeViolated {
                    dependent: name(*dependent),
                    required: name(*required),
                },
            })
            .collect()
    }
}

/// Validates feature selections against a model.
pub struct ConfigurationValidator<'a, B: Backend = Varisat> {
    model: &'a FeatureModel,
    backend: B,
    config: Config,
}

impl<'a> ConfigurationValidator<'a, Varisat> {
    pub fn new(model: &'a FeatureModel) -> Self {
        Self::with_backend(model, Varisat::default(), Config::default())
    }
}

impl<'a, B: Backend> ConfigurationValidator<'a, B> {
    pub fn with_backend(model: &'a FeatureModel, backend: B, config: Config) -> Self {
        Self { model, backend, config }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks the selection given by feature names.
    ///
    /// Returns `Ok(Validation::Invalid { .. })` for an unsatisfiable selection and an error for
    /// unknown names, oracle failures, and internal inconsistencies.
    pub fn validate<S: AsRef<str>>(&self, names: &[S]) -> Result<Validation, ValidationError> {
        let session = SelectionSession::new(self.model, names)?;
        let mode = self.config.selection_mode;
        let assumptions = session.assumptions(mode);

        let cnf = self.model.cnf();
        let mut oracle = self.backend.open(cnf.num_vars(), self.config.solve_timeout);
        oracle.load(cnf);

        if !oracle.solve(&assumptions)? {
            let violations = match mode {
                SelectionMode::Complete => session.violations(self.model),
                SelectionMode::Partial => Vec::new(),
            };
            log::info!(
                "Selection of {} features is invalid ({} violations)",
                names.len(),
                violations.len()
            );
            return Ok(Validation::Invalid {
                reason: InvalidReason::Unsatisfiable,
                violations,
            });
        }

        let model = oracle
            .model()
            .ok_or_else(|| OracleError::Backend("SAT but no model returned".to_string()))?;
        self.check_structure(&model)?;

        let (selected, deselected): (Vec<FeatureId>, Vec<FeatureId>) = self.model.ids().partition(|&id| model.value(id));
        let mut selected: Vec<String> = selected.into_iter().map(|id| self.model.name(id).to_string()).collect();
        let mut deselected: Vec<String> = deselected.into_iter().map(|id| self.model.name(id).to_string()).collect();
        selected.sort();
        deselected.sort();

        log::info!(
            "Selection is valid: {} selected, {} deselected",
            selected.len(),
            deselected.len()
        );
        Ok(Validation::Valid { selected, deselected })
    }

    /// Every feature true in `model` must have its parent true as well.
    fn check_structure(&self, model: &Model) -> Result<(), ValidationError> {
        for id in model.true_ids() {
            let Some(feature) = self.model.get(id) else {
                continue;
            };
            if let Some(parent) = feature.parent {
                if !model.value(parent) {
                    let error = ValidationError::Inconsistency {
                        feature: feature.name.clone(),
                        parent: self.model.name(parent).to_string(),
                    };
                    log::error!("{}", error);
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}
