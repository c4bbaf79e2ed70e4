//! Feature model: an immutable arena of features plus cross-tree constraints.
//!
//! Features are stored in discovery order and addressed by [`FeatureId`]; parent, children and
//! group members are id references into the same arena. A model is built once from a
//! [`FeatureDocument`] and never mutated afterwards, so it can be shared between requests.
//! Its CNF encoding is computed on first use and cached alongside it.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::cnf::Cnf;
use crate::document::{FeatureDocument, FeatureNode, GroupMember};
use crate::encoder::encode;
use crate::template::Template;
use crate::types::FeatureId;

/// Kind of sibling group owned by a feature.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum GroupKind {
    #[default]
    None,
    /// Exactly one member must be selected with the owner.
    Xor,
    /// At least one member must be selected with the owner.
    Or,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::None => write!(f, "none"),
            GroupKind::Xor => write!(f, "xor"),
            GroupKind::Or => write!(f, "or"),
        }
    }
}

/// A feature in a feature model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    pub mandatory: bool,
    pub parent: Option<FeatureId>,
    /// Nested features first, then inline-declared group members.
    pub children: Vec<FeatureId>,
    pub group: GroupKind,
    pub group_members: Vec<FeatureId>,
}

impl Feature {
    /// Group kind, or [`GroupKind::None`] when the group has no members.
    pub fn group_kind(&self) -> GroupKind {
        if self.group_members.is_empty() {
            GroupKind::None
        } else {
            self.group
        }
    }
}

/// A cross-tree constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `dependent -> required`
    Requires {
        dependent: FeatureId,
        required: FeatureId,
        template: Template,
        statement: String,
    },
    /// Statement that matched no supported template.
    Unresolved(String),
}

impl Constraint {
    pub fn statement(&self) -> &str {
        match self {
            Constraint::Requires { statement, .. } => statement,
            Constraint::Unresolved(statement) => statement,
        }
    }
}

/// Error raised while building a [`FeatureModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document has no root feature.
    MissingRoot,
    /// A feature with an empty name.
    EmptyName,
    /// A feature name is declared more than once.
    DuplicateFeature(String),
    /// A constraint or group member names a feature that is never declared.
    UnknownReference { context: String, name: String },
    /// A group member reference names a feature that is not nested under the group owner.
    ForeignGroupMember { owner: String, member: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingRoot => write!(f, "no root feature"),
            ParseError::EmptyName => write!(f, "feature with an empty name"),
            ParseError::DuplicateFeature(name) => write!(f, "duplicate feature `{}`", name),
            ParseError::UnknownReference { context, name } => {
                write!(f, "unknown feature `{}` in {}", name, context)
            }
            ParseError::ForeignGroupMember { owner, member } => {
                write!(f, "group of `{}` refers to `{}`, which is not nested under it", owner, member)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Represents a complete feature model
#[derive(Debug, Clone)]
pub struct FeatureModel {
    features: Vec<Feature>,
    index: HashMap<String, FeatureId>,
    constraints: Vec<Constraint>,
    cnf: OnceLock<Cnf>,
}

impl FeatureModel {
    /// Builds a model from a validated document.
    ///
    /// Ids are assigned in pre-order: the root gets 1, then each feature is followed by its
    /// nested features and then its inline group members. On error nothing is returned.
    pub fn from_document(doc: &FeatureDocument) -> Result<Self, ParseError> {
        let root = doc.root.as_ref().ok_or(ParseError::MissingRoot)?;

        let mut builder = Builder::default();
        builder.visit(root, None, false)?;
        let Builder { features, index } = builder;

        let mut constraints = Vec::with_capacity(doc.constraints.len());
        for statement in &doc.constraints {
            let statement = statement.trim();
            if statement.is_empty() {
                log::debug!("Skipping empty constraint statement");
                continue;
            }
            let constraint = match Template::match_statement(statement) {
                Some(m) => {
                    let resolve = |name: &str| {
                        index.get(name).copied().ok_or_else(|| ParseError::UnknownReference {
                            context: format!("constraint `{}`", statement),
                            name: name.to_string(),
                        })
                    };
                    Constraint::Requires {
                        dependent: resolve(m.antecedent.as_str())?,
                        required: resolve(m.consequent.as_str())?,
                        template: m.template,
                        statement: statement.to_string(),
                    }
                }
                None => Constraint::Unresolved(statement.to_string()),
            };
            constraints.push(constraint);
        }

        log::debug!(
            "Built feature model with {} features and {} constraints",
            features.len(),
            constraints.len()
        );

        Ok(Self {
            features,
            index,
            constraints,
            cnf: OnceLock::new(),
        })
    }

    /// The root feature (always id 1).
    pub fn root(&self) -> FeatureId {
        FeatureId::new(1)
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// All feature ids, in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        (0..self.features.len()).map(FeatureId::from_index)
    }

    /// Returns the feature with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn feature(&self, id: FeatureId) -> &Feature {
        &self.features[id.index()]
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.index())
    }

    pub fn name(&self, id: FeatureId) -> &str {
        &self.feature(id).name
    }

    pub fn id_of(&self, name: &str) -> Option<FeatureId> {
        self.index.get(name).copied()
    }

    pub fn parent(&self, id: FeatureId) -> Option<FeatureId> {
        self.feature(id).parent
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The CNF encoding of this model, computed on first call.
    pub fn cnf(&self) -> &Cnf {
        self.cnf.get_or_init(|| encode(self))
    }
}

#[derive(Default)]
struct Builder {
    features: Vec<Feature>,
    index: HashMap<String, FeatureId>,
}

impl Builder {
    fn declare(&mut self, node: &FeatureNode, parent: Option<FeatureId>, mandatory: bool) -> Result<FeatureId, ParseError> {
        if node.name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        if self.index.contains_key(&node.name) {
            return Err(ParseError::DuplicateFeature(node.name.clone()));
        }

        let id = FeatureId::from_index(self.features.len());
        self.index.insert(node.name.clone(), id);
        self.features.push(Feature {
            id,
            name: node.name.clone(),
            mandatory,
            parent,
            children: Vec::new(),
            group: GroupKind::None,
            group_members: Vec::new(),
        });
        if let Some(p) = parent {
            self.features[p.index()].children.push(id);
        }
        Ok(id)
    }

    fn visit(&mut self, node: &FeatureNode, parent: Option<FeatureId>, mandatory: bool) -> Result<FeatureId, ParseError> {
        let id = self.declare(node, parent, mandatory)?;

        for child in &node.features {
            self.visit(child, Some(id), child.mandatory)?;
        }

        if let Some(group) = &node.group {
            let mut members = Vec::with_capacity(group.members.len());
            for member in &group.members {
                let member_id = match member {
                    GroupMember::Declared(child) => {
                        if child.mandatory {
                            log::warn!("Ignoring `mandatory` on group member `{}`", child.name);
                        }
                        self.visit(child, Some(id), false)?
                    }
                    GroupMember::Reference(name) => {
                        let member_id = *self.index.get(name).ok_or_else(|| ParseError::UnknownReference {
                            context: format!("group of `{}`", node.name),
                            name: name.clone(),
                        })?;
                        if self.features[member_id.index()].parent != Some(id) {
                            return Err(ParseError::ForeignGroupMember {
                                owner: node.name.clone(),
                                member: name.clone(),
                            });
                        }
                        if members.contains(&member_id) {
                            return Err(ParseError::DuplicateFeature(name.clone()));
                        }
                        let feature = &mut self.features[member_id.index()];
                        if feature.mandatory {
                            log::warn!("Ignoring `mandatory` on group member `{}`", feature.name);
                            feature.mandatory = false;
                        }
                        member_id
                    }
                };
                members.push(member_id);
            }

            let feature = &mut self.features[id.index()];
            feature.group = group.kind;
            feature.group_members = members;
        }

        Ok(id)
    }
}
