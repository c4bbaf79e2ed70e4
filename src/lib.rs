//! # fm-logic: Feature Models to Propositional Logic
//!
//! **`fm-logic`** translates hierarchical *feature models* into CNF and uses that encoding to
//! validate feature selections and to enumerate *minimum working products* (MWPs).
//!
//! ## What is a feature model?
//!
//! A feature model is a tree of configurable options. Children are either **mandatory**
//! (selecting the parent forces them) or **optional**. A feature may own a **group** of children:
//! an **XOR** group requires exactly one member, an **OR** group at least one. On top of the tree,
//! **cross-tree constraints** such as `"Search requires Index"` tie distant features together.
//!
//! ## Key Features
//!
//! - **Arena model**: features live in a [`FeatureModel`][crate::model::FeatureModel] and refer to
//!   each other by [`FeatureId`][crate::types::FeatureId]. The model is immutable once built and can
//!   be shared freely between threads.
//! - **1-Based Indexing**: feature ids double as CNF variables in DIMACS convention; the root is
//!   always id 1.
//! - **Lossless encoding**: every clause remembers the rule it came from, so it can be rendered as
//!   readable logic (`Engine → Car`, `¬(Petrol ∧ Electric)`) or exported to DIMACS.
//! - **Request-scoped solving**: validation opens a fresh solver session per request, under an
//!   optional wall-clock budget.
//! - **Bounded enumeration**: MWPs are counted exactly before they are enumerated, and a cap keeps
//!   the Cartesian product from running away.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fm_logic::document::{FeatureDocument, FeatureNode};
//! use fm_logic::model::{FeatureModel, GroupKind};
//! use fm_logic::mwp::MwpEnumerator;
//! use fm_logic::validate::ConfigurationValidator;
//!
//! // 1. Describe the model (normally handed over by the XML layer)
//! let doc = FeatureDocument::new(
//!     FeatureNode::new("Car")
//!         .with_feature(
//!             FeatureNode::new("Engine")
//!                 .mandatory()
//!                 .with_group(GroupKind::Xor, [FeatureNode::new("Petrol"), FeatureNode::new("Electric")]),
//!         )
//!         .with_feature(FeatureNode::new("Radio")),
//! );
//!
//! // 2. Build the immutable model
//! let model = FeatureModel::from_document(&doc).unwrap();
//!
//! // 3. Inspect the encoding
//! for entry in model.cnf().listing(&model) {
//!     println!("{}", entry);
//! }
//!
//! // 4. Validate a selection
//! let validator = ConfigurationValidator::new(&model);
//! assert!(validator.validate(&["Car", "Engine", "Petrol"]).unwrap().is_valid());
//! assert!(!validator.validate(&["Car", "Engine", "Petrol", "Electric"]).unwrap().is_valid());
//!
//! // 5. Enumerate minimum working products
//! let products = MwpEnumerator::new(&model).enumerate().unwrap();
//! assert_eq!(products.len(), 2);
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: the feature arena and its construction from a [`document`].
//! - **[`encoder`]**: the translation of a model into [`cnf`].
//! - **[`oracle`]**: the satisfiability contract and its `varisat` backend.
//! - **[`validate`]**: configuration validation.
//! - **[`mwp`]**: minimum working product enumeration.
//! - **[`analysis`]**: core/dead features and other model queries.

pub mod analysis;
pub mod cnf;
pub mod config;
pub mod document;
pub mod encoder;
pub mod model;
pub mod mwp;
pub mod oracle;
pub mod template;
pub mod types;
pub mod validate;
