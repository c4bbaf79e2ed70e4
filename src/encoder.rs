use crate::cnf::{Clause, ClauseOrigin, Cnf, EncodingWarning};
use crate::model::{Constraint, FeatureModel, GroupKind};

/// Encode a feature model as CNF
///
/// Each feature is represented by its id as a CNF variable.
/// The resulting clauses are satisfied exactly by the valid configurations.
///
/// Clause order: the root unit clause, then the parent/child clauses of every feature in id
/// order, then group clauses in owner id order, then cross-tree constraints in document order.
/// Constraint statements that matched no template are reported as warnings instead.
pub fn encode(model: &FeatureModel) -> Cnf {
    let mut cnf = Cnf::new(model.num_features());

    let root = model.root();
    cnf.push(Clause::new(vec![root.pos()], ClauseOrigin::Root(root)));

    for feature in model.features() {
        let Some(parent) = feature.parent else {
            continue;
        };
        let child = feature.id;

        // child -> parent
        cnf.push(Clause::new(
            vec![child.neg(), parent.pos()],
            ClauseOrigin::ChildImpliesParent { child, parent },
        ));

        // parent -> child
        if feature.mandatory {
            cnf.push(Clause::new(
                vec![parent.neg(), child.pos()],
                ClauseOrigin::Mandatory { parent, child },
            ));
        }
    }

    for feature in model.features() {
        let owner = feature.id;
        let members = &feature.group_members;

        match feature.group_kind() {
            GroupKind::None => {}
            kind @ (GroupKind::Xor | GroupKind::Or) => {
                // owner -> (m1 OR ... OR mn)
                let mut lits = Vec::with_capacity(members.len() + 1);
                lits.push(owner.neg());
                lits.extend(members.iter().map(|m| m.pos()));
                cnf.push(Clause::new(
                    lits,
                    ClauseOrigin::GroupAtLeastOne {
                        owner,
                        members: members.clone(),
                    },
                ));

                // At most one: pairwise exclusion
                if kind == GroupKind::Xor {
                    for i in 0..members.len() {
                        for j in (i + 1)..members.len() {
                            let (a, b) = (members[i], members[j]);
                            cnf.push(Clause::new(vec![a.neg(), b.neg()], ClauseOrigin::GroupAtMostOne { a, b }));
                        }
                    }
                }
            }
        }
    }

    for (index, constraint) in model.constraints().iter().enumerate() {
        match constraint {
            Constraint::Requires {
                dependent, required, ..
            } => {
                cnf.push(Clause::new(
                    vec![dependent.neg(), required.pos()],
                    ClauseOrigin::CrossTree {
                        constraint: index,
                        dependent: *dependent,
                        required: *required,
                    },
                ));
            }
            Constraint::Unresolved(statement) => {
                let warning = EncodingWarning::UnmatchedConstraint {
                    constraint: index,
                    statement: statement.clone(),
                };
                log::warn!("{}", warning);
                cnf.warn(warning);
            }
        }
    }

    log::debug!(
        "Encoded {} features into {} clauses ({} warnings)",
        cnf.num_vars(),
        cnf.len(),
        cnf.warnings().len()
    );

    cnf
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::document::{FeatureDocument, FeatureNode};
    use crate::types::FeatureId;

    fn build(doc: FeatureDocument) -> FeatureModel {
        FeatureModel::from_document(&doc).unwrap()
    }

    fn dimacs(model: &FeatureModel) -> Vec<Vec<i32>> {
        model.cnf().clauses().iter().map(|c| c.to_dimacs()).collect()
    }

    #[test]
    fn test_encode_root_only() {
        let model = build(FeatureDocument::new(FeatureNode::new("Root")));
        assert_eq!(dimacs(&model), vec![vec![1]]);
        assert!(model.cnf().warnings().is_empty());
    }

    #[test]
    fn test_encode_optional_has_no_tautology() {
        let model = build(FeatureDocument::new(FeatureNode::new("Root").with_feature(FeatureNode::new("Opt"))));
        // Only root and child -> parent; nothing of the form p -> (f OR NOT f).
        assert_eq!(dimacs(&model), vec![vec![1], vec![-2, 1]]);
        for clause in model.cnf().clauses() {
            let vars: Vec<u32> = clause.lits.iter().map(|l| l.feature().id()).collect();
            let mut dedup = vars.clone();
            dedup.dedup();
            assert_eq!(vars.len(), dedup.len(), "tautological clause {:?}", clause);
        }
    }

    #[test]
    fn test_encode_mandatory() {
        let model = build(FeatureDocument::new(
            FeatureNode::new("Root").with_feature(FeatureNode::new("Core").mandatory()),
        ));
        assert_eq!(dimacs(&model), vec![vec![1], vec![-2, 1], vec![-1, 2]]);
    }

    #[test]
    fn test_encode_xor_group() {
        let model = build(FeatureDocument::new(FeatureNode::new("Root").with_group(
            GroupKind::Xor,
            [FeatureNode::new("A"), FeatureNode::new("B"), FeatureNode::new("C")],
        )));
        assert_eq!(
            dimacs(&model),
            vec![
                vec![1],
                vec![-2, 1],
                vec![-3, 1],
                vec![-4, 1],
                vec![-1, 2, 3, 4],
                vec![-2, -3],
                vec![-2, -4],
                vec![-3, -4],
            ]
        );
    }

    #[test]
    fn test_encode_or_group() {
        let model = build(FeatureDocument::new(
            FeatureNode::new("Root").with_group(GroupKind::Or, [FeatureNode::new("A"), FeatureNode::new("B")]),
        ));
        assert_eq!(dimacs(&model), vec![vec![1], vec![-2, 1], vec![-3, 1], vec![-1, 2, 3]]);
    }

    #[test]
    fn test_encode_empty_group_is_ignored() {
        let model = build(FeatureDocument::new(
            FeatureNode::new("Root").with_group(GroupKind::Xor, Vec::<FeatureNode>::new()),
        ));
        assert_eq!(dimacs(&model), vec![vec![1]]);
    }

    #[test]
    fn test_encode_cross_tree() {
        let doc = FeatureDocument::new(
            FeatureNode::new("Root")
                .with_feature(FeatureNode::new("A"))
                .with_feature(FeatureNode::new("B")),
        )
        .with_constraint("A requires B")
        .with_constraint("B depends on A")
        .with_constraint("A cannot be used without B")
        .with_constraint("B must be selected before A")
        .with_constraint("A conflicts with B");
        let model = build(doc);
        let cnf = model.cnf();

        let cross: Vec<Vec<i32>> = cnf
            .clauses()
            .iter()
            .filter(|c| matches!(c.origin, ClauseOrigin::CrossTree { .. }))
            .map(|c| c.to_dimacs())
            .collect();
        assert_eq!(cross, vec![vec![-2, 3], vec![-3, 2], vec![-2, 3], vec![-3, 2]]);

        assert_eq!(
            cnf.warnings(),
            &[EncodingWarning::UnmatchedConstraint {
                constraint: 4,
                statement: "A conflicts with B".to_string()
            }]
        );
    }

    #[test]
    fn test_encoding_is_cached() {
        let model = build(FeatureDocument::new(FeatureNode::new("Root")));
        let first: *const Cnf = model.cnf();
        let second: *const Cnf = model.cnf();
        assert_eq!(first, second);
        assert_eq!(model.cnf().num_vars(), 1);
        assert_eq!(model.cnf().clauses()[0].lits, vec![FeatureId::new(1).pos()]);
    }
}
