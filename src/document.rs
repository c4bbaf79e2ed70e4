//! Input document model.
//!
//! A [`FeatureDocument`] is what the (external) XML layer hands over once the uploaded file has
//! passed schema validation: a root feature with nested features and groups, plus the list of
//! cross-tree constraint statements in plain English.
//!
//! [`parse_outline`] reads the same structure from an indentation-based text format, which is
//! handy for tests and for the command-line demo.

use std::io::{BufRead, BufReader, Read};

use crate::model::GroupKind;

/// A parsed feature-model document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDocument {
    pub root: Option<FeatureNode>,
    pub constraints: Vec<String>,
}

/// A `feature` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureNode {
    pub name: String,
    pub mandatory: bool,
    /// Directly nested `feature` elements.
    pub features: Vec<FeatureNode>,
    pub group: Option<GroupNode>,
}

/// A `group` element under a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub kind: GroupKind,
    pub members: Vec<GroupMember>,
}

/// A member of a group: either declared inline, or a reference to one of the directly nested
/// features of the group owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMember {
    Declared(FeatureNode),
    Reference(String),
}

impl FeatureNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: false,
            features: Vec::new(),
            group: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_feature(mut self, child: FeatureNode) -> Self {
        self.features.push(child);
        self
    }

    pub fn with_group(mut self, kind: GroupKind, members: impl IntoIterator<Item = FeatureNode>) -> Self {
        self.group = Some(GroupNode {
            kind,
            members: members.into_iter().map(GroupMember::Declared).collect(),
        });
        self
    }
}

impl FeatureDocument {
    pub fn new(root: FeatureNode) -> Self {
        Self {
            root: Some(root),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, statement: impl Into<String>) -> Self {
        self.constraints.push(statement.into());
        self
    }
}

/// Open element while reading an outline.
enum Frame {
    Feature(FeatureNode),
    Group(GroupNode),
}

/// Parse a feature-model document from the outline text format
///
/// Format:
/// - Two spaces of indentation per nesting level
/// - `feature <name> [mandatory]` - Declare a feature
/// - `group xor` / `group or` - Open a group under the enclosing feature
/// - `ref <name>` - Group member referring to a feature nested under the group owner
/// - `constraint <statement>` - Cross-tree constraint in plain English (top level only)
/// - Lines starting with '#' are comments
pub fn parse_outline<R: Read>(reader: R) -> Result<FeatureDocument, String> {
    let buf_reader = BufReader::new(reader);
    let mut doc = FeatureDocument::default();
    let mut stack: Vec<(usize, Frame)> = Vec::new();
    let mut last_line = 0;

    for (line_num, line) in buf_reader.lines().enumerate() {
        let line_num = line_num + 1;
        last_line = line_num;
        let line = line.map_err(|e| format!("IO error at line {}: {}", line_num, e))?;
        let trimmed = line.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let leading = &line[..line.len() - line.trim_start().len()];
        if leading.contains('\t') {
            return Err(format!("Line {}: tabs are not allowed in indentation, use two spaces", line_num));
        }
        if leading.chars().any(|c| c != ' ') {
            return Err(format!("Line {}: indentation must consist of spaces only", line_num));
        }
        let indent = leading.len();
        if indent % 2 != 0 {
            return Err(format!("Line {}: indentation must be a multiple of two spaces", line_num));
        }
        let depth = indent / 2;

        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (trimmed, ""),
        };

        if keyword == "constraint" {
            if depth != 0 {
                return Err(format!("Line {}: constraints must not be indented", line_num));
            }
            if rest.is_empty() {
                return Err(format!("Line {}: constraint requires a statement", line_num));
            }
            close_frames(&mut stack, &mut doc, 0, line_num)?;
            doc.constraints.push(rest.to_string());
            continue;
        }

        close_frames(&mut stack, &mut doc, depth, line_num)?;
        match stack.last() {
            None if depth != 0 => {
                return Err(format!("Line {}: unexpected indentation", line_num));
            }
            Some((d, _)) if *d + 1 != depth => {
                return Err(format!("Line {}: unexpected indentation", line_num));
            }
            _ => {}
        }

        let parts: Vec<&str> = rest.split_whitespace().collect();
        match keyword {
            "feature" => {
                let node = match parts.as_slice() {
                    [name] => FeatureNode::new(*name),
                    [name, "mandatory"] => FeatureNode::new(*name).mandatory(),
                    _ => return Err(format!("Line {}: expected `feature <name> [mandatory]`", line_num)),
                };
                if depth == 0 && doc.root.is_some() {
                    return Err(format!("Line {}: second root feature `{}`", line_num, parts[0]));
                }
                stack.push((depth, Frame::Feature(node)));
            }
            "group" => {
                let kind = match parts.as_slice() {
                    ["xor"] => GroupKind::Xor,
                    ["or"] => GroupKind::Or,
                    _ => return Err(format!("Line {}: expected `group xor` or `group or`", line_num)),
                };
                if !matches!(stack.last(), Some((_, Frame::Feature(_)))) {
                    return Err(format!("Line {}: group must be nested under a feature", line_num));
                }
                let group = GroupNode {
                    kind,
                    members: Vec::new(),
                };
                stack.push((depth, Frame::Group(group)));
            }
            "ref" => {
                let name = match parts.as_slice() {
                    [name] => name.to_string(),
                    _ => return Err(format!("Line {}: expected `ref <name>`", line_num)),
                };
                match stack.last_mut() {
                    Some((_, Frame::Group(group))) => group.members.push(GroupMember::Reference(name)),
                    _ => return Err(format!("Line {}: ref must be nested under a group", line_num)),
                }
            }
            other => return Err(format!("Line {}: unknown keyword `{}`", line_num, other)),
        }
    }

    close_frames(&mut stack, &mut doc, 0, last_line)?;
    Ok(doc)
}

/// Pops every frame at `depth` or deeper, attaching each to its enclosing frame.
fn close_frames(
    stack: &mut Vec<(usize, Frame)>,
    doc: &mut FeatureDocument,
    depth: usize,
    line_num: usize,
) -> Result<(), String> {
    while stack.last().is_some_and(|(d, _)| *d >= depth) {
        let Some((_, frame)) = stack.pop() else {
            break;
        };
        match (stack.last_mut(), frame) {
            (None, Frame::Feature(node)) => doc.root = Some(node),
            (None, Frame::Group(_)) => {
                return Err(format!("Line {}: group must be nested under a feature", line_num));
            }
            (Some((_, Frame::Feature(parent))), Frame::Feature(node)) => parent.features.push(node),
            (Some((_, Frame::Feature(parent))), Frame::Group(group)) => {
                if parent.group.is_some() {
                    return Err(format!(
                        "Line {}: feature `{}` already has a group",
                        line_num, parent.name
                    ));
                }
                parent.group = Some(group);
            }
            (Some((_, Frame::Group(group))), Frame::Feature(node)) => {
                group.members.push(GroupMember::Declared(node));
            }
            (Some((_, Frame::Group(_))), Frame::Group(_)) => {
                return Err(format!("Line {}: groups cannot be nested directly", line_num));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_parse_outline() {
        let text = "\
# car
feature Car
  feature Engine mandatory
    group xor
      feature Petrol
      feature Electric
  feature Radio
constraint Radio requires Engine
";
        let doc = parse_outline(text.as_bytes()).unwrap();
        let expected = FeatureDocument::new(
            FeatureNode::new("Car")
                .with_feature(
                    FeatureNode::new("Engine")
                        .mandatory()
                        .with_group(GroupKind::Xor, [FeatureNode::new("Petrol"), FeatureNode::new("Electric")]),
                )
                .with_feature(FeatureNode::new("Radio")),
        )
        .with_constraint("Radio requires Engine");
        assert_eq!(doc, expected);
    }

    #[test]
    fn test_parse_outline_reference_member() {
        let text = "\
feature Root
  feature A
  feature B
  group or
    ref A
    ref B
    feature C
";
        let doc = parse_outline(text.as_bytes()).unwrap();
        let root = doc.root.unwrap();
        assert_eq!(root.features.len(), 2);
        let group = root.group.unwrap();
        assert_eq!(group.kind, GroupKind::Or);
        assert_eq!(
            group.members,
            vec![
                GroupMember::Reference("A".to_string()),
                GroupMember::Reference("B".to_string()),
                GroupMember::Declared(FeatureNode::new("C")),
            ]
        );
    }

    #[test]
    fn test_parse_outline_empty() {
        let doc = parse_outline("# nothing here\n".as_bytes()).unwrap();
        assert_eq!(doc.root, None);
    }

    #[test]
    fn test_parse_outline_errors() {
        assert!(parse_outline("feature A\n feature B\n".as_bytes()).is_err());
        assert!(parse_outline("feature A\n    feature B\n".as_bytes()).is_err());
        assert!(parse_outline("feature A\nfeature B\n".as_bytes()).is_err());
        assert!(parse_outline("group xor\n".as_bytes()).is_err());
        assert!(parse_outline("feature A\n  group and\n".as_bytes()).is_err());
        assert!(parse_outline("feature A\n  ref B\n".as_bytes()).is_err());
        assert!(parse_outline("feature A\n  group xor\n  group or\n".as_bytes()).is_err());
        assert!(parse_outline("feature A\n  constraint A requires A\n".as_bytes()).is_err());
        assert!(parse_outline("feature A optional\n".as_bytes()).is_err());
    }

    #[test]
    fn test_parse_outline_rejects_tabs() {
        let err = parse_outline("feature A\n\tfeature B\n".as_bytes()).unwrap_err();
        assert_eq!(err, "Line 2: tabs are not allowed in indentation, use two spaces");

        let err = parse_outline("feature A\n  \tfeature B\n".as_bytes()).unwrap_err();
        assert!(err.contains("tabs"), "{}", err);
    }
}
