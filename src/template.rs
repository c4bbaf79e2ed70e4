//! Cross-tree constraint sentence templates.
//!
//! Constraints arrive as plain English. Only a fixed set of sentence shapes is understood, each
//! of the form `<A> <connective> <B>`. Matching is an explicit table lookup: a statement either
//! matches exactly one template and yields its two operands, or matches none.

use std::fmt;

/// A supported constraint sentence shape.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Template {
    /// `A requires B`
    Requires,
    /// `A depends on B`
    DependsOn,
    /// `A cannot be used without B`
    CannotBeUsedWithout,
    /// `A must be selected before B`: selecting `A` obliges `B` as its successor.
    SelectedBefore,
}

/// Connective phrases, lower-case, one word per entry.
const TEMPLATES: &[(Template, &[&str])] = &[
    (Template::Requires, &["requires"]),
    (Template::DependsOn, &["depends", "on"]),
    (Template::CannotBeUsedWithout, &["cannot", "be", "used", "without"]),
    (Template::SelectedBefore, &["must", "be", "selected", "before"]),
];

/// Outcome of a successful template match.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TemplateMatch {
    pub template: Template,
    /// Left operand `A`; selecting it implies the right operand.
    pub antecedent: String,
    /// Right operand `B`.
    pub consequent: String,
}

impl Template {
    pub fn all() -> impl Iterator<Item = Template> {
        TEMPLATES.iter().map(|(t, _)| *t)
    }

    /// The connective phrase, e.g. `"depends on"`.
    pub fn connective(self) -> String {
        TEMPLATES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, words)| words.join(" "))
            .unwrap_or_default()
    }

    /// Tries every template in table order and returns the first match.
    ///
    /// Connectives are matched case-insensitively on whole words. Both operands must be
    /// non-empty, and a trailing period on the statement is ignored.
    pub fn match_statement(statement: &str) -> Option<TemplateMatch> {
        let statement = statement.trim().trim_end_matches('.');
        let words: Vec<&str> = statement.split_whitespace().collect();

        for &(template, connective) in TEMPLATES {
            let n = connective.len();
            if words.len() < n + 2 {
                continue;
            }
            let Some(pos) = (1..=words.len() - n - 1).find(|&i| {
                words[i..i + n]
                    .iter()
                    .zip(connective)
                    .all(|(w, c)| w.eq_ignore_ascii_case(c))
            }) else {
                continue;
            };
            return Some(TemplateMatch {
                template,
                antecedent: words[..pos].join(" "),
                consequent: words[pos + n..].join(" "),
            });
        }

        None
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.connective())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_each_template() {
        let cases = [
            ("Search requires Index", Template::Requires),
            ("Search depends on Index", Template::DependsOn),
            ("Search cannot be used without Index", Template::CannotBeUsedWithout),
            ("Search must be selected before Index", Template::SelectedBefore),
        ];
        for (statement, template) in cases {
            let m = Template::match_statement(statement).unwrap();
            assert_eq!(m.template, template, "{}", statement);
            assert_eq!(m.antecedent, "Search");
            assert_eq!(m.consequent, "Index");
        }
    }

    #[test]
    fn test_match_is_case_insensitive_and_ignores_period() {
        let m = Template::match_statement("  Search   DEPENDS On Index. ").unwrap();
        assert_eq!(m.template, Template::DependsOn);
        assert_eq!(m.antecedent, "Search");
        assert_eq!(m.consequent, "Index");
    }

    #[test]
    fn test_no_match() {
        assert_eq!(Template::match_statement("Search excludes Index"), None);
        assert_eq!(Template::match_statement("requires Index"), None);
        assert_eq!(Template::match_statement("Search requires"), None);
        assert_eq!(Template::match_statement(""), None);
        // Connective must be whole words.
        assert_eq!(Template::match_statement("Search prerequires Index"), None);
    }

    #[test]
    fn test_multiword_operands() {
        let m = Template::match_statement("Location Filter requires Geo Service").unwrap();
        assert_eq!(m.antecedent, "Location Filter");
        assert_eq!(m.consequent, "Geo Service");
    }

    #[test]
    fn test_connective() {
        assert_eq!(Template::CannotBeUsedWithout.to_string(), "cannot be used without");
        assert_eq!(Template::all().count(), 4);
    }
}
