//! Engine configuration.

use std::time::Duration;

/// How a selection is interpreted during validation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SelectionMode {
    /// The selection is the whole configuration: unselected features are assumed false.
    #[default]
    Complete,
    /// Only the selected features are assumed; the solver completes the rest.
    Partial,
}

/// What the MWP enumerator does with cross-tree constraints.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum CrossTreePolicy {
    /// Enumerate structural minimum working products only.
    #[default]
    Ignore,
    /// Drop products that violate a resolved cross-tree constraint.
    Filter,
}

/// Configuration for validation, analysis and enumeration.
///
/// Use `Config::default()` for standard settings and the `with_*` methods to adjust them.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fm_logic::config::{Config, SelectionMode};
///
/// let config = Config::default()
///     .with_solve_timeout(Some(Duration::from_secs(2)))
///     .with_max_configurations(500)
///     .with_selection_mode(SelectionMode::Partial);
/// assert_eq!(config.max_configurations, 500);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Wall-clock budget of a single solve call; `None` disables the budget (default: 10s)
    pub solve_timeout: Option<Duration>,
    /// Maximum number of minimum working products to enumerate (default: 10000)
    pub max_configurations: usize,
    /// Selection interpretation for validation (default: complete)
    pub selection_mode: SelectionMode,
    /// Cross-tree handling during enumeration (default: ignore)
    pub cross_tree: CrossTreePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solve_timeout: Some(Duration::from_secs(10)),
            max_configurations: 10_000,
            selection_mode: SelectionMode::Complete,
            cross_tree: CrossTreePolicy::Ignore,
        }
    }
}

impl Config {
    pub fn with_solve_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.solve_timeout = timeout;
        self
    }

    pub fn with_max_configurations(mut self, max: usize) -> Self {
        self.max_configurations = max;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    pub fn with_cross_tree(mut self, policy: CrossTreePolicy) -> Self {
        self.cross_tree = policy;
        self
    }
}
