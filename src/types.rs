//! Type-safe wrappers for feature identifiers and literals.
//!
//! Feature ids double as CNF variables, so they follow the DIMACS convention:
//! ids are 1-indexed and a literal is a signed id.
use std::fmt;
use std::ops::Neg;

/// A feature identifier (1-indexed).
///
/// Ids are assigned once, in discovery order, when a [`FeatureModel`][crate::model::FeatureModel]
/// is built. The root always gets id 1.
///
/// # Invariants
///
/// - Ids must be >= 1 (0 is not a valid DIMACS variable)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FeatureId(u32);

impl FeatureId {
    /// Creates a new feature id.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Feature ids must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Feature IDs must be >= 1");
        FeatureId(id)
    }

    /// Returns the raw id as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the 0-based index of this feature in the model arena.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Creates the id of the feature stored at `index` in the arena.
    pub fn from_index(index: usize) -> Self {
        FeatureId::new(index as u32 + 1)
    }

    /// Positive literal of this feature.
    pub fn pos(self) -> Lit {
        Lit::new(self, true)
    }

    /// Negative literal of this feature.
    pub fn neg(self) -> Lit {
        Lit::new(self, false)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

impl From<FeatureId> for u32 {
    fn from(id: FeatureId) -> Self {
        id.0
    }
}

/// A signed literal over a feature variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit {
    feature: FeatureId,
    positive: bool,
}

impl Lit {
    pub fn new(feature: FeatureId, positive: bool) -> Self {
        Self { feature, positive }
    }

    /// Creates a literal from its DIMACS form (`3` is `f3`, `-3` is `¬f3`).
    ///
    /// # Panics
    ///
    /// Panics if `lit == 0`.
    pub fn from_dimacs(lit: i32) -> Self {
        Lit::new(FeatureId::new(lit.unsigned_abs()), lit > 0)
    }

    /// Returns the DIMACS form of this literal.
    pub fn to_dimacs(self) -> i32 {
        let v = self.feature.id() as i32;
        if self.positive {
            v
        } else {
            -v
        }
    }

    pub fn feature(self) -> FeatureId {
        self.feature
    }

    pub fn is_positive(self) -> bool {
        self.positive
    }

    pub fn is_negative(self) -> bool {
        !self.positive
    }
}

impl Neg for Lit {
    type Output = Lit;

    fn neg(self) -> Self::Output {
        Lit::new(self.feature, !self.positive)
    }
}

impl From<i32> for Lit {
    fn from(lit: i32) -> Self {
        Lit::from_dimacs(lit)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.positive {
            write!(f, "{}", self.feature)
        } else {
            write!(f, "¬{}", self.feature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_id_creation() {
        let f1 = FeatureId::new(1);
        let f2 = FeatureId::new(2);
        assert_eq!(f1.id(), 1);
        assert_eq!(f2.index(), 1);
        assert_eq!(FeatureId::from_index(0), f1);
        assert!(f1 < f2);
    }

    #[test]
    #[should_panic(expected = "Feature IDs must be >= 1")]
    fn test_feature_id_zero_panics() {
        FeatureId::new(0);
    }

    #[test]
    fn test_lit_dimacs() {
        let lit = Lit::from_dimacs(-3);
        assert!(lit.is_negative());
        assert_eq!(lit.feature(), FeatureId::new(3));
        assert_eq!(lit.to_dimacs(), -3);
        assert_eq!(-lit, FeatureId::new(3).pos());
        assert_eq!(Lit::from(5).to_dimacs(), 5);
    }

    #[test]
    fn test_lit_display() {
        assert_eq!(FeatureId::new(2).pos().to_string(), "f2");
        assert_eq!(FeatureId::new(2).neg().to_string(), "¬f2");
    }
}
