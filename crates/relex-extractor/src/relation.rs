//! Relation categories
//!
//! Each category carries a symmetry tag that decides how a gold relation
//! matched in reverse argument order is labeled. Tags are resolved once
//! through a [`CategoryRegistry`] when the gold table is built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use relex_core::CategoryConfig;

/// Suffix marking a directional category that holds in reverse argument order
pub const INVERSE_SUFFIX: &str = "-1";

// ============================================================================
// Temporal categories
// ============================================================================

/// Temporal relation categories between events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalCategory {
    Before,
    Overlap,
    Contains,
    BeginsOn,
    EndsOn,
}

impl TemporalCategory {
    pub const ALL: [TemporalCategory; 5] = [
        Self::Before,
        Self::Overlap,
        Self::Contains,
        Self::BeginsOn,
        Self::EndsOn,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::Overlap => "OVERLAP",
            Self::Contains => "CONTAINS",
            Self::BeginsOn => "BEGINS-ON",
            Self::EndsOn => "ENDS-ON",
        }
    }

    pub fn symmetry(&self) -> Symmetry {
        match self {
            Self::Overlap => Symmetry::Symmetric,
            _ => Symmetry::Directional,
        }
    }
}

impl std::str::FromStr for TemporalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('_', "-").as_str() {
            "BEFORE" => Ok(Self::Before),
            "OVERLAP" => Ok(Self::Overlap),
            "CONTAINS" => Ok(Self::Contains),
            "BEGINS-ON" => Ok(Self::BeginsOn),
            "ENDS-ON" => Ok(Self::EndsOn),
            other => Err(format!("unknown temporal category: {other}")),
        }
    }
}

impl std::fmt::Display for TemporalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Symmetry and registry
// ============================================================================

/// Whether swapping the arguments preserves a category's meaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symmetry {
    Symmetric,
    Directional,
}

/// Static registry of relation categories and their symmetry
///
/// Unregistered categories are treated as directional.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    categories: HashMap<String, Symmetry>,
}

impl CategoryRegistry {
    /// Registry with no categories
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry seeded with the temporal categories
    pub fn temporal() -> Self {
        let mut registry = Self::empty();
        for category in TemporalCategory::ALL {
            registry.register(category.as_str(), category.symmetry());
        }
        registry
    }

    /// Temporal categories plus the configured additions
    pub fn from_config(config: &CategoryConfig) -> Self {
        let mut registry = Self::temporal();
        for name in &config.directional {
            registry.register(name, Symmetry::Directional);
        }
        for name in &config.symmetric {
            registry.register(name, Symmetry::Symmetric);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, symmetry: Symmetry) {
        self.categories.insert(name.into(), symmetry);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn symmetry(&self, name: &str) -> Symmetry {
        self.categories
            .get(name)
            .copied()
            .unwrap_or(Symmetry::Directional)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Category label for a relation matched with swapped arguments
pub fn inverse_label(category: &str, symmetry: Symmetry) -> String {
    match symmetry {
        Symmetry::Symmetric => category.to_string(),
        Symmetry::Directional => format!("{category}{INVERSE_SUFFIX}"),
    }
}

/// Split a predicted label into its base category and whether it is inverted
pub fn split_inverse(label: &str) -> (&str, bool) {
    match label.strip_suffix(INVERSE_SUFFIX) {
        Some(base) if !base.is_empty() => (base, true),
        _ => (label, false),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(TemporalCategory::Before.to_string(), "BEFORE");
        assert_eq!(TemporalCategory::BeginsOn.as_str(), "BEGINS-ON");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("overlap".parse::<TemporalCategory>(), Ok(TemporalCategory::Overlap));
        assert_eq!("ends_on".parse::<TemporalCategory>(), Ok(TemporalCategory::EndsOn));
        assert!("unknown".parse::<TemporalCategory>().is_err());
    }

    #[test]
    fn test_temporal_registry_symmetry() {
        let registry = CategoryRegistry::temporal();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.symmetry("OVERLAP"), Symmetry::Symmetric);
        assert_eq!(registry.symmetry("BEFORE"), Symmetry::Directional);
        assert_eq!(registry.symmetry("NOT-REGISTERED"), Symmetry::Directional);
    }

    #[test]
    fn test_registry_from_config() {
        let config = CategoryConfig {
            symmetric: vec!["SIMULTANEOUS".to_string()],
            directional: vec!["CAUSES".to_string()],
        };
        let registry = CategoryRegistry::from_config(&config);
        assert_eq!(registry.symmetry("SIMULTANEOUS"), Symmetry::Symmetric);
        assert!(registry.contains("CAUSES"));
        assert!(registry.contains("BEFORE"));
    }

    #[test]
    fn test_inverse_labels() {
        assert_eq!(inverse_label("BEFORE", Symmetry::Directional), "BEFORE-1");
        assert_eq!(inverse_label("OVERLAP", Symmetry::Symmetric), "OVERLAP");
        assert_eq!(split_inverse("BEFORE-1"), ("BEFORE", true));
        assert_eq!(split_inverse("OVERLAP"), ("OVERLAP", false));
        assert_eq!(split_inverse("-1"), ("-1", false));
    }
}
