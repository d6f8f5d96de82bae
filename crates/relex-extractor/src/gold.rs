//! Gold relation table
//!
//! Built once per document from its gold annotations and read-only afterwards.

use std::collections::HashMap;

use relex_core::{Document, GoldAnnotation, MentionId, RelexError, Result};

use crate::relation::{CategoryRegistry, Symmetry};

/// A gold category with its symmetry resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldEntry {
    pub category: String,
    pub symmetry: Symmetry,
}

/// Mapping from an ordered mention pair to its gold category
#[derive(Debug, Clone, Default)]
pub struct GoldRelationTable {
    entries: HashMap<MentionId, HashMap<MentionId, GoldEntry>>,
    len: usize,
}

impl GoldRelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from a document's gold annotations.
    ///
    /// Fails with [`RelexError::GoldConflict`] when the same ordered pair is
    /// labeled with two different categories. Exact duplicates are ignored.
    pub fn from_document(document: &Document, registry: &CategoryRegistry) -> Result<Self> {
        Self::from_annotations(&document.gold_relations, registry)
    }

    pub fn from_annotations(
        annotations: &[GoldAnnotation],
        registry: &CategoryRegistry,
    ) -> Result<Self> {
        let mut table = Self::new();
        for annotation in annotations {
            if !registry.contains(&annotation.category) {
                tracing::debug!(
                    category = %annotation.category,
                    "Unregistered gold category treated as directional"
                );
            }
            table.insert(
                annotation.arg1.clone(),
                annotation.arg2.clone(),
                GoldEntry {
                    category: annotation.category.clone(),
                    symmetry: registry.symmetry(&annotation.category),
                },
            )?;
        }
        Ok(table)
    }

    /// Insert a gold entry for `(arg1, arg2)`
    pub fn insert(&mut self, arg1: MentionId, arg2: MentionId, entry: GoldEntry) -> Result<()> {
        let row = self.entries.entry(arg1.clone()).or_default();
        match row.get(&arg2) {
            Some(existing) if existing.category == entry.category => Ok(()),
            Some(existing) => Err(RelexError::GoldConflict {
                arg1,
                arg2,
                existing: existing.category.clone(),
                conflicting: entry.category,
            }),
            None => {
                row.insert(arg2, entry);
                self.len += 1;
                Ok(())
            }
        }
    }

    /// Gold entry for `(arg1, arg2)` in exactly that order
    pub fn get(&self, arg1: &MentionId, arg2: &MentionId) -> Option<&GoldEntry> {
        self.entries.get(arg1).and_then(|row| row.get(arg2))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MentionId {
        MentionId::new(s)
    }

    #[test]
    fn test_table_resolves_symmetry_once() {
        let annotations = vec![
            GoldAnnotation::new("E1", "E2", "BEFORE"),
            GoldAnnotation::new("E2", "E3", "OVERLAP"),
        ];
        let table =
            GoldRelationTable::from_annotations(&annotations, &CategoryRegistry::temporal())
                .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(&id("E1"), &id("E2")).map(|e| e.symmetry),
            Some(Symmetry::Directional)
        );
        assert_eq!(
            table.get(&id("E2"), &id("E3")).map(|e| e.symmetry),
            Some(Symmetry::Symmetric)
        );
        assert!(table.get(&id("E2"), &id("E1")).is_none());
    }

    #[test]
    fn test_duplicate_annotation_is_ignored() {
        let annotations = vec![
            GoldAnnotation::new("E1", "E2", "BEFORE"),
            GoldAnnotation::new("E1", "E2", "BEFORE"),
        ];
        let table =
            GoldRelationTable::from_annotations(&annotations, &CategoryRegistry::temporal())
                .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_double_booked_pair_is_an_error() {
        let annotations = vec![
            GoldAnnotation::new("E1", "E2", "BEFORE"),
            GoldAnnotation::new("E1", "E2", "OVERLAP"),
        ];
        let err = GoldRelationTable::from_annotations(&annotations, &CategoryRegistry::temporal())
            .unwrap_err();

        match err {
            RelexError::GoldConflict {
                existing,
                conflicting,
                ..
            } => {
                assert_eq!(existing, "BEFORE");
                assert_eq!(conflicting, "OVERLAP");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_both_directions_may_be_annotated() {
        let annotations = vec![
            GoldAnnotation::new("E1", "E2", "BEFORE"),
            GoldAnnotation::new("E2", "E1", "CONTAINS"),
        ];
        let table =
            GoldRelationTable::from_annotations(&annotations, &CategoryRegistry::temporal())
                .unwrap();
        assert_eq!(table.len(), 2);
    }
}
