//! Relation objects and the per-document relation index

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MentionId, RelexError, Result};

/// Outcome used for "no relation" predictions and retained negatives
pub const NO_RELATION_CATEGORY: &str = "-NONE-";

/// Role of an argument within a binary relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentRole {
    Arg1,
    Arg2,
}

impl ArgumentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arg1 => "Arg1",
            Self::Arg2 => "Arg2",
        }
    }
}

impl std::fmt::Display for ArgumentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A role-tagged relation argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationArgument {
    pub role: ArgumentRole,
    pub mention: MentionId,
}

/// A directional binary relation between two mentions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    id: Uuid,
    document_id: String,
    arg1: RelationArgument,
    arg2: RelationArgument,
    category: String,
}

impl Relation {
    /// Create a relation, binding `Arg1` to `arg1` and `Arg2` to `arg2`
    pub fn new(
        document_id: impl Into<String>,
        arg1: MentionId,
        arg2: MentionId,
        category: impl Into<String>,
    ) -> Result<Self> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(RelexError::InvalidRelation(
                "category must not be empty".to_string(),
            ));
        }
        if category == NO_RELATION_CATEGORY {
            return Err(RelexError::InvalidRelation(format!(
                "{NO_RELATION_CATEGORY} is not a relation category"
            )));
        }
        if arg1 == arg2 {
            return Err(RelexError::InvalidRelation(format!(
                "mention {arg1} cannot be related to itself"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            document_id: document_id.into(),
            arg1: RelationArgument {
                role: ArgumentRole::Arg1,
                mention: arg1,
            },
            arg2: RelationArgument {
                role: ArgumentRole::Arg2,
                mention: arg2,
            },
            category,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn arg1(&self) -> &RelationArgument {
        &self.arg1
    }

    pub fn arg2(&self) -> &RelationArgument {
        &self.arg2
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    fn key(&self) -> (MentionId, MentionId) {
        (self.arg1.mention.clone(), self.arg2.mention.clone())
    }
}

// ============================================================================
// Relation Index
// ============================================================================

/// Append-only collection of relations for one document
///
/// At most one relation exists per ordered argument pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "IndexRepr", into = "IndexRepr")]
pub struct RelationIndex {
    document_id: String,
    relations: Vec<Relation>,
    pairs: HashSet<(MentionId, MentionId)>,
}

#[derive(Serialize, Deserialize)]
struct IndexRepr {
    document_id: String,
    relations: Vec<Relation>,
}

impl From<IndexRepr> for RelationIndex {
    fn from(repr: IndexRepr) -> Self {
        let mut index = RelationIndex::new(repr.document_id);
        for relation in repr.relations {
            index.insert(relation);
        }
        index
    }
}

impl From<RelationIndex> for IndexRepr {
    fn from(index: RelationIndex) -> Self {
        Self {
            document_id: index.document_id,
            relations: index.relations,
        }
    }
}

impl RelationIndex {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            relations: Vec::new(),
            pairs: HashSet::new(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Append a relation; returns `false` if its ordered pair is already present
    pub fn insert(&mut self, relation: Relation) -> bool {
        if !self.pairs.insert(relation.key()) {
            return false;
        }
        self.relations.push(relation);
        true
    }

    /// Whether a relation already exists for `(arg1, arg2)` in that order
    pub fn contains(&self, arg1: &MentionId, arg2: &MentionId) -> bool {
        self.pairs.contains(&(arg1.clone(), arg2.clone()))
    }

    /// Move all relations of `other` into this index, returning how many were added
    pub fn merge(&mut self, other: RelationIndex) -> usize {
        other
            .relations
            .into_iter()
            .map(|r| self.insert(r))
            .filter(|&added| added)
            .count()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
