//! Relation emission

use relex_core::{Relation, RelationIndex, Result};

use crate::candidate::CandidatePair;

/// Turns an accepted `(pair, category)` into a relation in the document's index
pub trait RelationEmitter: Send {
    /// Returns `Ok(false)` when the pair already has a relation in `index`
    fn emit(
        &self,
        index: &mut RelationIndex,
        pair: &CandidatePair<'_>,
        category: &str,
    ) -> Result<bool>;
}

/// Binds `Arg1` to the pair's first mention and `Arg2` to the second
///
/// The predicted category is kept as-is, including inverse (`-1`) labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentPairEmitter;

impl RelationEmitter for ArgumentPairEmitter {
    fn emit(
        &self,
        index: &mut RelationIndex,
        pair: &CandidatePair<'_>,
        category: &str,
    ) -> Result<bool> {
        let (arg1, arg2) = pair.ids();
        if index.contains(arg1, arg2) {
            tracing::debug!(%arg1, %arg2, "Relation already emitted for pair");
            return Ok(false);
        }

        let relation = Relation::new(index.document_id(), arg1.clone(), arg2.clone(), category)?;
        Ok(index.insert(relation))
    }
}
