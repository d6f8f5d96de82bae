//! Candidate pair generation
//!
//! Enumerates the mention pairs of a context that the rest of the pipeline
//! labels or classifies.

use relex_core::{Context, Document, Mention, MentionId};

/// An ordered pair of mentions considered for a relation
///
/// `arg1` precedes `arg2` in the enumeration order of the context.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub arg1: &'a Mention,
    pub arg2: &'a Mention,
}

impl<'a> CandidatePair<'a> {
    pub fn new(arg1: &'a Mention, arg2: &'a Mention) -> Self {
        Self { arg1, arg2 }
    }

    /// Identity key in argument order
    pub fn ids(&self) -> (&'a MentionId, &'a MentionId) {
        (&self.arg1.id, &self.arg2.id)
    }

    /// Byte span strictly between the two arguments, if they do not overlap
    pub fn gap(&self) -> Option<(usize, usize)> {
        let (first, second) = if self.arg1.begin <= self.arg2.begin {
            (self.arg1, self.arg2)
        } else {
            (self.arg2, self.arg1)
        };
        (first.end <= second.begin).then_some((first.end, second.begin))
    }
}

/// Strategy for enumerating candidate pairs within a context
pub trait CandidateGenerator: Send + Sync {
    fn candidates<'a>(&self, document: &'a Document, context: &Context)
        -> Vec<CandidatePair<'a>>;
}

/// Pairs every two mentions of exactly one type inside a context
///
/// Mentions of a more specific type (for example `MedicationEventMention`
/// under `EventMention`) carry their own tag and are skipped.
#[derive(Debug, Clone)]
pub struct ExactTypePairGenerator {
    target_type: String,
}

impl ExactTypePairGenerator {
    pub fn new(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
        }
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }
}

impl CandidateGenerator for ExactTypePairGenerator {
    fn candidates<'a>(
        &self,
        document: &'a Document,
        context: &Context,
    ) -> Vec<CandidatePair<'a>> {
        let mentions: Vec<&Mention> = document
            .mentions_in(context)
            .into_iter()
            .filter(|m| m.mention_type == self.target_type)
            .collect();

        let mut pairs = Vec::with_capacity(mentions.len() * mentions.len().saturating_sub(1) / 2);
        for (i, &arg1) in mentions.iter().enumerate() {
            for &arg2 in &mentions[i + 1..] {
                pairs.push(CandidatePair::new(arg1, arg2));
            }
        }
        pairs
    }
}

// ============================================================================
// Tests
// ============================================================================
