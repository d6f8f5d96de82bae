//! Training label resolution
//!
//! Maps a candidate pair to its gold category. A gold relation recorded with
//! the arguments swapped still counts: symmetric categories keep their label,
//! directional ones get the inverse suffix. Pairs with no gold relation are
//! subsampled as negatives.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use relex_core::{ConfigError, MentionId, Result};

use crate::candidate::CandidatePair;
use crate::gold::GoldRelationTable;
use crate::relation::inverse_label;

/// Outcome of resolving one candidate pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The pair has a gold relation with this label
    Positive(String),
    /// No gold relation; kept as a negative example
    Negative,
    /// No gold relation; not selected for training
    Dropped,
}

/// Strategy for labeling candidate pairs during training
///
/// An error fails the current document.
pub trait LabelResolver: Send {
    fn resolve(
        &mut self,
        table: &GoldRelationTable,
        pair: &CandidatePair<'_>,
    ) -> Result<Resolution>;
}

/// Gold label for `(arg1, arg2)`, trying the reversed order second
pub fn gold_label(table: &GoldRelationTable, arg1: &MentionId, arg2: &MentionId) -> Option<String> {
    if let Some(entry) = table.get(arg1, arg2) {
        return Some(entry.category.clone());
    }
    table
        .get(arg2, arg1)
        .map(|entry| inverse_label(&entry.category, entry.symmetry))
}

// ============================================================================
// Negative sampling
// ============================================================================

/// Keeps each negative with a fixed probability using an owned random source
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    keep_probability: f64,
    rng: StdRng,
}

impl NegativeSampler {
    /// Create a sampler; a `None` seed draws from OS entropy
    pub fn new(keep_probability: f64, seed: Option<u64>) -> Result<Self> {
        if !(0.0..=1.0).contains(&keep_probability) {
            return Err(ConfigError::InvalidValue {
                key: "negative_keep_probability".to_string(),
                value: keep_probability.to_string(),
            }
            .into());
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            keep_probability,
            rng,
        })
    }

    pub fn keep_probability(&self) -> f64 {
        self.keep_probability
    }

    /// One independent draw: `u < p` with `u` uniform on `[0, 1)`
    pub fn keep(&mut self) -> bool {
        self.rng.random::<f64>() < self.keep_probability
    }
}

// ============================================================================
// Gold label resolver
// ============================================================================

/// Resolves pairs against the gold table and subsamples negatives
#[derive(Debug, Clone)]
pub struct GoldLabelResolver {
    sampler: NegativeSampler,
}

impl GoldLabelResolver {
    pub fn new(sampler: NegativeSampler) -> Self {
        Self { sampler }
    }

    pub fn sampler(&self) -> &NegativeSampler {
        &self.sampler
    }
}

impl LabelResolver for GoldLabelResolver {
    fn resolve(
        &mut self,
        table: &GoldRelationTable,
        pair: &CandidatePair<'_>,
    ) -> Result<Resolution> {
        let (arg1, arg2) = pair.ids();
        Ok(match gold_label(table, arg1, arg2) {
            Some(label) => Resolution::Positive(label),
            None if self.sampler.keep() => Resolution::Negative,
            None => Resolution::Dropped,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
