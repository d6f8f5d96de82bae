//! Document-structure and ontology features

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use relex_core::{Context, Document, Mention, RelexError, Result};

use super::{Feature, FeatureExtractor};
use crate::candidate::CandidatePair;

// ============================================================================
// Section header
// ============================================================================

/// Header of the section each argument appears in
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionHeaderFeatures;

impl FeatureExtractor for SectionHeaderFeatures {
    fn name(&self) -> &str {
        "section"
    }

    fn extract(
        &self,
        document: &Document,
        _context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let section1 = document.section_at(pair.arg1.begin);
        let section2 = document.section_at(pair.arg2.begin);

        let mut features = Vec::new();
        if let Some(s) = section1 {
            features.push(Feature::new("arg1_section", s.header.to_lowercase()));
        }
        if let Some(s) = section2 {
            features.push(Feature::new("arg2_section", s.header.to_lowercase()));
        }
        if let (Some(a), Some(b)) = (section1, section2) {
            features.push(Feature::new("same_section", a.begin == b.begin));
        }
        Ok(features)
    }
}

// ============================================================================
// Concept dictionary
// ============================================================================

/// Read-only lookup from surface form to ontology semantic groups
///
/// Loaded from a JSON object such as
/// `{"chest pain": ["DISO"], "aspirin": ["CHEM"]}`; keys are matched
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ConceptDictionary {
    entries: HashMap<String, Vec<String>>,
}

impl ConceptDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&content)?;
        let dictionary: Self = raw.into_iter().collect();
        tracing::info!(
            path = %path.display(),
            entries = dictionary.len(),
            "Loaded concept dictionary"
        );
        Ok(dictionary)
    }

    pub fn insert(&mut self, term: &str, groups: Vec<String>) {
        self.entries.insert(term.to_lowercase(), groups);
    }

    pub fn lookup(&self, term: &str) -> &[String] {
        self.entries
            .get(&term.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for ConceptDictionary {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut dictionary = Self::new();
        for (term, groups) in iter {
            dictionary.insert(&term, groups);
        }
        dictionary
    }
}

// ============================================================================
// Concept features
// ============================================================================

/// Semantic groups of each argument and whether they share one
#[derive(Debug, Clone)]
pub struct ConceptFeatures {
    dictionary: Arc<ConceptDictionary>,
}

impl ConceptFeatures {
    pub fn new(dictionary: Arc<ConceptDictionary>) -> Self {
        Self { dictionary }
    }

    fn groups<'d>(&'d self, document: &Document, mention: &Mention) -> Result<BTreeSet<&'d str>> {
        let text = document.mention_text(mention).ok_or_else(|| {
            RelexError::MissingAnnotation(format!("text for mention {}", mention.id))
        })?;
        Ok(self
            .dictionary
            .lookup(text.trim())
            .iter()
            .map(String::as_str)
            .collect())
    }
}

impl FeatureExtractor for ConceptFeatures {
    fn name(&self) -> &str {
        "concept"
    }

    fn extract(
        &self,
        document: &Document,
        _context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let groups1 = self.groups(document, pair.arg1)?;
        let groups2 = self.groups(document, pair.arg2)?;

        let mut features: Vec<Feature> = groups1
            .iter()
            .map(|g| Feature::new(format!("arg1_semantic_group:{g}"), true))
            .chain(
                groups2
                    .iter()
                    .map(|g| Feature::new(format!("arg2_semantic_group:{g}"), true)),
            )
            .collect();

        if !groups1.is_empty() && !groups2.is_empty() {
            let shared = groups1.intersection(&groups2).next().is_some();
            features.push(Feature::new("same_semantic_group", shared));
        }
        Ok(features)
    }
}

// ============================================================================
// Tests
// ============================================================================
