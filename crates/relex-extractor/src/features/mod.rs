//! Feature extraction pipeline
//!
//! Each extractor turns a candidate pair into named features. The pipeline
//! runs extractors in registration order and merges their output into one
//! [`FeatureVector`]. An extractor that fails (typically because an upstream
//! annotation such as the dependency parse is missing) contributes nothing for
//! that pair; the others still run.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use relex_core::{ConfigError, Context, Document, FeatureConfig, Result};

use crate::candidate::CandidatePair;

pub mod lexical;
pub mod semantic;
pub mod syntactic;

pub use lexical::{SpecialWordFeatures, TokenFeatures};
pub use semantic::{ConceptDictionary, ConceptFeatures, SectionHeaderFeatures};
pub use syntactic::{DependencyPathFeatures, NearbyVerbTenseFeatures, PartOfSpeechFeatures};

// ============================================================================
// Feature values
// ============================================================================

/// Value of a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for FeatureValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A named feature produced by an extractor
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub value: FeatureValue,
}

impl Feature {
    pub fn new(name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Immutable feature map for one candidate pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    features: BTreeMap<String, FeatureValue>,
}

impl FeatureVector {
    pub fn builder() -> FeatureVectorBuilder {
        FeatureVectorBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.features.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sparse numeric encoding used by linear classifiers.
    ///
    /// Text features become `name=value` indicators, false flags are dropped.
    pub fn encode(&self) -> Vec<(String, f64)> {
        self.features
            .iter()
            .filter_map(|(name, value)| match value {
                FeatureValue::Number(n) => Some((name.clone(), *n)),
                FeatureValue::Flag(true) => Some((name.clone(), 1.0)),
                FeatureValue::Flag(false) => None,
                FeatureValue::Text(text) => Some((format!("{name}={text}"), 1.0)),
            })
            .collect()
    }
}

/// Builder that accumulates features before freezing them
#[derive(Debug, Default)]
pub struct FeatureVectorBuilder {
    features: BTreeMap<String, FeatureValue>,
}

impl FeatureVectorBuilder {
    /// Add a feature; a repeated name replaces the earlier value
    pub fn push(&mut self, feature: Feature) -> &mut Self {
        self.features.insert(feature.name, feature.value);
        self
    }

    pub fn extend(&mut self, features: impl IntoIterator<Item = Feature>) -> &mut Self {
        for feature in features {
            self.push(feature);
        }
        self
    }

    pub fn build(self) -> FeatureVector {
        FeatureVector {
            features: self.features,
        }
    }
}

// ============================================================================
// Extractor contract
// ============================================================================

/// Produces features for a candidate pair
///
/// Implementations must not mutate shared state. Read-only resources
/// (dictionaries, ontology indexes) are injected at construction.
pub trait FeatureExtractor: Send + Sync {
    /// Name used in logs and configuration
    fn name(&self) -> &str;

    fn extract(
        &self,
        document: &Document,
        context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>>;
}

/// Features for one pair plus the number of extractors that failed on it
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub features: FeatureVector,
    pub failures: usize,
}

/// Ordered list of feature extractors
#[derive(Default)]
pub struct FeaturePipeline {
    extractors: Vec<Box<dyn FeatureExtractor>>,
}

impl FeaturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the extractors named in the configuration, in order
    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        let dictionary = match &config.concept_dictionary {
            Some(path) => Arc::new(ConceptDictionary::from_file(path)?),
            None => Arc::new(ConceptDictionary::default()),
        };

        let mut pipeline = Self::new();
        for name in &config.extractors {
            let extractor: Box<dyn FeatureExtractor> = match name.as_str() {
                "token" => Box::new(TokenFeatures::new(config.max_words_between)),
                "pos" => Box::new(PartOfSpeechFeatures),
                "section" => Box::new(SectionHeaderFeatures),
                "verb_tense" => Box::new(NearbyVerbTenseFeatures::new(config.verb_window)),
                "special_word" => Box::new(SpecialWordFeatures::new(&config.special_words)?),
                "concept" => Box::new(ConceptFeatures::new(Arc::clone(&dictionary))),
                "dependency" => Box::new(DependencyPathFeatures),
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "features.extractors".to_string(),
                        value: other.to_string(),
                    }
                    .into())
                }
            };
            pipeline.push(extractor);
        }

        tracing::debug!(extractors = ?pipeline.names(), "Feature pipeline configured");
        Ok(pipeline)
    }

    /// Append an extractor
    pub fn with_extractor(mut self, extractor: impl FeatureExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn push(&mut self, extractor: Box<dyn FeatureExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Run every extractor on a pair
    pub fn extract(
        &self,
        document: &Document,
        context: &Context,
        pair: &CandidatePair<'_>,
    ) -> PipelineOutput {
        let mut builder = FeatureVector::builder();
        let mut failures = 0;

        for extractor in &self.extractors {
            match extractor.extract(document, context, pair) {
                Ok(features) => {
                    builder.extend(features);
                }
                Err(e) => {
                    failures += 1;
                    tracing::debug!(
                        extractor = extractor.name(),
                        document = %document.id,
                        arg1 = %pair.arg1.id,
                        arg2 = %pair.arg2.id,
                        error = %e,
                        "Feature extractor failed; skipping its features"
                    );
                }
            }
        }

        PipelineOutput {
            features: builder.build(),
            failures,
        }
    }
}

impl std::fmt::Debug for FeaturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeaturePipeline")
            .field("extractors", &self.names())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
