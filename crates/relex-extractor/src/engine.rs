//! Relation extraction engine
//!
//! Composes candidate generation, feature extraction and either label
//! resolution (training) or classification (prediction) into a per-document
//! pass. A document's output is buffered and committed only when the whole
//! document succeeds, so a failing document leaves no partial relations or
//! training examples behind. Sink I/O errors during that commit are the
//! exception: they are reported, but some of the document's examples may
//! already be written.
//!
//! Lifecycle: `Idle -> Configured -> InDocument -> Configured -> ... -> Idle`.
//! An engine is returned from its constructors already configured;
//! [`RelationEngine::finish`] flushes outputs and returns it to `Idle`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relex_core::{
    AppConfig, ConfigError, Document, RelationIndex, RelexError, Result, NO_RELATION_CATEGORY,
};

use crate::candidate::{CandidateGenerator, CandidatePair, ExactTypePairGenerator};
use crate::classifier::{Classifier, LinearModel};
use crate::emitter::{ArgumentPairEmitter, RelationEmitter};
use crate::features::{FeaturePipeline, FeatureVector};
use crate::gold::GoldRelationTable;
use crate::label::{GoldLabelResolver, LabelResolver, NegativeSampler, Resolution};
use crate::relation::CategoryRegistry;
use crate::writer::{JsonlDataWriter, LabeledExample, TrainingSink};

// ============================================================================
// Mode and state
// ============================================================================

/// What the engine does with each candidate's features
pub enum Mode {
    /// Resolve gold labels and write training examples
    Training {
        resolver: Box<dyn LabelResolver>,
        sink: Box<dyn TrainingSink>,
    },
    /// Classify pairs and emit relations
    Prediction {
        classifier: Arc<dyn Classifier>,
        emitter: Box<dyn RelationEmitter>,
    },
}

impl Mode {
    pub fn training(
        resolver: impl LabelResolver + 'static,
        sink: impl TrainingSink + 'static,
    ) -> Self {
        Self::Training {
            resolver: Box::new(resolver),
            sink: Box::new(sink),
        }
    }

    pub fn prediction(
        classifier: Arc<dyn Classifier>,
        emitter: impl RelationEmitter + 'static,
    ) -> Self {
        Self::Prediction {
            classifier,
            emitter: Box::new(emitter),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training { .. } => "training",
            Self::Prediction { .. } => "prediction",
        }
    }

    pub fn is_training(&self) -> bool {
        matches!(self, Self::Training { .. })
    }
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Configured,
    InDocument,
}

// ============================================================================
// Reports
// ============================================================================

/// Counts for one processed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document_id: String,
    pub contexts: usize,
    pub candidates: usize,
    /// Extractor errors; each one cost a pair that extractor's features
    pub extractor_failures: usize,
    pub positives: usize,
    pub negatives_kept: usize,
    pub negatives_dropped: usize,
    pub relations_emitted: usize,
    /// Pairs classified as `-NONE-`
    pub no_relation: usize,
    pub duplicates_skipped: usize,
}

impl DocumentReport {
    fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            ..Default::default()
        }
    }

    pub fn examples_written(&self) -> usize {
        self.positives + self.negatives_kept
    }
}

/// A document that was skipped, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub error: String,
}

/// Totals across a batch of documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub documents_processed: usize,
    pub failures: Vec<DocumentFailure>,
    pub candidates: usize,
    pub extractor_failures: usize,
    pub positives: usize,
    pub negatives_kept: usize,
    pub negatives_dropped: usize,
    pub relations_emitted: usize,
    pub no_relation: usize,
    pub duplicates_skipped: usize,
}

impl Default for BatchReport {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            documents_processed: 0,
            failures: Vec::new(),
            candidates: 0,
            extractor_failures: 0,
            positives: 0,
            negatives_kept: 0,
            negatives_dropped: 0,
            relations_emitted: 0,
            no_relation: 0,
            duplicates_skipped: 0,
        }
    }
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful document's counts
    pub fn record(&mut self, report: &DocumentReport) {
        self.documents_processed += 1;
        self.candidates += report.candidates;
        self.extractor_failures += report.extractor_failures;
        self.positives += report.positives;
        self.negatives_kept += report.negatives_kept;
        self.negatives_dropped += report.negatives_dropped;
        self.relations_emitted += report.relations_emitted;
        self.no_relation += report.no_relation;
        self.duplicates_skipped += report.duplicates_skipped;
    }

    pub fn record_failure(&mut self, document_id: &str, error: &RelexError) {
        self.failures.push(DocumentFailure {
            document_id: document_id.to_string(),
            error: error.to_string(),
        });
    }

    /// Fold another batch (for example a parallel shard) into this one
    pub fn merge(&mut self, other: BatchReport) {
        self.started_at = self.started_at.min(other.started_at);
        self.finished_at = self.finished_at.max(other.finished_at);
        self.documents_processed += other.documents_processed;
        self.failures.extend(other.failures);
        self.candidates += other.candidates;
        self.extractor_failures += other.extractor_failures;
        self.positives += other.positives;
        self.negatives_kept += other.negatives_kept;
        self.negatives_dropped += other.negatives_dropped;
        self.relations_emitted += other.relations_emitted;
        self.no_relation += other.no_relation;
        self.duplicates_skipped += other.duplicates_skipped;
    }

    pub fn documents_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Relation indexes of the documents that succeeded, plus the batch report
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub indexes: Vec<RelationIndex>,
    pub report: BatchReport,
}

// ============================================================================
// Engine
// ============================================================================

/// Pairwise relation extraction engine
pub struct RelationEngine {
    generator: Box<dyn CandidateGenerator>,
    pipeline: FeaturePipeline,
    registry: CategoryRegistry,
    mode: Mode,
    state: EngineState,
}

impl RelationEngine {
    /// Engine over `EventMention` pairs with an empty feature pipeline
    pub fn new(mode: Mode) -> Self {
        Self {
            generator: Box::new(ExactTypePairGenerator::new("EventMention")),
            pipeline: FeaturePipeline::new(),
            registry: CategoryRegistry::temporal(),
            mode,
            state: EngineState::Configured,
        }
    }

    /// Build the engine a configuration describes.
    ///
    /// Training opens the data writer at `output_location`; prediction loads
    /// the model at `classifier_location`. Either failing is fatal and no
    /// engine is returned. The feature pipeline is built before the writer is
    /// opened, so a bad extractor setup leaves earlier training data intact.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = FeaturePipeline::from_config(&config.features)?;

        let mode = if config.engine.training {
            let output = config
                .engine
                .output_location
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired("output_location".to_string()))?;
            let sampler =
                NegativeSampler::new(config.engine.negative_keep_probability, config.engine.seed)?;
            let sink = JsonlDataWriter::create(output)?;
            Mode::training(GoldLabelResolver::new(sampler), sink)
        } else {
            let path = config
                .engine
                .classifier_location
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired("classifier_location".to_string()))?;
            let model: Arc<dyn Classifier> = Arc::new(LinearModel::load(path)?);
            Mode::prediction(model, ArgumentPairEmitter)
        };

        Ok(Self::assemble(config, pipeline, mode))
    }

    /// Prediction engine sharing an already loaded classifier
    pub fn for_prediction(config: &AppConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let pipeline = FeaturePipeline::from_config(&config.features)?;
        Ok(Self::assemble(
            config,
            pipeline,
            Mode::prediction(classifier, ArgumentPairEmitter),
        ))
    }

    fn assemble(config: &AppConfig, pipeline: FeaturePipeline, mode: Mode) -> Self {
        let engine = Self::new(mode)
            .with_generator(ExactTypePairGenerator::new(
                config.engine.target_mention_type.as_str(),
            ))
            .with_pipeline(pipeline)
            .with_registry(CategoryRegistry::from_config(&config.categories));

        tracing::info!(
            mode = engine.mode.as_str(),
            target_type = %config.engine.target_mention_type,
            extractors = ?engine.pipeline.names(),
            keep_probability = config.engine.negative_keep_probability,
            "Relation engine configured"
        );
        engine
    }

    pub fn with_generator(mut self, generator: impl CandidateGenerator + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    pub fn with_pipeline(mut self, pipeline: FeaturePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_registry(mut self, registry: CategoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Run one document pass.
    ///
    /// In prediction mode new relations are merged into `index` when the
    /// document succeeds; in training mode examples go to the sink and
    /// `index` is untouched. On error nothing from this document is
    /// committed, except that an I/O failure while the sink is writing the
    /// document's examples may leave part of them written.
    pub fn process_document(
        &mut self,
        document: &Document,
        index: &mut RelationIndex,
    ) -> Result<DocumentReport> {
        match self.state {
            EngineState::Configured => {}
            EngineState::Idle => {
                return Err(RelexError::InvalidState(
                    "engine is finished; build a new one to process more documents".to_string(),
                ))
            }
            EngineState::InDocument => {
                return Err(RelexError::InvalidState(
                    "a document pass is already running".to_string(),
                ))
            }
        }
        if index.document_id() != document.id {
            return Err(RelexError::InvalidState(format!(
                "relation index belongs to document {}, not {}",
                index.document_id(),
                document.id
            )));
        }

        self.state = EngineState::InDocument;
        let result = self.run_document(document, index);
        self.state = EngineState::Configured;

        if let Ok(report) = &result {
            tracing::debug!(
                document = %document.id,
                candidates = report.candidates,
                positives = report.positives,
                negatives = report.negatives_kept,
                relations = report.relations_emitted,
                "Processed document"
            );
        }
        result
    }

    /// Process documents in order, skipping any that fail
    pub fn process_batch<'d, I>(&mut self, documents: I) -> Result<BatchOutput>
    where
        I: IntoIterator<Item = &'d Document>,
    {
        if self.state == EngineState::Idle {
            return Err(RelexError::InvalidState("engine is finished".to_string()));
        }

        let mut report = BatchReport::new();
        let mut indexes = Vec::new();
        for document in documents {
            let mut index = RelationIndex::new(document.id.as_str());
            match self.process_document(document, &mut index) {
                Ok(doc_report) => {
                    report.record(&doc_report);
                    indexes.push(index);
                }
                Err(e) => {
                    tracing::warn!(document = %document.id, error = %e, "Skipping document");
                    report.record_failure(&document.id, &e);
                }
            }
        }
        report.finished_at = Utc::now();

        tracing::info!(
            mode = self.mode.as_str(),
            documents = report.documents_processed,
            failed = report.documents_failed(),
            candidates = report.candidates,
            examples = report.positives + report.negatives_kept,
            relations = report.relations_emitted,
            "Batch complete"
        );
        Ok(BatchOutput { indexes, report })
    }

    /// Flush outputs and return to `Idle`; later calls do nothing
    pub fn finish(&mut self) -> Result<()> {
        if self.state == EngineState::Idle {
            return Ok(());
        }
        if let Mode::Training { sink, .. } = &mut self.mode {
            sink.flush()?;
        }
        self.state = EngineState::Idle;
        tracing::debug!(mode = self.mode.as_str(), "Relation engine finished");
        Ok(())
    }

    fn run_document(
        &mut self,
        document: &Document,
        index: &mut RelationIndex,
    ) -> Result<DocumentReport> {
        document.validate()?;
        let mut report = DocumentReport::new(&document.id);

        let Self {
            generator,
            pipeline,
            registry,
            mode,
            ..
        } = self;
        let scan = Scan {
            generator: &**generator,
            pipeline,
            document,
        };

        match mode {
            Mode::Training { resolver, sink } => {
                let gold = GoldRelationTable::from_document(document, registry)?;
                let mut buffer = Vec::new();
                scan.run(&mut report, |pair, features, report| {
                    let (arg1, arg2) = pair.ids();
                    match resolver.resolve(&gold, pair)? {
                        Resolution::Positive(label) => {
                            report.positives += 1;
                            buffer.push(LabeledExample::positive(
                                document.id.as_str(),
                                arg1.clone(),
                                arg2.clone(),
                                features,
                                label,
                            ));
                        }
                        Resolution::Negative => {
                            report.negatives_kept += 1;
                            buffer.push(LabeledExample::negative(
                                document.id.as_str(),
                                arg1.clone(),
                                arg2.clone(),
                                features,
                            ));
                        }
                        Resolution::Dropped => report.negatives_dropped += 1,
                    }
                    Ok(())
                })?;

                sink.write_batch(buffer)?;
            }
            Mode::Prediction {
                classifier,
                emitter,
            } => {
                let mut pending = RelationIndex::new(document.id.as_str());
                let committed = &*index;
                scan.run(&mut report, |pair, features, report| {
                    let category = classifier.classify(&features)?;
                    let (arg1, arg2) = pair.ids();
                    if category == NO_RELATION_CATEGORY {
                        report.no_relation += 1;
                    } else if committed.contains(arg1, arg2) {
                        report.duplicates_skipped += 1;
                    } else if emitter.emit(&mut pending, pair, &category)? {
                        report.relations_emitted += 1;
                    } else {
                        report.duplicates_skipped += 1;
                    }
                    Ok(())
                })?;

                let added = index.merge(pending);
                report.duplicates_skipped += report.relations_emitted.saturating_sub(added);
                report.relations_emitted = added;
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for RelationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationEngine")
            .field("pipeline", &self.pipeline)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

/// Candidate enumeration and feature extraction shared by both modes
struct Scan<'e, 'd> {
    generator: &'e dyn CandidateGenerator,
    pipeline: &'e FeaturePipeline,
    document: &'d Document,
}

impl<'e, 'd> Scan<'e, 'd> {
    fn run<F>(&self, report: &mut DocumentReport, mut visit: F) -> Result<()>
    where
        F: FnMut(&CandidatePair<'d>, FeatureVector, &mut DocumentReport) -> Result<()>,
    {
        for context in &self.document.sentences {
            report.contexts += 1;
            for pair in self.generator.candidates(self.document, context) {
                report.candidates += 1;
                let output = self.pipeline.extract(self.document, context, &pair);
                report.extractor_failures += output.failures;
                visit(&pair, output.features, report)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::MemorySink;
    use relex_core::{GoldAnnotation, Mention};

    fn document() -> Document {
        Document::new("doc-1", "x".repeat(60))
            .with_sentence(0, 40)
            .with_mention(Mention::new("E1", "EventMention", 10, 15))
            .with_mention(Mention::new("E2", "EventMention", 20, 25))
            .with_mention(Mention::new("E3", "EventMention", 30, 35))
            .with_gold(GoldAnnotation::new("E1", "E2", "BEFORE"))
    }

    fn training_engine(p: f64, sink: MemorySink) -> RelationEngine {
        let sampler = NegativeSampler::new(p, Some(5)).unwrap();
        RelationEngine::new(Mode::training(GoldLabelResolver::new(sampler), sink))
    }

    struct Always(&'static str);

    impl Classifier for Always {
        fn classify(&self, _features: &FeatureVector) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut engine = training_engine(1.0, MemorySink::new());
        assert_eq!(engine.state(), EngineState::Configured);

        let doc = document();
        let mut index = RelationIndex::new("doc-1");
        engine.process_document(&doc, &mut index).unwrap();
        assert_eq!(engine.state(), EngineState::Configured);

        engine.finish().unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        engine.finish().unwrap();

        let err = engine.process_document(&doc, &mut index).unwrap_err();
        assert!(matches!(err, RelexError::InvalidState(_)));
    }

    #[test]
    fn test_training_report_counts() {
        let sink = MemorySink::new();
        let mut engine = training_engine(1.0, sink.clone());
        let report = engine
            .process_document(&document(), &mut RelationIndex::new("doc-1"))
            .unwrap();

        assert_eq!(report.contexts, 1);
        assert_eq!(report.candidates, 3);
        assert_eq!(report.positives, 1);
        assert_eq!(report.negatives_kept, 2);
        assert_eq!(report.negatives_dropped, 0);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_index_for_other_document_is_rejected() {
        let mut engine = training_engine(1.0, MemorySink::new());
        let err = engine
            .process_document(&document(), &mut RelationIndex::new("doc-2"))
            .unwrap_err();
        assert!(matches!(err, RelexError::InvalidState(_)));
        assert_eq!(engine.state(), EngineState::Configured);
    }

    #[test]
    fn test_prediction_with_no_relation_classifier() {
        let mut engine = RelationEngine::new(Mode::prediction(
            Arc::new(Always(NO_RELATION_CATEGORY)),
            ArgumentPairEmitter,
        ));
        let mut index = RelationIndex::new("doc-1");
        let report = engine.process_document(&document(), &mut index).unwrap();

        assert_eq!(report.no_relation, 3);
        assert_eq!(report.relations_emitted, 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_batch_report_merge() {
        let mut a = BatchReport::new();
        a.record(&DocumentReport {
            document_id: "a".to_string(),
            candidates: 3,
            positives: 1,
            ..Default::default()
        });
        let mut b = BatchReport::new();
        b.record_failure("b", &RelexError::MissingAnnotation("tokens".to_string()));

        a.merge(b);
        assert_eq!(a.documents_processed, 1);
        assert_eq!(a.documents_failed(), 1);
        assert_eq!(a.candidates, 3);
    }
}
