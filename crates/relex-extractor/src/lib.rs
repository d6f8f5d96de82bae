//! relex Extractor - Pairwise relation extraction pipeline
//!
//! Enumerates candidate mention pairs inside each sentence, turns every pair
//! into a feature vector, and then either labels it from gold annotations
//! (training) or classifies it and emits a relation (prediction).

pub mod candidate;
pub mod classifier;
pub mod emitter;
pub mod engine;
pub mod features;
pub mod gold;
pub mod label;
pub mod metrics;
pub mod relation;
pub mod writer;

pub use candidate::{CandidateGenerator, CandidatePair, ExactTypePairGenerator};
pub use classifier::{Classifier, LinearModel, PerceptronTrainer};
pub use emitter::{ArgumentPairEmitter, RelationEmitter};
pub use engine::{
    BatchOutput, BatchReport, DocumentFailure, DocumentReport, EngineState, Mode, RelationEngine,
};
pub use features::{
    Feature, FeatureExtractor, FeaturePipeline, FeatureValue, FeatureVector, PipelineOutput,
};
pub use gold::{GoldEntry, GoldRelationTable};
pub use label::{gold_label, GoldLabelResolver, LabelResolver, NegativeSampler, Resolution};
pub use metrics::{AggregateMetrics, DocumentMetrics, Evaluator, RelationMetrics};
pub use relation::{CategoryRegistry, Symmetry, TemporalCategory};
pub use writer::{
    read_training_data, JsonlDataWriter, LabeledExample, MemorySink, TrainingSink,
    TRAINING_DATA_FILE,
};
