//! Engine Integration Tests
//!
//! Runs whole documents through the engine in both modes, using the
//! configured feature pipeline and real file-backed outputs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use relex_core::{
    AppConfig, DependencyArc, Document, GoldAnnotation, Mention, RelationIndex, RelexError,
    Result, Token, NO_RELATION_CATEGORY,
};
use relex_extractor::{
    read_training_data, ArgumentPairEmitter, CandidatePair, Classifier, FeatureValue,
    FeatureVector, GoldLabelResolver, GoldRelationTable, LabelResolver, LabeledExample,
    MemorySink, Mode, NegativeSampler, RelationEngine, Resolution, TRAINING_DATA_FILE,
};
use tempfile::TempDir;

//          0         1         2         3
//          012345678901234567890123456789012345
const TEXT: &str = "Yesterday fever and wound and heals.";

/// E1 "fever" @ (10,15), E2 "wound" @ (20,25), E3 "heals" @ (30,35)
fn clinical_note(id: &str) -> Document {
    let mut doc = Document::new(id, TEXT)
        .with_sentence(0, TEXT.len())
        .with_token(Token::new(0, 9, "Yesterday").with_pos("NN"))
        .with_token(Token::new(10, 15, "fever").with_pos("NN"))
        .with_token(Token::new(16, 19, "and").with_pos("CC"))
        .with_token(Token::new(20, 25, "wound").with_pos("NN"))
        .with_token(Token::new(26, 29, "and").with_pos("CC"))
        .with_token(Token::new(30, 35, "heals").with_pos("VBZ"))
        .with_token(Token::new(35, 36, ".").with_pos("."))
        .with_mention(Mention::new("E1", "EventMention", 10, 15))
        .with_mention(Mention::new("E2", "EventMention", 20, 25))
        .with_mention(Mention::new("E3", "EventMention", 30, 35));
    doc.dependencies = Some(vec![
        arc(Some(5), 0, "npadvmod"),
        arc(Some(5), 1, "nsubj"),
        arc(Some(1), 2, "cc"),
        arc(Some(1), 3, "conj"),
        arc(Some(5), 4, "cc"),
        arc(None, 5, "root"),
        arc(Some(5), 6, "punct"),
    ]);
    doc
}

fn arc(head: Option<usize>, dependent: usize, label: &str) -> DependencyArc {
    DependencyArc {
        head,
        dependent,
        label: label.to_string(),
    }
}

fn training_config(output: &TempDir, keep_probability: f64) -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.training = true;
    config.engine.negative_keep_probability = keep_probability;
    config.engine.output_location = Some(output.path().to_path_buf());
    config.engine.seed = Some(17);
    config
}

fn prediction_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.classifier_location = Some("unused.json".into());
    config
}

fn train(config: &AppConfig, documents: &[Document]) -> Vec<LabeledExample> {
    let mut engine = RelationEngine::from_config(config).unwrap();
    engine.process_batch(documents).unwrap();
    engine.finish().unwrap();

    let output = config.engine.output_location.as_ref().unwrap();
    read_training_data(output.join(TRAINING_DATA_FILE)).unwrap()
}

/// Predicts BEFORE only for the pair ("fever", "wound")
struct FeverBeforeWound;

impl Classifier for FeverBeforeWound {
    fn classify(&self, features: &FeatureVector) -> Result<String> {
        let arg1 = features.get("arg1_text");
        let arg2 = features.get("arg2_text");
        if arg1 == Some(&FeatureValue::from("fever")) && arg2 == Some(&FeatureValue::from("wound"))
        {
            Ok("BEFORE".to_string())
        } else {
            Ok(NO_RELATION_CATEGORY.to_string())
        }
    }
}

/// Predicts BEFORE for the first pair and fails on the second
#[derive(Default)]
struct FailsOnSecondPair {
    calls: AtomicUsize,
}

impl Classifier for FailsOnSecondPair {
    fn classify(&self, _features: &FeatureVector) -> Result<String> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Ok("BEFORE".to_string()),
            _ => Err(RelexError::Classification("model backend went away".to_string())),
        }
    }
}

/// Keeps the first pair as a negative and fails on the second
#[derive(Default)]
struct ResolverFailsOnSecondPair {
    calls: usize,
}

impl LabelResolver for ResolverFailsOnSecondPair {
    fn resolve(
        &mut self,
        _table: &GoldRelationTable,
        _pair: &CandidatePair<'_>,
    ) -> Result<Resolution> {
        self.calls += 1;
        if self.calls == 1 {
            Ok(Resolution::Negative)
        } else {
            Err(RelexError::MissingAnnotation("gold label store".to_string()))
        }
    }
}

// =============================================================================
// Training
// =============================================================================

#[test]
fn test_training_without_negatives_writes_single_positive() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 0.0);
    let doc = clinical_note("note-1").with_gold(GoldAnnotation::new("E1", "E2", "BEFORE"));

    let examples = train(&config, &[doc]);

    assert_eq!(examples.len(), 1);
    let example = &examples[0];
    assert_eq!(example.outcome(), "BEFORE");
    assert_eq!(example.arg1.as_str(), "E1");
    assert_eq!(example.arg2.as_str(), "E2");
    assert_eq!(example.document_id, "note-1");
    assert_eq!(
        example.features.get("arg1_text"),
        Some(&FeatureValue::from("fever"))
    );
}

#[test]
fn test_training_keeps_all_negatives() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 1.0);
    let doc = clinical_note("note-1").with_gold(GoldAnnotation::new("E1", "E2", "BEFORE"));

    let examples = train(&config, &[doc]);

    let outcomes: Vec<&str> = examples.iter().map(|e| e.outcome()).collect();
    assert_eq!(outcomes, vec!["BEFORE", NO_RELATION_CATEGORY, NO_RELATION_CATEGORY]);
}

#[test]
fn test_reversed_gold_relation_is_labeled_inverse() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 0.0);
    let doc = clinical_note("note-1")
        .with_gold(GoldAnnotation::new("E2", "E1", "BEFORE"))
        .with_gold(GoldAnnotation::new("E3", "E2", "OVERLAP"));

    let examples = train(&config, &[doc]);

    assert_eq!(examples.len(), 2);
    assert_eq!(examples[0].outcome(), "BEFORE-1");
    assert_eq!(examples[0].arg1.as_str(), "E1");
    assert_eq!(examples[1].outcome(), "OVERLAP");
    assert_eq!(examples[1].arg1.as_str(), "E2");
}

#[test]
fn test_subtype_mentions_are_not_candidates() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 1.0);
    let doc = clinical_note("note-1").with_mention(Mention::new(
        "M1",
        "MedicationEventMention",
        0,
        9,
    ));

    let mut engine = RelationEngine::from_config(&config).unwrap();
    let report = engine
        .process_document(&doc, &mut RelationIndex::new("note-1"))
        .unwrap();
    assert_eq!(report.candidates, 3);
}

#[test]
fn test_conflicting_gold_skips_only_that_document() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 0.0);
    let broken = clinical_note("broken")
        .with_gold(GoldAnnotation::new("E1", "E2", "BEFORE"))
        .with_gold(GoldAnnotation::new("E1", "E2", "OVERLAP"))
        .with_gold(GoldAnnotation::new("E2", "E3", "CONTAINS"));
    let good = clinical_note("good").with_gold(GoldAnnotation::new("E1", "E3", "CONTAINS"));

    let mut engine = RelationEngine::from_config(&config).unwrap();
    let output_batch = engine.process_batch(&[broken, good]).unwrap();
    engine.finish().unwrap();

    let report = output_batch.report;
    assert_eq!(report.documents_processed, 1);
    assert_eq!(report.documents_failed(), 1);
    assert_eq!(report.failures[0].document_id, "broken");

    let examples = read_training_data(output.path().join(TRAINING_DATA_FILE)).unwrap();
    assert_eq!(examples.len(), 1);
    assert_eq!(examples[0].document_id, "good");
    assert_eq!(examples[0].outcome(), "CONTAINS");
}

#[test]
fn test_duplicate_mention_ids_reject_document() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 1.0);
    let doc = clinical_note("note-1").with_mention(Mention::new("E1", "EventMention", 0, 9));

    let mut engine = RelationEngine::from_config(&config).unwrap();
    let err = engine
        .process_document(&doc, &mut RelationIndex::new("note-1"))
        .unwrap_err();
    assert!(matches!(err, RelexError::InvalidDocument { .. }));
    engine.finish().unwrap();

    let examples = read_training_data(output.path().join(TRAINING_DATA_FILE)).unwrap();
    assert!(examples.is_empty());
}

#[test]
fn test_training_failure_mid_document_writes_nothing() {
    let sink = MemorySink::new();
    let mut engine = RelationEngine::new(Mode::training(
        ResolverFailsOnSecondPair::default(),
        sink.clone(),
    ));

    let output = engine
        .process_batch(&[clinical_note("note-1")])
        .unwrap();

    assert!(sink.is_empty());
    assert_eq!(output.report.documents_processed, 0);
    assert_eq!(output.report.failures.len(), 1);
    assert_eq!(output.report.failures[0].document_id, "note-1");
}

#[test]
fn test_bad_extractor_setup_keeps_previous_training_data() {
    let output = TempDir::new().unwrap();
    let data = output.path().join(TRAINING_DATA_FILE);
    std::fs::write(&data, "previous run\n").unwrap();

    let mut config = training_config(&output, 1.0);
    config.features.extractors = vec!["token".to_string(), "bogus".to_string()];
    assert!(RelationEngine::from_config(&config).is_err());

    let mut config = training_config(&output, 1.0);
    config.features.concept_dictionary = Some(output.path().join("missing-dictionary.json"));
    assert!(RelationEngine::from_config(&config).is_err());

    assert_eq!(std::fs::read_to_string(&data).unwrap(), "previous run\n");
}

#[test]
fn test_seeded_training_is_reproducible() {
    let docs: Vec<Document> = (0..5)
        .map(|i| clinical_note(&format!("note-{i}")))
        .collect();

    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = train(&training_config(&first_dir, 0.5), &docs);
    let second = train(&training_config(&second_dir, 0.5), &docs);

    let key = |e: &LabeledExample| (e.document_id.clone(), e.arg1.clone(), e.arg2.clone());
    assert_eq!(
        first.iter().map(key).collect::<Vec<_>>(),
        second.iter().map(key).collect::<Vec<_>>()
    );
}

// =============================================================================
// Prediction
// =============================================================================

#[test]
fn test_prediction_emits_single_directional_relation() {
    let mut engine =
        RelationEngine::for_prediction(&prediction_config(), Arc::new(FeverBeforeWound)).unwrap();
    let doc = clinical_note("note-1");
    let mut index = RelationIndex::new("note-1");

    let report = engine.process_document(&doc, &mut index).unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.relations_emitted, 1);
    assert_eq!(report.no_relation, 2);
    assert_eq!(index.len(), 1);

    let relation = &index.relations()[0];
    assert_eq!(relation.arg1().mention.as_str(), "E1");
    assert_eq!(relation.arg2().mention.as_str(), "E2");
    assert_eq!(relation.category(), "BEFORE");
}

#[test]
fn test_repeated_pass_does_not_duplicate_relations() {
    let mut engine =
        RelationEngine::for_prediction(&prediction_config(), Arc::new(FeverBeforeWound)).unwrap();
    let doc = clinical_note("note-1");
    let mut index = RelationIndex::new("note-1");

    let first = engine.process_document(&doc, &mut index).unwrap();
    let second = engine.process_document(&doc, &mut index).unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(first.relations_emitted, 1);
    assert_eq!(first.duplicates_skipped, 0);
    assert_eq!(second.relations_emitted, 0);
    assert_eq!(second.duplicates_skipped, 1);
}

#[test]
fn test_prediction_failure_mid_document_leaves_index_untouched() {
    let mut engine = RelationEngine::new(Mode::prediction(
        Arc::new(FailsOnSecondPair::default()),
        ArgumentPairEmitter,
    ));
    let doc = clinical_note("note-1");
    let mut index = RelationIndex::new("note-1");

    let err = engine.process_document(&doc, &mut index).unwrap_err();
    assert!(matches!(err, RelexError::Classification(_)));
    assert!(index.is_empty());
}

#[test]
fn test_prediction_failure_mid_document_is_reported_in_batch() {
    let mut engine = RelationEngine::new(Mode::prediction(
        Arc::new(FailsOnSecondPair::default()),
        ArgumentPairEmitter,
    ));

    let output = engine
        .process_batch(&[clinical_note("note-1")])
        .unwrap();

    assert!(output.indexes.is_empty());
    assert_eq!(output.report.relations_emitted, 0);
    assert_eq!(output.report.failures.len(), 1);
    assert_eq!(output.report.failures[0].document_id, "note-1");
}

#[test]
fn test_missing_parse_degrades_to_remaining_features() {
    let mut engine =
        RelationEngine::for_prediction(&prediction_config(), Arc::new(FeverBeforeWound)).unwrap();
    let mut doc = clinical_note("note-1");
    doc.dependencies = None;
    let mut index = RelationIndex::new("note-1");

    let report = engine.process_document(&doc, &mut index).unwrap();

    // the dependency extractor fails once per pair; token features still drive the classifier
    assert_eq!(report.extractor_failures, 3);
    assert_eq!(index.len(), 1);
}

#[test]
fn test_batch_returns_indexes_for_successful_documents() {
    let mut engine =
        RelationEngine::for_prediction(&prediction_config(), Arc::new(FeverBeforeWound)).unwrap();
    let mut invalid = clinical_note("invalid");
    invalid.mentions.push(Mention::new("E9", "EventMention", 20, 10));

    let output = engine
        .process_batch(&[clinical_note("a"), invalid, clinical_note("b")])
        .unwrap();

    let ids: Vec<&str> = output.indexes.iter().map(|i| i.document_id()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(output.report.relations_emitted, 2);
    assert_eq!(output.report.documents_failed(), 1);
}

// =============================================================================
// Initialization failures
// =============================================================================

#[test]
fn test_missing_model_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.engine.classifier_location = Some(dir.path().join("missing-model.json"));

    let err = RelationEngine::from_config(&config).unwrap_err();
    match err {
        RelexError::ModelLoad { path, .. } => assert!(path.ends_with("missing-model.json")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unwritable_output_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file").unwrap();

    let mut config = AppConfig::default();
    config.engine.training = true;
    config.engine.output_location = Some(blocker.join("out"));

    assert!(matches!(
        RelationEngine::from_config(&config),
        Err(RelexError::OutputLocation { .. })
    ));
}

#[test]
fn test_invalid_keep_probability_is_rejected() {
    let output = TempDir::new().unwrap();
    let config = training_config(&output, 1.5);
    assert!(matches!(
        RelationEngine::from_config(&config),
        Err(RelexError::Config(_))
    ));
}
