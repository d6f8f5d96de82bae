//! Training data output
//!
//! Labeled examples are written as JSON Lines, one example per line:
//!
//! ```json
//! {"document_id":"doc-1","arg1":"E1","arg2":"E2","outcome":"BEFORE","features":{...}}
//! ```
//!
//! Retained negatives carry the `-NONE-` outcome.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use relex_core::{MentionId, RelexError, Result, NO_RELATION_CATEGORY};

use crate::features::FeatureVector;

/// File name of the training data inside the output location
pub const TRAINING_DATA_FILE: &str = "training-data.jsonl";

// ============================================================================
// Labeled example
// ============================================================================

/// A feature vector with its gold outcome; `None` marks a retained negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ExampleRecord", into = "ExampleRecord")]
pub struct LabeledExample {
    pub document_id: String,
    pub arg1: MentionId,
    pub arg2: MentionId,
    pub features: FeatureVector,
    pub category: Option<String>,
}

impl LabeledExample {
    pub fn positive(
        document_id: impl Into<String>,
        arg1: MentionId,
        arg2: MentionId,
        features: FeatureVector,
        category: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            arg1,
            arg2,
            features,
            category: Some(category.into()),
        }
    }

    pub fn negative(
        document_id: impl Into<String>,
        arg1: MentionId,
        arg2: MentionId,
        features: FeatureVector,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            arg1,
            arg2,
            features,
            category: None,
        }
    }

    /// Outcome label as written to training data
    pub fn outcome(&self) -> &str {
        self.category.as_deref().unwrap_or(NO_RELATION_CATEGORY)
    }

    pub fn is_negative(&self) -> bool {
        self.category.is_none()
    }
}

#[derive(Serialize, Deserialize)]
struct ExampleRecord {
    document_id: String,
    arg1: MentionId,
    arg2: MentionId,
    outcome: String,
    features: FeatureVector,
}

impl From<LabeledExample> for ExampleRecord {
    fn from(example: LabeledExample) -> Self {
        Self {
            outcome: example.outcome().to_string(),
            document_id: example.document_id,
            arg1: example.arg1,
            arg2: example.arg2,
            features: example.features,
        }
    }
}

impl From<ExampleRecord> for LabeledExample {
    fn from(record: ExampleRecord) -> Self {
        let category = (record.outcome != NO_RELATION_CATEGORY).then_some(record.outcome);
        Self {
            document_id: record.document_id,
            arg1: record.arg1,
            arg2: record.arg2,
            features: record.features,
            category,
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for labeled training examples
pub trait TrainingSink: Send {
    fn write(&mut self, example: LabeledExample) -> Result<()>;

    /// Write one document's examples
    fn write_batch(&mut self, examples: Vec<LabeledExample>) -> Result<()> {
        for example in examples {
            self.write(example)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()>;
}

/// Writes examples to `training-data.jsonl` in an output directory
#[derive(Debug)]
pub struct JsonlDataWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlDataWriter {
    /// Create the output directory if needed and open a fresh data file
    pub fn create(output_location: impl AsRef<Path>) -> Result<Self> {
        let dir = output_location.as_ref();
        fs::create_dir_all(dir).map_err(|source| RelexError::OutputLocation {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(TRAINING_DATA_FILE);
        let file = File::create(&path).map_err(|source| RelexError::OutputLocation {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), "Writing training data");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl TrainingSink for JsonlDataWriter {
    fn write(&mut self, example: LabeledExample) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &example)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Serializes the whole batch before writing, so an encoding error writes nothing
    fn write_batch(&mut self, examples: Vec<LabeledExample>) -> Result<()> {
        let mut encoded = Vec::new();
        for example in &examples {
            serde_json::to_writer(&mut encoded, example)?;
            encoded.push(b'\n');
        }
        self.writer.write_all(&encoded)?;
        self.written += examples.len();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        tracing::debug!(
            path = %self.path.display(),
            examples = self.written,
            "Flushed training data"
        );
        Ok(())
    }
}

/// Collects examples in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    examples: Arc<Mutex<Vec<LabeledExample>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn examples(&self) -> Vec<LabeledExample> {
        self.examples
            .lock()
            .map(|examples| examples.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.examples.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrainingSink for MemorySink {
    fn write(&mut self, example: LabeledExample) -> Result<()> {
        self.examples
            .lock()
            .map_err(|_| RelexError::InvalidState("memory sink lock poisoned".to_string()))?
            .push(example);
        Ok(())
    }

    fn write_batch(&mut self, examples: Vec<LabeledExample>) -> Result<()> {
        self.examples
            .lock()
            .map_err(|_| RelexError::InvalidState("memory sink lock poisoned".to_string()))?
            .extend(examples);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Read a training data file written by [`JsonlDataWriter`]
pub fn read_training_data(path: impl AsRef<Path>) -> Result<Vec<LabeledExample>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut examples = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        examples.push(serde_json::from_str(&line)?);
    }
    Ok(examples)
}

// ============================================================================
// Tests
// ============================================================================
