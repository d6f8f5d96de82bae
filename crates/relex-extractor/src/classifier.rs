//! Classifier boundary
//!
//! [`Classifier`] is the inference-side seam: a feature vector in, a category
//! (or the no-relation sentinel) out. [`LinearModel`] is the shipped
//! implementation, a multiclass linear model stored as JSON and trained by
//! [`PerceptronTrainer`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use relex_core::{RelexError, Result, NO_RELATION_CATEGORY};

use crate::features::FeatureVector;
use crate::writer::LabeledExample;

/// Predicts a relation category for a candidate pair's features
pub trait Classifier: Send + Sync {
    /// Returns a category name or [`NO_RELATION_CATEGORY`]
    fn classify(&self, features: &FeatureVector) -> Result<String>;
}

// ============================================================================
// Linear model
// ============================================================================

/// Multiclass linear model over sparse encoded features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    categories: Vec<String>,
    /// Per-feature weights, one entry per category
    weights: BTreeMap<String, Vec<f64>>,
    bias: Vec<f64>,
    trained_at: DateTime<Utc>,
    #[serde(default)]
    examples: usize,
}

impl LinearModel {
    /// Model with zero weights; every prediction is the first category
    pub fn new(categories: Vec<String>) -> Result<Self> {
        let model = Self {
            bias: vec![0.0; categories.len()],
            categories,
            weights: BTreeMap::new(),
            trained_at: Utc::now(),
            examples: 0,
        };
        model.check().map_err(RelexError::Classification)?;
        Ok(model)
    }

    /// Load a model file; any failure is a [`RelexError::ModelLoad`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model_load = |reason: String| RelexError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| model_load(e.to_string()))?;
        let model: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| model_load(e.to_string()))?;
        model.check().map_err(model_load)?;

        tracing::info!(
            path = %path.display(),
            categories = model.categories.len(),
            features = model.weights.len(),
            trained_at = %model.trained_at,
            "Loaded classifier model"
        );
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        tracing::info!(path = %path.display(), "Saved classifier model");
        Ok(())
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn feature_count(&self) -> usize {
        self.weights.len()
    }

    /// Score of every category, in [`categories`](Self::categories) order
    pub fn scores(&self, features: &FeatureVector) -> Vec<f64> {
        let mut scores = self.bias.clone();
        for (name, value) in features.encode() {
            if let Some(row) = self.weights.get(&name) {
                for (score, weight) in scores.iter_mut().zip(row) {
                    *score += weight * value;
                }
            }
        }
        scores
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.categories.is_empty() {
            return Err("model has no categories".to_string());
        }
        let unique: BTreeSet<&String> = self.categories.iter().collect();
        if unique.len() != self.categories.len() {
            return Err("duplicate category names".to_string());
        }
        let width = self.categories.len();
        if self.bias.len() != width {
            return Err(format!("bias has {} entries, expected {width}", self.bias.len()));
        }
        if let Some((name, row)) = self.weights.iter().find(|(_, row)| row.len() != width) {
            return Err(format!(
                "feature {name} has {} weights, expected {width}",
                row.len()
            ));
        }
        Ok(())
    }
}

/// Index of the highest score; ties go to the earliest category
fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

impl Classifier for LinearModel {
    fn classify(&self, features: &FeatureVector) -> Result<String> {
        let scores = self.scores(features);
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(RelexError::Classification(
                "non-finite score; feature values out of range".to_string(),
            ));
        }
        Ok(self.categories[argmax(&scores)].clone())
    }
}

// ============================================================================
// Perceptron trainer
// ============================================================================

/// Averaged multiclass perceptron
#[derive(Debug, Clone)]
pub struct PerceptronTrainer {
    epochs: usize,
    seed: u64,
}

impl Default for PerceptronTrainer {
    fn default() -> Self {
        Self {
            epochs: 10,
            seed: 0,
        }
    }
}

impl PerceptronTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs.max(1);
        self
    }

    /// Seed for the per-epoch shuffle
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train a model; the no-relation outcome is always the first category
    pub fn train(&self, examples: &[LabeledExample]) -> Result<LinearModel> {
        if examples.is_empty() {
            return Err(RelexError::InvalidState(
                "cannot train on an empty data set".to_string(),
            ));
        }

        let mut categories = vec![NO_RELATION_CATEGORY.to_string()];
        let labels: BTreeSet<&str> = examples
            .iter()
            .filter_map(|e| e.category.as_deref())
            .filter(|c| *c != NO_RELATION_CATEGORY)
            .collect();
        categories.extend(labels.into_iter().map(str::to_string));
        let index: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let encoded: Vec<(Vec<(String, f64)>, usize)> = examples
            .iter()
            .map(|e| (e.features.encode(), index[e.outcome()]))
            .collect();

        let width = categories.len();
        let mut weights = Averaged::new(width);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..encoded.len()).collect();

        for epoch in 0..self.epochs {
            order.shuffle(&mut rng);
            let mut mistakes = 0;
            for &i in &order {
                let (features, gold) = &encoded[i];
                let predicted = argmax(&weights.scores(features));
                if predicted != *gold {
                    weights.update(features, *gold, predicted);
                    mistakes += 1;
                }
                weights.tick();
            }
            tracing::debug!(epoch, mistakes, examples = encoded.len(), "Perceptron epoch");
            if mistakes == 0 {
                break;
            }
        }

        let (weights, bias) = weights.average();
        tracing::info!(
            categories = width,
            features = weights.len(),
            examples = examples.len(),
            "Trained linear model"
        );
        Ok(LinearModel {
            categories,
            weights,
            bias,
            trained_at: Utc::now(),
            examples: examples.len(),
        })
    }
}

/// Perceptron weights with the running sums needed for averaging
struct Averaged {
    width: usize,
    weights: HashMap<String, Vec<f64>>,
    /// Update sums scaled by the step at which they happened
    scaled: HashMap<String, Vec<f64>>,
    bias: Vec<f64>,
    scaled_bias: Vec<f64>,
    step: f64,
}

impl Averaged {
    fn new(width: usize) -> Self {
        Self {
            width,
            weights: HashMap::new(),
            scaled: HashMap::new(),
            bias: vec![0.0; width],
            scaled_bias: vec![0.0; width],
            step: 1.0,
        }
    }

    fn scores(&self, features: &[(String, f64)]) -> Vec<f64> {
        let mut scores = self.bias.clone();
        for (name, value) in features {
            if let Some(row) = self.weights.get(name) {
                for (score, weight) in scores.iter_mut().zip(row) {
                    *score += weight * value;
                }
            }
        }
        scores
    }

    fn update(&mut self, features: &[(String, f64)], gold: usize, predicted: usize) {
        let width = self.width;
        let step = self.step;
        for (name, value) in features {
            let row = self
                .weights
                .entry(name.clone())
                .or_insert_with(|| vec![0.0; width]);
            row[gold] += value;
            row[predicted] -= value;

            let scaled = self
                .scaled
                .entry(name.clone())
                .or_insert_with(|| vec![0.0; width]);
            scaled[gold] += step * value;
            scaled[predicted] -= step * value;
        }
        self.bias[gold] += 1.0;
        self.bias[predicted] -= 1.0;
        self.scaled_bias[gold] += step;
        self.scaled_bias[predicted] -= step;
    }

    fn tick(&mut self) {
        self.step += 1.0;
    }

    fn average(self) -> (BTreeMap<String, Vec<f64>>, Vec<f64>) {
        let step = self.step;
        let scaled = self.scaled;
        let weights = self
            .weights
            .into_iter()
            .filter_map(|(name, row)| {
                let sums = scaled.get(&name)?;
                let averaged: Vec<f64> = row
                    .iter()
                    .zip(sums)
                    .map(|(w, s)| w - s / step)
                    .collect();
                averaged.iter().any(|w| *w != 0.0).then_some((name, averaged))
            })
            .collect();
        let bias = self
            .bias
            .iter()
            .zip(&self.scaled_bias)
            .map(|(b, s)| b - s / step)
            .collect();
        (weights, bias)
    }
}

// ============================================================================
// Tests
// ============================================================================
