//! Quality Metrics module
//!
//! Scores predicted relations against gold annotations. Both sides are
//! normalized before matching: an inverse label `X-1` on `(a, b)` becomes `X`
//! on `(b, a)`, and symmetric categories compare regardless of argument
//! order.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use relex_core::{GoldAnnotation, MentionId, RelationIndex};

use crate::relation::{split_inverse, CategoryRegistry, Symmetry};

// ============================================================================
// Relation Metrics
// ============================================================================

/// Counts and derived scores for relation extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMetrics {
    /// Predicted relations present in the gold standard
    pub true_positives: usize,
    /// Predicted relations absent from the gold standard
    pub false_positives: usize,
    /// Gold relations that were not predicted
    pub false_negatives: usize,
    pub gold_total: usize,
    pub predicted_total: usize,
}

impl RelationMetrics {
    /// Calculate precision (TP / (TP + FP))
    pub fn precision(&self) -> f32 {
        if self.true_positives + self.false_positives == 0 {
            0.0
        } else {
            self.true_positives as f32 / (self.true_positives + self.false_positives) as f32
        }
    }

    /// Calculate recall (TP / (TP + FN))
    pub fn recall(&self) -> f32 {
        if self.true_positives + self.false_negatives == 0 {
            0.0
        } else {
            self.true_positives as f32 / (self.true_positives + self.false_negatives) as f32
        }
    }

    /// Calculate F1 score (2 * P * R / (P + R))
    pub fn f1_score(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn add(&mut self, other: &RelationMetrics) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.gold_total += other.gold_total;
        self.predicted_total += other.predicted_total;
    }
}

// ============================================================================
// Normalized relations
// ============================================================================

/// A relation in canonical argument order and forward category form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedRelation {
    pub arg1: MentionId,
    pub arg2: MentionId,
    pub category: String,
}

impl NormalizedRelation {
    pub fn new(
        arg1: &MentionId,
        arg2: &MentionId,
        label: &str,
        registry: &CategoryRegistry,
    ) -> Self {
        let (category, inverted) = split_inverse(label);
        let (mut arg1, mut arg2) = if inverted { (arg2, arg1) } else { (arg1, arg2) };
        if registry.symmetry(category) == Symmetry::Symmetric && arg2 < arg1 {
            std::mem::swap(&mut arg1, &mut arg2);
        }
        Self {
            arg1: arg1.clone(),
            arg2: arg2.clone(),
            category: category.to_string(),
        }
    }

    /// Same relation with the category erased, for unlabeled scoring
    fn unlabeled(mut self) -> Self {
        if self.arg2 < self.arg1 {
            std::mem::swap(&mut self.arg1, &mut self.arg2);
        }
        self.category.clear();
        self
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Scores for one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetrics {
    pub overall: RelationMetrics,
    pub per_category: BTreeMap<String, RelationMetrics>,
}

/// Evaluator for relation extraction quality
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: CategoryRegistry,
    /// Category must match (otherwise only the argument pair is compared)
    match_categories: bool,
}

impl Evaluator {
    pub fn new(registry: CategoryRegistry) -> Self {
        Self {
            registry,
            match_categories: true,
        }
    }

    /// Enable/disable category matching
    pub fn with_category_matching(mut self, match_categories: bool) -> Self {
        self.match_categories = match_categories;
        self
    }

    fn normalize(&self, arg1: &MentionId, arg2: &MentionId, label: &str) -> NormalizedRelation {
        let relation = NormalizedRelation::new(arg1, arg2, label, &self.registry);
        if self.match_categories {
            relation
        } else {
            relation.unlabeled()
        }
    }

    /// Evaluate one document's predicted relations against its gold annotations
    pub fn evaluate_document(
        &self,
        predicted: &RelationIndex,
        gold: &[GoldAnnotation],
    ) -> DocumentMetrics {
        let predicted: HashSet<NormalizedRelation> = predicted
            .iter()
            .map(|r| self.normalize(&r.arg1().mention, &r.arg2().mention, r.category()))
            .collect();
        let gold: HashSet<NormalizedRelation> = gold
            .iter()
            .map(|g| self.normalize(&g.arg1, &g.arg2, &g.category))
            .collect();

        let mut metrics = DocumentMetrics::default();
        for relation in predicted.union(&gold) {
            let in_predicted = predicted.contains(relation);
            let in_gold = gold.contains(relation);
            let category = metrics
                .per_category
                .entry(relation.category.clone())
                .or_default();
            for m in [&mut metrics.overall, category] {
                if in_predicted {
                    m.predicted_total += 1;
                }
                if in_gold {
                    m.gold_total += 1;
                }
                match (in_predicted, in_gold) {
                    (true, true) => m.true_positives += 1,
                    (true, false) => m.false_positives += 1,
                    (false, true) => m.false_negatives += 1,
                    (false, false) => {}
                }
            }
        }
        metrics
    }
}

// ============================================================================
// Aggregate Metrics
// ============================================================================

/// Aggregate metrics for a batch of evaluations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub relation_metrics: RelationMetrics,
    pub per_category: BTreeMap<String, RelationMetrics>,
    pub num_documents: usize,
}

impl AggregateMetrics {
    pub fn add_document(&mut self, metrics: &DocumentMetrics) {
        self.num_documents += 1;
        self.relation_metrics.add(&metrics.overall);
        for (category, m) in &metrics.per_category {
            self.per_category.entry(category.clone()).or_default().add(m);
        }
    }

    /// Print a summary report
    pub fn report(&self) -> String {
        let m = &self.relation_metrics;
        let mut report = format!(
            "=== Relation Extraction Report ===\n\n\
             Documents evaluated: {}\n\n\
             Overall:\n\
               Precision: {:.1}%\n\
               Recall:    {:.1}%\n\
               F1 Score:  {:.1}%\n\
               Gold: {} | Predicted: {} | TP: {} | FP: {} | FN: {}\n",
            self.num_documents,
            m.precision() * 100.0,
            m.recall() * 100.0,
            m.f1_score() * 100.0,
            m.gold_total,
            m.predicted_total,
            m.true_positives,
            m.false_positives,
            m.false_negatives,
        );

        if !self.per_category.is_empty() {
            report.push_str("\nPer category:\n");
            for (category, m) in &self.per_category {
                let name = if category.is_empty() { "(any)" } else { category };
                report.push_str(&format!(
                    "  {:<12} P {:>5.1}%  R {:>5.1}%  F1 {:>5.1}%  (gold {}, predicted {})\n",
                    name,
                    m.precision() * 100.0,
                    m.recall() * 100.0,
                    m.f1_score() * 100.0,
                    m.gold_total,
                    m.predicted_total,
                ));
            }
        }
        report
    }
}

// ============================================================================
// Tests
// ============================================================================
