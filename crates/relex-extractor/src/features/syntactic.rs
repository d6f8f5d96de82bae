//! Syntactic features read from upstream part-of-speech tags and dependency parses

use std::collections::BTreeSet;
use std::ops::Range;

use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};

use relex_core::{Context, Document, Mention, RelexError, Result, Token};

use super::{Feature, FeatureExtractor};
use crate::candidate::CandidatePair;

fn pos_of(token: &Token) -> Result<&str> {
    token
        .pos
        .as_deref()
        .ok_or_else(|| RelexError::MissingAnnotation("part-of-speech tags".to_string()))
}

/// Index of the head token of a mention (its last token)
fn head_token(document: &Document, mention: &Mention) -> Result<usize> {
    let range = document.token_range(mention.begin, mention.end);
    if range.is_empty() {
        return Err(RelexError::MissingAnnotation(format!(
            "tokens for mention {}",
            mention.id
        )));
    }
    Ok(range.end - 1)
}

// ============================================================================
// Part of speech
// ============================================================================

/// POS of each argument head and the POS sequence between the arguments
#[derive(Debug, Clone, Copy, Default)]
pub struct PartOfSpeechFeatures;

impl FeatureExtractor for PartOfSpeechFeatures {
    fn name(&self) -> &str {
        "pos"
    }

    fn extract(
        &self,
        document: &Document,
        _context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let head1 = &document.tokens[head_token(document, pair.arg1)?];
        let head2 = &document.tokens[head_token(document, pair.arg2)?];

        let mut features = vec![
            Feature::new("arg1_pos", pos_of(head1)?),
            Feature::new("arg2_pos", pos_of(head2)?),
        ];

        if let Some((begin, end)) = pair.gap() {
            let tags = document
                .tokens_in(begin, end)
                .iter()
                .map(pos_of)
                .collect::<Result<Vec<_>>>()?;
            let sequence = if tags.is_empty() {
                "EMPTY".to_string()
            } else {
                tags.join("_")
            };
            features.push(Feature::new("pos_between", sequence));
        }

        Ok(features)
    }
}

// ============================================================================
// Nearby verb tense
// ============================================================================

/// Tense class of a verb POS tag
fn tense_of(pos: &str) -> Option<&'static str> {
    match pos {
        "VBD" => Some("past"),
        "VBN" => Some("past_participle"),
        "VBZ" | "VBP" => Some("present"),
        "VBG" => Some("gerund"),
        "VB" => Some("base"),
        "MD" => Some("modal"),
        _ => None,
    }
}

/// Tense of the verbs within a token window around each argument
#[derive(Debug, Clone)]
pub struct NearbyVerbTenseFeatures {
    window: usize,
}

impl NearbyVerbTenseFeatures {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    fn argument_features(
        &self,
        document: &Document,
        sentence: &Range<usize>,
        prefix: &str,
        mention: &Mention,
        features: &mut Vec<Feature>,
    ) -> Result<()> {
        let span = document.token_range(mention.begin, mention.end);
        let lo = span.start.saturating_sub(self.window).max(sentence.start);
        let hi = span.end.saturating_add(self.window).min(sentence.end);
        if lo >= hi {
            return Ok(());
        }

        let mut tenses = BTreeSet::new();
        let mut nearest: Option<(usize, &'static str)> = None;
        for idx in lo..hi {
            let Some(tense) = tense_of(pos_of(&document.tokens[idx])?) else {
                continue;
            };
            tenses.insert(tense);
            let distance = if idx < span.start {
                span.start - idx
            } else {
                idx.saturating_sub(span.end.saturating_sub(1))
            };
            if nearest.map_or(true, |(d, _)| distance < d) {
                nearest = Some((distance, tense));
            }
        }

        for tense in tenses {
            features.push(Feature::new(format!("{prefix}_verb_tense:{tense}"), true));
        }
        if let Some((_, tense)) = nearest {
            features.push(Feature::new(format!("{prefix}_nearest_verb_tense"), tense));
        }
        Ok(())
    }
}

impl Default for NearbyVerbTenseFeatures {
    fn default() -> Self {
        Self::new(5)
    }
}

impl FeatureExtractor for NearbyVerbTenseFeatures {
    fn name(&self) -> &str {
        "verb_tense"
    }

    fn extract(
        &self,
        document: &Document,
        context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let sentence = document.token_range(context.begin, context.end);
        let mut features = Vec::new();
        self.argument_features(document, &sentence, "arg1", pair.arg1, &mut features)?;
        self.argument_features(document, &sentence, "arg2", pair.arg2, &mut features)?;
        Ok(features)
    }
}

// ============================================================================
// Dependency path
// ============================================================================

/// Edge weight: dependency label and the token index of the head
#[derive(Debug, Clone)]
struct DependencyEdge {
    label: String,
    head: usize,
}

/// Shortest dependency path between the argument heads within the sentence
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyPathFeatures;

impl DependencyPathFeatures {
    /// Render a node path as `<label` (up to a head) and `>label` (down to a dependent) steps
    fn render(graph: &UnGraph<usize, DependencyEdge>, path: &[NodeIndex]) -> String {
        path.windows(2)
            .filter_map(|step| {
                let edge = graph.find_edge(step[0], step[1])?;
                let dep = &graph[edge];
                let arrow = if dep.head == graph[step[0]] { '>' } else { '<' };
                Some(format!("{arrow}{}", dep.label))
            })
            .collect()
    }
}

impl FeatureExtractor for DependencyPathFeatures {
    fn name(&self) -> &str {
        "dependency"
    }

    fn extract(
        &self,
        document: &Document,
        context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let arcs = document
            .dependencies
            .as_ref()
            .ok_or_else(|| RelexError::MissingAnnotation("dependency parse".to_string()))?;

        let head1 = head_token(document, pair.arg1)?;
        let head2 = head_token(document, pair.arg2)?;
        if head1 == head2 {
            return Ok(vec![
                Feature::new("dep_path", "SAME_HEAD"),
                Feature::new("dep_path_length", 0usize),
            ]);
        }

        let sentence = document.token_range(context.begin, context.end);
        let mut graph: UnGraph<usize, DependencyEdge> = UnGraph::default();
        let nodes: Vec<NodeIndex> = sentence.clone().map(|t| graph.add_node(t)).collect();
        let node_of = |token: usize| {
            sentence
                .contains(&token)
                .then(|| nodes[token - sentence.start])
        };

        for arc in arcs {
            let Some(head) = arc.head else { continue };
            if let (Some(h), Some(d)) = (node_of(head), node_of(arc.dependent)) {
                graph.add_edge(
                    h,
                    d,
                    DependencyEdge {
                        label: arc.label.clone(),
                        head,
                    },
                );
            }
        }

        let (Some(start), Some(goal)) = (node_of(head1), node_of(head2)) else {
            return Err(RelexError::MissingAnnotation(format!(
                "argument heads outside sentence {}..{}",
                context.begin, context.end
            )));
        };

        let features = match astar(&graph, start, |n| n == goal, |_| 1usize, |_| 0) {
            Some((length, path)) => vec![
                Feature::new("dep_path", Self::render(&graph, &path)),
                Feature::new("dep_path_length", length),
            ],
            None => vec![Feature::new("dep_path", "NO_PATH")],
        };
        Ok(features)
    }
}

// ============================================================================
// Tests
// ============================================================================
