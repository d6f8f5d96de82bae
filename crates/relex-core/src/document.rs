//! Document model
//!
//! Upstream annotators (tokenizer, sentence detector, sectionizer, dictionary
//! lookup, parser) produce these structures; the extraction pipeline only
//! reads them.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{RelexError, Result};

// ============================================================================
// Mentions
// ============================================================================

/// Identity of a mention, as assigned by the upstream producer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MentionId(String);

impl MentionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MentionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MentionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A span-anchored entity or event reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionId,

    /// Concrete type tag (e.g. "EventMention"); subtypes carry their own tag
    pub mention_type: String,

    /// Byte offset of the first character
    pub begin: usize,

    /// Byte offset one past the last character
    pub end: usize,

    /// Covered text, if the producer supplied it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Mention {
    /// Create a new mention
    pub fn new(
        id: impl Into<MentionId>,
        mention_type: impl Into<String>,
        begin: usize,
        end: usize,
    ) -> Self {
        Self {
            id: id.into(),
            mention_type: mention_type.into(),
            begin,
            end,
            text: None,
        }
    }

    /// Set covered text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Whether this mention lies entirely inside `[begin, end)`
    pub fn is_covered_by(&self, begin: usize, end: usize) -> bool {
        self.begin >= begin && self.end <= end
    }
}

impl From<String> for MentionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Upstream annotations
// ============================================================================

/// A token with an optional part-of-speech tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub begin: usize,
    pub end: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
}

impl Token {
    pub fn new(begin: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            text: text.into(),
            pos: None,
        }
    }

    pub fn with_pos(mut self, pos: impl Into<String>) -> Self {
        self.pos = Some(pos.into());
        self
    }
}

/// A bounded span that scopes candidate generation (usually a sentence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub begin: usize,
    pub end: usize,
}

impl Context {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }
}

/// A document section with its header text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub begin: usize,
    pub end: usize,
    pub header: String,
}

/// Dependency arc between two tokens (indices into `Document::tokens`)
///
/// `head` is `None` for the root arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyArc {
    pub head: Option<usize>,
    pub dependent: usize,
    pub label: String,
}

/// Gold relation annotation between two mentions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldAnnotation {
    pub arg1: MentionId,
    pub arg2: MentionId,
    pub category: String,
}

impl GoldAnnotation {
    pub fn new(
        arg1: impl Into<MentionId>,
        arg2: impl Into<MentionId>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            arg1: arg1.into(),
            arg2: arg2.into(),
            category: category.into(),
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// A document with all upstream annotations attached
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    #[serde(default)]
    pub text: String,

    /// Tokens ordered by begin offset
    #[serde(default)]
    pub tokens: Vec<Token>,

    /// Sentence contexts
    #[serde(default)]
    pub sentences: Vec<Context>,

    #[serde(default)]
    pub sections: Vec<Section>,

    #[serde(default)]
    pub mentions: Vec<Mention>,

    /// Dependency parse; `None` when the parser did not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<DependencyArc>>,

    /// Gold relations (training data only)
    #[serde(default)]
    pub gold_relations: Vec<GoldAnnotation>,
}

impl Document {
    /// Create an empty document
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_sentence(mut self, begin: usize, end: usize) -> Self {
        self.sentences.push(Context::new(begin, end));
        self
    }

    pub fn with_mention(mut self, mention: Mention) -> Self {
        self.mentions.push(mention);
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.tokens.push(token);
        self
    }

    pub fn with_gold(mut self, annotation: GoldAnnotation) -> Self {
        self.gold_relations.push(annotation);
        self
    }

    /// Check structural assumptions the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| RelexError::InvalidDocument {
            document_id: self.id.clone(),
            reason,
        };

        if self.tokens.windows(2).any(|w| w[0].begin > w[1].begin) {
            return Err(invalid("tokens are not ordered by offset".to_string()));
        }

        if let Some(m) = self.mentions.iter().find(|m| m.begin > m.end) {
            return Err(invalid(format!(
                "mention {} has begin {} after end {}",
                m.id, m.begin, m.end
            )));
        }

        let mut seen = HashSet::with_capacity(self.mentions.len());
        if let Some(m) = self.mentions.iter().find(|m| !seen.insert(&m.id)) {
            return Err(invalid(format!("mention id {} is used more than once", m.id)));
        }

        if let Some(arcs) = &self.dependencies {
            let n = self.tokens.len();
            if let Some(arc) = arcs
                .iter()
                .find(|a| a.dependent >= n || a.head.is_some_and(|h| h >= n))
            {
                return Err(invalid(format!(
                    "dependency arc {:?} references a token outside 0..{n}",
                    arc
                )));
            }
        }

        Ok(())
    }

    /// Mentions covered by a context, in stable order:
    /// begin ascending, end descending, then id.
    pub fn mentions_in(&self, context: &Context) -> Vec<&Mention> {
        let mut covered: Vec<&Mention> = self
            .mentions
            .iter()
            .filter(|m| m.is_covered_by(context.begin, context.end))
            .collect();
        covered.sort_by(|a, b| {
            a.begin
                .cmp(&b.begin)
                .then(b.end.cmp(&a.end))
                .then_with(|| a.id.cmp(&b.id))
        });
        covered
    }

    /// Look up a mention by id
    pub fn mention(&self, id: &MentionId) -> Option<&Mention> {
        self.mentions.iter().find(|m| &m.id == id)
    }

    /// Index range of the tokens fully inside `[begin, end)`
    pub fn token_range(&self, begin: usize, end: usize) -> Range<usize> {
        let lo = self.tokens.partition_point(|t| t.begin < begin);
        let mut hi = self.tokens.partition_point(|t| t.begin < end).max(lo);
        while hi > lo && self.tokens[hi - 1].end > end {
            hi -= 1;
        }
        lo..hi
    }

    /// Tokens fully inside `[begin, end)`
    pub fn tokens_in(&self, begin: usize, end: usize) -> &[Token] {
        &self.tokens[self.token_range(begin, end)]
    }

    /// Text of a span, or `None` when the offsets do not fall on char boundaries
    pub fn covered_text(&self, begin: usize, end: usize) -> Option<&str> {
        if begin > end || end > self.text.len() {
            return None;
        }
        if !self.text.is_char_boundary(begin) || !self.text.is_char_boundary(end) {
            return None;
        }
        Some(&self.text[begin..end])
    }

    /// Text of a mention, preferring the producer-supplied text
    pub fn mention_text<'a>(&'a self, mention: &'a Mention) -> Option<&'a str> {
        mention
            .text
            .as_deref()
            .or_else(|| self.covered_text(mention.begin, mention.end))
    }

    /// Section containing an offset
    pub fn section_at(&self, offset: usize) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.begin <= offset && offset < s.end)
    }
}

// ============================================================================
// Tests
// ============================================================================
