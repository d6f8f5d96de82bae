//! Lexical features: argument text, words between arguments, cue words

use regex::Regex;

use relex_core::{Context, Document, Mention, RelexError, Result};

use super::{Feature, FeatureExtractor};
use crate::candidate::CandidatePair;

// ============================================================================
// Token identity
// ============================================================================

/// Argument surface forms, head words and the words between the arguments
#[derive(Debug, Clone)]
pub struct TokenFeatures {
    max_words_between: usize,
}

impl TokenFeatures {
    pub fn new(max_words_between: usize) -> Self {
        Self { max_words_between }
    }

    fn argument_features(
        &self,
        document: &Document,
        prefix: &str,
        mention: &Mention,
        features: &mut Vec<Feature>,
    ) {
        if let Some(text) = document.mention_text(mention) {
            features.push(Feature::new(format!("{prefix}_text"), text.to_lowercase()));
        }

        let tokens = document.tokens_in(mention.begin, mention.end);
        if let Some(first) = tokens.first() {
            features.push(Feature::new(
                format!("{prefix}_first_word"),
                first.text.to_lowercase(),
            ));
        }
        if let Some(last) = tokens.last() {
            features.push(Feature::new(
                format!("{prefix}_head_word"),
                last.text.to_lowercase(),
            ));
        }
    }
}

impl Default for TokenFeatures {
    fn default() -> Self {
        Self::new(10)
    }
}

impl FeatureExtractor for TokenFeatures {
    fn name(&self) -> &str {
        "token"
    }

    fn extract(
        &self,
        document: &Document,
        _context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let mut features = Vec::new();
        self.argument_features(document, "arg1", pair.arg1, &mut features);
        self.argument_features(document, "arg2", pair.arg2, &mut features);

        match pair.gap() {
            Some((begin, end)) => {
                let between = document.tokens_in(begin, end);
                features.push(Feature::new("tokens_between", between.len()));
                for token in between.iter().take(self.max_words_between) {
                    features.push(Feature::new(
                        format!("word_between:{}", token.text.to_lowercase()),
                        true,
                    ));
                }
            }
            None => features.push(Feature::new("arguments_overlap", true)),
        }

        Ok(features)
    }
}

// ============================================================================
// Special (cue) words
// ============================================================================

/// Temporal cue words appearing between the arguments
#[derive(Debug, Clone)]
pub struct SpecialWordFeatures {
    patterns: Vec<(String, Regex)>,
}

impl SpecialWordFeatures {
    /// Compile a case-insensitive whole-word pattern per cue word
    pub fn new<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let patterns = words
            .iter()
            .map(|w| {
                let word = w.as_ref().to_lowercase();
                let pattern = format!(r"(?i)\b{}\b", regex::escape(&word));
                Regex::new(&pattern)
                    .map(|re| (word, re))
                    .map_err(|e| RelexError::Other(e.into()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl FeatureExtractor for SpecialWordFeatures {
    fn name(&self) -> &str {
        "special_word"
    }

    fn extract(
        &self,
        document: &Document,
        _context: &Context,
        pair: &CandidatePair<'_>,
    ) -> Result<Vec<Feature>> {
        let Some((begin, end)) = pair.gap() else {
            return Ok(Vec::new());
        };
        let between = document.covered_text(begin, end).ok_or_else(|| {
            RelexError::MissingAnnotation(format!(
                "document text for span {begin}..{end}"
            ))
        })?;

        let matched: Vec<Feature> = self
            .patterns
            .iter()
            .filter(|(_, re)| re.is_match(between))
            .map(|(word, _)| Feature::new(format!("special_word:{word}"), true))
            .collect();

        let mut features = Vec::with_capacity(matched.len() + 1);
        features.push(Feature::new("special_word_count", matched.len()));
        features.extend(matched);
        Ok(features)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use relex_core::Token;

    //          0         1         2         3         4
    //          01234567890123456789012345678901234567890123
    const TEXT: &str = "Pain began after the Surgery and during rest.";

    fn document() -> Document {
        Document::new("doc", TEXT)
            .with_sentence(0, TEXT.len())
            .with_token(Token::new(0, 4, "Pain"))
            .with_token(Token::new(5, 10, "began"))
            .with_token(Token::new(11, 16, "after"))
            .with_token(Token::new(17, 20, "the"))
            .with_token(Token::new(21, 28, "Surgery"))
            .with_token(Token::new(29, 32, "and"))
            .with_token(Token::new(33, 39, "during"))
            .with_token(Token::new(40, 44, "rest"))
    }

    fn value<'a>(features: &'a [Feature], name: &str) -> Option<&'a FeatureValue> {
        features.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    #[test]
    fn test_token_features() {
        let doc = document();
        let a = Mention::new("E1", "EventMention", 5, 10);
        let b = Mention::new("E2", "EventMention", 21, 28);
        let features = TokenFeatures::new(10)
            .extract(&doc, &doc.sentences[0], &CandidatePair::new(&a, &b))
            .unwrap();

        assert_eq!(value(&features, "arg1_text"), Some(&FeatureValue::from("began")));
        assert_eq!(value(&features, "arg2_head_word"), Some(&FeatureValue::from("surgery")));
        assert_eq!(value(&features, "tokens_between"), Some(&FeatureValue::from(2usize)));
        assert!(value(&features, "word_between:after").is_some());
        assert!(value(&features, "word_between:the").is_some());
    }

    #[test]
    fn test_words_between_are_capped() {
        let doc = document();
        let a = Mention::new("E1", "EventMention", 0, 4);
        let b = Mention::new("E2", "EventMention", 40, 44);
        let features = TokenFeatures::new(2)
            .extract(&doc, &doc.sentences[0], &CandidatePair::new(&a, &b))
            .unwrap();

        let words = features
            .iter()
            .filter(|f| f.name.starts_with("word_between:"))
            .count();
        assert_eq!(words, 2);
        assert_eq!(value(&features, "tokens_between"), Some(&FeatureValue::from(6usize)));
    }

    #[test]
    fn test_special_words_between_arguments() {
        let doc = document();
        let extractor = SpecialWordFeatures::new(&["after", "during", "before"]).unwrap();

        let a = Mention::new("E1", "EventMention", 5, 10);
        let b = Mention::new("E2", "EventMention", 21, 28);
        let features = extractor
            .extract(&doc, &doc.sentences[0], &CandidatePair::new(&a, &b))
            .unwrap();

        assert_eq!(value(&features, "special_word_count"), Some(&FeatureValue::from(1usize)));
        assert!(value(&features, "special_word:after").is_some());
        assert!(value(&features, "special_word:during").is_none());
    }

    #[test]
    fn test_special_words_match_whole_words_only() {
        let text = "Fever hereafter cough";
        let doc = Document::new("doc", text).with_sentence(0, text.len());
        let extractor = SpecialWordFeatures::new(&["after"]).unwrap();
        let a = Mention::new("E1", "EventMention", 0, 5);
        let b = Mention::new("E2", "EventMention", 16, 21);
        let features = extractor
            .extract(&doc, &doc.sentences[0], &CandidatePair::new(&a, &b))
            .unwrap();

        assert_eq!(value(&features, "special_word_count"), Some(&FeatureValue::from(0usize)));
    }

    #[test]
    fn test_special_words_require_document_text() {
        let doc = Document::new("doc", "").with_sentence(0, 100);
        let extractor = SpecialWordFeatures::new(&["after"]).unwrap();
        let a = Mention::new("E1", "EventMention", 0, 5);
        let b = Mention::new("E2", "EventMention", 20, 25);
        let result = extractor.extract(&doc, &doc.sentences[0], &CandidatePair::new(&a, &b));

        assert!(matches!(result, Err(RelexError::MissingAnnotation(_))));
    }
}
