//! relex Core - Document model, relation types, errors and configuration
//!
//! This crate defines the shared abstractions used by the relation
//! extraction pipeline:
//! - Document model (tokens, sentences, sections, mentions, dependency arcs)
//! - Gold relation annotations consumed during training
//! - Relation objects and the per-document relation index
//! - Common error types
//! - Configuration management

pub mod config;
pub mod document;
pub mod relation;

pub use config::{
    AppConfig, CategoryConfig, ConfigError, EngineConfig, FeatureConfig, LoggingConfig,
};
pub use document::{
    Context, DependencyArc, Document, GoldAnnotation, Mention, MentionId, Section, Token,
};
pub use relation::{
    ArgumentRole, Relation, RelationArgument, RelationIndex, NO_RELATION_CATEGORY,
};

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for relation extraction
#[derive(Error, Debug)]
pub enum RelexError {
    #[error("Failed to load classifier model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Cannot create training output at {}: {source}", path.display())]
    OutputLocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing annotation: {0}")]
    MissingAnnotation(String),

    #[error("Gold relation ({arg1}, {arg2}) labeled both {existing} and {conflicting}")]
    GoldConflict {
        arg1: MentionId,
        arg2: MentionId,
        existing: String,
        conflicting: String,
    },

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error("Invalid document {document_id}: {reason}")]
    InvalidDocument { document_id: String, reason: String },

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelexError>;

// ============================================================================
// Tests
// ============================================================================
