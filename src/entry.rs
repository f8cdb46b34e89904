//! The primary record, `lore_entries` (§3), and its fixed category tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};

pub const MAX_CONTENT_LEN: usize = 4000;
pub const MAX_CONTEXT_LEN: usize = 1000;

/// One of the eight fixed category tags (Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    ArchitecturalDecision,
    PatternOutcome,
    InterfaceLesson,
    EdgeCaseDiscovery,
    ImplementationFriction,
    TestingStrategy,
    DependencyBehavior,
    PerformanceInsight,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::ArchitecturalDecision,
        Category::PatternOutcome,
        Category::InterfaceLesson,
        Category::EdgeCaseDiscovery,
        Category::ImplementationFriction,
        Category::TestingStrategy,
        Category::DependencyBehavior,
        Category::PerformanceInsight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::ArchitecturalDecision => "ARCHITECTURAL_DECISION",
            Category::PatternOutcome => "PATTERN_OUTCOME",
            Category::InterfaceLesson => "INTERFACE_LESSON",
            Category::EdgeCaseDiscovery => "EDGE_CASE_DISCOVERY",
            Category::ImplementationFriction => "IMPLEMENTATION_FRICTION",
            Category::TestingStrategy => "TESTING_STRATEGY",
            Category::DependencyBehavior => "DEPENDENCY_BEHAVIOR",
            Category::PerformanceInsight => "PERFORMANCE_INSIGHT",
        }
    }

    pub fn parse(s: &str) -> Result<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EngramError::InvalidCategory(s.to_string()))
    }
}

/// Embedding production state. The store never computes embeddings itself;
/// this status distinguishes callers that have not yet supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Pending,
    Complete,
    Failed,
}

impl EmbeddingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Complete => "complete",
            EmbeddingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> EmbeddingStatus {
        match s {
            "complete" => EmbeddingStatus::Complete,
            "failed" => EmbeddingStatus::Failed,
            _ => EmbeddingStatus::Pending,
        }
    }
}

/// A stored lore entry, as persisted in `lore_entries`. Not directly
/// (de)serializable: its JSON wire shape is [`EntryWire`], which excludes
/// the `embedding` BLOB and `synced_at`, per §6 "Payload canonicalization".
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub content: String,
    pub context: Option<String>,
    pub category: Category,
    pub confidence: f64,
    pub embedding: Option<Vec<f32>>,
    pub embedding_status: EmbeddingStatus,
    pub source_id: String,
    pub sources: Option<Vec<String>>,
    pub validation_count: i64,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// The canonical JSON wire shape of an entry: change-log `upsert`
/// payloads, export-file `lore[]` elements, and sync wire entries all use
/// this exact field set (§6 "Payload canonicalization" names these 13
/// fields; `embedding` bytes and `synced_at` are never included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryWire {
    pub id: String,
    pub content: String,
    pub context: Option<String>,
    pub category: Category,
    pub confidence: f64,
    pub embedding_status: EmbeddingStatus,
    pub source_id: String,
    pub sources: Option<Vec<String>>,
    pub validation_count: i64,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Entry> for EntryWire {
    fn from(e: &Entry) -> Self {
        EntryWire {
            id: e.id.clone(),
            content: e.content.clone(),
            context: e.context.clone(),
            category: e.category,
            confidence: e.confidence,
            embedding_status: e.embedding_status,
            source_id: e.source_id.clone(),
            sources: e.sources.clone(),
            validation_count: e.validation_count,
            last_validated_at: e.last_validated_at,
            created_at: e.created_at,
            updated_at: e.updated_at,
            deleted_at: e.deleted_at,
        }
    }
}

impl EntryWire {
    /// Materialize a full [`Entry`] from the wire shape. `embedding` is
    /// always `None` and `synced_at` is always `None`, since neither
    /// travels over the wire.
    pub fn into_entry(self) -> Entry {
        Entry {
            id: self.id,
            content: self.content,
            context: self.context,
            category: self.category,
            confidence: self.confidence,
            embedding: None,
            embedding_status: self.embedding_status,
            source_id: self.source_id,
            sources: self.sources,
            validation_count: self.validation_count,
            last_validated_at: self.last_validated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            synced_at: None,
        }
    }
}

/// Caller-supplied fields for [`crate::store::Store::record`]. Unset
/// optional fields take the defaults described in §4.1.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub id: Option<String>,
    pub content: String,
    pub context: Option<String>,
    pub category: Option<Category>,
    pub confidence: Option<f64>,
    pub embedding: Option<Vec<f32>>,
    pub source_id: String,
    pub sources: Option<Vec<String>>,
}

/// Validate a candidate `(content, context, category, confidence)` tuple in
/// the order specified by §4.1: content non-empty, content length,
/// context length, category membership, confidence range.
pub fn validate(
    content: &str,
    context: Option<&str>,
    category: Option<Category>,
    confidence: Option<f64>,
) -> Result<()> {
    if content.is_empty() {
        return Err(EngramError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(EngramError::ContentTooLong);
    }
    if let Some(ctx) = context {
        if ctx.chars().count() > MAX_CONTEXT_LEN {
            return Err(EngramError::ContextTooLong);
        }
    }
    if category.is_none() {
        return Err(EngramError::Validation {
            field: "category",
            message: "category is required".to_string(),
        });
    }
    if let Some(c) = confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(EngramError::InvalidConfidence);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_boundary_lengths() {
        let ok = "a".repeat(MAX_CONTENT_LEN);
        assert!(validate(&ok, None, Some(Category::PatternOutcome), Some(0.5)).is_ok());

        let too_long = "a".repeat(MAX_CONTENT_LEN + 1);
        assert!(matches!(
            validate(&too_long, None, Some(Category::PatternOutcome), Some(0.5)),
            Err(EngramError::ContentTooLong)
        ));
    }

    #[test]
    fn context_boundary_lengths() {
        let ok_ctx = "a".repeat(MAX_CONTEXT_LEN);
        assert!(validate("x", Some(&ok_ctx), Some(Category::PatternOutcome), Some(0.5)).is_ok());

        let too_long_ctx = "a".repeat(MAX_CONTEXT_LEN + 1);
        assert!(matches!(
            validate("x", Some(&too_long_ctx), Some(Category::PatternOutcome), Some(0.5)),
            Err(EngramError::ContextTooLong)
        ));
    }

    #[test]
    fn confidence_boundary_values() {
        assert!(validate("x", None, Some(Category::PatternOutcome), Some(0.0)).is_ok());
        assert!(validate("x", None, Some(Category::PatternOutcome), Some(1.0)).is_ok());
        assert!(matches!(
            validate("x", None, Some(Category::PatternOutcome), Some(-0.001)),
            Err(EngramError::InvalidConfidence)
        ));
        assert!(matches!(
            validate("x", None, Some(Category::PatternOutcome), Some(1.001)),
            Err(EngramError::InvalidConfidence)
        ));
    }

    #[test]
    fn empty_content_rejected() {
        assert!(matches!(
            validate("", None, Some(Category::PatternOutcome), Some(0.5)),
            Err(EngramError::EmptyContent)
        ));
    }

    #[test]
    fn category_round_trips_through_strings() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()).unwrap(), c);
        }
        assert!(Category::parse("NOT_A_CATEGORY").is_err());
    }
}
