use serde::{Deserialize, Serialize};

/// A unit of retrieved policy text and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePassage {
    pub id: String,
    pub source: String,
    pub text: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}
