use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which logical table a record belongs to. Immutable post-write (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Document,
    UserFact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub text: String,
    pub vector: Vec<f32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub category: Option<String>,
    pub source: Source,
}

impl MemoryRecord {
    pub fn new(text: String, vector: Vec<f32>, category: Option<String>, source: Source) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            vector,
            created_at: chrono::Utc::now(),
            category,
            source,
        }
    }
}
