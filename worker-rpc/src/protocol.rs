//! Wire contract between caller and worker.
//!
//! Every message serializes to `{id, type, payload}`. Request and response
//! types pair 1:1 (`vectorizeAndStore` → `vectorizeAndStoreResult`); the
//! error reply is its own type so the dispatcher can tell success from
//! failure without inspecting payloads.

use serde::{Deserialize, Serialize};

use common::storage::store::{IndexReport, SimilarityResultItem, UpsertRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: String,
    #[serde(flatten)]
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RequestBody {
    Initialize,
    EmbedBatch {
        texts: Vec<String>,
    },
    AverageVectors {
        vectors: Vec<Vec<f32>>,
    },
    VectorizeAndStore {
        records: Vec<UpsertRecord>,
    },
    QuerySimilar {
        vector: Vec<f32>,
        limit: usize,
        #[serde(default)]
        exclude_file_paths: Vec<String>,
    },
    VectorsForPath {
        path: String,
    },
    RebuildStore,
    EnsureIndexes,
    CloseStore,
}

impl RequestBody {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Initialize => "initialize",
            RequestBody::EmbedBatch { .. } => "embedBatch",
            RequestBody::AverageVectors { .. } => "averageVectors",
            RequestBody::VectorizeAndStore { .. } => "vectorizeAndStore",
            RequestBody::QuerySimilar { .. } => "querySimilar",
            RequestBody::VectorsForPath { .. } => "vectorsForPath",
            RequestBody::RebuildStore => "rebuildStore",
            RequestBody::EnsureIndexes => "ensureIndexes",
            RequestBody::CloseStore => "closeStore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: String,
    #[serde(flatten)]
    pub body: ReplyBody,
}

impl ReplyEnvelope {
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: ReplyBody::Error {
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ReplyBody {
    InitializeResult {
        backend: String,
        dimension: usize,
    },
    EmbedBatchResult {
        vectors: Vec<Vec<f32>>,
    },
    AverageVectorsResult {
        vector: Vec<f32>,
    },
    VectorizeAndStoreResult {
        count: usize,
    },
    QuerySimilarResult {
        items: Vec<SimilarityResultItem>,
    },
    VectorsForPathResult {
        vectors: Option<Vec<Vec<f32>>>,
    },
    RebuildStoreResult,
    EnsureIndexesResult {
        report: IndexReport,
    },
    CloseStoreResult,
    Error {
        message: String,
    },
}

impl ReplyBody {
    pub fn kind(&self) -> &'static str {
        match self {
            ReplyBody::InitializeResult { .. } => "initializeResult",
            ReplyBody::EmbedBatchResult { .. } => "embedBatchResult",
            ReplyBody::AverageVectorsResult { .. } => "averageVectorsResult",
            ReplyBody::VectorizeAndStoreResult { .. } => "vectorizeAndStoreResult",
            ReplyBody::QuerySimilarResult { .. } => "querySimilarResult",
            ReplyBody::VectorsForPathResult { .. } => "vectorsForPathResult",
            ReplyBody::RebuildStoreResult => "rebuildStoreResult",
            ReplyBody::EnsureIndexesResult { .. } => "ensureIndexesResult",
            ReplyBody::CloseStoreResult => "closeStoreResult",
            ReplyBody::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_serialize_to_id_type_payload() {
        let envelope = RequestEnvelope {
            id: "abc-123".into(),
            body: RequestBody::EmbedBatch {
                texts: vec!["hello".into()],
            },
        };
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["id"], "abc-123");
        assert_eq!(value["type"], "embedBatch");
        assert_eq!(value["payload"]["texts"][0], "hello");
    }

    #[test]
    fn unit_requests_carry_no_payload() {
        let envelope = RequestEnvelope {
            id: "x".into(),
            body: RequestBody::RebuildStore,
        };
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["type"], "rebuildStore");
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn request_and_response_kinds_pair_one_to_one() {
        let pairs = [
            (
                RequestBody::VectorizeAndStore { records: vec![] }.kind(),
                ReplyBody::VectorizeAndStoreResult { count: 0 }.kind(),
            ),
            (
                RequestBody::EmbedBatch { texts: vec![] }.kind(),
                ReplyBody::EmbedBatchResult { vectors: vec![] }.kind(),
            ),
        ];
        for (request, response) in pairs {
            assert_eq!(format!("{request}Result"), response);
        }
    }

    #[test]
    fn replies_round_trip_through_json() {
        let envelope = ReplyEnvelope {
            id: "r-1".into(),
            body: ReplyBody::QuerySimilarResult {
                items: vec![SimilarityResultItem {
                    id: "c1".into(),
                    file_path: "a.md".into(),
                    chunk_offset_start: 0,
                    chunk_offset_end: 12,
                    distance: 0.25,
                }],
            },
        };
        let json = serde_json::to_string(&envelope).expect("serialize");
        let back: ReplyEnvelope = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, envelope);
    }

    #[test]
    fn error_reply_is_its_own_type() {
        let envelope = ReplyEnvelope::error("bad-1", "store unavailable");
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["message"], "store unavailable");
    }
}
