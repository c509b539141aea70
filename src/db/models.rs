//! Entity rows and lifecycle enums for the State Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    AutoApproved,
    AutoRejected,
    PendingManualReview,
    ManuallyApproved,
    ManuallyRejected,
}

impl VerificationStatus {
    /// A document/user in one of these states will not transition again
    /// except via an idempotent replay that returns the same outcome
    ///.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::AutoApproved | Self::AutoRejected | Self::ManuallyApproved | Self::ManuallyRejected
        )
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, Self::AutoRejected | Self::ManuallyRejected)
    }

    pub fn is_approved(self) -> bool {
        matches!(self, Self::AutoApproved | Self::ManuallyApproved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "document_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "document_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Ktp,
    Npwp,
}

impl DocumentType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "KTP" => Some(Self::Ktp),
            "NPWP" => Some(Self::Npwp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ktp => "KTP",
            Self::Npwp => "NPWP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "review_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub sub: String,
    pub email: String,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doc_type: DocumentType,
    pub blob_key: String,
    pub status: DocumentStatus,
    pub verification_status: VerificationStatus,
    pub ai_score: Option<i32>,
    pub ai_decision: Option<String>,
    pub result_json: Option<serde_json::Value>,
    pub ocr_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ManualReview {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub status: ReviewStatus,
    pub decision: Option<String>,
    pub notes: Option<String>,
    pub buli2_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
