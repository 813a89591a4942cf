use crate::auth::AccountId;
use crate::clinic::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text prescription written by a doctor for one of their patients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: RecordId,
    pub doctor_id: AccountId,
    pub patient_id: AccountId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub doctor_id: AccountId,
    pub patient_id: AccountId,
    pub content: String,
}
