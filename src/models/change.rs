//! Change notifications for the borrow request table

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BORROW_REQUESTS_TABLE: &str = "borrow_requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Events were missed; consumers must treat everything as changed
    Resync,
}

/// A row-level change. Consumers use it only as a signal to re-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    #[serde(default)]
    pub record_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn borrow_request(kind: ChangeKind, record_id: Uuid) -> Self {
        Self {
            table: BORROW_REQUESTS_TABLE.to_string(),
            kind,
            record_id: Some(record_id),
        }
    }

    pub fn resync() -> Self {
        Self {
            table: BORROW_REQUESTS_TABLE.to_string(),
            kind: ChangeKind::Resync,
            record_id: None,
        }
    }
}
