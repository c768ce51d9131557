use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::StudentRow;

/// Registered student identity as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    /// Stable identifier.
    pub id: Uuid,
    /// Client-generated session id.
    pub session_id: String,
    /// Display name.
    pub name: String,
}

impl From<StudentRow> for StudentInfo {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            name: row.name,
        }
    }
}
