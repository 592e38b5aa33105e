use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::{upload_route, UPLOADED_AT_FORMAT};

/// One stored file, as persisted by the record store.
///
/// The locator URL is not part of the record: it is derived from
/// `storage_key` and the active backend every time the record is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a record. `id` and
/// `uploaded_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUploadRecord {
    pub original_filename: String,
    pub storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub original_filename: String,
    pub storage_key: String,
    pub url: String,
    /// UTC, formatted as `YYYY-MM-DD HH:MM:SS`
    #[schema(example = "2024-05-01 12:30:00")]
    pub uploaded_at: String,
    #[serde(rename = "deleteURL")]
    pub delete_url: String,
}

impl UploadResponse {
    pub fn from_record(record: UploadRecord, url: String) -> Self {
        UploadResponse {
            id: record.id,
            delete_url: upload_route(&record.storage_key),
            uploaded_at: record.uploaded_at.format(UPLOADED_AT_FORMAT).to_string(),
            original_filename: record.original_filename,
            storage_key: record.storage_key,
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_response_serialization_shape() {
        let record = UploadRecord {
            id: Uuid::nil(),
            original_filename: "My Photo.png".to_string(),
            storage_key: "0123abcd_My_Photo.png".to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        };

        let response = UploadResponse::from_record(
            record,
            "/api/v0/uploads/0123abcd_My_Photo.png".to_string(),
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["originalFilename"], "My Photo.png");
        assert_eq!(json["storageKey"], "0123abcd_My_Photo.png");
        assert_eq!(json["url"], "/api/v0/uploads/0123abcd_My_Photo.png");
        assert_eq!(json["uploadedAt"], "2024-05-01 12:30:00");
        assert_eq!(json["deleteURL"], "/api/v0/uploads/0123abcd_My_Photo.png");
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
    }
}
