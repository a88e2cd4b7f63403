use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Kind of a disk resource as reported in the `type` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
    /// `type` was missing or not one the API documents.
    #[default]
    Unknown,
}

impl ResourceType {
    pub fn from_str_lossy(raw: &str) -> Self {
        match raw {
            "file" => ResourceType::File,
            "dir" => ResourceType::Dir,
            _ => ResourceType::Unknown,
        }
    }

    pub fn as_api_str(&self) -> Option<&'static str> {
        match self {
            ResourceType::File => Some("file"),
            ResourceType::Dir => Some("dir"),
            ResourceType::Unknown => None,
        }
    }
}

/// One file or directory entry on the disk.
///
/// Absent fields stay empty: strings are `""`, `size` is 0 and timestamps
/// are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResourceRecord {
    pub name: String,
    pub kind: ResourceType,
    /// Scheme-prefixed disk path, e.g. `disk:/photos/a.jpg` or `app:/a.txt`.
    pub path: String,
    pub mime_type: String,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub preview: String,
    pub public_key: String,
    pub public_url: String,
}

impl ResourceRecord {
    /// Maps one resource object from the API. Never fails: anything that is
    /// missing or has an unexpected JSON type is left at its default.
    pub fn from_json(json: &Value) -> Self {
        ResourceRecord {
            name: string_field(json, "name"),
            kind: ResourceType::from_str_lossy(&string_field(json, "type")),
            path: string_field(json, "path"),
            mime_type: string_field(json, "mime_type"),
            size: json.get("size").and_then(Value::as_u64).unwrap_or(0),
            created: timestamp_field(json, "created"),
            modified: timestamp_field(json, "modified"),
            preview: string_field(json, "preview"),
            public_key: string_field(json, "public_key"),
            public_url: string_field(json, "public_url"),
        }
    }

    /// API-shaped object containing only the populated fields.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        let mut put = |key: &str, value: &str| {
            if !value.is_empty() {
                map.insert(key.to_string(), json!(value));
            }
        };
        put("name", &self.name);
        put("type", self.kind.as_api_str().unwrap_or_default());
        put("path", &self.path);
        put("mime_type", &self.mime_type);
        put("preview", &self.preview);
        put("public_key", &self.public_key);
        put("public_url", &self.public_url);
        if self.size > 0 {
            map.insert("size".to_string(), json!(self.size));
        }
        if let Some(created) = self.created {
            map.insert("created".to_string(), json!(format_timestamp(created)));
        }
        if let Some(modified) = self.modified {
            map.insert("modified".to_string(), json!(format_timestamp(modified)));
        }
        Value::Object(map)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceType::Dir
    }

    pub fn is_published(&self) -> bool {
        !self.public_key.is_empty()
    }
}

fn string_field(json: &Value, key: &str) -> String {
    json.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn timestamp_field(json: &Value, key: &str) -> Option<DateTime<Utc>> {
    json.get(key).and_then(Value::as_str).and_then(parse_timestamp)
}

/// Parses `2024-01-02T03:04:05+00:00` style stamps; fractional seconds and
/// other offsets are accepted too.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

fn format_timestamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Final size and, for buffer downloads, the bytes of a finished transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub size: u64,
    pub data: Option<Vec<u8>>,
}

/// Byte counters passed to progress callbacks. Totals are 0 while unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub download_total: u64,
    pub downloaded: u64,
    pub upload_total: u64,
    pub uploaded: u64,
}

/// State of a server-side copy/move as reported by `operations/<id>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Success,
    Failed,
}

impl OperationStatus {
    pub fn from_api_str(raw: &str) -> Self {
        match raw {
            "success" => OperationStatus::Success,
            "failed" | "failure" => OperationStatus::Failed,
            _ => OperationStatus::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn maps_full_resource_object() {
        let json = json!({
            "name": "a.txt",
            "type": "file",
            "path": "disk:/docs/a.txt",
            "mime_type": "text/plain",
            "size": 10,
            "created": "2023-05-01T10:20:30+00:00",
            "modified": "2023-06-02T11:21:31+00:00",
            "preview": "https://downloader.disk.yandex.ru/preview/x",
            "public_key": "pk==",
            "public_url": "https://yadi.sk/d/abc"
        });
        let record = ResourceRecord::from_json(&json);
        assert_eq!(record.name, "a.txt");
        assert_eq!(record.kind, ResourceType::File);
        assert_eq!(record.path, "disk:/docs/a.txt");
        assert_eq!(record.mime_type, "text/plain");
        assert_eq!(record.size, 10);
        assert_eq!(
            record.created,
            Some(Utc.with_ymd_and_hms(2023, 5, 1, 10, 20, 30).unwrap())
        );
        assert_eq!(
            record.modified,
            Some(Utc.with_ymd_and_hms(2023, 6, 2, 11, 21, 31).unwrap())
        );
        assert!(record.is_published());
    }

    #[test]
    fn created_and_modified_are_parsed_independently() {
        let json = json!({
            "created": "2020-01-01T00:00:00+00:00",
            "modified": "2021-01-01T00:00:00+00:00"
        });
        let record = ResourceRecord::from_json(&json);
        assert_ne!(record.created, record.modified);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let record = ResourceRecord::from_json(&json!({}));
        assert_eq!(record, ResourceRecord::default());

        let dir = ResourceRecord::from_json(&json!({"name": "photos", "type": "dir"}));
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
        assert_eq!(dir.mime_type, "");
        assert!(dir.created.is_none());
    }

    #[test]
    fn wrong_types_and_bad_dates_do_not_fail() {
        let json = json!({
            "name": 42,
            "size": "big",
            "type": ["file"],
            "created": "yesterday",
            "modified": null
        });
        let record = ResourceRecord::from_json(&json);
        assert_eq!(record.name, "");
        assert_eq!(record.size, 0);
        assert_eq!(record.kind, ResourceType::Unknown);
        assert!(record.created.is_none());
        assert!(record.modified.is_none());

        assert_eq!(ResourceRecord::from_json(&Value::Null), ResourceRecord::default());
    }

    #[test]
    fn non_utc_offsets_are_normalised() {
        let stamp = parse_timestamp("2023-05-01T13:20:30+03:00").unwrap();
        assert_eq!(stamp, Utc.with_ymd_and_hms(2023, 5, 1, 10, 20, 30).unwrap());
    }

    #[test]
    fn record_survives_json_round_trip() {
        let record = ResourceRecord {
            name: "report.pdf".to_string(),
            kind: ResourceType::File,
            path: "app:/reports/report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 123_456,
            created: Some(Utc.with_ymd_and_hms(2022, 2, 3, 4, 5, 6).unwrap()),
            modified: Some(Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).unwrap()),
            preview: String::new(),
            public_key: "key".to_string(),
            public_url: "https://yadi.sk/d/key".to_string(),
        };
        let json = record.to_json();
        assert_eq!(json["created"], "2022-02-03T04:05:06+00:00");
        assert!(json.get("preview").is_none());
        assert_eq!(ResourceRecord::from_json(&json), record);
    }

    #[test]
    fn operation_status_strings() {
        assert_eq!(OperationStatus::from_api_str("success"), OperationStatus::Success);
        assert_eq!(OperationStatus::from_api_str("failed"), OperationStatus::Failed);
        assert_eq!(
            OperationStatus::from_api_str("in-progress"),
            OperationStatus::InProgress
        );
        assert!(!OperationStatus::InProgress.is_terminal());
    }
}
