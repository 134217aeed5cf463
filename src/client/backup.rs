use serde::Deserialize;
use time::OffsetDateTime;

use crate::pretty;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Backup {
    pub id: String,
    pub filename: String,
    #[serde(with = "time::serde::iso8601")]
    pub time: OffsetDateTime,
    pub r#type: BackupType,
    #[serde(default)]
    pub length: Option<i64>,
}

impl Backup {
    /// Human readable size, or `None` when the server did not report one.
    pub fn size_text(&self) -> Option<String> {
        match self.length {
            Some(len) if len >= 0 => Some(pretty::format_bytes(len as u64)),
            _ => None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.r#type == BackupType::Last
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Last,
    Archive,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn parses_time_at_the_boundary() {
        let backup: Backup = serde_json::from_str(
            r#"{"id":"abc","filename":"db.zip","time":"2020-01-01T12:00:00.5Z","type":"last","length":1500}"#,
        )
        .unwrap();

        assert_eq!(backup.time, datetime!(2020-01-01 12:00:00.5 UTC));
        assert!(backup.is_last());
        assert_eq!(backup.size_text().as_deref(), Some("1.5 kB"));
    }

    #[test]
    fn missing_or_negative_length_has_no_size() {
        let mut backup: Backup = serde_json::from_str(
            r#"{"id":"abc","filename":"db.zip","time":"2020-01-01T12:00:00Z","type":"archive"}"#,
        )
        .unwrap();
        assert_eq!(backup.r#type, BackupType::Archive);
        assert_eq!(backup.size_text(), None);

        backup.length = Some(-1);
        assert_eq!(backup.size_text(), None);
    }
}
