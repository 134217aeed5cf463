//! Text shown for projects and backups.
//!
//! Backup status is always taken as reported by the server; nothing here
//! recomputes it.

use std::fmt;

use time::OffsetDateTime;

use crate::{
    client::{Backup, BackupStatus, NotificationKind, Project},
    pretty::{format_duration, format_relative},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusIcon {
    CheckCircle,
    ExclamationTriangle,
    ExclamationCircle,
    Question,
}

impl StatusIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            Self::CheckCircle => "✔",
            Self::ExclamationTriangle => "⚠",
            Self::ExclamationCircle => "✖",
            Self::Question => "?",
        }
    }
}

impl fmt::Display for StatusIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

pub fn status_icon(status: &BackupStatus) -> StatusIcon {
    match status {
        BackupStatus::Ok => StatusIcon::CheckCircle,
        BackupStatus::None => StatusIcon::ExclamationTriangle,
        BackupStatus::Outdated => StatusIcon::ExclamationCircle,
        BackupStatus::Other(_) => StatusIcon::Question,
    }
}

pub fn status_text(status: &BackupStatus) -> &str {
    match status {
        BackupStatus::Ok => "Backup is up to date",
        BackupStatus::None => "No backup has been taken",
        BackupStatus::Outdated => "Backup is out of date",
        BackupStatus::Other(s) => s.as_str(),
    }
}

pub fn last_backup_text(project: &Project, now: OffsetDateTime) -> String {
    match &project.last_backup {
        Some(backup) => format!(
            "Last backup has been taken {}",
            format_relative(backup.time, now)
        ),
        None => "No backups are available".to_owned(),
    }
}

pub fn backup_period_text(project: &Project) -> String {
    format!(
        "Backups are expected to be taken every {}",
        format_duration(project.backup_frequency.saturating_mul(1000))
    )
}

pub fn backup_retention_text(project: &Project) -> String {
    format!(
        "Will keep at least {} last backups",
        project.backup_retention
    )
}

/// Short status line for project lists.
pub fn list_status_text(project: &Project, now: OffsetDateTime) -> String {
    let mut text = match &project.backup_status {
        BackupStatus::Ok => "OK".to_owned(),
        BackupStatus::Outdated => "Out of date".to_owned(),
        BackupStatus::None => return "No backup exists".to_owned(),
        BackupStatus::Other(s) => return s.clone(),
    };

    if let Some(backup) = &project.last_backup {
        text.push_str(", backup created ");
        text.push_str(&format_relative(backup.time, now));
    }
    text
}

/// Notifications only count when enabled and at least one target is set.
pub fn has_notifications(project: &Project) -> bool {
    project.notifications.enabled && project.notifications.has_any_targets()
}

pub fn notifications_text(project: &Project) -> String {
    if !has_notifications(project) {
        return "No notifications are configured".to_owned();
    }

    let kinds: Vec<_> = NotificationKind::ALL
        .into_iter()
        .filter(|&kind| !project.notifications.targets_of(kind).is_empty())
        .map(NotificationKind::title)
        .collect();
    format!("Notifications are configured ({}).", kinds.join(", "))
}

/// One-paragraph summary used in project lists.
pub fn project_description(project: &Project) -> String {
    let mut text = String::new();
    if !project.is_active {
        text.push_str("Project is disabled. ");
    }
    if !project.notifications.enabled {
        text.push_str("Notifications are disabled. ");
    }
    text.push_str(&backup_period_text(project));
    text.push_str(". ");
    text.push_str(&notifications_text(project));
    text
}

/// Filled star for the most recent backup, hollow for archived ones.
pub fn backup_icon(backup: &Backup) -> &'static str {
    if backup.is_last() {
        "★"
    } else {
        "☆"
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::client::NotificationParams;

    fn project(status: &str, last_backup: Option<&str>) -> Project {
        let last_backup = last_backup.map(|time| {
            serde_json::json!({"id": "b", "filename": "b.zip", "time": time, "type": "last"})
        });
        serde_json::from_value(serde_json::json!({
            "id": "db-main",
            "name": "Main DB",
            "isActive": true,
            "backupFrequency": 86400,
            "backupRetention": 10,
            "notifications": {"enabled": false},
            "lastBackup": last_backup,
            "backupStatus": status,
        }))
        .unwrap()
    }

    const NOW: OffsetDateTime = datetime!(2020-01-01 15:00 UTC);

    #[test]
    fn status_labels_and_icons() {
        let ok = BackupStatus::Ok;
        assert_eq!(status_text(&ok), "Backup is up to date");
        assert_eq!(status_icon(&ok), StatusIcon::CheckCircle);
        assert_eq!(status_icon(&BackupStatus::None), StatusIcon::ExclamationTriangle);
        assert_eq!(status_icon(&BackupStatus::Outdated), StatusIcon::ExclamationCircle);

        let other = BackupStatus::Other("paused".to_owned());
        assert_eq!(status_text(&other), "paused");
        assert_eq!(status_icon(&other), StatusIcon::Question);
    }

    #[test]
    fn last_backup_sentence() {
        let p = project("ok", Some("2020-01-01T12:00:00Z"));
        assert_eq!(
            last_backup_text(&p, NOW),
            "Last backup has been taken 3 hours ago"
        );

        let p = project("none", None);
        assert_eq!(last_backup_text(&p, NOW), "No backups are available");
    }

    #[test]
    fn list_status_line() {
        let p = project("outdated", Some("2019-12-30T15:00:00Z"));
        assert_eq!(list_status_text(&p, NOW), "Out of date, backup created 2 days ago");
        assert_eq!(list_status_text(&project("ok", None), NOW), "OK");
        assert_eq!(list_status_text(&project("none", None), NOW), "No backup exists");
    }

    #[test]
    fn description_lists_configured_kinds() {
        let mut p = project("ok", None);
        assert_eq!(
            project_description(&p),
            "Notifications are disabled. Backups are expected to be taken every 1 day. \
             No notifications are configured"
        );

        p.is_active = false;
        p.notifications = NotificationParams {
            enabled: true,
            slack: vec!["@ops".to_owned()],
            telegram: vec![],
            webhook: vec!["https://example.com".to_owned()],
        };
        assert_eq!(
            project_description(&p),
            "Project is disabled. Backups are expected to be taken every 1 day. \
             Notifications are configured (Slack, Webhook)."
        );
    }

    #[test]
    fn period_and_retention() {
        let p = project("ok", None);
        assert_eq!(backup_period_text(&p), "Backups are expected to be taken every 1 day");
        assert_eq!(backup_retention_text(&p), "Will keep at least 10 last backups");
    }
}
