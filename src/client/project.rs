use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::Backup;

/// Backup health as computed by the server. Never derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum BackupStatus {
    Ok,
    Outdated,
    None,
    /// A value this client does not know about, rendered verbatim.
    Other(String),
}

impl From<String> for BackupStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ok" => Self::Ok,
            "outdated" => Self::Outdated,
            "none" => Self::None,
            _ => Self::Other(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    /// Expected interval between backups, in seconds.
    pub backup_frequency: u64,
    /// Number of backups to keep.
    pub backup_retention: u64,
    #[serde(default)]
    pub notifications: NotificationParams,
    #[serde(default)]
    pub last_backup: Option<Backup>,
    pub backup_status: BackupStatus,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Slack,
    Telegram,
    Webhook,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 3] = [Self::Slack, Self::Telegram, Self::Webhook];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Telegram => "telegram",
            Self::Webhook => "webhook",
        }
    }

    /// Short product name, as used in project descriptions.
    pub fn title(self) -> &'static str {
        match self {
            Self::Slack => "Slack",
            Self::Telegram => "Telegram",
            Self::Webhook => "Webhook",
        }
    }

    /// What a target of this kind addresses.
    pub fn target_description(self) -> &'static str {
        match self {
            Self::Slack => "Slack user/channel",
            Self::Telegram => "Telegram group",
            Self::Webhook => "Webhook",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "telegram" => Ok(Self::Telegram),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!(
                "unknown notification type \"{other}\" (expected slack, telegram or webhook)"
            )),
        }
    }
}

/// Notification settings of a project. Each target list holds unique values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationParams {
    pub enabled: bool,
    #[serde(default)]
    pub slack: Vec<String>,
    #[serde(default)]
    pub telegram: Vec<String>,
    #[serde(default)]
    pub webhook: Vec<String>,
}

impl NotificationParams {
    pub fn targets_of(&self, kind: NotificationKind) -> &[String] {
        match kind {
            NotificationKind::Slack => &self.slack,
            NotificationKind::Telegram => &self.telegram,
            NotificationKind::Webhook => &self.webhook,
        }
    }

    fn targets_of_mut(&mut self, kind: NotificationKind) -> &mut Vec<String> {
        match kind {
            NotificationKind::Slack => &mut self.slack,
            NotificationKind::Telegram => &mut self.telegram,
            NotificationKind::Webhook => &mut self.webhook,
        }
    }

    /// Adds a target. Returns `false` if it was already present.
    pub fn add(&mut self, kind: NotificationKind, value: impl Into<String>) -> bool {
        let value = value.into();
        let targets = self.targets_of_mut(kind);
        if targets.contains(&value) {
            return false;
        }
        targets.push(value);
        true
    }

    /// Removes a single target. Returns `false` if it was not present.
    pub fn remove(&mut self, kind: NotificationKind, value: &str) -> bool {
        let targets = self.targets_of_mut(kind);
        match targets.iter().position(|t| t == value) {
            Some(idx) => {
                targets.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn has_any_targets(&self) -> bool {
        NotificationKind::ALL
            .iter()
            .any(|&kind| !self.targets_of(kind).is_empty())
    }

    /// All targets, Slack first, then Telegram, then webhooks.
    pub fn targets(&self) -> impl Iterator<Item = (NotificationKind, &str)> + '_ {
        NotificationKind::ALL.into_iter().flat_map(move |kind| {
            self.targets_of(kind)
                .iter()
                .map(move |value| (kind, value.as_str()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreateParams {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub backup_frequency: u64,
    pub backup_retention: u64,
    pub notifications: NotificationParams,
}

impl ProjectCreateParams {
    pub const DEFAULT_FREQUENCY: u64 = 24 * 3600;
    pub const DEFAULT_RETENTION: u64 = 10;
}

impl Default for ProjectCreateParams {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            is_active: true,
            backup_frequency: Self::DEFAULT_FREQUENCY,
            backup_retention: Self::DEFAULT_RETENTION,
            notifications: NotificationParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdateParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    pub backup_frequency: u64,
    pub backup_retention: u64,
    pub notifications: NotificationParams,
}

impl From<&Project> for ProjectUpdateParams {
    fn from(project: &Project) -> Self {
        Self {
            name: Some(project.name.clone()),
            is_active: Some(project.is_active),
            backup_frequency: project.backup_frequency,
            backup_retention: project.backup_retention,
            notifications: project.notifications.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TestNotificationRequest<'a> {
    pub target: &'a str,
}
