//! Client-side input validation.
//!
//! These checks only spare a round-trip; the server remains the authority
//! and may still reject input accepted here.

use std::{fmt, sync::OnceLock};

use regex::Regex;
use url::Url;

use crate::client::{
    NotificationKind, NotificationParams, ProjectCreateParams, ProjectUpdateParams,
};

pub const MIN_BACKUP_FREQUENCY: u64 = 3600;
pub const MIN_BACKUP_RETENTION: u64 = 1;

const REQUIRED: &str = "This field is required";

/// Validate a notification target of the given kind
pub fn validate_target(kind: NotificationKind, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Value is empty".to_string());
    }

    match kind {
        NotificationKind::Slack => {
            static SLACK_REGEX: OnceLock<Regex> = OnceLock::new();
            let regex = SLACK_REGEX.get_or_init(|| {
                Regex::new(r"^(@|#)[a-zA-Z0-9_-]+$").expect("Failed to compile Slack regex")
            });

            if !regex.is_match(value) {
                return Err("This is neither a Slack username nor a Slack channel.\n\
                     Username should start with \"@\", e.g. \"@backup_admin\"\n\
                     Channel name should start with \"#\", e.g. \"#general\"."
                    .to_string());
            }
        }
        NotificationKind::Telegram => {
            static TELEGRAM_REGEX: OnceLock<Regex> = OnceLock::new();
            let regex = TELEGRAM_REGEX.get_or_init(|| {
                Regex::new(r"^-?[0-9]+$").expect("Failed to compile Telegram regex")
            });

            if !regex.is_match(value) {
                return Err("This is not a valid Telegram group ID.\n\
                     Group ID should be a number."
                    .to_string());
            }
        }
        NotificationKind::Webhook => {
            let url = Url::parse(value).map_err(|_| "This is not a valid URL".to_string())?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err("This is not an HTTP(S) URL".to_string());
            }
        }
    }

    Ok(())
}

/// Validate a project identifier
pub fn validate_project_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(REQUIRED.to_string());
    }

    if id.chars().count() < 2 {
        return Err("Project ID must be at least 2 characters long".to_string());
    }

    static PROJECT_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PROJECT_ID_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9-]*[a-z0-9]$").expect("Failed to compile project ID regex")
    });

    if !regex.is_match(id) {
        return Err("Project ID should start with a lowercase letter, \
             contain only lowercase letters, digits and hyphens, \
             and must not end with a hyphen"
            .to_string());
    }

    Ok(())
}

/// Validate a project display name
pub fn validate_project_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is not set".to_string());
    }
    Ok(())
}

/// Parse and validate the expected backup interval, in seconds
pub fn parse_backup_frequency(value: &str) -> Result<u64, String> {
    let seconds = parse_required_number(value)?;
    if seconds < MIN_BACKUP_FREQUENCY {
        return Err(format!(
            "Backup frequency must be at least {MIN_BACKUP_FREQUENCY} seconds"
        ));
    }
    Ok(seconds)
}

/// Parse and validate the number of backups to keep
pub fn parse_backup_retention(value: &str) -> Result<u64, String> {
    let count = parse_required_number(value)?;
    if count < MIN_BACKUP_RETENTION {
        return Err(format!(
            "Backup retention must be at least {MIN_BACKUP_RETENTION}"
        ));
    }
    Ok(count)
}

fn parse_required_number(value: &str) -> Result<u64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(REQUIRED.to_string());
    }
    match value.parse::<i64>() {
        Ok(n) if n < 0 => Ok(0),
        Ok(n) => Ok(n as u64),
        Err(_) => Err("Must be a whole number".to_string()),
    }
}

/// Validate an access key label
pub fn validate_access_key_label(label: &str) -> Result<(), String> {
    if label.trim().is_empty() {
        return Err("Label is required".to_string());
    }
    Ok(())
}

/// Destructive actions need an explicit confirmation
pub fn require_confirmation(confirmed: bool) -> Result<(), String> {
    if !confirmed {
        return Err("you should confirm your action".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every failing field of a submitted form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(pub Vec<FieldError>);

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

impl FormErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn check<T>(&mut self, field: &'static str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.push(field, message);
                None
            }
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

/// Raw project form input, as typed by the user.
#[derive(Debug, Clone)]
pub struct ProjectForm {
    pub id: String,
    pub name: String,
    pub backup_frequency: String,
    pub backup_retention: String,
    pub is_active: bool,
    pub notifications: NotificationParams,
}

impl Default for ProjectForm {
    fn default() -> Self {
        let defaults = ProjectCreateParams::default();
        Self {
            id: defaults.id,
            name: defaults.name,
            backup_frequency: defaults.backup_frequency.to_string(),
            backup_retention: defaults.backup_retention.to_string(),
            is_active: defaults.is_active,
            notifications: defaults.notifications,
        }
    }
}

impl ProjectForm {
    pub fn into_create_params(self) -> Result<ProjectCreateParams, FormErrors> {
        let mut errors = FormErrors::default();
        errors.check("id", validate_project_id(&self.id));
        errors.check("name", validate_project_name(&self.name));
        let frequency = errors.check(
            "backupFrequency",
            parse_backup_frequency(&self.backup_frequency),
        );
        let retention = errors.check(
            "backupRetention",
            parse_backup_retention(&self.backup_retention),
        );

        errors.finish(|| ProjectCreateParams {
            id: self.id,
            name: self.name,
            is_active: self.is_active,
            backup_frequency: frequency.unwrap_or_default(),
            backup_retention: retention.unwrap_or_default(),
            notifications: self.notifications,
        })
    }

    /// The id is fixed once a project exists and is not checked here.
    pub fn into_update_params(self) -> Result<ProjectUpdateParams, FormErrors> {
        let mut errors = FormErrors::default();
        errors.check("name", validate_project_name(&self.name));
        let frequency = errors.check(
            "backupFrequency",
            parse_backup_frequency(&self.backup_frequency),
        );
        let retention = errors.check(
            "backupRetention",
            parse_backup_retention(&self.backup_retention),
        );

        errors.finish(|| ProjectUpdateParams {
            name: Some(self.name),
            is_active: Some(self.is_active),
            backup_frequency: frequency.unwrap_or_default(),
            backup_retention: retention.unwrap_or_default(),
            notifications: self.notifications,
        })
    }
}

/// Both login fields are required.
pub fn validate_login(username: &str, password: &str) -> Result<(), FormErrors> {
    let mut errors = FormErrors::default();
    if username.is_empty() {
        errors.push("username", REQUIRED);
    }
    if password.is_empty() {
        errors.push("password", REQUIRED);
    }
    errors.finish(|| ())
}

/// Checks a password change, stopping at the first failing field.
pub fn validate_password_change(
    old_password: &str,
    new_password: &str,
    new_password_again: &str,
) -> Result<(), FormErrors> {
    let error = if old_password.is_empty() {
        Some(("oldPassword", REQUIRED))
    } else if new_password.is_empty() {
        Some(("newPassword", REQUIRED))
    } else if new_password_again.is_empty() {
        Some(("newPasswordAgain", REQUIRED))
    } else if new_password != new_password_again {
        Some(("newPasswordAgain", "Passwords do not match"))
    } else {
        None
    };

    let mut errors = FormErrors::default();
    if let Some((field, message)) = error {
        errors.push(field, message);
    }
    errors.finish(|| ())
}
