use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use slog::{debug, info, Logger};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    client::{AccessKey, Backup, Client, NotificationKind, Project, ProjectUpdateParams},
    guide::IntegrationGuide,
    presentation,
    pretty::format_relative,
    validate::{self, ProjectForm},
};

pub const USAGE: &str = "\
usage: backupmonitor-cli <command> [args]

session:
  login [username]                   log in (password from BACKUPMONITOR_PASSWORD, else
                                     read from stdin with echo on)
  logout                             forget the stored session
  whoami                             show the logged in user
  passwd                             change your password (typed passwords are echoed)

projects:
  projects                           list projects
  project <id>                       show a project with its backups and keys
  create-project --id <id> --name <name> [--frequency <sec>] [--retention <n>]
                 [--inactive] [--notify] [--slack <t>] [--telegram <t>] [--webhook <t>]
  edit-project <id> [--name <name>] [--frequency <sec>] [--retention <n>]
               [--active <true|false>] [--notify <true|false>]
  delete-project <id> --confirm      delete a project with all its backups and keys
  add-target <id> <slack|telegram|webhook> <target>
  remove-target <id> <slack|telegram|webhook> <target>
  test-notify <slack|telegram|webhook> <target>
  guide <id>                         show how to upload backups

backups:
  backups <id>                       list backups of a project
  download-backup <backup-id> [--output <file>]
                                     save a backup (default file name: the backup id)
  delete-backup <backup-id>

access keys:
  keys <id>                          list access keys of a project
  create-key <id> <label>
  show-key <id> <key-id>
  delete-key <id> <key-id>

environment:
  BACKUPMONITOR_URL        service base URL (required)
  BACKUPMONITOR_STATE_DIR  session storage directory (default ~/.backupmonitor)
  BACKUPMONITOR_PASSWORD   password for non-interactive login
  RUST_LOG                 log filter, e.g. debug";

/// Options that take no value for the given command.
fn is_switch(command: Option<&str>, name: &str) -> bool {
    match name {
        "confirm" | "inactive" => true,
        "notify" => command == Some("create-project"),
        _ => false,
    }
}

/// Command line split into positionals and `--options`.
#[derive(Debug, Default)]
pub struct Args {
    pub command: Option<String>,
    positional: Vec<String>,
    options: Vec<(String, String)>,
}

impl Args {
    pub fn parse(raw: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = Args::default();
        let mut raw = raw.into_iter();
        args.command = raw.next();

        while let Some(arg) = raw.next() {
            if !arg.starts_with("--") {
                args.positional.push(arg);
                continue;
            }
            let name = &arg[2..];

            if let Some((name, value)) = name.split_once('=') {
                args.options.push((name.to_owned(), value.to_owned()));
            } else if is_switch(args.command.as_deref(), name) {
                args.options.push((name.to_owned(), "true".to_owned()));
            } else {
                let value = raw
                    .next()
                    .with_context(|| format!("--{name} needs a value"))?;
                args.options.push((name.to_owned(), value));
            }
        }
        Ok(args)
    }

    /// No command, or an explicit request for help.
    pub fn wants_usage(&self) -> bool {
        matches!(self.command.as_deref(), None | Some("help" | "--help" | "-h"))
    }

    fn positional(&self, idx: usize, what: &str) -> Result<&str> {
        self.positional
            .get(idx)
            .map(String::as_str)
            .with_context(|| format!("missing {what}"))
    }

    fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn options(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        let name = name.to_owned();
        self.options
            .iter()
            .filter(move |(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    fn flag(&self, name: &str) -> Result<bool> {
        match self.option(name) {
            None => Ok(false),
            Some(v) => parse_bool(name, v),
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => bail!("--{name} expects true or false, got \"{value}\""),
    }
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn parse_kind(value: &str) -> Result<NotificationKind> {
    value.parse().map_err(anyhow::Error::msg)
}

fn parse_key_id(value: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("\"{value}\" is not an access key id"))
}

pub fn run(client: &Client, log: &Logger, args: &Args) -> Result<()> {
    let Some(command) = args.command.as_deref() else {
        bail!("missing command\n\n{USAGE}");
    };

    match command {
        "login" => login(client, log, args),
        "logout" => {
            client.unauthorize()?;
            println!("Logged out");
            Ok(())
        }
        "whoami" => whoami(client),
        "passwd" => change_password(client),
        "projects" => list_projects(client),
        "project" => show_project(client, args.positional(0, "project id")?),
        "create-project" => create_project(client, args),
        "edit-project" => edit_project(client, args),
        "delete-project" => delete_project(client, log, args),
        "add-target" | "remove-target" => edit_target(client, args, command == "add-target"),
        "test-notify" => {
            let kind = parse_kind(args.positional(0, "notification type")?)?;
            let target = args.positional(1, "target")?;
            validate::validate_target(kind, target).map_err(anyhow::Error::msg)?;
            client.test_notification(kind, target)?;
            println!("Test notification sent to {kind} target {target}");
            Ok(())
        }
        "guide" => {
            let project = client.get_project(args.positional(0, "project id")?)?;
            println!("{}", IntegrationGuide::new(client.base_url(), &project.id).render());
            Ok(())
        }
        "backups" => {
            let backups = client.get_project_backups(args.positional(0, "project id")?)?;
            print_backups(&backups, OffsetDateTime::now_utc());
            Ok(())
        }
        "download-backup" => download_backup(client, log, args),
        "delete-backup" => {
            let id = args.positional(0, "backup id")?;
            client.delete_backup(id)?;
            info!(log, "Backup deleted"; "id" => id);
            println!("Backup {id} deleted");
            Ok(())
        }
        "keys" => {
            let keys = client.get_project_access_keys(args.positional(0, "project id")?)?;
            print_access_keys(&keys);
            Ok(())
        }
        "create-key" => {
            let project = args.positional(0, "project id")?;
            let label = args.positional(1, "label")?;
            validate::validate_access_key_label(label).map_err(anyhow::Error::msg)?;
            let key = client.create_project_access_key(project, label.trim())?;
            println!("Created access key #{} \"{}\":\n{}", key.id, key.label, key.key);
            Ok(())
        }
        "show-key" => {
            let project = args.positional(0, "project id")?;
            let key_id = parse_key_id(args.positional(1, "key id")?)?;
            let key = client.get_project_access_key(project, key_id)?;
            println!("{}", key.key);
            Ok(())
        }
        "delete-key" => {
            let project = args.positional(0, "project id")?;
            let key_id = parse_key_id(args.positional(1, "key id")?)?;
            client.delete_project_access_key(project, key_id)?;
            println!("Access key #{key_id} deleted");
            Ok(())
        }
        other => bail!("unknown command \"{other}\"\n\n{USAGE}"),
    }
}

fn login(client: &Client, log: &Logger, args: &Args) -> Result<()> {
    let username = match args.positional.first() {
        Some(u) => u.clone(),
        None => prompt("Username")?,
    };
    let password = match std::env::var("BACKUPMONITOR_PASSWORD") {
        Ok(p) => p,
        Err(_) => prompt("Password")?,
    };
    validate::validate_login(&username, &password)?;
    if client.is_authorized() {
        debug!(log, "Replacing existing session");
    }

    let user = client.authorize(&username, &password)?;
    info!(log, "Session stored"; "username" => &user.username);
    println!("Logged in as {}", user.username);
    Ok(())
}

fn whoami(client: &Client) -> Result<()> {
    let Some(stored) = client.user() else {
        bail!("Not logged in");
    };
    let user = client.get_me()?;
    if user != stored {
        println!("Stored session belongs to {}", stored.username);
    }
    println!("{} (id {})", user.username, user.id);
    Ok(())
}

fn change_password(client: &Client) -> Result<()> {
    let old_password = prompt("Current password")?;
    let new_password = prompt("New password")?;
    let new_password_again = prompt("Repeat new password")?;
    validate::validate_password_change(&old_password, &new_password, &new_password_again)?;

    client.change_password(&old_password, &new_password)?;
    println!("Password changed");
    Ok(())
}

fn list_projects(client: &Client) -> Result<()> {
    let projects = client.get_projects()?;
    if projects.is_empty() {
        println!("No projects");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    for project in &projects {
        println!(
            "{} {} ({}): {}",
            presentation::status_icon(&project.backup_status),
            project.name,
            project.id,
            presentation::list_status_text(project, now)
        );
        println!("    {}", presentation::project_description(project));
    }
    Ok(())
}

fn show_project(client: &Client, id: &str) -> Result<()> {
    let overview = client.get_project_overview(id)?;
    let now = OffsetDateTime::now_utc();
    print_summary(&overview.project, now);

    println!();
    println!("Backups:");
    print_backups(&overview.backups, now);

    println!();
    println!("Access keys:");
    print_access_keys(&overview.access_keys);
    Ok(())
}

fn print_summary(project: &Project, now: OffsetDateTime) {
    println!("{} ({})", project.name, project.id);
    println!(
        "{} {}",
        presentation::status_icon(&project.backup_status),
        presentation::status_text(&project.backup_status)
    );
    println!("{}", presentation::last_backup_text(project, now));
    println!("{}", presentation::backup_period_text(project));
    println!("{}", presentation::backup_retention_text(project));
    if !project.is_active {
        println!("Project is disabled");
    }

    if project.notifications.has_any_targets() {
        let state = if project.notifications.enabled {
            "enabled"
        } else {
            "disabled"
        };
        println!("Notification targets ({state}):");
        for (kind, value) in project.notifications.targets() {
            println!("  {}: {}", kind.target_description(), value);
        }
    } else {
        println!("No notification targets");
    }
}

fn print_backups(backups: &[Backup], now: OffsetDateTime) {
    if backups.is_empty() {
        println!("No backups are available");
        return;
    }
    for backup in backups {
        let time = backup
            .time
            .format(&Rfc3339)
            .unwrap_or_else(|_| backup.time.to_string());
        let mut line = format!(
            "{} {}  {}  {} ({})",
            presentation::backup_icon(backup),
            backup.id,
            backup.filename,
            time,
            format_relative(backup.time, now)
        );
        if let Some(size) = backup.size_text() {
            line.push_str(&format!("  {size}"));
        }
        println!("{line}");
    }
}

fn print_access_keys(keys: &[AccessKey]) {
    if keys.is_empty() {
        println!("No access keys");
        return;
    }
    for key in keys {
        println!("#{} {}", key.id, key.label);
    }
}

fn create_project(client: &Client, args: &Args) -> Result<()> {
    let mut form = ProjectForm {
        id: args.option("id").unwrap_or_default().to_owned(),
        name: args.option("name").unwrap_or_default().to_owned(),
        is_active: !args.flag("inactive")?,
        ..Default::default()
    };
    if let Some(frequency) = args.option("frequency") {
        form.backup_frequency = frequency.to_owned();
    }
    if let Some(retention) = args.option("retention") {
        form.backup_retention = retention.to_owned();
    }
    form.notifications.enabled = args.flag("notify")?;
    for kind in NotificationKind::ALL {
        for target in args.options(kind.as_str()) {
            validate::validate_target(kind, target)
                .map_err(|e| anyhow::anyhow!("{kind} target \"{target}\": {e}"))?;
            form.notifications.add(kind, target);
        }
    }

    let params = form.into_create_params()?;
    let project = client.create_project(&params)?;
    println!("Created project {} ({})", project.name, project.id);
    Ok(())
}

fn edit_project(client: &Client, args: &Args) -> Result<()> {
    let id = args.positional(0, "project id")?;
    let project = client.get_project(id)?;

    let mut form = ProjectForm {
        id: project.id.clone(),
        name: project.name.clone(),
        backup_frequency: project.backup_frequency.to_string(),
        backup_retention: project.backup_retention.to_string(),
        is_active: project.is_active,
        notifications: project.notifications.clone(),
    };
    if let Some(name) = args.option("name") {
        form.name = name.to_owned();
    }
    if let Some(frequency) = args.option("frequency") {
        form.backup_frequency = frequency.to_owned();
    }
    if let Some(retention) = args.option("retention") {
        form.backup_retention = retention.to_owned();
    }
    if let Some(active) = args.option("active") {
        form.is_active = parse_bool("active", active)?;
    }
    if let Some(notify) = args.option("notify") {
        form.notifications.enabled = parse_bool("notify", notify)?;
    }

    let params = form.into_update_params()?;
    let project = client.update_project(id, &params)?;
    println!("Updated project {} ({})", project.name, project.id);
    Ok(())
}

fn delete_project(client: &Client, log: &Logger, args: &Args) -> Result<()> {
    let id = args.positional(0, "project id")?;
    validate::require_confirmation(args.flag("confirm")?)
        .map_err(|e| anyhow::anyhow!("{e} (pass --confirm)"))?;

    client.delete_project(id)?;
    info!(log, "Project deleted"; "id" => id);
    println!("Project {id} deleted");
    Ok(())
}

fn edit_target(client: &Client, args: &Args, add: bool) -> Result<()> {
    let id = args.positional(0, "project id")?;
    let kind = parse_kind(args.positional(1, "notification type")?)?;
    let target = args.positional(2, "target")?;
    if add {
        validate::validate_target(kind, target).map_err(anyhow::Error::msg)?;
    }

    let project = client.get_project(id)?;
    let mut params = ProjectUpdateParams::from(&project);
    let changed = if add {
        params.notifications.add(kind, target)
    } else {
        params.notifications.remove(kind, target)
    };
    if !changed {
        let state = if add { "already" } else { "not" };
        println!("{kind} target {target} is {state} configured for {id}");
        return Ok(());
    }

    client.update_project(id, &params)?;
    let verb = if add { "Added" } else { "Removed" };
    println!("{verb} {} {target}", kind.target_description());
    Ok(())
}

fn download_backup(client: &Client, log: &Logger, args: &Args) -> Result<()> {
    let id = args.positional(0, "backup id")?;
    let output = args
        .option("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(id));

    let bytes = client.download_backup(id)?;
    fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(log, "Backup downloaded"; "url" => client.backup_download_url(id), "dst" => output.to_str(), "bytes" => bytes.len());
    println!("Saved {} to {}", id, output.display());
    Ok(())
}
