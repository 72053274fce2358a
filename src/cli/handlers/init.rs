use std::fs;
use std::path::PathBuf;

use crate::cli::commands::InitArgs;
use crate::io::recovery::atomic_write;
use crate::io::workspace::{self, DAYLOG_DIR, WorkspaceError};
use crate::model::config::validate_owner;

const CONFIG_TEMPLATE: &str = r##"[owner]
id = "{owner}"

[carry_over]
# Days before the target day scanned for unfinished items
lookback_days = 7

[cache]
# Keep cached views in .daylog/cache/ between runs
durable = true
ttl_secs = 1800

[save]
# Save right after `dl carry --accept` instead of on the next `dl save`
auto_save_carry_over = false

# --- Feedback ---
# A command that reads a request as JSON on stdin and prints
# {"summary": "...", "points": [...], "tips": [...]} on stdout.
#
# [feedback]
# command = "my-analyzer --json"
"##;

fn render_config(owner: &str) -> String {
    CONFIG_TEMPLATE.replace("{owner}", owner)
}

pub fn cmd_init(args: InitArgs, project_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let root = match project_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let daylog_dir = root.join(DAYLOG_DIR);

    if daylog_dir.is_dir() && !args.force {
        return Err(WorkspaceError::AlreadyExists(daylog_dir).into());
    }

    if let Some(parent) = root.parent()
        && let Ok(parent_root) = workspace::discover_workspace(parent)
    {
        eprintln!(
            "Note: parent workspace found at {}/",
            parent_root.join(DAYLOG_DIR).display()
        );
        eprintln!("Creating new workspace in ./{}/", DAYLOG_DIR);
    }

    let owner = args.owner.unwrap_or_else(|| "me".to_string());
    validate_owner(&owner)?;

    fs::create_dir_all(daylog_dir.join("days"))?;
    fs::create_dir_all(daylog_dir.join("cache"))?;
    atomic_write(&daylog_dir.join("config.toml"), render_config(&owner).as_bytes())?;

    println!("Initialized daylog workspace in {}/", daylog_dir.display());
    Ok(())
}
