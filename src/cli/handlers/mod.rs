mod init;
pub use init::cmd_init;

use std::io::Read;

use chrono::{Days, Local, NaiveDate};

use crate::cache::TwoTierCache;
use crate::cache::invalidation::invalidate_owner;
use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::json_store::JsonFileStore;
use crate::io::lock::{LockError, WorkspaceLock};
use crate::io::recovery::{self, log_failed_edit, log_failed_save};
use crate::io::workspace::Workspace;
use crate::model::record::WorkItemRecord;
use crate::ops::carry_over::{PendingCarryOver, carry_over_candidates};
use crate::ops::day_sync::{DaySync, SaveOutcome, day_records};
use crate::ops::feedback::{AnalyzerError, CommandAnalyzer, request_feedback};
use crate::ops::item_ops::{EditOutcome, ItemEdit, ItemEditor, ItemError};
use crate::ops::reconcile::reconcile;
use crate::ops::views::Views;
use crate::parse::{append_line, parse_lines, remove_line, render_buffer, render_line};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let dir = cli.project_dir.as_deref();

    let Some(command) = cli.command else {
        return Err("no command given (try `dl --help`)".into());
    };

    match command {
        // Init runs before any workspace exists
        Commands::Init(args) => cmd_init(args, dir),

        // Day commands
        Commands::Save(args) => cmd_save(&Context::open(dir)?, args, json).await,
        Commands::Show(args) => cmd_show(&Context::open(dir)?, args, json).await,
        Commands::Buffer(args) => cmd_buffer(&Context::open(dir)?, args).await,
        Commands::Carry(args) => cmd_carry(&Context::open(dir)?, args, json).await,

        // Item commands
        Commands::Toggle(args) => {
            cmd_edit(&Context::open(dir)?, &args.id, ItemEdit::ToggleCompleted, json).await
        }
        Commands::Progress(args) => {
            let edit = ItemEdit::SetProgress(args.value);
            cmd_edit(&Context::open(dir)?, &args.id, edit, json).await
        }
        Commands::Due(args) => {
            let due = match args.date.as_str() {
                "none" => None,
                other => Some(parse_day(Some(other))?),
            };
            cmd_edit(&Context::open(dir)?, &args.id, ItemEdit::SetDueDate(due), json).await
        }
        Commands::Detail(args) => {
            cmd_edit(&Context::open(dir)?, &args.id, ItemEdit::SetDetail(args.text), json).await
        }
        Commands::Note(args) => {
            let (id, edit) = match args.action {
                NoteAction::Add { id, text } => (id, ItemEdit::AddNote(text)),
                NoteAction::Edit { id, note_id, text } => (
                    id,
                    ItemEdit::EditNote {
                        id: note_id,
                        content: text,
                    },
                ),
                NoteAction::Rm { id, note_id } => (id, ItemEdit::RemoveNote(note_id)),
            };
            cmd_edit(&Context::open(dir)?, &id, edit, json).await
        }
        Commands::Sub(args) => {
            let (id, edit) = match args.action {
                SubAction::Add { id, text } => (id, ItemEdit::AddSubItem(text)),
                SubAction::Edit { id, sub_id, text } => (
                    id,
                    ItemEdit::EditSubItem {
                        id: sub_id,
                        content: text,
                    },
                ),
                SubAction::Toggle { id, sub_id } => (id, ItemEdit::ToggleSubItem(sub_id)),
                SubAction::Rm { id, sub_id } => (id, ItemEdit::RemoveSubItem(sub_id)),
            };
            cmd_edit(&Context::open(dir)?, &id, edit, json).await
        }
        Commands::Mv(args) => {
            let edit = ItemEdit::MoveTo(parse_day(Some(&args.date))?);
            cmd_edit(&Context::open(dir)?, &args.id, edit, json).await
        }
        Commands::Backlog(args) => {
            let edit = ItemEdit::SetBacklog(!args.restore);
            cmd_edit(&Context::open(dir)?, &args.id, edit, json).await
        }

        // Views
        Commands::Summary(args) => cmd_summary(&Context::open(dir)?, args, json).await,
        Commands::Week(args) => cmd_week(&Context::open(dir)?, args, json).await,
        Commands::Projects => cmd_projects(&Context::open(dir)?, json).await,
        Commands::Feedback(args) => cmd_feedback(&Context::open(dir)?, args, json).await,

        // Maintenance
        Commands::Cache(args) => cmd_cache(&Context::open(dir)?, args, json),
        Commands::Recovery(args) => cmd_recovery(&Context::open(dir)?, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An opened workspace with its record store and cache
struct Context {
    ws: Workspace,
    store: JsonFileStore,
    cache: TwoTierCache,
}

impl Context {
    fn open(project_dir: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let start = match project_dir {
            Some(dir) => std::fs::canonicalize(dir)
                .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
            None => std::env::current_dir()?,
        };
        let ws = Workspace::discover(&start)?;
        let store = JsonFileStore::new(ws.records_path());
        let cache = TwoTierCache::from_config(&ws.config().cache, &ws.cache_dir());
        tracing::debug!(root = %ws.root().display(), owner = ws.owner_id(), "opened workspace");
        Ok(Context { ws, store, cache })
    }

    fn owner(&self) -> &str {
        self.ws.owner_id()
    }

    fn lock(&self) -> Result<WorkspaceLock, LockError> {
        WorkspaceLock::acquire_default(self.ws.dir())
    }

    /// The day's buffer, or its records rendered as text when no buffer has
    /// been stored yet
    async fn buffer_or_rendered(&self, date: NaiveDate) -> Result<String, Box<dyn std::error::Error>> {
        if self.ws.buffer_path(date).exists() {
            return Ok(self.ws.read_buffer(date)?);
        }
        let records = day_records(&self.store, &self.cache, self.owner(), date).await?;
        Ok(render_buffer(&records))
    }
}

/// Parse a day argument: `YYYY-MM-DD`, `today`, `yesterday` or `tomorrow`
fn parse_day(arg: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    let date = match arg {
        None | Some("today") => Some(today),
        Some("yesterday") => today.checked_sub_days(Days::new(1)),
        Some("tomorrow") => today.checked_add_days(Days::new(1)),
        Some(s) => Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD", s))?,
        ),
    };
    Ok(date.ok_or("date out of range")?)
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Save `text` as the day's buffer. On failure the text goes to the
/// recovery log so nothing typed is lost.
async fn save_day(
    ctx: &Context,
    date: NaiveDate,
    text: &str,
) -> Result<SaveOutcome, Box<dyn std::error::Error>> {
    let mut pending = ctx.ws.load_pending(date)?;
    let sync = DaySync::new(&ctx.store, &ctx.cache, ctx.owner(), date);
    match sync.save(text, &mut pending).await {
        Ok(outcome) => {
            ctx.ws.write_buffer(date, text)?;
            ctx.ws.save_pending(date, &pending)?;
            Ok(outcome)
        }
        Err(e) => {
            log_failed_save(ctx.ws.dir(), &date.to_string(), text, &e.to_string());
            Err(format!("{} (buffer kept in the recovery log, see `dl recovery`)", e).into())
        }
    }
}

// ---------------------------------------------------------------------------
// Day commands
// ---------------------------------------------------------------------------

async fn cmd_save(ctx: &Context, args: SaveArgs, json: bool) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    let text = match args.file.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("could not read {}: {}", path, e))?,
        None => {
            if !ctx.ws.buffer_path(date).exists() {
                return Err(format!(
                    "no buffer stored for {}; pass --file PATH or --file -",
                    date
                )
                .into());
            }
            ctx.ws.read_buffer(date)?
        }
    };

    let _lock = ctx.lock()?;
    let outcome = save_day(ctx, date, &text).await?;

    if json {
        print_json(&save_to_json(date, &outcome))
    } else {
        println!("{}", format_save(date, &outcome));
        Ok(())
    }
}

async fn cmd_show(ctx: &Context, args: DateArgs, json: bool) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    let records = day_records(&ctx.store, &ctx.cache, ctx.owner(), date).await?;

    if json {
        return print_json(&DayJson {
            date,
            items: records.iter().map(item_to_json).collect(),
        });
    }
    if records.is_empty() {
        println!("no items for {}", date);
    }
    for record in &records {
        for line in format_item_detail(record) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn cmd_buffer(ctx: &Context, args: DateArgs) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    print!("{}", ctx.buffer_or_rendered(date).await?);
    Ok(())
}

async fn cmd_carry(ctx: &Context, args: CarryArgs, json: bool) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    let lookback = ctx.ws.config().carry_over.lookback_days;
    let candidates = carry_over_candidates(&ctx.store, ctx.owner(), date, lookback).await;

    if args.accept.is_empty() && !args.all {
        if json {
            return print_json(&CarryJson {
                date,
                candidates: candidates_to_json(&candidates),
                accepted: 0,
                staged: ctx.ws.load_pending(date)?.len(),
                saved: None,
            });
        }
        if candidates.is_empty() {
            println!("nothing to carry over into {}", date);
        }
        for (i, candidate) in candidates.iter().enumerate() {
            println!("{}", format_candidate(i + 1, candidate));
        }
        return Ok(());
    }

    let _lock = ctx.lock()?;
    let mut buffer = ctx.buffer_or_rendered(date).await?;
    let mut pending: PendingCarryOver = ctx.ws.load_pending(date)?;

    let accepted = if args.all {
        pending.accept_all(&candidates, &mut buffer)
    } else {
        let mut appended = 0;
        for number in &args.accept {
            let candidate = number
                .checked_sub(1)
                .and_then(|i| candidates.get(i))
                .ok_or_else(|| format!("no carry-over candidate #{}", number))?;
            if pending.accept(candidate, &mut buffer) {
                appended += 1;
            }
        }
        appended
    };

    ctx.ws.write_buffer(date, &buffer)?;
    ctx.ws.save_pending(date, &pending)?;
    tracing::info!(%date, accepted, staged = pending.len(), "accepted carry-over");

    let saved = if args.save || ctx.ws.config().save.auto_save_carry_over {
        Some(save_day(ctx, date, &buffer).await?)
    } else {
        None
    };

    if json {
        let staged = ctx.ws.load_pending(date)?.len();
        return print_json(&CarryJson {
            date,
            candidates: candidates_to_json(&candidates),
            accepted,
            staged,
            saved: saved.as_ref().map(|s| save_to_json(date, s)),
        });
    }

    println!("carried {} item(s) into {}", accepted, date);
    match saved {
        Some(outcome) => println!("{}", format_save(date, &outcome)),
        None => println!("run `dl save {}` to create them", date),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Item commands
// ---------------------------------------------------------------------------

async fn cmd_edit(ctx: &Context, id: &str, edit: ItemEdit, json: bool) -> CmdResult {
    let _lock = ctx.lock()?;
    let description = format!("{:?}", edit);
    let editor = ItemEditor::new(&ctx.store, &ctx.cache, ctx.owner());

    let outcome = match editor.edit(id, edit).await {
        Ok(outcome) => outcome,
        Err(ItemError::Store(e)) => {
            log_failed_edit(ctx.ws.dir(), id, &description, &e.to_string());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    relocate_line(ctx, &outcome).await?;

    if json {
        return print_json(&item_to_json(&outcome.record));
    }
    for line in format_item_detail(&outcome.record) {
        println!("{}", line);
    }
    Ok(())
}

/// Keep day buffers consistent when an item leaves or joins a day
async fn relocate_line(ctx: &Context, outcome: &EditOutcome) -> CmdResult {
    let EditOutcome { previous, record } = outcome;
    let was_listed = !previous.is_backlog();
    let is_listed = !record.is_backlog();
    let moved = previous.work_date != record.work_date;

    if was_listed && (!is_listed || moved) {
        drop_line(ctx, previous)?;
    }
    if is_listed && (!was_listed || moved) {
        add_line(ctx, record).await?;
    }
    Ok(())
}

fn drop_line(ctx: &Context, previous: &WorkItemRecord) -> CmdResult {
    let date = previous.work_date;
    if !ctx.ws.buffer_path(date).exists() {
        return Ok(());
    }
    let text = ctx.ws.read_buffer(date)?;
    let plan = reconcile(&parse_lines(&text), std::slice::from_ref(previous));
    if let Some(m) = plan.matches.first() {
        ctx.ws.write_buffer(date, &remove_line(&text, m.line_index))?;
    }
    Ok(())
}

async fn add_line(ctx: &Context, record: &WorkItemRecord) -> CmdResult {
    let date = record.work_date;
    let text = if ctx.ws.buffer_path(date).exists() {
        let text = ctx.ws.read_buffer(date)?;
        append_line(&text, &render_line(record.project_tag(), &record.content))
    } else {
        // the store already lists the record on its new day
        let records = day_records(&ctx.store, &ctx.cache, ctx.owner(), date).await?;
        render_buffer(&records)
    };
    ctx.ws.write_buffer(date, &text)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

async fn cmd_summary(ctx: &Context, args: DateArgs, json: bool) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    let summary = Views::new(&ctx.store, &ctx.cache, ctx.owner())
        .summary(date)
        .await?;
    if json {
        return print_json(&summary);
    }
    println!("{}", format_summary(&summary));
    Ok(())
}

async fn cmd_week(ctx: &Context, args: DateArgs, json: bool) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    let week = Views::new(&ctx.store, &ctx.cache, ctx.owner())
        .weekly(date)
        .await?;
    if json {
        return print_json(&week);
    }
    for line in format_week(&week) {
        println!("{}", line);
    }
    Ok(())
}

async fn cmd_projects(ctx: &Context, json: bool) -> CmdResult {
    let groups = Views::new(&ctx.store, &ctx.cache, ctx.owner())
        .projects()
        .await?;
    if json {
        return print_json(&groups);
    }
    if groups.is_empty() {
        println!("no items yet");
    }
    for group in &groups {
        for line in format_project(group) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn cmd_feedback(ctx: &Context, args: DateArgs, json: bool) -> CmdResult {
    let date = parse_day(args.date.as_deref())?;
    let command = ctx
        .ws
        .config()
        .feedback
        .command
        .as_deref()
        .ok_or(AnalyzerError::NotConfigured)?;
    let analyzer = CommandAnalyzer::new(command);
    let feedback = request_feedback(&ctx.store, &ctx.cache, &analyzer, ctx.owner(), date).await?;

    if json {
        return print_json(&feedback);
    }
    println!("{}", feedback.summary);
    for point in &feedback.points {
        println!("  - {}", point);
    }
    if !feedback.tips.is_empty() {
        println!("tips:");
        for tip in &feedback.tips {
            println!("  - {}", tip);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn cmd_cache(ctx: &Context, args: CacheCmd, json: bool) -> CmdResult {
    let CacheAction::Clear { prefix } = args.action;
    let removed = match prefix {
        Some(prefix) => ctx.cache.invalidate_prefix(&prefix),
        None => invalidate_owner(&ctx.cache, ctx.owner()),
    };
    if json {
        return print_json(&serde_json::json!({ "removed": removed }));
    }
    println!("removed {} cached view(s)", removed);
    Ok(())
}

fn cmd_recovery(ctx: &Context, args: RecoveryArgs, json: bool) -> CmdResult {
    if args.path {
        println!("{}", recovery::recovery_log_path(ctx.ws.dir()).display());
        return Ok(());
    }

    let entries = recovery::read_recovery_entries(ctx.ws.dir(), Some(args.limit.unwrap_or(10)));
    if json {
        let out: Vec<_> = entries.iter().map(recovery_to_json).collect();
        return print_json(&out);
    }
    if entries.is_empty() {
        println!("recovery log is empty");
    }
    for entry in &entries {
        println!(
            "{} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.category,
            entry.description
        );
        for (key, value) in &entry.fields {
            println!("  {}: {}", key, value);
        }
        for line in entry.body.lines() {
            println!("  | {}", line);
        }
    }
    Ok(())
}
