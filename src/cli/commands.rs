use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dl", about = concat!("daylog v", env!("CARGO_PKG_VERSION"), " - write your day, keep every item"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a daylog workspace in the current directory
    Init(InitArgs),
    /// Reconcile a day's text with its stored items
    Save(SaveArgs),
    /// List a day's items
    Show(DateArgs),
    /// Print a day's buffer text
    Buffer(DateArgs),
    /// Review or accept unfinished items from previous days
    Carry(CarryArgs),
    /// Toggle an item's completion
    Toggle(IdArgs),
    /// Set an item's manual progress (items without sub-items only)
    Progress(ProgressArgs),
    /// Set or clear an item's due date
    Due(DueArgs),
    /// Set or clear an item's detail text
    Detail(DetailArgs),
    /// Manage an item's notes
    Note(NoteCmd),
    /// Manage an item's sub-items
    Sub(SubCmd),
    /// Move an item to another day
    Mv(MvArgs),
    /// Park an item in the backlog, or bring it back
    Backlog(BacklogArgs),
    /// Show a day's totals
    Summary(DateArgs),
    /// Show the week containing a day
    Week(DateArgs),
    /// Group all items by project
    Projects,
    /// Manage cached views
    Cache(CacheCmd),
    /// Ask the configured analyzer for feedback on a saved day
    Feedback(DateArgs),
    /// View the recovery log
    Recovery(RecoveryArgs),
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Owner id recorded on every item (default: "me")
    #[arg(long)]
    pub owner: Option<String>,
    /// Rewrite config.toml even if .daylog/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Day commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct DateArgs {
    /// Day as YYYY-MM-DD, "today" or "yesterday" (default: today)
    pub date: Option<String>,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Day as YYYY-MM-DD, "today" or "yesterday" (default: today)
    pub date: Option<String>,
    /// Read the day's text from a file, or "-" for stdin (default: the stored buffer)
    #[arg(long, short = 'f')]
    pub file: Option<String>,
}

#[derive(Args)]
pub struct CarryArgs {
    /// Day to carry items into (default: today)
    pub date: Option<String>,
    /// Accept candidates by number (1-based, as listed)
    #[arg(long, num_args = 1..)]
    pub accept: Vec<usize>,
    /// Accept every candidate
    #[arg(long, conflicts_with = "accept")]
    pub all: bool,
    /// Save the day right after accepting
    #[arg(long)]
    pub save: bool,
}

// ---------------------------------------------------------------------------
// Item commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IdArgs {
    /// Item id
    pub id: String,
}

#[derive(Args)]
pub struct ProgressArgs {
    /// Item id
    pub id: String,
    /// Progress percentage (0-100)
    pub value: u8,
}

#[derive(Args)]
pub struct DueArgs {
    /// Item id
    pub id: String,
    /// Due date as YYYY-MM-DD, or "none" to clear
    pub date: String,
}

#[derive(Args)]
pub struct DetailArgs {
    /// Item id
    pub id: String,
    /// Detail text; omit to clear
    pub text: Option<String>,
}

#[derive(Args)]
pub struct NoteCmd {
    #[command(subcommand)]
    pub action: NoteAction,
}

#[derive(Subcommand)]
pub enum NoteAction {
    /// Add a note
    Add {
        /// Item id
        id: String,
        /// Note text
        text: String,
    },
    /// Replace a note's text
    Edit {
        /// Item id
        id: String,
        /// Note id
        note_id: String,
        /// New text
        text: String,
    },
    /// Remove a note
    Rm {
        /// Item id
        id: String,
        /// Note id
        note_id: String,
    },
}

#[derive(Args)]
pub struct SubCmd {
    #[command(subcommand)]
    pub action: SubAction,
}

#[derive(Subcommand)]
pub enum SubAction {
    /// Add a sub-item
    Add {
        /// Item id
        id: String,
        /// Sub-item text
        text: String,
    },
    /// Replace a sub-item's text
    Edit {
        /// Item id
        id: String,
        /// Sub-item id
        sub_id: String,
        /// New text
        text: String,
    },
    /// Toggle a sub-item's completion
    Toggle {
        /// Item id
        id: String,
        /// Sub-item id
        sub_id: String,
    },
    /// Remove a sub-item
    Rm {
        /// Item id
        id: String,
        /// Sub-item id
        sub_id: String,
    },
}

#[derive(Args)]
pub struct MvArgs {
    /// Item id
    pub id: String,
    /// Target day
    pub date: String,
}

#[derive(Args)]
pub struct BacklogArgs {
    /// Item id
    pub id: String,
    /// Return the item to its day instead of parking it
    #[arg(long)]
    pub restore: bool,
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CacheCmd {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop cached views (all of the owner's, or those under a key prefix)
    Clear {
        /// Only keys starting with this prefix, e.g. "items:me:"
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Args)]
pub struct RecoveryArgs {
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Print the path to the recovery log instead
    #[arg(long)]
    pub path: bool,
}
