use clap::{Args, Parser, Subcommand};
use scriptsync_cli::{commands, CliToggle};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// Base URL of the central script repository
    #[arg(long)]
    repo: Option<String>,
    /// Local repository directory
    #[arg(long)]
    path: Option<String>,
    /// Publish endpoint URL
    #[arg(long)]
    upload_url: Option<String>,
}

impl From<Connection> for commands::Connection {
    fn from(c: Connection) -> Self {
        Self {
            repo: c.repo,
            path: c.path,
            upload_url: c.upload_url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Install the script repository into a local directory
    Install {
        target: String,
        #[command(flatten)]
        conn: Connection,
    },
    /// List every tracked path with its sync status
    List {
        #[command(flatten)]
        conn: Connection,
    },
    /// Show metadata for one tracked path
    Info {
        path: String,
        #[command(flatten)]
        conn: Connection,
    },
    /// Print the sync status of one tracked path
    Status {
        path: String,
        #[command(flatten)]
        conn: Connection,
    },
    /// Download a file or folder from the central repository
    Download {
        path: String,
        #[command(flatten)]
        conn: Connection,
    },
    /// Publish a local file to the central repository
    Upload {
        path: String,
        #[arg(long)]
        comment: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        email: String,
        #[command(flatten)]
        conn: Connection,
    },
    /// Delete a file from the central repository (the local copy is kept)
    Remove {
        path: String,
        #[arg(long)]
        comment: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        email: String,
        #[command(flatten)]
        conn: Connection,
    },
    /// Refresh the central manifest and auto-download opted-in entries
    #[command(name = "check-updates", alias = "check")]
    CheckUpdates {
        #[command(flatten)]
        conn: Connection,
    },
    /// Opt a path (and its descendants) in or out of auto-update
    #[command(name = "auto-update")]
    AutoUpdate {
        path: String,
        #[arg(value_enum)]
        state: CliToggle,
        #[command(flatten)]
        conn: Connection,
    },
    /// Probe connectivity to the repository (or an explicit URL)
    Probe {
        url: Option<String>,
        #[command(flatten)]
        conn: Connection,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    match cli.command {
        Commands::Install { target, conn } => commands::cmd_install(conn.into(), target).await?,
        Commands::List { conn } => commands::cmd_list(conn.into()).await?,
        Commands::Info { path, conn } => commands::cmd_info(conn.into(), path).await?,
        Commands::Status { path, conn } => commands::cmd_status(conn.into(), path).await?,
        Commands::Download { path, conn } => commands::cmd_download(conn.into(), path).await?,
        Commands::Upload {
            path,
            comment,
            author,
            email,
            conn,
        } => commands::cmd_upload(conn.into(), path, comment, author, email).await?,
        Commands::Remove {
            path,
            comment,
            author,
            email,
            conn,
        } => commands::cmd_remove(conn.into(), path, comment, author, email).await?,
        Commands::CheckUpdates { conn } => commands::cmd_check_updates(conn.into()).await?,
        Commands::AutoUpdate { path, state, conn } => {
            commands::cmd_auto_update(conn.into(), path, state.enabled()).await?
        }
        Commands::Probe { url, conn } => commands::cmd_probe(conn.into(), url).await?,
    }

    Ok(())
}
