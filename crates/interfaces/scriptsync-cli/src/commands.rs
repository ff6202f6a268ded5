use anyhow::{Context, Result};
use scriptsync_config::{KEY_REPOSITORY_URL, REQUEST_TIMEOUT_SECS};
use scriptsync_engine::{ConfigStore, FileConfigStore, ScriptRepository, SyncStatus};
use scriptsync_infra::HttpTransport;

/// Connection overrides shared by every subcommand. Unset fields fall back
/// to the persisted settings.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    pub repo: Option<String>,
    pub path: Option<String>,
    pub upload_url: Option<String>,
}

async fn open(conn: &Connection) -> Result<ScriptRepository> {
    let config = FileConfigStore::new()?;
    let remote = conn
        .repo
        .clone()
        .or_else(|| config.get(KEY_REPOSITORY_URL))
        .unwrap_or_default();
    let transport = HttpTransport::with_discovered_proxy(REQUEST_TIMEOUT_SECS, &remote)
        .await
        .context("Failed to build HTTP client")?;
    Ok(ScriptRepository::new(
        conn.path.as_deref(),
        conn.repo.as_deref(),
        conn.upload_url.as_deref(),
        Box::new(transport),
        Box::new(config),
    )?)
}

pub async fn cmd_install(conn: Connection, target: String) -> Result<()> {
    let mut repository = open(&conn).await?;
    println!(":: Installing script repository...");
    repository.install(&target).await?;
    println!("   Installed into {}", repository.local_repository());
    Ok(())
}

pub async fn cmd_list(conn: Connection) -> Result<()> {
    let mut repository = open(&conn).await?;
    let listing = repository.list_files()?;

    println!(":: {} tracked paths", listing.len());
    for key in listing {
        let status = repository.file_status(&key)?;
        let auto = if repository.info(&key)?.auto_update {
            "auto"
        } else {
            ""
        };
        println!("   {:<14} {:<4} {}", status.to_string(), auto, key);
    }
    Ok(())
}

pub async fn cmd_info(conn: Connection, path: String) -> Result<()> {
    let mut repository = open(&conn).await?;
    repository.list_files()?;

    let info = repository.info(&path)?;
    println!(":: {}", path);
    println!("   Kind:        {}", if info.directory { "folder" } else { "file" });
    println!("   Status:      {}", repository.file_status(&path)?);
    println!("   Author:      {}", info.author);
    match info.pub_date {
        Some(date) => println!("   Published:   {}", date),
        None => println!("   Published:   -"),
    }
    println!("   Auto-update: {}", if info.auto_update { "on" } else { "off" });
    let description = repository.description(&path)?;
    if !description.is_empty() {
        println!("   {}", description);
    }
    Ok(())
}

pub async fn cmd_download(conn: Connection, path: String) -> Result<()> {
    let mut repository = open(&conn).await?;
    repository.list_files()?;

    println!(":: Downloading {}...", path);
    repository.download(&path).await?;
    println!("   Done ({})", repository.file_status(&path)?);
    Ok(())
}

pub async fn cmd_upload(
    conn: Connection,
    path: String,
    comment: String,
    author: String,
    email: String,
) -> Result<()> {
    let mut repository = open(&conn).await?;
    repository.list_files()?;

    println!(":: Publishing {}...", path);
    repository.upload(&path, &comment, &author, &email).await?;
    println!("   Published ({})", repository.file_status(&path)?);
    Ok(())
}

pub async fn cmd_remove(
    conn: Connection,
    path: String,
    comment: String,
    author: String,
    email: String,
) -> Result<()> {
    let mut repository = open(&conn).await?;
    repository.list_files()?;

    println!(":: Removing {} from the central repository...", path);
    repository.remove(&path, &comment, &author, &email).await?;
    println!("   Removed; the local copy is kept ({})", repository.file_status(&path)?);
    Ok(())
}

pub async fn cmd_check_updates(conn: Connection) -> Result<()> {
    let mut repository = open(&conn).await?;
    println!(":: Checking for updates...");
    let downloaded = repository.check_for_updates().await?;

    if downloaded.is_empty() {
        println!("   Everything with auto-update enabled is current");
    } else {
        println!("   Auto-downloaded {} path(s):", downloaded.len());
        for path in downloaded {
            println!("   {}", path);
        }
    }

    let pending: Vec<&String> = repository
        .repository()
        .iter()
        .filter(|(_, e)| e.status.remote_changed_bit())
        .map(|(k, _)| k)
        .collect();
    if !pending.is_empty() {
        println!("   {} path(s) have central updates (run `download`):", pending.len());
        for path in pending {
            println!("   {}", path);
        }
    }
    Ok(())
}

pub async fn cmd_auto_update(conn: Connection, path: String, enabled: bool) -> Result<()> {
    let mut repository = open(&conn).await?;
    repository.list_files()?;

    let touched = repository.set_auto_update(&path, enabled)?;
    println!(
        ":: Auto-update {} for {} entr{}",
        if enabled { "enabled" } else { "disabled" },
        touched,
        if touched == 1 { "y" } else { "ies" }
    );
    Ok(())
}

pub async fn cmd_probe(conn: Connection, url: Option<String>) -> Result<()> {
    let repository = open(&conn).await?;
    let target = url.unwrap_or_else(|| repository.remote_manifest_url());
    repository.connect(&target).await?;
    println!(":: {} is reachable", target);
    Ok(())
}

pub async fn cmd_status(conn: Connection, path: String) -> Result<()> {
    let mut repository = open(&conn).await?;
    repository.list_files()?;
    let status: SyncStatus = repository.file_status(&path)?;
    println!("{}", status);
    Ok(())
}
