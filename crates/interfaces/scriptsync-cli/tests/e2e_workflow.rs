use axum::routing::get;
use axum::Router;
use scriptsync_cli::commands::{self, Connection};
use std::net::SocketAddr;
use tempfile::tempdir;

async fn start_mock_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let manifest = r#"{
        "muon": {"directory": true, "pub_date": "", "description": "", "author": ""},
        "muon/a.py": {
            "directory": false,
            "pub_date": "2024-Jan-01 00:00:00",
            "description": "a script",
            "author": "someone"
        }
    }"#;
    let app = Router::new().route("/repository.json", get(move || async move { manifest }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

/// Seed an installed-looking local repository without going through the
/// install command (which persists the chosen path into user settings).
fn seed_local(root: &std::path::Path, manifest: &str) {
    std::fs::create_dir_all(root).unwrap();
    std::fs::write(root.join(".repository.json"), manifest).unwrap();
    std::fs::write(root.join(".local.json"), "{}").unwrap();
}

fn conn(addr: SocketAddr, root: &std::path::Path) -> Connection {
    Connection {
        repo: Some(format!("http://{addr}/")),
        path: Some(root.to_str().unwrap().to_string()),
        upload_url: Some(format!("http://{addr}/publish")),
    }
}

#[tokio::test]
async fn list_info_and_status_run_against_a_seeded_repository() {
    let (addr, handle) = start_mock_server().await;
    let dir = tempdir().unwrap();
    let root = dir.path().join("repo");
    seed_local(
        &root,
        r#"{"muon/a.py": {"directory": false, "pub_date": "2024-Jan-01 00:00:00",
                          "description": "a script", "author": "someone"}}"#,
    );

    commands::cmd_list(conn(addr, &root)).await.unwrap();
    commands::cmd_info(conn(addr, &root), "muon/a.py".into())
        .await
        .unwrap();
    commands::cmd_status(conn(addr, &root), "muon/a.py".into())
        .await
        .unwrap();
    handle.abort();
}

#[tokio::test]
async fn probe_reaches_the_manifest_endpoint() {
    let (addr, handle) = start_mock_server().await;
    let dir = tempdir().unwrap();
    let root = dir.path().join("repo");
    seed_local(&root, "{}");

    // Default target is the manifest URL; an explicit URL also works.
    commands::cmd_probe(conn(addr, &root), None).await.unwrap();
    commands::cmd_probe(conn(addr, &root), Some(format!("http://{addr}/repository.json")))
        .await
        .unwrap();
    handle.abort();
}

#[tokio::test]
async fn commands_fail_cleanly_without_an_installed_repository() {
    let (addr, handle) = start_mock_server().await;
    let dir = tempdir().unwrap();
    let root = dir.path().join("never-installed");

    assert!(commands::cmd_list(conn(addr, &root)).await.is_err());
    assert!(commands::cmd_status(conn(addr, &root), "muon/a.py".into())
        .await
        .is_err());
    handle.abort();
}
