use scriptsync_core::status::{apply_statuses, file_status};
use scriptsync_core::timestamp::parse_timestamp;
use scriptsync_core::{RepoEntry, Repository, SyncStatus};

fn entry(path: &str, directory: bool) -> RepoEntry {
    RepoEntry {
        path: path.to_string(),
        directory,
        ..Default::default()
    }
}

fn synced_file(path: &str) -> RepoEntry {
    let ts = parse_timestamp("2024-Jan-01 00:00:00");
    RepoEntry {
        local: true,
        remote: true,
        pub_date: ts,
        downloaded_pubdate: ts,
        downloaded_date: ts,
        current_date: ts,
        ..entry(path, false)
    }
}

#[test]
fn every_date_combination_yields_exactly_one_status() {
    let t1 = parse_timestamp("2024-Jan-01 00:00:00");
    let t2 = parse_timestamp("2024-Feb-01 00:00:00");

    for local in [false, true] {
        for remote in [false, true] {
            for current in [t1, t2] {
                for pub_date in [t1, t2] {
                    let e = RepoEntry {
                        local,
                        remote,
                        current_date: current,
                        downloaded_date: t1,
                        pub_date,
                        downloaded_pubdate: t1,
                        ..entry("a.py", false)
                    };
                    // file_status is total: any combination maps into the lattice.
                    let status = file_status(&e);
                    assert_eq!(status, file_status(&e), "derivation must be pure");
                }
            }
        }
    }
}

#[test]
fn file_statuses_follow_the_two_divergence_bits() {
    let t1 = parse_timestamp("2024-Jan-01 00:00:00");
    let t2 = parse_timestamp("2024-Feb-01 00:00:00");

    let mut e = synced_file("a.py");
    assert_eq!(file_status(&e), SyncStatus::BothUnchanged);

    e.current_date = t2;
    assert_eq!(file_status(&e), SyncStatus::LocalChanged);

    e.current_date = t1;
    e.pub_date = t2;
    assert_eq!(file_status(&e), SyncStatus::RemoteChanged);

    e.current_date = t2;
    assert_eq!(file_status(&e), SyncStatus::BothChanged);
}

#[test]
fn combine_collapses_same_side_and_mixes_to_both_changed() {
    use SyncStatus::*;
    assert_eq!(LocalOnly.combine(LocalChanged), LocalChanged);
    assert_eq!(RemoteOnly.combine(RemoteChanged), RemoteChanged);
    assert_eq!(LocalOnly.combine(LocalOnly), LocalOnly);
    assert_eq!(BothUnchanged.combine(RemoteOnly), RemoteOnly);
    assert_eq!(LocalChanged.combine(RemoteChanged), BothChanged);
    assert_eq!(LocalOnly.combine(RemoteOnly), BothChanged);
    assert_eq!(BothChanged.combine(BothUnchanged), BothChanged);
}

#[test]
fn directory_mixing_local_and_remote_children_is_both_changed() {
    let t1 = parse_timestamp("2024-Jan-01 00:00:00");
    let t2 = parse_timestamp("2024-Feb-01 00:00:00");

    let mut repo = Repository::new();
    let mut dir = entry("muon", true);
    dir.local = true;
    dir.remote = true;
    repo.insert("muon".into(), dir);

    let mut local_child = synced_file("muon/a.py");
    local_child.current_date = t2;
    repo.insert("muon/a.py".into(), local_child);

    let mut remote_child = synced_file("muon/b.py");
    remote_child.pub_date = t2;
    remote_child.downloaded_pubdate = t1;
    repo.insert("muon/b.py".into(), remote_child);

    apply_statuses(&mut repo);
    assert_eq!(repo["muon/a.py"].status, SyncStatus::LocalChanged);
    assert_eq!(repo["muon/b.py"].status, SyncStatus::RemoteChanged);
    assert_eq!(repo["muon"].status, SyncStatus::BothChanged);
}

#[test]
fn directory_with_unchanged_children_is_unchanged() {
    let mut repo = Repository::new();
    let mut dir = entry("muon", true);
    dir.local = true;
    dir.remote = true;
    repo.insert("muon".into(), dir);
    repo.insert("muon/a.py".into(), synced_file("muon/a.py"));
    repo.insert("muon/b.py".into(), synced_file("muon/b.py"));

    apply_statuses(&mut repo);
    assert_eq!(repo["muon"].status, SyncStatus::BothUnchanged);
}

#[test]
fn directory_absent_remotely_is_forced_local_only() {
    let mut repo = Repository::new();
    let mut dir = entry("drafts", true);
    dir.local = true;
    dir.remote = false;
    repo.insert("drafts".into(), dir);
    repo.insert("drafts/wip.py".into(), synced_file("drafts/wip.py"));

    apply_statuses(&mut repo);
    assert_eq!(repo["drafts"].status, SyncStatus::LocalOnly);
}

#[test]
fn aggregation_skips_missing_intermediate_directories() {
    let t2 = parse_timestamp("2024-Feb-01 00:00:00");

    // Manifest lists a/b/c.py but no explicit a/b row; the change must still
    // surface on the nearest tracked ancestor.
    let mut repo = Repository::new();
    let mut top = entry("a", true);
    top.local = true;
    top.remote = true;
    repo.insert("a".into(), top);

    let mut deep = synced_file("a/b/c.py");
    deep.pub_date = t2;
    repo.insert("a/b/c.py".into(), deep);

    apply_statuses(&mut repo);
    assert_eq!(repo["a"].status, SyncStatus::RemoteChanged);
}

#[test]
fn deep_tree_aggregates_post_order() {
    let t2 = parse_timestamp("2024-Feb-01 00:00:00");

    let mut repo = Repository::new();
    for dir in ["a", "a/b"] {
        let mut e = entry(dir, true);
        e.local = true;
        e.remote = true;
        repo.insert(dir.into(), e);
    }
    let mut leaf = synced_file("a/b/leaf.py");
    leaf.current_date = t2;
    repo.insert("a/b/leaf.py".into(), leaf);
    repo.insert("a/ok.py".into(), synced_file("a/ok.py"));

    apply_statuses(&mut repo);
    assert_eq!(repo["a/b"].status, SyncStatus::LocalChanged);
    assert_eq!(repo["a"].status, SyncStatus::LocalChanged);
}
