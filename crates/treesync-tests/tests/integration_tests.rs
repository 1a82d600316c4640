//! Integration tests for treesync
//!
//! These tests run whole synchronization sessions against real temporary folders.

use rstest::rstest;
use std::path::Path;
use std::sync::Arc;
use treesync_config::ConfigBuilder;
use treesync_sync::{
    exclude_extensions, PropertiesFileStore, StatisticsKeys, Synchronizer, SyncStatistics,
};
use treesync_tests::test_utils::{make_dir, names_in, remove, set_mtime, write_file, SyncFixture};
use treesync_types::{Error, SyncPolicy};

const HOUR_SECS: i64 = 3600;
const BASE_TIME: i64 = 1_700_000_000;

#[tokio::test]
async fn test_folders_created_only_with_content() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "with_content/file.txt", b"");
    make_dir(&fx.source, "without_content");

    let mut session = fx.session();
    session.set_create_dirs_only_with_content(true);
    session.sync().await.unwrap();

    assert!(fx.destination.join("with_content").is_dir());
    assert!(fx.destination.join("with_content/file.txt").is_file());
    assert!(!fx.destination.join("without_content").exists());

    session.set_create_dirs_only_with_content(false);
    session.sync().await.unwrap();

    assert!(fx.destination.join("with_content").is_dir());
    assert!(fx.destination.join("without_content").is_dir());
}

#[tokio::test]
async fn test_custom_filter_and_synchronized_list() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "only_source_1.txt", b"");
    write_file(&fx.source, "only_source_2.txt", b"");
    write_file(&fx.source, "wrong_extension.dat", b"");
    write_file(&fx.destination, "only_destination.txt", b"");
    write_file(&fx.source, "already_synced.txt", b"");
    write_file(&fx.destination, "already_synced.txt", b"");

    let mut session = fx.session();
    session
        .set_custom_filter(Arc::new(|path: &Path| {
            path.extension().is_some_and(|ext| ext == "txt")
        }))
        .set_track_synchronized_files(true);
    let report = session.sync().await.unwrap();

    assert!(fx.destination.join("only_source_1.txt").is_file());
    assert!(fx.destination.join("only_source_2.txt").is_file());
    assert!(!fx.destination.join("wrong_extension.dat").exists());
    // Stale entries survive unless deletion is enabled
    assert!(fx.destination.join("only_destination.txt").is_file());
    assert!(fx.destination.join("already_synced.txt").is_file());

    let mut synced: Vec<String> = session
        .synchronized_files()
        .await
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    synced.sort();
    assert_eq!(
        synced,
        vec!["already_synced.txt", "only_source_1.txt", "only_source_2.txt"]
    );
    assert_eq!(report.counters.source_files, 3);
}

#[tokio::test]
async fn test_file_and_folder_swap_places() {
    let fx = SyncFixture::new();
    let source_file = write_file(&fx.source, "entry1", b"");
    let source_dir = make_dir(&fx.source, "entry2");

    let mut session = fx.session();
    session.set_preserve_old_versions(true);
    session.sync().await.unwrap();

    let dest_first = fx.destination.join("entry1");
    let dest_second = fx.destination.join("entry2");
    assert!(dest_first.is_file());
    assert!(dest_second.is_dir());

    remove(&source_file);
    remove(&source_dir);
    make_dir(&fx.source, "entry1");
    write_file(&fx.source, "entry2", b"");

    let report = session.sync().await.unwrap();
    assert!(dest_first.is_dir());
    assert!(dest_second.is_file());
    assert_eq!(report.counters.entries_renamed, 2);

    remove(&fx.source.join("entry1"));
    remove(&fx.source.join("entry2"));
    write_file(&fx.source, "entry1", b"");
    make_dir(&fx.source, "entry2");

    let report = session.sync().await.unwrap();
    assert!(dest_first.is_file());
    assert!(dest_second.is_dir());
    assert!(report.is_clean());

    // Same session, same suffix: one archived version per entry
    let suffix = session.backup_suffix().to_string();
    assert_eq!(
        names_in(&fx.destination),
        vec![
            "entry1".to_string(),
            format!("entry1{suffix}"),
            "entry2".to_string(),
            format!("entry2{suffix}"),
        ]
    );
}

#[tokio::test]
async fn test_second_run_copies_nothing() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "a.txt", b"alpha");
    write_file(&fx.source, "docs/b.txt", b"bravo");
    write_file(&fx.source, "docs/deep/c.bin", &[1u8; 25_000]);

    let mut session = fx.session();
    session.set_policy(SyncPolicy::mirror());

    let first = session.sync().await.unwrap();
    assert_eq!(first.counters.files_copied, 3);
    assert_eq!(first.counters.bytes_copied, 25_010);

    let second = session.sync().await.unwrap();
    assert!(second.counters.is_noop());
    assert_eq!(second.counters.files_in_sync, 3);
    assert_eq!(second.counters.folders_visited, 3);
    assert_eq!(session.total_source_bytes(), 25_010);
}

#[tokio::test]
async fn test_mirror_never_touches_earlier_backups() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "kept.txt", b"k");
    write_file(&fx.destination, "kept.txt", b"k");
    write_file(&fx.destination, "gone.txt", b"g");
    write_file(&fx.destination, "gone.txt.bk202001011200", b"older");
    write_file(&fx.destination, "old_dir/inner.txt", b"i");

    let mut session = fx.session();
    session.set_policy(SyncPolicy::mirror());
    let report = session.sync().await.unwrap();

    assert_eq!(
        names_in(&fx.destination),
        vec!["gone.txt.bk202001011200", "kept.txt"]
    );
    assert_eq!(report.counters.entries_deleted, 3);
}

#[tokio::test]
async fn test_versioned_backup_keeps_overwritten_and_removed() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "doc.txt", b"second draft");
    write_file(&fx.destination, "doc.txt", b"first");
    write_file(&fx.destination, "removed.txt", b"r");

    let mut session = fx.session();
    session.set_policy(SyncPolicy::versioned_backup());
    let report = session.sync().await.unwrap();

    let suffix = session.backup_suffix().to_string();
    assert_eq!(
        std::fs::read(fx.destination.join("doc.txt")).unwrap(),
        b"second draft"
    );
    assert_eq!(
        std::fs::read(fx.destination.join(format!("doc.txt{suffix}"))).unwrap(),
        b"first"
    );
    assert_eq!(
        std::fs::read(fx.destination.join(format!("removed.txt{suffix}"))).unwrap(),
        b"r"
    );
    assert!(!fx.destination.join("removed.txt").exists());
    assert_eq!(report.counters.entries_renamed, 2);
    assert_eq!(report.counters.entries_deleted, 0);
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "new/file.txt", b"n");
    write_file(&fx.source, "changed.txt", b"changed");
    write_file(&fx.destination, "changed.txt", b"old");
    write_file(&fx.destination, "stale.txt", b"s");
    let before = names_in(&fx.destination);

    let mut session = fx.session();
    session.set_policy(SyncPolicy::versioned_backup().simulated());
    let report = session.sync().await.unwrap();

    assert!(report.simulated);
    assert_eq!(names_in(&fx.destination), before);
    assert_eq!(
        std::fs::read(fx.destination.join("changed.txt")).unwrap(),
        b"old"
    );
    assert_eq!(report.counters.files_copied, 2);
    assert!(fx.store.snapshot().await.is_empty());
}

#[rstest]
#[case::whole_hours(3 * HOUR_SECS * 1000, 0, false)]
#[case::ten_hours(10 * HOUR_SECS * 1000, 0, false)]
#[case::eleven_hours(11 * HOUR_SECS * 1000, 0, true)]
#[case::five_minutes(5 * 60 * 1000, 0, true)]
#[case::few_millis(5, 0, true)]
#[case::few_millis_tolerated(5, 10, false)]
#[case::hours_plus_millis(6 * HOUR_SECS * 1000 + 55, 0, true)]
#[case::hours_plus_millis_above_tolerance(6 * HOUR_SECS * 1000 + 55, 100, true)]
#[case::millis_within_tolerance(55, 100, false)]
#[tokio::test]
async fn test_date_skew_decision(
    #[case] skew_millis: i64,
    #[case] tolerance_millis: u64,
    #[case] expect_copy: bool,
) {
    let fx = SyncFixture::new();
    let source = write_file(&fx.source, "photo.jpg", b"SAME");
    let destination = write_file(&fx.destination, "photo.jpg", b"same");
    set_mtime(&source, BASE_TIME, 0);
    let shifted = BASE_TIME * 1000 + skew_millis;
    set_mtime(&destination, shifted / 1000, (shifted % 1000) as u32);

    let mut session = fx.session();
    session.set_date_tolerance_millis(tolerance_millis);
    let report = session.sync().await.unwrap();

    let expected: &[u8] = if expect_copy { b"SAME" } else { b"same" };
    assert_eq!(std::fs::read(&destination).unwrap(), expected);
    assert_eq!(report.counters.files_copied, u64::from(expect_copy));
}

#[tokio::test]
async fn test_size_check_can_be_disabled() {
    let fx = SyncFixture::new();
    let source = write_file(&fx.source, "log.txt", b"longer content");
    let destination = write_file(&fx.destination, "log.txt", b"short");
    set_mtime(&source, BASE_TIME, 0);
    set_mtime(&destination, BASE_TIME, 0);

    let mut session = fx.session();
    session.set_copy_if_sizes_differ(false);
    let report = session.sync().await.unwrap();
    assert_eq!(report.counters.files_copied, 0);

    session.set_copy_if_sizes_differ(true);
    let report = session.sync().await.unwrap();
    assert_eq!(report.counters.files_copied, 1);
    assert_eq!(
        std::fs::read(&destination).unwrap(),
        b"longer content"
    );
}

#[tokio::test]
async fn test_statistics_feed_next_run() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "a/one.txt", b"1");
    write_file(&fx.source, "b/two.txt", b"2");

    let session = fx.session();
    assert_eq!(
        session.previous_run_summary().await,
        "Last run: (unknown duration)"
    );
    session.sync().await.unwrap();

    let keys = StatisticsKeys::new(&fx.source, &fx.destination);
    let saved = fx.store.snapshot().await;
    assert_eq!(saved.get(&keys.folders).map(String::as_str), Some("3"));
    assert!(saved.contains_key(&keys.elapsed));
    assert_eq!(session.previous_statistics().await.folders, 3);
    assert!(session.previous_run_summary().await.starts_with("Last run: "));
}

#[tokio::test]
async fn test_statistics_written_to_properties_file() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "a.txt", b"a");
    let stats_file = fx.root().join("tmp/stats.properties");

    let mut session = fx.session();
    session.set_statistics_store(Some(Arc::new(PropertiesFileStore::new(&stats_file))));
    session.sync().await.unwrap();

    let content = std::fs::read_to_string(&stats_file).unwrap();
    assert!(content.starts_with('#'));
    assert!(content.contains("total_pastas_copiadas_"));
    assert!(content.contains("tempo_ultima_execucao_"));

    let store = PropertiesFileStore::new(&stats_file);
    let keys = StatisticsKeys::new(&fx.source, &fx.destination);
    let loaded = SyncStatistics::load(&store, &keys).await.unwrap();
    assert_eq!(loaded.folders, 1);
}

#[tokio::test]
async fn test_backup_names_in_source_are_ignored() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "a.txt", b"a");
    write_file(&fx.source, "a.txt.bk202312312359", b"old a");
    write_file(&fx.source, ".DS_Store", b"finder");
    make_dir(&fx.source, "iPod Photo Cache");

    let session = fx.session();
    let report = session.sync().await.unwrap();

    assert_eq!(names_in(&fx.destination), vec!["a.txt"]);
    assert_eq!(report.counters.source_files, 1);
}

#[tokio::test]
async fn test_extension_filter_spares_filtered_stale_entries() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "keep.txt", b"k");
    write_file(&fx.destination, "cache.tmp", b"c");
    write_file(&fx.destination, "stale.txt", b"s");

    let mut session = fx.session();
    session
        .set_delete_stale(true)
        .set_custom_filter(exclude_extensions(["tmp"]));
    session.sync().await.unwrap();

    assert_eq!(names_in(&fx.destination), vec!["cache.tmp", "keep.txt"]);
}

#[tokio::test]
async fn test_policy_from_configuration() {
    let fx = SyncFixture::new();
    write_file(&fx.source, "a.txt", b"a");
    write_file(&fx.destination, "z.txt", b"z");

    let config_file = fx.root().join("treesync.yaml");
    std::fs::write(
        &config_file,
        "policy:\n  delete_stale: true\n  preserve_old_versions: true\nprogress:\n  interval_secs: 1\n",
    )
    .unwrap();
    let config = ConfigBuilder::new()
        .add_defaults()
        .add_source_file(&config_file)
        .build()
        .unwrap();

    let mut session = fx.session();
    session
        .set_policy(config.policy.to_sync_policy())
        .set_progress_interval(config.progress.interval());
    session.sync().await.unwrap();

    let suffix = session.backup_suffix().to_string();
    assert_eq!(
        names_in(&fx.destination),
        vec!["a.txt".to_string(), format!("z.txt{suffix}")]
    );
}

#[tokio::test]
async fn test_concurrent_runs_are_rejected() {
    let fx = SyncFixture::new();
    for index in 0..20 {
        write_file(&fx.source, &format!("dir{index}/file.txt"), b"data");
    }

    let session = fx.session();
    let (first, second) = tokio::join!(session.sync(), session.sync());

    let rejected = [&first, &second]
        .iter()
        .filter(|outcome| matches!(outcome, Err(Error::AlreadyRunning)))
        .count();
    assert_eq!(rejected, 1);
    assert!(first.is_ok() || second.is_ok());

    // The flag is released afterwards
    assert!(session.sync_safe().await);
}

#[test]
fn test_construction_rejects_bad_roots() {
    let fx = SyncFixture::new();

    let error = Synchronizer::new(fx.root().join("nope"), &fx.destination).unwrap_err();
    assert!(matches!(error, Error::SourceMissing { .. }));

    let error = Synchronizer::new(&fx.source, &fx.destination).unwrap_err();
    assert!(matches!(error, Error::SourceUnreadable { .. }));

    write_file(&fx.source, "a.txt", b"a");
    let error = Synchronizer::new(&fx.source, fx.root().join("nope")).unwrap_err();
    assert!(matches!(error, Error::DestinationMissing { .. }));
    assert!(error.is_fatal());
}
