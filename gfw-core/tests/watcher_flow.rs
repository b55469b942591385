mod support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gfw_core::scan::WatchMessage;
use gfw_core::{
    FileOutcome, RecordQuery, RecordRepository, Supervisor, TenantConfig,
    TenantWatcher,
};
use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use support::{StoreFixture, fast_options, path_key, wait_until};
#[cfg(unix)]
use support::ignores_permissions;

const CONTENT: &[u8] = b"conteudo de teste";

fn tenant(fx: &StoreFixture, name: &str) -> TenantConfig {
    let t = TenantConfig::new(
        name,
        fx.dir.path().join(format!("{name}-watch")),
        fx.dir.path().join(format!("{name}-dest")),
    );
    std::fs::create_dir_all(&t.watch_dir).unwrap();
    std::fs::create_dir_all(&t.dest_dir).unwrap();
    t
}

async fn wait_for_record(
    store: &dyn RecordRepository,
    tenant: &str,
    source: &Path,
    limit: Duration,
) -> bool {
    let key = path_key(source);
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if store.exists(tenant, &key).await.unwrap() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

fn created(path: &Path) -> WatchMessage {
    WatchMessage::Event(
        Event::new(EventKind::Create(CreateKind::File)).add_path(path.to_path_buf()),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_file_is_copied_recorded_and_source_removed() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "test");
    let watcher = TenantWatcher::start(t.clone(), fx.repo(), &fast_options(false)).unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(watcher.run(shutdown.clone()));

    let source = t.watch_dir.join("arquivo.txt");
    let dest = t.dest_dir.join("arquivo.txt");
    std::fs::write(&source, CONTENT).unwrap();

    assert!(
        wait_for_record(fx.store.as_ref(), "test", &source, Duration::from_secs(10)).await,
        "file was never recorded"
    );
    assert_eq!(std::fs::read(&dest).unwrap(), CONTENT);
    assert!(wait_until(Duration::from_secs(2), || !source.exists()).await);

    let records = fx.store.query(&RecordQuery::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_size, Some(CONTENT.len() as i64));
    assert_eq!(records[0].dest_dir.as_deref(), Some(&*t.dest_dir.to_string_lossy()));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("watcher stops after cancellation")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn keep_source_leaves_the_original() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "keeper");
    let watcher = TenantWatcher::start(t.clone(), fx.repo(), &fast_options(true)).unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(watcher.run(shutdown.clone()));

    let source = t.watch_dir.join("arquivo.txt");
    std::fs::write(&source, CONTENT).unwrap();

    assert!(
        wait_for_record(fx.store.as_ref(), "keeper", &source, Duration::from_secs(10)).await
    );
    assert_eq!(std::fs::read(t.dest_dir.join("arquivo.txt")).unwrap(), CONTENT);
    assert_eq!(std::fs::read(&source).unwrap(), CONTENT);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn process_file_walks_the_full_lifecycle() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "acme");
    let (_tx, rx) = mpsc::channel(4);
    let watcher = TenantWatcher::from_channel(t.clone(), fx.repo(), &fast_options(true), rx);
    let cancel = CancellationToken::new();

    let source = t.watch_dir.join("report.csv");
    std::fs::write(&source, b"a,b,c").unwrap();

    let first = watcher.process_file(&source, &cancel).await;
    assert_eq!(
        first,
        FileOutcome::Copied {
            bytes: 5,
            recorded: true,
            source_removed: false,
        }
    );

    let second = watcher.process_file(&source, &cancel).await;
    assert_eq!(second, FileOutcome::AlreadyProcessed);

    let missing = watcher
        .process_file(&t.watch_dir.join("nope.txt"), &cancel)
        .await;
    assert_eq!(missing, FileOutcome::NotAFile);

    std::fs::create_dir(t.watch_dir.join("subdir")).unwrap();
    let dir = watcher.process_file(&t.watch_dir.join("subdir"), &cancel).await;
    assert_eq!(dir, FileOutcome::NotAFile);
}

#[tokio::test]
async fn failed_copy_leaves_no_record_and_keeps_source() {
    let fx = StoreFixture::new().await;
    let mut t = tenant(&fx, "broken");
    // A regular file where the destination directory should be.
    let blocker = fx.dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    t.dest_dir = blocker;

    let (_tx, rx) = mpsc::channel(4);
    let watcher = TenantWatcher::from_channel(t.clone(), fx.repo(), &fast_options(false), rx);
    let source = t.watch_dir.join("arquivo.txt");
    std::fs::write(&source, CONTENT).unwrap();

    let outcome = watcher.process_file(&source, &CancellationToken::new()).await;

    assert_eq!(
        outcome,
        FileOutcome::CopyFailed {
            permission_denied: false
        }
    );
    assert!(source.exists());
    assert!(!fx.store.exists("broken", &path_key(&source)).await.unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn unwritable_destination_is_a_permission_failure_without_record() {
    use std::os::unix::fs::PermissionsExt;

    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "locked");
    std::fs::set_permissions(&t.dest_dir, std::fs::Permissions::from_mode(0o000)).unwrap();
    let restore = || {
        std::fs::set_permissions(&t.dest_dir, std::fs::Permissions::from_mode(0o755)).unwrap()
    };
    if ignores_permissions(&t.dest_dir) {
        restore();
        return;
    }

    let (_tx, rx) = mpsc::channel(4);
    let watcher = TenantWatcher::from_channel(t.clone(), fx.repo(), &fast_options(false), rx);
    let source = t.watch_dir.join("arquivo.txt");
    std::fs::write(&source, CONTENT).unwrap();

    let outcome = watcher.process_file(&source, &CancellationToken::new()).await;
    restore();

    assert_eq!(
        outcome,
        FileOutcome::CopyFailed {
            permission_denied: true
        }
    );
    assert!(source.exists());
    assert!(!t.dest_dir.join("arquivo.txt").exists());
    assert!(!fx.store.exists("locked", &path_key(&source)).await.unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn special_file_in_watch_dir_is_skipped() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "pipes");
    let (_tx, rx) = mpsc::channel(4);
    let watcher = TenantWatcher::from_channel(t.clone(), fx.repo(), &fast_options(false), rx);

    let socket = t.watch_dir.join("drop.sock");
    let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        watcher.process_file(&socket, &CancellationToken::new()),
    )
    .await
    .expect("special files are rejected without blocking");

    assert_eq!(outcome, FileOutcome::NotAFile);
    assert!(!t.dest_dir.join("drop.sock").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_renamed_into_watch_dir_is_ingested() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "test");
    let staging = fx.dir.path().join("staging.txt");
    std::fs::write(&staging, CONTENT).unwrap();

    let watcher = TenantWatcher::start(t.clone(), fx.repo(), &fast_options(false)).unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(watcher.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let source = t.watch_dir.join("arquivo.txt");
    std::fs::rename(&staging, &source).unwrap();

    assert!(
        wait_for_record(fx.store.as_ref(), "test", &source, Duration::from_secs(10)).await,
        "moved-in file was never recorded"
    );
    assert_eq!(std::fs::read(t.dest_dir.join("arquivo.txt")).unwrap(), CONTENT);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("watcher stops after cancellation")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rename_within_watch_dir_ingests_the_new_name() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "upload");
    let watcher = TenantWatcher::start(t.clone(), fx.repo(), &fast_options(true)).unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(watcher.run(shutdown.clone()));

    let partial = t.watch_dir.join("report.part");
    std::fs::write(&partial, CONTENT).unwrap();
    let finished = t.watch_dir.join("report.csv");
    std::fs::rename(&partial, &finished).unwrap();

    assert!(
        wait_for_record(fx.store.as_ref(), "upload", &finished, Duration::from_secs(10)).await,
        "renamed file was never recorded"
    );
    assert_eq!(std::fs::read(t.dest_dir.join("report.csv")).unwrap(), CONTENT);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn cancellation_during_stabilization_is_reported() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "slow");
    let (_tx, rx) = mpsc::channel(4);
    let watcher = TenantWatcher::from_channel(t.clone(), fx.repo(), &fast_options(false), rx);
    let source = t.watch_dir.join("big.iso");
    std::fs::write(&source, b"partial").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = watcher.process_file(&source, &cancel).await;

    assert_eq!(outcome, FileOutcome::Cancelled);
    assert!(source.exists());
    assert!(!t.dest_dir.join("big.iso").exists());
}

#[tokio::test]
async fn channel_events_are_handled_in_order_and_errors_do_not_stop_the_loop() {
    let fx = StoreFixture::new().await;
    let t = tenant(&fx, "chan");
    let (tx, rx) = mpsc::channel(8);
    let watcher = TenantWatcher::from_channel(t.clone(), fx.repo(), &fast_options(false), rx);

    std::fs::write(t.watch_dir.join("one.txt"), b"1").unwrap();
    std::fs::write(t.watch_dir.join("two.txt"), b"22").unwrap();
    std::fs::write(t.watch_dir.join("ignored.txt"), b"333").unwrap();

    tx.send(WatchMessage::Error("inotify queue overflow".into())).await.unwrap();
    tx.send(created(&t.watch_dir.join("one.txt"))).await.unwrap();
    tx.send(WatchMessage::Event(
        Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(t.watch_dir.join("ignored.txt")),
    ))
    .await
    .unwrap();
    // Only the file name of the event path matters.
    tx.send(created(Path::new("/elsewhere/two.txt"))).await.unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), watcher.run(CancellationToken::new()))
        .await
        .expect("loop exits once the channel closes");

    assert!(t.dest_dir.join("one.txt").exists());
    assert!(t.dest_dir.join("two.txt").exists());
    assert!(!t.dest_dir.join("ignored.txt").exists());
    assert!(t.watch_dir.join("ignored.txt").exists());

    let records = fx.store.query(&RecordQuery::default()).await.unwrap();
    let sources: Vec<&str> = records.iter().map(|r| r.source_path.as_str()).collect();
    assert_eq!(sources.len(), 2);
    assert!(sources.contains(&&*path_key(&t.watch_dir.join("two.txt"))));
}

#[tokio::test]
async fn watcher_cannot_start_on_missing_directory() {
    let fx = StoreFixture::new().await;
    let t = TenantConfig::new(
        "ghost",
        fx.dir.path().join("missing"),
        fx.dir.path().join("dest"),
    );

    let err = TenantWatcher::start(t, fx.repo(), &fast_options(false)).unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn supervisor_reconciles_watches_and_shuts_down() {
    let fx = StoreFixture::new().await;
    let a = tenant(&fx, "alpha");
    let b = tenant(&fx, "beta");
    std::fs::write(a.watch_dir.join("before.txt"), b"old").unwrap();

    let supervisor = Arc::new(Supervisor::new(
        fx.repo(),
        vec![a.clone(), b.clone()],
        fast_options(false),
    ));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    // Startup reconciliation copies the pre-existing file.
    assert!(
        wait_for_record(
            fx.store.as_ref(),
            "alpha",
            &a.watch_dir.join("before.txt"),
            Duration::from_secs(5)
        )
        .await
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    let fresh = b.watch_dir.join("arquivo.txt");
    std::fs::write(&fresh, CONTENT).unwrap();
    assert!(wait_for_record(fx.store.as_ref(), "beta", &fresh, Duration::from_secs(10)).await);
    assert_eq!(std::fs::read(b.dest_dir.join("arquivo.txt")).unwrap(), CONTENT);
    assert!(!fx.store.exists("alpha", &path_key(&fresh)).await.unwrap());

    supervisor.shutdown();
    tokio::time::timeout(Duration::from_secs(3), runner)
        .await
        .expect("supervisor returns after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn supervisor_startup_fails_when_a_watch_dir_is_missing() {
    let fx = StoreFixture::new().await;
    let good = tenant(&fx, "good");
    let bad = TenantConfig::new("bad", fx.dir.path().join("nowhere"), fx.dir.path().join("d"));

    let supervisor = Supervisor::new(fx.repo(), vec![good, bad], fast_options(false));
    let result = tokio::time::timeout(Duration::from_secs(3), supervisor.run())
        .await
        .expect("startup failure is immediate");

    assert!(result.is_err());
}
