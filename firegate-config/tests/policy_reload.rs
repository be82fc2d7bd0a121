//! External edits to the policy file must reach a running store.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use firegate_config::{loader, IsolationLevel, PolicyKey, PolicyStore, PolicyWatcher};

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}

#[test]
fn external_rewrite_is_folded_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(loader::CONFIG_FILE_NAME);
    fs::write(&path, "enabled = true\nsandbox_level = 0\n").unwrap();

    let store = Arc::new(PolicyStore::new(loader::load_or_default(&path)));
    let _watcher = PolicyWatcher::spawn(Arc::clone(&store), path.clone()).unwrap();

    let notified = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&notified);
    store.subscribe(PolicyKey::DefaultLevel, move |_| {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    // The preferences editor rewrites the file out-of-process.
    fs::write(&path, "enabled = true\nsandbox_level = 2\n").unwrap();

    assert!(
        wait_until(Duration::from_secs(10), || store.default_level()
            == IsolationLevel::Paranoid),
        "store never picked up the external edit"
    );
    assert!(notified.load(std::sync::atomic::Ordering::SeqCst));
}
