// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

use super::*;

#[test]
fn paths_hang_off_the_state_dir() {
    let config = Config::at("/tmp/wharf-test");
    assert_eq!(config.images_dir, PathBuf::from("/tmp/wharf-test/images"));
    assert_eq!(config.logs_dir, PathBuf::from("/tmp/wharf-test/logs"));
    assert_eq!(config.lock_path, PathBuf::from("/tmp/wharf-test/daemon.pid"));
}

#[test]
fn ensure_dirs_creates_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::at(dir.path().join("state"));
    config.ensure_dirs().unwrap();
    assert!(config.images_dir.is_dir());
    assert!(config.logs_dir.is_dir());
}
