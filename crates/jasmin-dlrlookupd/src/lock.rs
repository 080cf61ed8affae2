//! Single-instance guard (§2.1 supplement). Mirrors the original daemon's
//! `FileLock("/tmp/dlrlookupd-<id>")` — "must not be executed simultaneously"
//! (upstream issue #265) — with a plain exclusive-create instead of an
//! flock: it only stops a second `jasmin-dlrlookupd` started with the same
//! `--id`, not a lock file left behind by a killed process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> io::Result<Self> {
        fs::OpenOptions::new().write(true).create_new(true).open(path).map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("another instance is already running (lock file {})", path.display()),
                )
            } else {
                err
            }
        })?;
        Ok(Self { path: path.to_path_buf() })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dlrlookupd-master");

        let first = InstanceLock::acquire(&path).unwrap();
        let second = InstanceLock::acquire(&path);
        assert!(second.is_err());

        drop(first);
        assert!(InstanceLock::acquire(&path).is_ok());
    }
}
