//! Point-in-time backups of the stateful directories.
//!
//! Archives are gzip-compressed tarballs named by creation time, kept under
//! the backup directory and rotated down to `max_backups` oldest-first.
//! Restore stops the stack, unpacks over the working directories and starts
//! it again; a partial extraction is not rolled back.

use std::fs::{self, File};
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};
use tracing::{info, warn};

use crate::paths::InstallPaths;
use crate::stack::Stack;
use crate::{Error, Result};

pub struct BackupManager<'a> {
    paths: &'a InstallPaths,
}

impl<'a> BackupManager<'a> {
    pub fn new(paths: &'a InstallPaths) -> Self {
        Self { paths }
    }

    /// Archive the stateful directories into one timestamped tarball and
    /// rotate old archives out. Directories that do not exist yet are
    /// skipped.
    pub fn create(&self) -> Result<PathBuf> {
        let backup_dir = self.paths.backup_dir();
        fs::create_dir_all(&backup_dir)?;

        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut path = backup_dir.join(format!("openrealm-backup-{stamp}.tar.gz"));
        let mut attempt = 1;
        while path.exists() {
            attempt += 1;
            path = backup_dir.join(format!("openrealm-backup-{stamp}-{attempt}.tar.gz"));
        }

        let file = File::create(&path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);

        for (name, dir) in self.paths.stateful_dirs() {
            if !dir.exists() {
                warn!("skipping {} for backup, directory does not exist", dir.display());
                continue;
            }
            builder.append_dir_all(name, &dir)?;
        }

        builder.into_inner()?.finish()?;
        info!("created backup {}", path.display());

        self.rotate()?;
        Ok(path)
    }

    /// Delete oldest archives until at most `max_backups` remain.
    pub fn rotate(&self) -> Result<()> {
        let mut archives = self.archives()?;
        while archives.len() > self.paths.max_backups {
            let (path, _) = archives.remove(0);
            info!("rotating out old backup {}", path.display());
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Archive paths, newest first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut archives = self.archives()?;
        archives.reverse();
        Ok(archives.into_iter().map(|(path, _)| path).collect())
    }

    /// Stop the stack, unpack the named archive over the stateful
    /// directories, start the stack again. A missing archive aborts without
    /// touching anything.
    pub fn restore(&self, name: &str, stack: &Stack) -> Result<()> {
        let path = self.paths.backup_dir().join(name);
        if !path.exists() {
            return Err(Error::BackupNotFound(path));
        }

        info!("stopping stack before restore");
        stack.down()?;

        let file = File::open(&path)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.unpack(&self.paths.base_dir)?;
        info!("restored {name}");

        stack.up()
    }

    /// Archives sorted oldest first by modification time.
    fn archives(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let backup_dir = self.paths.backup_dir();
        let mut archives = Vec::new();
        if !backup_dir.exists() {
            return Ok(archives);
        }
        for entry in fs::read_dir(backup_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_archive = path
                .file_name()
                .map(|name| name.to_string_lossy().ends_with(".tar.gz"))
                .unwrap_or(false);
            if !is_archive {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            archives.push((path, modified));
        }
        archives.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        Ok(archives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;
    use std::thread::sleep;
    use std::time::Duration;

    fn seeded_paths(max_backups: usize) -> (tempfile::TempDir, InstallPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::new(dir.path(), max_backups);
        for (_, stateful) in paths.stateful_dirs() {
            fs::create_dir_all(stateful).unwrap();
        }
        fs::write(paths.config_dir().join("server.cfg"), "listen_tcp=x\n").unwrap();
        fs::write(paths.data_dir().join("world.dat"), b"worldstate").unwrap();
        fs::write(paths.db_dir().join("ibdata1"), b"dbstate").unwrap();
        (dir, paths)
    }

    #[test]
    fn create_produces_one_archive() {
        let (_dir, paths) = seeded_paths(5);
        let manager = BackupManager::new(&paths);

        let archive = manager.create().unwrap();
        assert!(archive.exists());
        assert_eq!(manager.list().unwrap(), vec![archive]);
    }

    #[test]
    fn missing_stateful_dirs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::new(dir.path(), 5);
        fs::create_dir_all(paths.config_dir()).unwrap();
        fs::write(paths.config_dir().join("server.cfg"), "x\n").unwrap();

        let archive = BackupManager::new(&paths).create().unwrap();
        assert!(archive.exists());
    }

    #[test]
    fn rotate_keeps_the_newest_archives() {
        let (_dir, paths) = seeded_paths(5);
        let manager = BackupManager::new(&paths);
        let backup_dir = paths.backup_dir();
        fs::create_dir_all(&backup_dir).unwrap();

        for i in 0..6 {
            fs::write(
                backup_dir.join(format!("openrealm-backup-{i}.tar.gz")),
                b"stub",
            )
            .unwrap();
            sleep(Duration::from_millis(20));
        }

        manager.rotate().unwrap();

        let remaining = manager.list().unwrap();
        assert_eq!(remaining.len(), 5);
        assert!(!backup_dir.join("openrealm-backup-0.tar.gz").exists());
        for i in 1..6 {
            assert!(backup_dir.join(format!("openrealm-backup-{i}.tar.gz")).exists());
        }
    }

    #[test]
    fn create_rotates_past_the_bound() {
        let (_dir, paths) = seeded_paths(2);
        let manager = BackupManager::new(&paths);
        let backup_dir = paths.backup_dir();
        fs::create_dir_all(&backup_dir).unwrap();
        for i in 0..2 {
            fs::write(backup_dir.join(format!("old-{i}.tar.gz")), b"stub").unwrap();
            sleep(Duration::from_millis(20));
        }

        let archive = manager.create().unwrap();

        let remaining = manager.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0], archive);
        assert!(!backup_dir.join("old-0.tar.gz").exists());
    }

    #[test]
    fn restore_round_trips_the_stateful_directories() {
        let (_dir, paths) = seeded_paths(5);
        let manager = BackupManager::new(&paths);
        let archive = manager.create().unwrap();
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();

        // damage the working state
        fs::write(paths.data_dir().join("world.dat"), b"corrupted").unwrap();
        fs::remove_file(paths.db_dir().join("ibdata1")).unwrap();

        let runner = RecordingRunner::new();
        let stack = Stack::new(&runner, &paths);
        manager.restore(&name, &stack).unwrap();

        assert_eq!(
            fs::read(paths.data_dir().join("world.dat")).unwrap(),
            b"worldstate"
        );
        assert_eq!(fs::read(paths.db_dir().join("ibdata1")).unwrap(), b"dbstate");

        // the stack was stopped before extraction and started after
        let calls = runner.calls();
        let down = calls.iter().position(|c| c.contains(" down")).unwrap();
        let up = calls.iter().position(|c| c.contains(" up -d")).unwrap();
        assert!(down < up);
    }

    #[test]
    fn restore_of_missing_archive_changes_nothing() {
        let (_dir, paths) = seeded_paths(5);
        let manager = BackupManager::new(&paths);
        let runner = RecordingRunner::new();
        let stack = Stack::new(&runner, &paths);

        let err = manager.restore("nope.tar.gz", &stack).unwrap_err();
        assert!(matches!(err, Error::BackupNotFound(_)));
        assert!(runner.calls().is_empty());
    }
}
