use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_DIR: &str = "/opt/openrealm";
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Filesystem layout of one installation plus its limits.
///
/// Constructed once in `main` and passed to every component so nothing
/// reaches for process-wide paths.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    pub base_dir: PathBuf,
    pub max_backups: usize,
}

impl InstallPaths {
    pub fn new(base_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_backups,
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn db_dir(&self) -> PathBuf {
        self.base_dir.join("db")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    pub fn env_file(&self) -> PathBuf {
        self.base_dir.join("realm.env")
    }

    pub fn compose_file(&self) -> PathBuf {
        self.base_dir.join("docker-compose.yml")
    }

    pub fn server_cfg(&self) -> PathBuf {
        self.config_dir().join("server.cfg")
    }

    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("realmadm.log")
    }

    /// The directories captured by backups, with their archive entry names.
    pub fn stateful_dirs(&self) -> [(&'static str, PathBuf); 3] {
        [
            ("config", self.config_dir()),
            ("data", self.data_dir()),
            ("db", self.db_dir()),
        ]
    }
}

impl Default for InstallPaths {
    fn default() -> Self {
        Self::new(Path::new(DEFAULT_BASE_DIR), DEFAULT_MAX_BACKUPS)
    }
}
