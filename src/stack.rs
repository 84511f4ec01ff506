//! Lifecycle of the service stack through the compose engine.
//!
//! Every verb is one blocking delegation to `docker compose` against the
//! rendered descriptor; nothing here retries or watches.

use tracing::info;
use which::which;

use crate::backup::BackupManager;
use crate::compose::{ADMIN_SERVICE, DB_SERVICE, SERVER_SERVICE};
use crate::paths::InstallPaths;
use crate::process::CommandRunner;
use crate::Result;

/// One-shot resource usage of a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub name: String,
    pub cpu: String,
    pub memory: String,
}

pub struct Stack<'a> {
    runner: &'a dyn CommandRunner,
    paths: &'a InstallPaths,
}

impl<'a> Stack<'a> {
    pub fn new(runner: &'a dyn CommandRunner, paths: &'a InstallPaths) -> Self {
        Self { runner, paths }
    }

    /// Install the container engine if it is not on the host yet.
    pub fn ensure_engine(&self) -> Result<()> {
        if which("docker").is_ok() {
            return Ok(());
        }
        info!("container engine not found, installing");
        self.runner.run(&["apt-get", "update"])?;
        self.runner
            .run(&["apt-get", "install", "-y", "docker.io", "docker-compose-v2"])?;
        Ok(())
    }

    pub fn up(&self) -> Result<()> {
        self.compose(&["up", "-d"])?;
        info!("stack started");
        Ok(())
    }

    pub fn down(&self) -> Result<()> {
        self.compose(&["down"])?;
        info!("stack stopped");
        Ok(())
    }

    pub fn restart(&self) -> Result<()> {
        self.compose(&["restart"])?;
        info!("stack restarted");
        Ok(())
    }

    /// Take a backup, pull newer images, bring the stack back up. The backup
    /// leaves a recovery point if the pull or restart goes wrong.
    pub fn update(&self, backups: &BackupManager) -> Result<()> {
        info!("taking a backup before updating");
        backups.create()?;
        self.compose(&["pull"])?;
        self.compose(&["up", "-d"])?;
        info!("stack updated");
        Ok(())
    }

    /// Point-in-time resource snapshot of one service, or of all three when
    /// no name is given.
    pub fn inspect(&self, service: Option<&str>) -> Result<Vec<ResourceSnapshot>> {
        let mut args = vec![
            "docker",
            "stats",
            "--no-stream",
            "--format",
            "{{.Name}};{{.CPUPerc}};{{.MemUsage}}",
        ];
        match service {
            Some(name) => args.push(name),
            None => args.extend([SERVER_SERVICE, DB_SERVICE, ADMIN_SERVICE]),
        }
        let output = self.runner.run(&args)?;
        Ok(parse_stats(&output))
    }

    fn compose(&self, verb_args: &[&str]) -> Result<String> {
        let compose_file = self.paths.compose_file();
        let compose_file = compose_file.to_string_lossy();
        let mut args: Vec<&str> = vec!["docker", "compose", "-f", compose_file.as_ref()];
        args.extend_from_slice(verb_args);
        self.runner.run(&args)
    }
}

fn parse_stats(output: &str) -> Vec<ResourceSnapshot> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, ';');
            let snapshot = ResourceSnapshot {
                name: parts.next()?.trim().to_string(),
                cpu: parts.next()?.trim().to_string(),
                memory: parts.next()?.trim().to_string(),
            };
            (!snapshot.name.is_empty()).then_some(snapshot)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;

    #[test]
    fn verbs_target_the_rendered_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::new(dir.path(), 5);
        let runner = RecordingRunner::new();
        let stack = Stack::new(&runner, &paths);

        stack.up().unwrap();
        stack.down().unwrap();
        stack.restart().unwrap();

        let descriptor = paths.compose_file().to_string_lossy().into_owned();
        let calls = runner.calls();
        assert_eq!(calls[0], format!("docker compose -f {descriptor} up -d"));
        assert_eq!(calls[1], format!("docker compose -f {descriptor} down"));
        assert_eq!(calls[2], format!("docker compose -f {descriptor} restart"));
    }

    #[test]
    fn update_backs_up_before_pulling() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::new(dir.path(), 5);
        std::fs::create_dir_all(paths.config_dir()).unwrap();
        std::fs::write(paths.config_dir().join("server.cfg"), "x\n").unwrap();

        let runner = RecordingRunner::new();
        let stack = Stack::new(&runner, &paths);
        let backups = BackupManager::new(&paths);

        stack.update(&backups).unwrap();

        assert_eq!(backups.list().unwrap().len(), 1);
        let calls = runner.calls();
        let pull = calls.iter().position(|c| c.ends_with(" pull")).unwrap();
        let up = calls.iter().position(|c| c.ends_with(" up -d")).unwrap();
        assert!(pull < up);
    }

    #[test]
    fn stats_lines_parse_into_snapshots() {
        let parsed = parse_stats(
            "openrealm-server;12.34%;1.5GiB / 8GiB\nopenrealm-db;0.50%;300MiB / 8GiB\n",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "openrealm-server");
        assert_eq!(parsed[0].cpu, "12.34%");
        assert_eq!(parsed[1].memory, "300MiB / 8GiB");
    }

    #[test]
    fn empty_stats_output_yields_no_snapshots() {
        assert!(parse_stats("").is_empty());
        assert!(parse_stats("\n\n").is_empty());
    }
}
