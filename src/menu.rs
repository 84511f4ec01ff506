//! The interactive command loop.
//!
//! One sequential loop: read a selection, run it to completion, return to the
//! menu. A missing deployment descriptor forces one Setup run before the
//! first menu is shown.

use std::fs;
use std::net::IpAddr;

use strum::IntoEnumIterator;
use tracing::{error, info, warn};

use crate::backup::BackupManager;
use crate::compose;
use crate::firewall::Firewall;
use crate::paths::InstallPaths;
use crate::process::CommandRunner;
use crate::prompt::Prompt;
use crate::settings::Settings;
use crate::stack::Stack;
use crate::Result;

const LOG_TAIL_LINES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Command {
    Setup,
    Start,
    Stop,
    Restart,
    Backup,
    Restore,
    #[strum(serialize = "View logs")]
    Logs,
    Monitor,
    Update,
    Exit,
}

impl Command {
    /// Menu entries are selected by their 1-based position.
    pub fn parse(input: &str) -> Option<Command> {
        let n: usize = input.trim().parse().ok()?;
        Command::iter().nth(n.checked_sub(1)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Idle,
    Dispatching(Command),
    Exited,
}

pub struct Menu<'a> {
    paths: &'a InstallPaths,
    runner: &'a dyn CommandRunner,
    prompt: &'a mut dyn Prompt,
    state: MenuState,
}

impl<'a> Menu<'a> {
    pub fn new(
        paths: &'a InstallPaths,
        runner: &'a dyn CommandRunner,
        prompt: &'a mut dyn Prompt,
    ) -> Self {
        Self {
            paths,
            runner,
            prompt,
            state: MenuState::Idle,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn run(&mut self) -> Result<()> {
        if !self.paths.compose_file().exists() {
            info!("no deployment descriptor found, running first-time setup");
            self.dispatch(Command::Setup)?;
        }

        loop {
            self.print_menu();
            let answer = self.prompt.ask("Select an option")?;
            let Some(command) = Command::parse(&answer) else {
                error!("invalid selection {:?}", answer.trim());
                continue;
            };

            if command == Command::Exit {
                self.state = MenuState::Exited;
                info!("exiting");
                return Ok(());
            }

            match self.dispatch(command) {
                Ok(()) => {}
                // an install failure is unrecoverable, everything else
                // returns to the menu
                Err(err) if command == Command::Setup => return Err(err),
                Err(err) => error!("{command} failed: {err}"),
            }
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        self.state = MenuState::Dispatching(command);
        let result = self.execute(command);
        self.state = MenuState::Idle;
        result
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        let stack = Stack::new(self.runner, self.paths);
        let backups = BackupManager::new(self.paths);
        match command {
            Command::Setup => self.install(&stack, &backups),
            Command::Start => stack.up(),
            Command::Stop => stack.down(),
            Command::Restart => stack.restart(),
            Command::Backup => backups.create().map(|_| ()),
            Command::Restore => self.restore(&stack, &backups),
            Command::Logs => self.show_logs(),
            Command::Monitor => self.monitor(&stack),
            Command::Update => stack.update(&backups),
            Command::Exit => Ok(()),
        }
    }

    fn install(&mut self, stack: &Stack, backups: &BackupManager) -> Result<()> {
        match self.try_install(stack) {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("installation failed: {err}");
                match backups.list() {
                    Ok(archives) if !archives.is_empty() => {
                        let name = archives[0]
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        warn!("attempting recovery from {name}");
                        if let Err(restore_err) = backups.restore(&name, stack) {
                            error!("recovery failed: {restore_err}");
                        }
                    }
                    _ => error!("no backup available for recovery"),
                }
                Err(err)
            }
        }
    }

    fn try_install(&mut self, stack: &Stack) -> Result<()> {
        stack.ensure_engine()?;
        let settings = Settings::load_or_init(self.paths, &mut *self.prompt)?;
        compose::write_artifacts(self.paths, &settings)?;
        let restrict = self.ask_restriction()?;
        Firewall::new(self.runner).apply(restrict)?;
        stack.up()?;
        info!("installation complete");
        Ok(())
    }

    fn ask_restriction(&mut self) -> Result<Option<IpAddr>> {
        loop {
            let answer = self.prompt.ask(
                "Restrict database/admin ports to one source IP (leave empty for open access)",
            )?;
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<IpAddr>() {
                Ok(ip) => return Ok(Some(ip)),
                Err(_) => warn!("not a valid IP address: {answer:?}"),
            }
        }
    }

    fn restore(&mut self, stack: &Stack, backups: &BackupManager) -> Result<()> {
        let archives = backups.list()?;
        if archives.is_empty() {
            warn!("no backups available to restore");
            return Ok(());
        }
        info!("available backups, newest first:");
        for path in &archives {
            let size = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
            info!(
                "  {} ({size} bytes)",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
        }
        let name = self.prompt.ask("Backup file to restore")?;
        backups.restore(name.trim(), stack)
    }

    fn show_logs(&self) -> Result<()> {
        let content = fs::read_to_string(self.paths.log_file()).unwrap_or_default();
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(LOG_TAIL_LINES);
        for line in &lines[start..] {
            println!("{line}");
        }
        Ok(())
    }

    fn monitor(&self, stack: &Stack) -> Result<()> {
        for snapshot in stack.inspect(None)? {
            info!(
                "{}: cpu {} mem {}",
                snapshot.name, snapshot.cpu, snapshot.memory
            );
        }
        Ok(())
    }

    fn print_menu(&self) {
        println!();
        println!("OpenRealm server administration");
        for (i, command) in Command::iter().enumerate() {
            println!("  {}) {command}", i + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;
    use crate::prompt::ScriptedPrompt;

    #[test]
    fn selections_map_to_commands() {
        assert_eq!(Command::parse("1"), Some(Command::Setup));
        assert_eq!(Command::parse(" 5 "), Some(Command::Backup));
        assert_eq!(Command::parse("10"), Some(Command::Exit));
        assert_eq!(Command::parse("0"), None);
        assert_eq!(Command::parse("11"), None);
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse(""), None);
    }

    fn installed_paths() -> (tempfile::TempDir, InstallPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::new(dir.path(), 5);
        std::fs::write(paths.compose_file(), "services: {}\n").unwrap();
        (dir, paths)
    }

    #[test]
    fn exit_is_the_only_way_out() {
        let (_dir, paths) = installed_paths();
        let runner = RecordingRunner::new();
        let mut prompt = ScriptedPrompt::new(["10"]);
        let mut menu = Menu::new(&paths, &runner, &mut prompt);

        assert_eq!(menu.state(), MenuState::Idle);
        menu.run().unwrap();
        assert_eq!(menu.state(), MenuState::Exited);
    }

    #[test]
    fn invalid_input_returns_to_idle() {
        let (_dir, paths) = installed_paths();
        let runner = RecordingRunner::new();
        let mut prompt = ScriptedPrompt::new(["wat", "99", "10"]);
        let mut menu = Menu::new(&paths, &runner, &mut prompt);

        menu.run().unwrap();
        assert_eq!(menu.state(), MenuState::Exited);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn start_and_stop_are_delegated() {
        let (_dir, paths) = installed_paths();
        let runner = RecordingRunner::new();
        let mut prompt = ScriptedPrompt::new(["2", "3", "10"]);
        let mut menu = Menu::new(&paths, &runner, &mut prompt);

        menu.run().unwrap();
        let calls = runner.calls();
        assert!(calls[0].ends_with("up -d"));
        assert!(calls[1].ends_with("down"));
    }

    #[test]
    fn failed_lifecycle_verb_keeps_the_menu_alive() {
        let (_dir, paths) = installed_paths();
        let runner = RecordingRunner::failing_on("restart");
        let mut prompt = ScriptedPrompt::new(["4", "10"]);
        let mut menu = Menu::new(&paths, &runner, &mut prompt);

        menu.run().unwrap();
        assert_eq!(menu.state(), MenuState::Exited);
    }

    #[test]
    fn restore_with_no_backups_is_a_no_op() {
        let (_dir, paths) = installed_paths();
        let runner = RecordingRunner::new();
        let mut prompt = ScriptedPrompt::new(["6", "10"]);
        let mut menu = Menu::new(&paths, &runner, &mut prompt);

        menu.run().unwrap();
        assert!(runner.calls().is_empty());
    }
}
