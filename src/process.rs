use std::process::{Command, Stdio};

use tracing::debug;

use crate::{Error, Result};

/// Seam in front of external tool invocations (docker, ufw, apt).
///
/// Everything the tool shells out to goes through here so the control logic
/// can be exercised against a recording fake.
pub trait CommandRunner {
    /// Run a command to completion and capture its stdout. Non-zero exit is
    /// an error carrying the captured stderr.
    fn run(&self, args: &[&str]) -> Result<String>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = build_cmd(args);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(Error::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

fn build_cmd(args: &[&str]) -> Command {
    let mut cmd = Command::new(args[0]);
    cmd.env_remove("LANG");
    cmd.env_remove("LC_CTYPE");
    cmd.env_remove("LC_NUMERIC");
    cmd.env_remove("LC_TIME");
    cmd.env_remove("LC_COLLATE");
    cmd.env_remove("LC_MONETARY");
    cmd.env_remove("LC_MESSAGES");
    cmd.env_remove("LC_ALL");

    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    debug!("exec: {:?}", args);
    cmd
}

#[cfg(test)]
pub struct RecordingRunner {
    pub calls: std::cell::RefCell<Vec<String>>,
    pub fail_on: Option<&'static str>,
}

#[cfg(test)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: std::cell::RefCell::new(Vec::new()),
            fail_on: None,
        }
    }

    pub fn failing_on(fragment: &'static str) -> Self {
        Self {
            fail_on: Some(fragment),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

#[cfg(test)]
impl CommandRunner for RecordingRunner {
    fn run(&self, args: &[&str]) -> Result<String> {
        let command = args.join(" ");
        self.calls.borrow_mut().push(command.clone());
        if let Some(fragment) = self.fail_on {
            if command.contains(fragment) {
                return Err(Error::CommandFailed {
                    command,
                    stderr: "simulated failure".into(),
                });
            }
        }
        Ok(String::new())
    }
}
