//! Firewall posture for the stack, applied through ufw.
//!
//! The rule set is rebuilt from scratch on every install: management and game
//! ports are always open, the database and admin-UI ports are either open or
//! restricted to one operator-chosen source address.

use std::net::IpAddr;

use tracing::{info, warn};
use which::which;

use crate::compose::{ADMIN_PORT, DB_PORT, GAME_PORT};
use crate::process::CommandRunner;
use crate::Result;

pub const SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub port: u16,
    pub protocol: Protocol,
    pub source: Option<IpAddr>,
}

impl Rule {
    fn open(port: u16, protocol: Protocol) -> Self {
        Self {
            port,
            protocol,
            source: None,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        match self.source {
            None => vec![
                "ufw".to_string(),
                "allow".to_string(),
                format!("{}/{}", self.port, self.protocol),
            ],
            Some(ip) => vec![
                "ufw".to_string(),
                "allow".to_string(),
                "from".to_string(),
                ip.to_string(),
                "to".to_string(),
                "any".to_string(),
                "port".to_string(),
                self.port.to_string(),
                "proto".to_string(),
                self.protocol.to_string(),
            ],
        }
    }
}

/// The ordered allow list. `restrict` narrows the database and admin-UI
/// ports to one source; it never applies to the management or game ports.
pub fn rule_set(restrict: Option<IpAddr>) -> Vec<Rule> {
    vec![
        Rule::open(SSH_PORT, Protocol::Tcp),
        Rule::open(GAME_PORT, Protocol::Tcp),
        Rule::open(GAME_PORT, Protocol::Udp),
        Rule {
            port: DB_PORT,
            protocol: Protocol::Tcp,
            source: restrict,
        },
        Rule {
            port: ADMIN_PORT,
            protocol: Protocol::Tcp,
            source: restrict,
        },
    ]
}

pub struct Firewall<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Firewall<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn apply(&self, restrict: Option<IpAddr>) -> Result<()> {
        if which("ufw").is_err() {
            info!("ufw not present, installing");
            self.runner.run(&["apt-get", "install", "-y", "ufw"])?;
        }

        // An enable failure is reported but does not abort the install.
        if let Err(err) = self.runner.run(&["ufw", "--force", "enable"]) {
            warn!("could not enable ufw, continuing: {err}");
        }

        self.runner.run(&["ufw", "default", "deny", "incoming"])?;

        for rule in rule_set(restrict) {
            let args = rule.to_args();
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            self.runner.run(&args)?;
            match rule.source {
                Some(ip) => info!(
                    "firewall: allow {}/{} from {ip} only",
                    rule.port, rule.protocol
                ),
                None => info!("firewall: allow {}/{}", rule.port, rule.protocol),
            }
        }
        Ok(())
    }
}
