//! The deployment configuration record.
//!
//! Persisted as line-oriented `KEY=VALUE` pairs in `realm.env` under the
//! install base. The file is always rewritten whole; a half-written record is
//! never observable because the rewrite goes through a temp sibling.

use std::fs;

use tracing::{info, warn};

use crate::paths::InstallPaths;
use crate::prompt::Prompt;
use crate::Result;

pub const KEY_ROOT_PASSWORD: &str = "MARIADB_ROOT_PASSWORD";
pub const KEY_DB_USER: &str = "MARIADB_USER";
pub const KEY_DB_PASSWORD: &str = "MARIADB_PASSWORD";
pub const KEY_DB_NAME: &str = "MARIADB_DATABASE";
pub const KEY_TIMEZONE: &str = "TZ";
pub const KEY_VERSION: &str = "SERVER_VERSION";

const MIN_CREDENTIAL_LEN: usize = 8;

const PROMPTS: [(&str, &str); 6] = [
    (KEY_ROOT_PASSWORD, "Database root password (min 8 characters)"),
    (KEY_DB_USER, "Database user"),
    (KEY_DB_PASSWORD, "Password for the database user (min 8 characters)"),
    (KEY_DB_NAME, "Database name"),
    (KEY_TIMEZONE, "Server timezone (IANA name, e.g. Europe/Paris)"),
    (KEY_VERSION, "Server version (\"latest\" or a build number)"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root_password: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub timezone: String,
    pub version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_password: String::new(),
            db_user: "openrealm".to_string(),
            db_password: String::new(),
            db_name: "openrealm".to_string(),
            timezone: String::new(),
            version: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must be at least {MIN_CREDENTIAL_LEN} characters")]
    CredentialTooShort(String),
    #[error("unrecognized timezone {0:?}")]
    UnknownTimezone(String),
    #[error("version must be \"latest\" or a plain build number, got {0:?}")]
    BadVersion(String),
}

/// Field-level validation. Keys without a rule are accepted as-is.
pub fn validate(key: &str, value: &str) -> std::result::Result<(), ValidationError> {
    match key {
        KEY_ROOT_PASSWORD | KEY_DB_PASSWORD => {
            if value.len() < MIN_CREDENTIAL_LEN {
                return Err(ValidationError::CredentialTooShort(key.to_string()));
            }
        }
        KEY_TIMEZONE => {
            if value.parse::<chrono_tz::Tz>().is_err() {
                return Err(ValidationError::UnknownTimezone(value.to_string()));
            }
        }
        KEY_VERSION => {
            let all_digits = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
            if value != "latest" && !all_digits {
                return Err(ValidationError::BadVersion(value.to_string()));
            }
        }
        _ => {}
    }
    Ok(())
}

impl Settings {
    /// Load the persisted record if one exists, prompt for every field that
    /// is still empty, and persist the completed record. Running this on an
    /// already complete record asks nothing and rewrites nothing.
    pub fn load_or_init(paths: &InstallPaths, prompt: &mut dyn Prompt) -> Result<Self> {
        let env_file = paths.env_file();
        let existed = env_file.exists();
        let mut settings = if existed {
            info!("loading configuration from {}", env_file.display());
            Settings::parse(&fs::read_to_string(&env_file)?)
        } else {
            info!("no configuration found, starting first-time setup");
            Settings::default()
        };

        let prompted = settings.fill_missing(prompt)?;
        if prompted || !existed {
            settings.save(paths)?;
        }
        Ok(settings)
    }

    pub fn parse(content: &str) -> Self {
        let mut settings = Settings::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                settings.set(key.trim(), value.trim().to_string());
            }
        }
        settings
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.fields() {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Whole-record rewrite through a temp sibling and rename.
    pub fn save(&self, paths: &InstallPaths) -> Result<()> {
        let env_file = paths.env_file();
        if let Some(parent) = env_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = env_file.with_file_name("realm.env.tmp");
        fs::write(&tmp, self.serialize())?;
        fs::rename(&tmp, &env_file)?;
        info!("configuration written to {}", env_file.display());
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, value)| !value.is_empty())
    }

    fn fill_missing(&mut self, prompt: &mut dyn Prompt) -> Result<bool> {
        let mut prompted = false;
        for (key, question) in PROMPTS {
            if !self.get(key).is_empty() {
                continue;
            }
            prompted = true;
            loop {
                let answer = prompt.ask(question)?;
                if answer.is_empty() {
                    warn!("a value is required for {key}");
                    continue;
                }
                match validate(key, &answer) {
                    Ok(()) => {
                        self.set(key, answer);
                        break;
                    }
                    Err(err) => warn!("{err}"),
                }
            }
        }
        Ok(prompted)
    }

    fn fields(&self) -> [(&'static str, &str); 6] {
        [
            (KEY_ROOT_PASSWORD, &self.root_password),
            (KEY_DB_USER, &self.db_user),
            (KEY_DB_PASSWORD, &self.db_password),
            (KEY_DB_NAME, &self.db_name),
            (KEY_TIMEZONE, &self.timezone),
            (KEY_VERSION, &self.version),
        ]
    }

    fn get(&self, key: &str) -> &str {
        match key {
            KEY_ROOT_PASSWORD => &self.root_password,
            KEY_DB_USER => &self.db_user,
            KEY_DB_PASSWORD => &self.db_password,
            KEY_DB_NAME => &self.db_name,
            KEY_TIMEZONE => &self.timezone,
            KEY_VERSION => &self.version,
            _ => "",
        }
    }

    fn set(&mut self, key: &str, value: String) {
        match key {
            KEY_ROOT_PASSWORD => self.root_password = value,
            KEY_DB_USER => self.db_user = value,
            KEY_DB_PASSWORD => self.db_password = value,
            KEY_DB_NAME => self.db_name = value,
            KEY_TIMEZONE => self.timezone = value,
            KEY_VERSION => self.version = value,
            // unknown keys carry no meaning for the stack, drop them
            _ => {}
        }
    }
}
