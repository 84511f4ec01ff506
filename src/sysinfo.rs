use std::fs;
use std::path::Path;

use nix::sys::statvfs::statvfs;
use nix::unistd::Uid;

use crate::{Error, Result};

/// Minimum free space on the install filesystem before we touch anything.
pub const MIN_FREE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

const OS_RELEASE: &str = "/etc/os-release";

/// Startup environment checks. Every failure here is fatal; nothing has been
/// modified yet when one fires.
pub fn preflight(base_dir: &Path) -> Result<()> {
    if !Uid::effective().is_root() {
        return Err(Error::NotRoot);
    }

    let os_release = fs::read_to_string(OS_RELEASE).unwrap_or_default();
    if !debian_family(&os_release) {
        return Err(Error::UnsupportedOs(pretty_name(&os_release)));
    }

    let available = free_bytes(base_dir)?;
    if available < MIN_FREE_BYTES {
        return Err(Error::InsufficientDiskSpace {
            available,
            required: MIN_FREE_BYTES,
        });
    }

    Ok(())
}

fn debian_family(os_release: &str) -> bool {
    for line in os_release.lines() {
        let value = match line
            .strip_prefix("ID=")
            .or_else(|| line.strip_prefix("ID_LIKE="))
        {
            Some(value) => value.trim_matches('"'),
            None => continue,
        };
        if value
            .split_whitespace()
            .any(|id| id == "debian" || id == "ubuntu")
        {
            return true;
        }
    }
    false
}

fn pretty_name(os_release: &str) -> String {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim_matches('"').to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn free_bytes(base_dir: &Path) -> Result<u64> {
    // The base dir may not exist yet on a first run, probe the closest
    // existing ancestor instead.
    let mut probe = base_dir;
    while !probe.exists() {
        probe = probe.parent().unwrap_or(Path::new("/"));
    }
    let stat = statvfs(probe).map_err(|errno| {
        Error::Io(std::io::Error::from_raw_os_error(errno as i32))
    })?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debian_and_derivatives_are_supported() {
        assert!(debian_family("ID=debian\nVERSION_ID=\"12\"\n"));
        assert!(debian_family("ID=ubuntu\nID_LIKE=debian\n"));
        assert!(debian_family("ID=raspbian\nID_LIKE=\"debian\"\n"));
    }

    #[test]
    fn other_systems_are_rejected() {
        assert!(!debian_family("ID=fedora\n"));
        assert!(!debian_family("ID=\"opensuse-leap\"\nID_LIKE=\"suse opensuse\"\n"));
        assert!(!debian_family(""));
    }

    #[test]
    fn pretty_name_falls_back_to_unknown() {
        assert_eq!(
            pretty_name("PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n"),
            "Debian GNU/Linux 12 (bookworm)"
        );
        assert_eq!(pretty_name(""), "unknown");
    }
}
