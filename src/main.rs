use std::path::PathBuf;

use clap::Parser;

use realmadm::menu::Menu;
use realmadm::paths::{InstallPaths, DEFAULT_BASE_DIR, DEFAULT_MAX_BACKUPS};
use realmadm::process::SystemRunner;
use realmadm::prompt::TerminalPrompt;
use realmadm::{logging, sysinfo};

/// Install and operate the OpenRealm dedicated server stack.
#[derive(Debug, Parser)]
#[command(name = "realmadm", version)]
struct Args {
    /// Install base directory holding the stack configuration, data and backups
    #[arg(long, default_value = DEFAULT_BASE_DIR)]
    base_dir: PathBuf,

    /// Number of backup archives to retain
    #[arg(long, default_value_t = DEFAULT_MAX_BACKUPS)]
    max_backups: usize,
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    let paths = InstallPaths::new(args.base_dir, args.max_backups);

    // preflight runs before the log sink exists: the sink lives under the
    // base dir, which a non-root or unsupported host must not create
    sysinfo::preflight(&paths.base_dir)?;
    logging::init(&paths.log_file())?;
    tracing::info!("realmadm starting, base dir {}", paths.base_dir.display());

    let runner = SystemRunner;
    let mut prompt = TerminalPrompt;
    Menu::new(&paths, &runner, &mut prompt).run()?;
    Ok(())
}
