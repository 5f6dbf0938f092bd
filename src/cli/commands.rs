use crate::{
    config::{Config, ConfigOverrides},
    error::{PrivmountError, Result},
    helper::SystemHelperDriver,
    orchestrator::{MountReport, PrivateDirectory, ToggleAction},
    passphrase::ConfiguredSecretSource,
};

use super::{
    output::{self, OutputStatus},
    Cli, Command,
};

pub(crate) fn run(cli: Cli) -> Result<i32> {
    let config = Config::resolve(ConfigOverrides {
        root: cli.root,
        private_dir_name: cli.private_dir,
        mount_point: cli.mount_point,
        passphrase_file: cli.passphrase_file,
        mount_helper: cli.mount_helper,
        unmount_helper: cli.unmount_helper,
    })?;
    let driver = SystemHelperDriver::for_config(&config);
    let secret_source = ConfiguredSecretSource::for_config(&config);
    let private = PrivateDirectory::new(&config, driver, secret_source);

    match cli.command {
        Command::Mount => {
            let report = private.mount()?;
            emit_stdout_line(mount_message(&report))?;
        }
        Command::Unmount => {
            private.unmount()?;
            emit_stdout_line("unmounted")?;
        }
        Command::Toggle => match private.toggle()? {
            ToggleAction::Mounted(report) => emit_stdout_line(mount_message(&report))?,
            ToggleAction::Unmounted => emit_stdout_line("unmounted")?,
        },
        Command::Status { json } => {
            let status = private.status()?;
            if json {
                emit_stdout_line(&serde_json::to_string_pretty(&status)?)?;
            } else {
                emit_stdout_line(&format!(
                    "{}: {}{}",
                    status.mount_point.display(),
                    if status.mounted { "mounted" } else { "not mounted" },
                    if status.available {
                        ""
                    } else {
                        " (not fully configured)"
                    },
                ))?;
            }
        }
    }
    Ok(0)
}

fn mount_message(report: &MountReport) -> &'static str {
    match report {
        MountReport::CachedKey => "mounted (cached keyring key)",
        MountReport::Unlocked { .. } => "mounted",
    }
}

fn emit_stdout_line(line: &str) -> Result<()> {
    match output::stdout_line(line) {
        Ok(OutputStatus::Written | OutputStatus::BrokenPipe) => Ok(()),
        Err(error) => Err(PrivmountError::Io(error)),
    }
}
