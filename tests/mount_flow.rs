mod common;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use privmount::{
    config::Config,
    error::{PrivmountError, Result},
    helper::{HelperDriver, HelperOutcome},
    orchestrator::{MountReport, PrivateDirectory},
    passphrase::{Passphrase, SecretSource},
};

use common::fixture_with_signature;

const ONE_SIGNATURE: &str = "ABCDEF\n";
const TWO_SIGNATURES: &str = "ABCDEF\n012345\n";

#[derive(Default)]
struct DriverState {
    mount_exit_codes: Mutex<Vec<i32>>,
    unlock_exit_code: Mutex<i32>,
    mount_calls: Mutex<usize>,
    unmount_calls: Mutex<usize>,
    insert_calls: Mutex<Vec<(PathBuf, String)>>,
    unwrap_add_calls: Mutex<Vec<(PathBuf, String)>>,
    mount_table: Mutex<String>,
}

struct ScriptedDriver {
    state: Arc<DriverState>,
}

impl ScriptedDriver {
    fn with_mount_exit_codes(codes: &[i32]) -> (Self, Arc<DriverState>) {
        let state = Arc::new(DriverState {
            mount_exit_codes: Mutex::new(codes.to_vec()),
            ..DriverState::default()
        });
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    fn outcome(helper: &str, exit_code: i32) -> HelperOutcome {
        HelperOutcome {
            helper: helper.to_owned(),
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "helper failed".to_owned()
            },
        }
    }
}

impl HelperDriver for ScriptedDriver {
    fn mount_private(&self) -> Result<HelperOutcome> {
        *self.state.mount_calls.lock().unwrap() += 1;
        let mut codes = self.state.mount_exit_codes.lock().unwrap();
        assert!(!codes.is_empty(), "unscripted mount helper invocation");
        let code = codes.remove(0);
        Ok(Self::outcome("mount.ecryptfs_private", code))
    }

    fn unmount_private(&self) -> Result<HelperOutcome> {
        *self.state.unmount_calls.lock().unwrap() += 1;
        Ok(Self::outcome("umount.ecryptfs_private", 0))
    }

    fn insert_wrapped_passphrase(
        &self,
        wrapped_file: &Path,
        passphrase: &Passphrase,
    ) -> Result<HelperOutcome> {
        self.state.insert_calls.lock().unwrap().push((
            wrapped_file.to_path_buf(),
            passphrase.expose(|value| value.to_owned()),
        ));
        let code = *self.state.unlock_exit_code.lock().unwrap();
        Ok(Self::outcome(
            "ecryptfs-insert-wrapped-passphrase-into-keyring",
            code,
        ))
    }

    fn unwrap_and_add_passphrase(
        &self,
        wrapped_file: &Path,
        passphrase: &Passphrase,
    ) -> Result<HelperOutcome> {
        self.state.unwrap_add_calls.lock().unwrap().push((
            wrapped_file.to_path_buf(),
            passphrase.expose(|value| value.to_owned()),
        ));
        let code = *self.state.unlock_exit_code.lock().unwrap();
        Ok(Self::outcome(
            "ecryptfs-unwrap-passphrase | ecryptfs-add-passphrase",
            code,
        ))
    }

    fn mount_table(&self) -> Result<String> {
        Ok(self.state.mount_table.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct SourceState {
    resolve_calls: Mutex<usize>,
}

struct FixedSecretSource {
    state: Arc<SourceState>,
}

impl SecretSource for FixedSecretSource {
    fn resolve(&self) -> Result<Passphrase> {
        *self.state.resolve_calls.lock().unwrap() += 1;
        Ok(Passphrase::new("secretpass".to_owned()))
    }
}

fn build_private<'a>(
    config: &'a Config,
    driver: ScriptedDriver,
) -> (
    PrivateDirectory<'a, ScriptedDriver, FixedSecretSource>,
    Arc<SourceState>,
) {
    let source_state = Arc::new(SourceState::default());
    let private = PrivateDirectory::new(
        config,
        driver,
        FixedSecretSource {
            state: source_state.clone(),
        },
    );
    (private, source_state)
}

#[test]
fn silent_success_runs_no_unlock() {
    let fixture = fixture_with_signature(ONE_SIGNATURE);
    let (driver, driver_state) = ScriptedDriver::with_mount_exit_codes(&[0]);
    let (private, source_state) = build_private(&fixture.config, driver);

    let report = private.mount().unwrap();

    assert_eq!(report, MountReport::CachedKey);
    assert_eq!(*driver_state.mount_calls.lock().unwrap(), 1);
    assert!(driver_state.insert_calls.lock().unwrap().is_empty());
    assert!(driver_state.unwrap_add_calls.lock().unwrap().is_empty());
    assert_eq!(*source_state.resolve_calls.lock().unwrap(), 0);
}

#[test]
fn single_signature_uses_two_stage_unlock() {
    let fixture = fixture_with_signature(ONE_SIGNATURE);
    let (driver, driver_state) = ScriptedDriver::with_mount_exit_codes(&[1, 0]);
    let (private, source_state) = build_private(&fixture.config, driver);

    let report = private.mount().unwrap();

    assert_eq!(
        report,
        MountReport::Unlocked {
            filename_encryption: false
        }
    );
    assert_eq!(*driver_state.mount_calls.lock().unwrap(), 2);
    assert!(driver_state.insert_calls.lock().unwrap().is_empty());
    let unwrap_add_calls = driver_state.unwrap_add_calls.lock().unwrap();
    assert_eq!(unwrap_add_calls.len(), 1);
    assert_eq!(
        unwrap_add_calls[0].0,
        fixture.config.wrapped_passphrase_file()
    );
    assert_eq!(unwrap_add_calls[0].1, "secretpass");
    assert_eq!(*source_state.resolve_calls.lock().unwrap(), 1);
}

#[test]
fn two_signatures_use_direct_insert_unlock() {
    let fixture = fixture_with_signature(TWO_SIGNATURES);
    let (driver, driver_state) = ScriptedDriver::with_mount_exit_codes(&[1, 0]);
    let (private, _source_state) = build_private(&fixture.config, driver);

    let report = private.mount().unwrap();

    assert_eq!(
        report,
        MountReport::Unlocked {
            filename_encryption: true
        }
    );
    assert_eq!(driver_state.insert_calls.lock().unwrap().len(), 1);
    assert!(driver_state.unwrap_add_calls.lock().unwrap().is_empty());
}

#[test]
fn unlock_failure_stops_after_the_silent_attempt() {
    let fixture = fixture_with_signature(TWO_SIGNATURES);
    let (driver, driver_state) = ScriptedDriver::with_mount_exit_codes(&[1]);
    *driver_state.unlock_exit_code.lock().unwrap() = 1;
    let (private, _source_state) = build_private(&fixture.config, driver);

    let result = private.mount();

    assert!(matches!(result, Err(PrivmountError::Unlock { .. })));
    assert_eq!(*driver_state.mount_calls.lock().unwrap(), 1);
    assert_eq!(driver_state.insert_calls.lock().unwrap().len(), 1);
}

#[test]
fn retry_failure_is_terminal_after_exactly_two_attempts() {
    let fixture = fixture_with_signature(ONE_SIGNATURE);
    let (driver, driver_state) = ScriptedDriver::with_mount_exit_codes(&[1, 1]);
    let (private, source_state) = build_private(&fixture.config, driver);

    let result = private.mount();

    assert!(matches!(result, Err(PrivmountError::Mount { .. })));
    assert_eq!(*driver_state.mount_calls.lock().unwrap(), 2);
    assert_eq!(driver_state.unwrap_add_calls.lock().unwrap().len(), 1);
    assert_eq!(*source_state.resolve_calls.lock().unwrap(), 1);
}

#[test]
fn mount_fails_fast_when_wrapped_passphrase_is_missing() {
    let fixture = fixture_with_signature(ONE_SIGNATURE);
    std::fs::remove_file(fixture.config.wrapped_passphrase_file()).unwrap();
    let (driver, driver_state) = ScriptedDriver::with_mount_exit_codes(&[]);
    let (private, source_state) = build_private(&fixture.config, driver);

    let result = private.mount();

    assert!(matches!(result, Err(PrivmountError::Config(_))));
    assert_eq!(*driver_state.mount_calls.lock().unwrap(), 0);
    assert_eq!(*source_state.resolve_calls.lock().unwrap(), 0);
}

#[test]
fn failed_run_leaves_a_helper_transcript() {
    let fixture = fixture_with_signature(ONE_SIGNATURE);
    let (driver, _driver_state) = ScriptedDriver::with_mount_exit_codes(&[1, 1]);
    let (private, _source_state) = build_private(&fixture.config, driver);

    let result = private.mount();

    let transcript = match result {
        Err(PrivmountError::Mount { transcript }) => transcript,
        other => panic!("expected a mount failure, got {other:?}"),
    };
    let raw = std::fs::read_to_string(&transcript).unwrap();
    let lines = raw.lines().collect::<Vec<_>>();
    // silent attempt, unlock pipeline, retry attempt
    assert_eq!(lines.len(), 3);
    let unlock: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(unlock["exit_code"], 0);
    assert!(unlock["helper"]
        .as_str()
        .unwrap()
        .contains("ecryptfs-add-passphrase"));
}
