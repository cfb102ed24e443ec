//! Lifecycle control of the upstream backend binary.
//!
//! Everything here shells out: `pgrep`/`pkill` for liveness, scripts in
//! `base_dir` for start/stop/update. Mutating operations hold one async lock
//! so two browser tabs cannot interleave a stop with a rollback.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::BackendConfig;

const RELEASE_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{0}")]
    Spawn(#[source] io::Error),

    #[error("{0}")]
    NotRunning(&'static str),

    #[error("Failed to check latest version: {0}")]
    ReleaseCheck(#[from] reqwest::Error),

    #[error("{message}")]
    UpdateFailed { message: String, output: String },

    #[error("Invalid backup name")]
    InvalidBackup,

    #[error("Backup not found")]
    BackupNotFound,

    #[error("Failed to backup current binary: {0}")]
    SaveCurrent(#[source] io::Error),

    #[error("Failed to restore backup: {0}")]
    Restore(#[source] io::Error),

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl SupervisorError {
    /// Captured script output, when the failure produced any.
    pub fn output(&self) -> Option<&str> {
        match self {
            SupervisorError::UpdateFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub running: bool,
    pub current_version: String,
    pub latest_version: String,
    pub has_update: bool,
}

#[derive(Debug, Serialize)]
pub struct OpReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl OpReport {
    fn done() -> Self {
        Self {
            success: true,
            output: None,
        }
    }

    fn with_output(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateCheck {
    pub success: bool,
    pub current_version: String,
    pub latest_version: String,
    pub has_update: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mod_time: String,
    #[serde(skip)]
    modified: Option<SystemTime>,
}

#[derive(Debug, Serialize)]
pub struct RollbackReport {
    pub success: bool,
    pub message: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(default)]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

pub struct Supervisor {
    config: BackendConfig,
    lock: Mutex<()>,
    http: reqwest::Client,
}

impl Supervisor {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
            http: reqwest::Client::new(),
        }
    }

    fn binary_path(&self) -> PathBuf {
        self.config.base_dir.join(&self.config.binary_name)
    }

    fn script(&self, name: &str) -> PathBuf {
        self.config.base_dir.join(name)
    }

    fn backup_prefix(&self) -> String {
        format!("{}.backup.", self.config.binary_name)
    }

    fn start_grace(&self) -> Duration {
        Duration::from_secs(self.config.start_grace_secs)
    }

    fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.config.stop_grace_secs)
    }

    pub async fn is_running(&self) -> bool {
        Command::new("pgrep")
            .arg("-f")
            .arg(&self.config.process_pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// `tag` reported by `<binary> version`, or `unknown`.
    pub async fn current_version(&self) -> String {
        let output = match Command::new(self.binary_path()).arg("version").output().await {
            Ok(output) if output.status.success() => output,
            _ => return UNKNOWN_VERSION.to_string(),
        };
        serde_json::from_slice::<VersionInfo>(&output.stdout)
            .map(|v| v.tag)
            .unwrap_or_else(|_| UNKNOWN_VERSION.to_string())
    }

    pub async fn latest_version(&self) -> Result<String, SupervisorError> {
        let release: Release = self
            .http
            .get(&self.config.release_url)
            .header(USER_AGENT, concat!("portal/", env!("CARGO_PKG_VERSION")))
            .timeout(RELEASE_CHECK_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(release.tag_name)
    }

    pub async fn status(&self) -> Status {
        let running = self.is_running().await;
        let current_version = self.current_version().await;
        let latest_version = match self.latest_version().await {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!(error = %e, "Release check failed");
                String::new()
            }
        };
        let has_update = !latest_version.is_empty() && has_update(&current_version, &latest_version);
        Status {
            running,
            current_version,
            latest_version,
            has_update,
        }
    }

    pub async fn check_update(&self) -> Result<UpdateCheck, SupervisorError> {
        let current_version = self.current_version().await;
        let latest_version = self.latest_version().await?;
        Ok(UpdateCheck {
            success: true,
            has_update: has_update(&current_version, &latest_version),
            current_version,
            latest_version,
        })
    }

    /// Launch `start.sh` without waiting for it.
    fn spawn_start_script(&self) -> Result<(), SupervisorError> {
        Command::new("bash")
            .arg(self.script("start.sh"))
            .current_dir(&self.config.base_dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(SupervisorError::Spawn)?;
        Ok(())
    }

    async fn kill_backend(&self) {
        let result = Command::new("pkill")
            .arg("-f")
            .arg(&self.config.process_pattern)
            .status()
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "pkill failed");
        }
    }

    pub async fn start(&self) -> Result<OpReport, SupervisorError> {
        let _guard = self.lock.lock().await;
        if self.is_running().await {
            return Ok(OpReport::with_output("Backend is already running"));
        }

        tracing::info!(base_dir = %self.config.base_dir.display(), "Starting backend");
        self.spawn_start_script()?;
        tokio::time::sleep(self.start_grace()).await;

        if self.is_running().await {
            Ok(OpReport::with_output("Backend started successfully"))
        } else {
            Err(SupervisorError::NotRunning("Process failed to start. Check logs."))
        }
    }

    pub async fn stop(&self) -> OpReport {
        let _guard = self.lock.lock().await;
        tracing::info!("Stopping backend");
        self.kill_backend().await;
        tokio::time::sleep(self.stop_grace()).await;
        OpReport::done()
    }

    pub async fn restart(&self) -> Result<OpReport, SupervisorError> {
        let _guard = self.lock.lock().await;
        tracing::info!("Restarting backend");

        let stopped = Command::new("bash")
            .arg(self.script("stop.sh"))
            .current_dir(&self.config.base_dir)
            .status()
            .await;
        if let Err(e) = stopped {
            tracing::warn!(error = %e, "stop.sh failed");
        }
        tokio::time::sleep(self.stop_grace()).await;

        self.spawn_start_script()?;
        tokio::time::sleep(self.start_grace()).await;

        if self.is_running().await {
            Ok(OpReport::done())
        } else {
            Err(SupervisorError::NotRunning("Process failed to restart"))
        }
    }

    /// Run `update-<binary>.sh` to completion, capturing its output.
    pub async fn update(&self) -> Result<OpReport, SupervisorError> {
        let _guard = self.lock.lock().await;
        let script = self.script(&format!("update-{}.sh", self.config.binary_name));
        tracing::info!(script = %script.display(), "Updating backend");

        let result = Command::new("bash")
            .arg(&script)
            .current_dir(&self.config.base_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(SupervisorError::Spawn)?;

        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));

        if result.status.success() {
            Ok(OpReport::with_output(output))
        } else {
            tracing::warn!(status = %result.status, "Update script failed");
            Err(SupervisorError::UpdateFailed {
                message: result.status.to_string(),
                output,
            })
        }
    }

    /// Backup binaries in `base_dir`, newest first.
    pub async fn backups(&self) -> Result<Vec<BackupInfo>, SupervisorError> {
        let prefix = self.backup_prefix();
        let mut entries = tokio::fs::read_dir(&self.config.base_dir).await?;

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let modified = meta.modified().ok();
            backups.push(BackupInfo {
                path: entry.path().to_string_lossy().into_owned(),
                name,
                size: meta.len(),
                mod_time: modified
                    .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
                modified,
            });
        }
        backups.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(backups)
    }

    /// Replace the binary with `backup_name`, keeping the current one aside.
    pub async fn rollback(&self, backup_name: &str) -> Result<RollbackReport, SupervisorError> {
        let _guard = self.lock.lock().await;

        if !backup_name.starts_with(&self.backup_prefix()) || backup_name.contains('/') {
            return Err(SupervisorError::InvalidBackup);
        }
        let backup = self.config.base_dir.join(backup_name);
        if !tokio::fs::try_exists(&backup).await.unwrap_or(false) {
            return Err(SupervisorError::BackupNotFound);
        }

        tracing::info!(backup = backup_name, "Rolling back backend");
        self.kill_backend().await;
        tokio::time::sleep(self.stop_grace()).await;

        let binary = self.binary_path();
        if tokio::fs::try_exists(&binary).await.unwrap_or(false) {
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            let aside = self
                .config
                .base_dir
                .join(format!("{}.before-rollback.{}", self.config.binary_name, stamp));
            tokio::fs::copy(&binary, &aside)
                .await
                .map_err(SupervisorError::SaveCurrent)?;
        }

        tokio::fs::copy(&backup, &binary)
            .await
            .map_err(SupervisorError::Restore)?;
        if let Err(e) =
            tokio::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).await
        {
            tracing::warn!(error = %e, "Could not mark restored binary executable");
        }

        if tokio::fs::try_exists(self.script("start.sh")).await.unwrap_or(false) {
            if let Err(e) = self.spawn_start_script() {
                tracing::warn!(error = %e, "start.sh failed after rollback");
            }
        }
        tokio::time::sleep(self.stop_grace()).await;

        Ok(RollbackReport {
            success: true,
            message: format!("Rolled back to {}", backup_name),
            version: self.current_version().await,
        })
    }
}

fn has_update(current: &str, latest: &str) -> bool {
    current != UNKNOWN_VERSION && current != latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn supervisor() -> (TempDir, Supervisor) {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            base_dir: dir.path().to_path_buf(),
            binary_name: "backend".to_string(),
            process_pattern: "no-such-process-portal-test-[0-9]{12}".to_string(),
            release_url: "http://127.0.0.1:1/releases/latest".to_string(),
            start_grace_secs: 0,
            stop_grace_secs: 0,
        };
        (dir, Supervisor::new(config))
    }

    #[tokio::test]
    async fn rollback_rejects_foreign_names() {
        let (dir, sup) = supervisor();
        fs::write(dir.path().join("passwd"), "x").unwrap();
        assert!(matches!(sup.rollback("passwd").await, Err(SupervisorError::InvalidBackup)));
        assert!(matches!(
            sup.rollback("backend.backup./../passwd").await,
            Err(SupervisorError::InvalidBackup)
        ));
    }

    #[tokio::test]
    async fn rollback_requires_existing_backup() {
        let (_dir, sup) = supervisor();
        assert!(matches!(
            sup.rollback("backend.backup.20240101").await,
            Err(SupervisorError::BackupNotFound)
        ));
    }

    #[tokio::test]
    async fn rollback_restores_and_keeps_current_aside() {
        let (dir, sup) = supervisor();
        fs::write(dir.path().join("backend"), "#!/bin/sh\necho old\n").unwrap();
        fs::write(
            dir.path().join("backend.backup.1"),
            "#!/bin/sh\necho '{\"tag\":\"v1.2.3\"}'\n",
        )
        .unwrap();

        let report = sup.rollback("backend.backup.1").await.unwrap();
        assert!(report.success);
        assert_eq!(report.message, "Rolled back to backend.backup.1");
        assert_eq!(report.version, "v1.2.3");

        let restored = dir.path().join("backend");
        assert!(fs::read_to_string(&restored).unwrap().contains("v1.2.3"));
        assert_eq!(fs::metadata(&restored).unwrap().permissions().mode() & 0o777, 0o755);

        let aside: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("backend.before-rollback."))
            .collect();
        assert_eq!(aside.len(), 1);
    }

    #[tokio::test]
    async fn backups_are_newest_first() {
        let (dir, sup) = supervisor();
        let now = SystemTime::now();
        for (name, age) in [("backend.backup.a", 300), ("backend.backup.b", 10), ("backend.backup.c", 100)] {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(now - Duration::from_secs(age))
                .unwrap();
        }
        fs::write(dir.path().join("backend"), "bin").unwrap();

        let names: Vec<_> = sup.backups().await.unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["backend.backup.b", "backend.backup.c", "backend.backup.a"]);
    }

    #[tokio::test]
    async fn update_captures_script_output() {
        let (dir, sup) = supervisor();
        fs::write(dir.path().join("update-backend.sh"), "echo fetched\necho warn >&2\n").unwrap();
        let report = sup.update().await.unwrap();
        assert_eq!(report.output.as_deref(), Some("fetched\nwarn\n"));

        fs::write(dir.path().join("update-backend.sh"), "echo broken\nexit 3\n").unwrap();
        let err = sup.update().await.unwrap_err();
        assert_eq!(err.output(), Some("broken\n"));
    }

    #[tokio::test]
    async fn start_reports_a_process_that_never_appears() {
        let (dir, sup) = supervisor();
        fs::write(dir.path().join("start.sh"), "exit 0\n").unwrap();
        assert!(matches!(sup.start().await, Err(SupervisorError::NotRunning(_))));
    }

    #[tokio::test]
    async fn unreachable_release_api_fails_check() {
        let (_dir, sup) = supervisor();
        assert!(matches!(sup.check_update().await, Err(SupervisorError::ReleaseCheck(_))));
        let status = sup.status().await;
        assert!(!status.running);
        assert_eq!(status.current_version, UNKNOWN_VERSION);
        assert!(status.latest_version.is_empty());
        assert!(!status.has_update);
    }

    #[test]
    fn update_needs_a_known_differing_version() {
        assert!(has_update("v1", "v2"));
        assert!(!has_update("v2", "v2"));
        assert!(!has_update(UNKNOWN_VERSION, "v2"));
    }
}
