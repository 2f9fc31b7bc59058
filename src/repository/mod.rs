use anyhow::{Context, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Config;

/// Proxy variables git honors, cleared so only configured proxies apply
const PROXY_VARIABLES: [&str; 6] = [
    "http_proxy",
    "https_proxy",
    "all_proxy",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
];

/// Runs the version control tool. Only the exit status matters.
pub trait CommandRunner: Send + Sync {
    /// Run the tool with `args`, returning `true` when it exited successfully
    fn run(&self, args: Vec<OsString>) -> impl Future<Output = Result<bool>> + Send;
}

/// `git` executable invoked as a subprocess
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    timeout: Duration,
    env: Vec<(&'static str, String)>,
}

impl GitCli {
    pub fn new(config: &Config) -> Self {
        Self {
            program: OsString::from("git"),
            timeout: config.git_timeout,
            env: config.proxy.git_env(),
        }
    }

    /// Use a different executable than `git` from the `PATH`
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

impl CommandRunner for GitCli {
    async fn run(&self, args: Vec<OsString>) -> Result<bool> {
        let mut command = Command::new(&self.program);
        for variable in PROXY_VARIABLES {
            command.env_remove(variable);
        }
        command
            .args(&args)
            .envs(self.env.iter().map(|(key, value)| (*key, value.as_str())))
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(?args, "Running git");
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| anyhow::anyhow!("git timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| "Failed to execute git. Is git installed?")?;

        if !output.status.success() {
            tracing::warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git exited with failure"
            );
        }
        Ok(output.status.success())
    }
}

/// What is currently at a clone target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    /// Nothing at the path
    Absent,
    /// A directory holding version control metadata
    Valid,
    /// A file, or a directory without version control metadata
    Invalid,
}

impl CheckoutState {
    pub fn inspect(target: &Path) -> Self {
        match fs::symlink_metadata(target) {
            Err(e) if e.kind() == ErrorKind::NotFound => Self::Absent,
            Ok(meta) if meta.is_dir() && target.join(".git").exists() => Self::Valid,
            _ => Self::Invalid,
        }
    }
}

/// Result of one synchronization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A fresh shallow clone was created
    Cloned,
    /// An existing checkout was updated in place
    Updated,
    /// Neither update nor clone succeeded; no partial checkout was left behind
    Failed,
}

impl SyncOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Keeps a shallow local clone of a repository up to date
#[derive(Debug, Clone)]
pub struct RepositorySynchronizer<R = GitCli> {
    runner: R,
}

impl<R: CommandRunner> RepositorySynchronizer<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Ensure `target` holds an up-to-date shallow checkout of `url`.
    ///
    /// An existing checkout is pulled; if that fails, or the target is not a
    /// checkout at all, it is discarded and cloned again. Never returns an
    /// error: every failure is reported as [`SyncOutcome::Failed`].
    pub async fn synchronize(&self, url: &str, target: &Path) -> SyncOutcome {
        let state = CheckoutState::inspect(target);
        tracing::info!(url, path = %target.display(), ?state, "Synchronizing repository");

        match state {
            CheckoutState::Absent => {}
            CheckoutState::Valid => {
                match self.pull(target).await {
                    Ok(true) => {
                        tracing::info!(url, path = %target.display(), "Updated existing checkout");
                        return SyncOutcome::Updated;
                    }
                    Ok(false) => {
                        tracing::warn!(path = %target.display(), "Pull failed, recloning")
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, path = %target.display(), "Pull failed, recloning")
                    }
                }
                if let Err(e) = discard(target) {
                    tracing::error!(error = %e, path = %target.display(), "Failed to discard checkout");
                    return SyncOutcome::Failed;
                }
            }
            CheckoutState::Invalid => {
                tracing::warn!(path = %target.display(), "Target is not a checkout, discarding");
                if let Err(e) = discard(target) {
                    tracing::error!(error = %e, path = %target.display(), "Failed to discard target");
                    return SyncOutcome::Failed;
                }
            }
        }

        self.clone_fresh(url, target).await
    }

    async fn pull(&self, target: &Path) -> Result<bool> {
        let args = vec![
            OsString::from("-C"),
            target.as_os_str().to_os_string(),
            OsString::from("pull"),
            OsString::from("--depth=1"),
        ];
        self.runner.run(args).await
    }

    async fn clone_fresh(&self, url: &str, target: &Path) -> SyncOutcome {
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::error!(error = %e, path = %parent.display(), "Failed to create parent directory");
                return SyncOutcome::Failed;
            }
        }

        let args = vec![
            OsString::from("clone"),
            OsString::from("--depth=1"),
            OsString::from("--single-branch"),
            OsString::from(url),
            target.as_os_str().to_os_string(),
        ];

        let cloned = match self.runner.run(args).await {
            Ok(success) => success && CheckoutState::inspect(target) == CheckoutState::Valid,
            Err(e) => {
                tracing::warn!(error = %e, url, "Clone could not be run");
                false
            }
        };

        if cloned {
            tracing::info!(url, path = %target.display(), "Cloned repository");
            return SyncOutcome::Cloned;
        }

        // Never leave a half-initialized checkout behind.
        if let Err(e) = discard(target) {
            tracing::error!(error = %e, path = %target.display(), "Failed to remove partial clone");
        }
        tracing::warn!(url, path = %target.display(), "Repository synchronization failed");
        SyncOutcome::Failed
    }
}

fn discard(target: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("Failed to inspect {}", target.display())),
    };
    if meta.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    }
    .with_context(|| format!("Failed to remove {}", target.display()))
}
