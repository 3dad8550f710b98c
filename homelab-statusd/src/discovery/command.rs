use std::process::Stdio;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Runs an external diagnostic command and hands back its trimmed stdout.
/// Failures are reported as empty output; callers treat "" as unavailable.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> String;
}

/// Spawns real processes, killing any that outlive the timeout
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn try_run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .with_context(|| format!("timed out after {:?}", self.timeout))?
            .context("failed to spawn")?;

        if !output.status.success() {
            bail!("exited with {}", output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> String {
        match self.try_run(program, args).await {
            Ok(stdout) => stdout,
            Err(e) => {
                tracing::debug!("Command `{} {}` unavailable: {:#}", program, args.join(" "), e);
                String::new()
            }
        }
    }
}
