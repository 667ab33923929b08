use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::process::Command,
    tracing::{debug, info, warn},
};

use crate::{
    AgentError, Result,
    invoker::{AgentInvoker, AgentReply},
    output::parse_output,
};

/// Environment variable naming the turn's outbox directory.
pub const OUTBOX_DIR_ENV: &str = "WA_OUTBOX_DIR";

/// Invokes the `claude` CLI in non-interactive print mode.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    pub binary: String,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    /// Per-call spend ceiling; `None` omits the flag.
    pub max_budget_usd: Option<f64>,
}

impl ClaudeCli {
    pub fn new(binary: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
            timeout: Duration::from_secs(120),
            max_budget_usd: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_budget(mut self, max_budget_usd: Option<f64>) -> Self {
        self.max_budget_usd = max_budget_usd;
        self
    }

    /// Argument vector for one turn.
    pub fn build_args(&self, text: &str, session_token: &str, is_resume: bool) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            text.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ];
        if let Some(budget) = self.max_budget_usd {
            args.push("--max-budget-usd".to_string());
            args.push(budget.to_string());
        }
        args.push(if is_resume {
            "--resume".to_string()
        } else {
            "--session-id".to_string()
        });
        args.push(session_token.to_string());
        args
    }
}

#[async_trait]
impl AgentInvoker for ClaudeCli {
    async fn invoke(
        &self,
        text: &str,
        session_token: &str,
        is_resume: bool,
        outbox_dir: Option<&Path>,
    ) -> Result<AgentReply> {
        debug!(
            session = session_token,
            is_resume,
            timeout_secs = self.timeout.as_secs(),
            "invoking agent"
        );

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(text, session_token, is_resume))
            .current_dir(&self.working_dir)
            .env("FORCE_COLOR", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = outbox_dir {
            cmd.env(OUTBOX_DIR_ENV, dir);
        }

        let child = cmd.spawn().map_err(|source| AgentError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    session = session_token,
                    timeout_secs = self.timeout.as_secs(),
                    "agent timed out"
                );
                return Err(AgentError::Timeout(self.timeout));
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "agent stderr");
        }

        let reply = parse_output(&stdout, &stderr, output.status)?;
        info!(
            exit_code = output.status.code().unwrap_or(-1),
            reply_len = reply.text.len(),
            cost_usd = reply.cost_usd,
            duration_ms = reply.duration_ms,
            "agent turn finished"
        );
        Ok(reply)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_args() {
        let cli = ClaudeCli::new("claude", "/tmp").with_max_budget(Some(0.5));
        assert_eq!(cli.build_args("hello", "tok-1", false), vec![
            "-p",
            "hello",
            "--output-format",
            "json",
            "--max-budget-usd",
            "0.5",
            "--session-id",
            "tok-1",
        ]);
    }

    #[test]
    fn resume_without_budget() {
        let cli = ClaudeCli::new("claude", "/tmp");
        let args = cli.build_args("again", "tok-1", true);
        assert!(!args.iter().any(|a| a == "--max-budget-usd"));
        assert_eq!(&args[args.len() - 2..], ["--resume", "tok-1"]);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let cli = ClaudeCli::new("/nonexistent/definitely-not-claude", "/tmp");
        let err = cli.invoke("hi", "tok", false, None).await.unwrap_err();
        assert!(matches!(err, AgentError::Spawn { .. }));
        assert!(!err.invalidates_session());
    }

    #[cfg(unix)]
    mod scripted {
        use {super::*, std::os::unix::fs::PermissionsExt};

        fn script(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-claude");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn parses_json_result() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(
                dir.path(),
                r#"echo '{"result":"hi from agent","total_cost_usd":0.01,"duration_ms":1200}'"#,
            );
            let cli = ClaudeCli::new(bin, dir.path());
            let reply = cli.invoke("hello", "tok", false, None).await.unwrap();
            assert_eq!(reply.text, "hi from agent");
            assert_eq!(reply.cost_usd, Some(0.01));
            assert_eq!(reply.duration_ms, Some(1200));
        }

        #[tokio::test]
        async fn passes_prompt_and_session_flags() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(dir.path(), r#"echo "$@""#);
            let cli = ClaudeCli::new(bin, dir.path());
            let reply = cli.invoke("what now", "tok-9", true, None).await.unwrap();
            assert_eq!(reply.text, "-p what now --output-format json --resume tok-9");
        }

        #[tokio::test]
        async fn runs_in_working_dir_without_color() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(dir.path(), r#"echo "$(pwd) $FORCE_COLOR""#);
            let cli = ClaudeCli::new(bin, dir.path());
            let reply = cli.invoke("x", "tok", false, None).await.unwrap();
            let expected = format!("{} 0", dir.path().canonicalize().unwrap().display());
            assert_eq!(reply.text, expected);
        }

        #[tokio::test]
        async fn exports_outbox_dir() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(dir.path(), r#"echo "[$WA_OUTBOX_DIR]""#);
            let cli = ClaudeCli::new(bin, dir.path());

            let outbox = dir.path().join(".wa-media-out").join("111_c_us");
            let reply = cli.invoke("x", "tok", false, Some(&outbox)).await.unwrap();
            assert_eq!(reply.text, format!("[{}]", outbox.display()));

            let reply = cli.invoke("x", "tok", false, None).await.unwrap();
            assert_eq!(reply.text, "[]");
        }

        #[tokio::test]
        async fn failing_exit_reports_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(
                dir.path(),
                "echo 'No conversation found with session ID: tok' >&2; exit 1",
            );
            let cli = ClaudeCli::new(bin, dir.path());
            let err = cli.invoke("x", "tok", true, None).await.unwrap_err();
            assert!(err.invalidates_session());
            assert!(err.to_string().contains("No conversation found"));
        }

        #[tokio::test]
        async fn slow_agent_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(dir.path(), "sleep 10");
            let cli = ClaudeCli::new(bin, dir.path()).with_timeout(Duration::from_millis(200));
            let err = cli.invoke("x", "tok", false, None).await.unwrap_err();
            assert!(err.is_timeout());
            assert!(!err.invalidates_session());
        }
    }
}
