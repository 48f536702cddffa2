// Subprocess predicate implementation
// reason: tokio for async process management, nix for timeout signals
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use pollster_core::application::constants::{
    EXIT_CONDITION_MET, EXIT_CONDITION_NOT_MET, KILL_GRACE_PERIOD,
};
use pollster_core::domain::{is_safe_integer, ConfigError};
use pollster_core::port::{Predicate, PredicateError};

use crate::spawn_options::{filter_env, SpawnOptions, StdioMode};

/// Predicate that runs a command in a fresh child process per evaluation
///
/// - exit code 0 -> `true`
/// - exit code 1 -> `false`
/// - any other code -> `PredicateError::ExitCode`
/// - killed by a signal -> `PredicateError::Interrupted`
/// - still running after `timeout` -> killed, `PredicateError::TimedOut`
///
/// No process, timer or state is shared between evaluations.
pub struct SubprocessPredicate {
    command: String,
    args: Vec<String>,
    options: SpawnOptions,
    timeout: Duration,
    #[cfg(unix)]
    kill_signal: nix::sys::signal::Signal,
}

impl SubprocessPredicate {
    /// Create a new subprocess predicate
    ///
    /// # Arguments
    /// * `command` - Program to run
    /// * `args` - Arguments to the program
    /// * `options` - Spawn options (cwd, env, stdio, kill signal)
    /// * `timeout_ms` - How long one evaluation may run before it is killed
    ///
    /// # Errors
    /// - `ConfigError::InvalidTimeout` if `timeout_ms` is not a positive safe integer
    /// - `ConfigError::InvalidOption` if `options.kill_signal` is not a known signal
    ///
    /// # Example
    /// ```ignore
    /// let predicate = SubprocessPredicate::new(
    ///     "pg_isready",
    ///     vec!["-h".to_string(), "db".to_string()],
    ///     SpawnOptions::default(),
    ///     2000,
    /// )?;
    /// ```
    pub fn new<I, S>(
        command: impl Into<String>,
        args: I,
        options: SpawnOptions,
        timeout_ms: i64,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !is_safe_integer(timeout_ms) {
            return Err(ConfigError::InvalidTimeout(format!(
                "Timeout {} is not a safe integer",
                timeout_ms
            )));
        }
        if timeout_ms <= 0 {
            return Err(ConfigError::InvalidTimeout(format!(
                "Timeout {} should be positive",
                timeout_ms
            )));
        }

        #[cfg(unix)]
        let kill_signal = parse_signal(options.kill_signal.as_deref())?;

        Ok(Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            options,
            timeout: Duration::from_millis(timeout_ms as u64),
            #[cfg(unix)]
            kill_signal,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Build a fresh command for one evaluation
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);

        if let Some(allowlist) = &self.options.env_allowlist {
            cmd.env_clear();
            cmd.envs(filter_env(std::env::vars(), allowlist));
        }
        cmd.envs(&self.options.env);

        if let Some(cwd) = &self.options.cwd {
            cmd.current_dir(cwd);
        }

        match self.options.stdio {
            StdioMode::Null => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
            StdioMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        cmd
    }

    /// Wait for exit, racing the timeout
    ///
    /// Exactly one of the two branches produces the status. A natural exit
    /// wins ties. Returns the status and whether the timeout fired.
    async fn wait_with_timeout(&self, child: &mut Child) -> std::io::Result<(ExitStatus, bool)> {
        let exited = tokio::select! {
            biased;
            status = child.wait() => Some(status?),
            _ = sleep(self.timeout) => None,
        };

        if let Some(status) = exited {
            return Ok((status, false));
        }

        warn!(
            command = %self.command,
            pid = ?child.id(),
            timeout_ms = self.timeout_ms(),
            "Predicate process timed out, terminating"
        );
        self.terminate(child);

        match timeout(KILL_GRACE_PERIOD, child.wait()).await {
            Ok(status) => Ok((status?, true)),
            Err(_) => {
                warn!(
                    command = %self.command,
                    pid = ?child.id(),
                    "Predicate process ignored termination signal, sending SIGKILL"
                );
                child.start_kill()?;
                Ok((child.wait().await?, true))
            }
        }
    }

    /// Send the configured kill signal to a child that has not been reaped
    #[cfg(unix)]
    fn terminate(&self, child: &mut Child) {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // id() is None once the child has been reaped
        let Some(pid) = child.id() else {
            debug!(command = %self.command, "Predicate process already exited");
            return;
        };

        if let Err(e) = kill(Pid::from_raw(pid as i32), self.kill_signal) {
            warn!(pid = %pid, error = %e, "Failed to signal predicate process");
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.start_kill() {
            warn!(pid = ?child.id(), error = %e, "Failed to kill predicate process");
        }
    }

    /// Map an exit status to the predicate result
    fn classify(&self, status: ExitStatus, timed_out: bool) -> Result<bool, PredicateError> {
        // Without signals the forced kill is indistinguishable from an exit code
        #[cfg(not(unix))]
        {
            if timed_out {
                return Err(PredicateError::TimedOut {
                    timeout_ms: self.timeout_ms(),
                    signal: "TerminateProcess".to_string(),
                });
            }
        }

        match status.code() {
            Some(EXIT_CONDITION_MET) => Ok(true),
            Some(EXIT_CONDITION_NOT_MET) => Ok(false),
            Some(code) => Err(PredicateError::ExitCode(code)),
            None => {
                let signal = signal_name(&status);
                if timed_out {
                    Err(PredicateError::TimedOut {
                        timeout_ms: self.timeout_ms(),
                        signal,
                    })
                } else {
                    Err(PredicateError::Interrupted { signal })
                }
            }
        }
    }
}

/// Shorthand for [`SubprocessPredicate::new`]
pub fn spawn_predicate<I, S>(
    command: impl Into<String>,
    args: I,
    options: SpawnOptions,
    timeout_ms: i64,
) -> Result<SubprocessPredicate, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SubprocessPredicate::new(command, args, options, timeout_ms)
}

#[cfg(unix)]
fn parse_signal(name: Option<&str>) -> Result<nix::sys::signal::Signal, ConfigError> {
    use nix::sys::signal::Signal;
    use std::str::FromStr;

    let Some(name) = name else {
        return Ok(Signal::SIGKILL);
    };

    let upper = name.trim().to_ascii_uppercase();
    let canonical = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };

    Signal::from_str(&canonical)
        .map_err(|_| ConfigError::InvalidOption(format!("unknown kill signal {}", name)))
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> String {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(raw) => Signal::try_from(raw)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| format!("signal {}", raw)),
        None => "unknown".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> String {
    "unknown".to_string()
}

#[async_trait]
impl Predicate for SubprocessPredicate {
    async fn evaluate(&self) -> Result<bool, PredicateError> {
        let started = Instant::now();

        let mut child = self.build_command().spawn().map_err(|e| {
            warn!(command = %self.command, error = %e, "Failed to spawn predicate process");
            PredicateError::Spawn(format!("{}: {}", self.command, e))
        })?;

        debug!(
            command = %self.command,
            args = ?self.args,
            pid = ?child.id(),
            timeout_ms = self.timeout_ms(),
            "Spawned predicate process"
        );

        let (status, timed_out) = self
            .wait_with_timeout(&mut child)
            .await
            .map_err(|e| PredicateError::Io(e.to_string()))?;

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = self.classify(status, timed_out);

        info!(
            command = %self.command,
            duration_ms = %duration_ms,
            exit_code = ?status.code(),
            timed_out = timed_out,
            result = ?result.as_ref().map_err(|e| e.to_string()),
            "Predicate process finished"
        );

        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str, timeout_ms: i64) -> SubprocessPredicate {
        SubprocessPredicate::new("sh", ["-c", script], SpawnOptions::default(), timeout_ms).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_timeout() {
        for timeout_ms in [0, -1] {
            let err = spawn_predicate("sleep", ["1"], SpawnOptions::default(), timeout_ms)
                .err()
                .unwrap();
            assert!(err.to_string().contains("should be positive"), "{}", err);
        }
    }

    #[test]
    fn test_rejects_unsafe_timeout() {
        let err = spawn_predicate("sleep", ["1"], SpawnOptions::default(), i64::MAX)
            .err()
            .unwrap();
        assert!(err.to_string().contains("not a safe integer"));
    }

    #[test]
    fn test_rejects_unknown_kill_signal() {
        let options = SpawnOptions::new().kill_signal("SIGBOGUS");
        let err = spawn_predicate("sleep", ["1"], options, 100).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidOption(_)));
    }

    #[test]
    fn test_kill_signal_names() {
        use nix::sys::signal::Signal;
        assert_eq!(parse_signal(None).unwrap(), Signal::SIGKILL);
        assert_eq!(parse_signal(Some("term")).unwrap(), Signal::SIGTERM);
        assert_eq!(parse_signal(Some("SIGINT")).unwrap(), Signal::SIGINT);
    }

    #[tokio::test]
    async fn test_exit_zero_is_true() {
        assert!(sh("exit 0", 1000).evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_exit_one_is_false() {
        assert!(!sh("exit 1", 1000).evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_other_exit_code_is_error() {
        let err = sh("exit 2", 1000).evaluate().await.unwrap_err();
        assert!(matches!(err, PredicateError::ExitCode(2)));
    }

    #[tokio::test]
    async fn test_external_signal_is_interrupted() {
        let err = sh("kill -TERM $$", 1000).evaluate().await.unwrap_err();
        match err {
            PredicateError::Interrupted { signal } => assert_eq!(signal, "SIGTERM"),
            other => panic!("expected Interrupted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let predicate =
            SubprocessPredicate::new("sleep", ["10"], SpawnOptions::default(), 100).unwrap();
        let start = Instant::now();

        let err = predicate.evaluate().await.unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(1), "{:?}", elapsed);
        match err {
            PredicateError::TimedOut { timeout_ms, signal } => {
                assert_eq!(timeout_ms, 100);
                assert_eq!(signal, "SIGKILL");
            }
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_with_custom_signal() {
        let options = SpawnOptions::new().kill_signal("SIGTERM");
        let predicate = SubprocessPredicate::new("sleep", ["10"], options, 100).unwrap();

        let err = predicate.evaluate().await.unwrap_err();
        assert!(matches!(err, PredicateError::TimedOut { ref signal, .. } if signal == "SIGTERM"));
    }

    #[tokio::test]
    async fn test_spawn_error_is_delivered() {
        let predicate = SubprocessPredicate::new(
            "definitely-not-a-real-command-pollster",
            Vec::<String>::new(),
            SpawnOptions::default(),
            1000,
        )
        .unwrap();

        let err = predicate.evaluate().await.unwrap_err();
        assert!(matches!(err, PredicateError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let options = SpawnOptions::new().env("POLLSTER_TEST_VAR", "ready");
        let predicate =
            SubprocessPredicate::new("sh", ["-c", "test \"$POLLSTER_TEST_VAR\" = ready"], options, 1000)
                .unwrap();

        assert!(predicate.evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_env_allowlist_hides_parent_vars() {
        std::env::set_var("POLLSTER_HIDDEN_VAR", "visible");
        let options = SpawnOptions::new().env_allowlist(vec!["PATH".to_string()]);
        let predicate = SubprocessPredicate::new(
            "sh",
            ["-c", "test -z \"$POLLSTER_HIDDEN_VAR\""],
            options,
            1000,
        )
        .unwrap();

        assert!(predicate.evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn test_cwd_is_applied() {
        let dir = std::env::temp_dir().join(format!("pollster-cwd-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("marker"), b"").unwrap();

        let predicate =
            SubprocessPredicate::new("test", ["-f", "marker"], SpawnOptions::new().cwd(&dir), 1000)
                .unwrap();
        let result = predicate.evaluate().await;

        let _ = std::fs::remove_dir_all(&dir);
        assert!(result.unwrap());
    }

    #[tokio::test]
    async fn test_each_evaluation_spawns_fresh_process() {
        let dir = std::env::temp_dir().join(format!("pollster-fresh-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        // Succeeds only on the second run: the first run creates the marker
        let predicate = SubprocessPredicate::new(
            "sh",
            ["-c", "test -f marker && exit 0; touch marker; exit 1"],
            SpawnOptions::new().cwd(&dir),
            1000,
        )
        .unwrap();

        let first = predicate.evaluate().await.unwrap();
        let second = predicate.evaluate().await.unwrap();

        let _ = std::fs::remove_dir_all(&dir);
        assert!(!first);
        assert!(second);
    }
}
