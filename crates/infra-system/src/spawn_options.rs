// Spawn options for predicate subprocesses
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// How the child's stdout/stderr are wired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    /// Discard output (default)
    #[default]
    Null,
    /// Share the parent's stdout/stderr
    Inherit,
}

/// Options passed through to the process spawn
///
/// Deserializable so callers can keep them next to other config, e.g.
/// `{"cwd": "/srv", "env": {"PGHOST": "db"}, "kill_signal": "SIGTERM"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnOptions {
    /// Working directory of the child
    pub cwd: Option<PathBuf>,
    /// Extra environment variables (applied after the allowlist)
    pub env: HashMap<String, String>,
    /// If set, only these parent variables are inherited
    pub env_allowlist: Option<Vec<String>>,
    pub stdio: StdioMode,
    /// Signal sent on timeout (unix only), default SIGKILL
    pub kill_signal: Option<String>,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = Some(allowlist);
        self
    }

    pub fn stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    pub fn kill_signal(mut self, signal: impl Into<String>) -> Self {
        self.kill_signal = Some(signal.into());
        self
    }
}

/// Keep only allowlisted variables
pub(crate) fn filter_env<I>(vars: I, allowlist: &[String]) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(k, _)| allowlist.contains(k))
        .collect()
}
