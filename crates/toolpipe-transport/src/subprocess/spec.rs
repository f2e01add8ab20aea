//! Launch descriptor for a tool-server child process

use super::shutdown::DEFAULT_SHUTDOWN_GRACE;
use crate::error::{Result, TransportError};
use crate::framing::{DEFAULT_MAX_LINE_BYTES, DecodePolicy};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Variables passed through from the parent under [`EnvInheritance::Default`].
#[cfg(unix)]
pub const DEFAULT_INHERITED_ENV_VARS: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

/// Variables passed through from the parent under [`EnvInheritance::Default`].
#[cfg(not(unix))]
pub const DEFAULT_INHERITED_ENV_VARS: &[&str] = &[
    "APPDATA",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PROCESSOR_ARCHITECTURE",
    "SYSTEMDRIVE",
    "SYSTEMROOT",
    "TEMP",
    "USERNAME",
    "USERPROFILE",
];

/// Which part of the parent's environment the child starts from.
///
/// Explicit variables from [`ProcessSpec::env`] are always layered on top.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvInheritance {
    /// Only the variables in [`DEFAULT_INHERITED_ENV_VARS`].
    #[default]
    Default,
    /// The parent's whole environment.
    All,
    /// Nothing; only explicit variables.
    None,
}

/// Where the child's stderr goes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StderrMode {
    /// Share the parent's stderr.
    #[default]
    Inherit,
    /// Discard it.
    Null,
    /// Forward each line to `tracing` at debug level.
    Log,
}

/// Immutable description of how to launch a tool server.
///
/// Built by the caller and handed to
/// [`ProcessSession::start`](super::ProcessSession::start); the transport
/// never modifies it.
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    /// Executable to run
    pub program: String,

    /// Arguments to pass to the executable
    pub args: Vec<String>,

    /// Explicit environment, layered over the inherited variables
    pub env: BTreeMap<String, String>,

    /// What to inherit from the parent environment
    pub inherit_env: EnvInheritance,

    /// Variables that must be present (and non-empty) in the final environment
    pub required_env: Vec<String>,

    /// Working directory; the parent's when unset
    pub cwd: Option<PathBuf>,

    /// How to treat invalid UTF-8 from the child
    pub decode_policy: DecodePolicy,

    /// Where the child's stderr goes
    pub stderr: StderrMode,

    /// Capacity of each message channel
    pub channel_capacity: usize,

    /// Longest line accepted from the child
    pub max_line_bytes: usize,

    /// Upper bound on establishing a session when probing with a supervisor
    pub startup_timeout: Duration,

    /// Pause between SIGTERM and SIGKILL at shutdown
    pub shutdown_grace: Duration,
}

impl ProcessSpec {
    /// Create a spec for `program` with default settings.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            inherit_env: EnvInheritance::Default,
            required_env: Vec::new(),
            cwd: None,
            decode_policy: DecodePolicy::Strict,
            stderr: StderrMode::Inherit,
            channel_capacity: 32,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            startup_timeout: Duration::from_secs(60),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Choose what the child inherits from the parent environment
    pub fn with_env_inheritance(mut self, inherit: EnvInheritance) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Require a variable to be present before spawning
    pub fn require_env(mut self, key: impl Into<String>) -> Self {
        self.required_env.push(key.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the decode policy for child output
    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Set stderr handling
    pub fn with_stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    /// Set the capacity of each message channel
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the longest accepted line
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Set the startup timeout
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The environment the child will see.
    pub fn resolved_env(&self) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = match self.inherit_env {
            EnvInheritance::All => std::env::vars().collect(),
            EnvInheritance::Default => DEFAULT_INHERITED_ENV_VARS
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
                // Values starting with "()" are exported shell functions.
                .filter(|(_, value)| !value.starts_with("()"))
                .collect(),
            EnvInheritance::None => BTreeMap::new(),
        };
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Check the spec before anything is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] for an empty program, a zero channel
    /// capacity, or required variables missing from the final environment.
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(TransportError::Config("program must not be empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(TransportError::Config(
                "channel capacity must be at least 1".to_string(),
            ));
        }

        let env = self.resolved_env();
        let missing: Vec<&str> = self
            .required_env
            .iter()
            .filter(|key| env.get(key.as_str()).is_none_or(|v| v.is_empty()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(TransportError::Config(format!(
                "missing required environment variable(s) for `{}`: {}",
                self.program,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        // Start from a clean slate; only the resolved variables are passed.
        cmd.env_clear();
        cmd.envs(self.resolved_env());

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(match self.stderr {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Null => Stdio::null(),
            StderrMode::Log => Stdio::piped(),
        });
        cmd.kill_on_drop(true);
        // The child leads its own process group; shutdown signals the group.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_spec_defaults() {
        let spec = ProcessSpec::new("npx");
        assert_eq!(spec.program, "npx");
        assert!(spec.args.is_empty());
        assert_eq!(spec.inherit_env, EnvInheritance::Default);
        assert_eq!(spec.startup_timeout, Duration::from_secs(60));
        assert_eq!(spec.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
    }

    #[test]
    fn test_process_spec_builder() {
        let spec = ProcessSpec::new("my-server")
            .with_args(["-y", "pkg"])
            .with_arg("--verbose")
            .with_env("API_KEY", "k-123")
            .with_cwd("/tmp")
            .with_stderr(StderrMode::Null)
            .with_shutdown_grace(Duration::from_millis(20));

        assert_eq!(spec.args, vec!["-y", "pkg", "--verbose"]);
        assert_eq!(spec.env.get("API_KEY"), Some(&"k-123".to_string()));
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(spec.stderr, StderrMode::Null);
        assert_eq!(spec.shutdown_grace, Duration::from_millis(20));
    }

    #[test]
    fn test_explicit_env_overlays_inherited() {
        temp_env::with_vars([("PATH", Some("/usr/bin")), ("TOOLPIPE_SECRET", Some("x"))], || {
            let spec = ProcessSpec::new("srv").with_env("PATH", "/opt/bin");
            let env = spec.resolved_env();
            assert_eq!(env.get("PATH").map(String::as_str), Some("/opt/bin"));
            // Not on the allow-list.
            assert!(!env.contains_key("TOOLPIPE_SECRET"));

            let env = spec
                .clone()
                .with_env_inheritance(EnvInheritance::All)
                .resolved_env();
            assert_eq!(env.get("TOOLPIPE_SECRET").map(String::as_str), Some("x"));

            let env = spec
                .with_env_inheritance(EnvInheritance::None)
                .resolved_env();
            assert_eq!(env.len(), 1);
        });
    }

    #[test]
    fn test_validate_reports_every_missing_key() {
        let spec = ProcessSpec::new("srv")
            .require_env("TOOLPIPE_TEST_KEY")
            .require_env("TOOLPIPE_TEST_TEAM")
            .with_env("TOOLPIPE_TEST_TEAM", "");

        let err = spec.validate().unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, TransportError::Config(_)));
        assert!(text.contains("TOOLPIPE_TEST_KEY"));
        assert!(text.contains("TOOLPIPE_TEST_TEAM"));

        let spec = spec
            .with_env("TOOLPIPE_TEST_KEY", "k")
            .with_env("TOOLPIPE_TEST_TEAM", "t");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_program_and_zero_capacity() {
        assert!(ProcessSpec::new("  ").validate().is_err());
        assert!(
            ProcessSpec::new("srv")
                .with_channel_capacity(0)
                .validate()
                .is_err()
        );
    }
}
