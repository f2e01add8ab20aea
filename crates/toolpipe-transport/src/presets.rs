//! Ready-made specs for known tool servers.
//!
//! Credentials come from the process environment. A preset fails with
//! [`TransportError::Config`](crate::TransportError::Config) when one is
//! missing, so nothing is spawned without them.

use crate::error::Result;
use crate::subprocess::ProcessSpec;

/// npm package of the ClickUp tool server.
pub const CLICKUP_PACKAGE: &str = "@taazkareem/clickup-mcp-server@latest";

/// Variables the ClickUp server needs.
pub const CLICKUP_ENV_VARS: &[&str] = &["CLICKUP_API_KEY", "CLICKUP_TEAM_ID"];

/// The ClickUp tool server, launched through `npx`.
///
/// # Errors
///
/// Returns a configuration error naming every variable from
/// [`CLICKUP_ENV_VARS`] that is unset or empty.
pub fn clickup() -> Result<ProcessSpec> {
    npx(CLICKUP_PACKAGE, CLICKUP_ENV_VARS)
}

/// Any npm-published stdio tool server, with credentials copied from the
/// environment.
pub fn npx(package: &str, env_vars: &[&str]) -> Result<ProcessSpec> {
    let mut spec = ProcessSpec::new("npx").with_args(["-y", package]);
    for &key in env_vars {
        spec = spec.require_env(key);
        if let Ok(value) = std::env::var(key) {
            spec = spec.with_env(key, value);
        }
    }
    spec.validate()?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn test_clickup_from_env() {
        temp_env::with_vars(
            [
                ("CLICKUP_API_KEY", Some("pk_test")),
                ("CLICKUP_TEAM_ID", Some("9000")),
            ],
            || {
                let spec = clickup().unwrap();
                assert_eq!(spec.program, "npx");
                assert_eq!(spec.args, vec!["-y", CLICKUP_PACKAGE]);
                assert_eq!(spec.env.get("CLICKUP_API_KEY").map(String::as_str), Some("pk_test"));
                assert_eq!(spec.env.get("CLICKUP_TEAM_ID").map(String::as_str), Some("9000"));
            },
        );
    }

    #[test]
    fn test_clickup_missing_credentials() {
        temp_env::with_vars(
            [
                ("CLICKUP_API_KEY", Some("pk_test")),
                ("CLICKUP_TEAM_ID", None::<&str>),
            ],
            || {
                let err = clickup().unwrap_err();
                assert!(matches!(err, TransportError::Config(_)));
                assert!(err.to_string().contains("CLICKUP_TEAM_ID"));
                assert!(!err.to_string().contains("CLICKUP_API_KEY"));
            },
        );
    }
}
