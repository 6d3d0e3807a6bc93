#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for site deployers.
//!
//! A deployer receives its configuration as a flat string map
//! ([`DeployParams`]), describes itself through a [`DeployerDefinition`],
//! and reports the outcome of a deploy as a single [`DeployResult`]. The
//! host never sees a raw error: every failure is folded into
//! [`DeployResult::Failure`].

pub mod progress;

use std::collections::BTreeMap;

use serde::Serialize;

/// Deployer configuration, keyed by field name (e.g. `"BucketName"`).
pub type DeployParams = BTreeMap<String, String>;

/// Boxed error carried as the cause of a failed deploy.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Values accepted as "on" for boolean-ish string fields, compared
/// case-insensitively.
const TRUTHY_VALUES: &[&str] = &["y", "yes", "true", "empty"];

/// Returns `true` if `value` is one of the recognised truthy strings
/// (`y`, `yes`, `true`, `empty`, any case).
///
/// Anything else is falsy, including the empty string and values with
/// surrounding whitespace.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    TRUTHY_VALUES
        .iter()
        .any(|truthy| truthy.eq_ignore_ascii_case(value))
}

/// Reads an optional boolean-ish field from `params`. Absent means `false`.
#[must_use]
pub fn param_flag(params: &DeployParams, name: &str) -> bool {
    params.get(name).is_some_and(|value| is_truthy(value))
}

/// Reads an optional string field, treating blank values as absent.
#[must_use]
pub fn param_optional<'a>(params: &'a DeployParams, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// A configuration field a deployer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    /// Key in [`DeployParams`].
    pub name: &'static str,
    /// Whether a deployer cannot be constructed without it.
    pub required: bool,
    /// Whether the value must be masked when displayed.
    pub secret: bool,
    /// Whether a truthy value makes the deploy delete existing content.
    pub destructive: bool,
}

impl FieldDefinition {
    /// A required, non-secret field.
    #[must_use]
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            secret: false,
            destructive: false,
        }
    }

    /// A required field whose value is a credential.
    #[must_use]
    pub const fn secret(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            secret: true,
            destructive: false,
        }
    }

    /// An optional, non-secret field.
    #[must_use]
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            secret: false,
            destructive: false,
        }
    }

    /// An optional flag that, when truthy, deletes existing content.
    #[must_use]
    pub const fn destructive(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            secret: false,
            destructive: true,
        }
    }
}

/// Static description of a deployer, shown to users choosing a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeployerDefinition {
    /// Registry key (e.g. `"awss3"`).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description of what a deploy does.
    pub help: &'static str,
    /// Configuration fields, in display order.
    pub fields: &'static [FieldDefinition],
}

impl DeployerDefinition {
    /// Iterates over the names of required fields.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Terminal outcome of a deploy.
#[derive(Debug)]
pub enum DeployResult {
    /// Everything requested was done.
    Success {
        /// Informational message for the host.
        message: String,
    },
    /// The deploy stopped. If an erase was requested the bucket contents
    /// are indeterminate: nothing is rolled back.
    Failure {
        /// Informational message for the host.
        message: String,
        /// Underlying error, when there is one.
        cause: Option<BoxedError>,
    },
}

impl DeployResult {
    /// Creates a success result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    /// Creates a failure result with no underlying cause.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a failure result wrapping `cause`.
    #[must_use]
    pub fn failure_with(message: impl Into<String>, cause: impl Into<BoxedError>) -> Self {
        Self::Failure {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Returns `true` for [`DeployResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the informational message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message } | Self::Failure { message, .. } => message,
        }
    }

    /// Returns the underlying cause of a failure, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { cause, .. } => cause.as_deref(),
        }
    }
}

impl std::fmt::Display for DeployResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { message } | Self::Failure { message, cause: None } => {
                f.write_str(message)
            }
            Self::Failure {
                message,
                cause: Some(cause),
            } => write!(f, "{message} {cause}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_enable_flag() {
        for value in ["Y", "y", "yes", "YES", "TRUE", "true", "empty", "Empty"] {
            assert!(is_truthy(value), "{value:?} should be truthy");
        }
    }

    #[test]
    fn other_values_are_falsy() {
        for value in [
            "", " ", "no", "0", "1", "maybe", "false", "emptybucket", " yes ", "true\n",
        ] {
            assert!(!is_truthy(value), "{value:?} should be falsy");
        }
    }

    #[test]
    fn absent_flag_is_false() {
        let mut params = DeployParams::new();
        assert!(!param_flag(&params, "EmptyBucket"));

        params.insert("EmptyBucket".to_string(), "Yes".to_string());
        assert!(param_flag(&params, "EmptyBucket"));
    }

    #[test]
    fn blank_optional_param_is_absent() {
        let mut params = DeployParams::new();
        params.insert("Endpoint".to_string(), "   ".to_string());
        assert_eq!(param_optional(&params, "Endpoint"), None);

        params.insert("Endpoint".to_string(), " http://localhost:4566 ".to_string());
        assert_eq!(
            param_optional(&params, "Endpoint"),
            Some("http://localhost:4566")
        );
    }

    #[test]
    fn failure_display_includes_cause() {
        let result = DeployResult::failure_with("Upload failed.", "connection reset");
        assert!(!result.is_success());
        assert_eq!(result.to_string(), "Upload failed. connection reset");
        assert_eq!(result.cause().map(ToString::to_string).as_deref(), Some("connection reset"));
    }

    #[test]
    fn success_has_no_cause() {
        let result = DeployResult::success("done");
        assert!(result.is_success());
        assert_eq!(result.message(), "done");
        assert!(result.cause().is_none());
    }
}
