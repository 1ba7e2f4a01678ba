//! Config validation
//!
//! Field rules live on the config types as `validator` attributes. This
//! module runs them and flattens the nested error tree into dotted paths
//! such as `clock.queue_capacity`.

use contracts::{CaptureConfig, ContractError};
use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Key used by `validator` for struct-level (schema) errors
const SCHEMA_KEY: &str = "__all__";

/// One failed rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

/// Every failed rule, sorted by field path
pub fn issues(config: &CaptureConfig) -> Vec<ConfigIssue> {
    let Err(errors) = config.validate() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    collect(&errors, "", &mut out);
    out.sort();
    out
}

/// First failed rule as an error
pub fn validate(config: &CaptureConfig) -> Result<(), ContractError> {
    match issues(config).into_iter().next() {
        Some(issue) => Err(ContractError::config_validation(issue.field, issue.message)),
        None => Ok(()),
    }
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<ConfigIssue>) {
    for (field, kind) in errors.errors() {
        let path = join(prefix, field);
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|e| ConfigIssue {
                    field: path.clone(),
                    message: describe(e),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect(inner, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

fn join(prefix: &str, field: &str) -> String {
    match (prefix.is_empty(), field == SCHEMA_KEY) {
        (true, true) => "config".to_string(),
        (false, true) => prefix.to_string(),
        (true, false) => field.to_string(),
        (false, false) => format!("{prefix}.{field}"),
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let param = |name: &str| error.params.get(name).map(|v| v.to_string());
    match (error.code.as_ref(), param("min"), param("max"), param("value")) {
        ("range", Some(min), Some(max), Some(value)) => {
            format!("must be between {min} and {max}, got {value}")
        }
        (code, ..) => format!("failed '{code}' check"),
    }
}
