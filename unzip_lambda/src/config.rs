use std::env;

use aws_sdk_s3::types::ObjectCannedAcl;

use crate::error::UnpackError;

pub const DEFAULT_FALLBACK_CONTENT_TYPE: &str = "binary/octet-stream";

/// What the handler does when a record or an upload fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log every failure and report success to the runtime.
    #[default]
    Swallow,
    /// Fail the invocation so the platform can retry the event.
    Propagate,
}

impl ErrorPolicy {
    const CHOICES: [&'static str; 2] = ["swallow", "propagate"];

    fn parse(value: &str) -> Result<Self, UnpackError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "swallow" => Ok(Self::Swallow),
            "propagate" => Ok(Self::Propagate),
            _ => Err(UnpackError::UnknownParameter {
                param: "ERROR_POLICY".to_string(),
                value: value.to_string(),
                choices: Self::CHOICES.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }
}

/// Settings read from the function's environment on every invocation.
#[derive(Debug, Clone)]
pub struct UnpackConfig {
    pub backup_folder: Option<String>,
    pub error_policy: ErrorPolicy,
    pub upload_acl: ObjectCannedAcl,
    pub fallback_content_type: String,
}

impl Default for UnpackConfig {
    fn default() -> Self {
        Self {
            backup_folder: None,
            error_policy: ErrorPolicy::default(),
            upload_acl: ObjectCannedAcl::PublicRead,
            fallback_content_type: DEFAULT_FALLBACK_CONTENT_TYPE.to_string(),
        }
    }
}

impl UnpackConfig {
    pub fn from_env() -> Result<Self, UnpackError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, UnpackError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backup_folder = non_empty("BACKUP_FOLDER_NAME").or_else(|| non_empty("backupfoldername"));
        let error_policy = match non_empty("ERROR_POLICY") {
            Some(value) => ErrorPolicy::parse(&value)?,
            None => ErrorPolicy::default(),
        };
        let upload_acl = match non_empty("UPLOAD_ACL") {
            Some(value) => parse_acl(&value)?,
            None => ObjectCannedAcl::PublicRead,
        };
        let fallback_content_type = non_empty("FALLBACK_CONTENT_TYPE")
            .unwrap_or_else(|| DEFAULT_FALLBACK_CONTENT_TYPE.to_string());

        Ok(Self {
            backup_folder,
            error_policy,
            upload_acl,
            fallback_content_type,
        })
    }
}

fn parse_acl(value: &str) -> Result<ObjectCannedAcl, UnpackError> {
    let choices = ObjectCannedAcl::values();
    if choices.iter().any(|choice| *choice == value) {
        Ok(ObjectCannedAcl::from(value))
    } else {
        Err(UnpackError::UnknownParameter {
            param: "UPLOAD_ACL".to_string(),
            value: value.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
        })
    }
}
