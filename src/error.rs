// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::common::ErrorCode;
use thiserror::Error;

/// An error message that carries Gardener error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorWithCodes {
    pub message: String,
    pub codes: Vec<ErrorCode>,
}

impl ErrorWithCodes {
    pub fn new(message: impl Into<String>, codes: Vec<ErrorCode>) -> Self {
        Self {
            message: message.into(),
            codes,
        }
    }
}

impl std::fmt::Display for ErrorWithCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorWithCodes {}

#[derive(Error, Debug)]
pub enum GardenerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Namespace creation failed: {0}")]
    NamespaceError(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    #[error("{0}")]
    DomainInfo(String),

    #[error("Invalid maintenance time window: {0}")]
    MaintenanceWindow(String),

    #[error("EncryptionConfiguration error: {0}")]
    EncryptionConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    StillReferenced(String),

    #[error("{0}")]
    Actuator(ErrorWithCodes),
}

impl GardenerError {
    /// Returns true if this error is a Kubernetes API 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GardenerError::KubeError(kube::Error::Api(e)) if e.code == 404)
    }

    /// Error codes carried by this error, if any.
    pub fn codes(&self) -> &[ErrorCode] {
        match self {
            GardenerError::Actuator(e) => &e.codes,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, GardenerError>;
