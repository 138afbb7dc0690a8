use replication_core::contract::{CopyFailure, CopyFailureKind, ObjectRecord};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    #[error("invalid copy parameters: {0}")]
    Validation(String),
    #[error("copy rejected by storage service: {0}")]
    Service(String),
}

impl CopyError {
    pub fn kind(&self) -> CopyFailureKind {
        match self {
            Self::Validation(_) => CopyFailureKind::Validation,
            Self::Service(_) => CopyFailureKind::Service,
        }
    }
}

impl From<CopyError> for CopyFailure {
    fn from(error: CopyError) -> Self {
        CopyFailure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest<'a> {
    pub source_bucket: &'a str,
    pub source: &'a ObjectRecord,
    pub destination_bucket: &'a str,
    pub destination_key: &'a str,
}

pub trait ObjectCopier {
    fn copy_object(&self, request: &CopyRequest<'_>) -> Result<(), CopyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_error_maps_onto_failure_kind() {
        let failure: CopyFailure = CopyError::Validation("empty key".to_string()).into();
        assert_eq!(failure.kind, CopyFailureKind::Validation);
        assert_eq!(failure.message, "invalid copy parameters: empty key");

        let failure: CopyFailure = CopyError::Service("SlowDown".to_string()).into();
        assert_eq!(failure.kind, CopyFailureKind::Service);
    }
}
