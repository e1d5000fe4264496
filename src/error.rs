use thiserror::Error;

pub type Result<T> = std::result::Result<T, HierarchyError>;

/// Errors surfaced by the hierarchy services.
///
/// Per-item failures inside a recursive operation never show up here; those
/// are collected as [`crate::recursive::RecursiveOperationError`]s. A
/// `HierarchyError` means the whole call failed.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HierarchyError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unauthorized(_) => 403,
            Self::InvalidInput(_) => 400,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for HierarchyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("ancestor cache payload"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_covers_every_variant() {
        assert_eq!(HierarchyError::NotFound("x".into()).http_status(), 404);
        assert_eq!(HierarchyError::Unauthorized("x".into()).http_status(), 403);
        assert_eq!(HierarchyError::InvalidInput("x".into()).http_status(), 400);
        assert_eq!(HierarchyError::Conflict("x".into()).http_status(), 409);
        assert_eq!(
            HierarchyError::Internal(anyhow::anyhow!("boom")).http_status(),
            500
        );
    }

    #[test]
    fn display_not_found() {
        let e = HierarchyError::NotFound("collection col-1".into());
        assert_eq!(e.to_string(), "not found: collection col-1");
    }

    #[test]
    fn display_conflict() {
        let e = HierarchyError::Conflict("cycle".into());
        assert_eq!(e.to_string(), "conflict: cycle");
    }

    #[test]
    fn serde_errors_become_internal() {
        let parse_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let e: HierarchyError = parse_err.into();
        assert_eq!(e.http_status(), 500);
        assert!(e.to_string().starts_with("internal: ancestor cache payload"));
    }
}
