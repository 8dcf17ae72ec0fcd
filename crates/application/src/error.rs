use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::hub::HubError;
use crate::kv::KvError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("key-value backend error: {0}")]
    KeyValue(#[from] KvError),
    #[error("notification hub error: {0}")]
    Hub(#[from] HubError),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    /// 创建基础设施错误
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    /// 是否为资源不存在错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::ResourceNotFound { .. })
                | ApplicationError::Repository(RepositoryError::NotFound)
        )
    }

    /// 是否为权限不足错误
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::PermissionDenied { .. })
        )
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
