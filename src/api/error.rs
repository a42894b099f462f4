// ==========================================
// CRM 卡片导入服务 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将导入/仓储错误转换为对外错误
// 对外格式: { success: false, error: <消息>, code: <类别> }
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 鉴权错误
    // ==========================================
    #[error("{0}")]
    Unauthorized(String),

    // ==========================================
    // 请求错误
    // ==========================================
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    ConfigurationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误类别（响应体 code 字段）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InvalidInput(_) => "INVALID_PAYLOAD",
            ApiError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::Unauthorized(_) => 401,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::InvalidInput(_) | ApiError::ConfigurationError(_) => 400,
            ApiError::NotFound(_) => 404,
            _ => 500,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::NotNullViolation(msg) => {
                ApiError::DatabaseError(format!("非空约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            e @ (ImportError::PayloadTooLarge { .. } | ImportError::TooManyRows { .. }) => {
                ApiError::PayloadTooLarge(e.to_string())
            }
            e @ (ImportError::PayloadDecodeError(_) | ImportError::CsvParseError(_)) => {
                ApiError::InvalidInput(e.to_string())
            }
            e @ (ImportError::ConfigurationError(_) | ImportError::InvalidRoutingPattern { .. }) => {
                ApiError::ConfigurationError(e.to_string())
            }
            // 行级错误正常情况下不会越过导入器，这里按输入错误兜底
            e @ (ImportError::RowProcessing { .. }
            | ImportError::ReferenceNotFound { .. }
            | ImportError::AmountParseError { .. }) => ApiError::InvalidInput(e.to_string()),
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_mapping() {
        let err: ApiError = ImportError::PayloadTooLarge {
            actual: 11,
            limit: 10,
        }
        .into();
        assert_eq!(err.http_status(), 413);
        assert_eq!(err.code(), "PAYLOAD_TOO_LARGE");
        assert!(err.to_string().contains("11"));

        let err: ApiError = ImportError::ConfigurationError("缺少 flowId".to_string()).into();
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "CONFIGURATION_ERROR");

        let err: ApiError = ImportError::InvalidRoutingPattern {
            index: 0,
            message: "x".to_string(),
        }
        .into();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");

        let err: ApiError = ImportError::PayloadDecodeError("bad".to_string()).into();
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "INVALID_PAYLOAD");
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: ApiError =
            ImportError::Repository(RepositoryError::LockError("poisoned".to_string())).into();
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code(), "DATABASE_ERROR");

        let err: ApiError = RepositoryError::InternalError("x".to_string()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_unauthorized() {
        let err = ApiError::Unauthorized("缺少鉴权 token".to_string());
        assert_eq!(err.http_status(), 401);
        assert_eq!(err.to_string(), "缺少鉴权 token");
    }
}
