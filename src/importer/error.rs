// ==========================================
// CRM 卡片导入服务 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分级:
// - 请求级（整个请求失败）: PayloadTooLarge / ConfigurationError / 解码与解析错误
// - 行级（记录后继续）: RowProcessing / ReferenceNotFound / AmountParseError
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 上传内容错误 =====
    #[error("上传内容过大: {actual} 字节，上限 {limit} 字节")]
    PayloadTooLarge { actual: usize, limit: usize },

    #[error("数据行过多: {actual} 行，上限 {limit} 行")]
    TooManyRows { actual: usize, limit: usize },

    #[error("上传内容解码失败: {0}")]
    PayloadDecodeError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 配置错误 =====
    #[error("导入配置错误: {0}")]
    ConfigurationError(String),

    #[error("路由规则 #{index} 正则无效: {message}")]
    InvalidRoutingPattern { index: usize, message: String },

    // ===== 行级错误 =====
    #[error("第 {row} 行处理失败: {message}")]
    RowProcessing { row: usize, message: String },

    #[error("{field} 未找到: {value}")]
    ReferenceNotFound { field: String, value: String },

    #[error("金额格式错误 ({field}): {value}")]
    AmountParseError { field: String, value: String },

    // ===== 存储错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为行级错误（可记录后继续处理下一行）
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ImportError::RowProcessing { .. }
                | ImportError::ReferenceNotFound { .. }
                | ImportError::AmountParseError { .. }
                | ImportError::Repository(_)
        )
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<base64::DecodeError>
impl From<base64::DecodeError> for ImportError {
    fn from(err: base64::DecodeError) -> Self {
        ImportError::PayloadDecodeError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_level_classification() {
        assert!(ImportError::RowProcessing {
            row: 1,
            message: "x".to_string()
        }
        .is_row_level());
        assert!(ImportError::Repository(RepositoryError::LockError("x".to_string())).is_row_level());
        assert!(!ImportError::ConfigurationError("x".to_string()).is_row_level());
        assert!(!ImportError::PayloadTooLarge { actual: 2, limit: 1 }.is_row_level());
    }

    #[test]
    fn test_error_messages() {
        let err = ImportError::PayloadTooLarge {
            actual: 11,
            limit: 10,
        };
        assert_eq!(err.to_string(), "上传内容过大: 11 字节，上限 10 字节");
        let err = ImportError::ReferenceNotFound {
            field: "contact".to_string(),
            value: "joao".to_string(),
        };
        assert_eq!(err.to_string(), "contact 未找到: joao");
    }
}
