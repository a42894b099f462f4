// ==========================================
// CRM 卡片导入服务 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod card_import_repo;
pub mod card_import_repo_impl;
pub mod error;
pub mod session_repo;

// 重导出核心仓储
pub use card_import_repo::CardImportRepository;
pub use card_import_repo_impl::CardImportRepositoryImpl;
pub use error::{RepositoryError, RepositoryResult};
pub use session_repo::{SessionInfo, SessionRepository};
