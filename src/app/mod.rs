// ==========================================
// CRM 卡片导入服务 - 应用层
// ==========================================
// 职责: HTTP 服务集成,连接调用方与导入API
// ==========================================

pub mod http;
pub mod state;

// 重导出
pub use http::{build_cors, configure, start_server, ServerSettings};
pub use state::{get_default_db_path, AppState};
