// ==========================================
// CRM 卡片导入服务 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::importer::CardImporterImpl;
use crate::repository::{CardImportRepositoryImpl, SessionRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源，在 HTTP 服务中作为 web::Data 共享
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 卡片导入API
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化 schema（幂等）
    /// 2. 初始化所有Repository（共享同一连接）
    /// 3. 创建导入器与API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let card_repo = CardImportRepositoryImpl::from_connection(conn.clone());
        let sessions = Arc::new(SessionRepository::from_connection(conn.clone()));
        let importer_config = ConfigManager::from_connection(conn)
            .map_err(|e| format!("无法初始化ConfigManager: {}", e))?;

        // ==========================================
        // 初始化API层
        // ==========================================
        let importer = Arc::new(CardImporterImpl::with_default_components(
            card_repo,
            importer_config,
        ));
        let import_api = Arc::new(ImportApi::new(importer, sessions));

        tracing::info!("AppState初始化完成");

        Ok(Self { db_path, import_api })
    }
}

/// 获取默认数据库路径
///
/// # 优先级
/// 1. 环境变量 CRM_IMPORT_DB_PATH
/// 2. 用户数据目录下的 crm-card-import/crm_card_import.db
/// 3. 当前目录 ./crm_card_import.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CRM_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./crm_card_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("crm-card-import");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("crm_card_import.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_initializes_schema() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);

        let conn = open_sqlite_connection(&db_path).unwrap();
        let version = crate::db::read_schema_version(&conn).unwrap();
        assert_eq!(version, Some(crate::db::CURRENT_SCHEMA_VERSION));
    }
}
