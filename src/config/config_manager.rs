// ==========================================
// CRM 卡片导入服务 - 配置管理器
// ==========================================
// 职责: 配置查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 作用域: tenant/<client_id> 优先，其次 global
// ==========================================

use crate::config::import_config_trait::{ImportConfigReader, HARD_MAX_PAYLOAD_BYTES};
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| {
            RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e))
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取指定作用域的配置值
    fn get_scoped_value(&self, scope_id: &str, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope_id, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取配置值（租户作用域优先，其次 global）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 两个作用域均未配置
    pub fn get_config_value(&self, client_id: &str, key: &str) -> RepositoryResult<Option<String>> {
        let tenant_scope = ConfigScope::Tenant {
            client_id: client_id.to_string(),
        };
        if let Some(v) = self.get_scoped_value(&tenant_scope.scope_id(), key)? {
            return Ok(Some(v));
        }
        self.get_scoped_value(&ConfigScope::Global.scope_id(), key)
    }

    /// 读取 usize 配置，缺失或非法时回退默认值
    fn get_usize_or_default(&self, client_id: &str, key: &str, default: usize) -> RepositoryResult<usize> {
        let value = self.get_config_value(client_id, key)?;
        Ok(value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default))
    }

    /// 写入配置值（作用域不存在时自动创建）
    pub fn set_config_value(&self, scope: &ConfigScope, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let scope_id = scope.scope_id();
        conn.execute(
            r#"
            INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
            VALUES (?1, ?2, ?3)
            "#,
            params![scope_id, scope.scope_type(), scope.scope_key()],
        )?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![scope_id, key, value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_payload_bytes(&self, client_id: &str) -> RepositoryResult<usize> {
        let value = self.get_usize_or_default(
            client_id,
            config_keys::MAX_PAYLOAD_BYTES,
            HARD_MAX_PAYLOAD_BYTES,
        )?;
        Ok(value.min(HARD_MAX_PAYLOAD_BYTES))
    }

    async fn get_default_batch_size(&self, client_id: &str) -> RepositoryResult<usize> {
        self.get_usize_or_default(client_id, config_keys::DEFAULT_BATCH_SIZE, 100)
    }

    async fn get_max_rows(&self, client_id: &str) -> RepositoryResult<usize> {
        self.get_usize_or_default(client_id, config_keys::MAX_ROWS, 50_000)
    }

    async fn get_regex_max_pattern_len(&self, client_id: &str) -> RepositoryResult<usize> {
        self.get_usize_or_default(client_id, config_keys::REGEX_MAX_PATTERN_LEN, 512)
    }

    async fn get_regex_size_limit(&self, client_id: &str) -> RepositoryResult<usize> {
        self.get_usize_or_default(client_id, config_keys::REGEX_SIZE_LIMIT, 1024 * 1024)
    }
}

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,                        // 全局
    Tenant { client_id: String },  // 租户
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant { client_id } => format!("tenant/{}", client_id),
        }
    }

    fn scope_type(&self) -> &'static str {
        match self {
            ConfigScope::Global => "GLOBAL",
            ConfigScope::Tenant { .. } => "TENANT",
        }
    }

    fn scope_key(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant { client_id } => client_id.clone(),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 上传限制
    pub const MAX_PAYLOAD_BYTES: &str = "import.max_payload_bytes";
    pub const MAX_ROWS: &str = "import.max_rows";

    // 分批
    pub const DEFAULT_BATCH_SIZE: &str = "import.default_batch_size";

    // 路由正则
    pub const REGEX_MAX_PATTERN_LEN: &str = "import.regex_max_pattern_len";
    pub const REGEX_SIZE_LIMIT: &str = "import.regex_size_limit";
}
