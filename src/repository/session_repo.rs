// ==========================================
// CRM 卡片导入服务 - 会话仓储
// ==========================================
// 职责: 鉴权 token → 租户 (client_id) 解析
// 红线: 只做查询，不缓存，不持有任何“当前租户”状态
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

/// 会话信息
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub client_id: String,
    pub user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionInfo {
    /// 会话是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

// ==========================================
// SessionRepository - 会话仓储
// ==========================================
pub struct SessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SessionRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| {
            RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e))
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 token 查询会话
    ///
    /// # 返回
    /// - Ok(Some(SessionInfo)): 找到（是否过期由调用方判断）
    /// - Ok(None): token 不存在
    pub fn find_by_token(&self, token: &str) -> RepositoryResult<Option<SessionInfo>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT client_id, user_id, expires_at FROM api_sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((client_id, user_id, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = match expires_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| RepositoryError::FieldValueError {
                        field: "expires_at".to_string(),
                        message: e.to_string(),
                    })?,
            ),
            None => None,
        };

        Ok(Some(SessionInfo {
            client_id,
            user_id,
            expires_at,
        }))
    }

    /// 登记会话（供运维脚本与测试使用）
    pub fn insert_session(
        &self,
        token: &str,
        client_id: &str,
        user_id: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO api_sessions (token, client_id, user_id, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![token, client_id, user_id, expires_at.map(|d| d.to_rfc3339())],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use chrono::Duration;

    fn setup() -> SessionRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SessionRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_find_by_token() {
        let repo = setup();
        repo.insert_session("tok-1", "acme", Some("u-1"), None).unwrap();

        let session = repo.find_by_token("tok-1").unwrap().unwrap();
        assert_eq!(session.client_id, "acme");
        assert_eq!(session.user_id.as_deref(), Some("u-1"));
        assert!(!session.is_expired(Utc::now()));
        assert!(repo.find_by_token("nope").unwrap().is_none());
    }

    #[test]
    fn test_expired_session() {
        let repo = setup();
        let past = Utc::now() - Duration::hours(1);
        repo.insert_session("tok-old", "acme", None, Some(past)).unwrap();
        let session = repo.find_by_token("tok-old").unwrap().unwrap();
        assert!(session.is_expired(Utc::now()));
    }

    #[test]
    fn test_unopenable_path_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("missing").join("sessions.db");

        let err = SessionRepository::new(db_path.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, RepositoryError::DatabaseConnectionError(_)));
    }
}
