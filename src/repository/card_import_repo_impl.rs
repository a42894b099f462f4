// ==========================================
// CRM 卡片导入服务 - 卡片导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::card::{FieldDefinition, NewCard, NewFieldDefinition, Step};
use crate::domain::types::{FieldType, ReferenceKind};
use crate::repository::card_import_repo::CardImportRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// 名称比较用的大小写折叠（SQLite lower() 只处理 ASCII）
fn fold_case(value: &str) -> String {
    value.trim().to_lowercase()
}

// ==========================================
// CardImportRepositoryImpl
// ==========================================
pub struct CardImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CardImportRepositoryImpl {
    /// 创建新的 Repository 实例
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

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_field_definition(row: &Row) -> rusqlite::Result<FieldDefinition> {
        let field_type: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        Ok(FieldDefinition {
            id: row.get(0)?,
            client_id: row.get(1)?,
            step_id: row.get(2)?,
            name: row.get(3)?,
            field_type: FieldType::from_db_str(&field_type),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// 在事务中写入卡片及其附属数据
    fn insert_card_tx(tx: &Transaction, client_id: &str, card: &NewCard) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO cards (
                id, client_id, flow_id, step_id, title, amount, product,
                contact_id, company_id, lead_id, assignee_id, team_id,
                import_batch_id, source_row, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                card.id,
                client_id,
                card.flow_id,
                card.step_id,
                card.title,
                card.amount,
                card.product,
                card.contact_id,
                card.company_id,
                card.lead_id,
                card.assignee_id,
                card.team_id,
                card.import_batch_id,
                card.source_row as i64,
                card.created_at.to_rfc3339(),
            ],
        )?;

        if !card.field_values.is_empty() {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO card_field_values (card_id, field_id, client_id, value)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(card_id, field_id) DO UPDATE SET value = excluded.value
                "#,
            )?;
            for fv in &card.field_values {
                stmt.execute(params![card.id, fv.field_id, client_id, fv.value])?;
            }
        }

        if let Some(item) = &card.line_item {
            tx.execute(
                r#"
                INSERT INTO card_items (id, card_id, item_id, client_id, amount, quantity)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    card.id,
                    item.item_id,
                    client_id,
                    item.amount,
                    item.quantity,
                ],
            )?;
        }

        Ok(())
    }
}

#[async_trait]
impl CardImportRepository for CardImportRepositoryImpl {
    async fn flow_exists(&self, client_id: &str, flow_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM flows WHERE client_id = ?1 AND id = ?2",
                params![client_id, flow_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    async fn list_steps(&self, client_id: &str, flow_id: &str) -> RepositoryResult<Vec<Step>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, client_id, flow_id, name, position
            FROM steps
            WHERE client_id = ?1 AND flow_id = ?2
            ORDER BY position, id
            "#,
        )?;
        let steps = stmt
            .query_map(params![client_id, flow_id], |row| {
                Ok(Step {
                    id: row.get(0)?,
                    client_id: row.get(1)?,
                    flow_id: row.get(2)?,
                    name: row.get(3)?,
                    position: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(steps)
    }

    async fn list_field_definitions(
        &self,
        client_id: &str,
        step_id: &str,
    ) -> RepositoryResult<Vec<FieldDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, client_id, step_id, name, field_type, created_at
            FROM field_definitions
            WHERE client_id = ?1 AND step_id = ?2
            ORDER BY created_at, id
            "#,
        )?;
        let fields = stmt
            .query_map(params![client_id, step_id], Self::map_field_definition)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fields)
    }

    async fn find_field_by_name(
        &self,
        client_id: &str,
        step_id: &str,
        name: &str,
    ) -> RepositoryResult<Option<FieldDefinition>> {
        let wanted = fold_case(name);
        let fields = self.list_field_definitions(client_id, step_id).await?;
        Ok(fields.into_iter().find(|f| fold_case(&f.name) == wanted))
    }

    async fn create_field_definition(
        &self,
        client_id: &str,
        field: NewFieldDefinition,
    ) -> RepositoryResult<FieldDefinition> {
        let created = FieldDefinition {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            step_id: field.step_id,
            name: field.name,
            field_type: field.field_type,
            created_at: Utc::now(),
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO field_definitions (id, client_id, step_id, name, field_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                created.id,
                created.client_id,
                created.step_id,
                created.name,
                created.field_type.to_db_str(),
                created.created_at.to_rfc3339(),
            ],
        )?;
        Ok(created)
    }

    async fn catalog_item_exists(&self, client_id: &str, item_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM catalog_items WHERE client_id = ?1 AND id = ?2",
                params![client_id, item_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    async fn resolve_reference(
        &self,
        client_id: &str,
        kind: ReferenceKind,
        value: &str,
    ) -> RepositoryResult<Option<String>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }

        // 表名/列名来自枚举常量，不来自用户输入
        let alternate = kind.alternate_column().unwrap_or("NULL");
        let sql = format!(
            "SELECT id, name, {} FROM {} WHERE client_id = ?1 ORDER BY id",
            alternate,
            kind.table()
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(params![client_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // id 精确匹配优先，其次 name / email（Unicode 大小写不敏感）
        if let Some((id, _, _)) = candidates.iter().find(|(id, _, _)| id == value) {
            return Ok(Some(id.clone()));
        }
        let wanted = fold_case(value);
        let id = candidates
            .into_iter()
            .find(|(_, name, alt)| {
                fold_case(name) == wanted || alt.as_deref().map(fold_case).as_ref() == Some(&wanted)
            })
            .map(|(id, _, _)| id);
        Ok(id)
    }

    async fn insert_card(&self, client_id: &str, card: NewCard) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::insert_card_tx(&tx, client_id, &card)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(card.id)
    }

    async fn count_cards(&self, client_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cards WHERE client_id = ?1",
            params![client_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
