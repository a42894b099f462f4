// ==========================================
// CRM 卡片导入服务 - 自动建字段登记表
// ==========================================
// 职责: 单次导入内「未映射列 → 字段定义」的记忆表
// 规则:
// - 每个列只解析一次，后续行直接复用
// - 目标阶段已有同名字段时复用，不计入新建
// - 作用域为一次导入调用，不跨请求共享
// ==========================================

use crate::domain::card::{FieldDefinition, NewFieldDefinition};
use crate::domain::import::CreatedField;
use crate::domain::types::FieldType;
use crate::importer::error::ImportResult;
use crate::repository::CardImportRepository;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct FieldRegistry {
    by_column: HashMap<usize, FieldDefinition>,
    created: Vec<CreatedField>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: usize) -> Option<&FieldDefinition> {
        self.by_column.get(&column)
    }

    /// 获取（或创建）某列对应的字段定义
    ///
    /// # 参数
    /// - column: 列位置
    /// - name: 字段名（列标签）
    /// - step_id: 新字段归属阶段
    /// - field_type: 新字段类型
    pub async fn ensure_field<R>(
        &mut self,
        repo: &R,
        client_id: &str,
        column: usize,
        name: &str,
        step_id: &str,
        field_type: FieldType,
    ) -> ImportResult<FieldDefinition>
    where
        R: CardImportRepository + ?Sized,
    {
        if let Some(field) = self.by_column.get(&column) {
            return Ok(field.clone());
        }

        if let Some(existing) = repo.find_field_by_name(client_id, step_id, name).await? {
            debug!(column = column, field_id = %existing.id, "复用已有字段定义");
            self.by_column.insert(column, existing.clone());
            return Ok(existing);
        }

        let created = repo
            .create_field_definition(
                client_id,
                NewFieldDefinition {
                    step_id: step_id.to_string(),
                    name: name.to_string(),
                    field_type,
                },
            )
            .await?;
        debug!(column = column, field_id = %created.id, field_type = %field_type, "新建字段定义");

        self.created.push(CreatedField {
            id: created.id.clone(),
            name: created.name.clone(),
            column: name.to_string(),
            field_type: created.field_type,
            step_id: created.step_id.clone(),
        });
        self.by_column.insert(column, created.clone());
        Ok(created)
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn into_created(self) -> Vec<CreatedField> {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::repository::CardImportRepositoryImpl;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn setup() -> CardImportRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO flows (id, client_id, name) VALUES ('flow-1', 'acme', 'Vendas');
            INSERT INTO steps (id, client_id, flow_id, name, position)
                VALUES ('step-1', 'acme', 'flow-1', 'Lead', 1);
            INSERT INTO field_definitions (id, client_id, step_id, name, field_type, created_at)
                VALUES ('f-existing', 'acme', 'step-1', 'Origem', 'text', '2024-01-01T00:00:00+00:00');
            "#,
        )
        .unwrap();
        CardImportRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_field_created_once_per_column() {
        let repo = setup();
        let mut registry = FieldRegistry::new();

        let first = registry
            .ensure_field(&repo, "acme", 3, "Segmento", "step-1", FieldType::Text)
            .await
            .unwrap();
        let second = registry
            .ensure_field(&repo, "acme", 3, "Segmento", "step-1", FieldType::Number)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.field_type, FieldType::Text);
        assert_eq!(registry.created_count(), 1);
        assert_eq!(repo.list_field_definitions("acme", "step-1").await.unwrap().len(), 2);

        let created = registry.into_created();
        assert_eq!(created[0].column, "Segmento");
        assert_eq!(created[0].step_id, "step-1");
    }

    #[tokio::test]
    async fn test_existing_field_is_reused_not_created() {
        let repo = setup();
        let mut registry = FieldRegistry::new();

        let field = registry
            .ensure_field(&repo, "acme", 1, "origem", "step-1", FieldType::Text)
            .await
            .unwrap();

        assert_eq!(field.id, "f-existing");
        assert_eq!(registry.created_count(), 0);
        assert_eq!(registry.get(1).map(|f| f.id.as_str()), Some("f-existing"));
    }
}
