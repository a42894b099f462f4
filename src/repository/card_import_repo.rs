// ==========================================
// CRM 卡片导入服务 - 卡片导入 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 红线: 所有方法显式接收 client_id，不读取任何环境/全局租户状态
// ==========================================

use crate::domain::card::{FieldDefinition, NewCard, NewFieldDefinition, Step};
use crate::domain::types::ReferenceKind;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CardImportRepository Trait
// ==========================================
// 用途: 卡片导入相关数据访问
// 实现者: CardImportRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait CardImportRepository: Send + Sync {
    // ===== 流程与阶段 =====

    /// 检查流程是否属于该租户
    async fn flow_exists(&self, client_id: &str, flow_id: &str) -> RepositoryResult<bool>;

    /// 查询流程下的全部阶段（按 position 排序）
    async fn list_steps(&self, client_id: &str, flow_id: &str) -> RepositoryResult<Vec<Step>>;

    // ===== 自定义字段 =====

    /// 查询阶段下的字段定义
    async fn list_field_definitions(
        &self,
        client_id: &str,
        step_id: &str,
    ) -> RepositoryResult<Vec<FieldDefinition>>;

    /// 按名称查找阶段下的字段定义（忽略大小写）
    async fn find_field_by_name(
        &self,
        client_id: &str,
        step_id: &str,
        name: &str,
    ) -> RepositoryResult<Option<FieldDefinition>>;

    /// 创建字段定义
    ///
    /// # 返回
    /// - Ok(FieldDefinition): 新建的字段（含生成的 id）
    async fn create_field_definition(
        &self,
        client_id: &str,
        field: NewFieldDefinition,
    ) -> RepositoryResult<FieldDefinition>;

    // ===== 引用数据 =====

    /// 检查商品目录项是否存在
    async fn catalog_item_exists(&self, client_id: &str, item_id: &str) -> RepositoryResult<bool>;

    /// 在租户范围内解析引用值（先按 id，再按名称/邮箱）
    ///
    /// # 返回
    /// - Ok(Some(id)): 找到
    /// - Ok(None): 未找到
    async fn resolve_reference(
        &self,
        client_id: &str,
        kind: ReferenceKind,
        value: &str,
    ) -> RepositoryResult<Option<String>>;

    // ===== 卡片写入 =====

    /// 写入一张卡片（卡片 + 字段值 + 商品条目，单事务）
    ///
    /// # 返回
    /// - Ok(card_id)
    /// - Err: 数据库错误（该卡片整体回滚，不影响其他行）
    async fn insert_card(&self, client_id: &str, card: NewCard) -> RepositoryResult<String>;

    /// 统计租户卡片数量
    async fn count_cards(&self, client_id: &str) -> RepositoryResult<usize>;
}
