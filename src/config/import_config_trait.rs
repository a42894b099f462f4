// ==========================================
// CRM 卡片导入服务 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

/// 上传内容硬上限（10 MiB），配置只能调低不能调高
pub const HARD_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取，租户作用域优先于全局）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取上传内容大小上限（解码后字节数）
    ///
    /// # 默认值
    /// - 10 MiB（且不超过 HARD_MAX_PAYLOAD_BYTES）
    async fn get_max_payload_bytes(&self, client_id: &str) -> RepositoryResult<usize>;

    /// 获取默认分批大小（请求未指定 batchSize 时使用）
    ///
    /// # 默认值
    /// - 100
    async fn get_default_batch_size(&self, client_id: &str) -> RepositoryResult<usize>;

    /// 获取单次导入最大数据行数
    ///
    /// # 默认值
    /// - 50000
    async fn get_max_rows(&self, client_id: &str) -> RepositoryResult<usize>;

    /// 获取路由正则表达式最大长度（字符数）
    ///
    /// # 默认值
    /// - 512
    async fn get_regex_max_pattern_len(&self, client_id: &str) -> RepositoryResult<usize>;

    /// 获取路由正则编译大小上限（字节）
    ///
    /// # 默认值
    /// - 1 MiB
    async fn get_regex_size_limit(&self, client_id: &str) -> RepositoryResult<usize>;
}
