// ==========================================
// CRM 卡片导入服务 - 卡片导入 Trait
// ==========================================
// 职责: 定义卡片导入主接口与各阶段组件接口（不包含实现）
// 红线: client_id 由调用方显式传入，导入器不读取任何全局租户状态
// ==========================================

use crate::domain::import::{CsvTable, ImportCardsCsvPayload, ImportCardsCsvResponse};
use crate::domain::types::FieldType;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// CardImporter Trait
// ==========================================
// 用途: 卡片 CSV 导入主接口
// 实现者: CardImporterImpl
#[async_trait]
pub trait CardImporter: Send + Sync {
    /// 导入一份 CSV 为卡片
    ///
    /// # 参数
    /// - client_id: 租户标识（来自会话解析）
    /// - payload: csvFile + 导入配置
    ///
    /// # 返回
    /// - Ok(ImportCardsCsvResponse): 请求已处理（可能包含失败行）
    /// - Err: 请求级错误（内容过大、配置错误、解析失败、存储不可用）
    ///
    /// # 导入流程
    /// 1. 解码上传内容（大小上限校验）
    /// 2. 解析 CSV（表头 / 空行处理）
    /// 3. 请求级校验（流程、阶段、列映射、路由正则、商品）
    /// 4. 逐行处理: 原生字段 → 阶段路由 → 自定义字段 → 商品条目 → 落库
    async fn import_cards(
        &self,
        client_id: &str,
        payload: ImportCardsCsvPayload,
    ) -> ImportResult<ImportCardsCsvResponse>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: CSV 文本解析
// 实现者: CsvParser
pub trait FileParser: Send + Sync {
    /// 解析 CSV 文本
    ///
    /// # 参数
    /// - text: 已解码的 CSV 文本
    /// - skip_header_row: 首行是否为表头
    ///
    /// # 返回
    /// - Ok(CsvTable): 列标签 + 数据行（已去除空白行，行号 1 起始）
    fn parse(&self, text: &str, skip_header_row: bool) -> ImportResult<CsvTable>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 单元格值清洗与类型推断
// 实现者: DataCleaner
pub trait DataCleaner: Send + Sync {
    /// NULL 标准化（空白 → None，否则去除首尾空白）
    fn normalize_null(&self, value: Option<&str>) -> Option<String>;

    /// 解析金额（支持 `R$ 1.234,56` / `1,234.56` / `1234.5`）
    ///
    /// # 返回
    /// - Some(f64): 解析成功
    /// - None: 无法识别为金额
    fn parse_amount(&self, value: &str) -> Option<f64>;

    /// 根据样本值推断字段类型（无法识别时为 Text）
    fn infer_field_type(&self, value: &str) -> FieldType;
}
