// ==========================================
// CRM 卡片导入服务 - 领域模型层
// ==========================================
// 职责: 定义导入请求/结果、卡片实体与枚举类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod card;
pub mod import;
pub mod types;

// 重导出核心类型
pub use card::{CardFieldValue, CardLineItem, FieldDefinition, NewCard, NewFieldDefinition, Step};
pub use import::{
    ColumnMapping, CreateMissingFields, CreatedField, CsvRow, CsvTable, ImportCardsCsvPayload,
    ImportCardsCsvResponse, ImportConfig, ImportSummary, NativeFieldMapping,
    ProductValueMapping, RoutingRule, RowError, RowResult, StepRouting,
};
pub use types::{FieldType, MatchType, ReferenceKind, RowStatus, UnmappedColumnsPolicy};
