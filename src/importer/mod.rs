// ==========================================
// CRM 卡片导入服务 - 导入层
// ==========================================
// 职责: 上传 CSV → 卡片
// 组成: 解码 / 解析 / 列解析 / 清洗 / 阶段路由 / 自动建字段 / 编排
// ==========================================

// 模块声明
pub mod card_importer_impl;
pub mod card_importer_trait;
pub mod column_resolver;
pub mod data_cleaner;
pub mod error;
pub mod field_registry;
pub mod file_parser;
pub mod payload_decoder;
pub mod step_router;

// 重导出核心类型
pub use card_importer_impl::CardImporterImpl;
pub use column_resolver::ColumnIndex;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use error::{ImportError, ImportResult};
pub use field_registry::FieldRegistry;
pub use file_parser::CsvParser;
pub use payload_decoder::PayloadDecoder;
pub use step_router::{RegexLimits, StepRouter};

// 重导出 Trait 接口
pub use card_importer_trait::{CardImporter, DataCleaner, FileParser};
