// ==========================================
// CRM 卡片导入服务 - 导入请求/结果模型
// ==========================================
// 职责: 导入请求体 (csvFile + config) 与响应体的数据结构
// 序列化格式: camelCase (与前端约定一致)
// ==========================================

use crate::domain::types::{FieldType, MatchType, RowStatus, UnmappedColumnsPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

// ==========================================
// ImportCardsCsvPayload - 导入请求体
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCardsCsvPayload {
    /// base64 或 data URL 编码的 CSV 内容
    pub csv_file: String,
    pub config: ImportConfig,
}

// ==========================================
// ImportConfig - 导入配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub flow_id: String,
    #[serde(default)]
    pub default_step_id: Option<String>,
    #[serde(default)]
    pub column_mapping: ColumnMapping,
    #[serde(default)]
    pub step_routing: Option<StepRouting>,
    #[serde(default)]
    pub create_missing_fields: Option<CreateMissingFields>,
    #[serde(default)]
    pub product_value_to_existing_item: Option<ProductValueMapping>,
    /// 分批大小（缺省时取租户配置，默认 100）
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default = "default_true")]
    pub skip_header_row: bool,
    /// 是否返回失败行原始数据
    #[serde(default = "default_true")]
    pub include_error_details: bool,
}

impl ImportConfig {
    /// 是否启用自动建字段
    pub fn creates_missing_fields(&self) -> bool {
        self.column_mapping.unmapped_columns == UnmappedColumnsPolicy::CreateFields
            && self
                .create_missing_fields
                .as_ref()
                .map(|c| c.enabled)
                .unwrap_or(false)
    }
}

// ==========================================
// ColumnMapping - 列映射
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[serde(default)]
    pub native_fields: NativeFieldMapping,
    /// stepId → (fieldId → 列引用)
    #[serde(default)]
    pub custom_fields: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub unmapped_columns: UnmappedColumnsPolicy,
}

/// 原生字段 → 列引用
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeFieldMapping {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub assigned_team: Option<String>,
}

impl NativeFieldMapping {
    /// 所有已映射的列引用
    pub fn mapped_columns(&self) -> Vec<&str> {
        [
            &self.title,
            &self.amount,
            &self.product,
            &self.contact,
            &self.company,
            &self.lead,
            &self.assignee,
            &self.assigned_team,
        ]
        .into_iter()
        .filter_map(|c| c.as_deref())
        .filter(|c| !c.trim().is_empty())
        .collect()
    }
}

// ==========================================
// StepRouting - 阶段路由规则
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRouting {
    /// 用于匹配的列
    pub column: String,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
    #[serde(default)]
    pub default_step_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub value: String,
    pub match_type: MatchType,
    pub step_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMissingFields {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_field_type: Option<FieldType>,
    /// 新字段归属阶段（缺省为行的目标阶段）
    #[serde(default)]
    pub target_step_id: Option<String>,
}

/// 将某列的值作为固定商品条目的金额
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductValueMapping {
    pub item_id: String,
    pub column: String,
}

// ==========================================
// CSV 解析结果
// ==========================================
/// 单行数据（按列位置排列）
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// 1 起始的数据行号（跳过表头之后）
    pub row_number: usize,
    pub cells: Vec<String>,
}

/// 列标签 + 数据行
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    /// 表头标签（无表头时为 0 起始的列序号）
    pub labels: Vec<String>,
    /// 最大列数（可能大于表头宽度）
    pub width: usize,
    pub rows: Vec<CsvRow>,
}

// ==========================================
// 导入结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResult {
    pub row: usize,
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 已生效（或本应生效）的阶段
    pub step_id: String,
}

impl RowResult {
    pub fn success(row: usize, card_id: String, step_id: String) -> Self {
        Self {
            row,
            status: RowStatus::Success,
            card_id: Some(card_id),
            error: None,
            step_id,
        }
    }

    pub fn failure(row: usize, error: String, step_id: String) -> Self {
        Self {
            row,
            status: RowStatus::Error,
            card_id: None,
            error: Some(error),
            step_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    pub fields_created: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedField {
    pub id: String,
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub step_id: String,
}

/// 失败行（附原始数据）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row: usize,
    pub error: String,
    pub data: BTreeMap<String, String>,
}

// ==========================================
// ImportCardsCsvResponse - 导入响应体
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCardsCsvResponse {
    pub success: bool,
    pub message: String,
    /// 本次导入的批次号（写入 cards.import_batch_id，便于追溯）
    pub batch_id: String,
    pub summary: ImportSummary,
    pub results: Vec<RowResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_fields: Vec<CreatedField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RowError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let json = r#"{
            "csvFile": "dGl0bGUKQQ==",
            "config": {
                "flowId": "flow-1",
                "defaultStepId": "step-1",
                "columnMapping": { "nativeFields": { "title": "Title" } }
            }
        }"#;
        let payload: ImportCardsCsvPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.config.flow_id, "flow-1");
        assert!(payload.config.skip_header_row);
        assert!(payload.config.include_error_details);
        assert_eq!(
            payload.config.column_mapping.unmapped_columns,
            UnmappedColumnsPolicy::Ignore
        );
        assert!(!payload.config.creates_missing_fields());
    }

    #[test]
    fn test_deserialize_full_config() {
        let json = r#"{
            "flowId": "flow-1",
            "columnMapping": {
                "nativeFields": { "title": "Name", "assignedTeam": "Team" },
                "customFields": { "step-2": { "field-9": "Notes" } },
                "unmappedColumns": "create_fields"
            },
            "stepRouting": {
                "column": "Status",
                "rules": [{ "value": "won", "matchType": "exact", "stepId": "step-3" }],
                "defaultStepId": "step-2"
            },
            "createMissingFields": { "enabled": true, "defaultFieldType": "number" },
            "productValueToExistingItem": { "itemId": "item-1", "column": "Value" },
            "batchSize": 25,
            "skipHeaderRow": false
        }"#;
        let config: ImportConfig = serde_json::from_str(json).unwrap();
        assert!(config.creates_missing_fields());
        assert_eq!(config.batch_size, Some(25));
        assert!(!config.skip_header_row);
        assert_eq!(
            config.column_mapping.native_fields.mapped_columns(),
            vec!["Name", "Team"]
        );
        let routing = config.step_routing.unwrap();
        assert_eq!(routing.rules[0].match_type, MatchType::Exact);
        assert_eq!(
            config.create_missing_fields.unwrap().default_field_type,
            Some(FieldType::Number)
        );
    }

    #[test]
    fn test_response_omits_empty_optional_lists() {
        let response = ImportCardsCsvResponse {
            success: true,
            message: "ok".to_string(),
            batch_id: "b".to_string(),
            summary: ImportSummary::default(),
            results: vec![RowResult::success(1, "card-1".to_string(), "step-1".to_string())],
            created_fields: vec![],
            errors: vec![],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("createdFields").is_none());
        assert!(value.get("errors").is_none());
        assert_eq!(value["results"][0]["status"], "success");
        assert_eq!(value["results"][0]["cardId"], "card-1");
        assert!(value["results"][0].get("error").is_none());
    }
}
