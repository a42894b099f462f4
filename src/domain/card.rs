// ==========================================
// CRM 卡片导入服务 - 卡片领域模型
// ==========================================
// 对齐: cards / card_field_values / card_items / field_definitions / steps 表
// 红线: 所有实体都带 client_id (租户隔离)
// ==========================================

use crate::domain::types::FieldType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Step - 流程阶段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub client_id: String,
    pub flow_id: String,
    pub name: String,
    pub position: i32,
}

// ==========================================
// FieldDefinition - 自定义字段定义
// ==========================================
// 作用域: 租户 + 阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub client_id: String,
    pub step_id: String,
    pub name: String,
    pub field_type: FieldType,
    pub created_at: DateTime<Utc>,
}

/// 待创建的字段定义
#[derive(Debug, Clone, PartialEq)]
pub struct NewFieldDefinition {
    pub step_id: String,
    pub name: String,
    pub field_type: FieldType,
}

// ==========================================
// NewCard - 待写入的卡片
// ==========================================
// 一行 CSV 对应一张卡片；卡片、字段值、商品条目在同一事务中写入
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub id: String,
    pub flow_id: String,
    pub step_id: String,

    // ===== 原生字段 =====
    pub title: String,
    pub amount: Option<f64>,
    pub product: Option<String>,
    pub contact_id: Option<String>,
    pub company_id: Option<String>,
    pub lead_id: Option<String>,
    pub assignee_id: Option<String>,
    pub team_id: Option<String>,

    // ===== 附属数据 =====
    pub field_values: Vec<CardFieldValue>,
    pub line_item: Option<CardLineItem>,

    // ===== 导入追溯 =====
    pub import_batch_id: String,
    pub source_row: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardFieldValue {
    pub field_id: String,
    pub value: String,
}

/// 卡片商品条目（引用已有商品目录项）
#[derive(Debug, Clone, PartialEq)]
pub struct CardLineItem {
    pub item_id: String,
    pub amount: f64,
    pub quantity: i64,
}
