// ==========================================
// CRM 卡片导入服务 - 领域类型定义
// ==========================================
// 职责: 导入配置与结果中使用的枚举类型
// 序列化格式: 与前端 JSON 约定一致 (小写/蛇形)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 路由规则匹配方式 (Match Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,    // 去除首尾空白后完全相等
    Contains, // 忽略大小写的子串包含
    Regex,    // 正则匹配
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => write!(f, "exact"),
            MatchType::Contains => write!(f, "contains"),
            MatchType::Regex => write!(f, "regex"),
        }
    }
}

// ==========================================
// 未映射列处理策略 (Unmapped Columns Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedColumnsPolicy {
    #[default]
    Ignore,       // 丢弃
    CreateFields, // 自动创建自定义字段
}

// ==========================================
// 自定义字段类型 (Field Type)
// ==========================================
// 存储格式: 小写字符串 (与 field_definitions.field_type 一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Currency,
    Date,
    Boolean,
    Email,
}

impl FieldType {
    /// 数据库存储字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Email => "email",
        }
    }

    /// 从数据库字符串解析（未知值回退为 Text）
    pub fn from_db_str(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "number" => FieldType::Number,
            "currency" => FieldType::Currency,
            "date" => FieldType::Date,
            "boolean" => FieldType::Boolean,
            "email" => FieldType::Email,
            _ => FieldType::Text,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 行处理结果状态 (Row Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Success,
    Error,
}

// ==========================================
// 引用字段类型 (Reference Kind)
// ==========================================
// 用途: 原生字段中需要在租户范围内查找的关联对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Contact, // 联系人
    Company, // 公司
    Lead,    // 线索
    User,    // 负责人
    Team,    // 负责团队
}

impl ReferenceKind {
    /// 对应的数据表
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::Contact => "contacts",
            ReferenceKind::Company => "companies",
            ReferenceKind::Lead => "leads",
            ReferenceKind::User => "users",
            ReferenceKind::Team => "teams",
        }
    }

    /// 除 id/name 外可用于匹配的列
    pub fn alternate_column(&self) -> Option<&'static str> {
        match self {
            ReferenceKind::Contact | ReferenceKind::Lead | ReferenceKind::User => Some("email"),
            ReferenceKind::Company | ReferenceKind::Team => None,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Contact => write!(f, "contact"),
            ReferenceKind::Company => write!(f, "company"),
            ReferenceKind::Lead => write!(f, "lead"),
            ReferenceKind::User => write!(f, "assignee"),
            ReferenceKind::Team => write!(f, "assignedTeam"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_db_roundtrip() {
        for ft in [
            FieldType::Text,
            FieldType::Number,
            FieldType::Currency,
            FieldType::Date,
            FieldType::Boolean,
            FieldType::Email,
        ] {
            assert_eq!(FieldType::from_db_str(ft.to_db_str()), ft);
        }
        assert_eq!(FieldType::from_db_str("unknown"), FieldType::Text);
    }

    #[test]
    fn test_unmapped_policy_serde() {
        let p: UnmappedColumnsPolicy = serde_json::from_str("\"create_fields\"").unwrap();
        assert_eq!(p, UnmappedColumnsPolicy::CreateFields);
        assert_eq!(UnmappedColumnsPolicy::default(), UnmappedColumnsPolicy::Ignore);
    }

    #[test]
    fn test_match_type_serde() {
        let m: MatchType = serde_json::from_str("\"contains\"").unwrap();
        assert_eq!(m, MatchType::Contains);
    }
}
