// ==========================================
// CRM 卡片导入服务 - 数据清洗器实现
// ==========================================
// 职责: NULL 标准化 / 金额解析 / 字段类型推断
// ==========================================

use crate::domain::types::FieldType;
use crate::importer::card_importer_trait::DataCleaner as DataCleanerTrait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(?:[.,]\d+)?$").expect("valid number regex"));

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const BOOLEAN_WORDS: [&str; 9] = [
    "true", "false", "yes", "no", "sim", "não", "nao", "是", "否",
];

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn parse_amount(&self, value: &str) -> Option<f64> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        // 会计格式 (100) 表示负数
        let (negative_paren, body) = match trimmed
            .strip_prefix('(')
            .and_then(|v| v.strip_suffix(')'))
        {
            Some(inner) => (true, inner),
            None => (false, trimmed),
        };

        let (negative_sign, body) = match body.trim().strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        // 去掉首尾的货币符号/货币代码与空白，例如 "R$ " / " BRL"
        let core = body.trim_matches(|c: char| {
            c.is_whitespace() || c.is_alphabetic() || "$€£¥".contains(c)
        });
        let (negative_inner, digits) = match core.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, core),
        };

        if digits.is_empty()
            || !digits.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
            || !digits.chars().any(|c| c.is_ascii_digit())
        {
            return None;
        }
        let negative = negative_paren || negative_sign || negative_inner;

        let normalized = Self::normalize_separators(digits)?;
        let parsed = normalized.parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(if negative { -parsed } else { parsed })
    }

    fn infer_field_type(&self, value: &str) -> FieldType {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return FieldType::Text;
        }

        let lower = trimmed.to_lowercase();
        if BOOLEAN_WORDS.contains(&lower.as_str()) {
            return FieldType::Boolean;
        }
        if NUMBER_RE.is_match(trimmed) {
            return FieldType::Number;
        }
        if DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDate::parse_from_str(trimmed, fmt).is_ok())
        {
            return FieldType::Date;
        }
        if EMAIL_RE.is_match(trimmed) {
            return FieldType::Email;
        }
        FieldType::Text
    }
}

impl DataCleaner {
    /// 统一千分位与小数分隔符为 Rust 可解析格式
    ///
    /// - 同时出现 '.' 与 ',': 最后出现的为小数点
    /// - 只出现一种且出现多次: 千分位
    /// - 只出现一次: 小数点
    fn normalize_separators(digits: &str) -> Option<String> {
        let last_dot = digits.rfind('.');
        let last_comma = digits.rfind(',');

        let decimal = match (last_dot, last_comma) {
            (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
            (Some(_), None) if digits.matches('.').count() == 1 => Some('.'),
            (None, Some(_)) if digits.matches(',').count() == 1 => Some(','),
            _ => None,
        };

        let mut out = String::with_capacity(digits.len());
        let mut seen_decimal = false;
        for c in digits.chars() {
            match c {
                '.' | ',' if Some(c) == decimal => {
                    // 小数点只能出现一次
                    if seen_decimal {
                        return None;
                    }
                    seen_decimal = true;
                    out.push('.');
                }
                '.' | ',' => {}
                _ => out.push(c),
            }
        }
        Some(out)
    }
}
