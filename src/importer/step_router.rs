// ==========================================
// CRM 卡片导入服务 - 阶段路由
// ==========================================
// 职责: 按路由规则为每行确定目标阶段
// 规则:
// - 按配置顺序逐条匹配，首个命中的规则生效
// - exact: 去除首尾空白后完全相等
// - contains: 忽略大小写的子串包含
// - regex: 正则匹配（编译时限制长度与编译体积）
// - 均未命中: stepRouting.defaultStepId，其次 config.defaultStepId
// 红线: 正则来自调用方配置，必须在处理任何行之前编译并校验
// ==========================================

use crate::domain::import::StepRouting;
use crate::domain::types::MatchType;
use crate::importer::error::{ImportError, ImportResult};
use regex::{Regex, RegexBuilder};

/// 正则编译限制
#[derive(Debug, Clone, Copy)]
pub struct RegexLimits {
    /// 模式最大字符数
    pub max_pattern_len: usize,
    /// 编译后程序与 DFA 缓存的字节上限
    pub size_limit: usize,
}

impl Default for RegexLimits {
    fn default() -> Self {
        Self {
            max_pattern_len: 512,
            size_limit: 1024 * 1024,
        }
    }
}

#[derive(Debug)]
enum RuleMatcher {
    Exact(String),
    Contains(String),
    Regex(Regex),
}

impl RuleMatcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            RuleMatcher::Exact(expected) => value.trim() == expected,
            RuleMatcher::Contains(needle) => value.to_lowercase().contains(needle.as_str()),
            RuleMatcher::Regex(re) => re.is_match(value),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    matcher: RuleMatcher,
    step_id: String,
}

// ==========================================
// StepRouter - 已编译的路由规则
// ==========================================
#[derive(Debug)]
pub struct StepRouter {
    rules: Vec<CompiledRule>,
    fallback_step_id: String,
}

impl StepRouter {
    /// 编译路由规则
    ///
    /// # 参数
    /// - routing: 路由配置（可选）
    /// - default_step_id: config.defaultStepId
    /// - limits: 正则编译限制
    ///
    /// # 返回
    /// - Err(ConfigurationError): 没有任何可用的默认阶段
    /// - Err(InvalidRoutingPattern): 正则过长或无法编译
    pub fn compile(
        routing: Option<&StepRouting>,
        default_step_id: Option<&str>,
        limits: RegexLimits,
    ) -> ImportResult<Self> {
        let fallback_step_id = routing
            .and_then(|r| r.default_step_id.as_deref())
            .and_then(Self::non_blank)
            .or_else(|| default_step_id.and_then(Self::non_blank))
            .ok_or_else(|| {
                ImportError::ConfigurationError(
                    "未配置默认阶段 (defaultStepId / stepRouting.defaultStepId)".to_string(),
                )
            })?;

        let mut rules = Vec::new();
        for (index, rule) in routing.map(|r| r.rules.as_slice()).unwrap_or(&[]).iter().enumerate() {
            if rule.step_id.trim().is_empty() {
                return Err(ImportError::ConfigurationError(format!(
                    "路由规则 #{} 缺少 stepId",
                    index
                )));
            }

            let matcher = match rule.match_type {
                MatchType::Exact => RuleMatcher::Exact(rule.value.trim().to_string()),
                MatchType::Contains => RuleMatcher::Contains(rule.value.to_lowercase()),
                MatchType::Regex => RuleMatcher::Regex(Self::compile_regex(index, &rule.value, limits)?),
            };
            rules.push(CompiledRule {
                matcher,
                step_id: rule.step_id.trim().to_string(),
            });
        }

        Ok(Self {
            rules,
            fallback_step_id,
        })
    }

    fn non_blank(id: &str) -> Option<String> {
        let id = id.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn compile_regex(index: usize, pattern: &str, limits: RegexLimits) -> ImportResult<Regex> {
        let len = pattern.chars().count();
        if len > limits.max_pattern_len {
            return Err(ImportError::InvalidRoutingPattern {
                index,
                message: format!("模式长度 {} 超过上限 {}", len, limits.max_pattern_len),
            });
        }

        RegexBuilder::new(pattern)
            .size_limit(limits.size_limit)
            .dfa_size_limit(limits.size_limit)
            .build()
            .map_err(|e| ImportError::InvalidRoutingPattern {
                index,
                message: e.to_string(),
            })
    }

    /// 确定目标阶段（缺失的单元格按空字符串匹配）
    pub fn resolve(&self, value: Option<&str>) -> &str {
        let value = value.unwrap_or("");
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(value))
            .map(|rule| rule.step_id.as_str())
            .unwrap_or(&self.fallback_step_id)
    }

    /// 规则与默认值引用的全部阶段
    pub fn referenced_step_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rules.iter().map(|r| r.step_id.as_str()).collect();
        ids.push(&self.fallback_step_id);
        ids
    }
}
