// ==========================================
// CRM 卡片导入服务 - 国际化
// ==========================================
// 职责: 响应消息本地化（汇总消息、鉴权失败、列名）
// 语言: zh-CN（默认）/ en，词条见 locales/*.yml
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 支持的语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["zh-CN", "en"];

/// 将语言标签归一到支持的语言
///
/// `zh`, `zh_CN`, `zh-Hans` → zh-CN；`en`, `en-US`, `EN_gb` → en；其余 → None
pub fn normalize_locale(tag: &str) -> Option<&'static str> {
    let primary = tag
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match primary.as_str() {
        "zh" => Some("zh-CN"),
        "en" => Some("en"),
        _ => None,
    }
}

pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 切换语言；不支持的标签保持当前语言并返回 false
pub fn set_locale(tag: &str) -> bool {
    match normalize_locale(tag) {
        Some(locale) => {
            rust_i18n::set_locale(locale);
            true
        }
        None => {
            tracing::warn!(locale = %tag, supported = ?SUPPORTED_LOCALES, "不支持的语言，保持默认");
            false
        }
    }
}

/// 从 CRM_IMPORT_LOCALE 初始化语言（未设置时保持 zh-CN）
pub fn init_from_env() {
    if let Ok(tag) = std::env::var("CRM_IMPORT_LOCALE") {
        if !tag.trim().is_empty() && set_locale(&tag) {
            tracing::info!(locale = %current_locale(), "响应语言已设置");
        }
    }
}

pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译并替换 `%{name}` 占位符
///
/// ```no_run
/// use crm_card_import::i18n::t_with_args;
/// let msg = t_with_args("import.column_name", &[("index", "3")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(t(key), |text, (name, value)| {
        text.replace(&format!("%{{{}}}", name), value)
    })
}
