// ==========================================
// CRM 卡片导入服务 - 主入口
// ==========================================
// 技术栈: actix-web + Rust + SQLite
// ==========================================

use actix_web::web;
use crm_card_import::app::{get_default_db_path, start_server, AppState, ServerSettings};
use crm_card_import::{i18n, logging};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", crm_card_import::APP_NAME);
    tracing::info!("系统版本: {}", crm_card_import::VERSION);
    tracing::info!("==================================================");

    i18n::init_from_env();

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path).map_err(|e| {
        tracing::error!("AppState初始化失败: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    let settings = ServerSettings::from_env();
    start_server(web::Data::new(app_state), &settings)?.await
}
