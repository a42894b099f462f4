// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、租户数据种子、请求构造等功能
// ==========================================
#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use crm_card_import::config::ConfigManager;
use crm_card_import::db::{init_schema, open_sqlite_connection};
use crm_card_import::domain::{
    ColumnMapping, ImportCardsCsvPayload, ImportConfig, NativeFieldMapping,
};
use crm_card_import::importer::CardImporterImpl;
use crm_card_import::repository::{CardImportRepositoryImpl, SessionRepository};
use std::error::Error;
use tempfile::NamedTempFile;

pub type TestImporter = CardImporterImpl<CardImportRepositoryImpl, ConfigManager>;

pub const TENANT: &str = "acme";
pub const OTHER_TENANT: &str = "globex";
pub const VALID_TOKEN: &str = "token-acme";
pub const EXPIRED_TOKEN: &str = "token-expired";

/// 创建临时测试数据库并初始化 schema + 种子数据
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    seed_tenants(&conn)?;

    Ok((temp_file, db_path))
}

/// 两个租户的流程、阶段、字段与引用数据
///
/// acme: flow-1 (step-1 Lead, step-2 Proposta, step-3 Ganho)
/// globex: flow-g (step-g)
fn seed_tenants(conn: &rusqlite::Connection) -> Result<(), Box<dyn Error>> {
    conn.execute_batch(
        r#"
        INSERT INTO flows (id, client_id, name) VALUES
            ('flow-1', 'acme', 'Vendas'),
            ('flow-g', 'globex', 'Sales');
        INSERT INTO steps (id, client_id, flow_id, name, position) VALUES
            ('step-1', 'acme', 'flow-1', 'Lead', 1),
            ('step-2', 'acme', 'flow-1', 'Proposta', 2),
            ('step-3', 'acme', 'flow-1', 'Ganho', 3),
            ('step-g', 'globex', 'flow-g', 'Inbox', 1);
        INSERT INTO field_definitions (id, client_id, step_id, name, field_type, created_at) VALUES
            ('field-notes', 'acme', 'step-2', 'Notas', 'text', '2024-01-01T00:00:00Z');
        INSERT INTO catalog_items (id, client_id, name, price) VALUES
            ('item-1', 'acme', 'Plano Anual', 1200.0);
        INSERT INTO contacts (id, client_id, name, email) VALUES
            ('contact-1', 'acme', 'Maria Silva', 'maria@acme.test'),
            ('contact-g', 'globex', 'Maria Silva', 'maria@globex.test');
        INSERT INTO companies (id, client_id, name) VALUES
            ('company-1', 'acme', 'Padaria Central');
        INSERT INTO users (id, client_id, name, email) VALUES
            ('user-1', 'acme', 'João', 'joao@acme.test');
        INSERT INTO teams (id, client_id, name) VALUES
            ('team-1', 'acme', 'Inside Sales');
        "#,
    )?;
    Ok(())
}

/// 登记有效与过期会话
pub fn seed_sessions(db_path: &str) -> Result<(), Box<dyn Error>> {
    let sessions = SessionRepository::new(db_path)?;
    sessions.insert_session(VALID_TOKEN, TENANT, Some("user-1"), None)?;
    sessions.insert_session(
        EXPIRED_TOKEN,
        TENANT,
        None,
        Some(Utc::now() - Duration::hours(1)),
    )?;
    Ok(())
}

/// 创建基于文件数据库的导入器
pub fn create_importer(db_path: &str) -> Result<TestImporter, Box<dyn Error>> {
    Ok(CardImporterImpl::with_default_components(
        CardImportRepositoryImpl::new(db_path)?,
        ConfigManager::new(db_path)?,
    ))
}

/// 只映射标题列、默认阶段 step-1 的最小配置
pub fn base_config(title_column: &str) -> ImportConfig {
    ImportConfig {
        flow_id: "flow-1".to_string(),
        default_step_id: Some("step-1".to_string()),
        column_mapping: ColumnMapping {
            native_fields: NativeFieldMapping {
                title: Some(title_column.to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
        step_routing: None,
        create_missing_fields: None,
        product_value_to_existing_item: None,
        batch_size: None,
        skip_header_row: true,
        include_error_details: true,
    }
}

pub fn encode_csv(csv: &str) -> String {
    STANDARD.encode(csv.as_bytes())
}

pub fn make_payload(csv: &str, config: ImportConfig) -> ImportCardsCsvPayload {
    ImportCardsCsvPayload {
        csv_file: encode_csv(csv),
        config,
    }
}

/// 统计某租户的行数
pub fn count_rows(db_path: &str, table: &str, client_id: &str) -> i64 {
    let conn = open_sqlite_connection(db_path).unwrap();
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE client_id = ?1", table),
        [client_id],
        |row| row.get(0),
    )
    .unwrap()
}
