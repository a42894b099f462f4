// ==========================================
// CRM 卡片导入服务 - HTTP 路由
// ==========================================
// 路由:
// - POST /functions/v1/import-cards-csv  (别名 POST /api/import-cards-csv)
// - GET  /health
// CORS: 任意来源; 允许头 authorization, x-client-info, apikey, content-type
// 错误响应: { success: false, error, code } + 400 / 401 / 413 / 500
// ==========================================

use crate::api::ApiError;
use crate::app::state::AppState;
use crate::config::HARD_MAX_PAYLOAD_BYTES;
use crate::domain::import::ImportCardsCsvPayload;
use crate::i18n;
use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::error::JsonPayloadError;
use actix_web::http::{header, StatusCode};
use actix_web::{get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder, ResponseError};
use serde::Serialize;
use serde_json::json;

/// JSON 请求体上限: base64 膨胀后的上传上限 + 配置等字段余量
pub const JSON_BODY_LIMIT: usize = HARD_MAX_PAYLOAD_BYTES / 3 * 4 + 1024 * 1024;

const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;

/// 服务监听配置（来自环境变量）
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl ServerSettings {
    /// # 环境变量
    /// - CRM_IMPORT_BIND: 监听地址（默认 127.0.0.1）
    /// - CRM_IMPORT_PORT: 监听端口（默认 8787）
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("CRM_IMPORT_BIND").ok(),
            std::env::var("CRM_IMPORT_PORT").ok(),
        )
    }

    fn from_values(bind: Option<String>, port: Option<String>) -> Self {
        let bind = bind
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let port = match port.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "CRM_IMPORT_PORT 无效，使用默认端口");
                DEFAULT_PORT
            }),
            _ => DEFAULT_PORT,
        };

        Self { bind, port }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    code: &'a str,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
        })
    }
}

/// 请求体解析失败 → ApiError（超限为 413，其余为 400）
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let api_error = match &err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            ApiError::PayloadTooLarge(i18n::t("import.body_too_large"))
        }
        other => ApiError::InvalidInput(other.to_string()),
    };
    tracing::warn!(error = %err, "请求体解析失败");
    api_error.into()
}

#[post("/import-cards-csv")]
async fn import_cards_csv(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ImportCardsCsvPayload>,
) -> Result<HttpResponse, ApiError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let client_id = data.import_api.authenticate(authorization)?;

    let response = data
        .import_api
        .import_cards_csv(&client_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// CORS 策略
pub fn build_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["POST", "GET", "OPTIONS"])
        .allowed_headers(vec!["authorization", "x-client-info", "apikey", "content-type"])
        .max_age(3600)
}

/// 注册路由（服务与测试共用）
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(json_error_handler),
    )
    .service(health)
    .service(web::scope("/functions/v1").service(import_cards_csv))
    .service(web::scope("/api").service(import_cards_csv));
}

/// 启动 HTTP 服务
pub fn start_server(state: web::Data<AppState>, settings: &ServerSettings) -> std::io::Result<Server> {
    tracing::info!(bind = %settings.bind, port = settings.port, "启动 HTTP 服务");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(build_cors())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((settings.bind.as_str(), settings.port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_settings_defaults_and_overrides() {
        assert_eq!(
            ServerSettings::from_values(None, None),
            ServerSettings {
                bind: "127.0.0.1".to_string(),
                port: 8787
            }
        );
        assert_eq!(
            ServerSettings::from_values(Some("0.0.0.0".to_string()), Some("9000".to_string())),
            ServerSettings {
                bind: "0.0.0.0".to_string(),
                port: 9000
            }
        );
        assert_eq!(
            ServerSettings::from_values(Some("  ".to_string()), Some("abc".to_string())).port,
            8787
        );
    }

    #[test]
    fn test_json_body_limit_covers_base64_ceiling() {
        assert!(JSON_BODY_LIMIT > HARD_MAX_PAYLOAD_BYTES / 3 * 4);
    }

    #[test]
    fn test_error_response_status() {
        let err = ApiError::PayloadTooLarge("x".to_string());
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let err = ApiError::Unauthorized("x".to_string());
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
    }
}
