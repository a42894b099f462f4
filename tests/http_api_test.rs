// ==========================================
// HTTP 接口测试
// ==========================================
// 覆盖: 健康检查、鉴权、请求体上限、CORS 预检、成功导入、配置错误
// ==========================================

mod test_helpers;

use actix_web::http::{header, Method, StatusCode};
use actix_web::{test, web, App};
use crm_card_import::app::{build_cors, configure, AppState};
use serde_json::{json, Value};
use test_helpers::{create_test_db, encode_csv, seed_sessions, EXPIRED_TOKEN, VALID_TOKEN};

macro_rules! init_app {
    ($db_path:expr) => {{
        let state = AppState::new($db_path.clone()).unwrap();
        test::init_service(
            App::new()
                .wrap(build_cors())
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await
    }};
}

fn request_body(csv: &str) -> Value {
    json!({
        "csvFile": encode_csv(csv),
        "config": {
            "flowId": "flow-1",
            "defaultStepId": "step-1",
            "columnMapping": { "nativeFields": { "title": "Title" } }
        }
    })
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_health() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let app = init_app!(db_path);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], crm_card_import::VERSION);
}

#[actix_web::test]
async fn test_import_success() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_sessions(&db_path).unwrap();
    let app = init_app!(db_path);

    let req = test::TestRequest::post()
        .uri("/functions/v1/import-cards-csv")
        .insert_header(bearer(VALID_TOKEN))
        .set_json(request_body("Title\nA\n\nB\n"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["totalRows"], 2);
    assert_eq!(body["summary"]["successfulImports"], 2);
    assert_eq!(body["results"][0]["row"], 1);
    assert_eq!(body["results"][0]["status"], "success");
    assert_eq!(body["results"][1]["stepId"], "step-1");
}

#[actix_web::test]
async fn test_api_alias_route() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_sessions(&db_path).unwrap();
    let app = init_app!(db_path);

    let req = test::TestRequest::post()
        .uri("/api/import-cards-csv")
        .insert_header(bearer(VALID_TOKEN))
        .set_json(request_body("Title\nA\n"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_missing_token_is_unauthorized() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let app = init_app!(db_path);

    let req = test::TestRequest::post()
        .uri("/functions/v1/import-cards-csv")
        .set_json(request_body("Title\nA\n"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(body["error"].as_str().is_some());
}

#[actix_web::test]
async fn test_unknown_and_expired_tokens_are_unauthorized() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_sessions(&db_path).unwrap();
    let app = init_app!(db_path);

    for token in ["not-a-session", EXPIRED_TOKEN] {
        let req = test::TestRequest::post()
            .uri("/functions/v1/import-cards-csv")
            .insert_header(bearer(token))
            .set_json(request_body("Title\nA\n"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "token: {}", token);
    }
}

#[actix_web::test]
async fn test_oversized_body_is_413() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_sessions(&db_path).unwrap();
    let app = init_app!(db_path);

    let mut csv = String::from("Title\n");
    let line = format!("{}\n", "x".repeat(1023));
    while csv.len() <= 11 * 1024 * 1024 {
        csv.push_str(&line);
    }

    let req = test::TestRequest::post()
        .uri("/functions/v1/import-cards-csv")
        .insert_header(bearer(VALID_TOKEN))
        .set_json(request_body(&csv))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(test_helpers::count_rows(&db_path, "cards", "acme"), 0);
}

#[actix_web::test]
async fn test_invalid_requests_are_400() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_sessions(&db_path).unwrap();
    let app = init_app!(db_path);

    // 非 JSON
    let req = test::TestRequest::post()
        .uri("/functions/v1/import-cards-csv")
        .insert_header(bearer(VALID_TOKEN))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // 空 CSV
    let req = test::TestRequest::post()
        .uri("/functions/v1/import-cards-csv")
        .insert_header(bearer(VALID_TOKEN))
        .set_json(json!({ "csvFile": "", "config": { "flowId": "flow-1" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // 没有默认阶段也没有路由
    let req = test::TestRequest::post()
        .uri("/functions/v1/import-cards-csv")
        .insert_header(bearer(VALID_TOKEN))
        .set_json(json!({
            "csvFile": encode_csv("Title\nA\n"),
            "config": {
                "flowId": "flow-1",
                "columnMapping": { "nativeFields": { "title": "Title" } }
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "CONFIGURATION_ERROR");
}

#[actix_web::test]
async fn test_cors_preflight() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let app = init_app!(db_path);

    let req = test::TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/functions/v1/import-cards-csv")
        .insert_header((header::ORIGIN, "https://app.example.com"))
        .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
        .insert_header((
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            "authorization, x-client-info, apikey, content-type",
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert!(resp
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let allowed = resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-client-info"));
    assert!(allowed.contains("apikey"));
}
