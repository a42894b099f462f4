// ==========================================
// CRM 卡片导入服务 - 卡片导入API
// ==========================================
// 职责: 鉴权（token → 租户）+ 调用卡片导入器 + 错误转换
// 红线: 租户只从会话解析，不信任请求体中的任何租户字段
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::{ImportCardsCsvPayload, ImportCardsCsvResponse};
use crate::i18n;
use crate::importer::CardImporter;
use crate::repository::SessionRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// 卡片导入API
pub struct ImportApi {
    importer: Arc<dyn CardImporter>,
    sessions: Arc<SessionRepository>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(importer: Arc<dyn CardImporter>, sessions: Arc<SessionRepository>) -> Self {
        Self { importer, sessions }
    }

    /// 解析 Authorization 头，返回租户 client_id
    ///
    /// # 参数
    /// - authorization: `Bearer <token>`
    ///
    /// # 返回
    /// - Ok(client_id)
    /// - Err(Unauthorized): 缺失、格式错误、未知或已过期的 token
    pub fn authenticate(&self, authorization: Option<&str>) -> ApiResult<String> {
        let token = authorization
            .map(str::trim)
            .and_then(|header| {
                let (scheme, token) = header.split_once(' ')?;
                scheme
                    .eq_ignore_ascii_case("bearer")
                    .then(|| token.trim())
            })
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(i18n::t("auth.missing_token")))?;

        let session = self
            .sessions
            .find_by_token(token)?
            .ok_or_else(|| ApiError::Unauthorized(i18n::t("auth.invalid_token")))?;

        if session.is_expired(Utc::now()) {
            warn!(client_id = %session.client_id, "会话已过期");
            return Err(ApiError::Unauthorized(i18n::t("auth.session_expired")));
        }

        Ok(session.client_id)
    }

    /// 导入卡片 CSV
    ///
    /// # 参数
    /// - client_id: 已鉴权的租户
    /// - payload: 请求体
    ///
    /// # 返回
    /// - Ok(ImportCardsCsvResponse): 请求已处理（行级失败见 results / errors）
    /// - Err(ApiError): 请求级错误
    pub async fn import_cards_csv(
        &self,
        client_id: &str,
        payload: ImportCardsCsvPayload,
    ) -> ApiResult<ImportCardsCsvResponse> {
        if payload.csv_file.trim().is_empty() {
            return Err(ApiError::InvalidInput(i18n::t("import.empty_file")));
        }

        let response = self.importer.import_cards(client_id, payload).await?;
        info!(
            client_id = %client_id,
            batch_id = %response.batch_id,
            success = response.summary.successful_imports,
            failed = response.summary.failed_imports,
            "导入请求处理完成"
        );
        Ok(response)
    }
}
