// ==========================================
// CRM 卡片导入服务 - 卡片导入器实现
// ==========================================
// 职责: 整合导入流程，从上传内容到卡片落库
// 流程: 解码 → 解析 → 请求级校验 → 逐行(原生字段 → 路由 → 自定义字段 → 商品条目 → 落库)
// 红线:
// - 请求级错误（内容过大、配置错误）在处理任何行之前返回
// - 单行失败只记录，不中断批次；不做跨行事务
// - 行按输入顺序串行处理
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::card::{CardFieldValue, CardLineItem, NewCard};
use crate::domain::import::{
    CsvRow, ImportCardsCsvPayload, ImportCardsCsvResponse, ImportConfig, ImportSummary, RowError,
    RowResult,
};
use crate::domain::types::{FieldType, ReferenceKind};
use crate::i18n;
use crate::importer::card_importer_trait::{CardImporter, DataCleaner, FileParser};
use crate::importer::column_resolver::ColumnIndex;
use crate::importer::data_cleaner::DataCleaner as DefaultDataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_registry::FieldRegistry;
use crate::importer::file_parser::CsvParser;
use crate::importer::payload_decoder::PayloadDecoder;
use crate::importer::step_router::{RegexLimits, StepRouter};
use crate::repository::CardImportRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ImportPlan - 请求级校验后的执行计划
// ==========================================
// 所有列引用都已解析为列位置，所有阶段都已确认属于目标流程
struct ImportPlan {
    columns: ColumnIndex,
    router: StepRouter,
    routing_column: Option<usize>,

    // ===== 原生字段 =====
    title: usize,
    amount: Option<usize>,
    product: Option<usize>,
    references: Vec<(ReferenceKind, usize)>,

    // ===== 自定义字段 =====
    /// stepId → [(fieldId, 列位置)]
    custom_fields: HashMap<String, Vec<(String, usize)>>,
    /// 需自动建字段的列（未启用时为空）
    unmapped: Vec<usize>,
    field_target_step: Option<String>,
    default_field_type: Option<FieldType>,

    // ===== 商品条目 =====
    product_item: Option<(String, usize)>,
}

// ==========================================
// CardImporterImpl - 卡片导入器实现
// ==========================================
pub struct CardImporterImpl<R, C>
where
    R: CardImportRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    data_cleaner: Box<dyn DataCleaner>,
}

impl<R, C> CardImporterImpl<R, C>
where
    R: CardImportRepository,
    C: ImportConfigReader,
{
    /// 创建新的 CardImporter 实例
    ///
    /// # 参数
    /// - repo: 卡片导入仓储
    /// - config: 配置读取器
    /// - file_parser: CSV 解析器
    /// - data_cleaner: 数据清洗器
    pub fn new(
        repo: R,
        config: C,
        file_parser: Box<dyn FileParser>,
        data_cleaner: Box<dyn DataCleaner>,
    ) -> Self {
        Self {
            repo,
            config,
            file_parser,
            data_cleaner,
        }
    }

    /// 使用默认组件（CsvParser + DataCleaner）创建
    pub fn with_default_components(repo: R, config: C) -> Self {
        Self::new(repo, config, Box::new(CsvParser), Box::new(DefaultDataCleaner))
    }

    /// 请求级校验，生成执行计划
    async fn prepare(
        &self,
        client_id: &str,
        config: &ImportConfig,
        columns: ColumnIndex,
    ) -> ImportResult<ImportPlan> {
        // === 流程与阶段 ===
        let flow_id = config.flow_id.trim();
        if flow_id.is_empty() {
            return Err(ImportError::ConfigurationError("缺少 flowId".to_string()));
        }
        if !self.repo.flow_exists(client_id, flow_id).await? {
            return Err(ImportError::ConfigurationError(format!(
                "流程不存在: {}",
                flow_id
            )));
        }
        let flow_steps: HashSet<String> = self
            .repo
            .list_steps(client_id, flow_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let ensure_step = |step_id: &str| -> ImportResult<()> {
            if flow_steps.contains(step_id) {
                Ok(())
            } else {
                Err(ImportError::ConfigurationError(format!(
                    "阶段不属于流程 {}: {}",
                    flow_id, step_id
                )))
            }
        };

        // === 阶段路由 ===
        let limits = RegexLimits {
            max_pattern_len: self.config.get_regex_max_pattern_len(client_id).await?,
            size_limit: self.config.get_regex_size_limit(client_id).await?,
        };
        let router = StepRouter::compile(
            config.step_routing.as_ref(),
            config.default_step_id.as_deref(),
            limits,
        )?;
        for step_id in router.referenced_step_ids() {
            ensure_step(step_id)?;
        }

        let resolve = |field: &str, reference: &str| -> ImportResult<usize> {
            columns.resolve(reference).ok_or_else(|| {
                ImportError::ConfigurationError(format!(
                    "列映射 {} 无法匹配任何列: {}",
                    field, reference
                ))
            })
        };
        let resolve_optional = |field: &str, reference: Option<&String>| -> ImportResult<Option<usize>> {
            match reference.map(|r| r.as_str()).filter(|r| !r.trim().is_empty()) {
                Some(r) => resolve(field, r).map(Some),
                None => Ok(None),
            }
        };

        let routing_column = match &config.step_routing {
            Some(routing) if !routing.rules.is_empty() => {
                Some(resolve("stepRouting.column", routing.column.as_str())?)
            }
            _ => None,
        };

        // === 原生字段 ===
        let native = &config.column_mapping.native_fields;
        let title = resolve_optional("title", native.title.as_ref())?.ok_or_else(|| {
            ImportError::ConfigurationError("未映射必填字段 title".to_string())
        })?;
        let amount = resolve_optional("amount", native.amount.as_ref())?;
        let product = resolve_optional("product", native.product.as_ref())?;

        let mut references = Vec::new();
        for (kind, reference) in [
            (ReferenceKind::Contact, native.contact.as_ref()),
            (ReferenceKind::Company, native.company.as_ref()),
            (ReferenceKind::Lead, native.lead.as_ref()),
            (ReferenceKind::User, native.assignee.as_ref()),
            (ReferenceKind::Team, native.assigned_team.as_ref()),
        ] {
            if let Some(idx) = resolve_optional(kind.to_string().as_str(), reference)? {
                references.push((kind, idx));
            }
        }

        // === 按阶段的自定义字段映射 ===
        let mut custom_fields: HashMap<String, Vec<(String, usize)>> = HashMap::new();
        for (step_id, mapping) in &config.column_mapping.custom_fields {
            ensure_step(step_id.as_str())?;
            let known: HashSet<String> = self
                .repo
                .list_field_definitions(client_id, step_id)
                .await?
                .into_iter()
                .map(|f| f.id)
                .collect();

            let mut entries = Vec::new();
            for (field_id, reference) in mapping {
                if !known.contains(field_id) {
                    return Err(ImportError::ConfigurationError(format!(
                        "阶段 {} 下不存在字段: {}",
                        step_id, field_id
                    )));
                }
                entries.push((field_id.clone(), resolve(field_id.as_str(), reference.as_str())?));
            }
            custom_fields.insert(step_id.clone(), entries);
        }

        // === 商品条目 ===
        let product_item = match &config.product_value_to_existing_item {
            Some(mapping) => {
                if !self
                    .repo
                    .catalog_item_exists(client_id, &mapping.item_id)
                    .await?
                {
                    return Err(ImportError::ConfigurationError(format!(
                        "商品不存在: {}",
                        mapping.item_id
                    )));
                }
                let idx = resolve("productValueToExistingItem.column", mapping.column.as_str())?;
                Some((mapping.item_id.clone(), idx))
            }
            None => None,
        };

        // === 自动建字段 ===
        let field_target_step = config
            .create_missing_fields
            .as_ref()
            .and_then(|c| c.target_step_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if let Some(step_id) = &field_target_step {
            ensure_step(step_id.as_str())?;
        }
        let default_field_type = config
            .create_missing_fields
            .as_ref()
            .and_then(|c| c.default_field_type);

        let unmapped = if config.creates_missing_fields() {
            let mut covered: HashSet<usize> = HashSet::new();
            covered.insert(title);
            covered.extend(amount);
            covered.extend(product);
            covered.extend(references.iter().map(|(_, idx)| *idx));
            covered.extend(custom_fields.values().flatten().map(|(_, idx)| *idx));
            covered.extend(routing_column);
            covered.extend(product_item.as_ref().map(|(_, idx)| *idx));
            (0..columns.width()).filter(|idx| !covered.contains(idx)).collect()
        } else {
            Vec::new()
        };

        Ok(ImportPlan {
            columns,
            router,
            routing_column,
            title,
            amount,
            product,
            references,
            custom_fields,
            unmapped,
            field_target_step,
            default_field_type,
            product_item,
        })
    }

    /// 处理单行并落库
    ///
    /// # 返回
    /// - Ok(card_id)
    /// - Err: 行级错误（由调用方记录）
    #[allow(clippy::too_many_arguments)]
    async fn process_row(
        &self,
        client_id: &str,
        config: &ImportConfig,
        plan: &ImportPlan,
        registry: &mut FieldRegistry,
        row: &CsvRow,
        step_id: &str,
        batch_id: &str,
    ) -> ImportResult<String> {
        let columns = &plan.columns;
        let cell = |idx: usize| self.data_cleaner.normalize_null(columns.cell(row, idx));

        // === 原生字段 ===
        let title = cell(plan.title).ok_or_else(|| ImportError::RowProcessing {
            row: row.row_number,
            message: "缺少必填字段: title".to_string(),
        })?;

        let amount = match plan.amount.and_then(cell) {
            Some(raw) => Some(self.parse_money("amount", &raw)?),
            None => None,
        };
        let product = plan.product.and_then(cell);

        let mut resolved: HashMap<ReferenceKind, String> = HashMap::new();
        for (kind, idx) in &plan.references {
            let Some(value) = cell(*idx) else {
                continue;
            };
            let id = self
                .repo
                .resolve_reference(client_id, *kind, &value)
                .await?
                .ok_or_else(|| ImportError::ReferenceNotFound {
                    field: kind.to_string(),
                    value: value.clone(),
                })?;
            resolved.insert(*kind, id);
        }

        // === 自定义字段 ===
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        if let Some(entries) = plan.custom_fields.get(step_id) {
            for (field_id, idx) in entries {
                if let Some(value) = cell(*idx) {
                    values.insert(field_id.clone(), value);
                }
            }
        }

        for idx in &plan.unmapped {
            let Some(value) = cell(*idx) else {
                continue;
            };
            let field_type = plan
                .default_field_type
                .unwrap_or_else(|| self.data_cleaner.infer_field_type(&value));
            let field = registry
                .ensure_field(
                    &self.repo,
                    client_id,
                    *idx,
                    &Self::field_name(columns, config.skip_header_row, *idx),
                    plan.field_target_step.as_deref().unwrap_or(step_id),
                    field_type,
                )
                .await?;
            values.insert(field.id, value);
        }

        // === 商品条目 ===
        let line_item = match &plan.product_item {
            Some((item_id, idx)) => match cell(*idx) {
                Some(raw) => Some(CardLineItem {
                    item_id: item_id.clone(),
                    amount: self.parse_money("productValueToExistingItem", &raw)?,
                    quantity: 1,
                }),
                None => None,
            },
            None => None,
        };

        // === 落库 ===
        let card = NewCard {
            id: Uuid::new_v4().to_string(),
            flow_id: config.flow_id.trim().to_string(),
            step_id: step_id.to_string(),
            title,
            amount,
            product,
            contact_id: resolved.remove(&ReferenceKind::Contact),
            company_id: resolved.remove(&ReferenceKind::Company),
            lead_id: resolved.remove(&ReferenceKind::Lead),
            assignee_id: resolved.remove(&ReferenceKind::User),
            team_id: resolved.remove(&ReferenceKind::Team),
            field_values: values
                .into_iter()
                .map(|(field_id, value)| CardFieldValue { field_id, value })
                .collect(),
            line_item,
            import_batch_id: batch_id.to_string(),
            source_row: row.row_number,
            created_at: Utc::now(),
        };

        Ok(self.repo.insert_card(client_id, card).await?)
    }

    fn parse_money(&self, field: &str, raw: &str) -> ImportResult<f64> {
        self.data_cleaner
            .parse_amount(raw)
            .ok_or_else(|| ImportError::AmountParseError {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }

    /// 自动建字段的名称: 表头标签，无表头时为「列 N」
    fn field_name(columns: &ColumnIndex, has_header: bool, idx: usize) -> String {
        match columns.header_label(idx).filter(|_| has_header) {
            Some(label) => label.to_string(),
            None => i18n::t_with_args("import.column_name", &[("index", (idx + 1).to_string().as_str())]),
        }
    }

    /// 失败行的原始数据（列标签 → 单元格）
    fn row_data(columns: &ColumnIndex, row: &CsvRow) -> BTreeMap<String, String> {
        row.cells
            .iter()
            .enumerate()
            .map(|(idx, value)| (columns.label(idx), value.clone()))
            .collect()
    }
}

#[async_trait]
impl<R, C> CardImporter for CardImporterImpl<R, C>
where
    R: CardImportRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, payload), fields(batch_id = tracing::field::Empty))]
    async fn import_cards(
        &self,
        client_id: &str,
        payload: ImportCardsCsvPayload,
    ) -> ImportResult<ImportCardsCsvResponse> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        let ImportCardsCsvPayload { csv_file, config } = payload;

        info!(
            tenant = %client_id,
            flow_id = %config.flow_id,
            encoded_len = csv_file.len(),
            "开始导入卡片"
        );

        // === 步骤 1: 解码上传内容 ===
        let max_bytes = self.config.get_max_payload_bytes(client_id).await?;
        let text = PayloadDecoder::new(max_bytes).decode(&csv_file)?;
        drop(csv_file);
        debug!(decoded_len = text.len(), "上传内容解码完成");

        // === 步骤 2: 解析 CSV ===
        let table = self.file_parser.parse(&text, config.skip_header_row)?;
        drop(text);
        let max_rows = self.config.get_max_rows(client_id).await?;
        if table.rows.len() > max_rows {
            return Err(ImportError::TooManyRows {
                actual: table.rows.len(),
                limit: max_rows,
            });
        }
        info!(total_rows = table.rows.len(), columns = table.width, "CSV 解析完成");

        // === 步骤 3: 请求级校验 ===
        let columns = ColumnIndex::new(table.labels, table.width);
        let plan = self.prepare(client_id, &config, columns).await?;
        debug!(
            unmapped_columns = plan.unmapped.len(),
            routed = plan.routing_column.is_some(),
            "导入配置校验通过"
        );

        // === 步骤 4: 逐行处理 ===
        let batch_size = match config.batch_size.filter(|n| *n > 0) {
            Some(n) => n,
            None => self.config.get_default_batch_size(client_id).await?,
        };

        let total_rows = table.rows.len();
        let mut registry = FieldRegistry::new();
        let mut results: Vec<RowResult> = Vec::with_capacity(total_rows);
        let mut errors: Vec<RowError> = Vec::new();
        let mut successful = 0usize;

        for (chunk_idx, chunk) in table.rows.chunks(batch_size).enumerate() {
            debug!(chunk = chunk_idx + 1, rows = chunk.len(), "处理批次");

            for row in chunk {
                let routing_value = plan
                    .routing_column
                    .and_then(|idx| plan.columns.cell(row, idx));
                let step_id = plan.router.resolve(routing_value).to_string();

                match self
                    .process_row(client_id, &config, &plan, &mut registry, row, &step_id, &batch_id)
                    .await
                {
                    Ok(card_id) => {
                        successful += 1;
                        results.push(RowResult::success(row.row_number, card_id, step_id));
                    }
                    Err(e) if e.is_row_level() => {
                        warn!(row = row.row_number, step_id = %step_id, error = %e, "行导入失败");
                        let message = e.to_string();
                        if config.include_error_details {
                            errors.push(RowError {
                                row: row.row_number,
                                error: message.clone(),
                                data: Self::row_data(&plan.columns, row),
                            });
                        }
                        results.push(RowResult::failure(row.row_number, message, step_id));
                    }
                    Err(e) => return Err(e),
                }
            }

            info!(
                processed = results.len(),
                total = total_rows,
                "批次处理完成"
            );
        }

        let failed = total_rows - successful;
        let summary = ImportSummary {
            total_rows,
            successful_imports: successful,
            failed_imports: failed,
            fields_created: registry.created_count(),
        };

        info!(
            tenant = %client_id,
            total_rows = summary.total_rows,
            success = summary.successful_imports,
            failed = summary.failed_imports,
            fields_created = summary.fields_created,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "卡片导入完成"
        );

        let message = i18n::t_with_args(
            "import.summary",
            &[
                ("total", total_rows.to_string().as_str()),
                ("success", successful.to_string().as_str()),
                ("failed", failed.to_string().as_str()),
            ],
        );

        Ok(ImportCardsCsvResponse {
            success: true,
            message,
            batch_id,
            summary,
            results,
            created_fields: registry.into_created(),
            errors,
        })
    }
}
