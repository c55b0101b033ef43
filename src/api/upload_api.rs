// ==========================================
// ARPA 合规报送系统 - 上传API
// ==========================================
// 职责: 封装上传、校验、重校验、导出相关功能
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{BatchConfig, UploadConfig};
use crate::db::open_sqlite_connection;
use crate::domain::upload::{Upload, ValidationMessage};
use crate::engine::batch_processor::{BatchJob, BatchProcessor};
use crate::engine::rules::get_rules;
use crate::engine::upload_validator::UploadValidator;
use crate::importer::cell_format_fixer::fix_cell_formats;
use crate::importer::record_extractor::RecordExtractor;
use crate::importer::workbook_parser::WorkbookParser;
use crate::importer::workbook_writer::WorkbookWriter;
use crate::repository::{AgencyRepository, ReportingPeriodRepository, UploadRepository};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// 数据页表头所在行（显示格式修复用,与记录提取器一致）
const DATA_SHEET_TITLE_ROW: u32 = 3;

/// 上传API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadApiResponse {
    /// 上传批次 ID
    pub upload_id: Uuid,
    /// 是否通过校验
    pub validated: bool,
    /// 全部校验消息（err + warn）
    pub messages: Vec<ValidationMessage>,
    /// err 级消息数
    pub error_count: usize,
    /// warn 级消息数
    pub warning_count: usize,
    /// 校验耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 重校验汇总
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RevalidationSummary {
    /// 扫描的上传数
    pub checked: usize,
    /// 仍然通过的上传数
    pub passed: usize,
    /// 本轮被打回的上传数
    pub failed: usize,
}

/// 上传API
pub struct UploadApi {
    db_path: String,
    tenant_id: i64,
    config: UploadConfig,
}

impl UploadApi {
    /// 创建新的UploadApi实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - tenant_id: 租户（州级隔离范围）
    /// - config: 上传处理配置
    pub fn new(db_path: String, tenant_id: i64, config: UploadConfig) -> Self {
        Self {
            db_path,
            tenant_id,
            config,
        }
    }

    /// 上传并校验一个报送工作簿
    ///
    /// # 参数
    /// - file_path: 工作簿路径
    /// - reporting_period_id: 所属报送期
    /// - user_id: 上传用户
    ///
    /// # 流程
    /// 1. 解析工作簿
    /// 2. 落盘 + 登记上传批次
    /// 3. 提取记录
    /// 4. 执行校验
    /// 5. 回填机构/EC 代码与校验状态
    pub async fn upload_and_validate(
        &self,
        file_path: &Path,
        reporting_period_id: i64,
        user_id: Option<i64>,
    ) -> ApiResult<UploadApiResponse> {
        let start_time = std::time::Instant::now();

        // === 步骤 1: 解析工作簿 ===
        let workbook = WorkbookParser::parse(file_path)?;

        let conn = self.open_connection()?;
        let upload_repo = UploadRepository::from_connection(Arc::clone(&conn));
        let period_repo = ReportingPeriodRepository::from_connection(Arc::clone(&conn));
        let agency_repo = AgencyRepository::from_connection(Arc::clone(&conn));

        let period = period_repo
            .get(reporting_period_id)?
            .ok_or_else(|| ApiError::NotFound(format!("报送期(id={})不存在", reporting_period_id)))?;
        if period.is_certified() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "报送期 {} 已认证,不再接受上传",
                period.name
            )));
        }

        // === 步骤 2: 落盘 + 登记 ===
        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidInput("文件名不合法".to_string()))?;
        let upload = Upload::new(self.tenant_id, reporting_period_id, filename, user_id);
        self.persist_upload_file(file_path, &upload)?;
        upload_repo.insert(&upload)?;

        info!(upload_id = %upload.id, filename, "上传已登记");

        // === 步骤 3: 提取记录 ===
        let rules = get_rules();
        let records = RecordExtractor::new(rules).extract(&workbook)?;

        // === 步骤 4: 执行校验 ===
        let agencies = agency_repo.list_all(self.tenant_id)?;
        let validator = UploadValidator::new(rules);
        let outcome = validator.validate(&records, &period, &agencies, Utc::now().date_naive());

        // === 步骤 5: 回填 ===
        // 机构/EC 代码即使校验失败也回填,便于 UI 归属展示
        if let Some(agency_id) = outcome.agency_id {
            upload_repo.set_agency_id(upload.id, agency_id)?;
        }
        if let Some(ec_code) = &outcome.ec_code {
            upload_repo.set_ec_code(upload.id, ec_code)?;
        }
        if outcome.validated {
            upload_repo.mark_validated(upload.id, user_id, Utc::now())?;
        }

        let error_count = outcome
            .messages
            .iter()
            .filter(|m| m.severity == crate::domain::types::Severity::Err)
            .count();
        let warning_count = outcome.messages.len() - error_count;

        Ok(UploadApiResponse {
            upload_id: upload.id,
            validated: outcome.validated,
            messages: outcome.messages,
            error_count,
            warning_count,
            elapsed_ms: start_time.elapsed().as_millis() as i64,
        })
    }

    /// 批量上传多个文件（并发执行）
    ///
    /// # 说明
    /// - 每个文件的上传与校验相互独立,单个失败不影响其他文件
    pub async fn upload_many(
        &self,
        file_paths: Vec<PathBuf>,
        reporting_period_id: i64,
        user_id: Option<i64>,
    ) -> Vec<Result<UploadApiResponse, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量上传");

        let tasks = file_paths.into_iter().map(|path| {
            let path_str = path.display().to_string();
            async move {
                match self
                    .upload_and_validate(&path, reporting_period_id, user_id)
                    .await
                {
                    Ok(response) => {
                        info!(
                            file = %path_str,
                            validated = response.validated,
                            "文件上传完成"
                        );
                        Ok(response)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件上传失败");
                        Err(format!("文件 {} 上传失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量上传完成"
        );

        results
    }

    /// 对已通过校验的上传做一轮重校验扫描
    ///
    /// 规则表或报送期标签变更后,历史上传可能不再满足当前规则,
    /// 这里按批拉取并逐个复核,不通过的打回
    pub async fn revalidate_uploads(&self, batch: BatchConfig) -> ApiResult<RevalidationSummary> {
        let conn = self.open_connection()?;
        let job = Arc::new(RevalidationJob {
            upload_repo: UploadRepository::from_connection(Arc::clone(&conn)),
            period_repo: ReportingPeriodRepository::from_connection(Arc::clone(&conn)),
            agency_repo: AgencyRepository::from_connection(Arc::clone(&conn)),
            uploads_dir: self.config.uploads_dir.clone(),
            tenant_id: self.tenant_id,
            checked: AtomicUsize::new(0),
            passed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });

        let mut processor = BatchProcessor::new(Arc::clone(&job), batch.into());
        processor.run().await.map_err(ApiError::Other)?;

        let summary = RevalidationSummary {
            checked: job.checked.load(Ordering::SeqCst),
            passed: job.passed.load(Ordering::SeqCst),
            failed: job.failed.load(Ordering::SeqCst),
        };
        info!(
            checked = summary.checked,
            passed = summary.passed,
            failed = summary.failed,
            "重校验扫描完成"
        );
        Ok(summary)
    }

    /// 生成显示格式修复后的工作簿副本（供下载复核）
    ///
    /// 数据页按模板表头行识别日期/金额列并写入显示掩码
    pub fn download_repaired_workbook(
        &self,
        file_path: &Path,
        out_path: &Path,
    ) -> ApiResult<()> {
        let mut workbook = WorkbookParser::parse(file_path)?;

        for worksheet in &mut workbook.worksheets {
            if crate::domain::types::RecordType::from_sheet_name(&worksheet.name)
                .map(|t| crate::domain::types::RecordType::DATA_SHEET_TYPES.contains(&t))
                .unwrap_or(false)
            {
                fix_cell_formats(
                    &mut worksheet.sheet,
                    DATA_SHEET_TITLE_ROW,
                    &self.config.currency_format,
                );
            }
        }

        WorkbookWriter::write(&workbook, out_path)?;
        info!(out = %out_path.display(), "修复格式的工作簿已写出");
        Ok(())
    }

    /// 校验消息导出为 CSV（上传复核页的下载件）
    pub fn export_messages_csv(
        &self,
        messages: &[ValidationMessage],
        out_path: &Path,
    ) -> ApiResult<()> {
        let mut writer = csv::Writer::from_path(out_path)
            .map_err(crate::importer::error::ImportError::from)?;

        writer
            .write_record(["severity", "tab", "row", "col", "message"])
            .map_err(crate::importer::error::ImportError::from)?;
        for message in messages {
            writer
                .write_record([
                    message.severity.to_string(),
                    message.tab.clone().unwrap_or_default(),
                    message.row.map(|r| r.to_string()).unwrap_or_default(),
                    message.col.clone().unwrap_or_default(),
                    message.message.clone(),
                ])
                .map_err(crate::importer::error::ImportError::from)?;
        }
        writer
            .flush()
            .map_err(|e| ApiError::ExportError(e.to_string()))?;
        Ok(())
    }

    fn open_connection(&self) -> ApiResult<Arc<Mutex<Connection>>> {
        let conn = open_sqlite_connection(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Ok(Arc::new(Mutex::new(conn)))
    }

    /// 上传文件落盘: uploads_dir/<upload_id>/<filename>
    fn persist_upload_file(&self, file_path: &Path, upload: &Upload) -> ApiResult<()> {
        let dir = self.config.uploads_dir.join(upload.id.to_string());
        std::fs::create_dir_all(&dir)
            .map_err(|e| ApiError::InternalError(format!("创建上传目录失败: {}", e)))?;
        std::fs::copy(file_path, dir.join(&upload.filename))
            .map_err(|e| ApiError::InternalError(format!("上传文件落盘失败: {}", e)))?;
        Ok(())
    }
}

// ==========================================
// RevalidationJob - 重校验批处理任务
// ==========================================
// 单个上传的复核失败只记日志和计数,不中断整轮扫描;
// 数据库访问错误原样上抛
struct RevalidationJob {
    upload_repo: UploadRepository,
    period_repo: ReportingPeriodRepository,
    agency_repo: AgencyRepository,
    uploads_dir: PathBuf,
    tenant_id: i64,
    checked: AtomicUsize,
    passed: AtomicUsize,
    failed: AtomicUsize,
}

impl RevalidationJob {
    /// 复核单个上传,返回是否仍然通过
    fn revalidate_one(&self, upload: &Upload) -> anyhow::Result<bool> {
        let path = self
            .uploads_dir
            .join(upload.id.to_string())
            .join(&upload.filename);
        let workbook = WorkbookParser::parse(&path)?;

        let rules = get_rules();
        let records = RecordExtractor::new(rules).extract(&workbook)?;

        let period = self
            .period_repo
            .get(upload.reporting_period_id)?
            .ok_or_else(|| anyhow::anyhow!("报送期(id={})不存在", upload.reporting_period_id))?;
        let agencies = self.agency_repo.list_all(self.tenant_id)?;

        let outcome = UploadValidator::new(rules).validate(
            &records,
            &period,
            &agencies,
            Utc::now().date_naive(),
        );
        Ok(outcome.validated)
    }
}

#[async_trait]
impl BatchJob for RevalidationJob {
    type Item = Upload;

    async fn fetch_records(&self, page_size: usize, offset: usize) -> anyhow::Result<Vec<Upload>> {
        Ok(self.upload_repo.list_validated_page(page_size, offset)?)
    }

    async fn process_records(&self, uploads: Vec<Upload>) -> anyhow::Result<()> {
        for upload in uploads {
            self.checked.fetch_add(1, Ordering::SeqCst);
            match self.revalidate_one(&upload) {
                Ok(true) => {
                    self.passed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(false) => {
                    warn!(upload_id = %upload.id, "上传不再满足当前规则,打回");
                    self.upload_repo.mark_not_validated(upload.id)?;
                    self.failed.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    // 文件缺失/解析失败: 留给人工处理,不中断扫描
                    warn!(upload_id = %upload.id, error = %e, "上传复核失败,跳过");
                    self.failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }
}
