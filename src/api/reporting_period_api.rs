// ==========================================
// ARPA 合规报送系统 - 报送期API
// ==========================================
// 职责: 报送期的查询、创建、认证与当前期切换
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::db::open_sqlite_connection;
use crate::domain::reporting_period::ReportingPeriod;
use crate::repository::ReportingPeriodRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 报送期API
pub struct ReportingPeriodApi {
    db_path: String,
    tenant_id: i64,
}

impl ReportingPeriodApi {
    /// 创建新的ReportingPeriodApi实例
    pub fn new(db_path: String, tenant_id: i64) -> Self {
        Self { db_path, tenant_id }
    }

    /// 租户下全部报送期
    pub async fn list_periods(&self) -> ApiResult<Vec<ReportingPeriod>> {
        let repo = self.repo()?;
        Ok(repo.list_all(self.tenant_id)?)
    }

    /// 按 ID 查询报送期
    pub async fn get_period(&self, period_id: i64) -> ApiResult<ReportingPeriod> {
        let repo = self.repo()?;
        repo.get(period_id)?
            .ok_or_else(|| ApiError::NotFound(format!("报送期(id={})不存在", period_id)))
    }

    /// 创建报送期
    pub async fn create_period(&self, period: &ReportingPeriod) -> ApiResult<i64> {
        if period.start_date > period.end_date {
            return Err(ApiError::InvalidInput(
                "报送期起始日不能晚于截止日".to_string(),
            ));
        }
        let repo = self.repo()?;
        let id = repo.create(period)?;
        info!(period_id = id, name = %period.name, "报送期已创建");
        Ok(id)
    }

    /// 当前报送期
    pub async fn current_period(&self) -> ApiResult<Option<ReportingPeriod>> {
        let repo = self.repo()?;
        match repo.get_current_period_id(self.tenant_id)? {
            Some(id) => Ok(repo.get(id)?),
            None => Ok(None),
        }
    }

    /// 切换当前报送期
    pub async fn set_current_period(&self, period_id: i64) -> ApiResult<()> {
        let repo = self.repo()?;
        // 确认存在再切换
        repo.get(period_id)?
            .ok_or_else(|| ApiError::NotFound(format!("报送期(id={})不存在", period_id)))?;
        repo.set_current_period(self.tenant_id, period_id)?;
        info!(period_id, "当前报送期已切换");
        Ok(())
    }

    /// 结账认证报送期
    ///
    /// 期内存在未通过校验的上传时拒绝认证
    pub async fn certify_period(&self, period_id: i64, certified_by: &str) -> ApiResult<()> {
        let repo = self.repo()?;
        repo.certify(period_id, certified_by)?;
        info!(period_id, certified_by, "报送期已认证");
        Ok(())
    }

    fn repo(&self) -> ApiResult<ReportingPeriodRepository> {
        let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(
            open_sqlite_connection(&self.db_path)
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?,
        ));
        Ok(ReportingPeriodRepository::from_connection(conn))
    }
}
