// ==========================================
// ARPA 合规报送系统 - 报送期仓储
// ==========================================
// 职责: reporting_periods / application_settings 表数据访问
// 说明: validation_rule_tags 以 JSON 文本列存储
//       （SQLite 无数组类型）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::reporting_period::ReportingPeriod;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ReportingPeriodRepository
// ==========================================
pub struct ReportingPeriodRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReportingPeriodRepository {
    /// 创建新的 Repository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（测试/组合使用）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建报送期,返回新 ID
    pub fn create(&self, period: &ReportingPeriod) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO reporting_periods (
                tenant_id, name, start_date, end_date, template_filename,
                validation_rule_tags, certified_at, certified_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                period.tenant_id,
                period.name,
                period.start_date,
                period.end_date,
                period.template_filename,
                serde_json::to_string(&period.validation_rule_tags)?,
                period.certified_at,
                period.certified_by,
                period.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 ID 查询
    pub fn get(&self, id: i64) -> RepositoryResult<Option<ReportingPeriod>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_period)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 租户下全部报送期（按截止日倒序）
    pub fn list_all(&self, tenant_id: i64) -> RepositoryResult<Vec<ReportingPeriod>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE tenant_id = ?1 ORDER BY end_date DESC"
        ))?;
        let rows = stmt.query_map(params![tenant_id], row_to_period)?;
        collect_rows(rows)
    }

    /// 指定报送期及其之前的全部报送期（按截止日升序）
    ///
    /// 跨期累计规则需要读取历史期的记录
    pub fn get_previous(&self, period_id: i64) -> RepositoryResult<Vec<ReportingPeriod>> {
        let target = self.get(period_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "reporting_period".to_string(),
            id: period_id.to_string(),
        })?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE tenant_id = ?1 AND end_date <= ?2 ORDER BY end_date ASC"
        ))?;
        let rows = stmt.query_map(params![target.tenant_id, target.end_date], row_to_period)?;
        collect_rows(rows)
    }

    /// 当前报送期 ID
    pub fn get_current_period_id(&self, tenant_id: i64) -> RepositoryResult<Option<i64>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT current_reporting_period_id FROM application_settings WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get::<_, Option<i64>>(0),
        );
        match result {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 设置当前报送期
    pub fn set_current_period(&self, tenant_id: i64, period_id: i64) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO application_settings (tenant_id, current_reporting_period_id)
            VALUES (?1, ?2)
            ON CONFLICT(tenant_id) DO UPDATE SET current_reporting_period_id = ?2
            "#,
            params![tenant_id, period_id],
        )?;
        Ok(())
    }

    /// 结账认证报送期
    ///
    /// # 前置条件
    /// - 报送期尚未认证
    /// - 期内所有上传都已通过校验（失败的上传必须先作废或修复）
    pub fn certify(&self, period_id: i64, certified_by: &str) -> RepositoryResult<()> {
        let conn = self.lock()?;

        let already: Option<String> = conn
            .query_row(
                "SELECT certified_at FROM reporting_periods WHERE id = ?1",
                params![period_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "reporting_period".to_string(),
                    id: period_id.to_string(),
                },
                other => other.into(),
            })?;
        if already.is_some() {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "报送期 {period_id} 已认证,不允许重复认证"
            )));
        }

        let pending: i64 = conn.query_row(
            "SELECT COUNT(*) FROM uploads
             WHERE reporting_period_id = ?1 AND validated_at IS NULL AND invalidated_at IS NULL",
            params![period_id],
            |row| row.get(0),
        )?;
        if pending > 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "报送期 {period_id} 仍有 {pending} 个未通过校验的上传"
            )));
        }

        conn.execute(
            "UPDATE reporting_periods SET certified_at = ?2, certified_by = ?3 WHERE id = ?1",
            params![period_id, Utc::now(), certified_by],
        )?;
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, tenant_id, name, start_date, end_date, \
     template_filename, validation_rule_tags, certified_at, certified_by, created_at \
     FROM reporting_periods";

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<ReportingPeriod>>,
) -> RepositoryResult<Vec<ReportingPeriod>> {
    let mut periods = Vec::new();
    for row in rows {
        periods.push(row?);
    }
    Ok(periods)
}

/// 行 → ReportingPeriod
fn row_to_period(row: &Row<'_>) -> rusqlite::Result<ReportingPeriod> {
    let tags_json: String = row.get(6)?;
    let validation_rule_tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ReportingPeriod {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        template_filename: row.get(5)?,
        validation_rule_tags,
        certified_at: row.get(7)?,
        certified_by: row.get(8)?,
        created_at: row.get(9)?,
    })
}
