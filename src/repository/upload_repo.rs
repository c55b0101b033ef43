// ==========================================
// ARPA 合规报送系统 - 上传仓储
// ==========================================
// 职责: uploads 表数据访问
// 红线: 不含校验逻辑,校验状态由 API 层依据校验结果回写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::upload::Upload;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// UploadRepository
// ==========================================
pub struct UploadRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UploadRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
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

    /// 插入上传记录
    pub fn insert(&self, upload: &Upload) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO uploads (
                id, tenant_id, filename, reporting_period_id, agency_id,
                ec_code, user_id, validated_at, validated_by, invalidated_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                upload.id.to_string(),
                upload.tenant_id,
                upload.filename,
                upload.reporting_period_id,
                upload.agency_id,
                upload.ec_code,
                upload.user_id,
                upload.validated_at,
                upload.validated_by,
                upload.invalidated_at,
                upload.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按 ID 查询
    pub fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Upload>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, filename, reporting_period_id, agency_id, ec_code,
                    user_id, validated_at, validated_by, invalidated_at, created_at
             FROM uploads WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id.to_string()], row_to_upload)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 报送期下的全部上传（按创建时间倒序）
    pub fn list_for_period(&self, reporting_period_id: i64) -> RepositoryResult<Vec<Upload>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, filename, reporting_period_id, agency_id, ec_code,
                    user_id, validated_at, validated_by, invalidated_at, created_at
             FROM uploads WHERE reporting_period_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![reporting_period_id], row_to_upload)?;
        collect_rows(rows)
    }

    /// 分页拉取已通过校验的上传（重校验轮询的数据源）
    ///
    /// # 参数
    /// - page_size: 每页记录数
    /// - offset: 分页偏移
    pub fn list_validated_page(
        &self,
        page_size: usize,
        offset: usize,
    ) -> RepositoryResult<Vec<Upload>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, filename, reporting_period_id, agency_id, ec_code,
                    user_id, validated_at, validated_by, invalidated_at, created_at
             FROM uploads
             WHERE validated_at IS NOT NULL AND invalidated_at IS NULL
             ORDER BY created_at ASC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![page_size as i64, offset as i64], row_to_upload)?;
        collect_rows(rows)
    }

    /// 报送期内参与财政部导出的上传
    ///
    /// 同一 (机构, EC 代码) 只取最近一次通过校验的上传
    pub fn used_for_treasury_export(
        &self,
        reporting_period_id: i64,
    ) -> RepositoryResult<Vec<Upload>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, tenant_id, filename, reporting_period_id, agency_id, ec_code,
                   user_id, validated_at, validated_by, invalidated_at, created_at
            FROM uploads u
            WHERE u.reporting_period_id = ?1
              AND u.validated_at IS NOT NULL
              AND u.invalidated_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM uploads newer
                  WHERE newer.reporting_period_id = u.reporting_period_id
                    AND newer.validated_at IS NOT NULL
                    AND newer.invalidated_at IS NULL
                    AND COALESCE(newer.agency_id, -1) = COALESCE(u.agency_id, -1)
                    AND COALESCE(newer.ec_code, '') = COALESCE(u.ec_code, '')
                    AND newer.validated_at > u.validated_at
              )
            ORDER BY u.created_at ASC
            "#,
        )?;
        let rows = stmt.query_map(params![reporting_period_id], row_to_upload)?;
        collect_rows(rows)
    }

    /// 回填机构 ID（即使校验失败也保留,便于 UI 归属展示）
    pub fn set_agency_id(&self, id: Uuid, agency_id: i64) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE uploads SET agency_id = ?2 WHERE id = ?1",
            params![id.to_string(), agency_id],
        )?;
        ensure_found(changed, id)
    }

    /// 回填 EC 代码
    pub fn set_ec_code(&self, id: Uuid, ec_code: &str) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE uploads SET ec_code = ?2 WHERE id = ?1",
            params![id.to_string(), ec_code],
        )?;
        ensure_found(changed, id)
    }

    /// 标记通过校验
    pub fn mark_validated(
        &self,
        id: Uuid,
        user_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE uploads SET validated_at = ?2, validated_by = ?3, invalidated_at = NULL
             WHERE id = ?1",
            params![id.to_string(), at, user_id],
        )?;
        ensure_found(changed, id)
    }

    /// 标记未通过校验（清除既有校验状态）
    pub fn mark_not_validated(&self, id: Uuid) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE uploads SET validated_at = NULL, validated_by = NULL, invalidated_at = ?2
             WHERE id = ?1",
            params![id.to_string(), Utc::now()],
        )?;
        ensure_found(changed, id)
    }
}

fn ensure_found(changed: usize, id: Uuid) -> RepositoryResult<()> {
    if changed == 0 {
        return Err(RepositoryError::NotFound {
            entity: "upload".to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<Upload>>,
) -> RepositoryResult<Vec<Upload>> {
    let mut uploads = Vec::new();
    for row in rows {
        uploads.push(row?);
    }
    Ok(uploads)
}

/// 行 → Upload
fn row_to_upload(row: &Row<'_>) -> rusqlite::Result<Upload> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Upload {
        id,
        tenant_id: row.get(1)?,
        filename: row.get(2)?,
        reporting_period_id: row.get(3)?,
        agency_id: row.get(4)?,
        ec_code: row.get(5)?,
        user_id: row.get(6)?,
        validated_at: row.get(7)?,
        validated_by: row.get(8)?,
        invalidated_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}
