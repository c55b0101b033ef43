// ==========================================
// ARPA 合规报送系统 - 机构仓储
// ==========================================
// 职责: agencies 表数据访问
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::upload::Agency;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// AgencyRepository
// ==========================================
pub struct AgencyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AgencyRepository {
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

    /// 插入机构,返回新 ID
    pub fn insert(&self, tenant_id: i64, code: &str, name: &str) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO agencies (tenant_id, code, name) VALUES (?1, ?2, ?3)",
            params![tenant_id, code, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 租户下全部机构（机构代码查验用）
    pub fn list_all(&self, tenant_id: i64) -> RepositoryResult<Vec<Agency>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, code, name FROM agencies WHERE tenant_id = ?1 ORDER BY code",
        )?;
        let rows = stmt.query_map(params![tenant_id], row_to_agency)?;
        let mut agencies = Vec::new();
        for row in rows {
            agencies.push(row?);
        }
        Ok(agencies)
    }

    /// 按机构代码查询
    pub fn find_by_code(&self, tenant_id: i64, code: &str) -> RepositoryResult<Option<Agency>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT id, tenant_id, code, name FROM agencies WHERE tenant_id = ?1 AND code = ?2",
            params![tenant_id, code],
            row_to_agency,
        );
        match result {
            Ok(agency) => Ok(Some(agency)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// 行 → Agency
fn row_to_agency(row: &Row<'_>) -> rusqlite::Result<Agency> {
    Ok(Agency {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
    })
}
