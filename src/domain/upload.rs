// ==========================================
// ARPA 合规报送系统 - 上传领域模型
// ==========================================
// 用途: 上传批次与校验消息
// 红线: ValidationMessage 创建后不可变,只追加不修改
// ==========================================

use crate::domain::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Upload - 上传批次
// ==========================================
// 一次提交的报送工作簿,挂在一个报送期之下
// 对齐: uploads 表 (UUID 主键)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    // ===== 主键 =====
    pub id: Uuid,

    // ===== 归属 =====
    pub tenant_id: i64,                 // 租户（州级隔离范围）
    pub reporting_period_id: i64,       // 所属报送期
    pub agency_id: Option<i64>,         // 报送机构（校验时由封面页回填）
    pub user_id: Option<i64>,           // 上传用户

    // ===== 文件信息 =====
    pub filename: String,               // 原始文件名
    pub ec_code: Option<String>,        // EC 代码（校验时由封面页回填）

    // ===== 校验状态 =====
    pub validated_at: Option<DateTime<Utc>>, // 最近一次通过校验的时间
    pub validated_by: Option<i64>,           // 执行校验的用户
    pub invalidated_at: Option<DateTime<Utc>>, // 被作废的时间

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
}

impl Upload {
    /// 创建新的上传批次（尚未校验）
    pub fn new(tenant_id: i64, reporting_period_id: i64, filename: &str, user_id: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            reporting_period_id,
            agency_id: None,
            user_id,
            filename: filename.to_string(),
            ec_code: None,
            validated_at: None,
            validated_by: None,
            invalidated_at: None,
            created_at: Utc::now(),
        }
    }

    /// 是否已通过校验（且未被作废）
    pub fn is_validated(&self) -> bool {
        self.validated_at.is_some() && self.invalidated_at.is_none()
    }
}

// ==========================================
// Agency - 报送机构
// ==========================================
// 封面页 Agency Code 以 code 对齐此表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    pub id: i64,
    pub tenant_id: i64,
    pub code: String,
    pub name: String,
}

// ==========================================
// ValidationMessage - 校验消息
// ==========================================
// 校验产出的数据,不是异常: 规则不命中时静默,命中时生成一条消息
// tab 在返回调用方之前由记录类型映射回页签名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// 给报送人看的解释文本（引用模板列名,保持英文原文）
    pub message: String,
    /// err = 阻断校验通过; warn = 仅提示
    pub severity: Severity,
    /// 页签名（或记录类型短名,待映射）
    pub tab: Option<String>,
    /// 页内行号（1 起）
    pub row: Option<u32>,
    /// 列标（如 "D" 或 "C, D"）
    pub col: Option<String>,
}

impl ValidationMessage {
    /// 创建 err 级别消息
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Err,
            tab: None,
            row: None,
            col: None,
        }
    }

    /// 创建 warn 级别消息
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warn,
            tab: None,
            row: None,
            col: None,
        }
    }

    /// 设置定位信息（页签）
    pub fn with_tab(mut self, tab: impl Into<String>) -> Self {
        self.tab = Some(tab.into());
        self
    }

    /// 设置定位信息（行号）
    pub fn with_row(mut self, row: u32) -> Self {
        self.row = Some(row);
        self
    }

    /// 设置定位信息（列标）
    pub fn with_col(mut self, col: impl Into<String>) -> Self {
        self.col = Some(col.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_upload_is_not_validated() {
        let upload = Upload::new(1, 42, "report.xlsx", Some(7));
        assert!(!upload.is_validated(), "fresh upload must not be validated");
        assert_eq!(upload.reporting_period_id, 42);
    }

    #[test]
    fn test_invalidated_upload_is_not_validated() {
        let mut upload = Upload::new(1, 1, "report.xlsx", None);
        upload.validated_at = Some(Utc::now());
        assert!(upload.is_validated());

        upload.invalidated_at = Some(Utc::now());
        assert!(!upload.is_validated(), "invalidation must win over validated_at");
    }

    #[test]
    fn test_validation_message_builder() {
        let msg = ValidationMessage::err("EC code must be set")
            .with_tab("cover")
            .with_row(2)
            .with_col("D");
        assert_eq!(msg.severity, Severity::Err);
        assert_eq!(msg.tab.as_deref(), Some("cover"));
        assert_eq!(msg.row, Some(2));
        assert_eq!(msg.col.as_deref(), Some("D"));
    }
}
