// ==========================================
// ARPA 合规报送系统 - 报送期领域模型
// ==========================================
// 用途: 报送期窗口与可选校验规则的启用标签
// 对齐: reporting_periods 表
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ReportingPeriod - 报送期
// ==========================================
// 租户范围内的日期区间,上传归集于此,
// 并通过 validation_rule_tags 控制带标签规则的启用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingPeriod {
    // ===== 主键 =====
    pub id: i64,

    // ===== 归属 =====
    pub tenant_id: i64,

    // ===== 基本信息 =====
    pub name: String,                   // 如 "Quarterly 3"
    pub start_date: NaiveDate,          // 报送期起始（含）
    pub end_date: NaiveDate,            // 报送期截止（含）
    pub template_filename: Option<String>, // 本期使用的输入模板文件名

    // ===== 规则启用标签 =====
    // 空列表 = 仅执行无标签规则
    pub validation_rule_tags: Vec<String>,

    // ===== 结账状态 =====
    pub certified_at: Option<DateTime<Utc>>, // 结账认证时间（None = 仍开放）
    pub certified_by: Option<String>,        // 认证人

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
}

impl ReportingPeriod {
    /// 是否已结账认证
    pub fn is_certified(&self) -> bool {
        self.certified_at.is_some()
    }

    /// 标签是否启用
    pub fn has_tag(&self, tag: &str) -> bool {
        self.validation_rule_tags.iter().any(|t| t == tag)
    }

    /// 日期是否落在本报送期内（含边界）
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_period(tags: Vec<&str>) -> ReportingPeriod {
        ReportingPeriod {
            id: 1,
            tenant_id: 1,
            name: "Quarterly 1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2022, 3, 31).unwrap(),
            template_filename: None,
            validation_rule_tags: tags.into_iter().map(String::from).collect(),
            certified_at: None,
            certified_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_contains_is_inclusive() {
        let period = sample_period(vec![]);
        assert!(period.contains(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));
        assert!(period.contains(NaiveDate::from_ymd_opt(2022, 3, 31).unwrap()));
        assert!(!period.contains(NaiveDate::from_ymd_opt(2022, 4, 1).unwrap()));
    }

    #[test]
    fn test_has_tag() {
        let period = sample_period(vec!["cumulative-totals"]);
        assert!(period.has_tag("cumulative-totals"));
        assert!(!period.has_tag("subrecipient-dedup"));
    }
}
