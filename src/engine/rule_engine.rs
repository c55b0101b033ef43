// ==========================================
// ARPA 合规报送系统 - 带标签校验规则引擎
// ==========================================
// 职责: 记录级业务规则的显式筛选与执行
// 调度: 无标签规则始终启用; 带标签规则仅当报送期启用对应标签时执行
// 红线: 规则是 (record, context) 的纯函数,规则间无共享可变状态
// ==========================================

use crate::domain::record::Record;
use crate::domain::reporting_period::ReportingPeriod;
use crate::domain::types::RecordType;
use crate::domain::upload::ValidationMessage;
use crate::importer::value_formatters::value_as_date;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

// ==========================================
// RuleContext - 规则执行上下文
// ==========================================
// 所有规则只读取上下文,不回写
#[derive(Debug, Clone)]
pub struct RuleContext {
    /// 封面页机构代码（文件标识元数据）
    pub agency_code: Option<String>,
    /// 封面页项目号（文件标识元数据）
    pub project_id: Option<String>,
    /// 报送期起始
    pub period_start: NaiveDate,
    /// 报送期截止
    pub period_end: NaiveDate,
    /// 资金使用期截止（绩效期）
    pub period_of_performance_end: NaiveDate,
    /// 报送期启用的规则标签
    pub tags: Vec<String>,
    /// 校验基准日
    pub as_of: NaiveDate,
}

impl RuleContext {
    /// 由报送期元数据构建上下文
    pub fn for_period(period: &ReportingPeriod, as_of: NaiveDate) -> Self {
        Self {
            agency_code: None,
            project_id: None,
            period_start: period.start_date,
            period_end: period.end_date,
            // SLFRF 绩效期截止日（资金必须在此之前完成支出）
            period_of_performance_end: NaiveDate::from_ymd_opt(2026, 12, 31)
                .expect("固定日期必然合法"),
            tags: period.validation_rule_tags.clone(),
            as_of,
        }
    }

    /// 设置文件标识元数据
    pub fn with_file_parts(
        mut self,
        agency_code: Option<String>,
        project_id: Option<String>,
    ) -> Self {
        self.agency_code = agency_code;
        self.project_id = project_id;
        self
    }
}

// ==========================================
// TaggedRule - 带标签记录规则
// ==========================================
// tags 为空 = 始终启用
pub struct TaggedRule {
    pub name: &'static str,
    pub tags: &'static [&'static str],
    /// 命中缺陷时返回一条消息,否则 None
    pub check: fn(&Record, &RuleContext) -> Option<ValidationMessage>,
}

impl TaggedRule {
    /// 规则在给定标签集下是否启用
    pub fn is_active(&self, active_tags: &[String]) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|t| active_tags.iter().any(|a| a == t))
    }
}

// ==========================================
// TaggedRuleEngine - 规则执行器
// ==========================================
pub struct TaggedRuleEngine {
    rules: Vec<TaggedRule>,
}

impl Default for TaggedRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggedRuleEngine {
    /// 使用内置规则集创建
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// 使用自定义规则集创建（测试用）
    pub fn with_rules(rules: Vec<TaggedRule>) -> Self {
        Self { rules }
    }

    /// 对记录序列执行所有启用的规则
    ///
    /// # 返回
    /// - 命中的校验消息序列（空 = 通过）
    pub fn run(&self, records: &[Record], ctx: &RuleContext) -> Vec<ValidationMessage> {
        // 显式筛选步骤: 先按标签挑出启用规则,再逐记录执行
        let active: Vec<&TaggedRule> = self
            .rules
            .iter()
            .filter(|rule| rule.is_active(&ctx.tags))
            .collect();

        let mut messages = Vec::new();
        for record in records {
            for rule in &active {
                if let Some(message) = (rule.check)(record, ctx) {
                    messages.push(
                        message
                            .with_tab(record.record_type.to_string())
                            .with_row(record.source_row),
                    );
                }
            }
        }
        messages
    }
}

// ==========================================
// 内置规则
// ==========================================

/// 内置记录规则集
///
/// 标签约定:
/// - 无标签: 每个报送期都执行
/// - "cumulative-totals": 累计金额一致性（2022 Q2 起启用）
fn builtin_rules() -> Vec<TaggedRule> {
    vec![
        TaggedRule {
            name: "award-amount-at-least-50k",
            tags: &[],
            check: check_award_amount_at_least_50k,
        },
        TaggedRule {
            name: "award-date-in-period-of-performance",
            tags: &[],
            check: check_award_date_in_period_of_performance,
        },
        TaggedRule {
            name: "subrecipient-zip-format",
            tags: &[],
            check: check_subrecipient_zip,
        },
        TaggedRule {
            name: "cancelled-project-has-reason",
            tags: &[],
            check: check_cancelled_project_has_reason,
        },
        TaggedRule {
            name: "cumulative-obligations-cover-period",
            tags: &["cumulative-totals"],
            check: check_cumulative_obligations,
        },
        TaggedRule {
            name: "expenditures-within-obligations",
            tags: &["cumulative-totals"],
            check: check_expenditures_within_obligations,
        },
    ]
}

fn number_field(record: &Record, field: &str) -> Option<f64> {
    record.get(field).and_then(|v| v.as_f64())
}

/// Awards > 50000 页的金额必须 >= 50000
fn check_award_amount_at_least_50k(record: &Record, _ctx: &RuleContext) -> Option<ValidationMessage> {
    if record.record_type != RecordType::Awards50k {
        return None;
    }
    let amount = number_field(record, "Award_Amount__c")?;
    if amount >= 50_000.0 {
        return None;
    }
    Some(
        ValidationMessage::err(format!(
            "Award Amount ({amount}) must be at least 50000 on the Awards > 50000 sheet"
        ))
        .with_col("H"),
    )
}

/// 发放日期必须落在绩效期内（2020-03-01 起,绩效期截止日止）
fn check_award_date_in_period_of_performance(
    record: &Record,
    ctx: &RuleContext,
) -> Option<ValidationMessage> {
    if record.record_type != RecordType::Awards50k {
        return None;
    }
    let date = record.get("Award_Date__c").and_then(value_as_date)?;
    let earliest = NaiveDate::from_ymd_opt(2020, 3, 1).expect("固定日期必然合法");
    if date >= earliest && date <= ctx.period_of_performance_end {
        return None;
    }
    Some(
        ValidationMessage::err(format!(
            "Award Date ({}) must fall within the period of performance ({} to {})",
            date.format("%m/%d/%Y"),
            earliest.format("%m/%d/%Y"),
            ctx.period_of_performance_end.format("%m/%d/%Y"),
        ))
        .with_col("I"),
    )
}

/// 邮编格式: 5 位或 5+4 位
fn check_subrecipient_zip(record: &Record, _ctx: &RuleContext) -> Option<ValidationMessage> {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = RX.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("内置正则必然合法"));

    if record.record_type != RecordType::Subrecipient {
        return None;
    }
    let zip = record.get_str("Zip__c")?;
    if rx.is_match(zip.trim()) {
        return None;
    }
    Some(
        ValidationMessage::err(format!(
            "Zip Code ('{zip}') must be in 12345 or 12345-6789 format"
        ))
        .with_col("K"),
    )
}

/// 已取消的项目必须填写取消原因
fn check_cancelled_project_has_reason(
    record: &Record,
    _ctx: &RuleContext,
) -> Option<ValidationMessage> {
    if !record.record_type.is_ec_sheet() {
        return None;
    }
    let status = record.get_str("Completion_Status__c")?;
    if status != "Cancelled" || !record.is_blank("Cancellation_Reason__c") {
        return None;
    }
    Some(
        ValidationMessage::err("Cancellation Reason is required for a cancelled project")
            .with_col("L"),
    )
}

/// 累计拨付额必须覆盖本期拨付额
fn check_cumulative_obligations(record: &Record, _ctx: &RuleContext) -> Option<ValidationMessage> {
    if !record.record_type.is_ec_sheet() {
        return None;
    }
    let total = number_field(record, "Total_Obligations__c")?;
    let current = number_field(record, "Current_Period_Obligations__c")?;
    if total + 0.01 >= current {
        return None;
    }
    Some(
        ValidationMessage::err(format!(
            "Total Cumulative Obligations ({total}) must be no less than Current Period Obligations ({current})"
        ))
        .with_col("G"),
    )
}

/// 累计支出不得超过累计拨付
fn check_expenditures_within_obligations(
    record: &Record,
    _ctx: &RuleContext,
) -> Option<ValidationMessage> {
    if !record.record_type.is_ec_sheet() {
        return None;
    }
    let obligations = number_field(record, "Total_Obligations__c")?;
    let expenditures = number_field(record, "Total_Expenditures__c")?;
    if expenditures <= obligations + 0.01 {
        return None;
    }
    Some(
        ValidationMessage::err(format!(
            "Total Cumulative Expenditures ({expenditures}) cannot exceed Total Cumulative Obligations ({obligations})"
        ))
        .with_col("H"),
    )
}
