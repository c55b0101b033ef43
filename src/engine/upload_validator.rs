// ==========================================
// ARPA 合规报送系统 - 上传校验器
// ==========================================
// 职责: 对一次上传的记录序列执行全部校验,产出消息列表
// 红线: 校验失败是数据不是异常; err 级消息决定校验不通过,
//       warn 级只提示
// ==========================================

use crate::domain::record::Record;
use crate::domain::reporting_period::ReportingPeriod;
use crate::domain::types::{DataType, RecordType, Severity};
use crate::domain::upload::{Agency, ValidationMessage};
use crate::engine::rule_engine::{RuleContext, TaggedRuleEngine};
use crate::engine::rules::{RuleSet, ValidationRule};
use crate::engine::report_formatters::ec_code_name;
use crate::importer::value_formatters::value_as_date;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

// ==========================================
// ValidationOutcome - 校验结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// 全部校验消息（err + warn）
    pub messages: Vec<ValidationMessage>,
    /// 是否通过（无 err 级消息）
    pub validated: bool,
    /// 封面页解析出的机构 id（调用方负责回填 uploads 表）
    pub agency_id: Option<i64>,
    /// 封面页解析出的 EC 代码（调用方负责回填 uploads 表）
    pub ec_code: Option<String>,
}

// ==========================================
// UploadValidator - 上传校验器
// ==========================================
pub struct UploadValidator<'a> {
    rules: &'a RuleSet,
    tagged_engine: TaggedRuleEngine,
}

impl<'a> UploadValidator<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            tagged_engine: TaggedRuleEngine::new(),
        }
    }

    /// 执行全部校验
    ///
    /// # 参数
    /// - records: 提取出的记录序列
    /// - period: 上传所属报送期
    /// - agencies: 租户下的机构全集（机构代码查验用）
    /// - as_of: 校验基准日
    ///
    /// # 流程（依次执行,每步的消息都累加）
    /// 1. 模板版本检查（warn）
    /// 2. 机构代码检查
    /// 3. EC 代码检查
    /// 4. 封面页报送期日期比对
    /// 5. 字段规则（必填/下拉/多选/长度/JSON）
    /// 6. 带标签记录规则
    pub fn validate(
        &self,
        records: &[Record],
        period: &ReportingPeriod,
        agencies: &[Agency],
        as_of: NaiveDate,
    ) -> ValidationOutcome {
        let mut messages = Vec::new();

        // === 1. 模板版本 ===
        messages.extend(self.validate_version(records));

        // === 2. 机构代码 ===
        let agency_id = match self.validate_agency_code(records, agencies) {
            Ok(id) => id,
            Err(message) => {
                messages.push(message);
                None
            }
        };

        // === 3. EC 代码 ===
        let ec_code = match self.validate_ec_code(records) {
            Ok(code) => code,
            Err(message) => {
                messages.push(message);
                None
            }
        };

        // === 4. 封面页报送期日期 ===
        messages.extend(self.validate_reporting_period(records, period));

        // === 5. 字段规则 ===
        messages.extend(self.validate_field_rules(records, ec_code.as_deref()));

        // === 6. 带标签记录规则 ===
        let cover = find_record(records, RecordType::Cover);
        let ctx = RuleContext::for_period(period, as_of).with_file_parts(
            cover.and_then(|c| c.get_str("Agency Code").map(str::to_string)),
            cover.and_then(|c| c.get_str("Project ID Number").map(str::to_string)),
        );
        messages.extend(self.tagged_engine.run(records, &ctx));

        // tab 从记录类型短名映射回页签名
        for message in &mut messages {
            if let Some(tab) = &message.tab {
                if let Some(record_type) = RecordType::from_type_key(tab) {
                    message.tab = Some(record_type.sheet_name().to_string());
                }
            }
        }

        let fatal = messages
            .iter()
            .filter(|m| m.severity == Severity::Err)
            .count();
        info!(
            total = messages.len(),
            fatal,
            validated = fatal == 0,
            "上传校验完成"
        );

        ValidationOutcome {
            validated: fatal == 0,
            messages,
            agency_id,
            ec_code,
        }
    }

    /// 模板版本与规则表版本比对（不一致只 warn）
    fn validate_version(&self, records: &[Record]) -> Option<ValidationMessage> {
        let rule = self.rules.version_rule()?;
        let expected = rule.version.as_deref()?;

        let version = find_record(records, RecordType::Logic)
            .and_then(|r| r.get_str("version"))
            .unwrap_or("");

        let relation = match version.cmp(expected) {
            std::cmp::Ordering::Less => "older",
            std::cmp::Ordering::Greater => "newer",
            std::cmp::Ordering::Equal => return None,
        };

        Some(
            ValidationMessage::warn(format!(
                "Upload template version ({version}) is {relation} than the latest input template ({expected})"
            ))
            .with_tab("logic")
            .with_row(1)
            .with_col(rule.column_name.clone()),
        )
    }

    /// 机构代码必填且必须已知
    fn validate_agency_code(
        &self,
        records: &[Record],
        agencies: &[Agency],
    ) -> Result<Option<i64>, ValidationMessage> {
        let agency_code = find_record(records, RecordType::Cover)
            .and_then(|c| c.get_str("Agency Code"))
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(code) = agency_code else {
            return Err(ValidationMessage::err("Agency code must be set")
                .with_tab("cover")
                .with_row(1)
                .with_col("A"));
        };

        match agencies.iter().find(|a| a.code == code) {
            Some(agency) => Ok(Some(agency.id)),
            None => Err(ValidationMessage::err(format!(
                "Agency code {code} does not match any known agency"
            ))
            .with_tab("cover")
            .with_row(2)
            .with_col("A")),
        }
    }

    /// EC 代码必填且必须已知
    fn validate_ec_code(&self, records: &[Record]) -> Result<Option<String>, ValidationMessage> {
        let code_string = find_record(records, RecordType::Cover)
            .and_then(|c| c.get_str("Detailed Expenditure Category"))
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(code_string) = code_string else {
            return Err(ValidationMessage::err("EC code must be set")
                .with_tab("cover")
                .with_row(2)
                .with_col("D"));
        };

        // 形如 "2.15-Long-term Housing Security: ..." ,代码在首个 '-' 之前
        let code = code_string.split('-').next().unwrap_or("");
        if ec_code_name(code).is_none() {
            return Err(ValidationMessage::err(format!(
                "Record EC code {code} from entry {code_string} does not match any known EC code"
            ))
            .with_tab("cover")
            .with_row(2)
            .with_col("D"));
        }
        Ok(Some(code.to_string()))
    }

    /// 封面页日期必须与上传所属报送期一致
    fn validate_reporting_period(
        &self,
        records: &[Record],
        period: &ReportingPeriod,
    ) -> Vec<ValidationMessage> {
        let mut messages = Vec::new();
        let Some(cover) = find_record(records, RecordType::Cover) else {
            return messages;
        };

        let sheet_start = cover.get("Reporting Period Start Date").and_then(value_as_date);
        if sheet_start != Some(period.start_date) {
            messages.push(
                ValidationMessage::err(format!(
                    "Upload reporting period starts {} while record specifies {}",
                    period.start_date.format("%m/%d/%Y"),
                    format_opt_date(sheet_start),
                ))
                .with_tab("cover")
                .with_row(2)
                .with_col("E"),
            );
        }

        let sheet_end = cover.get("Reporting Period End Date").and_then(value_as_date);
        if sheet_end != Some(period.end_date) {
            messages.push(
                ValidationMessage::err(format!(
                    "Upload reporting period ends {} while record specifies {}",
                    period.end_date.format("%m/%d/%Y"),
                    format_opt_date(sheet_end),
                ))
                .with_tab("cover")
                .with_row(2)
                .with_col("F"),
            );
        }

        messages
    }

    /// 按记录类型执行字段规则
    fn validate_field_rules(
        &self,
        records: &[Record],
        ec_code: Option<&str>,
    ) -> Vec<ValidationMessage> {
        let mut messages = Vec::new();

        for (record_type, type_rules) in self.rules.iter() {
            for record in records.iter().filter(|r| r.record_type == *record_type) {
                for (key, rule) in type_rules {
                    // 规则限定了 EC 代码时,不匹配的上传跳过
                    if !rule.ec_codes.is_empty() {
                        let applies = ec_code
                            .map(|code| rule.ec_codes.iter().any(|c| c == code))
                            .unwrap_or(false);
                        if !applies {
                            continue;
                        }
                    }

                    for message in check_field(record, key, rule) {
                        messages.push(
                            message
                                .with_tab(record_type.to_string())
                                .with_row(record.source_row)
                                .with_col(rule.column_name.clone()),
                        );
                    }
                }
            }
        }

        messages
    }
}

/// 单字段规则检查
///
/// 空字段只看必填; 非空字段先过校验格式化器再查下拉/多选/长度/JSON
fn check_field(record: &Record, key: &str, rule: &ValidationRule) -> Vec<ValidationMessage> {
    let mut messages = Vec::new();

    if record.is_blank(key) {
        if rule.required {
            messages.push(ValidationMessage::err(format!("Value is required for {key}")));
        }
        return messages;
    }

    // 校验格式化器只影响这里的检查,不影响导出值
    let mut value = record.get(key).cloned().unwrap_or(Value::Null);
    for formatter in &rule.validation_formatters {
        value = formatter.apply(value);
    }

    if !rule.list_vals.is_empty() {
        // 下拉/多选统一按小写比较
        let lc_items: Vec<String> = rule.list_vals.iter().map(|v| v.to_lowercase()).collect();

        if rule.data_type == DataType::PickList {
            let text = value.as_str().unwrap_or_default();
            if !lc_items.iter().any(|item| item == text) {
                messages.push(ValidationMessage::err(format!(
                    "Value for {key} ('{text}') must be one of {} options in the input template",
                    lc_items.len()
                )));
            }
        }

        if rule.data_type == DataType::MultiSelect {
            let text = value.as_str().unwrap_or_default();
            for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
                if !lc_items.iter().any(|item| item == entry) {
                    messages.push(ValidationMessage::err(format!(
                        "Entry '{entry}' of {key} is not one of {} valid options",
                        lc_items.len()
                    )));
                }
            }
        }
    }

    if let Some(max_length) = rule.max_length {
        if rule.data_type == DataType::String {
            // 长度按原始值计,不按格式化后的值
            let raw_len = match record.get(key) {
                Some(Value::String(s)) => s.chars().count(),
                Some(other) => other.to_string().chars().count(),
                None => 0,
            };
            if raw_len as u32 > max_length {
                messages.push(ValidationMessage::err(format!(
                    "Value for {key} cannot be longer than {max_length} (currently, {raw_len})"
                )));
            }
        }
    }

    // JSON 字段: 解析失败是消息,不是异常
    if rule.data_type == DataType::Json {
        if let Some(text) = record.get_str(key) {
            if serde_json::from_str::<Value>(text).is_err() {
                messages.push(
                    ValidationMessage::warn(format!("Value for {key} is not valid JSON")),
                );
            }
        }
    }

    messages
}

fn find_record(records: &[Record], record_type: RecordType) -> Option<&Record> {
    records.iter().find(|r| r.record_type == record_type)
}

fn format_opt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%m/%d/%Y").to_string())
        .unwrap_or_else(|| "(missing)".to_string())
}
