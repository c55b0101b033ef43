// ==========================================
// ARPA 合规报送系统 - 模板字段规则表
// ==========================================
// 依据: Data Upload Service DataDictionary 09282020.xlsx
// 职责: 加载内嵌规则表,生成带格式化器的校验规则
// 说明: 规则表按记录类型分组,字段 ID → 规则
// ==========================================

use crate::domain::types::{DataType, RecordType};
use crate::importer::value_formatters::ValueFormatter;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// 内嵌的模板规则表（与当期输入模板一同维护）
const TEMPLATE_RULES_JSON: &str = include_str!("template_rules.json");

// ==========================================
// ValidationRule - 单字段校验规则
// ==========================================
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    /// 模板列标（如 "D"）
    pub column_name: String,
    /// 人类可读列名（给校验消息引用）
    pub human_col_name: String,
    pub data_type: DataType,
    pub required: bool,
    pub max_length: Option<u32>,
    /// 下拉/多选的合法值全集（空 = 非列表字段）
    #[serde(default)]
    pub list_vals: Vec<String>,
    /// 限定 EC 代码（空 = 所有 EC 代码都适用）
    #[serde(default)]
    pub ec_codes: Vec<String>,
    /// 模板版本号（仅 logic.version 规则携带）
    #[serde(default)]
    pub version: Option<String>,

    // 格式化器在规则生成阶段填充,不参与反序列化
    /// 仅校验时应用（不影响导出值）
    #[serde(skip)]
    pub validation_formatters: Vec<ValueFormatter>,
    /// 读取上传值时即应用（校验与导出都生效）
    #[serde(skip)]
    pub persistent_formatters: Vec<ValueFormatter>,
}

// ==========================================
// 下拉列表纠偏配置
// ==========================================
// 两类纠偏:
// 1) 当期模板里的值本身有误 → 规则改查正确值,模板值视为历史值
// 2) 下拉值曾经变更 → 历史值仍视为合法输入
// 两类都会在读取上传值时强制改写为正确值
struct DropdownCorrection {
    worksheet_value: &'static str,
    corrected_value: Option<&'static str>,
    allowable_legacy_values: &'static [&'static str],
}

const DROPDOWN_CORRECTIONS: [DropdownCorrection; 3] = [
    DropdownCorrection {
        worksheet_value: "Affordable housing supportive housing or recovery housing",
        corrected_value: Some("Affordable housing, supportive housing, or recovery housing"),
        allowable_legacy_values: &[],
    },
    DropdownCorrection {
        worksheet_value: "COVID-19 testing sites and laboratories and acquisition of related equipment",
        corrected_value: Some("COVID-19 testing sites and laboratories, and acquisition of related equipment"),
        allowable_legacy_values: &[],
    },
    DropdownCorrection {
        worksheet_value: "Family or child care",
        corrected_value: None,
        allowable_legacy_values: &["Family or childcare"],
    },
];

// ==========================================
// RuleSet - 规则全集
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<RecordType, HashMap<String, ValidationRule>>,
}

impl RuleSet {
    /// 生成规则全集（加载内嵌规则表 + 代码内修正 + 挂载格式化器）
    pub fn generate() -> Self {
        let mut rules: HashMap<RecordType, HashMap<String, ValidationRule>> =
            serde_json::from_str::<HashMap<String, HashMap<String, ValidationRule>>>(
                TEMPLATE_RULES_JSON,
            )
            .expect("内嵌规则表必然合法")
            .into_iter()
            .map(|(type_key, fields)| {
                let record_type: RecordType =
                    serde_json::from_value(serde_json::Value::String(type_key))
                        .expect("内嵌规则表的记录类型键必然合法");
                (record_type, fields)
            })
            .collect();

        // 模板把 EIN 标成数值,实际是长度 10 的字符串（含连字符）
        for (record_type, field) in [
            (RecordType::Subrecipient, "EIN__c"),
            (RecordType::Awards50k, "Recipient_EIN__c"),
        ] {
            if let Some(rule) = rules.get_mut(&record_type).and_then(|f| f.get_mut(field)) {
                rule.data_type = DataType::String;
                rule.max_length = Some(10);
            }
        }

        // 挂载格式化器
        // 规则用格式化后的值做检查; 凡被格式化的值,导出时也按同样方式格式化
        for fields in rules.values_mut() {
            for rule in fields.values_mut() {
                rule.validation_formatters.clear();
                rule.persistent_formatters.clear();

                if rule.data_type == DataType::String {
                    rule.validation_formatters.push(ValueFormatter::MakeString);
                    rule.persistent_formatters.push(ValueFormatter::TrimWhitespace);
                }

                if rule.data_type == DataType::MultiSelect {
                    rule.validation_formatters.push(ValueFormatter::RemoveCommas);
                    rule.validation_formatters.push(ValueFormatter::RemoveSepDashes);
                }

                if !rule.list_vals.is_empty() {
                    rule.validation_formatters.push(ValueFormatter::ToLowerCase);

                    for i in 0..rule.list_vals.len() {
                        let worksheet_value = rule.list_vals[i].clone();
                        if let Some(correction) = DROPDOWN_CORRECTIONS
                            .iter()
                            .find(|c| c.worksheet_value == worksheet_value)
                        {
                            let correct_value = correction
                                .corrected_value
                                .unwrap_or(correction.worksheet_value)
                                .to_string();
                            let mut values_to_coerce: Vec<String> = correction
                                .allowable_legacy_values
                                .iter()
                                .map(|v| v.to_string())
                                .collect();
                            values_to_coerce.push(worksheet_value);

                            rule.list_vals[i] = correct_value.clone();
                            rule.persistent_formatters.push(ValueFormatter::CoerceLegacy {
                                values: values_to_coerce,
                                corrected: correct_value,
                            });
                        }
                    }
                }
            }
        }

        Self { rules }
    }

    /// 指定记录类型的字段规则
    pub fn for_type(&self, record_type: RecordType) -> Option<&HashMap<String, ValidationRule>> {
        self.rules.get(&record_type)
    }

    /// 遍历全部 (记录类型, 字段规则表)
    pub fn iter(&self) -> impl Iterator<Item = (&RecordType, &HashMap<String, ValidationRule>)> {
        self.rules.iter()
    }

    /// logic.version 规则（模板版本检查用）
    pub fn version_rule(&self) -> Option<&ValidationRule> {
        self.rules
            .get(&RecordType::Logic)
            .and_then(|fields| fields.get("version"))
    }
}

/// 规则全集（懒加载,进程内只生成一次）
pub fn get_rules() -> &'static RuleSet {
    static RULES: OnceLock<RuleSet> = OnceLock::new();
    RULES.get_or_init(RuleSet::generate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_parses_embedded_table() {
        let rules = RuleSet::generate();
        assert!(rules.for_type(RecordType::Cover).is_some());
        assert!(rules.for_type(RecordType::Subrecipient).is_some());
        assert!(rules.version_rule().is_some());
    }

    #[test]
    fn test_ein_is_overridden_to_string() {
        let rules = RuleSet::generate();
        let ein = &rules.for_type(RecordType::Subrecipient).unwrap()["EIN__c"];
        assert_eq!(ein.data_type, DataType::String);
        assert_eq!(ein.max_length, Some(10));

        let recipient_ein = &rules.for_type(RecordType::Awards50k).unwrap()["Recipient_EIN__c"];
        assert_eq!(recipient_ein.data_type, DataType::String);
        assert_eq!(recipient_ein.max_length, Some(10));
    }

    #[test]
    fn test_string_fields_get_formatters() {
        let rules = RuleSet::generate();
        let name = &rules.for_type(RecordType::Ec1).unwrap()["Name"];
        assert!(name.validation_formatters.contains(&ValueFormatter::MakeString));
        assert!(name
            .persistent_formatters
            .contains(&ValueFormatter::TrimWhitespace));
    }

    #[test]
    fn test_multiselect_fields_get_formatters() {
        let rules = RuleSet::generate();
        let entity_type = &rules.for_type(RecordType::Subrecipient).unwrap()["Entity_Type_2__c"];
        assert!(entity_type
            .validation_formatters
            .contains(&ValueFormatter::RemoveCommas));
        assert!(entity_type
            .validation_formatters
            .contains(&ValueFormatter::RemoveSepDashes));
    }

    #[test]
    fn test_dropdown_corrections_rewrite_list_vals() {
        let rules = RuleSet::generate();
        let capital = &rules.for_type(RecordType::Ec2).unwrap()["Capital_Expenditure_Type__c"];

        // 模板里的错误值被替换为正确值
        assert!(capital
            .list_vals
            .contains(&"Affordable housing, supportive housing, or recovery housing".to_string()));
        assert!(!capital
            .list_vals
            .contains(&"Affordable housing supportive housing or recovery housing".to_string()));

        // 历史值被持久化格式化器强制改写
        let coerced = capital
            .persistent_formatters
            .iter()
            .any(|f| matches!(f, ValueFormatter::CoerceLegacy { values, .. }
                if values.iter().any(|v| v == "Family or childcare")));
        assert!(coerced, "legacy dropdown values must be coerced on read");
    }

    #[test]
    fn test_get_rules_is_cached() {
        let a = get_rules() as *const RuleSet;
        let b = get_rules() as *const RuleSet;
        assert_eq!(a, b, "rule set must be generated once");
    }
}
