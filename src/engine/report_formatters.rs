// ==========================================
// ARPA 合规报送系统 - 报表值格式化
// ==========================================
// 用途: 报表导出时的字段值规整
// 红线: 这里不做任何校验; 上传已通过校验时,导出必须可靠成功
// ==========================================

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

// ==========================================
// 支出类目表
// ==========================================

/// 支出类目组（EC 组代号 → 报表列值）
const EXPENDITURE_CATEGORIES: [(&str, &str); 6] = [
    ("ec1", "1-Public Health"),
    ("ec2", "2-Negative Economic Impacts"),
    ("ec3", "3-Public Health-Negative Economic Impact: Public Sector Capacity"),
    ("ec4", "4-Premium Pay"),
    ("ec5", "5-Infrastructure"),
    ("ec7", "7-Administrative"),
];

/// 细分支出类目（代码 → 官方名称,与当期输入模板一致）
const EC_CODES: [(&str, &str); 26] = [
    ("1.1", "COVID-19 Vaccination"),
    ("1.2", "COVID-19 Testing"),
    ("1.3", "COVID-19 Contact Tracing"),
    ("1.5", "Personal Protective Equipment"),
    ("1.7", "Other COVID-19 Public Health Expenses (including Communications Enforcement Isolation/Quarantine)"),
    ("1.8", "COVID-19 Assistance to Small Businesses"),
    ("1.11", "Community Violence Interventions"),
    ("1.12", "Mental Health Services"),
    ("1.14", "Other Public Health Services"),
    ("2.1", "Household Assistance: Food Programs"),
    ("2.2", "Household Assistance: Rent Mortgage and Utility Aid"),
    ("2.3", "Household Assistance: Cash Transfers"),
    ("2.5", "Household Assistance: Paid Sick and Medical Leave"),
    ("2.10", "Assistance to Unemployed or Underemployed Workers (e.g. job training subsidized employment employment supports or incentives)"),
    ("2.11", "Healthy Childhood Environments: Child Care"),
    ("2.15", "Long-term Housing Security: Affordable Housing"),
    ("2.16", "Long-term Housing Security: Services for Unhoused Persons"),
    ("2.18", "Housing Support: Other Housing Assistance"),
    ("3.1", "Public Sector Workforce: Payroll and Benefits for Public Health Public Safety or Human Services Workers"),
    ("3.4", "Public Sector Capacity: Effective Service Delivery"),
    ("3.5", "Public Sector Capacity: Administrative Needs"),
    ("4.1", "Public Sector Employees"),
    ("4.2", "Private Sector: Other Employees"),
    ("5.1", "Clean Water: Centralized Wastewater Treatment"),
    ("5.10", "Drinking water: Treatment"),
    ("7.1", "Administrative Expenses"),
];

/// 支出类目组代号 → 报表列值
pub fn expenditure_category(ec_type: &str) -> Option<&'static str> {
    EXPENDITURE_CATEGORIES
        .iter()
        .find(|(code, _)| *code == ec_type)
        .map(|(_, label)| *label)
}

/// 细分类目代码是否已知
pub fn ec_code_name(code: &str) -> Option<&'static str> {
    EC_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// 细分类目代码 → "代码-官方名称" 标准标签
///
/// 未知代码返回 None（上游校验已拦截,这里只负责转换）
pub fn subcategory(code: &str) -> Option<String> {
    ec_code_name(code).map(|name| format!("{}-{}", code, name))
}

// ==========================================
// 值格式化
// ==========================================

/// 单词值首字母大写、其余小写（对 "Yes"/"No" 列尤其有用）
pub fn capitalize_first_letter(value: &Value) -> Value {
    match value {
        Value::String(s) if !s.is_empty() => {
            let mut chars = s.chars();
            let first = chars.next().map(|c| c.to_uppercase().to_string()).unwrap_or_default();
            Value::String(format!("{}{}", first, chars.as_str().to_lowercase()))
        }
        other => other.clone(),
    }
}

/// 金额: 四舍五入到分后输出十进制文本
pub fn currency(value: &Value) -> Value {
    match value.as_f64() {
        Some(n) if value.is_number() => {
            let rounded = (n * 100.0).round() / 100.0;
            if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
                Value::String(format!("{}", rounded as i64))
            } else {
                Value::String(rounded.to_string())
            }
        }
        _ => value.clone(),
    }
}

/// 多选值分隔符标准化
///
/// 去首尾空白、去前导连字符、去逗号,
/// 各种分隔写法统一为单个 ';'
pub fn multiselect(value: &Value) -> Value {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = RX.get_or_init(|| Regex::new(r";[- ]*").expect("内置正则必然合法"));

    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let cleaned = trimmed.strip_prefix('-').unwrap_or(trimmed).replace(',', "");
            let parts: Vec<&str> = rx
                .split(&cleaned)
                .filter(|part| !part.is_empty())
                .collect();
            Value::String(parts.join(";"))
        }
        other => other.clone(),
    }
}

/// TIN/EIN: 去掉连字符
pub fn tin(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s.replacen('-', "", 1)),
        Value::Number(n) => Value::String(n.to_string()),
        other => other.clone(),
    }
}

/// 邮编: 左侧补零到 5 位
pub fn zip(value: &Value) -> Value {
    pad_code(value, 5)
}

/// 邮编扩展段: 左侧补零到 4 位
pub fn zip4(value: &Value) -> Value {
    pad_code(value, 4)
}

fn pad_code(value: &Value, width: usize) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(format!("{:0>width$}", s, width = width)),
        Value::Number(n) => Value::String(format!("{:0>width$}", n.to_string(), width = width)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capitalize_first_letter() {
        assert_eq!(capitalize_first_letter(&json!("yes")), json!("Yes"));
        assert_eq!(capitalize_first_letter(&json!("NO")), json!("No"));
        assert_eq!(capitalize_first_letter(&json!("")), json!(""));
        assert_eq!(capitalize_first_letter(&json!(3)), json!(3));
    }

    #[test]
    fn test_currency_rounds_to_cents() {
        assert_eq!(currency(&json!(1250.456)), json!("1250.46"));
        assert_eq!(currency(&json!(1250.0)), json!("1250"));
        assert_eq!(currency(&json!("not a number")), json!("not a number"));
    }

    #[test]
    fn test_multiselect_normalizes_delimiters() {
        assert_eq!(
            multiselect(&json!("-one;- two; -three")),
            json!("one;two;three")
        );
        assert_eq!(multiselect(&json!("a, b;c")), json!("a b;c"));
        assert_eq!(multiselect(&json!("solo;")), json!("solo"));
    }

    #[test]
    fn test_tin_strips_dash() {
        assert_eq!(tin(&json!("12-3456789")), json!("123456789"));
        assert_eq!(tin(&json!(123456789)), json!("123456789"));
        assert_eq!(tin(&Value::Null), Value::Null);
    }

    #[test]
    fn test_zip_padding() {
        assert_eq!(zip(&json!("301")), json!("00301"));
        assert_eq!(zip(&json!(301)), json!("00301"));
        assert_eq!(zip4(&json!("42")), json!("0042"));
    }

    #[test]
    fn test_subcategory_labels() {
        assert_eq!(
            subcategory("2.15").as_deref(),
            Some("2.15-Long-term Housing Security: Affordable Housing")
        );
        assert_eq!(subcategory("9.99"), None);
    }
}
