// ==========================================
// ARPA 合规报送系统 - 记录值格式化器
// ==========================================
// 职责: 记录字段值在校验/落库前的字符串规整
// 红线: 每个格式化器对任意输入都是全函数,非字符串一律原样放行
// 说明: 链式调用对顺序敏感,组合由规则表决定
// ==========================================

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

// ==========================================
// ValueFormatter - 格式化器（枚举分发,不用 trait 对象）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum ValueFormatter {
    /// 任意值转字符串（数组以逗号拼接）
    MakeString,
    /// 去掉首尾空白
    TrimWhitespace,
    /// 去掉所有逗号
    RemoveCommas,
    /// 去掉紧跟行首或 ';' 的分隔连字符
    RemoveSepDashes,
    /// 转小写
    ToLowerCase,
    /// 下拉列表历史值纠偏: 命中 values 的值强制改写为 corrected
    CoerceLegacy {
        values: Vec<String>,
        corrected: String,
    },
}

impl ValueFormatter {
    /// 应用格式化器
    pub fn apply(&self, value: Value) -> Value {
        match self {
            ValueFormatter::MakeString => make_string(value),
            ValueFormatter::TrimWhitespace => trim_whitespace(value),
            ValueFormatter::RemoveCommas => remove_commas(value),
            ValueFormatter::RemoveSepDashes => remove_sep_dashes(value),
            ValueFormatter::ToLowerCase => to_lower_case(value),
            ValueFormatter::CoerceLegacy { values, corrected } => match value {
                Value::String(s) if values.iter().any(|v| v == &s) => {
                    Value::String(corrected.clone())
                }
                other => other,
            },
        }
    }
}

/// 任意值转字符串
///
/// - 字符串: 原样
/// - 数值/布尔: 十进制文本
/// - 数组: 各元素转字符串后以逗号拼接
pub fn make_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        Value::Number(n) => Value::String(number_to_string(&n)),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .map(|item| match make_string(item) {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect();
            Value::String(parts.join(","))
        }
        Value::Null => Value::String(String::new()),
        Value::Object(_) => Value::String(value.to_string()),
    }
}

/// 去掉首尾空白（幂等）
pub fn trim_whitespace(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

/// 去掉所有逗号
pub fn remove_commas(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(',', "")),
        other => other,
    }
}

/// 去掉紧跟行首或 ';' 的分隔连字符
///
/// "-one;-two;" → "one;two;"
pub fn remove_sep_dashes(value: Value) -> Value {
    static RX: OnceLock<Regex> = OnceLock::new();
    let rx = RX.get_or_init(|| Regex::new(r";\s*-").expect("内置正则必然合法"));

    match value {
        Value::String(s) => {
            let without_leading = s.strip_prefix('-').unwrap_or(&s);
            Value::String(rx.replace_all(without_leading, ";").to_string())
        }
        other => other,
    }
}

/// 转小写
pub fn to_lower_case(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other,
    }
}

/// 整数值不带小数点输出（42.0 → "42"）
fn number_to_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else {
        n.to_string()
    }
}

// ==========================================
// 表格字符串助手
// ==========================================

/// 清理单元格字符串
///
/// - 去首尾空白
/// - 整体被双引号包住时去掉引号（只有单侧引号不处理）
/// - 连续两个空格压成一个
pub fn clean_string(val: &str) -> String {
    static QUOTED_RX: OnceLock<Regex> = OnceLock::new();
    let quoted = QUOTED_RX.get_or_init(|| Regex::new(r#"^"(.+)"$"#).expect("内置正则必然合法"));

    let mut s = val.trim().to_string();
    if let Some(inner) = quoted.captures(&s).map(|caps| caps[1].to_string()) {
        s = inner;
    }
    while s.contains("  ") {
        s = s.replace("  ", " ");
    }
    s.trim().to_string()
}

/// 机构代码补零到 3 位（超长不截断）
pub fn zero_pad(code: &str) -> String {
    if code.len() < 3 {
        format!("{:0>3}", code)
    } else {
        code.to_string()
    }
}

/// Excel 日期序列数 → 日期
///
/// 基准日为 1899-12-30（吸收 Excel 把 1900 当闰年的历史缺陷）,
/// 只取日期部分,时间截断
pub fn excel_serial_to_date(serial: f64) -> chrono::NaiveDate {
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).expect("固定基准日必然合法");
    base + chrono::Duration::days(serial as i64)
}

/// 记录字段值 → 日期
///
/// 支持 Excel 序列数与 ISO "YYYY-MM-DD" 文本两种形态
pub fn value_as_date(value: &Value) -> Option<chrono::NaiveDate> {
    match value {
        Value::Number(n) => n.as_f64().map(excel_serial_to_date),
        Value::String(s) => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}
