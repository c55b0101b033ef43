// ==========================================
// ARPA 合规报送系统 - 记录领域模型
// ==========================================
// 用途: 工作簿数据页的每个逻辑行提取为一条记录
// 红线: 记录提取完成后不可变,校验只读取
// ==========================================

use crate::domain::types::RecordType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ==========================================
// Record - 上传记录
// ==========================================
// content 的键是模板字段 ID（如 Project_Identification_Number__c）,
// 值保留原始类型（字符串/数值/布尔）,持久化格式化器已应用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// 记录类型（来源页签）
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// 封面页的细分类目（Detailed Expenditure Category）
    pub subcategory: Option<String>,
    /// 源文件行号（1 起,数据行从 13 开始）
    pub source_row: u32,
    /// 字段 ID → 值
    pub content: HashMap<String, Value>,
}

impl Record {
    /// 创建记录
    pub fn new(record_type: RecordType, source_row: u32, content: HashMap<String, Value>) -> Self {
        Self {
            record_type,
            subcategory: None,
            source_row,
            content,
        }
    }

    /// 读取字段值
    pub fn get(&self, field_id: &str) -> Option<&Value> {
        self.content.get(field_id)
    }

    /// 读取字段值并转为字符串（仅字符串类型返回 Some）
    pub fn get_str(&self, field_id: &str) -> Option<&str> {
        self.content.get(field_id).and_then(|v| v.as_str())
    }

    /// 字段是否为空（缺失 / null / 空字符串）
    ///
    /// 数值 0 不视为空
    pub fn is_blank(&self, field_id: &str) -> bool {
        match self.content.get(field_id) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_blank_treats_zero_as_present() {
        let mut content = HashMap::new();
        content.insert("Amount__c".to_string(), json!(0));
        content.insert("Empty__c".to_string(), json!(""));
        let record = Record::new(RecordType::Ec1, 13, content);

        assert!(!record.is_blank("Amount__c"), "numeric 0 is a real value");
        assert!(record.is_blank("Empty__c"));
        assert!(record.is_blank("Missing__c"));
    }
}
