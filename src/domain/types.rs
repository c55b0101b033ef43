// ==========================================
// ARPA 合规报送系统 - 领域类型定义
// ==========================================
// 依据: Data Upload Service DataDictionary 09282020.xlsx - 字段类型全集
// 依据: Treasury 报送模板 - 数据页命名
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 校验严重级别 (Severity)
// ==========================================
// err 阻断上传通过校验; warn 仅提示,不阻断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Err,
    Warn,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Err => write!(f, "err"),
            Severity::Warn => write!(f, "warn"),
        }
    }
}

// ==========================================
// 字段数据类型 (Data Type)
// ==========================================
// 序列化格式与模板规则表一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Numeric,
    Currency,
    Date,
    #[serde(rename = "Pick List")]
    PickList,
    #[serde(rename = "Multi-Select")]
    MultiSelect,
    #[serde(rename = "JSON")]
    Json,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => write!(f, "String"),
            DataType::Numeric => write!(f, "Numeric"),
            DataType::Currency => write!(f, "Currency"),
            DataType::Date => write!(f, "Date"),
            DataType::PickList => write!(f, "Pick List"),
            DataType::MultiSelect => write!(f, "Multi-Select"),
            DataType::Json => write!(f, "JSON"),
        }
    }
}

// ==========================================
// 记录类型 (Record Type)
// ==========================================
// 上传工作簿的每个数据页对应一种记录类型
// 序列化格式: 小写短名 (与数据库/规则表一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Certification,
    Cover,
    Logic,
    Ec1,
    Ec2,
    Ec3,
    Ec4,
    Ec5,
    Ec7,
    Subrecipient,
    #[serde(rename = "awards50k")]
    Awards50k,
    #[serde(rename = "expenditures50k")]
    Expenditures50k,
    Awards,
}

impl RecordType {
    /// 数据页类型全集（不含 Certification/Cover/Logic 特殊页）
    pub const DATA_SHEET_TYPES: [RecordType; 10] = [
        RecordType::Ec1,
        RecordType::Ec2,
        RecordType::Ec3,
        RecordType::Ec4,
        RecordType::Ec5,
        RecordType::Ec7,
        RecordType::Subrecipient,
        RecordType::Awards50k,
        RecordType::Expenditures50k,
        RecordType::Awards,
    ];

    /// EC 项目页类型全集（最新项目记录按此过滤）
    pub const EC_SHEET_TYPES: [RecordType; 6] = [
        RecordType::Ec1,
        RecordType::Ec2,
        RecordType::Ec3,
        RecordType::Ec4,
        RecordType::Ec5,
        RecordType::Ec7,
    ];

    /// 工作簿内的页签名 → 记录类型
    pub fn from_sheet_name(sheet_name: &str) -> Option<RecordType> {
        match sheet_name {
            "Certification" => Some(RecordType::Certification),
            "Cover" => Some(RecordType::Cover),
            "Logic" => Some(RecordType::Logic),
            "EC 1 - Public Health" => Some(RecordType::Ec1),
            "EC 2 - Negative Economic Impact" => Some(RecordType::Ec2),
            "EC 3 - Public Sector Capacity" => Some(RecordType::Ec3),
            "EC 4 - Premium Pay" => Some(RecordType::Ec4),
            "EC 5 - Infrastructure" => Some(RecordType::Ec5),
            "EC 7 - Admin" => Some(RecordType::Ec7),
            "Subrecipient" => Some(RecordType::Subrecipient),
            "Awards > 50000" => Some(RecordType::Awards50k),
            "Expenditures > 50000" => Some(RecordType::Expenditures50k),
            "Aggregate Awards < 50000" => Some(RecordType::Awards),
            _ => None,
        }
    }

    /// 记录类型 → 工作簿内的页签名
    ///
    /// 校验消息的 tab 字段在返回前由记录类型映射回页签名
    pub fn sheet_name(&self) -> &'static str {
        match self {
            RecordType::Certification => "Certification",
            RecordType::Cover => "Cover",
            RecordType::Logic => "Logic",
            RecordType::Ec1 => "EC 1 - Public Health",
            RecordType::Ec2 => "EC 2 - Negative Economic Impact",
            RecordType::Ec3 => "EC 3 - Public Sector Capacity",
            RecordType::Ec4 => "EC 4 - Premium Pay",
            RecordType::Ec5 => "EC 5 - Infrastructure",
            RecordType::Ec7 => "EC 7 - Admin",
            RecordType::Subrecipient => "Subrecipient",
            RecordType::Awards50k => "Awards > 50000",
            RecordType::Expenditures50k => "Expenditures > 50000",
            RecordType::Awards => "Aggregate Awards < 50000",
        }
    }

    /// 是否为 EC 项目页
    pub fn is_ec_sheet(&self) -> bool {
        Self::EC_SHEET_TYPES.contains(self)
    }

    /// 小写短名 → 记录类型（校验消息 tab 回映射用）
    pub fn from_type_key(key: &str) -> Option<RecordType> {
        match key {
            "certification" => Some(RecordType::Certification),
            "cover" => Some(RecordType::Cover),
            "logic" => Some(RecordType::Logic),
            "ec1" => Some(RecordType::Ec1),
            "ec2" => Some(RecordType::Ec2),
            "ec3" => Some(RecordType::Ec3),
            "ec4" => Some(RecordType::Ec4),
            "ec5" => Some(RecordType::Ec5),
            "ec7" => Some(RecordType::Ec7),
            "subrecipient" => Some(RecordType::Subrecipient),
            "awards50k" => Some(RecordType::Awards50k),
            "expenditures50k" => Some(RecordType::Expenditures50k),
            "awards" => Some(RecordType::Awards),
            _ => None,
        }
    }
}

// Display 与 serde 小写短名保持一致
impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::Certification => "certification",
            RecordType::Cover => "cover",
            RecordType::Logic => "logic",
            RecordType::Ec1 => "ec1",
            RecordType::Ec2 => "ec2",
            RecordType::Ec3 => "ec3",
            RecordType::Ec4 => "ec4",
            RecordType::Ec5 => "ec5",
            RecordType::Ec7 => "ec7",
            RecordType::Subrecipient => "subrecipient",
            RecordType::Awards50k => "awards50k",
            RecordType::Expenditures50k => "expenditures50k",
            RecordType::Awards => "awards",
        };
        write!(f, "{}", s)
    }
}
