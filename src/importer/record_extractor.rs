// ==========================================
// ARPA 合规报送系统 - 记录提取器
// ==========================================
// 职责: 工作簿 → 记录序列（每个逻辑数据行一条）
// 说明: Certification/Cover/Logic 为特殊页,其余数据页
//       表头固定在第 3 行 C 列起,数据从第 13 行开始
// ==========================================

use crate::domain::record::Record;
use crate::domain::types::RecordType;
use crate::engine::rules::RuleSet;
use crate::importer::error::ImportResult;
use crate::importer::sheet::{CellRef, CellValue, Sheet, Workbook};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// 数据页表头所在行（1 起）
const HEADER_ROW: u32 = 3;

/// 数据起始行（1 起）
// TODO: 跨模板版本安全地推导数据起始行（当前模板固定为 13）
const DATA_START_ROW: u32 = 13;

/// 数据起始列（0 起,C 列）
const DATA_START_COL: u32 = 2;

/// 模板作者用的展示字段,不进入记录
const DISPLAY_ONLY_FIELD: &str = "Display_Only";

// ==========================================
// RecordExtractor - 记录提取器
// ==========================================
pub struct RecordExtractor<'a> {
    rules: &'a RuleSet,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// 从工作簿提取全部记录
    ///
    /// # 流程
    /// 1. Certification/Cover 按首行表头取单条记录
    /// 2. Logic 页 B1 取模板版本
    /// 3. 各数据页逐行提取,应用持久化格式化器
    ///
    /// # 返回
    /// - Ok(Vec<Record>): 提取的记录（隐藏页跳过）
    /// - Err: 缺少特殊页等结构性问题
    pub fn extract(&self, workbook: &Workbook) -> ImportResult<Vec<Record>> {
        let mut records = Vec::new();

        // === 特殊页: Certification / Cover ===
        let certification = workbook.require_sheet(RecordType::Certification.sheet_name())?;
        records.push(single_record(
            RecordType::Certification,
            &certification.sheet,
        ));

        let cover_ws = workbook.require_sheet(RecordType::Cover.sheet_name())?;
        let cover = single_record(RecordType::Cover, &cover_ws.sheet);
        let subcategory = cover
            .get_str("Detailed Expenditure Category")
            .map(str::to_string);
        records.push(cover);

        // === 特殊页: Logic（B1 为模板版本号）===
        let logic = workbook.require_sheet(RecordType::Logic.sheet_name())?;
        let version = logic
            .sheet
            .get_a1("B1")
            .and_then(|cell| cell.value.as_text())
            .map(Value::String)
            .unwrap_or(Value::Null);
        let mut logic_content = HashMap::new();
        logic_content.insert("version".to_string(), version);
        records.push(Record::new(RecordType::Logic, 1, logic_content));

        // === 数据页 ===
        for worksheet in &workbook.worksheets {
            let Some(record_type) = RecordType::from_sheet_name(&worksheet.name) else {
                continue;
            };
            if !RecordType::DATA_SHEET_TYPES.contains(&record_type) {
                continue;
            }
            // 对报送人隐藏的页不参与提取
            if worksheet.hidden {
                debug!(sheet = %worksheet.name, "跳过隐藏页");
                continue;
            }

            let count = self.extract_data_sheet(
                record_type,
                &worksheet.sheet,
                subcategory.as_deref(),
                &mut records,
            );
            debug!(sheet = %worksheet.name, count, "数据页提取完成");
        }

        info!(total = records.len(), "记录提取完成");
        Ok(records)
    }

    /// 提取单个数据页,返回提取的记录数
    fn extract_data_sheet(
        &self,
        record_type: RecordType,
        sheet: &Sheet,
        subcategory: Option<&str>,
        records: &mut Vec<Record>,
    ) -> usize {
        let rules_for_type = self.rules.for_type(record_type);

        // 表头: 第 3 行 C 列起,列号 → 字段 ID
        let mut headers: Vec<(u32, String)> = Vec::new();
        for col in DATA_START_COL..sheet.n_cols() {
            if let Some(text) = sheet
                .get(&CellRef::new(HEADER_ROW, col))
                .and_then(|cell| cell.value.as_text())
            {
                headers.push((col, text));
            }
        }

        let mut count = 0;
        for row in DATA_START_ROW..=sheet.n_rows() {
            let mut content: HashMap<String, Value> = HashMap::new();

            for (col, field_id) in &headers {
                // 模板作者的展示列不进入记录
                if field_id == DISPLAY_ONLY_FIELD {
                    continue;
                }
                let Some(cell) = sheet.get(&CellRef::new(row, *col)) else {
                    continue;
                };
                let mut value = cell_to_value(&cell.value);
                if matches!(value, Value::Null) {
                    continue;
                }

                // 该类型没有此字段的规则时无法格式化,直接跳过
                let Some(rule) = rules_for_type.and_then(|rules| rules.get(field_id)) else {
                    continue;
                };
                for formatter in &rule.persistent_formatters {
                    value = formatter.apply(value);
                }
                content.insert(field_id.clone(), value);
            }

            // 空行不生成记录
            if content.is_empty() {
                continue;
            }

            let mut record = Record::new(record_type, row, content);
            record.subcategory = subcategory.map(str::to_string);
            records.push(record);
            count += 1;
        }
        count
    }
}

/// 按首行表头提取单条记录（Certification/Cover 专用）
fn single_record(record_type: RecordType, sheet: &Sheet) -> Record {
    let mut content = HashMap::new();
    for col in 0..sheet.n_cols() {
        let Some(header) = sheet
            .get(&CellRef::new(1, col))
            .and_then(|cell| cell.value.as_text())
        else {
            continue;
        };
        if let Some(cell) = sheet.get(&CellRef::new(2, col)) {
            let value = cell_to_value(&cell.value);
            if !matches!(value, Value::Null) {
                content.insert(header, value);
            }
        }
    }
    Record::new(record_type, 2, content)
}

/// 网格值 → 记录值
fn cell_to_value(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Number(n) => {
            // 整数保持整数形态,避免 1250 变成 1250.0
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Value::from(*n as i64)
            } else {
                serde_json::Number::from_f64(*n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rules::RuleSet;
    use crate::importer::sheet::Worksheet;
    use serde_json::json;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn special_sheets() -> Vec<Worksheet> {
        // Certification: 表头 + 一行数据
        let mut certification = Sheet::new();
        certification.insert(CellRef::new(1, 0), text("Certifying Official Name"));
        certification.insert(CellRef::new(2, 0), text("Jane Smith"));

        // Cover: 机构代码 + 细分类目
        let mut cover = Sheet::new();
        cover.insert(CellRef::new(1, 0), text("Agency Code"));
        cover.insert(CellRef::new(2, 0), text("010"));
        cover.insert(CellRef::new(1, 3), text("Detailed Expenditure Category"));
        cover.insert(CellRef::new(2, 3), text("2.15-Long-term Housing Security: Affordable Housing"));

        // Logic: B1 版本号
        let mut logic = Sheet::new();
        logic.insert(CellRef::new(1, 1), text("v:20220510"));

        vec![
            Worksheet { name: "Certification".into(), hidden: false, sheet: certification },
            Worksheet { name: "Cover".into(), hidden: false, sheet: cover },
            Worksheet { name: "Logic".into(), hidden: false, sheet: logic },
        ]
    }

    fn ec2_sheet(hidden: bool) -> Worksheet {
        let mut sheet = Sheet::new();
        // 表头（第 3 行 C 列起）
        sheet.insert(CellRef::new(3, 2), text("Name"));
        sheet.insert(CellRef::new(3, 3), text("Project_Identification_Number__c"));
        sheet.insert(CellRef::new(3, 4), text("Display_Only"));
        // 数据（第 13 行起）
        sheet.insert(CellRef::new(13, 2), text("  Rent Relief  "));
        sheet.insert(CellRef::new(13, 3), text("P-0042"));
        sheet.insert(CellRef::new(13, 4), text("ignore me"));
        // 第 14 行为空行,第 15 行有数据
        sheet.insert(CellRef::new(15, 2), text("Food Bank Support"));

        Worksheet {
            name: "EC 2 - Negative Economic Impact".into(),
            hidden,
            sheet,
        }
    }

    #[test]
    fn test_extract_records_with_persistent_formatters() {
        let rules = RuleSet::generate();
        let extractor = RecordExtractor::new(&rules);

        let mut worksheets = special_sheets();
        worksheets.push(ec2_sheet(false));
        let workbook = Workbook { worksheets };

        let records = extractor.extract(&workbook).unwrap();

        // certification + cover + logic + 两行 ec2 数据
        assert_eq!(records.len(), 5);

        let ec2: Vec<&Record> = records
            .iter()
            .filter(|r| r.record_type == RecordType::Ec2)
            .collect();
        assert_eq!(ec2.len(), 2);

        // TrimWhitespace 持久化格式化器已应用
        assert_eq!(ec2[0].get("Name"), Some(&json!("Rent Relief")));
        // Display_Only 不进入记录
        assert!(ec2[0].get("Display_Only").is_none());
        // 行号保留源文件行
        assert_eq!(ec2[0].source_row, 13);
        assert_eq!(ec2[1].source_row, 15);
        // 细分类目来自封面页
        assert_eq!(
            ec2[0].subcategory.as_deref(),
            Some("2.15-Long-term Housing Security: Affordable Housing")
        );
    }

    #[test]
    fn test_hidden_sheets_are_skipped() {
        let rules = RuleSet::generate();
        let extractor = RecordExtractor::new(&rules);

        let mut worksheets = special_sheets();
        worksheets.push(ec2_sheet(true));
        let workbook = Workbook { worksheets };

        let records = extractor.extract(&workbook).unwrap();
        assert!(
            records.iter().all(|r| r.record_type != RecordType::Ec2),
            "hidden sheet rows must not be extracted"
        );
    }

    #[test]
    fn test_logic_version_record() {
        let rules = RuleSet::generate();
        let extractor = RecordExtractor::new(&rules);
        let workbook = Workbook {
            worksheets: special_sheets(),
        };

        let records = extractor.extract(&workbook).unwrap();
        let logic = records
            .iter()
            .find(|r| r.record_type == RecordType::Logic)
            .unwrap();
        assert_eq!(logic.get("version"), Some(&json!("v:20220510")));
    }

    #[test]
    fn test_missing_special_sheet_is_an_error() {
        let rules = RuleSet::generate();
        let extractor = RecordExtractor::new(&rules);
        let workbook = Workbook { worksheets: vec![] };
        assert!(extractor.extract(&workbook).is_err());
    }
}
