// ==========================================
// 导入层集成测试
// ==========================================
// 测试目标: 真实 xlsx 文件的解析、元数据剥离、
//           显示格式修复、记录提取全链路
// ==========================================

mod test_helpers;

use arpa_reporter::domain::types::RecordType;
use arpa_reporter::engine::rules::RuleSet;
use arpa_reporter::importer::{
    fix_cell_formats, remove_metadata, RecordExtractor, WorkbookParser, WorkbookWriter,
};
use serde_json::json;
use test_helpers::{write_test_workbook, WorkbookVariant};

#[test]
fn test_parse_real_workbook() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("upload.xlsx");
    write_test_workbook(&path, WorkbookVariant::Valid).expect("Failed to write workbook");

    let workbook = WorkbookParser::parse(&path).expect("Failed to parse workbook");

    assert_eq!(workbook.worksheets.len(), 5, "should contain all 5 sheets");
    let cover = workbook.sheet("Cover").expect("Cover sheet missing");
    assert!(!cover.hidden);

    // B2 = Project ID Number 值
    let cell = cover.sheet.get_a1("B2").expect("B2 should be populated");
    assert_eq!(cell.value.as_text().as_deref(), Some("P-42"));
}

#[test]
fn test_hidden_sheet_flag_roundtrip() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("upload.xlsx");
    write_test_workbook(&path, WorkbookVariant::HiddenEc2).expect("Failed to write workbook");

    let workbook = WorkbookParser::parse(&path).expect("Failed to parse workbook");
    let ec2 = workbook
        .sheet("EC 2 - Negative Economic Impact")
        .expect("EC 2 sheet missing");
    assert!(ec2.hidden, "hidden flag must survive write + parse");

    // 隐藏页不参与记录提取
    let rules = RuleSet::generate();
    let records = RecordExtractor::new(&rules)
        .extract(&workbook)
        .expect("Failed to extract records");
    assert!(
        records.iter().all(|r| r.record_type != RecordType::Ec2),
        "hidden sheet rows must not become records"
    );
}

#[test]
fn test_remove_metadata_on_parsed_sheet() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("upload.xlsx");
    write_test_workbook(&path, WorkbookVariant::Valid).expect("Failed to write workbook");

    let workbook = WorkbookParser::parse(&path).expect("Failed to parse workbook");
    let ec2 = workbook
        .sheet("EC 2 - Negative Economic Impact")
        .expect("EC 2 sheet missing");

    let rows = ec2.sheet.to_rows();
    let stripped = remove_metadata(&ec2.name, &rows);

    // 标记行 "Label" 在第 3 行,剥离后它是第一行,且 A 列已去掉
    assert!(!stripped.is_empty());
    assert_eq!(
        stripped[0][1].as_text().as_deref(),
        Some("Name"),
        "first retained row should be the header row without the metadata column"
    );

    // 豁免页原样返回
    let cover = workbook.sheet("Cover").expect("Cover sheet missing");
    let cover_rows = cover.sheet.to_rows();
    assert_eq!(remove_metadata("Cover", &cover_rows), cover_rows);
}

#[test]
fn test_record_extraction_end_to_end() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("upload.xlsx");
    write_test_workbook(&path, WorkbookVariant::Valid).expect("Failed to write workbook");

    let workbook = WorkbookParser::parse(&path).expect("Failed to parse workbook");
    let rules = RuleSet::generate();
    let records = RecordExtractor::new(&rules)
        .extract(&workbook)
        .expect("Failed to extract records");

    // certification + cover + logic + ec2 一行 + subrecipient 一行
    assert_eq!(records.len(), 5);

    let ec2 = records
        .iter()
        .find(|r| r.record_type == RecordType::Ec2)
        .expect("ec2 record missing");
    assert_eq!(ec2.get("Name"), Some(&json!("Rent Relief")));
    assert_eq!(ec2.source_row, 13);
    assert_eq!(
        ec2.subcategory.as_deref(),
        Some("2.15-Long-term Housing Security: Affordable Housing")
    );

    let sub = records
        .iter()
        .find(|r| r.record_type == RecordType::Subrecipient)
        .expect("subrecipient record missing");
    assert_eq!(sub.get("Zip__c"), Some(&json!("30301")));
}

#[test]
fn test_fix_formats_and_write_roundtrip() {
    // 报表页: 人类可读表头 + 数值单元格
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let report_path = temp_dir.path().join("report.xlsx");
    {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Awards > 50000").expect("set_name failed");
        sheet.write_string(0, 0, "Award Date").expect("write failed");
        sheet.write_string(0, 1, "Award Amount").expect("write failed");
        sheet.write_number(1, 0, 44652.0).expect("write failed");
        sheet.write_number(1, 1, 51_000.0).expect("write failed");
        workbook.save(&report_path).expect("save failed");
    }

    let mut workbook = WorkbookParser::parse(&report_path).expect("Failed to parse report");
    let awards = workbook
        .sheet_mut("Awards > 50000")
        .expect("Awards sheet missing");
    fix_cell_formats(&mut awards.sheet, 1, "#,##0.00");

    assert_eq!(
        awards.sheet.get_a1("A2").unwrap().number_format.as_deref(),
        Some("mm/dd/yyyy")
    );
    assert_eq!(
        awards.sheet.get_a1("B2").unwrap().number_format.as_deref(),
        Some("#,##0.00")
    );

    // 写出修复后的副本,重新解析确认数值不变
    let repaired_path = temp_dir.path().join("repaired.xlsx");
    WorkbookWriter::write(&workbook, &repaired_path).expect("Failed to write repaired copy");

    let reparsed = WorkbookParser::parse(&repaired_path).expect("Failed to reparse");
    let sheet = &reparsed.sheet("Awards > 50000").unwrap().sheet;
    assert_eq!(
        sheet.get_a1("B2").unwrap().value,
        arpa_reporter::importer::CellValue::Number(51_000.0)
    );
}
