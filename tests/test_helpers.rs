// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试工作簿生成等功能
// ==========================================

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use rust_xlsxwriter::Workbook;
use std::error::Error;
use std::path::Path;
use tempfile::NamedTempFile;

use arpa_reporter::db;
use arpa_reporter::domain::ReportingPeriod;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(db::open_sqlite_connection(db_path)?)
}

/// 插入测试报送期（2022 Q2,无规则标签）,返回 ID
pub fn insert_test_period(conn: &Connection) -> Result<i64, Box<dyn Error>> {
    insert_test_period_with_tags(conn, &[])
}

/// 插入带规则标签的测试报送期,返回 ID
pub fn insert_test_period_with_tags(
    conn: &Connection,
    tags: &[&str],
) -> Result<i64, Box<dyn Error>> {
    let tags_json = serde_json::to_string(&tags)?;
    conn.execute(
        r#"
        INSERT INTO reporting_periods (
            tenant_id, name, start_date, end_date, validation_rule_tags, created_at
        ) VALUES (1, 'Quarterly 2', '2022-04-01', '2022-06-30', ?1, datetime('now'))
        "#,
        params![tags_json],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 插入测试机构（code=010）,返回 ID
pub fn insert_test_agency(conn: &Connection) -> Result<i64, Box<dyn Error>> {
    conn.execute(
        "INSERT INTO agencies (tenant_id, code, name) VALUES (1, '010', 'Department of Health')",
        [],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 内存中的测试报送期（不落库的场景用）
pub fn sample_period(tags: Vec<&str>) -> ReportingPeriod {
    ReportingPeriod {
        id: 1,
        tenant_id: 1,
        name: "Quarterly 2".to_string(),
        start_date: NaiveDate::from_ymd_opt(2022, 4, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2022, 6, 30).unwrap(),
        template_filename: None,
        validation_rule_tags: tags.into_iter().map(String::from).collect(),
        certified_at: None,
        certified_by: None,
        created_at: Utc::now(),
    }
}

/// 测试工作簿变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookVariant {
    /// 所有字段满足当前规则
    Valid,
    /// Completion_Status__c 使用下拉列表外的值
    InvalidStatus,
    /// EC 2 数据页隐藏
    HiddenEc2,
}

/// 生成模板布局的测试工作簿
///
/// 页签: Certification / Cover / Logic / EC 2 / Subrecipient
/// 布局: 数据页表头第 3 行 C 列起,数据第 13 行起,A 列为模板元数据列
pub fn write_test_workbook(path: &Path, variant: WorkbookVariant) -> Result<(), Box<dyn Error>> {
    let mut workbook = Workbook::new();

    // === Certification ===
    let certification = workbook.add_worksheet();
    certification.set_name("Certification")?;
    certification.write_string(0, 0, "Certifying Official Name")?;
    certification.write_string(0, 1, "Certifying Official Title")?;
    certification.write_string(0, 2, "Certification Date")?;
    certification.write_string(1, 0, "Jane Smith")?;
    certification.write_string(1, 1, "Budget Director")?;
    certification.write_number(1, 2, 44742.0)?;

    // === Cover ===
    // 日期以 Excel 序列数写入（2022-04-01 = 44652, 2022-06-30 = 44742）
    let cover = workbook.add_worksheet();
    cover.set_name("Cover")?;
    let cover_headers = [
        "Agency Code",
        "Project ID Number",
        "Expenditure Category Group",
        "Detailed Expenditure Category",
        "Reporting Period Start Date",
        "Reporting Period End Date",
    ];
    for (col, header) in cover_headers.iter().enumerate() {
        cover.write_string(0, col as u16, *header)?;
    }
    cover.write_string(1, 0, "010")?;
    cover.write_string(1, 1, "P-42")?;
    cover.write_string(1, 2, "2-Negative Economic Impacts")?;
    cover.write_string(1, 3, "2.15-Long-term Housing Security: Affordable Housing")?;
    cover.write_number(1, 4, 44652.0)?;
    cover.write_number(1, 5, 44742.0)?;

    // === Logic ===
    let logic = workbook.add_worksheet();
    logic.set_name("Logic")?;
    logic.write_string(0, 0, "version")?;
    logic.write_string(0, 1, "v:20220510")?;

    // === EC 2 数据页 ===
    let ec2 = workbook.add_worksheet();
    ec2.set_name("EC 2 - Negative Economic Impact")?;
    if variant == WorkbookVariant::HiddenEc2 {
        ec2.set_hidden(true);
    }
    // A 列模板元数据 + 标记行
    ec2.write_string(0, 0, "template authoring notes")?;
    ec2.write_string(2, 0, "Label")?;
    let ec2_headers = [
        "Name",
        "Project_Identification_Number__c",
        "Completion_Status__c",
        "Adopted_Budget__c",
        "Total_Obligations__c",
        "Total_Expenditures__c",
        "Current_Period_Obligations__c",
        "Current_Period_Expenditures__c",
        "Project_Description__c",
    ];
    for (i, header) in ec2_headers.iter().enumerate() {
        ec2.write_string(2, (i + 2) as u16, *header)?;
    }
    let status = match variant {
        WorkbookVariant::InvalidStatus => "Almost done",
        _ => "Completed",
    };
    ec2.write_string(12, 2, "Rent Relief")?;
    ec2.write_string(12, 3, "P-42")?;
    ec2.write_string(12, 4, status)?;
    ec2.write_number(12, 5, 100_000.0)?;
    // 累计(100) < 本期(500): 仅当报送期启用 cumulative-totals 标签时违规
    ec2.write_number(12, 6, 100.0)?;
    ec2.write_number(12, 7, 25.0)?;
    ec2.write_number(12, 8, 500.0)?;
    ec2.write_number(12, 9, 10.0)?;
    ec2.write_string(12, 10, "Emergency rental assistance")?;

    // === Subrecipient 数据页 ===
    let sub = workbook.add_worksheet();
    sub.set_name("Subrecipient")?;
    sub.write_string(2, 0, "Label")?;
    let sub_headers = [
        "Name",
        "Unique_Entity_Identifier__c",
        "EIN__c",
        "Entity_Type_2__c",
        "POC_Email_Address__c",
        "Address__c",
        "City__c",
        "State_Abbreviated__c",
        "Zip__c",
        "Country__c",
    ];
    for (i, header) in sub_headers.iter().enumerate() {
        sub.write_string(2, (i + 2) as u16, *header)?;
    }
    sub.write_string(12, 2, "Community Housing Partners")?;
    sub.write_string(12, 3, "KZ4PABCDE123")?;
    sub.write_string(12, 4, "12-3456789")?;
    sub.write_string(12, 5, "Subrecipient")?;
    sub.write_string(12, 6, "grants@chp.example.org")?;
    sub.write_string(12, 7, "100 Peachtree St")?;
    sub.write_string(12, 8, "Atlanta")?;
    sub.write_string(12, 9, "GA")?;
    sub.write_string(12, 10, "30301")?;
    sub.write_string(12, 11, "United States")?;

    workbook.save(path)?;
    Ok(())
}
