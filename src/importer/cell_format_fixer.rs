// ==========================================
// ARPA 合规报送系统 - 单元格显示格式修复
// ==========================================
// 说明: 识别页内的日期列/金额列,为其中的数值单元格
//       写入正确的显示格式掩码
// 依据: Data Upload Service DataDictionary 09282020.xlsx
// ==========================================

use crate::importer::sheet::{CellRef, Sheet};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// 日期列统一使用的显示掩码
pub const DATE_FORMAT: &str = "mm/dd/yyyy";

fn date_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?i)\bDate\b").expect("内置正则必然合法"))
}

fn amount_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?i)\bAmount\b").expect("内置正则必然合法"))
}

fn current_quarter_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?i)^Current Quarter\b").expect("内置正则必然合法"))
}

/// 列头是否为日期列
///
/// 已知缺陷: 列头恰好含 "Date" 的非日期列会被误判,
/// 列头不含 "Date" 的日期列会漏判。保留此启发式,不在这里修复。
pub fn is_date_column(column_name: &str) -> bool {
    date_rx().is_match(column_name)
}

/// 列头是否为金额列
///
/// 命中条件: 含 "Amount" 整词 / 以 "Current Quarter" 开头 / 含 "Expenditure"
///
/// 已知缺陷: 与日期列同样的误判/漏判问题。
pub fn is_amount_column(column_name: &str) -> bool {
    if amount_rx().is_match(column_name) {
        return true;
    }
    if current_quarter_rx().is_match(column_name) {
        return true;
    }
    column_name.contains("Expenditure")
}

/// 修复页内日期/金额单元格的显示格式（原地修改）
///
/// # 参数
/// - sheet: 单元格网格
/// - title_row: 列头所在行（1 起）
/// - number_format: 金额列使用的数值掩码（如 "#,##0.00"）
///
/// # 行为
/// - 日期列的数值单元格 → 掩码 "mm/dd/yyyy"
/// - 金额列的数值单元格 → 传入的数值掩码
/// - 非数值单元格一律不动
pub fn fix_cell_formats(sheet: &mut Sheet, title_row: u32, number_format: &str) {
    let (columns, date_columns, amount_columns) = classify_columns(sheet, title_row);

    for col in date_columns {
        if let Some(cell_refs) = columns.get(&col) {
            for cell_ref in cell_refs {
                if let Some(cell) = sheet.get_mut(cell_ref) {
                    if cell.value.is_numeric() {
                        cell.number_format = Some(DATE_FORMAT.to_string());
                    }
                }
            }
        }
    }

    for col in amount_columns {
        if let Some(cell_refs) = columns.get(&col) {
            for cell_ref in cell_refs {
                if let Some(cell) = sheet.get_mut(cell_ref) {
                    if cell.value.is_numeric() {
                        cell.number_format = Some(number_format.to_string());
                    }
                }
            }
        }
    }
}

/// 扫描全部已填充单元格,按列分组,并依据列头文本分类日期列/金额列
fn classify_columns(
    sheet: &Sheet,
    title_row: u32,
) -> (HashMap<u32, Vec<CellRef>>, Vec<u32>, Vec<u32>) {
    let mut columns: HashMap<u32, Vec<CellRef>> = HashMap::new();
    let mut date_columns = Vec::new();
    let mut amount_columns = Vec::new();

    for cell_ref in sheet.cell_refs() {
        if cell_ref.row == title_row {
            if let Some(column_name) = sheet.get(cell_ref).and_then(|c| c.value.as_text()) {
                if is_date_column(&column_name) {
                    date_columns.push(cell_ref.col);
                } else if is_amount_column(&column_name) {
                    amount_columns.push(cell_ref.col);
                }
            }
        }
        columns.entry(cell_ref.col).or_default().push(*cell_ref);
    }

    (columns, date_columns, amount_columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::sheet::CellValue;

    #[test]
    fn test_is_date_column() {
        assert!(is_date_column("Obligation Date"));
        assert!(is_date_column("date of award"));
        assert!(!is_date_column("Update Count")); // 整词边界
        assert!(!is_date_column("Project Name"));
    }

    #[test]
    fn test_is_amount_column() {
        assert!(is_amount_column("Award Amount"));
        assert!(is_amount_column("Current Quarter Obligation"));
        assert!(is_amount_column("Total Expenditure"));
        assert!(!is_amount_column("amounts pending")); // Amount 需整词
        assert!(!is_amount_column("expenditure")); // Expenditure 区分大小写
    }

    #[test]
    fn test_fix_cell_formats_masks_numeric_cells_only() {
        let mut sheet = Sheet::new();
        // 列头（第 1 行）
        sheet.insert(CellRef::new(1, 0), CellValue::Text("Obligation Date".into()));
        sheet.insert(CellRef::new(1, 1), CellValue::Text("Award Amount".into()));
        sheet.insert(CellRef::new(1, 2), CellValue::Text("Project Name".into()));
        // 数据行
        sheet.insert(CellRef::new(2, 0), CellValue::Number(44562.0));
        sheet.insert(CellRef::new(2, 1), CellValue::Number(1250.5));
        sheet.insert(CellRef::new(2, 2), CellValue::Text("Bridge".into()));
        sheet.insert(CellRef::new(3, 0), CellValue::Text("TBD".into())); // 日期列里的文本

        fix_cell_formats(&mut sheet, 1, "#,##0.00");

        assert_eq!(
            sheet.get_a1("A2").unwrap().number_format.as_deref(),
            Some(DATE_FORMAT)
        );
        assert_eq!(
            sheet.get_a1("B2").unwrap().number_format.as_deref(),
            Some("#,##0.00")
        );
        assert_eq!(sheet.get_a1("C2").unwrap().number_format, None);
        assert_eq!(
            sheet.get_a1("A3").unwrap().number_format,
            None,
            "text cell in a date column must stay untouched"
        );
    }

    #[test]
    fn test_header_cells_themselves_are_not_masked() {
        let mut sheet = Sheet::new();
        sheet.insert(CellRef::new(1, 0), CellValue::Text("Award Amount".into()));
        sheet.insert(CellRef::new(2, 0), CellValue::Number(10.0));

        fix_cell_formats(&mut sheet, 1, "0.00");

        // 列头是文本,不会命中数值掩码
        assert_eq!(sheet.get_a1("A1").unwrap().number_format, None);
        assert_eq!(sheet.get_a1("A2").unwrap().number_format.as_deref(), Some("0.00"));
    }
}
