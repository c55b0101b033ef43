// ==========================================
// ARPA 合规报送系统 - 工作簿写出器
// ==========================================
// 用途: 把修复显示格式后的网格写回 xlsx,供报送人下载复核
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::sheet::{CellValue, Workbook};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};
use std::collections::HashMap;
use std::path::Path;

// ==========================================
// WorkbookWriter - 工作簿写出器
// ==========================================
pub struct WorkbookWriter;

impl WorkbookWriter {
    /// 写出工作簿
    ///
    /// # 参数
    /// - workbook: 内存网格（格式修复器已写入显示掩码）
    /// - path: 输出路径（.xlsx）
    ///
    /// # 行为
    /// - 隐藏页保持隐藏
    /// - 带掩码的数值单元格按掩码写出,其余按原值写出
    pub fn write<P: AsRef<Path>>(workbook: &Workbook, path: P) -> ImportResult<()> {
        let mut writer = XlsxWorkbook::new();
        // 同一掩码复用同一 Format 对象
        let mut formats: HashMap<String, Format> = HashMap::new();

        for source in &workbook.worksheets {
            let worksheet = writer.add_worksheet();
            worksheet.set_name(&source.name)?;
            if source.hidden {
                worksheet.set_hidden(true);
            }

            // 稳定输出顺序,便于比对
            let mut cell_refs: Vec<_> = source.sheet.cell_refs().collect();
            cell_refs.sort_by_key(|r| (r.row, r.col));

            for cell_ref in cell_refs {
                let Some(cell) = source.sheet.get(cell_ref) else {
                    continue;
                };
                let row = cell_ref.row - 1;
                let col = cell_ref.col as u16;

                match &cell.value {
                    CellValue::Empty => {}
                    CellValue::Number(n) => {
                        if let Some(mask) = &cell.number_format {
                            let format = formats
                                .entry(mask.clone())
                                .or_insert_with(|| Format::new().set_num_format(mask));
                            worksheet.write_number_with_format(row, col, *n, format)?;
                        } else {
                            worksheet.write_number(row, col, *n)?;
                        }
                    }
                    CellValue::Text(s) => {
                        worksheet.write_string(row, col, s)?;
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                }
            }
        }

        writer.save(path.as_ref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::cell_format_fixer::fix_cell_formats;
    use crate::importer::sheet::{CellRef, Sheet, Worksheet};

    #[test]
    fn test_write_repaired_workbook() {
        let mut sheet = Sheet::new();
        sheet.insert(CellRef::new(1, 0), CellValue::Text("Award Date".into()));
        sheet.insert(CellRef::new(1, 1), CellValue::Text("Award Amount".into()));
        sheet.insert(CellRef::new(2, 0), CellValue::Number(44562.0));
        sheet.insert(CellRef::new(2, 1), CellValue::Number(51000.0));
        fix_cell_formats(&mut sheet, 1, "#,##0.00");

        let workbook = Workbook {
            worksheets: vec![Worksheet {
                name: "Awards > 50000".into(),
                hidden: false,
                sheet,
            }],
        };

        let temp_dir = tempfile::tempdir().unwrap();
        let out_path = temp_dir.path().join("repaired.xlsx");
        WorkbookWriter::write(&workbook, &out_path).unwrap();

        assert!(out_path.exists());
        assert!(out_path.metadata().unwrap().len() > 0);
    }
}
