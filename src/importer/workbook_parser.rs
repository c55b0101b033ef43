// ==========================================
// ARPA 合规报送系统 - 工作簿解析器
// ==========================================
// 支持: Excel (.xlsx/.xlsm)
// 职责: 读取上传工作簿为内存网格,保留页签隐藏标记
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::sheet::{CellRef, CellValue, Sheet, Workbook, Worksheet};
use calamine::{open_workbook, Data, Reader, SheetVisible, Xlsx};
use std::path::Path;

// ==========================================
// WorkbookParser - 工作簿解析器
// ==========================================
pub struct WorkbookParser;

impl WorkbookParser {
    /// 解析上传工作簿
    ///
    /// # 参数
    /// - file_path: 工作簿路径（.xlsx/.xlsm）
    ///
    /// # 返回
    /// - Ok(Workbook): 各页签的单元格网格 + 隐藏标记
    /// - Err: 文件不存在、格式不支持、解析失败
    pub fn parse<P: AsRef<Path>>(file_path: P) -> ImportResult<Workbook> {
        let path = file_path.as_ref();

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        // 检查扩展名
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "xlsx" && ext != "xlsm" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        // 打开 Excel 文件
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| ImportError::ExcelParseError(e.to_string()))?;

        // 页签元数据（隐藏标记来自这里）
        let metadata: Vec<(String, bool)> = workbook
            .sheets_metadata()
            .iter()
            .map(|s| (s.name.clone(), s.visible != SheetVisible::Visible))
            .collect();

        if metadata.is_empty() {
            return Err(ImportError::ExcelParseError(
                "Excel 文件无工作表".to_string(),
            ));
        }

        let mut worksheets = Vec::with_capacity(metadata.len());
        for (name, hidden) in metadata {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

            let mut sheet = Sheet::new();
            if let Some((start_row, start_col)) = range.start() {
                for (rel_row, rel_col, data) in range.used_cells() {
                    let cell_ref = CellRef::new(
                        start_row + rel_row as u32 + 1, // 行号 1 起
                        start_col + rel_col as u32,
                    );
                    sheet.insert(cell_ref, convert_cell(data));
                }
            }

            worksheets.push(Worksheet {
                name,
                hidden,
                sheet,
            });
        }

        Ok(Workbook { worksheets })
    }
}

/// calamine 单元格值 → 内部网格值
///
/// 日期在 xlsx 中以序列数存储,这里保留数值型,
/// 显示格式交给格式修复器处理
fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_missing_file() {
        let result = WorkbookParser::parse("/nonexistent/upload.xlsx");
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_rejects_unsupported_extension() {
        // 用已存在的文件触发扩展名检查
        let temp_file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        let result = WorkbookParser::parse(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_convert_cell_number_kinds() {
        assert_eq!(convert_cell(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(convert_cell(&Data::Float(1.5)), CellValue::Number(1.5));
        assert_eq!(convert_cell(&Data::Empty), CellValue::Empty);
    }
}
