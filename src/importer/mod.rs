// ==========================================
// ARPA 合规报送系统 - 导入层
// ==========================================
// 职责: 上传工作簿的解析、元数据剥离、显示格式修复、记录提取
// 红线: 不含校验规则判定,只负责把工作簿变成记录
// ==========================================

// 模块声明
pub mod cell_format_fixer;
pub mod error;
pub mod metadata_stripper;
pub mod record_extractor;
pub mod sheet;
pub mod value_formatters;
pub mod workbook_parser;
pub mod workbook_writer;

// 重导出核心类型
pub use cell_format_fixer::{fix_cell_formats, is_amount_column, is_date_column};
pub use error::{ImportError, ImportResult};
pub use metadata_stripper::remove_metadata;
pub use record_extractor::RecordExtractor;
pub use sheet::{Cell, CellRef, CellValue, Sheet, Workbook, Worksheet};
pub use value_formatters::ValueFormatter;
pub use workbook_parser::WorkbookParser;
pub use workbook_writer::WorkbookWriter;
