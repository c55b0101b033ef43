// ==========================================
// ARPA 合规报送系统 - 模板元数据剥离
// ==========================================
// 说明: 宏驱动的输入模板把前若干行留给模板作者元数据,
//       报送数据从 "Label"/"Column Label" 标记行开始
// ==========================================

use crate::importer::sheet::CellValue;

/// 不携带模板元数据的页签（小写比较）
const SHEETS_WITHOUT_METADATA: [&str; 2] = ["certification", "cover"];

/// 左侧元数据列数（剥离时一并丢弃）
const NUM_METADATA_COLS: usize = 1;

/// 剥离模板元数据行/列
///
/// # 参数
/// - sheet_name: 页签名
/// - rows: 行主序网格
///
/// # 返回
/// - 豁免页签: 原网格不变
/// - 其他页签: 从标记行（首个保留列文本为 "label" 或 "column label"）开始的
///   子网格,并去掉左侧元数据列
/// - 未找到标记行: 空网格（调用方视为该页无数据）
pub fn remove_metadata(sheet_name: &str, rows: &[Vec<CellValue>]) -> Vec<Vec<CellValue>> {
    if SHEETS_WITHOUT_METADATA.contains(&sheet_name.to_lowercase().as_str()) {
        return rows.to_vec();
    }

    let header_row_index = rows.iter().position(|row| {
        row.first()
            .and_then(|cell| cell.as_text())
            .map(|text| {
                let lower = text.to_lowercase();
                lower == "label" || lower == "column label"
            })
            .unwrap_or(false)
    });

    let Some(start) = header_row_index else {
        return Vec::new();
    };

    rows[start..]
        .iter()
        .map(|row| row.iter().skip(NUM_METADATA_COLS).cloned().collect())
        .collect()
}
