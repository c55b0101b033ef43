// ==========================================
// ARPA 合规报送系统 - 单元格网格模型
// ==========================================
// 用途: 以 A1 地址为键的稀疏单元格网格
// 生命周期: 工作簿解析时创建,格式修复器原地修改,记录提取后丢弃
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// CellRef - 单元格坐标
// ==========================================
// 行号与 A1 地址中的数字一致（1 起）,列号 0 起（A=0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// 解析 A1 地址（如 "B12"）
    ///
    /// 非法地址返回 None（与列分组时跳过 !ref 等元数据键的行为一致）
    pub fn parse(cell_ref: &str) -> Option<CellRef> {
        let letters_end = cell_ref.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = cell_ref.split_at(letters_end);

        // 地址最多两位列字母（模板列数远小于 ZZ）
        if letters.is_empty()
            || letters.len() > 2
            || !letters.chars().all(|c| c.is_ascii_uppercase())
        {
            return None;
        }
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let row: u32 = digits.parse().ok()?;
        let col = to_decimal(letters)?;
        Some(CellRef { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_letters(self.col), self.row)
    }
}

/// 'A' 风格列标 → 0 起列号
///
/// # 返回
/// - Some(col): 合法列标（A=0, Z=25, AA=26）
/// - None: 空串或超过 3 位
pub fn to_decimal(col_ref: &str) -> Option<u32> {
    if col_ref.is_empty() || col_ref.len() > 3 {
        return None;
    }

    let mut rv: u32 = 0;
    for c in col_ref.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        rv = rv * 26 + (c as u32 - 64);
    }
    Some(rv - 1)
}

/// 0 起列号 → 'A' 风格列标（A=0, Z=25, AA=26）
pub fn col_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

// ==========================================
// CellValue - 单元格值
// ==========================================
// 数值型（Number）是格式修复器唯一会改写显示格式的类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// 是否为数值型
    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }

    /// 文本视图（数值/布尔转为字符串,空返回 None）
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// 整数值不带小数点输出（42.0 → "42"）
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ==========================================
// Cell - 单元格
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    /// 显示格式掩码（如 "mm/dd/yyyy"）,由格式修复器写入
    pub number_format: Option<String>,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            number_format: None,
        }
    }
}

// ==========================================
// Sheet - 工作表网格
// ==========================================
// 稀疏存储: 只保留非空单元格
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    cells: HashMap<CellRef, Cell>,
    /// 已占用区域的行数上界（1 起,0 = 空表）
    max_row: u32,
    /// 已占用区域的列数上界（0 起的最大列号 + 1,0 = 空表）
    max_col: u32,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入单元格（Empty 值直接跳过,保持稀疏）
    pub fn insert(&mut self, cell_ref: CellRef, value: CellValue) {
        if matches!(value, CellValue::Empty) {
            return;
        }
        self.max_row = self.max_row.max(cell_ref.row);
        self.max_col = self.max_col.max(cell_ref.col + 1);
        self.cells.insert(cell_ref, Cell::new(value));
    }

    /// 读取单元格
    pub fn get(&self, cell_ref: &CellRef) -> Option<&Cell> {
        self.cells.get(cell_ref)
    }

    /// 按 A1 地址读取单元格
    pub fn get_a1(&self, a1: &str) -> Option<&Cell> {
        CellRef::parse(a1).and_then(|r| self.cells.get(&r))
    }

    /// 可变读取（格式修复器使用）
    pub fn get_mut(&mut self, cell_ref: &CellRef) -> Option<&mut Cell> {
        self.cells.get_mut(cell_ref)
    }

    /// 遍历所有已填充单元格地址
    pub fn cell_refs(&self) -> impl Iterator<Item = &CellRef> {
        self.cells.keys()
    }

    /// 已填充单元格数量
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 占用区域行数（1 起）
    pub fn n_rows(&self) -> u32 {
        self.max_row
    }

    /// 占用区域列数
    pub fn n_cols(&self) -> u32 {
        self.max_col
    }

    /// 展开为稠密的行主序网格（元数据剥离器使用）
    pub fn to_rows(&self) -> Vec<Vec<CellValue>> {
        let mut rows =
            vec![vec![CellValue::Empty; self.max_col as usize]; self.max_row as usize];
        for (cell_ref, cell) in &self.cells {
            let r = (cell_ref.row - 1) as usize;
            let c = cell_ref.col as usize;
            rows[r][c] = cell.value.clone();
        }
        rows
    }
}

// ==========================================
// Worksheet / Workbook - 工作簿
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    /// 模板中存在对报送人隐藏的页,提取记录时跳过
    pub hidden: bool,
    pub sheet: Sheet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub worksheets: Vec<Worksheet>,
}

impl Workbook {
    /// 按页签名查找
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name == name)
    }

    /// 按页签名查找（可变）
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.worksheets.iter_mut().find(|ws| ws.name == name)
    }

    /// 按页签名查找,缺失时报错
    pub fn require_sheet(&self, name: &str) -> ImportResult<&Worksheet> {
        self.sheet(name)
            .ok_or_else(|| ImportError::MissingSheet(name.to_string()))
    }
}
