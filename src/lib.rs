// ==========================================
// ARPA 合规报送系统 - 核心库
// ==========================================
// 依据: Treasury SLFRF Compliance Reporting Guidance
// 依据: Data Upload Service DataDictionary 09282020.xlsx
// 技术栈: Rust + SQLite
// 系统定位: 上传校验与报送支持（校验结果仅供人工复核）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 校验规则
pub mod engine;

// 导入层 - 工作簿解析
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DataType, RecordType, Severity};

// 领域实体
pub use domain::{Record, ReportingPeriod, Upload, ValidationMessage};

// 引擎
pub use engine::{BatchProcessor, RuleContext, RuleSet, UploadValidator};

// 导入层
pub use importer::{Sheet, Workbook, WorkbookParser};

// API
pub use api::{ReportingPeriodApi, UploadApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "ARPA 合规报送系统";
