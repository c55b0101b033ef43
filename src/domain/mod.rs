// ==========================================
// ARPA 合规报送系统 - 领域模型层
// ==========================================
// 依据: Treasury SLFRF 报送模板（Certification/Cover/EC 数据页）
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod record;
pub mod reporting_period;
pub mod types;
pub mod upload;

// 重导出核心类型
pub use record::Record;
pub use reporting_period::ReportingPeriod;
pub use types::{DataType, RecordType, Severity};
pub use upload::{Agency, Upload, ValidationMessage};
