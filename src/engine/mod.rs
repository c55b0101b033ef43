// ==========================================
// ARPA 合规报送系统 - 引擎层
// ==========================================
// 职责: 校验规则引擎与批处理
// 红线: 校验失败以消息形式输出,不抛异常; 所有消息必须可定位（tab/row/col）
// ==========================================

pub mod batch_processor;
pub mod report_formatters;
pub mod rule_engine;
pub mod rules;
pub mod upload_validator;

// 重导出核心引擎
pub use batch_processor::{BatchJob, BatchProcessor, BatchProcessorConfig, BatchStopHandle, RunState};
pub use rule_engine::{RuleContext, TaggedRule, TaggedRuleEngine};
pub use rules::{get_rules, RuleSet, ValidationRule};
pub use upload_validator::{UploadValidator, ValidationOutcome};
