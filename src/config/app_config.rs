// ==========================================
// ARPA 合规报送系统 - 应用配置
// ==========================================
// 职责: 配置结构体定义与加载
// 说明: 环境变量只在 from_env() 入口处读取一次,
//       之后一律以结构体形式注入各组件
// ==========================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 上传处理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 上传文件存储目录
    pub uploads_dir: PathBuf,
    /// 金额列显示格式（传给单元格格式修复器）
    pub currency_format: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("./uploads"),
            currency_format: "#,##0.00".to_string(),
        }
    }
}

/// 批处理配置（重校验轮询）
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchConfig {
    /// 每页拉取记录数
    pub page_size: usize,
    /// 两次迭代之间的休眠（毫秒）
    pub sleep_ms: u64,
    /// true = 单轮扫完即停止; false = 持续轮询
    pub run_once: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            sleep_ms: 0,
            run_once: true,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库文件路径
    pub db_path: String,
    /// 上传处理配置
    pub upload: UploadConfig,
    /// 批处理配置
    pub batch: BatchConfig,
}

impl AppConfig {
    /// 从环境变量构建配置（仅入口处调用）
    ///
    /// # 环境变量
    /// - ARPA_REPORTER_DB_PATH: 数据库路径（缺省使用用户数据目录）
    /// - ARPA_REPORTER_UPLOADS_DIR: 上传文件目录（缺省 ./uploads）
    pub fn from_env() -> Self {
        let db_path = std::env::var("ARPA_REPORTER_DB_PATH")
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(default_db_path);

        let mut upload = UploadConfig::default();
        if let Ok(dir) = std::env::var("ARPA_REPORTER_UPLOADS_DIR") {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                upload.uploads_dir = PathBuf::from(trimmed);
            }
        }

        Self {
            db_path,
            upload,
            batch: BatchConfig::default(),
        }
    }
}

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/arpa-reporter-dev/arpa_reporter.db
/// - 生产环境: 用户数据目录/arpa-reporter/arpa_reporter.db
pub fn default_db_path() -> String {
    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖。
    let mut path = PathBuf::from("./arpa_reporter.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("arpa-reporter-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("arpa-reporter");
        }

        path = path.join("arpa_reporter.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path_not_empty() {
        let path = default_db_path();
        assert!(!path.is_empty(), "default db path should not be empty");
        assert!(
            path.ends_with("arpa_reporter.db"),
            "default db path should end with the db filename"
        );
    }

    #[test]
    fn test_batch_config_default() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.page_size, 10, "default page size should be 10");
        assert!(cfg.run_once, "default batch mode should be single-pass");
    }
}
