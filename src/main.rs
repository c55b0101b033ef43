// ==========================================
// ARPA 合规报送系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 用法:
//   arpa-reporter init-db
//   arpa-reporter validate <workbook.xlsx> <reporting_period_id>
//   arpa-reporter revalidate
// ==========================================

use arpa_reporter::api::UploadApi;
use arpa_reporter::config::AppConfig;
use arpa_reporter::db;
use arpa_reporter::logging;
use std::path::Path;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", arpa_reporter::APP_NAME, arpa_reporter::VERSION);
    tracing::info!("==================================================");

    // 配置只在入口处从环境变量读取一次
    let config = AppConfig::from_env();
    tracing::info!("使用数据库: {}", config.db_path);

    let args: Vec<String> = std::env::args().collect();
    match run(&config, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("执行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &AppConfig, args: &[String]) -> anyhow::Result<()> {
    // 默认租户（单租户部署时固定为 1,多租户由外层 Web 服务传入）
    let tenant_id = 1;

    match args.get(1).map(String::as_str) {
        Some("init-db") => {
            let conn = db::open_sqlite_connection(&config.db_path)?;
            db::init_schema(&conn)?;
            tracing::info!("数据库初始化完成");
            Ok(())
        }

        Some("validate") => {
            let file = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("缺少参数: 工作簿路径"))?;
            let period_id: i64 = args
                .get(3)
                .ok_or_else(|| anyhow::anyhow!("缺少参数: 报送期 ID"))?
                .parse()?;

            check_schema(&config.db_path)?;

            let api = UploadApi::new(config.db_path.clone(), tenant_id, config.upload.clone());
            let response = api
                .upload_and_validate(Path::new(file), period_id, None)
                .await?;

            tracing::info!(
                upload_id = %response.upload_id,
                validated = response.validated,
                errors = response.error_count,
                warnings = response.warning_count,
                elapsed_ms = response.elapsed_ms,
                "校验完成"
            );
            for message in &response.messages {
                tracing::info!(
                    severity = %message.severity,
                    tab = message.tab.as_deref().unwrap_or("-"),
                    row = message.row.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                    "{}",
                    message.message
                );
            }
            Ok(())
        }

        Some("revalidate") => {
            check_schema(&config.db_path)?;

            let api = UploadApi::new(config.db_path.clone(), tenant_id, config.upload.clone());
            let summary = api.revalidate_uploads(config.batch).await?;
            tracing::info!(
                checked = summary.checked,
                passed = summary.passed,
                failed = summary.failed,
                "重校验完成"
            );
            Ok(())
        }

        _ => {
            eprintln!("用法:");
            eprintln!("  arpa-reporter init-db");
            eprintln!("  arpa-reporter validate <workbook.xlsx> <reporting_period_id>");
            eprintln!("  arpa-reporter revalidate");
            Ok(())
        }
    }
}

/// schema 版本检查（只告警,不自动迁移）
fn check_schema(db_path: &str) -> anyhow::Result<()> {
    let conn = db::open_sqlite_connection(db_path)?;
    match db::read_schema_version(&conn)? {
        None => anyhow::bail!("数据库未初始化,请先运行 arpa-reporter init-db"),
        Some(v) if v != db::CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                found = v,
                expected = db::CURRENT_SCHEMA_VERSION,
                "schema 版本不一致,请确认数据库与代码版本匹配"
            );
            Ok(())
        }
        Some(_) => Ok(()),
    }
}
