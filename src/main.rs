//! Release Helper 主程序入口

use anyhow::{Context, Result};
use release_helper::cli::{Application, Outcome};
use release_helper::config::{Config, TomlConfigLoader, CONFIG_PATH_ENV};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    // 日志系统在解析出日志级别后才初始化，这之前的错误直接输出到标准错误
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("错误: {e:#}");
            return ExitCode::from(1);
        }
    };

    let mut app = Application::new(config);
    let outcome = app.run(std::env::args_os().skip(1));

    match &outcome {
        Outcome::Success(value) => {
            if let Err(e) = print_value(value) {
                eprintln!("错误: {e:#}");
                return ExitCode::from(1);
            }
        }
        Outcome::UsageError(e) => {
            if let Err(io_error) = e.print() {
                eprintln!("错误: 无法输出用法信息: {io_error}");
                return ExitCode::from(1);
            }
        }
        Outcome::Failure(e) => eprintln!("错误: {e:#}"),
    }

    ExitCode::from(outcome.exit_code())
}

/// 加载配置文件，路径由 `RELEASE_HELPER_CONFIG` 指定
fn load_config() -> Result<Config> {
    let explicit = std::env::var_os(CONFIG_PATH_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);

    TomlConfigLoader::default()
        .load_or_default(explicit.as_deref())
        .context("加载配置文件失败")
}

/// 输出操作结果：字符串原样输出，其他值输出为格式化的JSON
fn print_value(value: &Value) -> Result<()> {
    match value {
        Value::Null => {}
        Value::String(text) => println!("{text}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}
