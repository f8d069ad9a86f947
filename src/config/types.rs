//! 配置数据结构定义
//!
//! 定义配置文件结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 主配置结构，包含日志配置和环境变量后备值
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 日志配置项
    #[serde(default)]
    pub logging: LoggingSettings,
    /// 环境变量后备值
    ///
    /// 进程环境中不存在（或为空）的变量会从这里取值
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// 日志配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// 是否使用JSON格式
    #[serde(default)]
    pub json_format: bool,
    /// 是否输出ANSI颜色
    #[serde(default = "default_ansi")]
    pub ansi: bool,
    /// 日志文件路径（设置后不再输出到控制台）
    pub file_path: Option<PathBuf>,
    /// 模块级别日志控制，例如 `release_helper::parser = "debug"`
    #[serde(default)]
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            json_format: false,
            ansi: default_ansi(),
            file_path: None,
            module_levels: BTreeMap::new(),
        }
    }
}

// 默认值函数
fn default_ansi() -> bool {
    true
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证模块日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error", "off"];
    for (module, level) in &config.logging.module_levels {
        if module.trim().is_empty() {
            return Err("模块名称不能为空".to_string());
        }
        if !valid_log_levels.contains(&level.to_lowercase().as_str()) {
            return Err(format!(
                "模块 {} 的日志级别无效: {}，支持的级别: {:?}",
                module, level, valid_log_levels
            ));
        }
    }

    if let Some(ref path) = config.logging.file_path {
        if path.as_os_str().is_empty() {
            return Err("日志文件路径不能为空".to_string());
        }
    }

    // 验证环境变量名
    for name in config.environment.keys() {
        if name.is_empty() {
            return Err("环境变量名不能为空".to_string());
        }
        if name.contains('=') || name.contains('\0') {
            return Err(format!("环境变量名 {} 包含非法字符", name));
        }
    }

    Ok(())
}
