//! 单次调用的执行流程
//!
//! 状态依次为 `Unconfigured → Registered → Parsed → Dispatched`，成功结束于
//! `Dispatched`；任何阶段失败都直接进入 `Terminated`。

use crate::cli::args::build_registry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::ParseError;
use crate::logging::{LogConfig, LoggingSystem};
use crate::parser::Parser;
use crate::registry::CommandRegistry;
use serde_json::Value;
use std::ffi::OsString;
use tracing::{debug, error};

/// 执行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// 尚未注册命令
    Unconfigured,
    /// 命令注册完成
    Registered,
    /// 命令行解析完成
    Parsed,
    /// 分发完成，成功的终态
    Dispatched,
    /// 失败的终态
    Terminated,
}

/// 执行结果
#[derive(Debug)]
pub enum Outcome {
    /// 操作成功，携带返回值
    Success(Value),
    /// 命令行用法错误（包括 `--help` 和 `--version`），由clap负责输出
    UsageError(clap::Error),
    /// 其他失败
    Failure(anyhow::Error),
}

impl Outcome {
    /// 进程退出码：成功为 0，用法错误沿用clap的退出码，其他失败为 1
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success(_) => 0,
            Outcome::UsageError(e) => u8::try_from(e.exit_code()).unwrap_or(2),
            Outcome::Failure(_) => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// 应用程序
#[derive(Debug)]
pub struct Application {
    config: Config,
    registry: Option<CommandRegistry>,
    stage: Stage,
    configure_logging: bool,
}

impl Application {
    /// 创建应用程序，命令在第一次运行时注册
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: None,
            stage: Stage::Unconfigured,
            configure_logging: true,
        }
    }

    /// 使用已构建好的注册表
    pub fn with_registry(config: Config, registry: CommandRegistry) -> Self {
        Self {
            config,
            registry: Some(registry),
            stage: Stage::Registered,
            configure_logging: true,
        }
    }

    /// 是否在解析后初始化日志系统
    pub fn configure_logging(mut self, enabled: bool) -> Self {
        self.configure_logging = enabled;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn registry(&self) -> Option<&CommandRegistry> {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 注册内置命令
    pub fn register(&mut self) -> anyhow::Result<()> {
        if self.registry.is_none() {
            self.registry = Some(build_registry(&self.config)?);
        }
        self.stage = Stage::Registered;
        Ok(())
    }

    /// 执行一次调用
    ///
    /// # 参数
    /// * `tokens` - 命令行参数，不含程序名
    pub fn run<I, T>(&mut self, tokens: I) -> Outcome
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        if let Err(e) = self.register() {
            self.stage = Stage::Terminated;
            return Outcome::Failure(e);
        }
        let Some(registry) = self.registry.as_ref() else {
            self.stage = Stage::Terminated;
            return Outcome::Failure(anyhow::anyhow!("命令注册表不存在"));
        };

        let parsed = match Parser::new(registry)
            .with_fallback(self.config.environment.clone())
            .parse_all(tokens)
        {
            Ok(parsed) => parsed,
            Err(ParseError::Syntax(e)) => {
                self.stage = Stage::Terminated;
                return Outcome::UsageError(e);
            }
            Err(e) => {
                self.stage = Stage::Terminated;
                return Outcome::Failure(e.into());
            }
        };
        self.stage = Stage::Parsed;

        if self.configure_logging {
            let log_config = LogConfig::from_settings(&self.config.logging, parsed.verbosity());
            if let Err(e) = LoggingSystem::setup_logging(log_config) {
                self.stage = Stage::Terminated;
                return Outcome::Failure(e.context("初始化日志系统失败"));
            }
        }
        debug!("解析结果: {}", parsed.to_namespace());

        match Dispatcher::new(registry).run(&parsed) {
            Ok(value) => {
                self.stage = Stage::Dispatched;
                Outcome::Success(value)
            }
            Err(e) => {
                self.stage = Stage::Terminated;
                error!("子命令执行失败: {:#}", e);
                Outcome::Failure(e)
            }
        }
    }
}
