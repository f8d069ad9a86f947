//! Release Helper - 发布与持续集成辅助脚本的命令框架
//!
//! 统一处理以下几件事：
//! - 公共参数、子命令和环境变量的注册
//! - 基于 clap 的命令行解析与环境变量解析
//! - 通过显式操作表把提供者的操作注册为子命令并分发
//! - 结构化日志记录与可选的 TOML 配置文件

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod parser;
pub mod provider;
pub mod registry;


// 重新导出主要类型
pub use config::Config;
pub use dispatch::{Dispatcher, Invocation};
pub use error::{ConfigError, DispatchError, ParseError, RegistryError, ReleaseHelperError};
pub use parser::{ParsedResult, Parser, Verbosity};
pub use provider::{CallArgs, OperationDescriptor, OperationTable, ParamDescriptor, Provider};
pub use registry::{ArgumentDef, CommandRegistry, EnvironmentDef, SubCommandSpec};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
