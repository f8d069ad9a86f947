//! 命令行接口模块
//!
//! 内置命令提供者、注册表构建和单次调用的执行流程

pub mod args;
pub mod commands;
pub mod runner;

// 重新导出主要类型
pub use args::build_registry;
pub use commands::{Inspector, OutputFormat};
pub use runner::{Application, Outcome, Stage};
