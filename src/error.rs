//! 错误处理模块
//!
//! 定义框架各阶段（注册、解析、分发、配置）的统一错误类型

use thiserror::Error;

/// Release Helper 的主要错误类型
#[derive(Error, Debug)]
pub enum ReleaseHelperError {
    /// 注册阶段错误
    #[error("注册错误: {0}")]
    Registry(#[from] RegistryError),

    /// 解析阶段错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),

    /// 分发阶段错误
    #[error("分发错误: {0}")]
    Dispatch(#[from] DispatchError),

    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 注册错误类型
///
/// 均为编程错误，在程序启动阶段即终止
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 子命令重复注册
    #[error("子命令重复注册: {name}")]
    DuplicateSubCommand { name: String },

    /// 环境变量重复定义
    #[error("环境变量重复定义: {name}")]
    DuplicateEnvironmentDefinition { name: String },

    /// 参数目标名重复
    #[error("参数 '{dest}' 在 {scope} 中重复定义")]
    DuplicateArgument { dest: String, scope: String },

    /// 使用了保留的参数名或选项
    #[error("'{name}' 为保留参数，不能注册")]
    ReservedArgument { name: String },

    /// 参数定义不合法
    #[error("参数定义不合法: {0}")]
    InvalidArgument(String),

    /// 命令名匹配模式不合法
    #[error("命令名匹配模式不合法: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// 解析错误类型
#[derive(Error, Debug)]
pub enum ParseError {
    /// 日志级别不合法
    #[error("无效的日志级别: {level}（可选值: DEBUG, INFO, WARNING, ERROR, CRITICAL, NONE）")]
    InvalidVerboseLevel { level: String },

    /// 缺少必需的环境变量
    #[error("缺少环境变量 '{name}'")]
    MissingEnvironment { name: String },

    /// 环境变量的值不是合法的 UTF-8
    #[error("环境变量 '{name}' 的值不是合法的 UTF-8")]
    InvalidEnvironmentEncoding { name: String },

    /// 从clap的匹配结果中取值失败
    #[error("参数 '{dest}' 取值失败: {source}")]
    Extract {
        dest: String,
        #[source]
        source: clap::parser::MatchesError,
    },

    /// 命令行语法错误，由clap负责向用户展示
    #[error(transparent)]
    Syntax(#[from] clap::Error),
}

/// 分发错误类型
#[derive(Error, Debug)]
pub enum DispatchError {
    /// 未指定子命令
    #[error("未指定子命令")]
    MissingSubCommand,

    /// 子命令没有可调用的目标
    #[error("子命令 '{name}' 未绑定可执行的操作")]
    UnboundSubCommand { name: String },

    /// 工厂绑定的提供者没有声明工厂方法
    #[error("提供者 '{provider}' 未声明工厂方法 init_from_parsed_args")]
    NoSuchFactoryMethod { provider: String },

    /// 解析结果中缺少操作所需的参数
    #[error("操作 '{operation}' 缺少参数 '{name}'")]
    MissingArgument { operation: String, name: String },

    /// 参数类型与操作期望不符
    #[error("参数 '{name}' 类型错误: 期望 {expected}, 实际 {actual}")]
    ArgumentType {
        name: String,
        expected: &'static str,
        actual: String,
    },

    /// 操作返回值序列化失败
    #[error("操作 '{operation}' 返回值序列化失败: {source}")]
    Serialize {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ReleaseHelperError>;
