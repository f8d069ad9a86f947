//! 命令行解析模块
//!
//! 根据注册表构建 clap 命令、解析命令行并合并环境变量，
//! 解析本身不配置日志系统。

pub mod command;
pub mod environment;
pub mod verbosity;

use crate::error::ParseError;
use crate::registry::CommandRegistry;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use tracing::{debug, warn};

// 重新导出主要类型
pub use environment::{
    EnvironmentResolver, EnvironmentSource, LayeredEnvironment, ProcessEnvironment,
};
pub use verbosity::{verbose_arg, Verbosity, VERBOSE_DEST};

/// 解析结果
///
/// 命令行参数和环境变量按目标名合并在 `values` 中，
/// 日志级别单独保存，不出现在 `values` 里。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedResult {
    sub_command: Option<String>,
    values: BTreeMap<String, Value>,
    verbosity: Verbosity,
}

impl ParsedResult {
    pub fn new(sub_command: Option<String>) -> Self {
        Self {
            sub_command,
            ..Self::default()
        }
    }

    pub fn with_value(mut self, dest: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(dest.into(), value.into());
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn sub_command(&self) -> Option<&str> {
        self.sub_command.as_deref()
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.values.get(dest)
    }

    /// 字符串值，不是字符串时返回 None
    pub fn get_str(&self, dest: &str) -> Option<&str> {
        self.values.get(dest).and_then(Value::as_str)
    }

    pub fn contains(&self, dest: &str) -> bool {
        self.values.contains_key(dest)
    }

    /// 以 JSON 对象形式导出全部值，包含 `sub_command`
    pub fn to_namespace(&self) -> Value {
        let mut namespace: serde_json::Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        namespace.insert(
            "sub_command".to_string(),
            self.sub_command.clone().map_or(Value::Null, Value::String),
        );
        Value::Object(namespace)
    }
}

/// 命令行解析器
pub struct Parser<'a> {
    registry: &'a CommandRegistry,
    environment: LayeredEnvironment<'a>,
}

impl<'a> Parser<'a> {
    /// 创建解析器，环境变量默认从进程环境读取
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self {
            registry,
            environment: LayeredEnvironment::process(),
        }
    }

    /// 追加一层后备环境变量来源
    pub fn with_fallback(mut self, source: impl EnvironmentSource + 'a) -> Self {
        self.environment = self.environment.with_layer(source);
        self
    }

    /// 替换全部环境变量来源
    pub fn with_environment(mut self, environment: LayeredEnvironment<'a>) -> Self {
        self.environment = environment;
        self
    }

    /// 构建对应的 clap 命令
    pub fn command(&self) -> clap::Command {
        command::build_command(self.registry)
    }

    /// 解析命令行参数，不含程序名
    pub fn parse<I, T>(&self, tokens: I) -> Result<ParsedResult, ParseError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let argv = std::iter::once(OsString::from(self.registry.name()))
            .chain(tokens.into_iter().map(Into::into));
        let matches = self.command().try_get_matches_from(argv)?;

        let (sub_command, sub_matches) = match matches.subcommand() {
            Some((name, sub_matches)) => (Some(name.to_string()), sub_matches),
            None => (None, &matches),
        };

        let verbosity = match sub_matches
            .try_get_one::<String>(VERBOSE_DEST)
            .map_err(|source| ParseError::Extract {
                dest: VERBOSE_DEST.to_string(),
                source,
            })? {
            Some(level) => level.parse::<Verbosity>()?,
            None => Verbosity::default(),
        };

        let mut values = BTreeMap::new();
        if let Some(name) = sub_command.as_deref() {
            for def in self.registry.effective_arguments(name).unwrap_or_default() {
                values.insert(def.dest_name().to_string(), command::extract(def, sub_matches)?);
            }
        }

        debug!(
            "解析完成: 子命令 {:?}, {} 个参数, 日志级别 {}",
            sub_command,
            values.len(),
            verbosity
        );

        Ok(ParsedResult {
            sub_command,
            values,
            verbosity,
        })
    }

    /// 解析命令行参数并合并当前子命令下的环境变量
    ///
    /// 目标名冲突时保留命令行的值。
    pub fn parse_all<I, T>(&self, tokens: I) -> Result<ParsedResult, ParseError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut parsed = self.parse(tokens)?;

        let resolver = EnvironmentResolver::new(self.registry.environment_definitions());
        let environment = resolver.resolve_with(&self.environment, parsed.sub_command())?;

        for (dest, value) in environment {
            if parsed.values.contains_key(&dest) {
                warn!("环境变量目标名 '{}' 与命令行参数冲突，使用命令行的值", dest);
                continue;
            }
            parsed.values.insert(dest, Value::String(value));
        }

        Ok(parsed)
    }
}
