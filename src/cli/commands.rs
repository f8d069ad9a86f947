//! 内置命令提供者
//!
//! `Inspector` 展示框架自身的状态：已注册的子命令、解析出的环境变量、
//! 加载的配置和版本信息。它通过操作表注册，分发时由工厂方法构造。

use crate::config::Config;
use crate::parser::ParsedResult;
use crate::provider::{OperationDescriptor, OperationTable, ParamDescriptor};
use crate::registry::{CommandSummary, EnvironmentDef};
use serde_json::{json, Map, Value};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// 输出格式的目标名
pub const FORMAT_DEST: &str = "format";

/// 输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// 纯文本
    #[default]
    Text,
    /// JSON格式
    Json,
}

impl OutputFormat {
    /// 所有可选格式名
    pub const NAMES: [&'static str; 2] = ["text", "json"];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow::anyhow!("不支持的输出格式: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 注册完成后填充的命令目录
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// 已注册的子命令
    pub commands: Vec<CommandSummary>,
    /// 环境变量定义
    pub environment: Vec<EnvironmentDef>,
}

/// 命令目录的共享句柄，注册表构建完成后写入一次
pub type SharedCatalog = Rc<OnceCell<Catalog>>;

/// 框架状态查看器
#[derive(Debug)]
pub struct Inspector {
    format: OutputFormat,
    parsed: ParsedResult,
    config: Config,
    catalog: SharedCatalog,
}

impl Inspector {
    /// 由解析结果构造
    pub fn from_parsed(
        parsed: &ParsedResult,
        config: Config,
        catalog: SharedCatalog,
    ) -> anyhow::Result<Self> {
        let format = match parsed.get_str(FORMAT_DEST) {
            Some(format) => format.parse()?,
            None => OutputFormat::default(),
        };
        Ok(Self {
            format,
            parsed: parsed.clone(),
            config,
            catalog,
        })
    }

    fn catalog(&self) -> anyhow::Result<&Catalog> {
        self.catalog
            .get()
            .ok_or_else(|| anyhow::anyhow!("命令目录尚未初始化"))
    }

    /// 列出已注册的子命令
    pub fn list_commands(&self) -> anyhow::Result<Value> {
        let commands = &self.catalog()?.commands;
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_value(commands)?),
            OutputFormat::Text => {
                let width = commands.iter().map(|c| c.name.len()).max().unwrap_or(0);
                let lines: Vec<String> = commands
                    .iter()
                    .map(|c| {
                        format!(
                            "{:width$}  {}",
                            c.name,
                            c.help.as_deref().unwrap_or(""),
                            width = width
                        )
                        .trim_end()
                        .to_string()
                    })
                    .collect();
                Ok(Value::String(lines.join("\n")))
            }
        }
    }

    /// 显示已定义环境变量的解析结果
    ///
    /// # 参数
    /// * `name` - 只显示该变量，为空时显示全部
    pub fn show_environment(&self, name: Option<&str>) -> anyhow::Result<Value> {
        let definitions: Vec<&EnvironmentDef> = self
            .catalog()?
            .environment
            .iter()
            .filter(|def| name.map_or(true, |name| def.name() == name))
            .collect();
        if let (Some(name), true) = (name, definitions.is_empty()) {
            anyhow::bail!("未定义的环境变量: {}", name);
        }

        let resolved: Vec<(&str, Option<&str>)> = definitions
            .iter()
            .map(|def| (def.name(), self.parsed.get_str(def.dest_name())))
            .collect();

        match self.format {
            OutputFormat::Json => {
                let object: Map<String, Value> = resolved
                    .into_iter()
                    .map(|(name, value)| {
                        (
                            name.to_string(),
                            value.map_or(Value::Null, |v| Value::String(v.to_string())),
                        )
                    })
                    .collect();
                Ok(Value::Object(object))
            }
            OutputFormat::Text => {
                let lines: Vec<String> = resolved
                    .into_iter()
                    .map(|(name, value)| match value {
                        Some(value) => format!("{name}={value}"),
                        None => format!("{name} (未设置)"),
                    })
                    .collect();
                Ok(Value::String(lines.join("\n")))
            }
        }
    }

    /// 显示加载的配置
    pub fn show_config(&self) -> anyhow::Result<Value> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_value(&self.config)?),
            OutputFormat::Text => Ok(Value::String(toml::to_string_pretty(&self.config)?)),
        }
    }

    /// 显示版本信息
    pub fn version(&self) -> Value {
        match self.format {
            OutputFormat::Json => json!({
                "name": crate::APP_NAME,
                "version": crate::VERSION,
                "description": crate::APP_DESCRIPTION,
            }),
            OutputFormat::Text => Value::String(format!("{} v{}", crate::APP_NAME, crate::VERSION)),
        }
    }
}

/// `Inspector` 的操作表
pub fn inspector_table(config: Config, catalog: SharedCatalog) -> OperationTable<Inspector> {
    OperationTable::new("Inspector")
        .operation(
            OperationDescriptor::new("list_commands")
                .doc("列出已注册的子命令")
                .param(ParamDescriptor::required("self")),
            |inspector: &mut Inspector, _args| inspector.list_commands(),
        )
        .operation(
            OperationDescriptor::new("show_environment")
                .doc("显示环境变量的解析结果\n\n未设置的可选变量显示为未设置。")
                .param(ParamDescriptor::required("self"))
                .param(ParamDescriptor::optional("name")),
            |inspector: &mut Inspector, args| inspector.show_environment(args.opt_string(0)?),
        )
        .operation(
            OperationDescriptor::new("show_config")
                .doc("显示加载的配置")
                .param(ParamDescriptor::required("self")),
            |inspector: &mut Inspector, _args| inspector.show_config(),
        )
        .operation(
            OperationDescriptor::new("version")
                .doc("显示版本信息")
                .param(ParamDescriptor::required("self")),
            |inspector: &mut Inspector, _args| Ok(inspector.version()),
        )
        .factory(move |parsed| Inspector::from_parsed(parsed, config.clone(), catalog.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_catalog() -> SharedCatalog {
        let catalog = Rc::new(OnceCell::new());
        catalog
            .set(Catalog {
                commands: vec![
                    CommandSummary {
                        name: "list-commands".to_string(),
                        help: Some("列出已注册的子命令".to_string()),
                        bound: true,
                        arguments: vec!["format".to_string()],
                    },
                    CommandSummary {
                        name: "version".to_string(),
                        help: None,
                        bound: true,
                        arguments: vec!["format".to_string()],
                    },
                ],
                environment: vec![
                    EnvironmentDef::new("HOME").required(true),
                    EnvironmentDef::new("LOGNAME"),
                ],
            })
            .unwrap();
        catalog
    }

    fn create_inspector(format: &str) -> Inspector {
        let parsed = ParsedResult::new(Some("show-environment".to_string()))
            .with_value(FORMAT_DEST, format)
            .with_value("home", "/home/builder");
        Inspector::from_parsed(&parsed, Config::default(), create_catalog()).unwrap()
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_list_commands_text() {
        let value = create_inspector("text").list_commands().unwrap();
        assert_eq!(
            value,
            Value::String("list-commands  列出已注册的子命令\nversion".to_string())
        );
    }

    #[test]
    fn test_list_commands_json() {
        let value = create_inspector("json").list_commands().unwrap();
        assert_eq!(value[0]["name"], "list-commands");
        assert_eq!(value[1]["help"], Value::Null);
    }

    #[test]
    fn test_show_environment() {
        let inspector = create_inspector("text");
        assert_eq!(
            inspector.show_environment(None).unwrap(),
            Value::String("HOME=/home/builder\nLOGNAME (未设置)".to_string())
        );

        let inspector = create_inspector("json");
        assert_eq!(
            inspector.show_environment(Some("HOME")).unwrap(),
            json!({"HOME": "/home/builder"})
        );
        assert!(inspector.show_environment(Some("SHELL")).is_err());
    }

    #[test]
    fn test_show_config_text_is_toml() {
        let value = create_inspector("text").show_config().unwrap();
        let text = value.as_str().unwrap();
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_version() {
        let value = create_inspector("json").version();
        assert_eq!(value["version"], crate::VERSION);
    }

    #[test]
    fn test_catalog_not_initialized() {
        let parsed = ParsedResult::default();
        let inspector =
            Inspector::from_parsed(&parsed, Config::default(), Rc::new(OnceCell::new())).unwrap();
        assert!(inspector.list_commands().is_err());
    }
}
