//! 命令行接口定义
//!
//! 构建 `release-helper` 的命令注册表：公共参数、环境变量定义，
//! 以及由 `Inspector` 操作表生成的子命令。

use crate::cli::commands::{inspector_table, Catalog, OutputFormat, SharedCatalog, FORMAT_DEST};
use crate::config::{Config, CONFIG_PATH_ENV};
use crate::error::RegistryError;
use crate::provider::Provider;
use crate::registry::{ArgumentDef, CommandRegistry, EnvironmentDef};
use std::cell::OnceCell;
use std::rc::Rc;
use tracing::debug;

/// 公共参数 `-f/--format`
pub fn format_argument() -> ArgumentDef {
    ArgumentDef::option(["-f", "--format"])
        .dest(FORMAT_DEST)
        .choices(OutputFormat::NAMES)
        .default_value(OutputFormat::default().as_str())
        .help("输出格式")
}

/// 内置环境变量定义
pub fn environment_definitions() -> Vec<EnvironmentDef> {
    vec![
        EnvironmentDef::new(CONFIG_PATH_ENV).dest("config_path"),
        EnvironmentDef::new("HOME")
            .required(true)
            .scoped_to(["show-environment"]),
        EnvironmentDef::new("LOGNAME"),
    ]
}

/// 构建命令注册表
///
/// # 参数
/// * `config` - 已加载的配置，交给 `Inspector` 展示
pub fn build_registry(config: &Config) -> Result<CommandRegistry, RegistryError> {
    let catalog: SharedCatalog = Rc::new(OnceCell::new());

    let mut registry = CommandRegistry::new(crate::APP_NAME)
        .about(crate::APP_DESCRIPTION)
        .version(crate::VERSION);

    registry.add_common_argument(format_argument())?;
    for definition in environment_definitions() {
        registry.add_environment(definition)?;
    }

    let binding = inspector_table(config.clone(), catalog.clone()).bind(Provider::Factory);
    let added = registry.add_operations_as_sub_commands(&binding, ".*")?;
    debug!("Inspector 注册了 {} 个子命令: {:?}", added.len(), added);

    let catalog = catalog.get_or_init(|| Catalog {
        commands: registry.summaries(),
        environment: registry.environment_definitions().to_vec(),
    });
    debug!("命令目录包含 {} 个子命令", catalog.commands.len());

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::parser::ParsedResult;

    #[test]
    fn test_build_registry() {
        let registry = build_registry(&Config::default()).unwrap();
        let names: Vec<&str> = registry.sub_commands().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["list-commands", "show-environment", "show-config", "version"]
        );
        assert!(registry.has_common_argument("--format"));
        assert!(registry.has_environment("HOME"));
        assert!(registry.has_environment(CONFIG_PATH_ENV));
    }

    #[test]
    fn test_show_environment_takes_optional_name() {
        let registry = build_registry(&Config::default()).unwrap();
        let arguments = registry.effective_arguments("show-environment").unwrap();
        let dests: Vec<&str> = arguments.iter().map(|a| a.dest_name()).collect();
        assert_eq!(dests, vec!["format", "name"]);
        assert!(!arguments[1].is_required());
    }

    #[test]
    fn test_catalog_filled_after_registration() {
        let registry = build_registry(&Config::default()).unwrap();
        let parsed = ParsedResult::new(Some("list-commands".to_string()))
            .with_value(FORMAT_DEST, "json");
        let value = Dispatcher::new(&registry).run(&parsed).unwrap();

        let names: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["list-commands", "show-environment", "show-config", "version"]
        );
    }

    #[test]
    fn test_format_argument_is_valid() {
        assert!(format_argument().validate().is_ok());
    }
}
