//! 命令注册模块
//!
//! 管理公共参数、子命令和环境变量定义，支持根据提供者的操作表自动生成子命令

pub mod definitions;
pub mod subcommand;

use crate::error::RegistryError;
use crate::provider::{ProviderBinding, FACTORY_NAME};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

// 重新导出主要类型
pub use definitions::{ArgumentDef, Arity, EnvironmentDef, ValueKind};
pub use subcommand::SubCommandSpec;

/// 公共参数所在作用域的名称，用于错误信息
const COMMON_SCOPE: &str = "公共参数";

/// 子命令摘要，用于列出已注册的命令
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSummary {
    /// 子命令名称
    pub name: String,
    /// 一行帮助信息
    pub help: Option<String>,
    /// 是否绑定了提供者
    pub bound: bool,
    /// 有效参数的目标名（公共参数在前）
    pub arguments: Vec<String>,
}

/// 命令注册表
///
/// 在程序启动时构建一次，之后只读。公共参数在构建 clap 命令时
/// 才合并进每个子命令，因此与子命令的注册顺序无关。
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    name: String,
    about: Option<String>,
    version: Option<String>,
    common_arguments: Vec<ArgumentDef>,
    sub_commands: Vec<SubCommandSpec>,
    environments: Vec<EnvironmentDef>,
}

impl CommandRegistry {
    /// 创建注册表
    ///
    /// # 参数
    /// * `name` - 程序名，显示在用法信息中
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            version: None,
            common_arguments: Vec::new(),
            sub_commands: Vec::new(),
            environments: Vec::new(),
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 添加公共参数，所有子命令共享
    ///
    /// 与已有公共参数完全相同的定义会被忽略；目标名或选项名冲突时报错。
    pub fn add_common_argument(&mut self, argument: ArgumentDef) -> Result<(), RegistryError> {
        argument.validate()?;

        if let Some(existing) = self
            .common_arguments
            .iter()
            .find(|a| a.dest_name() == argument.dest_name())
        {
            if *existing == argument {
                debug!("公共参数 {} 已存在，忽略重复注册", argument.dest_name());
                return Ok(());
            }
        }

        check_conflicts(&self.common_arguments, &argument, COMMON_SCOPE)?;
        for spec in &self.sub_commands {
            check_conflicts(spec.specific_arguments(), &argument, spec.name())?;
        }

        let mut candidate: Vec<&ArgumentDef> = self.common_arguments.iter().collect();
        candidate.push(&argument);
        validate_positional_order(&candidate, COMMON_SCOPE)?;
        for spec in &self.sub_commands {
            let effective: Vec<&ArgumentDef> = candidate
                .iter()
                .copied()
                .chain(spec.specific_arguments())
                .collect();
            validate_positional_order(&effective, spec.name())?;
        }

        debug!("注册公共参数: {}", argument.dest_name());
        self.common_arguments.push(argument);
        Ok(())
    }

    /// 添加子命令
    pub fn add_sub_command(&mut self, spec: SubCommandSpec) -> Result<(), RegistryError> {
        if self.sub_command(spec.name()).is_some() {
            return Err(RegistryError::DuplicateSubCommand {
                name: spec.name().to_string(),
            });
        }

        let mut seen: Vec<ArgumentDef> = Vec::new();
        for argument in spec.specific_arguments() {
            argument.validate()?;
            check_conflicts(&self.common_arguments, argument, spec.name())?;
            check_conflicts(&seen, argument, spec.name())?;
            seen.push(argument.clone());
        }

        let effective: Vec<&ArgumentDef> = self
            .common_arguments
            .iter()
            .chain(spec.specific_arguments())
            .collect();
        validate_positional_order(&effective, spec.name())?;

        debug!(
            "注册子命令: {} ({} 个专属参数)",
            spec.name(),
            spec.specific_arguments().len()
        );
        self.sub_commands.push(spec);
        Ok(())
    }

    /// 添加环境变量定义
    pub fn add_environment(&mut self, environment: EnvironmentDef) -> Result<(), RegistryError> {
        if self.has_environment(environment.name()) {
            return Err(RegistryError::DuplicateEnvironmentDefinition {
                name: environment.name().to_string(),
            });
        }

        debug!(
            "注册环境变量: {} -> {}",
            environment.name(),
            environment.dest_name()
        );
        self.environments.push(environment);
        Ok(())
    }

    /// 根据提供者的操作表批量生成子命令
    ///
    /// 名称完整匹配 `name_pattern`、不以 `_` 开头且不是工厂方法的操作
    /// 会生成一个子命令（`_` 替换为 `-`）。有默认值的参数成为可省略的
    /// 位置参数，其余为必需的位置参数。没有文档说明的操作被跳过。
    ///
    /// 任何一个子命令注册失败时，注册表保持调用前的状态。
    ///
    /// # 返回
    /// * 新生成的子命令名称
    pub fn add_operations_as_sub_commands(
        &mut self,
        binding: &ProviderBinding,
        name_pattern: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let pattern = Regex::new(&format!("^(?:{name_pattern})$"))?;
        let registered = self.sub_commands.len();
        let mut added = Vec::new();

        for descriptor in binding.descriptors() {
            let operation = descriptor.name();
            if !pattern.is_match(operation) || descriptor.is_private() || operation == FACTORY_NAME
            {
                continue;
            }
            let Some(summary) = descriptor.summary() else {
                debug!(
                    "{}::{} 没有文档说明，不生成子命令",
                    binding.provider_name(),
                    operation
                );
                continue;
            };

            let name = operation.replace('_', "-");
            let mut spec = SubCommandSpec::new(name.clone())
                .help(summary)
                .bind_operation(binding.clone(), operation);
            for param in descriptor.call_parameters() {
                let argument = match param.default() {
                    Some(default) => ArgumentDef::positional(param.name())
                        .default_value(default.clone())
                        .optional(),
                    None => ArgumentDef::positional(param.name()),
                };
                spec = spec.argument(argument);
            }

            if let Err(e) = self.add_sub_command(spec) {
                self.sub_commands.truncate(registered);
                return Err(e);
            }
            added.push(name);
        }

        Ok(added)
    }

    /// 是否定义了该公共参数，`key` 可以是选项名或目标名
    pub fn has_common_argument(&self, key: &str) -> bool {
        self.common_arguments
            .iter()
            .any(|a| a.has_flag(key) || a.dest_name() == key)
    }

    /// 是否定义了该环境变量
    pub fn has_environment(&self, name: &str) -> bool {
        self.environments.iter().any(|e| e.name() == name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about_text(&self) -> Option<&str> {
        self.about.as_deref()
    }

    pub fn version_text(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn common_arguments(&self) -> &[ArgumentDef] {
        &self.common_arguments
    }

    pub fn sub_commands(&self) -> &[SubCommandSpec] {
        &self.sub_commands
    }

    pub fn sub_command(&self, name: &str) -> Option<&SubCommandSpec> {
        self.sub_commands.iter().find(|s| s.name() == name)
    }

    pub fn environment_definitions(&self) -> &[EnvironmentDef] {
        &self.environments
    }

    /// 子命令的有效参数：公共参数在前，专属参数在后
    pub fn effective_arguments(&self, name: &str) -> Option<Vec<&ArgumentDef>> {
        let spec = self.sub_command(name)?;
        Some(
            self.common_arguments
                .iter()
                .chain(spec.specific_arguments())
                .collect(),
        )
    }

    /// 所有子命令的摘要，按注册顺序
    pub fn summaries(&self) -> Vec<CommandSummary> {
        self.sub_commands
            .iter()
            .map(|spec| CommandSummary {
                name: spec.name().to_string(),
                help: spec.help_text().map(str::to_string),
                bound: spec.binding().is_some(),
                arguments: self
                    .common_arguments
                    .iter()
                    .chain(spec.specific_arguments())
                    .map(|a| a.dest_name().to_string())
                    .collect(),
            })
            .collect()
    }
}

/// 检查目标名和选项名冲突
fn check_conflicts(
    existing: &[ArgumentDef],
    argument: &ArgumentDef,
    scope: &str,
) -> Result<(), RegistryError> {
    for other in existing {
        if other.dest_name() == argument.dest_name() {
            return Err(RegistryError::DuplicateArgument {
                dest: argument.dest_name().to_string(),
                scope: scope.to_string(),
            });
        }
        if let Some(flag) = argument.flags().iter().find(|f| other.has_flag(f)) {
            return Err(RegistryError::DuplicateArgument {
                dest: flag.clone(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}

/// 位置参数顺序：必需参数不能出现在可省略参数之后，多值参数只能在最后
fn validate_positional_order(arguments: &[&ArgumentDef], scope: &str) -> Result<(), RegistryError> {
    let mut optional_seen: Option<&str> = None;
    let mut many_seen: Option<&str> = None;

    for argument in arguments.iter().filter(|a| a.is_positional()) {
        if let Some(previous) = many_seen {
            return Err(RegistryError::InvalidArgument(format!(
                "{scope}: 多值位置参数 '{previous}' 之后不能再有位置参数 '{}'",
                argument.dest_name()
            )));
        }
        match argument.arity() {
            Arity::One if argument.is_required() => {
                if let Some(previous) = optional_seen {
                    return Err(RegistryError::InvalidArgument(format!(
                        "{scope}: 必需位置参数 '{}' 不能出现在可省略参数 '{previous}' 之后",
                        argument.dest_name()
                    )));
                }
            }
            Arity::One | Arity::Optional => optional_seen = Some(argument.dest_name()),
            Arity::Many => many_seen = Some(argument.dest_name()),
        }
    }

    Ok(())
}
