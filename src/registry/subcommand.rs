//! 子命令定义

use crate::provider::ProviderBinding;
use crate::registry::definitions::ArgumentDef;

/// 子命令定义
///
/// 名称同时是分发标签；绑定的提供者决定分发时调用哪个操作。
#[derive(Debug, Clone)]
pub struct SubCommandSpec {
    name: String,
    help: Option<String>,
    arguments: Vec<ArgumentDef>,
    binding: Option<ProviderBinding>,
    operation: Option<String>,
}

impl SubCommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: None,
            arguments: Vec::new(),
            binding: None,
            operation: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// 追加一个子命令专属参数
    pub fn argument(mut self, argument: ArgumentDef) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn arguments<I>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = ArgumentDef>,
    {
        self.arguments.extend(arguments);
        self
    }

    /// 绑定提供者，操作名按约定取子命令名（`-` 替换为 `_`）
    pub fn bind(mut self, binding: ProviderBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// 绑定提供者的指定操作
    pub fn bind_operation(mut self, binding: ProviderBinding, operation: impl Into<String>) -> Self {
        self.binding = Some(binding);
        self.operation = Some(operation.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn specific_arguments(&self) -> &[ArgumentDef] {
        &self.arguments
    }

    pub fn binding(&self) -> Option<&ProviderBinding> {
        self.binding.as_ref()
    }

    /// 分发时调用的操作名
    pub fn operation_name(&self) -> String {
        self.operation
            .clone()
            .unwrap_or_else(|| self.name.replace('-', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name_from_sub_command() {
        let spec = SubCommandSpec::new("update-version");
        assert_eq!(spec.operation_name(), "update_version");
    }

    #[test]
    fn test_builder_collects_arguments() {
        let spec = SubCommandSpec::new("show-last-successful-build")
            .help("Get build objects")
            .argument(ArgumentDef::option(["-F", "--folder"]).default_value(""));

        assert_eq!(spec.help_text(), Some("Get build objects"));
        assert_eq!(spec.specific_arguments().len(), 1);
        assert_eq!(spec.specific_arguments()[0].dest_name(), "folder");
        assert!(spec.binding().is_none());
    }
}
