//! 子命令分发
//!
//! 根据解析结果找到子命令绑定的提供者和操作，按操作声明的参数顺序
//! 从解析结果中取值并调用。操作返回的错误原样向上传播。

use crate::error::DispatchError;
use crate::parser::ParsedResult;
use crate::provider::{CallArgs, OperationDescriptor, ProviderBinding};
use crate::registry::CommandRegistry;
use serde_json::Value;
use tracing::{debug, info};

/// 解析完成的一次调用
#[derive(Debug, Clone)]
pub struct Invocation {
    /// 子命令名
    pub sub_command: String,
    /// 操作名
    pub operation: String,
    /// 按声明顺序排列的参数
    pub arguments: CallArgs,
    /// 提供者绑定
    pub binding: ProviderBinding,
}

impl Invocation {
    /// 执行调用，工厂绑定的提供者在此之前构造
    pub fn invoke(&self, parsed: &ParsedResult) -> anyhow::Result<Value> {
        self.binding.call(&self.operation, parsed, &self.arguments)
    }
}

/// 子命令分发器
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    registry: &'a CommandRegistry,
}

struct Target<'a> {
    sub_command: &'a str,
    operation: String,
    binding: &'a ProviderBinding,
    descriptor: &'a OperationDescriptor,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self { registry }
    }

    /// 解析出完整的调用，不构造提供者
    pub fn resolve(&self, parsed: &ParsedResult) -> Result<Invocation, DispatchError> {
        let target = self.target(parsed)?;
        let arguments = call_args(&target, parsed)?;
        Ok(Invocation {
            sub_command: target.sub_command.to_string(),
            operation: target.operation,
            arguments,
            binding: target.binding.clone(),
        })
    }

    /// 分发并执行
    ///
    /// 依次：定位操作、按需构造提供者、提取参数、调用。
    pub fn run(&self, parsed: &ParsedResult) -> anyhow::Result<Value> {
        let target = self.target(parsed)?;
        target.binding.prepare(parsed)?;
        let arguments = call_args(&target, parsed)?;

        info!(
            "执行子命令 {} -> {}::{}",
            target.sub_command,
            target.binding.provider_name(),
            target.operation
        );
        target.binding.call(&target.operation, parsed, &arguments)
    }

    fn target(&self, parsed: &ParsedResult) -> Result<Target<'a>, DispatchError> {
        let name = parsed
            .sub_command()
            .ok_or(DispatchError::MissingSubCommand)?;
        let unbound = || DispatchError::UnboundSubCommand {
            name: name.to_string(),
        };

        let spec = self.registry.sub_command(name).ok_or_else(unbound)?;
        let binding = spec.binding().ok_or_else(unbound)?;
        let operation = spec.operation_name();
        let descriptor = binding.descriptor(&operation).ok_or_else(|| {
            debug!(
                "提供者 {} 没有操作 {}",
                binding.provider_name(),
                operation
            );
            unbound()
        })?;

        Ok(Target {
            sub_command: spec.name(),
            operation,
            binding,
            descriptor,
        })
    }
}

fn call_args(target: &Target<'_>, parsed: &ParsedResult) -> Result<CallArgs, DispatchError> {
    let mut arguments = CallArgs::new(target.operation.clone());
    for param in target.descriptor.call_parameters() {
        let value = parsed
            .get(param.name())
            .cloned()
            .ok_or_else(|| DispatchError::MissingArgument {
                operation: target.operation.clone(),
                name: param.name().to_string(),
            })?;
        arguments.push(param.name(), value);
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{OperationTable, ParamDescriptor, Provider};
    use crate::registry::SubCommandSpec;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, thiserror::Error)]
    #[error("spec file not found: {0}")]
    struct SpecNotFound(String);

    struct RpmSpec {
        spec_file: String,
    }

    fn create_table(constructed: Rc<Cell<u32>>) -> OperationTable<RpmSpec> {
        OperationTable::new("RpmSpec")
            .operation(
                OperationDescriptor::new("update_version")
                    .doc("Update version")
                    .param(ParamDescriptor::required("self"))
                    .param(ParamDescriptor::required("version")),
                |spec: &mut RpmSpec, args| Ok(format!("{}:{}", spec.spec_file, args.string(0)?)),
            )
            .operation(
                OperationDescriptor::new("write_to_file")
                    .doc("Write spec file")
                    .param(ParamDescriptor::required("self")),
                |spec: &mut RpmSpec, _args| -> anyhow::Result<()> {
                    Err(SpecNotFound(spec.spec_file.clone()).into())
                },
            )
            .factory(move |parsed| {
                constructed.set(constructed.get() + 1);
                Ok(RpmSpec {
                    spec_file: parsed.get_str("spec_file").unwrap_or("").to_string(),
                })
            })
    }

    fn create_registry(constructed: Rc<Cell<u32>>) -> CommandRegistry {
        let mut registry = CommandRegistry::new("rpm");
        let binding = create_table(constructed).bind(Provider::Factory);
        registry
            .add_operations_as_sub_commands(&binding, ".*")
            .unwrap();
        registry
            .add_sub_command(SubCommandSpec::new("unbound"))
            .unwrap();
        registry
            .add_sub_command(SubCommandSpec::new("bump").bind(binding))
            .unwrap();
        registry
    }

    #[test]
    fn test_resolve_invocation() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let parsed = ParsedResult::new(Some("update-version".to_string()))
            .with_value("version", "4.3.0");

        let invocation = Dispatcher::new(&registry).resolve(&parsed).unwrap();
        assert_eq!(invocation.sub_command, "update-version");
        assert_eq!(invocation.operation, "update_version");
        assert_eq!(invocation.arguments.names().collect::<Vec<_>>(), vec!["version"]);
        assert!(!invocation.binding.is_instantiated());
    }

    #[test]
    fn test_run_constructs_provider_once() {
        let constructed = Rc::new(Cell::new(0));
        let registry = create_registry(constructed.clone());
        let parsed = ParsedResult::new(Some("update-version".to_string()))
            .with_value("version", "4.3.0")
            .with_value("spec_file", "zanata.spec");

        let dispatcher = Dispatcher::new(&registry);
        assert_eq!(dispatcher.run(&parsed).unwrap(), json!("zanata.spec:4.3.0"));
        assert_eq!(dispatcher.run(&parsed).unwrap(), json!("zanata.spec:4.3.0"));
        assert_eq!(constructed.get(), 1);
    }

    #[test]
    fn test_unregistered_sub_command() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let parsed = ParsedResult::new(Some("show-job".to_string()));
        let err = Dispatcher::new(&registry).resolve(&parsed).unwrap_err();
        assert!(matches!(err, DispatchError::UnboundSubCommand { name } if name == "show-job"));
    }

    #[test]
    fn test_sub_command_without_binding() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let parsed = ParsedResult::new(Some("unbound".to_string()));
        let err = Dispatcher::new(&registry).run(&parsed).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::UnboundSubCommand { .. })
        ));
    }

    #[test]
    fn test_bound_provider_without_matching_operation() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let parsed = ParsedResult::new(Some("bump".to_string()));
        let err = Dispatcher::new(&registry).resolve(&parsed).unwrap_err();
        assert!(matches!(err, DispatchError::UnboundSubCommand { name } if name == "bump"));
    }

    #[test]
    fn test_missing_sub_command() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let err = Dispatcher::new(&registry)
            .resolve(&ParsedResult::default())
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingSubCommand));
    }

    #[test]
    fn test_missing_argument() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let parsed = ParsedResult::new(Some("update-version".to_string()));
        let err = Dispatcher::new(&registry).resolve(&parsed).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MissingArgument { operation, name }
                if operation == "update_version" && name == "version"
        ));
    }

    #[test]
    fn test_operation_error_is_not_wrapped() {
        let registry = create_registry(Rc::new(Cell::new(0)));
        let parsed = ParsedResult::new(Some("write-to-file".to_string()))
            .with_value("spec_file", "missing.spec");
        let err = Dispatcher::new(&registry).run(&parsed).unwrap_err();
        let inner = err.downcast_ref::<SpecNotFound>().unwrap();
        assert_eq!(inner.0, "missing.spec");
    }

    #[test]
    fn test_instance_binding_without_factory() {
        let table = OperationTable::new("Echo").operation(
            OperationDescriptor::new("echo")
                .doc("Echo")
                .param(ParamDescriptor::with_default("message", "hi")),
            |_: &mut (), args| Ok(args.value(0)?.clone()),
        );
        let mut registry = CommandRegistry::new("echo");
        registry
            .add_operations_as_sub_commands(&table.bind(Provider::Instance(())), "echo")
            .unwrap();

        let parsed = ParsedResult::new(Some("echo".to_string())).with_value("message", "hi");
        assert_eq!(Dispatcher::new(&registry).run(&parsed).unwrap(), json!("hi"));
    }
}
