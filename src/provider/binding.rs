//! 提供者绑定
//!
//! 提供者要么是现成的实例，要么在分发时通过工厂方法按需构造，
//! 两种情况都被擦除到 `Dispatch` trait 之后，注册表因此可以持有
//! 不同类型的提供者。

use crate::error::DispatchError;
use crate::parser::ParsedResult;
use crate::provider::table::{CallArgs, OperationDescriptor, OperationTable};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// 提供者绑定方式
pub enum Provider<T> {
    /// 现成的实例
    Instance(T),
    /// 分发时通过操作表声明的工厂方法构造，最多构造一次
    Factory,
}

/// 可分发的提供者
pub trait Dispatch {
    /// 提供者名称
    fn provider_name(&self) -> &str;

    /// 所有操作描述，按声明顺序
    fn descriptors(&self) -> Vec<&OperationDescriptor>;

    /// 指定操作的描述
    fn descriptor(&self, operation: &str) -> Option<&OperationDescriptor>;

    /// 确保实例存在，工厂绑定的提供者在此构造
    fn prepare(&self, parsed: &ParsedResult) -> anyhow::Result<()>;

    /// 调用操作，错误原样返回
    fn call(&self, operation: &str, parsed: &ParsedResult, args: &CallArgs)
        -> anyhow::Result<Value>;

    /// 实例是否已经存在
    fn is_instantiated(&self) -> bool;
}

enum Slot<T> {
    Ready(T),
    Pending,
}

struct BoundProvider<T> {
    table: OperationTable<T>,
    slot: RefCell<Slot<T>>,
}

impl<T: 'static> Dispatch for BoundProvider<T> {
    fn provider_name(&self) -> &str {
        self.table.provider_name()
    }

    fn descriptors(&self) -> Vec<&OperationDescriptor> {
        self.table.descriptors().collect()
    }

    fn descriptor(&self, operation: &str) -> Option<&OperationDescriptor> {
        self.table.get(operation).map(|op| op.descriptor())
    }

    fn prepare(&self, parsed: &ParsedResult) -> anyhow::Result<()> {
        let mut slot = self.slot.try_borrow_mut().map_err(|_| {
            anyhow::anyhow!("提供者 '{}' 正在执行，不能重入", self.provider_name())
        })?;

        if let Slot::Pending = *slot {
            let factory =
                self.table
                    .factory_fn()
                    .ok_or_else(|| DispatchError::NoSuchFactoryMethod {
                        provider: self.provider_name().to_string(),
                    })?;
            debug!("通过工厂方法构造提供者 {}", self.provider_name());
            *slot = Slot::Ready(factory(parsed)?);
        }

        Ok(())
    }

    fn call(
        &self,
        operation: &str,
        parsed: &ParsedResult,
        args: &CallArgs,
    ) -> anyhow::Result<Value> {
        let op = self
            .table
            .get(operation)
            .ok_or_else(|| DispatchError::UnboundSubCommand {
                name: operation.to_string(),
            })?;
        self.prepare(parsed)?;

        let mut slot = self.slot.try_borrow_mut().map_err(|_| {
            anyhow::anyhow!("提供者 '{}' 正在执行，不能重入", self.provider_name())
        })?;
        let Slot::Ready(instance) = &mut *slot else {
            return Err(DispatchError::NoSuchFactoryMethod {
                provider: self.provider_name().to_string(),
            }
            .into());
        };

        debug!("调用 {}::{}", self.provider_name(), operation);
        op.call(instance, args)
    }

    fn is_instantiated(&self) -> bool {
        matches!(self.slot.try_borrow().as_deref(), Ok(Slot::Ready(_)))
    }
}

impl<T: 'static> OperationTable<T> {
    /// 把操作表和提供者绑定在一起
    pub fn bind(self, provider: Provider<T>) -> ProviderBinding {
        let slot = match provider {
            Provider::Instance(instance) => Slot::Ready(instance),
            Provider::Factory => Slot::Pending,
        };
        ProviderBinding::new(BoundProvider {
            table: self,
            slot: RefCell::new(slot),
        })
    }
}

/// 类型擦除后的提供者绑定，多个子命令可共享同一个绑定
#[derive(Clone)]
pub struct ProviderBinding {
    inner: Rc<dyn Dispatch>,
}

impl ProviderBinding {
    /// 包装自定义的 `Dispatch` 实现
    pub fn new<D: Dispatch + 'static>(dispatch: D) -> Self {
        Self {
            inner: Rc::new(dispatch),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    pub fn descriptors(&self) -> Vec<&OperationDescriptor> {
        self.inner.descriptors()
    }

    pub fn descriptor(&self, operation: &str) -> Option<&OperationDescriptor> {
        self.inner.descriptor(operation)
    }

    pub fn prepare(&self, parsed: &ParsedResult) -> anyhow::Result<()> {
        self.inner.prepare(parsed)
    }

    pub fn call(
        &self,
        operation: &str,
        parsed: &ParsedResult,
        args: &CallArgs,
    ) -> anyhow::Result<Value> {
        self.inner.call(operation, parsed, args)
    }

    pub fn is_instantiated(&self) -> bool {
        self.inner.is_instantiated()
    }
}

impl fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBinding")
            .field("provider", &self.provider_name())
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::table::ParamDescriptor;
    use serde_json::json;
    use std::cell::Cell;

    struct SshHost {
        host: String,
    }

    fn create_table() -> OperationTable<SshHost> {
        OperationTable::new("SshHost").operation(
            OperationDescriptor::new("user_host")
                .doc("Produce [user@]host")
                .param(ParamDescriptor::optional("user")),
            |ssh: &mut SshHost, args| {
                Ok(match args.opt_string(0)? {
                    Some(user) => format!("{user}@{}", ssh.host),
                    None => ssh.host.clone(),
                })
            },
        )
    }

    fn call_args(user: Value) -> CallArgs {
        let mut args = CallArgs::new("user_host");
        args.push("user", user);
        args
    }

    #[test]
    fn test_instance_binding() {
        let binding = create_table().bind(Provider::Instance(SshHost {
            host: "fedorapeople.org".to_string(),
        }));
        assert!(binding.is_instantiated());

        let parsed = ParsedResult::default();
        let result = binding
            .call("user_host", &parsed, &call_args(json!("builder")))
            .unwrap();
        assert_eq!(result, json!("builder@fedorapeople.org"));
    }

    #[test]
    fn test_factory_binding_constructs_once() {
        let constructed = Rc::new(Cell::new(0));
        let counter = constructed.clone();
        let binding = create_table()
            .factory(move |parsed| {
                counter.set(counter.get() + 1);
                Ok(SshHost {
                    host: parsed.get_str("host").unwrap_or("localhost").to_string(),
                })
            })
            .bind(Provider::Factory);
        assert!(!binding.is_instantiated());

        let parsed = ParsedResult::default();
        binding.prepare(&parsed).unwrap();
        binding.call("user_host", &parsed, &call_args(Value::Null)).unwrap();
        let result = binding.call("user_host", &parsed, &call_args(Value::Null)).unwrap();

        assert_eq!(result, json!("localhost"));
        assert_eq!(constructed.get(), 1);
        assert!(binding.is_instantiated());
    }

    #[test]
    fn test_factory_binding_without_factory() {
        let binding = create_table().bind(Provider::Factory);
        let err = binding.prepare(&ParsedResult::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::NoSuchFactoryMethod { provider }) if provider == "SshHost"
        ));
    }

    #[test]
    fn test_factory_error_propagates_unchanged() {
        #[derive(Debug, thiserror::Error)]
        #[error("missing host")]
        struct MissingHost;

        let binding = create_table()
            .factory(|_parsed| Err(MissingHost.into()))
            .bind(Provider::Factory);
        let err = binding.prepare(&ParsedResult::default()).unwrap_err();
        assert!(err.downcast_ref::<MissingHost>().is_some());
        assert!(!binding.is_instantiated());
    }

    #[test]
    fn test_unknown_operation() {
        let binding = create_table().bind(Provider::Instance(SshHost {
            host: "localhost".to_string(),
        }));
        let err = binding
            .call("scp_to_host", &ParsedResult::default(), &CallArgs::new("scp_to_host"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::UnboundSubCommand { .. })
        ));
    }

    #[test]
    fn test_debug_output() {
        let binding = create_table().bind(Provider::Factory);
        let text = format!("{binding:?}");
        assert!(text.contains("SshHost"));
        assert!(text.contains("instantiated: false"));
    }
}
