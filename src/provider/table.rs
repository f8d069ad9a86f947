//! 操作表
//!
//! 提供者通过操作表声明自己可以作为子命令调用的操作：名称、文档、
//! 有序参数（可带默认值）以及类型化的处理函数。

use crate::error::DispatchError;
use crate::parser::ParsedResult;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// 工厂方法的约定名称，不会生成子命令
pub const FACTORY_NAME: &str = "init_from_parsed_args";

/// 接收者参数名，生成子命令和分发时都会跳过
const RECEIVER_NAMES: [&str; 2] = ["self", "cls"];

/// 操作处理函数
pub type Handler<T> = Rc<dyn Fn(&mut T, &CallArgs) -> anyhow::Result<Value>>;

/// 工厂函数，用解析结果构造提供者实例
pub type FactoryFn<T> = Rc<dyn Fn(&ParsedResult) -> anyhow::Result<T>>;

/// 参数描述
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    name: String,
    default: Option<Value>,
}

impl ParamDescriptor {
    /// 没有默认值的参数
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// 默认值为 `null` 的参数
    pub fn optional(name: impl Into<String>) -> Self {
        Self::with_default(name, Value::Null)
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_receiver(&self) -> bool {
        RECEIVER_NAMES.contains(&self.name.as_str())
    }
}

/// 操作描述
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    name: String,
    doc: Option<String>,
    params: Vec<ParamDescriptor>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
        }
    }

    /// 文档说明，第一行作为子命令的帮助信息
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = ParamDescriptor>,
    {
        self.params.extend(params);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// 文档的第一个非空行
    pub fn summary(&self) -> Option<&str> {
        self.doc
            .as_deref()?
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }

    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }

    /// 调用时需要的参数（不含接收者），按声明顺序
    pub fn call_parameters(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter().filter(|p| !p.is_receiver())
    }
}

/// 一个操作：描述加处理函数
pub struct Operation<T> {
    descriptor: OperationDescriptor,
    handler: Handler<T>,
}

impl<T> Operation<T> {
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub(crate) fn call(&self, provider: &mut T, args: &CallArgs) -> anyhow::Result<Value> {
        (self.handler)(provider, args)
    }
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// 提供者的操作表
pub struct OperationTable<T> {
    provider: String,
    operations: Vec<Operation<T>>,
    factory: Option<FactoryFn<T>>,
}

impl<T: 'static> OperationTable<T> {
    /// 创建空的操作表
    ///
    /// # 参数
    /// * `provider` - 提供者名称，用于日志和错误信息
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            operations: Vec::new(),
            factory: None,
        }
    }

    /// 声明一个操作
    ///
    /// 处理函数的返回值会被序列化为 JSON 交给调用方；
    /// 处理函数返回的错误原样向上传播。同名操作以先声明的为准。
    pub fn operation<F, R>(mut self, descriptor: OperationDescriptor, handler: F) -> Self
    where
        F: Fn(&mut T, &CallArgs) -> anyhow::Result<R> + 'static,
        R: Serialize,
    {
        let operation = descriptor.name().to_string();
        let wrapped: Handler<T> = Rc::new(
            move |provider: &mut T, args: &CallArgs| -> anyhow::Result<Value> {
                let output = handler(provider, args)?;
                let value = serde_json::to_value(output).map_err(|source| {
                    DispatchError::Serialize {
                        operation: operation.clone(),
                        source,
                    }
                })?;
                Ok(value)
            },
        );
        self.operations.push(Operation {
            descriptor,
            handler: wrapped,
        });
        self
    }

    /// 声明工厂方法 `init_from_parsed_args`
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ParsedResult) -> anyhow::Result<T> + 'static,
    {
        self.factory = Some(Rc::new(factory));
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider
    }

    pub fn get(&self, name: &str) -> Option<&Operation<T>> {
        self.operations.iter().find(|op| op.descriptor.name() == name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter().map(|op| &op.descriptor)
    }

    pub fn factory_fn(&self) -> Option<&FactoryFn<T>> {
        self.factory.as_ref()
    }
}

impl<T> fmt::Debug for OperationTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable")
            .field("provider", &self.provider)
            .field("operations", &self.operations)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// 分发时按声明顺序提取出的参数
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArgs {
    operation: String,
    entries: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    fn entry(&self, index: usize) -> Result<(&str, &Value), DispatchError> {
        self.entries
            .get(index)
            .map(|(name, value)| (name.as_str(), value))
            .ok_or_else(|| DispatchError::MissingArgument {
                operation: self.operation.clone(),
                name: format!("#{index}"),
            })
    }

    /// 原始值
    pub fn value(&self, index: usize) -> Result<&Value, DispatchError> {
        self.entry(index).map(|(_, value)| value)
    }

    /// 字符串参数
    pub fn string(&self, index: usize) -> Result<&str, DispatchError> {
        let (name, value) = self.entry(index)?;
        value
            .as_str()
            .ok_or_else(|| type_error(name, "string", value))
    }

    /// 可为 `null` 的字符串参数
    pub fn opt_string(&self, index: usize) -> Result<Option<&str>, DispatchError> {
        let (name, value) = self.entry(index)?;
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(type_error(name, "string", other)),
        }
    }

    /// 整数参数，数字字符串会被转换
    pub fn integer(&self, index: usize) -> Result<i64, DispatchError> {
        let (name, value) = self.entry(index)?;
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| type_error(name, "integer", value))
    }

    /// 浮点参数，数字字符串会被转换
    pub fn float(&self, index: usize) -> Result<f64, DispatchError> {
        let (name, value) = self.entry(index)?;
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| type_error(name, "float", value))
    }

    /// 布尔参数，`null` 视为 false
    pub fn flag(&self, index: usize) -> Result<bool, DispatchError> {
        let (name, value) = self.entry(index)?;
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            other => Err(type_error(name, "flag", other)),
        }
    }

    /// 字符串列表参数，`null` 视为空列表
    pub fn strings(&self, index: usize) -> Result<Vec<String>, DispatchError> {
        let (name, value) = self.entry(index)?;
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| type_error(name, "string list", value))
                })
                .collect(),
            other => Err(type_error(name, "string list", other)),
        }
    }
}

fn type_error(name: &str, expected: &'static str, actual: &Value) -> DispatchError {
    DispatchError::ArgumentType {
        name: name.to_string(),
        expected,
        actual: actual.to_string(),
    }
}
