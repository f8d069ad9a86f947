//! 命令提供者模块
//!
//! 用显式的操作表代替运行时反射：提供者声明操作及其参数，
//! 注册表据此生成子命令，分发器据此调用。

pub mod binding;
pub mod table;

// 重新导出主要类型
pub use binding::{Dispatch, Provider, ProviderBinding};
pub use table::{
    CallArgs, FactoryFn, Handler, Operation, OperationDescriptor, OperationTable,
    ParamDescriptor, FACTORY_NAME,
};
