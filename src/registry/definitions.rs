//! 参数与环境变量定义
//!
//! 纯数据结构，描述一个命令行参数或一个环境变量

use crate::error::RegistryError;
use serde_json::Value;
use std::collections::BTreeSet;

/// 保留的命令行选项
pub const RESERVED_FLAGS: [&str; 4] = ["-v", "--verbose", "-h", "--help"];

/// 保留的目标名，与解析结果中的日志级别和子命令名冲突
pub const RESERVED_DESTS: [&str; 2] = ["verbose", "sub_command"];

/// 参数值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 字符串
    String,
    /// 整数
    Integer,
    /// 浮点数
    Float,
    /// 布尔开关，出现即为 true
    Flag,
}

impl ValueKind {
    /// 类型名称，用于错误信息
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Flag => "flag",
        }
    }
}

/// 参数取值个数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// 恰好一个值
    One,
    /// 零个或一个值（可省略的位置参数）
    Optional,
    /// 任意多个值，结果为数组
    Many,
}

/// 命令行参数定义
///
/// 位置参数没有选项名；可选参数至少有一个选项名，
/// 缺省时取默认值或 `null`。
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDef {
    flags: Vec<String>,
    dest: String,
    kind: ValueKind,
    default: Option<Value>,
    required: bool,
    positional: bool,
    arity: Arity,
    choices: Option<Vec<String>>,
    help: Option<String>,
}

impl ArgumentDef {
    /// 创建必需的位置参数
    pub fn positional(dest: impl Into<String>) -> Self {
        Self {
            flags: Vec::new(),
            dest: dest.into(),
            kind: ValueKind::String,
            default: None,
            required: true,
            positional: true,
            arity: Arity::One,
            choices: None,
            help: None,
        }
    }

    /// 创建带值的可选参数，例如 `["-b", "--branch"]`
    ///
    /// 目标名取第一个长选项（去掉 `--`，`-` 替换为 `_`），
    /// 没有长选项时取第一个短选项的字母。
    pub fn option<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flags: Vec<String> = flags.into_iter().map(Into::into).collect();
        let dest = derive_dest(&flags);
        Self {
            flags,
            dest,
            kind: ValueKind::String,
            default: None,
            required: false,
            positional: false,
            arity: Arity::One,
            choices: None,
            help: None,
        }
    }

    /// 创建布尔开关参数，例如 `["-f", "--force"]`
    pub fn flag<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: ValueKind::Flag,
            default: Some(Value::Bool(false)),
            ..Self::option(flags)
        }
    }

    /// 设置目标名
    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    /// 设置值类型
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// 设置默认值
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// 位置参数可省略，省略时取默认值（未设置则为 `null`）
    pub fn optional(mut self) -> Self {
        self.arity = Arity::Optional;
        self.required = false;
        if self.default.is_none() {
            self.default = Some(Value::Null);
        }
        self
    }

    /// 接受任意多个值
    pub fn many(mut self) -> Self {
        self.arity = Arity::Many;
        self.required = false;
        self
    }

    /// 限定可选值
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// 设置帮助信息
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn dest_name(&self) -> &str {
        &self.dest
    }

    pub fn value_kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn allowed_values(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// 是否包含某个选项名
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// 校验定义本身是否合法
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.dest.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(format!(
                "参数 {:?} 缺少目标名",
                self.flags
            )));
        }
        if self.dest.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidArgument(format!(
                "目标名 '{}' 不能包含空白字符",
                self.dest
            )));
        }
        if RESERVED_DESTS.contains(&self.dest.as_str()) {
            return Err(RegistryError::ReservedArgument {
                name: self.dest.clone(),
            });
        }

        if self.choices.is_some() && self.kind != ValueKind::String {
            return Err(RegistryError::InvalidArgument(format!(
                "参数 '{}' 只有字符串类型可以限定可选值",
                self.dest
            )));
        }

        if self.positional {
            if !self.flags.is_empty() {
                return Err(RegistryError::InvalidArgument(format!(
                    "位置参数 '{}' 不能带有选项名",
                    self.dest
                )));
            }
            if self.kind == ValueKind::Flag {
                return Err(RegistryError::InvalidArgument(format!(
                    "位置参数 '{}' 不能是布尔开关",
                    self.dest
                )));
            }
            return Ok(());
        }

        if self.flags.is_empty() {
            return Err(RegistryError::InvalidArgument(format!(
                "可选参数 '{}' 至少需要一个选项名",
                self.dest
            )));
        }
        for flag in &self.flags {
            if RESERVED_FLAGS.contains(&flag.as_str()) {
                return Err(RegistryError::ReservedArgument { name: flag.clone() });
            }
            if parse_flag(flag).is_none() {
                return Err(RegistryError::InvalidArgument(format!(
                    "选项名 '{}' 格式无效，应为 -x 或 --name",
                    flag
                )));
            }
        }
        if self.kind == ValueKind::Flag && self.arity == Arity::Many {
            return Err(RegistryError::InvalidArgument(format!(
                "布尔开关 '{}' 不能接受多个值",
                self.dest
            )));
        }

        Ok(())
    }
}

/// 选项名的两种形式
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FlagName<'a> {
    Short(char),
    Long(&'a str),
}

/// 解析选项名，格式无效时返回 None
pub(crate) fn parse_flag(flag: &str) -> Option<FlagName<'_>> {
    if let Some(long) = flag.strip_prefix("--") {
        let valid = !long.is_empty()
            && !long.starts_with('-')
            && long
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        return valid.then_some(FlagName::Long(long));
    }

    let short = flag.strip_prefix('-')?;
    let mut chars = short.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(FlagName::Short(c)),
        _ => None,
    }
}

fn derive_dest(flags: &[String]) -> String {
    let long = flags.iter().find_map(|f| match parse_flag(f) {
        Some(FlagName::Long(name)) => Some(name.replace('-', "_")),
        _ => None,
    });
    long.or_else(|| {
        flags.iter().find_map(|f| match parse_flag(f) {
            Some(FlagName::Short(c)) => Some(c.to_string()),
            _ => None,
        })
    })
    .unwrap_or_default()
}

/// 环境变量定义
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDef {
    name: String,
    dest: String,
    default: Option<String>,
    required: bool,
    scoped_sub_commands: Option<BTreeSet<String>>,
}

impl EnvironmentDef {
    /// 创建环境变量定义，目标名默认为变量名的小写形式
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let dest = name.to_lowercase();
        Self {
            name,
            dest,
            default: None,
            required: false,
            scoped_sub_commands: None,
        }
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// 仅在这些子命令激活时读取该变量
    pub fn scoped_to<I, S>(mut self, sub_commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scoped_sub_commands = Some(sub_commands.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dest_name(&self) -> &str {
        &self.dest
    }

    /// 默认值，空字符串视为没有默认值
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref().filter(|d| !d.is_empty())
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn scope(&self) -> Option<&BTreeSet<String>> {
        self.scoped_sub_commands.as_ref()
    }

    /// 当前子命令下是否需要解析该变量
    pub fn applies_to(&self, active_sub_command: Option<&str>) -> bool {
        match &self.scoped_sub_commands {
            None => true,
            Some(scope) => active_sub_command.is_some_and(|name| scope.contains(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_dest_from_long_flag() {
        let def = ArgumentDef::option(["-u", "--ssh-user"]);
        assert_eq!(def.dest_name(), "ssh_user");
        assert!(!def.is_positional());
        assert!(!def.is_required());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_option_dest_from_short_flag() {
        let def = ArgumentDef::option(["-F"]);
        assert_eq!(def.dest_name(), "F");
    }

    #[test]
    fn test_positional_defaults() {
        let def = ArgumentDef::positional("job_name");
        assert!(def.is_positional());
        assert!(def.is_required());
        assert_eq!(def.arity(), Arity::One);
        assert!(def.flags().is_empty());
    }

    #[test]
    fn test_optional_positional_defaults_to_null() {
        let def = ArgumentDef::positional("branch").optional();
        assert!(!def.is_required());
        assert_eq!(def.arity(), Arity::Optional);
        assert_eq!(def.default(), Some(&Value::Null));

        let def = ArgumentDef::positional("version")
            .default_value("auto")
            .optional();
        assert_eq!(def.default(), Some(&Value::from("auto")));
    }

    #[test]
    fn test_flag_defaults_to_false() {
        let def = ArgumentDef::flag(["-f", "--force"]);
        assert_eq!(def.value_kind(), ValueKind::Flag);
        assert_eq!(def.default(), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_reserved_flag_rejected() {
        let err = ArgumentDef::option(["-v", "--level"]).validate().unwrap_err();
        assert!(matches!(err, RegistryError::ReservedArgument { name } if name == "-v"));

        let err = ArgumentDef::positional("sub_command").validate().unwrap_err();
        assert!(matches!(err, RegistryError::ReservedArgument { .. }));
    }

    #[test]
    fn test_help_and_version_are_ordinary_dests() {
        assert!(ArgumentDef::positional("version").validate().is_ok());
        assert!(ArgumentDef::positional("help").optional().validate().is_ok());
        assert!(ArgumentDef::option(["--version"]).validate().is_ok());
    }

    #[test]
    fn test_invalid_flags_rejected() {
        assert!(ArgumentDef::option(["-folder"]).validate().is_err());
        assert!(ArgumentDef::option(["folder"]).validate().is_err());
        assert!(ArgumentDef::option(Vec::<String>::new()).validate().is_err());
        assert!(ArgumentDef::positional("a b").validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("-b"), Some(FlagName::Short('b')));
        assert_eq!(parse_flag("--branch"), Some(FlagName::Long("branch")));
        assert_eq!(parse_flag("---x"), None);
        assert_eq!(parse_flag("-"), None);
    }

    #[test]
    fn test_environment_def_dest_lowercase() {
        let def = EnvironmentDef::new("LOGNAME");
        assert_eq!(def.dest_name(), "logname");

        let def = EnvironmentDef::new("RPM_REPO_SSH_USER").dest("ssh_user");
        assert_eq!(def.dest_name(), "ssh_user");
    }

    #[test]
    fn test_environment_empty_default_is_none() {
        let def = EnvironmentDef::new("JENKINS_URL").default_value("");
        assert_eq!(def.default(), None);
    }

    #[test]
    fn test_environment_scope() {
        let def = EnvironmentDef::new("JENKINS_TOKEN").scoped_to(["show-job"]);
        assert!(def.applies_to(Some("show-job")));
        assert!(!def.applies_to(Some("deploy")));
        assert!(!def.applies_to(None));

        let unscoped = EnvironmentDef::new("HOME");
        assert!(unscoped.applies_to(None));
    }
}
