//! 环境变量解析
//!
//! 按注册顺序解析环境变量定义。作用域不包含当前子命令的定义被整体跳过，
//! 空值视为未设置。

use crate::error::ParseError;
use crate::registry::EnvironmentDef;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 环境变量来源
pub trait EnvironmentSource {
    /// 读取变量，未设置时返回 None
    fn get(&self, name: &str) -> Result<Option<String>, ParseError>;
}

/// 进程环境变量
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    /// 值不是合法的 UTF-8 时返回 `InvalidEnvironmentEncoding`
    fn get(&self, name: &str) -> Result<Option<String>, ParseError> {
        std::env::var_os(name)
            .map(|value| {
                value
                    .into_string()
                    .map_err(|_| ParseError::InvalidEnvironmentEncoding {
                        name: name.to_string(),
                    })
            })
            .transpose()
    }
}

impl EnvironmentSource for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Result<Option<String>, ParseError> {
        Ok(BTreeMap::get(self, name).cloned())
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Result<Option<String>, ParseError> {
        Ok(HashMap::get(self, name).cloned())
    }
}

/// 多层环境变量来源，按添加顺序查找第一个非空值
#[derive(Default)]
pub struct LayeredEnvironment<'a> {
    layers: Vec<Box<dyn EnvironmentSource + 'a>>,
}

impl<'a> LayeredEnvironment<'a> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// 以进程环境变量为第一层
    pub fn process() -> Self {
        Self::new().with_layer(ProcessEnvironment)
    }

    pub fn with_layer(mut self, source: impl EnvironmentSource + 'a) -> Self {
        self.layers.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl EnvironmentSource for LayeredEnvironment<'_> {
    fn get(&self, name: &str) -> Result<Option<String>, ParseError> {
        for layer in &self.layers {
            if let Some(value) = layer.get(name)?.filter(|v| !v.is_empty()) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// 环境变量解析器
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentResolver<'a> {
    definitions: &'a [EnvironmentDef],
}

impl<'a> EnvironmentResolver<'a> {
    pub fn new(definitions: &'a [EnvironmentDef]) -> Self {
        Self { definitions }
    }

    /// 从进程环境变量解析
    pub fn resolve(
        &self,
        active_sub_command: Option<&str>,
    ) -> Result<BTreeMap<String, String>, ParseError> {
        self.resolve_with(&ProcessEnvironment, active_sub_command)
    }

    /// 从指定来源解析
    ///
    /// # 返回
    /// * 目标名到原始字符串值的映射，未设置且没有默认值的可选变量不出现
    pub fn resolve_with(
        &self,
        source: &dyn EnvironmentSource,
        active_sub_command: Option<&str>,
    ) -> Result<BTreeMap<String, String>, ParseError> {
        let mut resolved = BTreeMap::new();

        for definition in self.definitions {
            if !definition.applies_to(active_sub_command) {
                debug!(
                    "环境变量 {} 不作用于子命令 {:?}，跳过",
                    definition.name(),
                    active_sub_command
                );
                continue;
            }

            let value = source.get(definition.name())?.filter(|v| !v.is_empty());
            let value = match value {
                Some(value) => value,
                None if definition.is_required() => {
                    return Err(ParseError::MissingEnvironment {
                        name: definition.name().to_string(),
                    });
                }
                None => match definition.default() {
                    Some(default) => default.to_string(),
                    None => continue,
                },
            };

            resolved.insert(definition.dest_name().to_string(), value);
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_definitions() -> Vec<EnvironmentDef> {
        vec![
            EnvironmentDef::new("HOME").required(true),
            EnvironmentDef::new("LOGNAME"),
            EnvironmentDef::new("JENKINS_URL").default_value("https://jenkins.example.org"),
            EnvironmentDef::new("JENKINS_TOKEN")
                .required(true)
                .scoped_to(["show-job"]),
        ]
    }

    fn source(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_with_defaults() {
        let definitions = create_definitions();
        let resolver = EnvironmentResolver::new(&definitions);
        let resolved = resolver
            .resolve_with(&source(&[("HOME", "/home/builder")]), None)
            .unwrap();

        assert_eq!(resolved.get("home").map(String::as_str), Some("/home/builder"));
        assert!(!resolved.contains_key("logname"));
        assert_eq!(
            resolved.get("jenkins_url").map(String::as_str),
            Some("https://jenkins.example.org")
        );
        assert!(!resolved.contains_key("jenkins_token"));
    }

    #[test]
    fn test_required_missing() {
        let definitions = create_definitions();
        let resolver = EnvironmentResolver::new(&definitions);
        let err = resolver.resolve_with(&source(&[]), None).unwrap_err();
        assert!(matches!(err, ParseError::MissingEnvironment { name } if name == "HOME"));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let definitions = create_definitions();
        let resolver = EnvironmentResolver::new(&definitions);
        let err = resolver
            .resolve_with(&source(&[("HOME", "")]), None)
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingEnvironment { .. }));
    }

    #[test]
    fn test_scoped_required_only_in_scope() {
        let definitions = create_definitions();
        let resolver = EnvironmentResolver::new(&definitions);
        let env = source(&[("HOME", "/root")]);

        assert!(resolver.resolve_with(&env, Some("deploy")).is_ok());
        let err = resolver.resolve_with(&env, Some("show-job")).unwrap_err();
        assert!(matches!(err, ParseError::MissingEnvironment { name } if name == "JENKINS_TOKEN"));
    }

    #[test]
    fn test_layered_environment_first_non_empty_wins() {
        let layered = LayeredEnvironment::new()
            .with_layer(source(&[("LOGNAME", "")]))
            .with_layer(source(&[("LOGNAME", "builder"), ("HOME", "/srv")]));
        assert_eq!(layered.len(), 2);
        assert_eq!(layered.get("LOGNAME").unwrap().as_deref(), Some("builder"));
        assert_eq!(layered.get("HOME").unwrap().as_deref(), Some("/srv"));
        assert_eq!(layered.get("SHELL").unwrap(), None);
    }

    #[test]
    fn test_process_environment() {
        temp_env::with_var("RELEASE_HELPER_TEST_HOME", Some("/tmp/home"), || {
            let definitions =
                vec![EnvironmentDef::new("RELEASE_HELPER_TEST_HOME").dest("home")];
            let resolved = EnvironmentResolver::new(&definitions).resolve(None).unwrap();
            assert_eq!(resolved.get("home").map(String::as_str), Some("/tmp/home"));
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_process_environment_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let value = OsStr::from_bytes(&[0x66, 0x6f, 0xff]);
        temp_env::with_var("RELEASE_HELPER_TEST_BYTES", Some(value), || {
            let definitions =
                vec![EnvironmentDef::new("RELEASE_HELPER_TEST_BYTES").required(true)];
            let err = EnvironmentResolver::new(&definitions)
                .resolve(None)
                .unwrap_err();
            assert!(matches!(
                err,
                ParseError::InvalidEnvironmentEncoding { name } if name == "RELEASE_HELPER_TEST_BYTES"
            ));
        });
    }
}
