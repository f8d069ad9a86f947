//! 日志详细级别
//!
//! `-v/--verbose` 是保留的全局选项，解析结果显式地携带级别，
//! 由调用方在启动时配置日志系统。

use crate::error::ParseError;
use clap::{Arg, ArgAction};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 保留选项的目标名
pub const VERBOSE_DEST: &str = "verbose";

/// 日志详细级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verbosity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
    None,
}

impl Verbosity {
    /// 所有可选级别
    pub const ALL: [Verbosity; 6] = [
        Verbosity::Debug,
        Verbosity::Info,
        Verbosity::Warning,
        Verbosity::Error,
        Verbosity::Critical,
        Verbosity::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::Debug => "DEBUG",
            Verbosity::Info => "INFO",
            Verbosity::Warning => "WARNING",
            Verbosity::Error => "ERROR",
            Verbosity::Critical => "CRITICAL",
            Verbosity::None => "NONE",
        }
    }
}

impl FromStr for Verbosity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = s.trim();
        Verbosity::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(level))
            .ok_or_else(|| ParseError::InvalidVerboseLevel {
                level: s.to_string(),
            })
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verbosity> for log::LevelFilter {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Debug => log::LevelFilter::Debug,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Warning => log::LevelFilter::Warn,
            Verbosity::Error | Verbosity::Critical => log::LevelFilter::Error,
            Verbosity::None => log::LevelFilter::Off,
        }
    }
}

/// 保留的 `-v/--verbose` 选项，对所有子命令生效
pub fn verbose_arg() -> Arg {
    Arg::new(VERBOSE_DEST)
        .short('v')
        .long("verbose")
        .value_name("VERBOSE_LEVEL")
        .default_value(Verbosity::default().as_str())
        .action(ArgAction::Set)
        .global(true)
        .help("日志级别: DEBUG, INFO, WARNING, ERROR, CRITICAL, NONE")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("debug".parse::<Verbosity>().unwrap(), Verbosity::Debug);
        assert_eq!("Warning".parse::<Verbosity>().unwrap(), Verbosity::Warning);
        assert_eq!("NONE".parse::<Verbosity>().unwrap(), Verbosity::None);
    }

    #[test]
    fn test_parse_invalid_level() {
        let err = "LOUD".parse::<Verbosity>().unwrap_err();
        assert!(matches!(err, ParseError::InvalidVerboseLevel { level } if level == "LOUD"));
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(log::LevelFilter::from(Verbosity::Warning), log::LevelFilter::Warn);
        assert_eq!(log::LevelFilter::from(Verbosity::Critical), log::LevelFilter::Error);
        assert_eq!(log::LevelFilter::from(Verbosity::None), log::LevelFilter::Off);
        assert_eq!(log::LevelFilter::from(Verbosity::default()), log::LevelFilter::Info);
    }

    #[test]
    fn test_serialize_uppercase() {
        let json = serde_json::to_string(&Verbosity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
