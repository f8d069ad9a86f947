//! clap 命令构建
//!
//! 注册表中的定义在解析时才转换为 clap 的 `Command`，
//! 公共参数在这里合并进每个子命令。

use crate::error::ParseError;
use crate::parser::verbosity::verbose_arg;
use crate::registry::definitions::{parse_flag, FlagName};
use crate::registry::{ArgumentDef, Arity, CommandRegistry, SubCommandSpec, ValueKind};
use clap::builder::PossibleValuesParser;
use clap::parser::MatchesError;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;

/// 根据注册表构建顶层命令
pub(crate) fn build_command(registry: &CommandRegistry) -> Command {
    let mut command = Command::new(registry.name().to_string())
        .disable_help_subcommand(true)
        .arg(verbose_arg());

    if let Some(about) = registry.about_text() {
        command = command.about(about.to_string());
    }
    if let Some(version) = registry.version_text() {
        command = command.version(version.to_string());
    }

    for spec in registry.sub_commands() {
        command = command.subcommand(build_sub_command(registry.common_arguments(), spec));
    }

    command
}

fn build_sub_command(common: &[ArgumentDef], spec: &SubCommandSpec) -> Command {
    let mut command = Command::new(spec.name().to_string());
    if let Some(help) = spec.help_text() {
        command = command.about(help.to_string());
    }

    // 公共参数在前
    for argument in common.iter().chain(spec.specific_arguments()) {
        command = command.arg(to_arg(argument));
    }

    command
}

/// clap 内部使用的参数 id，避免目标名与 clap 自带的 `help`、`version` 冲突
fn arg_id(dest: &str) -> String {
    format!("arg.{dest}")
}

/// 把参数定义转换为 clap 参数
pub(crate) fn to_arg(def: &ArgumentDef) -> Arg {
    let mut arg = Arg::new(arg_id(def.dest_name()));
    if let Some(help) = def.help_text() {
        arg = arg.help(help.to_string());
    }

    if def.value_kind() == ValueKind::Flag {
        return apply_flags(arg, def.flags()).action(ArgAction::SetTrue);
    }

    arg = match def.allowed_values() {
        Some(choices) => arg.value_parser(PossibleValuesParser::new(choices.iter().cloned())),
        None => match def.value_kind() {
            ValueKind::Integer => arg.value_parser(value_parser!(i64)),
            ValueKind::Float => arg.value_parser(value_parser!(f64)),
            ValueKind::String | ValueKind::Flag => arg.value_parser(value_parser!(String)),
        },
    };

    if def.is_positional() {
        arg = arg
            .value_name(def.dest_name().to_string())
            .required(def.is_required());
        match def.arity() {
            Arity::Many => arg.num_args(1..).action(ArgAction::Append),
            Arity::One | Arity::Optional => arg.action(ArgAction::Set),
        }
    } else {
        arg = apply_flags(arg, def.flags()).value_name(def.dest_name().to_uppercase());
        match def.arity() {
            Arity::Many => arg.action(ArgAction::Append),
            Arity::One | Arity::Optional => arg.action(ArgAction::Set),
        }
    }
}

/// 第一个短选项和第一个长选项为主名称，其余作为别名
fn apply_flags(mut arg: Arg, flags: &[String]) -> Arg {
    let mut has_short = false;
    let mut has_long = false;

    for flag in flags {
        match parse_flag(flag) {
            Some(FlagName::Short(c)) if !has_short => {
                arg = arg.short(c);
                has_short = true;
            }
            Some(FlagName::Short(c)) => arg = arg.short_alias(c),
            Some(FlagName::Long(name)) if !has_long => {
                arg = arg.long(name.to_string());
                has_long = true;
            }
            Some(FlagName::Long(name)) => arg = arg.alias(name.to_string()),
            None => {}
        }
    }

    arg
}

/// 从匹配结果中取出参数值，缺省时取默认值或 `null`
pub(crate) fn extract(def: &ArgumentDef, matches: &ArgMatches) -> Result<Value, ParseError> {
    let id = arg_id(def.dest_name());
    let id = id.as_str();
    let to_parse_error = |source: MatchesError| ParseError::Extract {
        dest: def.dest_name().to_string(),
        source,
    };

    if def.value_kind() == ValueKind::Flag {
        let set = matches
            .try_get_one::<bool>(id)
            .map_err(to_parse_error)?
            .copied()
            .unwrap_or(false);
        return Ok(if set {
            Value::Bool(true)
        } else {
            def.default().cloned().unwrap_or(Value::Bool(false))
        });
    }

    let value = match (def.value_kind(), def.arity()) {
        (ValueKind::Integer, Arity::Many) => many::<i64>(matches, id),
        (ValueKind::Float, Arity::Many) => many::<f64>(matches, id),
        (_, Arity::Many) => many::<String>(matches, id),
        (ValueKind::Integer, _) => one::<i64>(matches, id),
        (ValueKind::Float, _) => one::<f64>(matches, id),
        (_, _) => one::<String>(matches, id),
    }
    .map_err(to_parse_error)?;

    Ok(match value {
        Some(value) => value,
        None => match (def.default(), def.arity()) {
            (Some(default), _) => default.clone(),
            (None, Arity::Many) => Value::Array(Vec::new()),
            (None, _) => Value::Null,
        },
    })
}

fn one<T>(matches: &ArgMatches, id: &str) -> Result<Option<Value>, MatchesError>
where
    T: Clone + Send + Sync + Into<Value> + 'static,
{
    Ok(matches.try_get_one::<T>(id)?.cloned().map(Into::into))
}

fn many<T>(matches: &ArgMatches, id: &str) -> Result<Option<Value>, MatchesError>
where
    T: Clone + Send + Sync + Into<Value> + 'static,
{
    Ok(matches
        .try_get_many::<T>(id)?
        .map(|values| Value::Array(values.cloned().map(Into::into).collect())))
}
