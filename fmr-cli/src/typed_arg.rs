//! Command line spelling of typed arguments.
//!
//! An argument is `type:value` with `type` one of `u8`, `u16`, `u32`,
//! `i8`, `i16`, `i32` or `ptr`. Values accept a `0x` prefix. A bare number
//! is an `int32`.

use anyhow::{Context, Result, bail};
use fmr_model::{Arg, ArgType, Args};

fn parse_number(text: &str) -> Result<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .with_context(|| format!("invalid number '{text}'"))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn checked<T: TryFrom<i64>>(value: i64, text: &str) -> Result<T> {
    T::try_from(value).map_err(|_| anyhow::anyhow!("'{text}' out of range"))
}

/// Parse one `type:value` argument.
pub fn parse_arg(text: &str) -> Result<Arg> {
    let (ty, value) = text.split_once(':').unwrap_or(("i32", text));
    let number = parse_number(value)?;
    let arg = match ty {
        "u8" => Arg::from(checked::<u8>(number, text)?),
        "i8" => Arg::from(checked::<i8>(number, text)?),
        "u16" => Arg::from(checked::<u16>(number, text)?),
        "i16" => Arg::from(checked::<i16>(number, text)?),
        "u32" => Arg::from(checked::<u32>(number, text)?),
        "i32" => Arg::from(checked::<i32>(number, text)?),
        "ptr" => Arg::Pointer(checked::<u32>(number, text)?),
        other => bail!("unknown argument type '{other}'"),
    };
    Ok(arg)
}

pub fn parse_args(texts: &[String]) -> Result<Args> {
    let mut args = Args::new();
    for text in texts {
        args.push(parse_arg(text)?);
    }
    Ok(args)
}

/// Parse a return type name.
pub fn parse_ret(text: &str) -> Result<ArgType> {
    match text {
        "int8" | "u8" | "i8" => Ok(ArgType::Int8),
        "int16" | "u16" | "i16" => Ok(ArgType::Int16),
        "int32" | "u32" | "i32" => Ok(ArgType::Int32),
        "ptr" => Ok(ArgType::Pointer),
        other => bail!("unknown return type '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed() {
        assert_eq!(parse_arg("u8:5").unwrap(), Arg::Int8(5));
        assert_eq!(parse_arg("i16:-2").unwrap(), Arg::Int16(0xFFFE));
        assert_eq!(parse_arg("ptr:0x20000000").unwrap(), Arg::Pointer(0x2000_0000));
        assert_eq!(parse_arg("42").unwrap(), Arg::Int32(42));
    }

    #[test]
    fn test_parse_rejects() {
        assert!(parse_arg("u8:256").is_err());
        assert!(parse_arg("f32:1").is_err());
        assert!(parse_arg("u16:zz").is_err());
    }

    #[test]
    fn test_parse_ret() {
        assert_eq!(parse_ret("ptr").unwrap(), ArgType::Pointer);
        assert!(parse_ret("void").is_err());
    }
}
