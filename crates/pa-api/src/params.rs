//! Lenient query-string field parsers.
//!
//! Browsers submit empty form inputs as `key=`; those mean "not set".

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};

fn raw<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(de)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// `key=` is `None`; anything else must parse as `T`.
pub fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    raw(de)?
        .map(|v| v.parse::<T>().map_err(de::Error::custom))
        .transpose()
}

/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<Option<bool>, D::Error> {
    raw(de)?
        .map(|v| match v.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean {other:?}"))),
        })
        .transpose()
}
