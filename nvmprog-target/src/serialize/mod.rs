pub(crate) mod hex_option;
pub(crate) mod hex_u_int;
mod serialize_u_int;

use serde::{Deserialize, Deserializer};

/// Numbers in device descriptions may be written as plain integers or as
/// strings with a `0x`, `0o` or `0b` prefix. The serializers emit `0x` strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(u64),
    String(String),
}

impl IntOrString {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            IntOrString::Int(value) => Ok(value),
            IntOrString::String(text) => parse_int::parse::<u64>(text.trim())
                .map_err(|e| E::custom(format!("invalid number '{text}': {e}"))),
        }
    }
}

fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    IntOrString::deserialize(deserializer)?.into_u64()
}

fn narrow<T, E>(value: u64) -> Result<T, E>
where
    T: TryFrom<u64>,
    E: serde::de::Error,
{
    T::try_from(value).map_err(|_| E::custom(format!("value {value:#x} is out of range")))
}
