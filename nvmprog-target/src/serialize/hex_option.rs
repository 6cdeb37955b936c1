use super::{serialize_u_int::SerializeUnsignedInt, IntOrString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub(crate) fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + std::fmt::LowerHex + SerializeUnsignedInt,
{
    match value {
        Some(val) if serializer.is_human_readable() => {
            serializer.serialize_some(format!("{val:#x}").as_str())
        }
        Some(val) => serializer.serialize_some(val),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    match Option::<IntOrString>::deserialize(deserializer)? {
        Some(value) => super::narrow(value.into_u64()?).map(Some),
        None => Ok(None),
    }
}
