use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

pub fn parse_via_string<'de, D, T, F>(deserializer: D, kind: &str, parser: F) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    F: FnOnce(&str) -> Option<T>,
{
    let raw = String::deserialize(deserializer)?;
    parser(&raw).ok_or_else(|| D::Error::custom(format!("unknown {kind} `{raw}`")))
}
