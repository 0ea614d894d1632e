//! Lenient field decoding
//!
//! Backend records mix numbers and numeric strings (threshold forms store
//! whatever the operator typed). These helpers accept both and map empty or
//! unparseable text to `None`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Num(f64),
    Text(String),
    Bool(bool),
}

/// Decode an optional float from a number, a numeric string, or null
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumOrText>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumOrText::Num(n)) => Some(n),
        Some(NumOrText::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(NumOrText::Bool(_)) | None => None,
    })
}

/// Decode an optional unsigned integer (bitmasks, counters)
pub fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_f64(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

/// Decode an identifier that may be sent as a number or a string
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumOrText::deserialize(deserializer)? {
        NumOrText::Num(n) if n.fract() == 0.0 => Ok(format!("{}", n as i64)),
        NumOrText::Num(n) => Ok(n.to_string()),
        NumOrText::Text(s) => Ok(s),
        NumOrText::Bool(b) => Ok(b.to_string()),
    }
}

/// Optional variant of [`id_string`]
pub fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Wrap>::deserialize(deserializer)?
        .map(|w| w.0)
        .filter(|s| !s.is_empty()))
}

/// Decode a list of identifiers, each a number or a string
pub fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Vec<Wrap>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|w| w.0)
        .collect())
}
