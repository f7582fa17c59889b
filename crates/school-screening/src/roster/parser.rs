use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug, Deserialize)]
pub(crate) struct RosterRow {
    pub(crate) id: String,
    pub(crate) unique_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) grade: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) gender: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) school: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) teacher: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) dob: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub(crate) status: Option<String>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<RosterRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader.deserialize::<RosterRow>().collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
