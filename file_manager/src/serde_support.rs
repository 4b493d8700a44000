use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

pub fn serialize_bool_to_string<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(true) => serializer.serialize_str("true"),
        Some(false) => serializer.serialize_str("false"),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize_string_to_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(de::Error::custom("expected true or false as string")),
        None => Ok(None),
    }
}

#[derive(Clone, Copy, Debug)]
pub enum FileName {
    Config,
    Credentials,
}

impl Display for FileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FileName::Config => write!(f, "config"),
            FileName::Credentials => write!(f, "credentials"),
        }
    }
}

/// Reads every section of an INI file. A missing file reads as empty.
pub fn read_sections<T>(path: &Path) -> Result<HashMap<String, T>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let reader = BufReader::new(File::open(path)?);
    Ok(serde_ini::from_bufread(reader)?)
}

/// Rewrites the whole file with sections sorted by name.
pub fn serialize_write_ordered<T>(
    profiles: &HashMap<String, T>,
    path: &Path,
    file_name: FileName,
) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);

    let mut sorted_profiles: Vec<_> = profiles.iter().collect();
    sorted_profiles.sort_by_key(|x| x.0);

    for (key, profile) in sorted_profiles {
        writeln!(writer, "[{}]", key)?;
        serde_ini::to_writer(&mut writer, profile)?;
        writeln!(writer)?;
    }
    writer.flush()?;

    debug!("AWS {} file written to {}", file_name, path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            serialize_with = "serialize_bool_to_string",
            deserialize_with = "deserialize_string_to_bool"
        )]
        enabled: Option<bool>,
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sections: HashMap<String, Section> =
            read_sections(&dir.path().join("absent")).unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn writes_sections_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config");
        let mut sections = HashMap::new();
        sections.insert(
            "zeta".to_string(),
            Section {
                name: Some("z".into()),
                enabled: Some(false),
            },
        );
        sections.insert(
            "alpha".to_string(),
            Section {
                name: None,
                enabled: Some(true),
            },
        );

        serialize_write_ordered(&sections, &path, FileName::Config).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.find("[alpha]").unwrap() < written.find("[zeta]").unwrap());

        let read: HashMap<String, Section> = read_sections(&path).unwrap();
        assert_eq!(read, sections);
    }
}
