use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

/// One record of the available-plugins catalogue.
///
/// Fields are kept exactly as declared: a missing field, or one that is not a
/// string, reads as `None`. No defaults are applied at this level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogueEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
}

impl CatalogueEntry {
    #[cfg(test)]
    pub fn new(name: &str, version: &str, description: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            description: Some(description.to_string()),
        }
    }

    pub fn matches(&self, keyword_lower: &str) -> bool {
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
                .contains(keyword_lower)
        };

        contains(&self.name) || contains(&self.description)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    entries: Vec<CatalogueEntry>,
}

impl Catalogue {
    /// Load the catalogue from `path`, degrading to an empty catalogue when the
    /// file is missing, unreadable, or not a JSON array of objects.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(?path, "catalogue not found, using empty catalogue");
            return Self::default();
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(?path, error = %err, "cannot read catalogue");
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<CatalogueEntry>>(&raw) {
            Ok(entries) => {
                tracing::debug!(?path, count = entries.len(), "loaded catalogue");
                Self { entries }
            }
            Err(err) => {
                tracing::warn!(?path, error = %err, "invalid catalogue, using empty catalogue");
                Self::default()
            }
        }
    }

    #[cfg(test)]
    pub fn from_entries(entries: Vec<CatalogueEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogueEntry] {
        &self.entries
    }

    /// Entries whose name or description contains `keyword`, ignoring case.
    pub fn search(&self, keyword: &str) -> Vec<&CatalogueEntry> {
        let keyword_lower = keyword.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.matches(&keyword_lower))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_catalogue(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("available_plugins.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_catalogue_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalogue = Catalogue::load(&dir.path().join("nope.json"));
        assert!(catalogue.entries().is_empty());
    }

    #[test]
    fn test_malformed_catalogue_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_catalogue(dir.path(), "{ not json");
        assert!(Catalogue::load(&path).entries().is_empty());

        let path = write_catalogue(dir.path(), r#"{"name": "echo"}"#);
        assert!(Catalogue::load(&path).entries().is_empty());
    }

    #[test]
    fn test_preserves_order_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_catalogue(
            dir.path(),
            r#"[
                {"name": "b", "version": "1", "description": "first"},
                {"name": "a", "version": "2", "description": "second"},
                {"name": "b", "version": "3", "description": "third"}
            ]"#,
        );

        let catalogue = Catalogue::load(&path);
        let names: Vec<_> = catalogue
            .entries()
            .iter()
            .map(|entry| entry.name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_absent_and_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_catalogue(
            dir.path(),
            r#"[{"name": "solo", "homepage": "x"}, {"name": 7, "version": "1.0"}]"#,
        );

        let catalogue = Catalogue::load(&path);
        assert_eq!(catalogue.entries().len(), 2);
        assert_eq!(catalogue.entries()[0].name.as_deref(), Some("solo"));
        assert_eq!(catalogue.entries()[0].version, None);
        assert_eq!(catalogue.entries()[0].description, None);
        assert_eq!(catalogue.entries()[1].name, None);
    }

    #[test]
    fn test_search_name_and_description() {
        let catalogue = Catalogue::from_entries(vec![
            CatalogueEntry::new("echo", "1.0", "Echo plugin"),
            CatalogueEntry::new("weather", "0.3", "Forecasts with an ECHO of rain"),
            CatalogueEntry::new("clock", "2.1", "Tells time"),
        ]);

        let matches = catalogue.search("Echo");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name.as_deref(), Some("echo"));
        assert_eq!(matches[1].name.as_deref(), Some("weather"));

        assert!(catalogue.search("zzz").is_empty());
    }

    #[test]
    fn test_search_single_entry_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_catalogue(
            dir.path(),
            r#"[{"name":"echo","version":"1.0","description":"Echo plugin"}]"#,
        );
        let catalogue = Catalogue::load(&path);

        assert_eq!(catalogue.search("echo").len(), 1);
        assert!(catalogue.search("zzz").is_empty());
    }

    #[test]
    fn test_search_absent_fields_read_as_empty() {
        let catalogue = Catalogue::from_entries(vec![
            CatalogueEntry::default(),
            CatalogueEntry::new("a", "1", "b"),
        ]);
        assert!(catalogue.search("x").is_empty());
        assert_eq!(catalogue.search("").len(), 2);
    }
}
