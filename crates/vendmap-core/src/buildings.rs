use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::machine::Coordinates;
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Building {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

#[derive(Debug, Deserialize)]
pub struct BuildingsFile {
    pub buildings: Vec<Building>,
}

/// Load and validate the campus building catalogue from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_buildings(path: &Path) -> Result<BuildingDirectory, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BuildingsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: BuildingsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::BuildingsFileParse)?;

    BuildingDirectory::new(file.buildings)
}

/// Searchable list of buildings, kept in catalogue order.
#[derive(Debug, Clone, Default)]
pub struct BuildingDirectory {
    buildings: Vec<Building>,
}

impl BuildingDirectory {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for blank or duplicate names
    /// (case-insensitive) and out-of-range coordinates.
    pub fn new(buildings: Vec<Building>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for building in &buildings {
            let name = building.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "building name must be non-empty".to_string(),
                ));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate building name: '{name}'"
                )));
            }
            if !building.coordinates().is_in_range() {
                return Err(ConfigError::Validation(format!(
                    "building '{name}' has out-of-range coordinates ({}, {})",
                    building.lat, building.lng
                )));
            }
        }
        Ok(Self { buildings })
    }

    #[must_use]
    pub fn all(&self) -> &[Building] {
        &self.buildings
    }

    /// Buildings whose name starts with `input`, ignoring case.
    #[must_use]
    pub fn suggest(&self, input: &str) -> Vec<&Building> {
        let needle = input.to_lowercase();
        self.buildings
            .iter()
            .filter(|b| b.name.to_lowercase().starts_with(&needle))
            .collect()
    }

    /// Exact (trimmed, case-insensitive) name match.
    #[must_use]
    pub fn find(&self, input: &str) -> Option<&Building> {
        let needle = input.trim().to_lowercase();
        self.buildings
            .iter()
            .find(|b| b.name.to_lowercase() == needle)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn building(name: &str) -> Building {
        Building {
            name: name.to_string(),
            lat: 49.25,
            lng: -123.0,
        }
    }

    fn directory() -> BuildingDirectory {
        BuildingDirectory::new(vec![
            building("SW1"),
            building("SW3"),
            building("SE2"),
            building("NE1"),
        ])
        .expect("valid directory")
    }

    #[test]
    fn suggest_matches_prefix_case_insensitively() {
        let dir = directory();
        let names: Vec<&str> = dir.suggest("sw").iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["SW1", "SW3"]);
    }

    #[test]
    fn suggest_with_empty_input_returns_everything() {
        assert_eq!(directory().suggest("").len(), 4);
    }

    #[test]
    fn suggest_without_match_is_empty() {
        assert!(directory().suggest("zz").is_empty());
    }

    #[test]
    fn find_is_trimmed_and_case_insensitive() {
        let dir = directory();
        assert_eq!(dir.find("  se2 ").map(|b| b.name.as_str()), Some("SE2"));
        assert!(dir.find("SE").is_none());
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let err = BuildingDirectory::new(vec![building("SW1"), building("sw1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn out_of_range_coordinates_fail_validation() {
        let mut bad = building("SW1");
        bad.lat = 123.0;
        assert!(BuildingDirectory::new(vec![bad]).is_err());
    }

    #[test]
    fn load_buildings_reads_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "buildings:\n  - name: SW1\n    lat: 49.2509\n    lng: -123.0016\n  - name: NE1\n    lat: 49.2543\n    lng: -123.0027"
        )
        .expect("write yaml");

        let dir = load_buildings(file.path()).expect("load");
        assert_eq!(dir.all().len(), 2);
        assert!(dir.find("ne1").is_some());
    }

    #[test]
    fn load_buildings_reports_missing_file() {
        let err = load_buildings(Path::new("/nonexistent/buildings.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::BuildingsFileIo { .. }));
    }

    #[test]
    fn shipped_catalogue_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/buildings.yaml");
        let dir = load_buildings(&path).expect("shipped buildings.yaml should load");
        assert!(!dir.all().is_empty());
    }
}
