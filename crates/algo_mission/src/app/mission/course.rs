use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CourseId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileRole {
    #[serde(rename = "END")]
    End,
    #[serde(rename = "SPECIAL_BIRD")]
    SpecialBird,
}

impl TileRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            TileRole::End => "END",
            TileRole::SpecialBird => "SPECIAL_BIRD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileConfig {
    pub texture_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePlacement {
    #[serde(rename = "id")]
    pub tile_type: String,
    pub x: i32,
    pub z: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<TileRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDefinition {
    #[serde(rename = "mapid")]
    pub id: CourseId,
    pub name: String,
    #[serde(default)]
    pub difficulty: u32,
    #[serde(default)]
    pub instructions: String,
    pub tile_layout: Vec<TilePlacement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseFile {
    #[serde(default)]
    tile_config: BTreeMap<String, TileConfig>,
    map_definition: Vec<CourseDefinition>,
}

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("failed to read course file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse course json{}: {source}", at_path(.path))]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

fn at_path(path: &str) -> String {
    if path.is_empty() || path == "." {
        String::new()
    } else {
        format!(" at {path}")
    }
}

fn validation_err(path: impl Into<String>, message: impl Into<String>) -> CourseError {
    CourseError::Validation {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(path: impl Into<String>, expected: impl Display, actual: impl Display) -> CourseError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

/// Every course in a course file plus the tile types they draw from.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    file: CourseFile,
    digest: String,
}

impl CourseCatalog {
    pub fn load(path: &Path) -> Result<Self, CourseError> {
        let raw = fs::read_to_string(path).map_err(|source| CourseError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CourseError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let file: CourseFile = serde_path_to_error::deserialize(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                CourseError::Parse {
                    path,
                    source: error.into_inner(),
                }
            },
        )?;
        validate_course_file(&file)?;
        Ok(Self {
            file,
            digest: engine::digest_hex(raw.as_bytes()),
        })
    }

    pub fn courses(&self) -> &[CourseDefinition] {
        &self.file.map_definition
    }

    pub fn course(&self, id: CourseId) -> Option<&CourseDefinition> {
        self.file.map_definition.iter().find(|course| course.id == id)
    }

    pub fn first_course_id(&self) -> Option<CourseId> {
        self.file.map_definition.first().map(|course| course.id)
    }

    pub fn tile_config(&self) -> &BTreeMap<String, TileConfig> {
        &self.file.tile_config
    }

    pub fn texture_resource(&self, tile_type: &str) -> Option<String> {
        self.file
            .tile_config
            .get(tile_type)
            .map(|config| format!("textures/{}", config.texture_file))
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn validate_course_file(file: &CourseFile) -> Result<(), CourseError> {
    if file.map_definition.is_empty() {
        return Err(validation_err("mapDefinition", "no courses defined"));
    }

    let mut seen_ids = HashSet::new();
    for (course_index, course) in file.map_definition.iter().enumerate() {
        let course_path = format!("mapDefinition[{course_index}]");
        if !seen_ids.insert(course.id) {
            return Err(validation_err(
                format!("{course_path}.mapid"),
                format!("duplicate course id {}", course.id),
            ));
        }
        if course.tile_layout.is_empty() {
            return Err(expected_actual(
                format!("{course_path}.tileLayout"),
                "at least one tile",
                0,
            ));
        }

        let mut seen_positions = HashSet::new();
        for (tile_index, tile) in course.tile_layout.iter().enumerate() {
            let tile_path = format!("{course_path}.tileLayout[{tile_index}]");
            if !seen_positions.insert((tile.x, tile.z)) {
                return Err(validation_err(
                    tile_path,
                    format!("duplicate tile position ({}, {})", tile.x, tile.z),
                ));
            }
            if !file.tile_config.is_empty() && !file.tile_config.contains_key(&tile.tile_type) {
                return Err(validation_err(
                    format!("{tile_path}.id"),
                    format!("unknown tile type `{}`", tile.tile_type),
                ));
            }
        }

        if !seen_positions.contains(&(0, 0)) {
            return Err(validation_err(
                format!("{course_path}.tileLayout"),
                "missing start tile at (0, 0)",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> serde_json::Value {
        json!({
            "tileConfig": {
                "tile_vert": { "textureFile": "tile_vert.png" },
                "tile_bottom_deadend": { "textureFile": "tile_bottom_deadend.png" },
                "tile_top_deadend": { "textureFile": "tile_top_deadend.png" }
            },
            "mapDefinition": [
                {
                    "mapid": 0,
                    "name": "First Stop",
                    "difficulty": 1,
                    "instructions": "Pick up the passenger.",
                    "tileLayout": [
                        { "id": "tile_bottom_deadend", "x": 0, "z": -1 },
                        { "id": "tile_vert", "x": 0, "z": 0 },
                        { "id": "tile_vert", "x": 0, "z": 1 },
                        { "id": "tile_top_deadend", "x": 0, "z": 2, "role": "END" }
                    ]
                }
            ]
        })
    }

    #[test]
    fn parses_course_file() {
        let catalog = CourseCatalog::from_json_str(&sample_json().to_string()).expect("catalog");

        let course = catalog.course(0).expect("course 0");
        assert_eq!(course.name, "First Stop");
        assert_eq!(course.difficulty, 1);
        assert_eq!(course.tile_layout.len(), 4);
        assert_eq!(course.tile_layout[3].role, Some(TileRole::End));
        assert_eq!(course.tile_layout[0].role, None);
        assert_eq!(catalog.first_course_id(), Some(0));
        assert_eq!(
            catalog.texture_resource("tile_vert").as_deref(),
            Some("textures/tile_vert.png")
        );
        assert_eq!(catalog.digest().len(), 64);
    }

    #[test]
    fn parse_error_names_offending_field() {
        let mut value = sample_json();
        value["mapDefinition"][0]["tileLayout"][1]["x"] = json!("zero");

        let err = CourseCatalog::from_json_str(&value.to_string()).expect_err("bad x");

        let message = err.to_string();
        assert!(message.starts_with("parse course json at mapDefinition[0].tileLayout[1].x"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let mut value = sample_json();
        value["mapDefinition"][0]["tileLayout"][3]["role"] = json!("FINISH");

        let err = CourseCatalog::from_json_str(&value.to_string()).expect_err("bad role");

        assert!(matches!(err, CourseError::Parse { .. }));
    }

    #[test]
    fn duplicate_tile_position_is_rejected() {
        let mut value = sample_json();
        value["mapDefinition"][0]["tileLayout"][2]["z"] = json!(0);

        let err = CourseCatalog::from_json_str(&value.to_string()).expect_err("duplicate");

        assert_eq!(
            err.to_string(),
            "validation failed at mapDefinition[0].tileLayout[2]: duplicate tile position (0, 0)"
        );
    }

    #[test]
    fn missing_start_tile_is_rejected() {
        let mut value = sample_json();
        value["mapDefinition"][0]["tileLayout"][1]["z"] = json!(5);

        let err = CourseCatalog::from_json_str(&value.to_string()).expect_err("no start");

        assert!(err.to_string().contains("missing start tile"));
    }

    #[test]
    fn unknown_tile_type_is_rejected() {
        let mut value = sample_json();
        value["mapDefinition"][0]["tileLayout"][0]["id"] = json!("tile_lava");

        let err = CourseCatalog::from_json_str(&value.to_string()).expect_err("unknown type");

        assert!(err.to_string().contains("unknown tile type `tile_lava`"));
    }

    #[test]
    fn duplicate_course_id_is_rejected() {
        let mut value = sample_json();
        let copy = value["mapDefinition"][0].clone();
        value["mapDefinition"]
            .as_array_mut()
            .expect("array")
            .push(copy);

        let err = CourseCatalog::from_json_str(&value.to_string()).expect_err("duplicate id");

        assert!(err.to_string().contains("duplicate course id 0"));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = CourseCatalog::from_json_str(r#"{"mapDefinition": []}"#).expect_err("empty");
        assert!(matches!(err, CourseError::Validation { .. }));
    }

    #[test]
    fn loads_from_disk_and_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("courses.json");
        fs::write(&path, sample_json().to_string()).expect("write courses");

        let catalog = CourseCatalog::load(&path).expect("catalog");
        assert_eq!(catalog.courses().len(), 1);

        let err = CourseCatalog::load(&dir.path().join("missing.json")).expect_err("missing");
        assert!(matches!(err, CourseError::ReadFile { .. }));
    }

    #[test]
    fn bundled_course_file_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("courses.json");

        let catalog = CourseCatalog::load(&path).expect("bundled courses");

        assert!(catalog.courses().len() >= 3);
    }
}
