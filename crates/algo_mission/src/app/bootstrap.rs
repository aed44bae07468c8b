use std::path::{Path, PathBuf};

use engine::{AppPaths, LoopConfig, StartupError, Vec3};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::autopilot::Autopilot;
use super::mission::collaborators::Collaborators;
use super::mission::course::{CourseCatalog, CourseError, CourseId};
use super::mission::program::{parse_program, Instruction, InstructionParseError};
use super::mission::{AlgoMission, MissionConfig};

const COURSES_ENV_VAR: &str = "ALGO_MISSION_COURSES";
const COURSE_ENV_VAR: &str = "ALGO_MISSION_COURSE";
const PROGRAM_ENV_VAR: &str = "ALGO_MISSION_PROGRAM";
const MAX_FRAMES_ENV_VAR: &str = "ALGO_MISSION_MAX_FRAMES";

const DEFAULT_COURSES_FILE: &str = "courses.json";
const DEFAULT_PROGRAM: &str = "forward,forward,pause";
/// Ten minutes at the default render cap.
const DEFAULT_MAX_FRAMES: u64 = 36_000;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error("invalid program in {var}: {source}")]
    Program {
        var: &'static str,
        #[source]
        source: InstructionParseError,
    },
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) autopilot: Autopilot,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== AlgoMission Startup ===");

    let paths = engine::resolve_app_paths()?;
    let courses_path = courses_path_from_env(&paths);
    let catalog = CourseCatalog::load(&courses_path)?;
    info!(
        path = %courses_path.display(),
        courses = catalog.courses().len(),
        digest = catalog.digest(),
        "courses_loaded"
    );

    let program = program_from_env()?;
    let course = course_from_env(&catalog);

    let mission_config = MissionConfig::default();
    let collaborators = Collaborators::headless(
        Vec3::new(1.0, 1.0, mission_config.bot_model_length),
        mission_config.win_screen_seconds,
    );
    let mission = AlgoMission::new(mission_config, catalog, collaborators);

    let config = LoopConfig {
        max_frames: Some(max_frames_from_env()),
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        autopilot: Autopilot::new(mission, course, program),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn courses_path_from_env(paths: &AppPaths) -> PathBuf {
    resolve_courses_path(std::env::var(COURSES_ENV_VAR).ok().as_deref(), paths)
}

fn resolve_courses_path(raw: Option<&str>, paths: &AppPaths) -> PathBuf {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let path = Path::new(value);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                paths.root.join(path)
            }
        }
        None => paths.assets_dir.join(DEFAULT_COURSES_FILE),
    }
}

fn program_from_env() -> Result<Vec<Instruction>, BootstrapError> {
    let raw = std::env::var(PROGRAM_ENV_VAR).unwrap_or_else(|_| DEFAULT_PROGRAM.to_string());
    parse_program(&raw).map_err(|source| BootstrapError::Program {
        var: PROGRAM_ENV_VAR,
        source,
    })
}

fn course_from_env(catalog: &CourseCatalog) -> CourseId {
    select_course(std::env::var(COURSE_ENV_VAR).ok().as_deref(), catalog)
}

fn select_course(raw: Option<&str>, catalog: &CourseCatalog) -> CourseId {
    let first = catalog.first_course_id().unwrap_or_default();
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return first;
    };
    match raw.parse::<CourseId>() {
        Ok(id) if catalog.course(id).is_some() => id,
        Ok(id) => {
            warn!(env_var = COURSE_ENV_VAR, course = id, fallback = first, "course_not_found");
            first
        }
        Err(error) => {
            warn!(
                env_var = COURSE_ENV_VAR,
                value = raw,
                error = %error,
                fallback = first,
                "invalid_course_env"
            );
            first
        }
    }
}

fn max_frames_from_env() -> u64 {
    parse_max_frames(std::env::var(MAX_FRAMES_ENV_VAR).ok().as_deref())
}

fn parse_max_frames(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_MAX_FRAMES;
    };
    match raw.parse::<u64>() {
        Ok(frames) if frames > 0 => frames,
        _ => {
            warn!(
                env_var = MAX_FRAMES_ENV_VAR,
                value = raw,
                fallback = DEFAULT_MAX_FRAMES,
                "invalid_max_frames_env"
            );
            DEFAULT_MAX_FRAMES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSES: &str = r#"{
        "mapDefinition": [
            { "mapid": 3, "name": "A", "tileLayout": [{ "id": "tile_vert", "x": 0, "z": 0 }] },
            { "mapid": 8, "name": "B", "tileLayout": [{ "id": "tile_vert", "x": 0, "z": 0 }] }
        ]
    }"#;

    fn catalog() -> CourseCatalog {
        CourseCatalog::from_json_str(COURSES).expect("catalog")
    }

    #[test]
    fn course_defaults_to_first_in_catalog() {
        assert_eq!(select_course(None, &catalog()), 3);
        assert_eq!(select_course(Some("  "), &catalog()), 3);
    }

    #[test]
    fn course_env_picks_known_course() {
        assert_eq!(select_course(Some("8"), &catalog()), 8);
    }

    #[test]
    fn bad_course_env_falls_back() {
        assert_eq!(select_course(Some("42"), &catalog()), 3);
        assert_eq!(select_course(Some("eight"), &catalog()), 3);
    }

    #[test]
    fn max_frames_parsing() {
        assert_eq!(parse_max_frames(None), DEFAULT_MAX_FRAMES);
        assert_eq!(parse_max_frames(Some("120")), 120);
        assert_eq!(parse_max_frames(Some("0")), DEFAULT_MAX_FRAMES);
        assert_eq!(parse_max_frames(Some("lots")), DEFAULT_MAX_FRAMES);
    }

    #[test]
    fn courses_path_resolves_against_root() {
        let paths = engine::app_paths_for_root(PathBuf::from("/srv/mission"));

        assert_eq!(
            resolve_courses_path(None, &paths),
            PathBuf::from("/srv/mission/assets/courses.json")
        );
        assert_eq!(
            resolve_courses_path(Some("data/extra.json"), &paths),
            PathBuf::from("/srv/mission/data/extra.json")
        );
        assert_eq!(
            resolve_courses_path(Some("/tmp/c.json"), &paths),
            PathBuf::from("/tmp/c.json")
        );
    }

    #[test]
    fn default_program_parses() {
        assert_eq!(
            parse_program(DEFAULT_PROGRAM).expect("default program"),
            vec![Instruction::Forward, Instruction::Forward, Instruction::Pause]
        );
    }
}
