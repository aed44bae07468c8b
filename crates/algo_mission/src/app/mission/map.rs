use std::collections::BTreeMap;

use engine::{AssetKind, LoadRequest, Transform3, Vec3};
use tracing::{info, warn};

use super::collaborators::{DisplayList, NodeView};
use super::course::{CourseCatalog, CourseDefinition, CourseId, TileRole};
use super::flair::{new_flair, FlairContext, FlairKind, TileFlair};
use super::notification::{MissionHub, Notification};
use super::program::Instruction;

pub const DEFAULT_TILE_LENGTH: f32 = 10.0;
pub const DEFAULT_TILE_HEIGHT: f32 = 0.1;
/// Ground probes start this far above the queried position.
pub const GROUND_PROBE_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(usize);

impl TileId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Role published when the tile under the bot changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundRole {
    NoTile,
    Unmarked,
    Marked(TileRole),
}

impl GroundRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            GroundRole::NoTile => "NO_TILE",
            GroundRole::Unmarked => "",
            GroundRole::Marked(role) => role.as_str(),
        }
    }
}

/// Answers "which tile is directly beneath this point".
pub trait GroundQuery {
    fn tile_under(&self, position: Vec3) -> Option<TileId>;
}

#[derive(Debug)]
pub struct MapTile {
    name: String,
    tile_type: String,
    grid: (i32, i32),
    role: Option<TileRole>,
    transform: Transform3,
    flairs: Vec<Box<dyn TileFlair>>,
}

impl MapTile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tile_type(&self) -> &str {
        &self.tile_type
    }

    pub fn grid(&self) -> (i32, i32) {
        self.grid
    }

    pub fn role(&self) -> Option<TileRole> {
        self.role
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn flairs(&self) -> &[Box<dyn TileFlair>] {
        &self.flairs
    }
}

/// The tiles of the loaded course, laid out on a square grid.
#[derive(Debug)]
pub struct TileSet {
    tiles: Vec<MapTile>,
    tile_length: f32,
    tile_height: f32,
}

impl TileSet {
    fn empty(tile_length: f32, tile_height: f32) -> Self {
        Self {
            tiles: Vec::new(),
            tile_length,
            tile_height,
        }
    }

    fn build(course: &CourseDefinition, tile_length: f32, tile_height: f32) -> Self {
        let tiles = course
            .tile_layout
            .iter()
            .enumerate()
            .map(|(index, placement)| {
                let position = Vec3::new(
                    placement.x as f32 * tile_length,
                    0.0,
                    placement.z as f32 * tile_length,
                );
                let transform = Transform3::at(position);
                let flairs = flair_kinds_for(placement.role)
                    .iter()
                    .map(|kind| {
                        new_flair(
                            *kind,
                            format!("{}_{index}", kind.node_prefix()),
                            flair_placement(*kind, &placement.tile_type, position, tile_length),
                        )
                    })
                    .collect();
                MapTile {
                    name: format!("Tile_{index}"),
                    tile_type: placement.tile_type.clone(),
                    grid: (placement.x, placement.z),
                    role: placement.role,
                    transform,
                    flairs,
                }
            })
            .collect();
        Self {
            tiles,
            tile_length,
            tile_height,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, id: TileId) -> Option<&MapTile> {
        self.tiles.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapTile> {
        self.tiles.iter()
    }

    fn node_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for tile in &self.tiles {
            names.push(tile.name.clone());
            names.extend(tile.flairs.iter().map(|flair| flair.name().to_string()));
        }
        names
    }
}

impl GroundQuery for TileSet {
    fn tile_under(&self, position: Vec3) -> Option<TileId> {
        let origin_y = position.y + GROUND_PROBE_HEIGHT;
        let half_length = self.tile_length / 2.0;
        let half_height = self.tile_height / 2.0;

        let mut nearest: Option<(TileId, f32)> = None;
        for (index, tile) in self.tiles.iter().enumerate() {
            let centre = tile.transform.position;
            let top = centre.y + half_height;
            let inside = (position.x - centre.x).abs() <= half_length
                && (position.z - centre.z).abs() <= half_length;
            if !inside || top > origin_y {
                continue;
            }
            let distance = origin_y - top;
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((TileId(index), distance));
            }
        }
        nearest.map(|(id, _)| id)
    }
}

fn flair_kinds_for(role: Option<TileRole>) -> &'static [FlairKind] {
    match role {
        Some(TileRole::End) => &[FlairKind::BusStop, FlairKind::Passenger],
        Some(TileRole::SpecialBird) => &[FlairKind::Bird],
        None => &[],
    }
}

/// Puts a flair beside the road on its tile. Offsets are fractions of a tile.
fn flair_placement(
    kind: FlairKind,
    tile_type: &str,
    tile_position: Vec3,
    tile_length: f32,
) -> Transform3 {
    let (dx, dy, dz, rotation) = match (kind, tile_type) {
        (FlairKind::BusStop, "tile_vert") => (-0.5, 0.0, 0.0, Vec3::new(0.0, 1.5, 0.0)),
        (FlairKind::BusStop, "tile_horiz") => (0.125, 0.0, 0.5, Vec3::new(0.0, 3.1, 0.0)),
        (FlairKind::BusStop, _) => (0.0, 0.0, 0.0, Vec3::ZERO),
        (FlairKind::Passenger, "tile_vert") => (-0.5, 0.0, -0.25, Vec3::new(0.0, -1.5, 3.1)),
        (FlairKind::Passenger, "tile_horiz") => (-0.25, 0.0, 0.5, Vec3::new(0.0, 0.0, 3.1)),
        (FlairKind::Passenger, _) => (0.0, 0.0, 0.0, Vec3::new(0.0, 0.0, 3.1)),
        (FlairKind::Bird, _) => (0.0, 0.35, 0.5, Vec3::new(0.0, 2.0, 0.0)),
    };
    Transform3 {
        position: tile_position + Vec3::new(dx, dy, dz) * tile_length,
        rotation,
        scale: 1.0,
    }
}

/// Attempts, completions and best score for one course in this session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CourseRecord {
    pub attempts: u32,
    pub completions: u32,
    pub completed: bool,
    pub high_score: i64,
}

impl CourseRecord {
    pub fn completion_rate(&self) -> f32 {
        if self.attempts == 0 {
            0.0
        } else {
            self.completions as f32 / self.attempts as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseSummary {
    pub id: CourseId,
    pub name: String,
    pub difficulty: u32,
    pub instructions: String,
    pub completed: bool,
    pub high_score: i64,
    pub completion_rate: f32,
}

/// Owns the loaded course: its tiles, their flairs, which tile the bot is on, and
/// the session's per-course records.
#[derive(Debug)]
pub struct MapManager {
    catalog: CourseCatalog,
    records: BTreeMap<CourseId, CourseRecord>,
    tiles: TileSet,
    active_course: Option<CourseId>,
    current_tile: Option<TileId>,
    ground_known: bool,
}

impl MapManager {
    pub fn new(catalog: CourseCatalog) -> Self {
        Self {
            catalog,
            records: BTreeMap::new(),
            tiles: TileSet::empty(DEFAULT_TILE_LENGTH, DEFAULT_TILE_HEIGHT),
            active_course: None,
            current_tile: None,
            ground_known: false,
        }
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    pub fn tiles(&self) -> &TileSet {
        &self.tiles
    }

    pub fn tile_length(&self) -> f32 {
        self.tiles.tile_length
    }

    pub fn active_course(&self) -> Option<CourseId> {
        self.active_course
    }

    pub fn current_tile(&self) -> Option<TileId> {
        self.current_tile
    }

    pub fn has_course(&self, id: CourseId) -> bool {
        self.catalog.course(id).is_some()
    }

    /// Flair models and tile textures the map needs before play.
    pub fn asset_requests(&self) -> Vec<LoadRequest> {
        let mut requests: Vec<LoadRequest> = FlairKind::ALL
            .iter()
            .map(|kind| LoadRequest::new(AssetKind::Model, kind.model_resource()))
            .collect();
        requests.extend(
            self.catalog
                .tile_config()
                .keys()
                .filter_map(|tile_type| self.catalog.texture_resource(tile_type))
                .map(|resource| LoadRequest::new(AssetKind::Texture, resource)),
        );
        requests
    }

    /// Sizes tiles so one tile is one bot step long. A loaded course is laid out again.
    pub fn resize(&mut self, tile_length: f32, tile_height: f32) {
        if tile_length == self.tiles.tile_length && tile_height == self.tiles.tile_height {
            return;
        }
        info!(tile_length, tile_height, "map_resized");
        match self.active_course.and_then(|id| self.catalog.course(id)) {
            Some(course) => self.tiles = TileSet::build(course, tile_length, tile_height),
            None => self.tiles = TileSet::empty(tile_length, tile_height),
        }
        self.current_tile = None;
        self.ground_known = false;
    }

    /// Replaces the loaded course. Unknown ids leave the map untouched.
    pub fn load_course(&mut self, id: CourseId, display: &mut dyn DisplayList) -> bool {
        let Some(course) = self.catalog.course(id) else {
            warn!(course = id, "unknown_course");
            return false;
        };

        for name in self.tiles.node_names() {
            display.remove(&name);
        }
        self.tiles = TileSet::build(course, self.tiles.tile_length, self.tiles.tile_height);
        for name in self.tiles.node_names() {
            display.add(&name);
        }
        self.active_course = Some(id);
        self.current_tile = None;
        self.ground_known = false;
        info!(course = id, name = %course.name, tiles = self.tiles.len(), "course_loaded");
        true
    }

    pub fn tile_under(&self, position: Vec3) -> Option<TileId> {
        self.tiles.tile_under(position)
    }

    pub fn activate_tile_under(&mut self, position: Vec3, ctx: &FlairContext, hub: &mut MissionHub) {
        let tile = self.tiles.tile_under(position);
        self.activate_tile(tile, ctx, hub);
    }

    /// Publishes the new ground role when the active tile changes. Repeated queries
    /// landing on the same tile (or on nothing again) publish nothing. The first
    /// query after a course load always publishes.
    pub fn activate_tile(&mut self, tile: Option<TileId>, ctx: &FlairContext, hub: &mut MissionHub) {
        if self.ground_known && tile == self.current_tile {
            return;
        }
        self.ground_known = true;

        if let Some(old) = self.current_tile.and_then(|id| self.tiles.tiles.get_mut(id.0)) {
            for flair in &mut old.flairs {
                if let Some(delta) = flair.deactivate(ctx) {
                    hub.publish(Notification::ScoreDelta(delta));
                }
            }
        }
        if let Some(new) = tile.and_then(|id| self.tiles.tiles.get_mut(id.0)) {
            for flair in &mut new.flairs {
                flair.activate(ctx);
            }
        }

        let role = self.ground_role(tile);
        self.current_tile = tile;
        info!(
            tile = tile.and_then(|id| self.tiles.get(id)).map(MapTile::name).unwrap_or("-"),
            role = role.as_str(),
            "tile_role_changed"
        );
        hub.publish(Notification::TileRoleChanged(role));
    }

    pub fn ground_role(&self, tile: Option<TileId>) -> GroundRole {
        match tile.and_then(|id| self.tiles.get(id)) {
            None => GroundRole::NoTile,
            Some(tile) => tile.role.map_or(GroundRole::Unmarked, GroundRole::Marked),
        }
    }

    /// Lets the active tile's flairs react once to a finished instruction.
    pub fn handle_new_instruction(
        &mut self,
        instruction: Instruction,
        ctx: &FlairContext,
        hub: &mut MissionHub,
    ) {
        let Some(tile) = self.current_tile.and_then(|id| self.tiles.tiles.get_mut(id.0)) else {
            return;
        };
        for flair in &mut tile.flairs {
            if let Some(delta) = flair.do_special(instruction, ctx) {
                hub.publish(Notification::ScoreDelta(delta));
            }
        }
    }

    pub fn update(&mut self, dt: f32) {
        for tile in &mut self.tiles.tiles {
            for flair in &mut tile.flairs {
                flair.update(dt);
            }
        }
    }

    /// Complete once every flair on an END tile that gates completion has fired.
    /// A course without such a flair can never be completed.
    pub fn is_current_map_complete(&self) -> bool {
        let mut gates = self
            .tiles
            .iter()
            .filter(|tile| tile.role == Some(TileRole::End))
            .flat_map(|tile| tile.flairs.iter())
            .filter_map(|flair| flair.completion())
            .peekable();
        gates.peek().is_some() && gates.all(|done| done)
    }

    /// Records the end of a run on the active course.
    pub fn apply_score(&mut self, score: i64, completed: bool) {
        let Some(id) = self.active_course else {
            return;
        };
        let record = self.records.entry(id).or_default();
        record.attempts += 1;
        if completed {
            record.completions += 1;
            record.completed = true;
        }
        if score > record.high_score {
            record.high_score = score;
        }
        info!(
            course = id,
            score,
            completed,
            high_score = record.high_score,
            attempts = record.attempts,
            "course_attempt_recorded"
        );
    }

    pub fn course_record(&self, id: CourseId) -> CourseRecord {
        self.records.get(&id).copied().unwrap_or_default()
    }

    pub fn high_score(&self, id: CourseId) -> i64 {
        self.course_record(id).high_score
    }

    pub fn completion_rate(&self, id: CourseId) -> f32 {
        self.course_record(id).completion_rate()
    }

    pub fn course_summaries(&self) -> Vec<CourseSummary> {
        self.catalog
            .courses()
            .iter()
            .map(|course| {
                let record = self.course_record(course.id);
                CourseSummary {
                    id: course.id,
                    name: course.name.clone(),
                    difficulty: course.difficulty,
                    instructions: course.instructions.clone(),
                    completed: record.completed,
                    high_score: record.high_score,
                    completion_rate: record.completion_rate(),
                }
            })
            .collect()
    }

    pub(crate) fn push_node_views<'a>(&'a self, views: &mut Vec<NodeView<'a>>) {
        for tile in self.tiles.iter() {
            views.push(NodeView {
                name: &tile.name,
                transform: tile.transform,
                visible: true,
            });
            for flair in &tile.flairs {
                views.push(NodeView {
                    name: flair.name(),
                    transform: *flair.transform(),
                    visible: flair.is_visible(),
                });
            }
        }
    }
}
