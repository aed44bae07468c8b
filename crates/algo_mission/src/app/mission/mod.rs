//! The AlgoMission state machine: loading, course selection, programming the bus
//! and playing the program out on the fixed-step tick.

pub mod bot;
pub mod collaborators;
pub mod course;
pub mod flair;
pub mod map;
pub mod notification;
pub mod program;

use engine::{
    AssetKind, InputSnapshot, JobHandle, LoadRequest, LoadTracker, LoopCommand, Observer,
    ObserverId, Simulation, Vec3,
};
use tracing::{debug, info, warn};

use self::bot::{
    step_for_model_length, Bot, BotContext, MapStatusHandle, BOT_MODEL_FILE, BOT_NODE,
};
use self::collaborators::{AudioCue, Collaborators, NodeView, Screen};
use self::course::{CourseCatalog, CourseId};
use self::map::{MapManager, DEFAULT_TILE_HEIGHT};
use self::notification::{wire_observers, MissionHub, Notification, ScoreHandle};
use self::program::{Instruction, InstructionManager, DEFAULT_MAX_INSTRUCTIONS};

const JOB_BOT: &str = "bot";
const JOB_MAP: &str = "map";
const JOB_SKY: &str = "sky";
const JOB_AUDIO: &str = "audio";
const SETUP_JOBS: [&str; 4] = [JOB_BOT, JOB_MAP, JOB_SKY, JOB_AUDIO];

const SKY_NODE: &str = "sky";
const SKY_TEXTURE: &str = "textures/sky_bluesky.jpg";

/// Where the camera sits relative to the bot while a program runs.
pub const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 60.0, -40.0);

const PLAY_AREA: [Screen; 3] = [Screen::ControlPanel, Screen::Score, Screen::Instructions];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Initial,
    Setup,
    Loaded,
    SelectMap,
    Retry,
    Ready,
    Running,
    Win,
    Dead,
}

/// Everything a player can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Select,
    Instruction(Instruction),
    Retry,
    SelectMap,
    ChooseCourse(CourseId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissionConfig {
    /// Used when the display cannot measure the bot model.
    pub bot_model_length: f32,
    pub tile_height: f32,
    pub max_instructions: usize,
    pub win_screen_seconds: f32,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            bot_model_length: bot::DEFAULT_MODEL_LENGTH,
            tile_height: DEFAULT_TILE_HEIGHT,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            win_screen_seconds: 3.0,
        }
    }
}

pub struct AlgoMission {
    config: MissionConfig,
    state: AppState,
    bot: Bot,
    map: MapManager,
    program: InstructionManager,
    hub: MissionHub,
    score: ScoreHandle,
    loads: LoadTracker,
    collaborators: Collaborators,
    selected_course: Option<CourseId>,
    grid_visible: bool,
    viewpoint: Vec3,
    shown_score: i64,
    /// State asked for by a user action, taken at the end of the tick.
    requested: Option<AppState>,
}

impl AlgoMission {
    pub fn new(config: MissionConfig, catalog: CourseCatalog, collaborators: Collaborators) -> Self {
        let score = ScoreHandle::default();
        let status = MapStatusHandle::default();
        let mut hub = MissionHub::new();
        wire_observers(&mut hub, &score, &status);

        Self {
            program: InstructionManager::with_capacity_limit(config.max_instructions),
            bot: Bot::new(status),
            map: MapManager::new(catalog),
            config,
            state: AppState::Initial,
            hub,
            score,
            loads: LoadTracker::new(),
            collaborators,
            selected_course: None,
            grid_visible: false,
            viewpoint: CAMERA_OFFSET,
            shown_score: 0,
            requested: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn map(&self) -> &MapManager {
        &self.map
    }

    pub fn program(&self) -> &InstructionManager {
        &self.program
    }

    pub fn score(&self) -> i64 {
        self.score.get()
    }

    pub fn selected_course(&self) -> Option<CourseId> {
        self.selected_course
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn viewpoint(&self) -> Vec3 {
        self.viewpoint
    }

    /// Adds an observer after the built-in ones.
    pub fn register_observer(&mut self, observer: Box<dyn Observer<Notification>>) -> ObserverId {
        self.hub.register(observer)
    }

    fn handle_action(&mut self, action: UserAction) {
        match (self.state, action) {
            (AppState::Loaded, UserAction::Select) => self.request_state(AppState::SelectMap),
            (AppState::SelectMap, UserAction::ChooseCourse(id)) => {
                if self.map.has_course(id) {
                    self.selected_course = Some(id);
                    self.request_state(AppState::Retry);
                } else {
                    warn!(course = id, "unknown_course_selected");
                }
            }
            (AppState::Ready, UserAction::Instruction(instruction)) => {
                self.collaborators.audio.play(AudioCue::ButtonClick);
                self.handle_instruction(instruction);
            }
            (AppState::Dead, UserAction::Retry) => self.request_state(AppState::Retry),
            (AppState::Dead, UserAction::SelectMap | UserAction::ChooseCourse(_)) => {
                self.request_state(AppState::SelectMap)
            }
            (AppState::Win, UserAction::Select) => self.collaborators.screens.dismiss_win(),
            (state, action) => debug!(state = ?state, action = ?action, "action_ignored"),
        }
    }

    fn request_state(&mut self, next: AppState) {
        debug!(state = ?self.state, requested = ?next, "state_requested");
        self.requested = Some(next);
    }

    fn handle_instruction(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::Go => {
                if !self.program.is_running() && self.program.num_of_instructions() > 0 {
                    self.program.start_instructions();
                    self.bot.prepare_for_new_instruction();
                    info!(
                        instructions = self.program.num_of_instructions(),
                        "program_started"
                    );
                }
            }
            Instruction::Clear => {
                if !self.program.is_running() {
                    self.program.clear_instructions();
                }
            }
            Instruction::Grid => {
                self.grid_visible = !self.grid_visible;
                debug!(visible = self.grid_visible, "grid_toggled");
            }
            _ => {
                self.program.add_instruction(instruction);
            }
        }
    }

    fn act_on_state(&mut self) {
        match self.state {
            AppState::Setup => {
                self.collaborators.loader.poll();
                if self.loads.is_loaded(JOB_BOT) && !self.bot.is_loaded() {
                    let model_length = self
                        .collaborators
                        .display
                        .bounding_size(BOT_NODE)
                        .map_or(self.config.bot_model_length, |size| size.z);
                    self.bot.mark_loaded(step_for_model_length(model_length));
                }
            }
            AppState::Running => {
                if !self.bot.is_busy()
                    && !self.bot.is_dead()
                    && self.program.next_instruction().is_some()
                {
                    self.bot.prepare_for_new_instruction();
                }
            }
            _ => {}
        }
    }

    fn update_world(&mut self, dt: f32) {
        if !matches!(
            self.state,
            AppState::Initial | AppState::Setup | AppState::Loaded | AppState::Dead
        ) {
            let mut ctx = BotContext {
                program: &self.program,
                map: &mut self.map,
                hub: &mut self.hub,
                audio: self.collaborators.audio.as_mut(),
                viewpoint: self.viewpoint,
            };
            self.bot.update(dt, &mut ctx);
            self.map.update(dt);
        }
        if self.state == AppState::Running {
            self.viewpoint = self.bot.transform().position + CAMERA_OFFSET;
        }

        let score = self.score.get();
        if score != self.shown_score {
            self.shown_score = score;
            self.collaborators.screens.set_score(score);
        }
        self.collaborators.screens.update(dt);
    }

    fn next_state(&self) -> Option<AppState> {
        if self.requested.is_some() {
            return self.requested;
        }
        match self.state {
            AppState::Initial => Some(AppState::Setup),
            AppState::Setup => self
                .loads
                .load_complete(&SETUP_JOBS)
                .then_some(AppState::Loaded),
            AppState::Retry => (!self.bot.is_dead()).then_some(AppState::Ready),
            AppState::Ready => self.program.is_running().then_some(AppState::Running),
            AppState::Running => {
                if self.bot.is_dead() {
                    Some(AppState::Dead)
                } else if !self.program.is_running() {
                    if self.map.is_current_map_complete() {
                        Some(AppState::Win)
                    } else {
                        Some(AppState::Dead)
                    }
                } else {
                    None
                }
            }
            AppState::Win => self
                .collaborators
                .screens
                .is_win_finished()
                .then_some(AppState::SelectMap),
            AppState::Loaded | AppState::SelectMap | AppState::Dead => None,
        }
    }

    fn change_state(&mut self, next: AppState) {
        info!(from = ?self.state, to = ?next, "app_state_changed");
        self.requested = None;
        self.on_exit();
        self.state = next;
        self.on_enter();
    }

    fn on_enter(&mut self) {
        match self.state {
            AppState::Initial => {}
            AppState::Setup => {
                self.collaborators.screens.show(Screen::Loading);
                self.register_setup_jobs();
            }
            AppState::Loaded => {
                self.map.resize(self.bot.step_size(), self.config.tile_height);
                self.collaborators.display.add(BOT_NODE);
                self.collaborators.screens.show(Screen::Title);
            }
            AppState::SelectMap => {
                self.hide_play_area();
                self.selected_course = None;
                self.collaborators.screens.show(Screen::MapSelect);
                let summaries = self.map.course_summaries();
                self.collaborators.screens.set_course_summaries(&summaries);
            }
            AppState::Retry => {
                self.program.clear_instructions();
                if let Some(id) = self.selected_course {
                    self.map.load_course(id, self.collaborators.display.as_mut());
                }
                self.bot.respawn_bot();
                self.score.reset();
                self.viewpoint = CAMERA_OFFSET;
                self.show_play_area();
            }
            AppState::Ready => self.show_play_area(),
            AppState::Running => {}
            AppState::Win => {
                self.hub.publish(Notification::LifecycleChanged(AppState::Win));
                self.collaborators.screens.hide(Screen::ControlPanel);
                self.collaborators.screens.show(Screen::Win);
            }
            AppState::Dead => {
                self.hide_play_area();
                self.collaborators.screens.show(Screen::Death);
            }
        }
    }

    fn on_exit(&mut self) {
        match self.state {
            AppState::Setup => {
                self.collaborators.screens.hide(Screen::Loading);
                self.collaborators.display.add(SKY_NODE);
            }
            AppState::Loaded => {
                self.collaborators.screens.hide(Screen::Title);
                self.grid_visible = true;
            }
            AppState::SelectMap => self.collaborators.screens.hide(Screen::MapSelect),
            AppState::Running => {
                let completed = !self.bot.is_dead() && self.map.is_current_map_complete();
                self.map.apply_score(self.score.get(), completed);
            }
            AppState::Win => self.collaborators.screens.hide(Screen::Win),
            AppState::Dead => self.collaborators.screens.hide(Screen::Death),
            AppState::Initial | AppState::Retry | AppState::Ready => {}
        }
    }

    fn register_setup_jobs(&mut self) {
        let loader = self.collaborators.loader.as_mut();

        let mut bot_parts = Vec::new();
        let mut bot_requests = vec![LoadRequest::new(AssetKind::Model, BOT_MODEL_FILE)];
        bot_requests.extend(
            AudioCue::BOT_CUES
                .iter()
                .map(|cue| LoadRequest::new(AssetKind::Audio, cue.resource())),
        );
        for request in bot_requests {
            let part = JobHandle::detached(&request.resource);
            loader.load(request, part.clone());
            bot_parts.push(part);
        }
        self.loads.register_all_of(JOB_BOT, bot_parts);

        let mut map_parts = Vec::new();
        for request in self.map.asset_requests() {
            let part = JobHandle::detached(&request.resource);
            loader.load(request, part.clone());
            map_parts.push(part);
        }
        self.loads.register_all_of(JOB_MAP, map_parts);

        let sky = self.loads.register_job(JOB_SKY);
        loader.load(LoadRequest::new(AssetKind::Texture, SKY_TEXTURE), sky);

        let audio = self.loads.register_job(JOB_AUDIO);
        loader.load(
            LoadRequest::new(AssetKind::Audio, AudioCue::ButtonClick.resource()),
            audio,
        );

        info!(jobs = self.loads.job_count(), "setup_jobs_registered");
    }

    fn show_play_area(&mut self) {
        for screen in PLAY_AREA {
            self.collaborators.screens.show(screen);
        }
    }

    fn hide_play_area(&mut self) {
        for screen in PLAY_AREA {
            self.collaborators.screens.hide(screen);
        }
    }
}

impl Simulation for AlgoMission {
    type Action = UserAction;

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot<UserAction>) -> LoopCommand {
        if input.quit_requested() {
            return LoopCommand::Quit;
        }
        for action in input.actions() {
            self.handle_action(*action);
        }
        self.act_on_state();
        self.update_world(fixed_dt_seconds);
        if let Some(next) = self.next_state() {
            self.change_state(next);
        }
        LoopCommand::Continue
    }

    fn render(&mut self) {
        let mut views = Vec::with_capacity(self.map.tiles().len() * 2 + 1);
        if !matches!(self.state, AppState::Initial | AppState::Setup) {
            views.push(self.bot.node_view());
        }
        self.map.push_node_views(&mut views);
        if !views.is_empty() {
            views.push(NodeView {
                name: SKY_NODE,
                transform: Default::default(),
                visible: true,
            });
        }
        self.collaborators.display.present(&views);
    }

    fn shutdown(&mut self) {
        info!(
            state = ?self.state,
            score = self.score.get(),
            "mission_shutdown"
        );
    }

    fn debug_label(&self) -> Option<String> {
        Some(format!("{:?}", self.state))
    }
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
