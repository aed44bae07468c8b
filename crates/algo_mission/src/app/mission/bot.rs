use std::cell::Cell;
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::rc::Rc;

use engine::{signed_angle, wrap_angle, Transform3, Vec3};
use tracing::{debug, info};

use super::collaborators::{AudioCue, AudioSink, NodeView};
use super::flair::FlairContext;
use super::map::MapManager;
use super::notification::MissionHub;
use super::program::{Instruction, InstructionManager};

/// Seconds one instruction takes to play out.
pub const OP_TIME_STEP: f32 = 2.0;
pub const OP_DEATH_TIME_STEP: f32 = 4.0;
/// Pause between two instructions.
pub const OP_DELAY: f32 = 0.5;
pub const ROTATE_STEP: f32 = FRAC_PI_2;
/// Gap left on each side of the model when sizing a step.
pub const TILE_BORDER: f32 = 4.0;
pub const DEFAULT_MODEL_LENGTH: f32 = 2.0;

pub const BOT_NODE: &str = "bot";
pub const BOT_MODEL_FILE: &str = "models/ToonBus_VijayKumar/scene.gltf";

const HEADING_EPSILON: f32 = 1e-3;
/// A slice that would leave less than this on a timer uses up the rest of it.
const TIMER_EPSILON: f32 = 1e-4;

pub fn step_for_model_length(model_length: f32) -> f32 {
    model_length + 2.0 * TILE_BORDER
}

/// How the current run looks from the map's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapStatus {
    #[default]
    None,
    Good,
    Bad,
}

/// Shared map status. Written by notification observers, read by the bot.
#[derive(Debug, Clone, Default)]
pub struct MapStatusHandle(Rc<Cell<MapStatus>>);

impl MapStatusHandle {
    pub fn get(&self) -> MapStatus {
        self.0.get()
    }

    pub fn set(&self, status: MapStatus) {
        self.0.set(status);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Initial,
    Ready,
    Waiting,
    Executing,
    Dying,
    Dead,
}

/// Axis and direction the bot tumbles about while falling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathSpin {
    Left,
    Right,
    Back,
    Forwards,
}

impl DeathSpin {
    /// Picks the tumble from the heading (radians) and whether the bot was reversing.
    pub fn for_heading(heading: f32, reversed: bool) -> Self {
        let heading = signed_angle(heading);
        if heading.abs() < HEADING_EPSILON {
            if reversed {
                DeathSpin::Back
            } else {
                DeathSpin::Forwards
            }
        } else if (heading.abs() - PI).abs() < HEADING_EPSILON {
            if reversed {
                DeathSpin::Forwards
            } else {
                DeathSpin::Back
            }
        } else if heading > 0.0 {
            if reversed {
                DeathSpin::Right
            } else {
                DeathSpin::Left
            }
        } else if reversed {
            DeathSpin::Left
        } else {
            DeathSpin::Right
        }
    }
}

/// What the bot touches during one update.
pub struct BotContext<'a> {
    pub program: &'a InstructionManager,
    pub map: &'a mut MapManager,
    pub hub: &'a mut MissionHub,
    pub audio: &'a mut dyn AudioSink,
    pub viewpoint: Vec3,
}

/// The bus. Plays one instruction at a time, then idles until armed again.
#[derive(Debug)]
pub struct Bot {
    state: BotState,
    transform: Transform3,
    step_size: f32,
    loaded: bool,
    instruction_ready: bool,
    respawn: bool,
    current: Option<Instruction>,
    timer: f32,
    delay: f32,
    fall_rotation: f32,
    death_spin: DeathSpin,
    status: MapStatusHandle,
}

impl Bot {
    pub fn new(status: MapStatusHandle) -> Self {
        Self {
            state: BotState::Initial,
            transform: Transform3::default(),
            step_size: step_for_model_length(DEFAULT_MODEL_LENGTH),
            loaded: false,
            instruction_ready: false,
            respawn: false,
            current: None,
            timer: 0.0,
            delay: 0.0,
            fall_rotation: 0.0,
            death_spin: DeathSpin::Forwards,
            status,
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn transform(&self) -> &Transform3 {
        &self.transform
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn death_spin(&self) -> DeathSpin {
        self.death_spin
    }

    pub fn current_instruction(&self) -> Option<Instruction> {
        self.current
    }

    pub fn map_status(&self) -> MapStatus {
        self.status.get()
    }

    /// Called once the model and sounds are in. `step_size` is the distance of one
    /// FORWARD, which is also the tile length.
    pub fn mark_loaded(&mut self, step_size: f32) {
        self.step_size = step_size;
        self.loaded = true;
        info!(step_size, "bot_loaded");
    }

    pub fn is_busy(&self) -> bool {
        self.instruction_ready
            || matches!(
                self.state,
                BotState::Executing | BotState::Waiting | BotState::Dying
            )
    }

    pub fn is_dead(&self) -> bool {
        self.state == BotState::Dead
    }

    /// Arms the bot to pick up the program's current instruction on its next update.
    pub fn prepare_for_new_instruction(&mut self) -> bool {
        if self.is_busy() || self.is_dead() {
            return false;
        }
        self.instruction_ready = true;
        true
    }

    /// Puts the bot back on the start tile. A dead bot comes back on its next update.
    pub fn respawn_bot(&mut self) {
        self.transform = Transform3::default();
        self.status.set(MapStatus::None);
        self.instruction_ready = false;
        self.current = None;
        self.respawn = self.state == BotState::Dead;
        debug!(respawn = self.respawn, "bot_respawned");
    }

    pub fn update(&mut self, dt: f32, ctx: &mut BotContext<'_>) {
        self.act_on_state(dt);
        self.update_state(ctx);
    }

    pub(crate) fn node_view(&self) -> NodeView<'static> {
        NodeView {
            name: BOT_NODE,
            transform: self.transform,
            visible: true,
        }
    }

    fn act_on_state(&mut self, dt: f32) {
        match self.state {
            BotState::Executing => {
                let t = take_slice(&mut self.timer, dt);
                match self.current {
                    Some(Instruction::Forward) => {
                        self.transform.translate_forward(t * self.step_size / OP_TIME_STEP)
                    }
                    Some(Instruction::Back) => {
                        self.transform.translate_forward(-t * self.step_size / OP_TIME_STEP)
                    }
                    Some(Instruction::Left) => {
                        self.transform.rotation.y =
                            wrap_angle(self.transform.rotation.y + t * ROTATE_STEP / OP_TIME_STEP)
                    }
                    Some(Instruction::Right) => {
                        self.transform.rotation.y =
                            wrap_angle(self.transform.rotation.y - t * ROTATE_STEP / OP_TIME_STEP)
                    }
                    _ => {}
                }
            }
            BotState::Waiting => self.delay -= dt,
            BotState::Dying => {
                let t = take_slice(&mut self.timer, dt);
                self.transform.position.y -= t * (self.step_size * 4.0) / OP_TIME_STEP;
                self.fall_rotation = (self.fall_rotation + t * ROTATE_STEP / OP_TIME_STEP) % TAU;
                self.transform.scale = (self.transform.scale - t / OP_DEATH_TIME_STEP).max(0.0);
                match self.death_spin {
                    DeathSpin::Left => self.transform.rotation.z = -self.fall_rotation,
                    DeathSpin::Right => self.transform.rotation.z = self.fall_rotation,
                    DeathSpin::Back => self.transform.rotation.x = -self.fall_rotation,
                    DeathSpin::Forwards => self.transform.rotation.x = self.fall_rotation,
                }
            }
            BotState::Initial | BotState::Ready | BotState::Dead => {}
        }
    }

    fn update_state(&mut self, ctx: &mut BotContext<'_>) {
        match self.state {
            BotState::Initial => {
                if self.loaded {
                    self.change_state(BotState::Ready, ctx);
                }
            }
            BotState::Ready => {
                if self.instruction_ready {
                    self.change_state(BotState::Executing, ctx);
                }
            }
            BotState::Executing => {
                let flair_ctx = self.flair_context(ctx.viewpoint);
                ctx.map.activate_tile_under(self.transform.position, &flair_ctx, ctx.hub);
                if self.status.get() == MapStatus::Bad {
                    self.change_state(BotState::Dying, ctx);
                } else if self.timer <= 0.0 {
                    self.change_state(BotState::Waiting, ctx);
                }
            }
            BotState::Waiting => {
                if self.delay <= 0.0 {
                    self.change_state(BotState::Ready, ctx);
                }
            }
            BotState::Dying => {
                if self.timer <= 0.0 {
                    self.change_state(BotState::Dead, ctx);
                }
            }
            BotState::Dead => {
                if self.respawn {
                    self.change_state(BotState::Ready, ctx);
                }
            }
        }
    }

    fn change_state(&mut self, next: BotState, ctx: &mut BotContext<'_>) {
        debug!(from = ?self.state, to = ?next, "bot_state_changed");
        self.on_exit(ctx);
        self.state = next;
        self.on_enter(ctx);
    }

    fn on_enter(&mut self, ctx: &mut BotContext<'_>) {
        match self.state {
            BotState::Ready => self.transform.scale = 1.0,
            BotState::Executing => {
                self.timer = OP_TIME_STEP;
                self.current = ctx.program.current_instruction();
                let cue = match self.current {
                    Some(Instruction::Fire) => AudioCue::Horn,
                    Some(Instruction::Pause) => AudioCue::Airbrake,
                    Some(Instruction::Left | Instruction::Right) => AudioCue::Turn,
                    _ => AudioCue::Move,
                };
                ctx.audio.play(cue);
            }
            BotState::Waiting => self.delay = OP_DELAY,
            BotState::Dying => {
                self.timer = OP_DEATH_TIME_STEP;
                self.fall_rotation = 0.0;
                let reversed = self.current == Some(Instruction::Back);
                self.death_spin = DeathSpin::for_heading(self.transform.rotation.y, reversed);
                ctx.audio.play(AudioCue::Fall);
                info!(
                    x = self.transform.position.x,
                    z = self.transform.position.z,
                    spin = ?self.death_spin,
                    "bot_falling"
                );
            }
            BotState::Initial | BotState::Dead => {}
        }
    }

    fn on_exit(&mut self, ctx: &mut BotContext<'_>) {
        match self.state {
            BotState::Ready => self.instruction_ready = false,
            BotState::Executing => {
                self.timer = 0.0;
                if let Some(instruction) = self.current {
                    let flair_ctx = self.flair_context(ctx.viewpoint);
                    ctx.map.handle_new_instruction(instruction, &flair_ctx, ctx.hub);
                }
            }
            BotState::Dead => {
                self.transform = Transform3::default();
                self.respawn = false;
                self.current = None;
            }
            BotState::Initial | BotState::Waiting | BotState::Dying => {}
        }
    }

    fn flair_context(&self, viewpoint: Vec3) -> FlairContext {
        FlairContext {
            bot_position: self.transform.position,
            viewpoint,
        }
    }
}

/// Takes up to `dt` seconds off `timer` and returns how much was taken.
fn take_slice(timer: &mut f32, dt: f32) -> f32 {
    if *timer - dt <= TIMER_EPSILON {
        let rest = timer.max(0.0);
        *timer = 0.0;
        rest
    } else {
        *timer -= dt;
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mission::collaborators::HeadlessDisplay;
    use crate::app::mission::course::CourseCatalog;
    use crate::app::mission::notification::{wire_observers, ScoreHandle};

    const EPSILON: f32 = 1e-4;

    const COURSE: &str = r#"{
        "mapDefinition": [{
            "mapid": 0,
            "name": "Straight",
            "tileLayout": [
                { "id": "tile_vert", "x": 0, "z": 0 },
                { "id": "tile_vert", "x": 0, "z": 1 },
                { "id": "tile_top_deadend", "x": 0, "z": 2, "role": "END" }
            ]
        }]
    }"#;

    #[derive(Default)]
    struct RecordingAudio(Vec<AudioCue>);

    impl AudioSink for RecordingAudio {
        fn play(&mut self, cue: AudioCue) {
            self.0.push(cue);
        }
    }

    struct Rig {
        bot: Bot,
        program: InstructionManager,
        map: MapManager,
        hub: MissionHub,
        audio: RecordingAudio,
    }

    impl Rig {
        fn new(program: &[Instruction]) -> Self {
            let status = MapStatusHandle::default();
            let mut hub = MissionHub::new();
            wire_observers(&mut hub, &ScoreHandle::default(), &status);

            let catalog = CourseCatalog::from_json_str(COURSE).expect("catalog");
            let mut map = MapManager::new(catalog);
            map.resize(10.0, 0.1);
            map.load_course(0, &mut HeadlessDisplay::new());

            let mut manager = InstructionManager::new();
            for instruction in program {
                manager.add_instruction(*instruction);
            }
            manager.start_instructions();

            let mut bot = Bot::new(status);
            bot.mark_loaded(10.0);
            let mut rig = Self {
                bot,
                program: manager,
                map,
                hub,
                audio: RecordingAudio::default(),
            };
            rig.tick(0.0);
            assert_eq!(rig.bot.state(), BotState::Ready);
            rig
        }

        fn tick(&mut self, dt: f32) {
            let mut ctx = BotContext {
                program: &self.program,
                map: &mut self.map,
                hub: &mut self.hub,
                audio: &mut self.audio,
                viewpoint: Vec3::new(0.0, 60.0, -40.0),
            };
            self.bot.update(dt, &mut ctx);
        }

        fn arm(&mut self) {
            assert!(self.bot.prepare_for_new_instruction());
            self.tick(0.0);
            assert_eq!(self.bot.state(), BotState::Executing);
        }

        fn position(&self) -> Vec3 {
            self.bot.transform().position
        }
    }

    #[test]
    fn step_size_follows_model_length() {
        assert_eq!(step_for_model_length(DEFAULT_MODEL_LENGTH), 10.0);
        assert_eq!(Bot::new(MapStatusHandle::default()).step_size(), 10.0);
    }

    #[test]
    fn bot_stays_initial_until_loaded() {
        let mut rig = Rig::new(&[Instruction::Forward]);
        rig.bot = Bot::new(MapStatusHandle::default());
        rig.tick(1.0);
        assert_eq!(rig.bot.state(), BotState::Initial);
        assert!(!rig.bot.is_busy());
    }

    #[test]
    fn forward_moves_one_step_regardless_of_slicing() {
        let mut sliced = Rig::new(&[Instruction::Forward]);
        sliced.arm();
        sliced.tick(0.5);
        sliced.tick(1.25);
        assert_eq!(sliced.bot.state(), BotState::Executing);
        sliced.tick(1.0);

        let mut whole = Rig::new(&[Instruction::Forward]);
        whole.arm();
        whole.tick(OP_TIME_STEP);

        assert_eq!(sliced.bot.state(), BotState::Waiting);
        assert_eq!(whole.bot.state(), BotState::Waiting);
        assert!((sliced.position().z - 10.0).abs() < EPSILON);
        assert!(sliced.position().distance(whole.position()) < EPSILON);
    }

    #[test]
    fn uneven_slices_summing_to_one_instruction_finish_it() {
        let mut rig = Rig::new(&[Instruction::Forward]);
        rig.arm();
        rig.tick(0.4);
        rig.tick(0.9);
        assert_eq!(rig.bot.state(), BotState::Executing);
        assert!((rig.position().z - 6.5).abs() < EPSILON);

        rig.tick(0.7);

        assert_eq!(rig.bot.state(), BotState::Waiting);
        assert!((rig.position().z - 10.0).abs() < EPSILON);
        assert!(rig.position().x.abs() < EPSILON);
    }

    #[test]
    fn turns_are_sliced_like_moves() {
        let mut left = Rig::new(&[Instruction::Left]);
        left.arm();
        left.tick(0.4);
        left.tick(0.9);
        assert_eq!(left.bot.state(), BotState::Executing);
        assert!((left.bot.transform().rotation.y - 0.65 * FRAC_PI_2).abs() < EPSILON);
        left.tick(0.7);

        let mut right = Rig::new(&[Instruction::Right]);
        right.arm();
        right.tick(0.4);
        right.tick(0.9);
        right.tick(0.7);

        assert_eq!(left.bot.state(), BotState::Waiting);
        assert_eq!(right.bot.state(), BotState::Waiting);
        assert!((left.bot.transform().rotation.y - FRAC_PI_2).abs() < EPSILON);
        assert!((signed_angle(right.bot.transform().rotation.y) + FRAC_PI_2).abs() < EPSILON);
        assert_eq!(left.position(), Vec3::ZERO);
        assert_eq!(right.position(), Vec3::ZERO);
    }

    #[test]
    fn waiting_holds_for_delay_then_returns_to_ready() {
        let mut rig = Rig::new(&[Instruction::Pause]);
        rig.arm();
        rig.tick(OP_TIME_STEP);
        assert_eq!(rig.bot.state(), BotState::Waiting);
        assert!(rig.bot.is_busy());
        assert!(!rig.bot.prepare_for_new_instruction());

        rig.tick(0.25);
        assert_eq!(rig.bot.state(), BotState::Waiting);
        rig.tick(0.25);
        assert_eq!(rig.bot.state(), BotState::Ready);
        assert!(!rig.bot.is_busy());
        assert_eq!(rig.position(), Vec3::ZERO);
        assert_eq!(rig.audio.0, vec![AudioCue::Airbrake]);
    }

    #[test]
    fn turning_then_driving_off_the_side_kills_the_bot() {
        let mut rig = Rig::new(&[Instruction::Left, Instruction::Forward]);
        rig.arm();
        rig.tick(OP_TIME_STEP);
        assert!((rig.bot.transform().rotation.y - FRAC_PI_2).abs() < EPSILON);
        rig.tick(OP_DELAY);
        assert_eq!(rig.bot.state(), BotState::Ready);

        assert_eq!(rig.program.clone().next_instruction(), Some(Instruction::Forward));
        rig.program.next_instruction();
        rig.arm();
        rig.tick(1.5);

        assert_eq!(rig.bot.state(), BotState::Dying);
        assert_eq!(rig.bot.map_status(), MapStatus::Bad);
        assert_eq!(rig.bot.death_spin(), DeathSpin::Left);
        assert_eq!(
            rig.audio.0,
            vec![AudioCue::Turn, AudioCue::Move, AudioCue::Fall]
        );

        rig.tick(OP_DEATH_TIME_STEP);
        assert!(rig.bot.is_dead());
        assert!(!rig.bot.prepare_for_new_instruction());
        assert_eq!(rig.bot.transform().scale, 0.0);
        assert!(rig.position().y < -70.0);
    }

    #[test]
    fn dying_shrinks_and_tumbles_gradually() {
        let mut rig = Rig::new(&[Instruction::Forward, Instruction::Forward, Instruction::Forward]);
        for _ in 0..2 {
            rig.arm();
            rig.tick(OP_TIME_STEP);
            rig.tick(OP_DELAY);
            rig.program.next_instruction();
        }
        rig.arm();
        rig.tick(1.5);
        assert_eq!(rig.bot.state(), BotState::Dying);
        assert_eq!(rig.bot.death_spin(), DeathSpin::Forwards);

        rig.tick(1.0);
        assert_eq!(rig.bot.state(), BotState::Dying);
        assert!((rig.bot.transform().scale - 0.75).abs() < EPSILON);
        assert!((rig.bot.transform().rotation.x - ROTATE_STEP / 2.0).abs() < EPSILON);
    }

    #[test]
    fn dead_bot_respawns_on_next_update() {
        let mut rig = Rig::new(&[Instruction::Back]);
        rig.arm();
        rig.tick(OP_TIME_STEP);
        assert_eq!(rig.bot.state(), BotState::Dying);
        assert_eq!(rig.bot.death_spin(), DeathSpin::Back);
        rig.tick(OP_DEATH_TIME_STEP);
        assert!(rig.bot.is_dead());

        rig.bot.respawn_bot();
        assert_eq!(rig.bot.map_status(), MapStatus::None);
        rig.tick(0.0);

        assert_eq!(rig.bot.state(), BotState::Ready);
        assert_eq!(*rig.bot.transform(), Transform3::default());
    }

    #[test]
    fn respawn_of_live_bot_only_moves_it() {
        let mut rig = Rig::new(&[Instruction::Forward]);
        rig.arm();
        rig.tick(OP_TIME_STEP);
        rig.tick(OP_DELAY);

        rig.bot.respawn_bot();
        rig.tick(0.0);

        assert_eq!(rig.bot.state(), BotState::Ready);
        assert_eq!(rig.position(), Vec3::ZERO);
    }

    #[test]
    fn death_spin_follows_heading_and_direction() {
        assert_eq!(DeathSpin::for_heading(0.0, false), DeathSpin::Forwards);
        assert_eq!(DeathSpin::for_heading(0.0, true), DeathSpin::Back);
        assert_eq!(DeathSpin::for_heading(PI, false), DeathSpin::Back);
        assert_eq!(DeathSpin::for_heading(PI, true), DeathSpin::Forwards);
        assert_eq!(DeathSpin::for_heading(FRAC_PI_2, false), DeathSpin::Left);
        assert_eq!(DeathSpin::for_heading(FRAC_PI_2, true), DeathSpin::Right);
        assert_eq!(DeathSpin::for_heading(3.0 * FRAC_PI_2, false), DeathSpin::Right);
        assert_eq!(DeathSpin::for_heading(3.0 * FRAC_PI_2, true), DeathSpin::Left);
    }
}
