use std::fmt;

use engine::{Transform3, Vec3};
use tracing::{debug, info};

use super::program::Instruction;

pub type ScoreDelta = i32;

pub const PASSENGER_REWARD: ScoreDelta = 1000;
pub const PASSENGER_BOARDING_SECONDS: f32 = 2.0;
pub const BIRD_PLACATED_REWARD: ScoreDelta = 5000;
pub const BIRD_ANGRY_PENALTY: ScoreDelta = -100;
pub const BIRD_ATTACK_SECONDS: f32 = 3.0;
pub const BIRD_FLEE_CLIMB_PER_SECOND: f32 = 50.0;
pub const BIRD_FLEE_CEILING: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlairKind {
    BusStop,
    Passenger,
    Bird,
}

impl FlairKind {
    pub const ALL: [FlairKind; 3] = [FlairKind::BusStop, FlairKind::Passenger, FlairKind::Bird];

    pub const fn model_resource(self) -> &'static str {
        match self {
            FlairKind::BusStop => "models/BusStop_Raid/scene.gltf",
            FlairKind::Passenger => "models/Mary_XaneMyers/scene.gltf",
            FlairKind::Bird => "models/Pigeon_FourthGreen/scene.gltf",
        }
    }

    pub const fn node_prefix(self) -> &'static str {
        match self {
            FlairKind::BusStop => "BusStop",
            FlairKind::Passenger => "Lady",
            FlairKind::Bird => "Bird",
        }
    }
}

/// What a flair sees of the world when it reacts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlairContext {
    pub bot_position: Vec3,
    pub viewpoint: Vec3,
}

/// A decoration bound to one tile that reacts to the bot arriving, leaving, and
/// finishing an instruction on it. Reactions that change the score return the delta.
pub trait TileFlair: fmt::Debug {
    fn kind(&self) -> FlairKind;

    fn name(&self) -> &str;

    fn activate(&mut self, ctx: &FlairContext);

    fn deactivate(&mut self, ctx: &FlairContext) -> Option<ScoreDelta>;

    fn do_special(&mut self, instruction: Instruction, ctx: &FlairContext) -> Option<ScoreDelta>;

    fn update(&mut self, dt: f32);

    fn transform(&self) -> &Transform3;

    fn is_visible(&self) -> bool {
        true
    }

    /// `Some(done)` when course completion depends on this flair.
    fn completion(&self) -> Option<bool> {
        None
    }
}

pub fn new_flair(kind: FlairKind, name: String, placement: Transform3) -> Box<dyn TileFlair> {
    match kind {
        FlairKind::BusStop => Box::new(BusStopFlair::new(name, placement)),
        FlairKind::Passenger => Box::new(PassengerFlair::new(name, placement)),
        FlairKind::Bird => Box::new(BirdFlair::new(name, placement)),
    }
}

/// Straight-line move from `from` to `to` over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Flight {
    from: Vec3,
    to: Vec3,
    elapsed: f32,
    duration: f32,
}

impl Flight {
    fn new(from: Vec3, to: Vec3, duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration: duration.max(f32::EPSILON),
        }
    }

    /// Advances and returns the new position.
    fn step(&mut self, dt: f32) -> Vec3 {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.from.lerp(self.to, self.elapsed / self.duration)
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Debug)]
pub struct BusStopFlair {
    name: String,
    transform: Transform3,
}

impl BusStopFlair {
    pub fn new(name: String, transform: Transform3) -> Self {
        Self { name, transform }
    }
}

impl TileFlair for BusStopFlair {
    fn kind(&self) -> FlairKind {
        FlairKind::BusStop
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, _ctx: &FlairContext) {}

    fn deactivate(&mut self, _ctx: &FlairContext) -> Option<ScoreDelta> {
        None
    }

    fn do_special(&mut self, _instruction: Instruction, _ctx: &FlairContext) -> Option<ScoreDelta> {
        None
    }

    fn update(&mut self, _dt: f32) {}

    fn transform(&self) -> &Transform3 {
        &self.transform
    }
}

/// Waits at the stop until the bot pauses next to her, then boards.
#[derive(Debug)]
pub struct PassengerFlair {
    name: String,
    transform: Transform3,
    boarded: bool,
    boarding: Option<Flight>,
}

impl PassengerFlair {
    pub fn new(name: String, transform: Transform3) -> Self {
        Self {
            name,
            transform,
            boarded: false,
            boarding: None,
        }
    }

    pub fn is_boarded(&self) -> bool {
        self.boarded
    }

    pub fn is_boarding(&self) -> bool {
        self.boarding.is_some()
    }
}

impl TileFlair for PassengerFlair {
    fn kind(&self) -> FlairKind {
        FlairKind::Passenger
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, _ctx: &FlairContext) {}

    fn deactivate(&mut self, _ctx: &FlairContext) -> Option<ScoreDelta> {
        None
    }

    fn do_special(&mut self, instruction: Instruction, ctx: &FlairContext) -> Option<ScoreDelta> {
        if instruction != Instruction::Pause || self.boarded {
            return None;
        }
        self.boarded = true;
        self.boarding = Some(Flight::new(
            self.transform.position,
            ctx.bot_position,
            PASSENGER_BOARDING_SECONDS,
        ));
        info!(flair = %self.name, reward = PASSENGER_REWARD, "passenger_boarding");
        Some(PASSENGER_REWARD)
    }

    fn update(&mut self, dt: f32) {
        if let Some(flight) = &mut self.boarding {
            self.transform.position = flight.step(dt);
            if flight.is_finished() {
                self.boarding = None;
            }
        }
    }

    fn transform(&self) -> &Transform3 {
        &self.transform
    }

    fn is_visible(&self) -> bool {
        !self.boarded || self.boarding.is_some()
    }

    fn completion(&self) -> Option<bool> {
        Some(self.boarded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BirdState {
    Ready,
    HelloBot,
    GoodbyeBot,
    DoingSpecial,
    Gone,
}

/// Sits on its tile. Honking at it while the bot is there scares it off for a big
/// reward; driving off without honking makes it fly at the viewer, once, for a
/// penalty.
#[derive(Debug)]
pub struct BirdFlair {
    name: String,
    transform: Transform3,
    state: BirdState,
    resolved: bool,
    flight: Option<Flight>,
}

impl BirdFlair {
    pub fn new(name: String, transform: Transform3) -> Self {
        Self {
            name,
            transform,
            state: BirdState::Ready,
            resolved: false,
            flight: None,
        }
    }

    pub fn state(&self) -> BirdState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    fn change_state(&mut self, next: BirdState) {
        if self.state != next {
            debug!(flair = %self.name, from = ?self.state, to = ?next, "bird_state_changed");
            self.state = next;
        }
    }
}

impl TileFlair for BirdFlair {
    fn kind(&self) -> FlairKind {
        FlairKind::Bird
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, _ctx: &FlairContext) {
        if matches!(self.state, BirdState::Ready | BirdState::GoodbyeBot) {
            self.change_state(BirdState::HelloBot);
        }
    }

    fn deactivate(&mut self, ctx: &FlairContext) -> Option<ScoreDelta> {
        if self.state != BirdState::HelloBot {
            return None;
        }
        self.change_state(BirdState::GoodbyeBot);
        if self.resolved {
            return None;
        }
        self.resolved = true;
        self.flight = Some(Flight::new(
            self.transform.position,
            ctx.viewpoint,
            BIRD_ATTACK_SECONDS,
        ));
        info!(flair = %self.name, penalty = BIRD_ANGRY_PENALTY, "bird_attack");
        Some(BIRD_ANGRY_PENALTY)
    }

    fn do_special(&mut self, instruction: Instruction, _ctx: &FlairContext) -> Option<ScoreDelta> {
        if instruction != Instruction::Fire || self.state != BirdState::HelloBot || self.resolved
        {
            return None;
        }
        self.resolved = true;
        self.change_state(BirdState::DoingSpecial);
        let position = self.transform.position;
        let ceiling = Vec3::new(
            position.x + BIRD_FLEE_CEILING / 2.0,
            position.y + BIRD_FLEE_CEILING,
            position.z,
        );
        self.flight = Some(Flight::new(
            position,
            ceiling,
            BIRD_FLEE_CEILING / BIRD_FLEE_CLIMB_PER_SECOND,
        ));
        info!(flair = %self.name, reward = BIRD_PLACATED_REWARD, "bird_flees");
        Some(BIRD_PLACATED_REWARD)
    }

    fn update(&mut self, dt: f32) {
        let Some(flight) = &mut self.flight else {
            return;
        };
        self.transform.position = flight.step(dt);
        if flight.is_finished() {
            self.flight = None;
            if self.state == BirdState::DoingSpecial {
                self.change_state(BirdState::Gone);
            }
        }
    }

    fn transform(&self) -> &Transform3 {
        &self.transform
    }

    fn is_visible(&self) -> bool {
        self.state != BirdState::Gone
    }
}
