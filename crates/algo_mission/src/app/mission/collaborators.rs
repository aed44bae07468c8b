//! Narrow interfaces to everything outside the simulation: sound, the display
//! list, and the menu screens. The headless implementations log through `tracing`.

use std::collections::{BTreeSet, HashMap};

use engine::{AssetLoader, ImmediateLoader, Transform3, Vec3};
use tracing::{debug, info, trace};

use super::map::CourseSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    Horn,
    Move,
    Turn,
    Fall,
    Airbrake,
    ButtonClick,
}

impl AudioCue {
    /// Cues the bot needs before it counts as loaded.
    pub const BOT_CUES: [AudioCue; 5] = [
        AudioCue::Horn,
        AudioCue::Move,
        AudioCue::Turn,
        AudioCue::Fall,
        AudioCue::Airbrake,
    ];

    pub const fn resource(self) -> &'static str {
        match self {
            AudioCue::Horn => "audio/43801__daveincamas__modelahorn.wav",
            AudioCue::Move => "audio/86044__nextmaking__bus.wav",
            AudioCue::Turn => "audio/86044__nextmaking__bus_reversed.wav",
            AudioCue::Fall => "audio/360662__inspectorj__falling-comedic-a.wav",
            AudioCue::Airbrake => "audio/333083__soundslikewillem__releasing-pressure.wav",
            AudioCue::ButtonClick => "audio/107132__bubaproducer__button-14.wav",
        }
    }
}

pub trait AudioSink {
    fn play(&mut self, cue: AudioCue);
}

#[derive(Debug, Default)]
pub struct TracingAudio;

impl AudioSink for TracingAudio {
    fn play(&mut self, cue: AudioCue) {
        debug!(cue = ?cue, "audio_play");
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeView<'a> {
    pub name: &'a str,
    pub transform: Transform3,
    pub visible: bool,
}

pub trait DisplayList {
    fn add(&mut self, node: &str);

    fn remove(&mut self, node: &str);

    /// Width, height and depth of a loaded model, if known.
    fn bounding_size(&self, node: &str) -> Option<Vec3>;

    fn present(&mut self, _nodes: &[NodeView<'_>]) {}
}

#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    nodes: BTreeSet<String>,
    model_sizes: HashMap<String, Vec3>,
    frames_presented: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_size(mut self, node: &str, size: Vec3) -> Self {
        self.model_sizes.insert(node.to_string(), size);
        self
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl DisplayList for HeadlessDisplay {
    fn add(&mut self, node: &str) {
        if self.nodes.insert(node.to_string()) {
            trace!(node, "display_add");
        }
    }

    fn remove(&mut self, node: &str) {
        if self.nodes.remove(node) {
            trace!(node, "display_remove");
        }
    }

    fn bounding_size(&self, node: &str) -> Option<Vec3> {
        self.model_sizes.get(node).copied()
    }

    fn present(&mut self, nodes: &[NodeView<'_>]) {
        self.frames_presented += 1;
        let visible = nodes.iter().filter(|node| node.visible).count();
        trace!(frame = self.frames_presented, visible, "present");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Screen {
    Loading,
    Title,
    MapSelect,
    ControlPanel,
    Score,
    Instructions,
    Win,
    Death,
}

pub trait Screens {
    fn show(&mut self, screen: Screen);

    fn hide(&mut self, screen: Screen);

    fn update(&mut self, _dt: f32) {}

    /// True once the win screen has played out or was dismissed.
    fn is_win_finished(&self) -> bool;

    fn dismiss_win(&mut self);

    fn set_course_summaries(&mut self, _summaries: &[CourseSummary]) {}

    fn set_score(&mut self, _score: i64) {}
}

/// Screens without a UI. The win screen "plays" for a fixed time.
#[derive(Debug)]
pub struct HeadlessScreens {
    visible: BTreeSet<Screen>,
    win_duration: f32,
    win_remaining: Option<f32>,
}

impl HeadlessScreens {
    pub fn new(win_duration: f32) -> Self {
        Self {
            visible: BTreeSet::new(),
            win_duration: win_duration.max(0.0),
            win_remaining: None,
        }
    }

    pub fn is_visible(&self, screen: Screen) -> bool {
        self.visible.contains(&screen)
    }
}

impl Screens for HeadlessScreens {
    fn show(&mut self, screen: Screen) {
        if self.visible.insert(screen) {
            debug!(screen = ?screen, "screen_shown");
        }
        if screen == Screen::Win {
            self.win_remaining = Some(self.win_duration);
        }
    }

    fn hide(&mut self, screen: Screen) {
        if self.visible.remove(&screen) {
            debug!(screen = ?screen, "screen_hidden");
        }
        if screen == Screen::Win {
            self.win_remaining = None;
        }
    }

    fn update(&mut self, dt: f32) {
        if let Some(remaining) = &mut self.win_remaining {
            *remaining -= dt;
        }
    }

    fn is_win_finished(&self) -> bool {
        self.win_remaining.is_some_and(|remaining| remaining <= 0.0)
    }

    fn dismiss_win(&mut self) {
        if self.win_remaining.is_some() {
            self.win_remaining = Some(0.0);
        }
    }

    fn set_course_summaries(&mut self, summaries: &[CourseSummary]) {
        for summary in summaries {
            info!(
                course = summary.id,
                name = %summary.name,
                difficulty = summary.difficulty,
                completed = summary.completed,
                high_score = summary.high_score,
                completion_rate = summary.completion_rate,
                "course_available"
            );
        }
    }

    fn set_score(&mut self, score: i64) {
        debug!(score, "score_display");
    }
}

/// Everything the mission talks to outside the simulation.
pub struct Collaborators {
    pub loader: Box<dyn AssetLoader>,
    pub display: Box<dyn DisplayList>,
    pub audio: Box<dyn AudioSink>,
    pub screens: Box<dyn Screens>,
}

impl Collaborators {
    pub fn headless(bot_model_size: Vec3, win_screen_seconds: f32) -> Self {
        Self {
            loader: Box::new(ImmediateLoader::new()),
            display: Box::new(
                HeadlessDisplay::new().with_model_size(super::bot::BOT_NODE, bot_model_size),
            ),
            audio: Box::new(TracingAudio),
            screens: Box::new(HeadlessScreens::new(win_screen_seconds)),
        }
    }
}
