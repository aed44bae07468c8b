//! Scripted player for headless runs: picks a course, types in a program, presses
//! GO and quits once the run is decided.

use engine::{InputCollector, InputSnapshot, LoopCommand, LoopExit, Simulation, Vec3};
use serde::Serialize;
use tracing::info;

use super::mission::course::CourseId;
use super::mission::program::Instruction;
use super::mission::{AlgoMission, AppState, UserAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    AwaitTitle,
    AwaitCourseSelect,
    AwaitControls,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Outcome {
    Win,
    Dead,
    Unfinished,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RunReport {
    pub(crate) course: CourseId,
    pub(crate) program: Vec<Instruction>,
    pub(crate) outcome: Outcome,
    pub(crate) score: i64,
    pub(crate) bot_position: Vec3,
    pub(crate) frames: u64,
    pub(crate) ticks: u64,
}

pub(crate) struct Autopilot {
    mission: AlgoMission,
    course: CourseId,
    program: Vec<Instruction>,
    step: Step,
    outcome: Outcome,
}

impl Autopilot {
    pub(crate) fn new(mission: AlgoMission, course: CourseId, program: Vec<Instruction>) -> Self {
        Self {
            mission,
            course,
            program,
            step: Step::AwaitTitle,
            outcome: Outcome::Unfinished,
        }
    }

    pub(crate) fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub(crate) fn report(&self, exit: &LoopExit) -> RunReport {
        RunReport {
            course: self.course,
            program: self.program.clone(),
            outcome: self.outcome,
            score: self.mission.score(),
            bot_position: self.mission.bot().transform().position,
            frames: exit.frames,
            ticks: exit.ticks,
        }
    }

    /// Actions for the mission's current state. Each step queues its actions once.
    fn plan(&mut self, input: &mut InputCollector<UserAction>) {
        match (self.step, self.mission.state()) {
            (Step::AwaitTitle, AppState::Loaded) => {
                input.push(UserAction::Select);
                self.step = Step::AwaitCourseSelect;
            }
            (Step::AwaitCourseSelect, AppState::SelectMap) => {
                input.push(UserAction::ChooseCourse(self.course));
                self.step = Step::AwaitControls;
            }
            (Step::AwaitControls, AppState::Ready) => {
                for instruction in &self.program {
                    input.push(UserAction::Instruction(*instruction));
                }
                input.push(UserAction::Instruction(Instruction::Go));
                info!(course = self.course, program = ?self.program, "autopilot_program_entered");
                self.step = Step::Running;
            }
            (Step::Running, AppState::Win | AppState::Dead) => {
                self.outcome = if self.mission.state() == AppState::Win {
                    Outcome::Win
                } else {
                    Outcome::Dead
                };
                info!(outcome = ?self.outcome, score = self.mission.score(), "autopilot_finished");
                input.mark_quit_requested();
                self.step = Step::Finished;
            }
            _ => {}
        }
    }
}

impl Simulation for Autopilot {
    type Action = UserAction;

    fn poll_input(&mut self, input: &mut InputCollector<UserAction>) {
        self.plan(input);
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot<UserAction>) -> LoopCommand {
        self.mission.update(fixed_dt_seconds, input)
    }

    fn render(&mut self) {
        self.mission.render();
    }

    fn shutdown(&mut self) {
        self.mission.shutdown();
    }

    fn debug_label(&self) -> Option<String> {
        self.mission.debug_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mission::collaborators::Collaborators;
    use crate::app::mission::course::CourseCatalog;
    use crate::app::mission::MissionConfig;

    const COURSES: &str = r#"{
        "mapDefinition": [{
            "mapid": 4,
            "name": "First Stop",
            "tileLayout": [
                { "id": "tile_bottom_deadend", "x": 0, "z": -1 },
                { "id": "tile_vert", "x": 0, "z": 0 },
                { "id": "tile_vert", "x": 0, "z": 1 },
                { "id": "tile_top_deadend", "x": 0, "z": 2, "role": "END" }
            ]
        }]
    }"#;

    fn autopilot(program: Vec<Instruction>) -> Autopilot {
        let config = MissionConfig::default();
        let collaborators =
            Collaborators::headless(Vec3::new(1.0, 1.0, 2.0), config.win_screen_seconds);
        let catalog = CourseCatalog::from_json_str(COURSES).expect("catalog");
        Autopilot::new(AlgoMission::new(config, catalog, collaborators), 4, program)
    }

    /// Drives the autopilot the way the loop does: poll once, then one tick.
    fn drive(pilot: &mut Autopilot, max_frames: usize) -> usize {
        let mut input = InputCollector::new();
        for frame in 0..max_frames {
            pilot.poll_input(&mut input);
            if input.quit_requested() {
                return frame;
            }
            let snapshot = input.snapshot_for_tick();
            pilot.update(0.033, &snapshot);
            pilot.render();
        }
        panic!("autopilot did not finish in {max_frames} frames");
    }

    #[test]
    fn winning_program_reports_win() {
        let mut pilot = autopilot(vec![
            Instruction::Forward,
            Instruction::Forward,
            Instruction::Pause,
        ]);

        let frames = drive(&mut pilot, 2000);

        assert_eq!(pilot.outcome(), Outcome::Win);
        let report = pilot.report(&LoopExit {
            reason: engine::LoopExitReason::Quit,
            frames: frames as u64,
            ticks: frames as u64,
        });
        assert_eq!(report.score, 1000);
        assert_eq!(report.course, 4);
        assert!((report.bot_position.z - 20.0).abs() < 1e-2);
    }

    #[test]
    fn losing_program_reports_dead() {
        let mut pilot = autopilot(vec![Instruction::Forward; 3]);

        drive(&mut pilot, 2000);

        assert_eq!(pilot.outcome(), Outcome::Dead);
    }

    #[test]
    fn report_serializes_as_json() {
        let pilot = autopilot(vec![Instruction::Fire]);
        let report = pilot.report(&LoopExit {
            reason: engine::LoopExitReason::FrameLimit,
            frames: 10,
            ticks: 12,
        });

        let value = serde_json::to_value(&report).expect("json");

        assert_eq!(value["outcome"], "unfinished");
        assert_eq!(value["program"][0], "FIRE");
        assert_eq!(value["ticks"], 12);
    }
}
