use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_INSTRUCTIONS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    Forward,
    Back,
    Left,
    Right,
    Go,
    Fire,
    Pause,
    Clear,
    Grid,
}

impl Instruction {
    pub const ALL: [Instruction; 9] = [
        Instruction::Forward,
        Instruction::Back,
        Instruction::Left,
        Instruction::Right,
        Instruction::Go,
        Instruction::Fire,
        Instruction::Pause,
        Instruction::Clear,
        Instruction::Grid,
    ];

    pub const fn code(self) -> u8 {
        match self {
            Instruction::Forward => 1,
            Instruction::Back => 2,
            Instruction::Left => 3,
            Instruction::Right => 4,
            Instruction::Go => 5,
            Instruction::Fire => 6,
            Instruction::Pause => 7,
            Instruction::Clear => 8,
            Instruction::Grid => 9,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Instruction::Forward => "forward",
            Instruction::Back => "back",
            Instruction::Left => "left",
            Instruction::Right => "right",
            Instruction::Go => "go",
            Instruction::Fire => "honk!",
            Instruction::Pause => "pause",
            Instruction::Clear => "clear",
            Instruction::Grid => "grid",
        }
    }

    /// GO, CLEAR and GRID are control-panel commands and never enter a program.
    pub const fn is_queueable(self) -> bool {
        !matches!(
            self,
            Instruction::Go | Instruction::Clear | Instruction::Grid
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown instruction `{token}`")]
pub struct InstructionParseError {
    pub token: String,
}

impl FromStr for Instruction {
    type Err = InstructionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim().to_ascii_lowercase();
        let parsed = match token.as_str() {
            "forward" | "f" => Instruction::Forward,
            "back" | "b" => Instruction::Back,
            "left" | "l" => Instruction::Left,
            "right" | "r" => Instruction::Right,
            "go" => Instruction::Go,
            "fire" | "honk" | "honk!" => Instruction::Fire,
            "pause" | "pause..." | "p" => Instruction::Pause,
            "clear" => Instruction::Clear,
            "grid" => Instruction::Grid,
            _ => {
                return Err(InstructionParseError {
                    token: raw.trim().to_string(),
                })
            }
        };
        Ok(parsed)
    }
}

/// Parses a comma separated program such as `forward,forward,pause`.
pub fn parse_program(raw: &str) -> Result<Vec<Instruction>, InstructionParseError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::parse::<Instruction>)
        .collect()
}

/// The player's program: an ordered instruction list plus an execution cursor.
///
/// `is_running()` holds exactly when the cursor points at an instruction.
#[derive(Debug, Clone)]
pub struct InstructionManager {
    instructions: Vec<Instruction>,
    cursor: Option<usize>,
    max_instructions: usize,
}

impl Default for InstructionManager {
    fn default() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_INSTRUCTIONS)
    }
}

impl InstructionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_instructions: usize) -> Self {
        Self {
            instructions: Vec::new(),
            cursor: None,
            max_instructions: max_instructions.max(1),
        }
    }

    /// No-op while running, when full, or for control-panel commands.
    pub fn add_instruction(&mut self, instruction: Instruction) -> bool {
        if self.is_running()
            || !instruction.is_queueable()
            || self.instructions.len() >= self.max_instructions
        {
            return false;
        }
        self.instructions.push(instruction);
        debug!(%instruction, count = self.instructions.len(), "instruction_added");
        true
    }

    pub fn clear_instructions(&mut self) {
        self.instructions.clear();
        self.cursor = None;
    }

    /// Points the cursor at the first instruction. No-op on an empty program.
    pub fn start_instructions(&mut self) -> bool {
        if self.instructions.is_empty() {
            return false;
        }
        self.cursor = Some(0);
        true
    }

    /// Moves the cursor on. Returns `None` once the program is exhausted, which also
    /// stops it.
    pub fn next_instruction(&mut self) -> Option<Instruction> {
        let next = self.cursor? + 1;
        match self.instructions.get(next) {
            Some(instruction) => {
                self.cursor = Some(next);
                Some(*instruction)
            }
            None => {
                self.cursor = None;
                None
            }
        }
    }

    pub fn current_instruction(&self) -> Option<Instruction> {
        self.cursor
            .and_then(|index| self.instructions.get(index).copied())
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn num_of_instructions(&self) -> usize {
        self.instructions.len()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn max_instructions(&self) -> usize {
        self.max_instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(program: &[Instruction]) -> InstructionManager {
        let mut manager = InstructionManager::new();
        for instruction in program {
            assert!(manager.add_instruction(*instruction));
        }
        manager
    }

    #[test]
    fn advance_visits_each_instruction_once_then_stops() {
        let program = [
            Instruction::Forward,
            Instruction::Left,
            Instruction::Fire,
            Instruction::Back,
        ];
        let mut manager = loaded(&program);

        assert!(manager.start_instructions());
        let mut seen = vec![manager.current_instruction().expect("first")];
        for _ in 1..manager.num_of_instructions() {
            seen.push(manager.next_instruction().expect("next"));
        }

        assert_eq!(seen, program);
        assert!(manager.is_running());
        assert_eq!(manager.next_instruction(), None);
        assert!(!manager.is_running());
        assert_eq!(manager.current_instruction(), None);
    }

    #[test]
    fn start_on_empty_program_is_rejected() {
        let mut manager = InstructionManager::new();
        assert!(!manager.start_instructions());
        assert!(!manager.is_running());
    }

    #[test]
    fn append_is_ignored_while_running() {
        let mut manager = loaded(&[Instruction::Forward]);
        manager.start_instructions();

        assert!(!manager.add_instruction(Instruction::Back));
        assert_eq!(manager.instructions(), &[Instruction::Forward]);
    }

    #[test]
    fn control_commands_never_enter_program() {
        let mut manager = InstructionManager::new();
        for command in [Instruction::Go, Instruction::Clear, Instruction::Grid] {
            assert!(!manager.add_instruction(command));
        }
        assert_eq!(manager.num_of_instructions(), 0);
    }

    #[test]
    fn append_stops_at_capacity_limit() {
        let mut manager = InstructionManager::with_capacity_limit(2);
        assert!(manager.add_instruction(Instruction::Forward));
        assert!(manager.add_instruction(Instruction::Forward));
        assert!(!manager.add_instruction(Instruction::Forward));
        assert_eq!(manager.num_of_instructions(), 2);
    }

    #[test]
    fn clear_resets_cursor_and_list() {
        let mut manager = loaded(&[Instruction::Forward, Instruction::Pause]);
        manager.start_instructions();

        manager.clear_instructions();

        assert_eq!(manager.num_of_instructions(), 0);
        assert_eq!(manager.cursor(), None);
    }

    #[test]
    fn next_without_start_stays_stopped() {
        let mut manager = loaded(&[Instruction::Forward]);
        assert_eq!(manager.next_instruction(), None);
        assert!(!manager.is_running());
    }

    #[test]
    fn parse_program_accepts_labels_and_aliases() {
        let program = parse_program("forward, F,left ,honk!,pause,,back").expect("program");
        assert_eq!(
            program,
            vec![
                Instruction::Forward,
                Instruction::Forward,
                Instruction::Left,
                Instruction::Fire,
                Instruction::Pause,
                Instruction::Back,
            ]
        );
    }

    #[test]
    fn parse_program_reports_unknown_token() {
        let err = parse_program("forward,jump").expect_err("jump is not an instruction");
        assert_eq!(err.token, "jump");
        assert_eq!(err.to_string(), "unknown instruction `jump`");
    }

    #[test]
    fn codes_and_labels_are_stable() {
        let codes: Vec<u8> = Instruction::ALL.iter().map(|i| i.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(Instruction::Fire.to_string(), "honk!");
    }
}
