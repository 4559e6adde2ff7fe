// SPDX-License-Identifier: GPL-3.0-only

//! Exercise definitions and the repetition queue
//!
//! Exercises are read from any `*Exercises.json` in the recording root:
//!
//! ```json
//! {"Exercises": [{"Id": "E02a", "Description": "...", "Sitting": true,
//!                 "Ankle Weight": false, "Holding Weight": false}]}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::params::Environment;
use crate::errors::AppError;
use crate::storage;

/// Difficulty encoded in the third character of an exercise id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Trivial,
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Trivial => "Trivial",
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Sitting", default)]
    pub sitting: bool,
    #[serde(rename = "Ankle Weight", default)]
    pub ankle_weight: bool,
    #[serde(rename = "Holding Weight", default)]
    pub holding_weight: bool,
}

impl Exercise {
    pub fn difficulty(&self) -> Difficulty {
        match self.id.chars().nth(2) {
            Some('1') => Difficulty::Easy,
            Some('2') => Difficulty::Medium,
            Some('3') => Difficulty::Hard,
            _ => Difficulty::Trivial,
        }
    }

    /// Copy the exercise's posture and weights into the recorded environment
    pub fn apply_to(&self, environment: &mut Environment) {
        environment.sitting = self.sitting;
        environment.ankle_weight = self.ankle_weight;
        environment.holding_weight = self.holding_weight;
        environment.exercise = Some(self.id.clone());
    }
}

#[derive(Debug, Deserialize)]
struct ExerciseFile {
    #[serde(rename = "Exercises")]
    exercises: Vec<Exercise>,
}

/// Parse one exercise file
pub fn load_exercise_file(path: &Path) -> Result<Vec<Exercise>, AppError> {
    let text = std::fs::read_to_string(path)?;
    let file: ExerciseFile = serde_json::from_str(&text)?;
    Ok(file.exercises)
}

/// All exercises found in `*Exercises.json` files of the recording root
pub fn load_exercises(recording_root: &Path) -> Vec<Exercise> {
    let mut exercises = Vec::new();
    for path in storage::json_files(recording_root) {
        let is_exercise_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(crate::constants::recording::EXERCISES_FILE_NAME))
            .unwrap_or(false);
        if !is_exercise_file {
            continue;
        }
        match load_exercise_file(&path) {
            Ok(found) => {
                debug!(path = ?path, count = found.len(), "Loaded exercises");
                exercises.extend(found);
            }
            Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable exercise file"),
        }
    }
    exercises
}

/// What happens after a recording stopped
#[derive(Debug, Clone, PartialEq)]
pub enum RepetitionStatus {
    /// Record the same exercise again
    NextRepetition { completed: u32, of: u32 },
    /// Move on to the next queued exercise
    NextExercise(Exercise),
    /// Every repetition of every queued exercise is recorded
    AllDone,
}

/// Exercises queued for a session and the repetitions recorded so far
///
/// Without queued exercises the queue behaves like a single anonymous
/// exercise, so free recordings still honor the repeat count.
#[derive(Debug, Clone, Default)]
pub struct ExerciseQueue {
    exercises: Vec<Exercise>,
    current: usize,
    repetitions_done: u32,
}

impl ExerciseQueue {
    pub fn new(exercises: Vec<Exercise>) -> Self {
        Self {
            exercises,
            current: 0,
            repetitions_done: 0,
        }
    }

    /// Exercise being recorded, `None` for free recording
    pub fn current(&self) -> Option<&Exercise> {
        self.exercises.get(self.current)
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn repetitions_done(&self) -> u32 {
        self.repetitions_done
    }

    /// Count a finished recording and decide what comes next
    pub fn record_repetition(&mut self, repeat_n_times: u32) -> RepetitionStatus {
        let target = repeat_n_times.max(1);
        self.repetitions_done += 1;

        if self.repetitions_done < target {
            return RepetitionStatus::NextRepetition {
                completed: self.repetitions_done,
                of: target,
            };
        }

        self.repetitions_done = 0;
        self.current += 1;
        match self.exercises.get(self.current) {
            Some(next) => {
                info!(exercise = %next.id, "Advancing to next exercise");
                RepetitionStatus::NextExercise(next.clone())
            }
            None => {
                info!("All repetitions recorded");
                self.current = 0;
                RepetitionStatus::AllDone
            }
        }
    }

    /// Start over from the first exercise
    pub fn reset(&mut self) {
        self.current = 0;
        self.repetitions_done = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(id: &str) -> Exercise {
        Exercise {
            id: id.to_string(),
            description: String::new(),
            sitting: false,
            ankle_weight: true,
            holding_weight: false,
        }
    }

    #[test]
    fn test_difficulty_from_id() {
        assert_eq!(exercise("E03").difficulty(), Difficulty::Hard);
        assert_eq!(exercise("E01").difficulty(), Difficulty::Easy);
        assert_eq!(exercise("E02").difficulty(), Difficulty::Medium);
        assert_eq!(exercise("E0x").difficulty(), Difficulty::Trivial);
        assert_eq!(exercise("E").difficulty(), Difficulty::Trivial);
    }

    #[test]
    fn test_three_repetitions_then_next_exercise() {
        let mut queue = ExerciseQueue::new(vec![exercise("A01"), exercise("B02")]);
        assert_eq!(
            queue.record_repetition(3),
            RepetitionStatus::NextRepetition { completed: 1, of: 3 }
        );
        assert_eq!(
            queue.record_repetition(3),
            RepetitionStatus::NextRepetition { completed: 2, of: 3 }
        );
        assert_eq!(
            queue.record_repetition(3),
            RepetitionStatus::NextExercise(exercise("B02"))
        );
        assert_eq!(queue.repetitions_done(), 0);
        assert_eq!(queue.current().map(|e| e.id.as_str()), Some("B02"));

        queue.record_repetition(3);
        queue.record_repetition(3);
        assert_eq!(queue.record_repetition(3), RepetitionStatus::AllDone);
    }

    #[test]
    fn test_free_recording_honors_repeat_count() {
        let mut queue = ExerciseQueue::default();
        assert!(matches!(
            queue.record_repetition(2),
            RepetitionStatus::NextRepetition { .. }
        ));
        assert_eq!(queue.record_repetition(2), RepetitionStatus::AllDone);
        assert_eq!(queue.repetitions_done(), 0);
    }

    #[test]
    fn test_apply_to_environment() {
        let mut env = Environment::default();
        exercise("C01").apply_to(&mut env);
        assert!(!env.sitting);
        assert!(env.ankle_weight);
        assert_eq!(env.exercise.as_deref(), Some("C01"));
    }

    #[test]
    fn test_load_exercises_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("LabExercises.json"),
            r#"{"Exercises":[{"Id":"E01","Description":"Knee lift","Sitting":true,"Ankle Weight":true,"Holding Weight":false}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("Broken Exercises.json"), "{").unwrap();
        std::fs::write(dir.path().join("other.json"), r#"{"Exercises":[]}"#).unwrap();

        let exercises = load_exercises(dir.path());
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].description, "Knee lift");
        assert!(exercises[0].ankle_weight);
    }
}
