// optimizer/rating.rs — Convergence decision and letter-grade handling

use super::types::{PromptAssessment, RatingError};

pub const MAX_SCORE: f64 = 20.0;

/// Minimum GPA for the letter rating system (A- or better).
pub const LETTER_GOAL_GPA: f64 = 3.7;

/// Canonical grades, best first, with their GPA values.
pub const GRADE_TABLE: [(&str, f64); 13] = [
    ("A+", 4.3),
    ("A", 4.0),
    ("A-", 3.7),
    ("B+", 3.3),
    ("B", 3.0),
    ("B-", 2.7),
    ("C+", 2.3),
    ("C", 2.0),
    ("C-", 1.7),
    ("D+", 1.3),
    ("D", 1.0),
    ("D-", 0.7),
    ("F", 0.0),
];

// lower bound of each band on the 0-20 scale, aligned with GRADE_TABLE
const SCORE_BANDS: [f64; 12] = [
    19.0, 17.5, 16.0, 15.0, 14.0, 13.0, 12.0, 11.0, 10.0, 9.0, 8.0, 7.0,
];

/// The two ways a run can decide it is done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingSystem {
    Numerical { threshold: f64 },
    Letter,
}

impl RatingSystem {
    pub fn parse(name: &str, threshold: f64) -> Result<Self, RatingError> {
        match name.trim().to_lowercase().as_str() {
            "numerical" => Ok(RatingSystem::Numerical { threshold }),
            "letter" => Ok(RatingSystem::Letter),
            _ => Err(RatingError::UnknownRatingSystem(name.to_string())),
        }
    }

    pub fn is_goal_met(&self, assessment: &PromptAssessment) -> bool {
        match *self {
            RatingSystem::Numerical { threshold } => {
                assessment.overall_score >= threshold * MAX_SCORE
            }
            RatingSystem::Letter => grade_to_gpa(&assessment.overall_grade)
                .map(|gpa| gpa >= LETTER_GOAL_GPA)
                .unwrap_or(false),
        }
    }
}

/// Resolve `rating_system` and decide convergence in one step.
pub fn is_goal_met(
    rating_system: &str,
    threshold: f64,
    assessment: &PromptAssessment,
) -> Result<bool, RatingError> {
    RatingSystem::parse(rating_system, threshold).map(|system| system.is_goal_met(assessment))
}

pub fn grade_to_gpa(grade: &str) -> Option<f64> {
    GRADE_TABLE
        .iter()
        .find(|(letter, _)| *letter == grade)
        .map(|(_, gpa)| *gpa)
}

pub fn is_valid_grade(grade: &str) -> bool {
    grade_to_gpa(grade).is_some()
}

/// Map a grade as written by a model onto the canonical letters.
///
/// Canonical letters pass through. Case and unicode minus signs are fixed
/// up. Numbers (optionally written as `n/20`) are banded on the 0-20 scale.
/// Anything else comes back trimmed so validation can reject it.
pub fn normalize_grade(grade: &str) -> String {
    let trimmed = grade.trim();
    if is_valid_grade(trimmed) {
        return trimmed.to_string();
    }

    let cleaned: String = trimmed
        .replace(['\u{2212}', '\u{2013}', '\u{2014}'], "-")
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if is_valid_grade(&cleaned) {
        return cleaned;
    }

    let numeric = cleaned.strip_suffix("/20").unwrap_or(&cleaned);
    match numeric.parse::<f64>() {
        Ok(score) if score.is_finite() => score_to_grade(score).to_string(),
        _ => trimmed.to_string(),
    }
}

pub fn score_to_grade(score: f64) -> &'static str {
    SCORE_BANDS
        .iter()
        .position(|floor| score >= *floor)
        .map(|idx| GRADE_TABLE[idx].0)
        .unwrap_or("F")
}
