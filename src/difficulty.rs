/// SAC hiking scale grades as used by hikr.org, from `T1-` to `T6+`.
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::UnknownDifficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Difficulty {
    T1Minus,
    T1,
    T1Plus,
    T2Minus,
    T2,
    T2Plus,
    T3Minus,
    T3,
    T3Plus,
    T4Minus,
    T4,
    T4Plus,
    T5Minus,
    T5,
    T5Plus,
    T6Minus,
    T6,
    T6Plus,
}

impl Difficulty {
    /// Every grade, easiest first.
    pub const ALL: [Difficulty; 18] = [
        Difficulty::T1Minus,
        Difficulty::T1,
        Difficulty::T1Plus,
        Difficulty::T2Minus,
        Difficulty::T2,
        Difficulty::T2Plus,
        Difficulty::T3Minus,
        Difficulty::T3,
        Difficulty::T3Plus,
        Difficulty::T4Minus,
        Difficulty::T4,
        Difficulty::T4Plus,
        Difficulty::T5Minus,
        Difficulty::T5,
        Difficulty::T5Plus,
        Difficulty::T6Minus,
        Difficulty::T6,
        Difficulty::T6Plus,
    ];

    pub fn grade(self) -> &'static str {
        match self {
            Difficulty::T1Minus => "T1-",
            Difficulty::T1 => "T1",
            Difficulty::T1Plus => "T1+",
            Difficulty::T2Minus => "T2-",
            Difficulty::T2 => "T2",
            Difficulty::T2Plus => "T2+",
            Difficulty::T3Minus => "T3-",
            Difficulty::T3 => "T3",
            Difficulty::T3Plus => "T3+",
            Difficulty::T4Minus => "T4-",
            Difficulty::T4 => "T4",
            Difficulty::T4Plus => "T4+",
            Difficulty::T5Minus => "T5-",
            Difficulty::T5 => "T5",
            Difficulty::T5Plus => "T5+",
            Difficulty::T6Minus => "T6-",
            Difficulty::T6 => "T6",
            Difficulty::T6Plus => "T6+",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Difficulty::T1Minus | Difficulty::T1 | Difficulty::T1Plus => "Valley hike",
            Difficulty::T2Minus | Difficulty::T2 | Difficulty::T2Plus => "Mountain hike",
            Difficulty::T3Minus | Difficulty::T3 | Difficulty::T3Plus => "Difficult Mountain hike",
            Difficulty::T4Minus | Difficulty::T4 | Difficulty::T4Plus => "High-level Alpine hike",
            Difficulty::T5Minus | Difficulty::T5 | Difficulty::T5Plus => {
                "Challenging High-level Alpine hike"
            }
            Difficulty::T6Minus | Difficulty::T6 | Difficulty::T6Plus => {
                "Difficult High-level Alpine hike"
            }
        }
    }

    /// Full hikr label, e.g. `T3+ - Difficult Mountain hike`.
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.grade(), self.description())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    /// Accepts the full label or the bare grade. A bare grade must be
    /// followed by nothing, and a label's description must match the grade.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (grade, description) = match trimmed.split_once(" - ") {
            Some((grade, description)) => (grade.trim(), Some(description.trim())),
            None => (trimmed, None),
        };

        Difficulty::ALL
            .iter()
            .copied()
            .find(|d| d.grade() == grade && description.map_or(true, |text| text == d.description()))
            .ok_or_else(|| UnknownDifficulty(s.to_string()))
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
