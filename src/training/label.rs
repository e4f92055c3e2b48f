// Label vocabulary for the two-class problem

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Class label
///
/// Index order matches the classifier's output: 0 = blow, 1 = not_blow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Blow,
    NotBlow,
}

impl Label {
    /// Both labels in output-index order
    pub const ALL: [Label; 2] = [Label::Blow, Label::NotBlow];

    /// Position in the one-hot / probability vector
    pub fn index(self) -> usize {
        match self {
            Label::Blow => 0,
            Label::NotBlow => 1,
        }
    }

    pub fn one_hot(self) -> [f32; 2] {
        match self {
            Label::Blow => [1.0, 0.0],
            Label::NotBlow => [0.0, 1.0],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Blow => "blow",
            Label::NotBlow => "not_blow",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blow" => Ok(Label::Blow),
            "not_blow" => Ok(Label::NotBlow),
            other => Err(TrainingError::UnknownLabel {
                label: other.to_string(),
            }),
        }
    }
}
