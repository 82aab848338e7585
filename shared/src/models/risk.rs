//! Risk classification models

use serde::{Deserialize, Serialize};

use crate::types::CLASS_COUNT;

/// Ordinal asthma risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low = 0,
    Moderate = 1,
    High = 2,
}

impl RiskLevel {
    /// All levels in ascending severity, matching model class order
    pub const ALL: [RiskLevel; CLASS_COUNT] = [RiskLevel::Low, RiskLevel::Moderate, RiskLevel::High];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(RiskLevel::Low),
            "Moderate" => Ok(RiskLevel::Moderate),
            "High" => Ok(RiskLevel::High),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

/// Class probability triple, summing to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Moderate")]
    pub moderate: f64,
    #[serde(rename = "High")]
    pub high: f64,
}

impl ClassProbabilities {
    pub fn from_array(p: [f64; CLASS_COUNT]) -> Self {
        Self {
            low: p[0],
            moderate: p[1],
            high: p[2],
        }
    }

    pub fn as_array(&self) -> [f64; CLASS_COUNT] {
        [self.low, self.moderate, self.high]
    }

    pub fn get(&self, level: RiskLevel) -> f64 {
        self.as_array()[level.index()]
    }

    pub fn sum(&self) -> f64 {
        self.low + self.moderate + self.high
    }

    /// Probability of `level` or anything more severe
    pub fn at_least(&self, level: RiskLevel) -> f64 {
        self.as_array()[level.index()..].iter().sum()
    }

    /// Most probable level; exact ties resolve to the more severe level
    pub fn most_likely(&self) -> RiskLevel {
        let p = self.as_array();
        let mut best = 0;
        for i in 1..CLASS_COUNT {
            if p[i] >= p[best] {
                best = i;
            }
        }
        RiskLevel::ALL[best]
    }
}

/// Classifier output: label plus the full probability distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub label: RiskLevel,
    pub probabilities: ClassProbabilities,
}

impl RiskPrediction {
    pub fn from_probabilities(probabilities: ClassProbabilities) -> Self {
        Self {
            label: probabilities.most_likely(),
            probabilities,
        }
    }

    /// Probability assigned to the predicted label
    pub fn confidence(&self) -> f64 {
        self.probabilities.get(self.label)
    }
}
