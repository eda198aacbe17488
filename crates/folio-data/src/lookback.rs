//! History window selection.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far back to request daily prices, in Yahoo Finance range notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lookback {
    /// `1d`
    #[serde(rename = "1d")]
    OneDay,
    /// `5d`
    #[serde(rename = "5d")]
    FiveDays,
    /// `1mo`
    #[serde(rename = "1mo")]
    OneMonth,
    /// `3mo`
    #[serde(rename = "3mo")]
    ThreeMonths,
    /// `6mo`
    #[default]
    #[serde(rename = "6mo")]
    SixMonths,
    /// `1y`
    #[serde(rename = "1y")]
    OneYear,
    /// `2y`
    #[serde(rename = "2y")]
    TwoYears,
    /// `5y`
    #[serde(rename = "5y")]
    FiveYears,
    /// `10y`
    #[serde(rename = "10y")]
    TenYears,
    /// Year to date
    #[serde(rename = "ytd")]
    YearToDate,
    /// Full available history
    #[serde(rename = "max")]
    Max,
}

impl Lookback {
    /// All supported lookbacks, shortest first.
    pub const ALL: [Self; 11] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::FiveYears,
        Self::TenYears,
        Self::YearToDate,
        Self::Max,
    ];

    /// Range string understood by the Yahoo chart API.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lookback {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lookback| lookback.as_str() == normalized)
            .ok_or_else(|| DataError::InvalidLookback(s.to_string()))
    }
}
