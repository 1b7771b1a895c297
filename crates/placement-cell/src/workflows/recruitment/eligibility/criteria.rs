use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Thresholds a session sets for its applicants. Every field is optional; the default admits
/// anyone with verified records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    #[serde(default)]
    pub min_tenth_percentage: Option<f32>,
    #[serde(default)]
    pub min_twelfth_percentage: Option<f32>,
    #[serde(default)]
    pub min_graduation_percentage: Option<f32>,
    #[serde(default)]
    pub max_active_backlogs: Option<u8>,
    /// Current years allowed to apply; empty admits every year.
    #[serde(default)]
    pub eligible_years: BTreeSet<u8>,
}

impl SelectionCriteria {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_min_tenth(mut self, percentage: f32) -> Self {
        self.min_tenth_percentage = Some(percentage);
        self
    }

    pub fn with_min_twelfth(mut self, percentage: f32) -> Self {
        self.min_twelfth_percentage = Some(percentage);
        self
    }

    pub fn with_min_graduation(mut self, percentage: f32) -> Self {
        self.min_graduation_percentage = Some(percentage);
        self
    }

    pub fn with_max_backlogs(mut self, backlogs: u8) -> Self {
        self.max_active_backlogs = Some(backlogs);
        self
    }

    pub fn with_years<I>(mut self, years: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        self.eligible_years = years.into_iter().collect();
        self
    }
}
