//! Directional audio-feature filters
//!
//! A filter narrows a pool of tracks toward one side of a feature
//! distribution: it computes the pool mean for its feature and keeps the
//! tracks at least one radius beyond the mean in the requested direction.
//! Tempo uses a fractional radius (a share of the mean, since BPM is not on
//! the 0-1 scale); all other features use a fixed radius.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::models::Track;

/// The audio features the engine steers on
///
/// Ordered so the features can key ordered maps of per-feature averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Danceability,
    Energy,
    Speechiness,
    Valence,
    Tempo,
}

impl Feature {
    /// All steering features in adjustment-pair order
    pub const STEERING: [Feature; 5] = [
        Feature::Danceability,
        Feature::Energy,
        Feature::Speechiness,
        Feature::Valence,
        Feature::Tempo,
    ];

    /// Extract this feature's value from a track
    pub fn value(&self, track: &Track) -> f64 {
        match self {
            Feature::Danceability => track.danceability,
            Feature::Energy => track.energy,
            Feature::Speechiness => track.speechiness,
            Feature::Valence => track.valence,
            Feature::Tempo => track.tempo,
        }
    }

    /// Whether this feature uses the fractional tempo radius
    pub fn is_tempo(&self) -> bool {
        matches!(self, Feature::Tempo)
    }

    /// Stable lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Danceability => "danceability",
            Feature::Energy => "energy",
            Feature::Speechiness => "speechiness",
            Feature::Valence => "valence",
            Feature::Tempo => "tempo",
        }
    }
}

/// Direction of a pool adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Decrease,
    Increase,
}

impl Direction {
    /// Stable lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Decrease => "decrease",
            Direction::Increase => "increase",
        }
    }
}

/// Radii controlling how far beyond the pool mean a filter cuts
#[derive(Debug, Clone, Copy)]
pub struct FilterRadii {
    /// Fixed radius for 0-1 scale features
    pub base: f64,
    /// Fractional radius for tempo (radius = mean * fraction)
    pub tempo_fraction: f64,
}

impl FilterRadii {
    /// Scale both radii by a multiplier
    pub fn scaled(&self, multiplier: f64) -> Self {
        Self {
            base: self.base * multiplier,
            tempo_fraction: self.tempo_fraction * multiplier,
        }
    }

    /// The effective radius for a feature given a pool mean
    pub fn for_feature(&self, feature: Feature, mean: f64) -> f64 {
        if feature.is_tempo() {
            mean * self.tempo_fraction
        } else {
            self.base
        }
    }
}

/// A single directional filter over one steering feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub feature: Feature,
    pub direction: Direction,
}

impl FilterSpec {
    /// Decode an adjustment id (0..=9) into a filter
    ///
    /// Even ids decrease, odd ids increase; pairs follow the steering
    /// feature order (0/1 danceability, 2/3 energy, 4/5 speechiness,
    /// 6/7 valence, 8/9 tempo).
    pub fn from_adjustment(id: u8) -> Option<Self> {
        let feature = *Feature::STEERING.get(usize::from(id / 2))?;
        let direction = if id % 2 == 0 {
            Direction::Decrease
        } else {
            Direction::Increase
        };
        Some(Self { feature, direction })
    }

    /// The adjustment id this filter corresponds to
    pub fn adjustment_id(&self) -> u8 {
        let pair = Feature::STEERING
            .iter()
            .position(|f| *f == self.feature)
            .unwrap_or(0) as u8;
        pair * 2
            + match self.direction {
                Direction::Decrease => 0,
                Direction::Increase => 1,
            }
    }

    /// Human-readable name, e.g. `increase_energy`
    pub fn name(&self) -> String {
        format!("{}_{}", self.direction.name(), self.feature.name())
    }

    /// Apply the filter to a pool of catalog indices
    ///
    /// An empty input pool passes through unchanged.
    pub fn apply(&self, catalog: &Catalog, pool: &[usize], radii: &FilterRadii) -> Vec<usize> {
        if pool.is_empty() {
            return Vec::new();
        }

        let mean = pool_mean(catalog, pool, self.feature);
        let radius = radii.for_feature(self.feature, mean);

        pool.iter()
            .copied()
            .filter(|&idx| {
                let Some(track) = catalog.track(idx) else {
                    return false;
                };
                let value = self.feature.value(track);
                match self.direction {
                    Direction::Increase => value >= mean + radius,
                    Direction::Decrease => value <= mean - radius,
                }
            })
            .collect()
    }
}

/// Mean of a feature over a pool of catalog indices
pub fn pool_mean(catalog: &Catalog, pool: &[usize], feature: Feature) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }
    let sum: f64 = pool
        .iter()
        .filter_map(|&idx| catalog.track(idx))
        .map(|t| feature.value(t))
        .sum();
    sum / pool.len() as f64
}
