//! Recommendation engine
//!
//! Each listening session owns one `PoolEngine`. The engine keeps two pools
//! of catalog indices: the immutable genre pool (the starting point chosen
//! by genre-group selection) and the playback pool that tracks are served
//! from. Listeners steer the playback pool with directional feature
//! adjustments; the engine rebuilds the pool by replaying the filter queue,
//! mixing back a share of pre-filter tracks after every step and expanding
//! across genres when the pool runs too small.

pub mod filters;
pub mod registry;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{genre_group, Catalog};
use crate::models::TrackDetails;
use crate::utils::AppError;

pub use filters::{pool_mean, Direction, Feature, FilterRadii, FilterSpec};
pub use registry::EngineRegistry;

/// Tempo normalization bounds for distance calculations (BPM)
const TEMPO_MIN: f64 = 60.0;
const TEMPO_SPAN: f64 = 140.0;

/// Errors produced by the recommendation engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No genre pool selected")]
    NoGenrePool,

    #[error("Unknown genre group: {0}")]
    UnknownGenreGroup(String),

    #[error("Invalid adjustment value: {0}. Must be between 0 and 9")]
    InvalidAdjustment(u8),

    #[error("No tracks available in the current pool")]
    EmptyPool,

    #[error("Fresh injection ratio must be between 0.0 and 1.0, got {0}")]
    InvalidRatio(f64),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoGenrePool
            | EngineError::UnknownGenreGroup(_)
            | EngineError::InvalidAdjustment(_) => AppError::BadRequest(err.to_string()),
            EngineError::EmptyPool => AppError::NotFound(err.to_string()),
            EngineError::InvalidRatio(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

/// Engine tuning knobs, sourced from configuration
#[derive(Debug, Clone)]
pub struct EngineTuning {
    /// Filter radius for 0-1 scale features
    pub filter_radius: f64,
    /// Fractional filter radius for tempo
    pub tempo_radius_fraction: f64,
    /// Radius scale applied when a filter removes more than half the pool
    pub radius_multiplier_factor: f64,
    /// Below this pool size, cross-genre expansion kicks in
    pub minimum_pool_threshold: usize,
    /// Default share of pre-filter tracks mixed back after each filter
    pub default_injection_ratio: f64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            filter_radius: 0.1,
            tempo_radius_fraction: 0.15,
            radius_multiplier_factor: 0.5,
            minimum_pool_threshold: 50,
            default_injection_ratio: 0.3,
        }
    }
}

impl EngineTuning {
    fn radii(&self) -> FilterRadii {
        FilterRadii {
            base: self.filter_radius,
            tempo_fraction: self.tempo_radius_fraction,
        }
    }
}

/// Track selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Select near the pool's feature averages, avoiding extremes
    AverageCentered,
    /// Uniform random over unshown tracks
    Random,
}

/// A filter currently in the queue
#[derive(Debug, Clone)]
pub struct AppliedFilter {
    pub applied_at: DateTime<Utc>,
    pub spec: FilterSpec,
}

/// One entry in the adjustment history
#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentRecord {
    pub timestamp: DateTime<Utc>,
    pub adjustment_id: u8,
    pub feature: String,
    pub direction: String,
    pub pool_size_before: usize,
    pub pool_size_after: usize,
    pub averages_after: BTreeMap<String, f64>,
}

/// Result of an adjustment request
#[derive(Debug, Clone, Serialize)]
pub struct AdjustOutcome {
    /// Name of the requested filter, e.g. `increase_energy`
    pub filter: String,
    /// False when the request cancelled an opposing filter instead
    pub applied: bool,
    pub remaining_tracks: usize,
    pub filters_in_queue: usize,
}

/// Pool statistics for a session
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub total_tracks: usize,
    pub genre_pool_size: usize,
    pub playback_pool_size: usize,
    pub pool_reduction_pct: f64,
    pub filters_applied: usize,
    pub tracks_shown: usize,
    pub avg_stats: BTreeMap<String, f64>,
}

/// Per-session recommendation engine
pub struct PoolEngine {
    catalog: Arc<Catalog>,
    tuning: EngineTuning,
    genre_group: Option<String>,
    genre_pool: Vec<usize>,
    playback_pool: Vec<usize>,
    filter_queue: Vec<AppliedFilter>,
    shown: HashSet<String>,
    strategy: SelectionStrategy,
    injection_ratio: f64,
    history: Vec<AdjustmentRecord>,
}

impl PoolEngine {
    /// Create an engine with no genre pool selected yet
    pub fn new(catalog: Arc<Catalog>, tuning: EngineTuning) -> Self {
        let injection_ratio = tuning.default_injection_ratio;
        Self {
            catalog,
            tuning,
            genre_group: None,
            genre_pool: Vec::new(),
            playback_pool: Vec::new(),
            filter_queue: Vec::new(),
            shown: HashSet::new(),
            strategy: SelectionStrategy::AverageCentered,
            injection_ratio,
            history: Vec::new(),
        }
    }

    /// The currently selected genre group, if any
    pub fn genre_group(&self) -> Option<&str> {
        self.genre_group.as_deref()
    }

    /// Select a genre group and reset all steering state
    ///
    /// Returns the size of the resulting genre pool.
    pub fn set_genre_pool(&mut self, group: &str) -> Result<usize, EngineError> {
        let genres =
            genre_group(group).ok_or_else(|| EngineError::UnknownGenreGroup(group.to_string()))?;

        self.genre_pool = self.catalog.indices_for_genres(genres);
        self.playback_pool = self.genre_pool.clone();
        self.genre_group = Some(group.to_string());
        self.filter_queue.clear();
        self.history.clear();
        self.shown.clear();

        info!(
            group,
            pool_size = self.genre_pool.len(),
            "Genre pool selected"
        );
        Ok(self.genre_pool.len())
    }

    /// Queue an adjustment and rebuild the playback pool
    ///
    /// If the queue already holds the opposing direction for the same
    /// feature, both cancel: the existing filter is dropped and the new one
    /// is not added.
    pub fn adjust(&mut self, adjustment: u8) -> Result<AdjustOutcome, EngineError> {
        if self.genre_group.is_none() {
            return Err(EngineError::NoGenrePool);
        }
        let spec = FilterSpec::from_adjustment(adjustment)
            .ok_or(EngineError::InvalidAdjustment(adjustment))?;

        let contradicting = adjustment ^ 1;
        let had_contradiction = self
            .filter_queue
            .iter()
            .any(|f| f.spec.adjustment_id() == contradicting);

        let applied = if had_contradiction {
            self.filter_queue
                .retain(|f| f.spec.adjustment_id() != contradicting);
            info!(
                filter = %spec.name(),
                "Contradicting filter cancelled; both directions dropped"
            );
            false
        } else {
            self.filter_queue.push(AppliedFilter {
                applied_at: Utc::now(),
                spec,
            });
            true
        };

        let pool_size_before = self.playback_pool.len();
        self.rebuild_playback_pool();
        let pool_size_after = self.playback_pool.len();

        info!(
            filter = %spec.name(),
            applied,
            pool_size_before,
            pool_size_after,
            "Adjustment processed"
        );

        self.history.push(AdjustmentRecord {
            timestamp: Utc::now(),
            adjustment_id: adjustment,
            feature: spec.feature.name().to_string(),
            direction: spec.direction.name().to_string(),
            pool_size_before,
            pool_size_after,
            averages_after: self.pool_averages(&self.playback_pool),
        });

        Ok(AdjustOutcome {
            filter: spec.name(),
            applied,
            remaining_tracks: pool_size_after,
            filters_in_queue: self.filter_queue.len(),
        })
    }

    /// Rebuild the playback pool by replaying the filter queue
    fn rebuild_playback_pool(&mut self) {
        if self.genre_pool.is_empty() && self.genre_group.is_none() {
            warn!("Cannot rebuild playback pool: no genre pool set");
            return;
        }

        if self.filter_queue.is_empty() {
            self.playback_pool = self.genre_pool.clone();
            debug!(
                pool_size = self.playback_pool.len(),
                "No filters queued; playback pool reset to genre pool"
            );
            return;
        }

        let mut rng = rand::thread_rng();
        let radii = self.tuning.radii();
        let mut current = self.genre_pool.clone();

        for (step, applied) in self.filter_queue.iter().enumerate() {
            let spec = applied.spec;
            let before = current.len();

            // Dry-run at full radius to measure how hard the filter cuts
            let full = spec.apply(&self.catalog, &current, &radii);
            let reduction = reduction_rate(before, full.len());

            let filtered = if reduction > 0.5 {
                let relaxed = radii.scaled(self.tuning.radius_multiplier_factor);
                debug!(
                    filter = %spec.name(),
                    reduction = format!("{:.1}%", reduction * 100.0),
                    "Filter cut over half the pool; retrying with relaxed radius"
                );
                spec.apply(&self.catalog, &current, &relaxed)
            } else {
                full
            };

            if filtered.is_empty() {
                warn!(
                    step = step + 1,
                    filter = %spec.name(),
                    "Pool became empty; skipping remaining filters"
                );
                break;
            }

            current = self.mix_pools(&current, &filtered, &mut rng);
            debug!(
                step = step + 1,
                filter = %spec.name(),
                pool_size = current.len(),
                "Filter step complete"
            );
        }

        self.playback_pool = current;

        if self.playback_pool.len() < self.tuning.minimum_pool_threshold {
            self.expand_cross_genre(&mut rng);
        }

        if self.playback_pool.is_empty() {
            warn!("Playback pool empty after all filters; falling back to genre pool");
            self.playback_pool = self.genre_pool.clone();
        }
    }

    /// Mix a filtered result with its pre-filter pool
    ///
    /// The target size is the filtered size; `injection_ratio` of it is
    /// sampled from the old pool and the remainder from the filtered result.
    /// Shortfalls on the old side are made up from the filtered side.
    fn mix_pools<R: Rng>(&self, old_pool: &[usize], filtered: &[usize], rng: &mut R) -> Vec<usize> {
        if filtered.is_empty() {
            return old_pool.to_vec();
        }

        let target = filtered.len();
        let planned_old = (target as f64 * self.injection_ratio) as usize;
        let old_count = planned_old.min(old_pool.len());
        let mut new_count = target - planned_old;
        if old_count < planned_old {
            new_count = (new_count + planned_old - old_count).min(filtered.len());
        }

        let mut mixed = Vec::with_capacity(old_count + new_count);
        mixed.extend(sample_indices(old_pool, old_count, rng));
        mixed.extend(sample_indices(filtered, new_count, rng));
        mixed.shuffle(rng);

        debug!(
            old = old_count,
            new = new_count,
            ratio = self.injection_ratio,
            "Pools mixed"
        );
        mixed
    }

    /// Top the pool up with catalog-wide tracks near the catalog averages
    fn expand_cross_genre<R: Rng>(&mut self, rng: &mut R) {
        let needed = self
            .tuning
            .minimum_pool_threshold
            .saturating_sub(self.playback_pool.len());
        if needed == 0 {
            return;
        }

        let all: Vec<usize> = (0..self.catalog.len()).collect();
        let averages = self.raw_averages(&all);
        let candidates = self.within_radius(&all, &averages);

        if candidates.is_empty() {
            warn!("No catalog tracks within radius of catalog averages; expansion skipped");
            return;
        }

        let take = needed.min(candidates.len());
        let mut added = sample_indices(&candidates, take, rng);
        info!(
            added = added.len(),
            final_size = self.playback_pool.len() + added.len(),
            "Cross-genre expansion applied"
        );
        self.playback_pool.append(&mut added);
        self.playback_pool.shuffle(rng);
    }

    /// Serve the next recommended track
    pub fn next_track(&mut self) -> Result<TrackDetails, EngineError> {
        if self.genre_group.is_none() {
            return Err(EngineError::NoGenrePool);
        }

        let pool = if !self.playback_pool.is_empty() {
            self.playback_pool.clone()
        } else {
            self.genre_pool.clone()
        };
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }

        let mut rng = rand::thread_rng();

        // Exclude tracks already shown; once everything has been shown,
        // start over.
        let mut unshown: Vec<usize> = pool
            .iter()
            .copied()
            .filter(|&idx| {
                self.catalog
                    .track(idx)
                    .is_some_and(|t| !self.shown.contains(&t.track_id))
            })
            .collect();
        if unshown.is_empty() {
            info!(
                pool_size = pool.len(),
                "All tracks shown; resetting shown-track history"
            );
            self.shown.clear();
            unshown = pool.clone();
        }

        let chosen = match self.strategy {
            SelectionStrategy::AverageCentered => self.select_average_centered(&unshown, &mut rng),
            SelectionStrategy::Random => *unshown
                .choose(&mut rng)
                .ok_or(EngineError::EmptyPool)?,
        };

        let track = self.catalog.track(chosen).ok_or(EngineError::EmptyPool)?;
        self.shown.insert(track.track_id.clone());

        debug!(
            track = %track.track_name,
            artist = %track.artists,
            shown_total = self.shown.len(),
            "Track selected"
        );
        Ok(TrackDetails::from_track(chosen, track))
    }

    /// Pick a track near the unshown pool's feature averages
    ///
    /// Falls back to the closest tracks by feature distance when nothing
    /// lies within radius of every average.
    fn select_average_centered<R: Rng>(&self, unshown: &[usize], rng: &mut R) -> usize {
        let averages = self.raw_averages(unshown);
        let candidates = self.within_radius(unshown, &averages);

        if let Some(&idx) = candidates.choose(rng) {
            debug!(
                candidates = candidates.len(),
                "Radius-constrained selection"
            );
            return idx;
        }

        // Nothing within radius: rank by distance to the averages and pick
        // from the nearest 10%.
        let mut ranked: Vec<(usize, f64)> = unshown
            .iter()
            .filter_map(|&idx| self.catalog.track(idx).map(|t| (idx, t)))
            .map(|(idx, track)| {
                let dist: f64 = Feature::STEERING
                    .iter()
                    .map(|f| {
                        let (v, a) = if f.is_tempo() {
                            (
                                (f.value(track) - TEMPO_MIN) / TEMPO_SPAN,
                                (averages[f] - TEMPO_MIN) / TEMPO_SPAN,
                            )
                        } else {
                            (f.value(track), averages[f])
                        };
                        (v - a) * (v - a)
                    })
                    .sum::<f64>()
                    .sqrt();
                (idx, dist)
            })
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let fallback_size = (ranked.len() / 10).max(1);
        let pick = rng.gen_range(0..fallback_size);
        debug!(
            fallback_size,
            closest = ranked[0].1,
            "Fallback selection from closest unshown tracks"
        );
        ranked[pick].0
    }

    /// Tracks from `pool` within one radius of every steering average
    fn within_radius(&self, pool: &[usize], averages: &BTreeMap<Feature, f64>) -> Vec<usize> {
        let radii = self.tuning.radii();
        pool.iter()
            .copied()
            .filter(|&idx| {
                let Some(track) = self.catalog.track(idx) else {
                    return false;
                };
                Feature::STEERING.iter().all(|f| {
                    let avg = averages[f];
                    let radius = radii.for_feature(*f, avg);
                    (f.value(track) - avg).abs() <= radius
                })
            })
            .collect()
    }

    /// Unrounded steering-feature means over a pool
    fn raw_averages(&self, pool: &[usize]) -> BTreeMap<Feature, f64> {
        Feature::STEERING
            .iter()
            .map(|f| (*f, pool_mean(&self.catalog, pool, *f)))
            .collect()
    }

    /// Rounded steering-feature averages for API responses
    ///
    /// Tempo is rounded to one decimal, 0-1 features to three.
    fn pool_averages(&self, pool: &[usize]) -> BTreeMap<String, f64> {
        if pool.is_empty() {
            return BTreeMap::new();
        }
        Feature::STEERING
            .iter()
            .map(|f| {
                let mean = pool_mean(&self.catalog, pool, *f);
                let rounded = if f.is_tempo() {
                    (mean * 10.0).round() / 10.0
                } else {
                    (mean * 1000.0).round() / 1000.0
                };
                (f.name().to_string(), rounded)
            })
            .collect()
    }

    /// Current pool statistics
    pub fn stats(&self) -> PoolStats {
        let genre_size = self.genre_pool.len();
        let playback_size = self.playback_pool.len();
        let reduction_pct = if genre_size > 0 {
            let pct = (genre_size.saturating_sub(playback_size)) as f64 / genre_size as f64 * 100.0;
            (pct * 10.0).round() / 10.0
        } else {
            0.0
        };

        PoolStats {
            total_tracks: self.catalog.len(),
            genre_pool_size: genre_size,
            playback_pool_size: playback_size,
            pool_reduction_pct: reduction_pct,
            filters_applied: self.filter_queue.len(),
            tracks_shown: self.shown.len(),
            avg_stats: self.pool_averages(&self.playback_pool),
        }
    }

    /// Adjustment history, oldest first
    pub fn history(&self) -> &[AdjustmentRecord] {
        &self.history
    }

    /// Clear the filter queue, history and shown tracks; reset the playback
    /// pool to the genre pool
    pub fn reset(&mut self) {
        let filters = self.filter_queue.len();
        let shown = self.shown.len();
        self.filter_queue.clear();
        self.history.clear();
        self.shown.clear();

        if self.genre_group.is_some() {
            self.playback_pool = self.genre_pool.clone();
            info!(
                removed_filters = filters,
                cleared_shown = shown,
                pool_size = self.playback_pool.len(),
                "Session reset to genre pool"
            );
        } else {
            warn!("Reset requested but no genre pool selected");
        }
    }

    /// The current fresh injection ratio
    pub fn injection_ratio(&self) -> f64 {
        self.injection_ratio
    }

    /// Set the fresh injection ratio (share of pre-filter tracks kept)
    pub fn set_injection_ratio(&mut self, ratio: f64) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(EngineError::InvalidRatio(ratio));
        }
        self.injection_ratio = ratio;
        info!(ratio, "Fresh injection ratio updated");
        Ok(())
    }

    /// The current selection strategy
    pub fn selection_strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Switch between average-centered and random selection
    pub fn set_selection_strategy(&mut self, strategy: SelectionStrategy) {
        self.strategy = strategy;
        info!(?strategy, "Selection strategy updated");
    }
}

/// Fraction of the pool removed by a filter step
fn reduction_rate(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    before.saturating_sub(after) as f64 / before as f64
}

/// Sample `count` entries from a pool without replacement
fn sample_indices<R: Rng>(pool: &[usize], count: usize, rng: &mut R) -> Vec<usize> {
    let count = count.min(pool.len());
    index::sample(rng, pool.len(), count)
        .into_iter()
        .map(|i| pool[i])
        .collect()
}
