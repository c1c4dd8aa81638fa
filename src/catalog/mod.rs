//! Track catalog
//!
//! Loads the track dataset from CSV at startup and provides read-only
//! lookups over it. The catalog is immutable once loaded and shared across
//! sessions via `Arc`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::index;
use rand::Rng;
use tracing::{info, warn};

use crate::models::Track;

/// Named genre groups presented to listeners
///
/// Each group maps to the `track_genre` labels it covers in the dataset.
pub const GENRE_GROUPS: &[(&str, &[&str])] = &[
    (
        "Pop & Mainstream",
        &[
            "pop", "power-pop", "dance", "dancehall", "edm", "synth-pop", "indie-pop", "j-pop",
            "k-pop", "mandopop", "cantopop", "latin", "latino", "swedish", "party", "pop-film",
            "show-tunes", "romance",
        ],
    ),
    (
        "Rock & Alternative",
        &[
            "rock", "alt-rock", "alternative", "punk", "punk-rock", "hard-rock", "metal",
            "heavy-metal", "metalcore", "death-metal", "black-metal", "grindcore", "emo",
            "grunge", "psych-rock", "rock-n-roll", "rockabilly", "british", "indie", "garage",
            "industrial",
        ],
    ),
    (
        "Hip-Hop, R&B & Soul",
        &["hip-hop", "r-n-b", "soul", "funk", "groove", "gospel"],
    ),
    (
        "Electronic & Dance",
        &[
            "electronic", "house", "deep-house", "progressive-house", "techno", "minimal-techno",
            "trance", "dubstep", "electro", "detroit-techno", "chicago-house", "idm",
            "drum-and-bass", "dub", "breakbeat", "trip-hop", "club",
        ],
    ),
    (
        "Classical, Jazz & Instrumental",
        &[
            "classical", "jazz", "piano", "ambient", "acoustic", "new-age", "sleep", "study",
            "songwriter", "singer-songwriter", "guitar",
        ],
    ),
    (
        "World & Regional",
        &[
            "afrobeat", "brazil", "french", "german", "indian", "iranian", "j-dance", "j-rock",
            "malay", "spanish", "turkish", "world-music", "samba", "salsa", "forro", "pagode",
            "mpb", "sertanejo", "tango",
        ],
    ),
    (
        "Country, Folk & Roots",
        &["country", "bluegrass", "honky-tonk", "folk"],
    ),
    (
        "Niche, Thematic & Other",
        &[
            "anime", "children", "kids", "comedy", "disney", "opera", "happy", "sad", "chill",
            "party", "show-tunes",
        ],
    ),
];

/// Look up the genres of a genre group by name
pub fn genre_group(name: &str) -> Option<&'static [&'static str]> {
    GENRE_GROUPS
        .iter()
        .find(|(group, _)| *group == name)
        .map(|(_, genres)| *genres)
}

/// The in-memory track catalog
#[derive(Debug)]
pub struct Catalog {
    tracks: Vec<Track>,
    by_track_id: HashMap<String, usize>,
    distinct_genres: Vec<String>,
}

impl Catalog {
    /// Load the catalog from a CSV file
    ///
    /// Rows that fail to deserialize (missing columns, unparsable feature
    /// values) are skipped with a warning rather than aborting startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open catalog file: {:?}", path))?;

        let mut tracks = Vec::new();
        let mut skipped = 0usize;

        for (line, record) in reader.deserialize::<Track>().enumerate() {
            match record {
                Ok(track) => tracks.push(track),
                Err(e) => {
                    skipped += 1;
                    warn!(line = line + 2, error = %e, "Skipping unparsable catalog row");
                }
            }
        }

        if tracks.is_empty() {
            anyhow::bail!("Catalog file {:?} contains no usable tracks", path);
        }

        if skipped > 0 {
            warn!(skipped, "Catalog rows skipped during load");
        }
        info!(tracks = tracks.len(), path = ?path, "Catalog loaded");

        Ok(Self::from_tracks(tracks))
    }

    /// Build a catalog from already-parsed tracks
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let mut by_track_id = HashMap::with_capacity(tracks.len());
        let mut seen_genres = HashSet::new();
        let mut distinct_genres = Vec::new();

        for (idx, track) in tracks.iter().enumerate() {
            // First occurrence wins; datasets can repeat a track across genres
            by_track_id.entry(track.track_id.clone()).or_insert(idx);
            if seen_genres.insert(track.track_genre.clone()) {
                distinct_genres.push(track.track_genre.clone());
            }
        }

        Self {
            tracks,
            by_track_id,
            distinct_genres,
        }
    }

    /// Number of tracks in the catalog
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Get a track by catalog row index
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Find a track (and its row index) by its dataset track id
    pub fn find_by_track_id(&self, track_id: &str) -> Option<(usize, &Track)> {
        self.by_track_id
            .get(track_id)
            .map(|&idx| (idx, &self.tracks[idx]))
    }

    /// All distinct `track_genre` labels, in first-seen order
    pub fn distinct_genres(&self) -> &[String] {
        &self.distinct_genres
    }

    /// Collect the row indices of all tracks whose genre is in `genres`
    pub fn indices_for_genres(&self, genres: &[&str]) -> Vec<usize> {
        let wanted: HashSet<&str> = genres.iter().copied().collect();
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| wanted.contains(t.track_genre.as_str()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Pick up to `count` distinct genres at random
    pub fn random_genres<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<String> {
        let n = count.min(self.distinct_genres.len());
        index::sample(rng, self.distinct_genres.len(), n)
            .into_iter()
            .map(|i| self.distinct_genres[i].clone())
            .collect()
    }
}
