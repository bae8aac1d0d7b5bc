//! Fair keyword rotation with durable state.
//!
//! Each run takes keywords from the front of a persisted "remaining" list.
//! When the list runs short, a fresh shuffle of the whole pool tops it up and
//! its unused tail becomes the next remaining list, so every keyword is used
//! once per cycle before any repeats.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use snsdb_core::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("keyword pool is empty")]
    EmptyPool,

    #[error("failed to write rotation state {path}: {source}")]
    StateWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize rotation state: {0}")]
    StateSerialize(#[from] serde_json::Error),
}

/// Persisted rotation document: `{"remaining": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    #[serde(default)]
    pub remaining: Vec<String>,
}

/// Where rotation state lives between runs.
pub trait CycleStateRepo {
    /// Never fails: unreadable or invalid state reads as empty.
    fn load(&self) -> CycleState;

    /// # Errors
    ///
    /// Returns [`RotationError`] when the state cannot be written.
    fn save(&self, state: &CycleState) -> Result<(), RotationError>;
}

/// Rotation state stored as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileCycleState {
    path: PathBuf,
}

impl FileCycleState {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/.keyword_cycle_<platform>.json`
    #[must_use]
    pub fn for_platform(dir: &Path, platform: Platform) -> Self {
        Self::new(dir.join(format!(".keyword_cycle_{platform}.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CycleStateRepo for FileCycleState {
    fn load(&self) -> CycleState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CycleState::default(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "rotation state unreadable; starting a fresh cycle"
                );
                return CycleState::default();
            }
        };

        match serde_json::from_str::<CycleState>(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "rotation state is not valid JSON; starting a fresh cycle"
                );
                CycleState::default()
            }
        }
    }

    fn save(&self, state: &CycleState) -> Result<(), RotationError> {
        let body = serde_json::to_string_pretty(state)?;
        let write_err = |source| RotationError::StateWrite {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        // Write-then-rename so a crash never leaves a truncated document.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// Select `count` keywords from `pool`, advancing `state`.
///
/// Remaining entries no longer in the pool are dropped. `count` is clamped to
/// the pool size. When the carried-over remainder is short, the top-up from
/// the fresh shuffle skips keywords already taken this run; they stay in the
/// new remainder instead, so one run never repeats a keyword.
///
/// # Errors
///
/// Returns [`RotationError::EmptyPool`] if the pool has no keywords.
pub fn pick<R: Rng + ?Sized>(
    pool: &[String],
    count: usize,
    state: CycleState,
    rng: &mut R,
) -> Result<(Vec<String>, CycleState), RotationError> {
    let mut seen_pool = HashSet::new();
    let pool: Vec<&String> = pool.iter().filter(|k| seen_pool.insert(k.as_str())).collect();
    if pool.is_empty() {
        return Err(RotationError::EmptyPool);
    }
    let count = count.min(pool.len());

    let mut seen = HashSet::new();
    let mut remaining: Vec<String> = state
        .remaining
        .into_iter()
        .filter(|k| seen_pool.contains(k.as_str()) && seen.insert(k.clone()))
        .collect();

    if remaining.len() >= count {
        let rest = remaining.split_off(count);
        return Ok((remaining, CycleState { remaining: rest }));
    }

    let mut selected = remaining;
    let mut fresh: Vec<String> = pool.into_iter().cloned().collect();
    fresh.shuffle(rng);

    let mut tail = Vec::with_capacity(fresh.len());
    for kw in fresh {
        if selected.len() < count && !selected.contains(&kw) {
            selected.push(kw);
        } else {
            tail.push(kw);
        }
    }

    Ok((selected, CycleState { remaining: tail }))
}

/// Load-pick-save wrapper around [`pick`] for one persisted rotation.
pub struct KeywordRotation<S> {
    repo: S,
}

impl<S: CycleStateRepo> KeywordRotation<S> {
    pub fn new(repo: S) -> Self {
        Self { repo }
    }

    /// Pick this run's keywords and persist the advanced state.
    ///
    /// A failed save is logged, not returned: the run proceeds with its
    /// selection and the next run may repeat some keywords.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::EmptyPool`] if the pool has no keywords.
    pub fn pick(&self, pool: &[String], count: usize) -> Result<Vec<String>, RotationError> {
        self.pick_with_rng(pool, count, &mut rand::rng())
    }

    /// As [`KeywordRotation::pick`], with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::EmptyPool`] if the pool has no keywords.
    pub fn pick_with_rng<R: Rng + ?Sized>(
        &self,
        pool: &[String],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<String>, RotationError> {
        let (selected, next) = pick(pool, count, self.repo.load(), rng)?;
        if let Err(e) = self.repo.save(&next) {
            tracing::warn!(error = %e, "failed to persist keyword rotation state");
        }
        Ok(selected)
    }

    /// Keywords still queued in the current cycle, restricted to `pool`.
    pub fn pending(&self, pool: &[String]) -> Vec<String> {
        let members: HashSet<&str> = pool.iter().map(String::as_str).collect();
        self.repo
            .load()
            .remaining
            .into_iter()
            .filter(|k| members.contains(k.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[derive(Default)]
    struct MemoryRepo {
        state: RefCell<CycleState>,
    }

    impl CycleStateRepo for MemoryRepo {
        fn load(&self) -> CycleState {
            self.state.borrow().clone()
        }

        fn save(&self, state: &CycleState) -> Result<(), RotationError> {
            *self.state.borrow_mut() = state.clone();
            Ok(())
        }
    }

    fn pool(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("snsdb-rotation-{}-{name}", std::process::id()))
            .join("state.json")
    }

    #[test]
    fn every_keyword_once_per_cycle() {
        let pool = pool(&["a", "b", "c", "d", "e"]);
        let rotation = KeywordRotation::new(MemoryRepo::default());
        let mut rng = StdRng::seed_from_u64(42);

        // 2+3+1+4+3+2 = 15 = three full cycles.
        let mut history = Vec::new();
        for count in [2, 3, 1, 4, 3, 2] {
            history.extend(rotation.pick_with_rng(&pool, count, &mut rng).unwrap());
        }

        for cycle in history.chunks(pool.len()) {
            let mut seen: Vec<&String> = cycle.iter().collect();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), pool.len(), "cycle repeated a keyword: {cycle:?}");
        }
    }

    #[test]
    fn selection_never_repeats_within_a_run() {
        let pool = pool(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(7);
        for seed_state in [vec!["c"], vec!["a"], vec!["b"]] {
            let state = CycleState {
                remaining: seed_state.iter().map(|s| (*s).to_string()).collect(),
            };
            let (selected, next) = pick(&pool, 3, state, &mut rng).unwrap();
            let mut unique = selected.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), 3, "duplicate in {selected:?}");
            // The carried keyword stays queued for the fresh cycle.
            assert_eq!(next.remaining.len(), 1);
            assert_eq!(next.remaining[0], seed_state[0]);
        }
    }

    #[test]
    fn takes_front_of_remaining_when_enough() {
        let pool = pool(&["a", "b", "c", "d"]);
        let state = CycleState {
            remaining: pool.clone(),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let (selected, next) = pick(&pool, 3, state, &mut rng).unwrap();
        assert_eq!(selected, vec!["a", "b", "c"]);
        assert_eq!(next.remaining, vec!["d"]);
    }

    #[test]
    fn drops_keywords_no_longer_in_pool() {
        let pool = pool(&["a", "b"]);
        let state = CycleState {
            remaining: vec!["gone".into(), "b".into(), "b".into(), "old".into()],
        };
        let mut rng = StdRng::seed_from_u64(3);
        let (selected, _) = pick(&pool, 1, state, &mut rng).unwrap();
        assert_eq!(selected, vec!["b"]);
    }

    #[test]
    fn empty_pool_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = pick(&[], 3, CycleState::default(), &mut rng);
        assert!(matches!(result, Err(RotationError::EmptyPool)));
    }

    #[test]
    fn count_is_clamped_to_pool_size() {
        let pool = pool(&["a", "b"]);
        let mut rng = StdRng::seed_from_u64(9);
        let (selected, next) = pick(&pool, 10, CycleState::default(), &mut rng).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(next.remaining.is_empty());
    }

    #[test]
    fn shuffle_order_varies_between_cycles() {
        let pool = pool(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let mut rng = StdRng::seed_from_u64(11);
        let orders: Vec<Vec<String>> = (0..6)
            .map(|_| pick(&pool, 8, CycleState::default(), &mut rng).unwrap().0)
            .collect();
        let mut counts: HashMap<&Vec<String>, usize> = HashMap::new();
        for o in &orders {
            *counts.entry(o).or_default() += 1;
        }
        assert!(counts.len() > 1, "six shuffles produced one order");
    }

    #[test]
    fn file_state_roundtrip_and_corruption() {
        let path = temp_path("roundtrip");
        let repo = FileCycleState::new(&path);
        assert_eq!(repo.load(), CycleState::default());

        let state = CycleState {
            remaining: vec!["グルメ".into(), "コスメ".into()],
        };
        repo.save(&state).unwrap();
        assert_eq!(repo.load(), state);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("グルメ"), "keywords should be stored unescaped");

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(repo.load(), CycleState::default());

        std::fs::write(&path, r#"{"other": 1}"#).unwrap();
        assert_eq!(repo.load(), CycleState::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn rotation_persists_between_instances() {
        let path = temp_path("persist");
        let pool = pool(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(5);

        let first = KeywordRotation::new(FileCycleState::new(&path))
            .pick_with_rng(&pool, 2, &mut rng)
            .unwrap();
        let rotation = KeywordRotation::new(FileCycleState::new(&path));
        let pending = rotation.pending(&pool);
        assert_eq!(pending.len(), 1);
        assert!(!first.contains(&pending[0]));

        let second = rotation.pick_with_rng(&pool, 1, &mut rng).unwrap();
        assert_eq!(second, pending);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn platform_state_file_name() {
        let repo = FileCycleState::for_platform(Path::new("/var/lib/snsdb"), Platform::Tiktok);
        assert_eq!(
            repo.path(),
            Path::new("/var/lib/snsdb/.keyword_cycle_tiktok.json")
        );
    }
}
