//! Profile registry.
//!
//! The loaded profiles live in an immutable snapshot behind an `Arc`. A
//! lookup clones the `Arc` under a short read lock; a reload builds a whole
//! new snapshot and swaps it in, so readers see either the old or the new
//! set, never a mix.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use mf_core::{Error, MediaKind, Result};

use crate::descriptor::ProfileSource;
use crate::profile::EncodingProfile;

type Snapshot = Arc<BTreeMap<String, Arc<EncodingProfile>>>;

#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: RwLock<Snapshot>,
}

impl ProfileRegistry {
    /// Bulk-load from a source.
    pub fn load(source: &dyn ProfileSource) -> Result<Self> {
        let snapshot = build_snapshot(source.load()?)?;
        tracing::info!(count = snapshot.len(), "Encoding profiles loaded");
        Ok(Self {
            profiles: RwLock::new(snapshot),
        })
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = EncodingProfile>) -> Result<Self> {
        Ok(Self {
            profiles: RwLock::new(build_snapshot(profiles)?),
        })
    }

    /// Replace the loaded set. On error the current set stays in place.
    pub fn reload(&self, source: &dyn ProfileSource) -> Result<usize> {
        let snapshot = build_snapshot(source.load()?)?;
        let count = snapshot.len();
        *self.profiles.write() = snapshot;
        tracing::info!(count, "Encoding profiles reloaded");
        Ok(count)
    }

    fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.profiles.read())
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<EncodingProfile>> {
        self.snapshot().get(identifier).cloned()
    }

    /// Look up a profile for input of the given kind.
    pub fn resolve(&self, identifier: &str, kind: MediaKind) -> Result<Arc<EncodingProfile>> {
        let profile = self
            .get(identifier)
            .ok_or_else(|| Error::profile_not_found(identifier))?;
        if !profile.accepts(kind) {
            return Err(Error::profile_not_applicable(identifier, kind));
        }
        Ok(profile)
    }

    /// All profiles, ordered by identifier.
    pub fn list(&self) -> Vec<Arc<EncodingProfile>> {
        self.snapshot().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

fn build_snapshot(profiles: impl IntoIterator<Item = EncodingProfile>) -> Result<Snapshot> {
    let mut map = BTreeMap::new();
    for profile in profiles {
        let id = profile.identifier.clone();
        if map.insert(id.clone(), Arc::new(profile)).is_some() {
            return Err(Error::Config(format!("duplicate encoding profile '{id}'")));
        }
    }
    Ok(Arc::new(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::StaticProfileSource;
    use assert_matches::assert_matches;

    fn registry() -> ProfileRegistry {
        ProfileRegistry::from_profiles([
            EncodingProfile::new("image-movie.work", MediaKind::Video, "-movie.mp4", "")
                .accepting([MediaKind::Image]),
            EncodingProfile::new("player-preview.http", MediaKind::Image, "-preview.jpg", "")
                .accepting([MediaKind::Video, MediaKind::AudioVideo]),
        ])
        .unwrap()
    }

    #[test]
    fn resolve_found() {
        let reg = registry();
        let p = reg.resolve("image-movie.work", MediaKind::Image).unwrap();
        assert_eq!(p.suffix, "-movie.mp4");
    }

    #[test]
    fn resolve_missing() {
        assert_matches!(
            registry().resolve("nope", MediaKind::Video),
            Err(Error::ProfileNotFound { id }) if id == "nope"
        );
    }

    #[test]
    fn resolve_inapplicable() {
        assert_matches!(
            registry().resolve("image-movie.work", MediaKind::Audio),
            Err(Error::ProfileNotApplicable { kind: MediaKind::Audio, .. })
        );
    }

    #[test]
    fn duplicates_rejected() {
        let p = EncodingProfile::new("dup", MediaKind::Video, ".mp4", "");
        assert_matches!(
            ProfileRegistry::from_profiles([p.clone(), p]),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn list_is_sorted() {
        let ids: Vec<_> = registry().list().iter().map(|p| p.identifier.clone()).collect();
        assert_eq!(ids, ["image-movie.work", "player-preview.http"]);
    }

    #[test]
    fn reload_swaps_snapshot() {
        let reg = registry();
        let held = reg.get("image-movie.work").unwrap();

        let source = StaticProfileSource(vec![EncodingProfile::new(
            "fresh",
            MediaKind::Video,
            ".mp4",
            "",
        )]);
        assert_eq!(reg.reload(&source).unwrap(), 1);

        assert!(reg.get("image-movie.work").is_none());
        assert!(reg.get("fresh").is_some());
        // Profiles handed out before the swap stay valid.
        assert_eq!(held.identifier, "image-movie.work");
    }

    #[test]
    fn failed_reload_keeps_current_set() {
        let reg = registry();
        let p = EncodingProfile::new("dup", MediaKind::Video, ".mp4", "");
        let source = StaticProfileSource(vec![p.clone(), p]);
        assert!(reg.reload(&source).is_err());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn concurrent_lookups_during_reload() {
        let reg = Arc::new(registry());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let n = reg.list().len();
                        assert!(n == 2 || n == 3);
                    }
                })
            })
            .collect();
        let source = StaticProfileSource(vec![
            EncodingProfile::new("a", MediaKind::Video, ".mp4", ""),
            EncodingProfile::new("b", MediaKind::Video, ".mp4", ""),
            EncodingProfile::new("c", MediaKind::Video, ".mp4", ""),
        ]);
        for _ in 0..50 {
            reg.reload(&source).unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
