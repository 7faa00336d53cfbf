//! Alternate-track lookup: where does `test alpha cfg get` live in GA, or
//! `test cfg get` in BETA? Pure path arithmetic; use
//! [`AlternateTrackResolver::existing`] to keep only paths that resolve.

use crate::model::{CommandPath, ReleaseTrack};
use crate::tree::CommandTree;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct AlternateTrackResolver {
    tracks: Vec<ReleaseTrack>,
}

impl AlternateTrackResolver {
    /// GA is implied and ignored if listed.
    pub fn new(tracks: impl IntoIterator<Item = ReleaseTrack>) -> Self {
        let mut registered: Vec<ReleaseTrack> = Vec::new();
        for track in tracks {
            if track != ReleaseTrack::Ga && !registered.contains(&track) {
                registered.push(track);
            }
        }
        Self { tracks: registered }
    }

    pub fn for_tree(tree: &CommandTree) -> Self {
        Self::new(tree.registered_tracks())
    }

    pub fn tracks(&self) -> &[ReleaseTrack] {
        &self.tracks
    }

    /// The track a path belongs to, by its second segment.
    pub fn track_of(&self, path: &CommandPath) -> ReleaseTrack {
        path.segments()
            .get(1)
            .and_then(|segment| ReleaseTrack::from_prefix(segment))
            .filter(|track| self.tracks.contains(track))
            .unwrap_or(ReleaseTrack::Ga)
    }

    /// Counterparts of `path` under every other track. Never contains the
    /// path's own track.
    pub fn alternates(&self, path: &CommandPath) -> BTreeMap<ReleaseTrack, CommandPath> {
        let mut result = BTreeMap::new();
        let segments = path.segments();
        if segments.len() <= 1 {
            return result;
        }

        let own = self.track_of(path);
        let (root, rest) = match own {
            ReleaseTrack::Ga => (&segments[0], &segments[1..]),
            _ => (&segments[0], &segments[2..]),
        };

        let with_track = |track: ReleaseTrack| {
            let mut alternate = vec![root.clone()];
            if let Some(prefix) = track.prefix() {
                alternate.push(prefix.to_string());
            }
            alternate.extend(rest.iter().cloned());
            CommandPath::new(alternate)
        };

        if own != ReleaseTrack::Ga {
            result.insert(ReleaseTrack::Ga, with_track(ReleaseTrack::Ga));
        }
        for track in &self.tracks {
            if *track != own {
                result.insert(*track, with_track(*track));
            }
        }
        result
    }

    /// [`alternates`](Self::alternates) filtered to paths present in `tree`,
    /// hidden ones included.
    pub fn existing(
        &self,
        tree: &CommandTree,
        path: &CommandPath,
    ) -> BTreeMap<ReleaseTrack, CommandPath> {
        self.alternates(path)
            .into_iter()
            .filter(|(_, alternate)| tree.resolve_path(alternate).is_some())
            .collect()
    }
}
