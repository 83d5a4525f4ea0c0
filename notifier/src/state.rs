//! The state that survives restarts, and the file it lives in.

use crate::schedule::{NEVER, ScheduleTracker};
use crate::youtube_api::BroadcastLifeCycleStatus;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A broadcast we have seen before, as of the last time we looked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownStream {
    pub id: String,
    pub status: BroadcastLifeCycleStatus,
    /// Scheduled start in epoch seconds, or 0 if unknown.
    pub start_time: i64,
}

impl KnownStream {
    pub fn new(id: impl Into<String>, status: BroadcastLifeCycleStatus, start_time: i64) -> Self {
        Self {
            id: id.into(),
            status,
            start_time,
        }
    }
}

/// Everything the notifier remembers between polls (and between runs).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StateFileFormat", into = "StateFileFormat")]
pub struct PersistedState {
    pub streams: BTreeMap<String, KnownStream>,
    pub schedule: ScheduleTracker,
}

/// On-disk layout of [`PersistedState`].
///
/// The next event is stored flattened, with [`NEVER`] as `nextTime` when there is none.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFileFormat {
    #[serde(default)]
    streams: BTreeMap<String, KnownStream>,
    #[serde(default)]
    next_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_id: Option<String>,
}

impl From<StateFileFormat> for PersistedState {
    fn from(file: StateFileFormat) -> Self {
        let streams = file
            .streams
            .into_iter()
            .map(|(key, stream)| {
                if key != stream.id {
                    tracing::warn!(key = %key, broadcast = %stream.id, "state file entry stored under the wrong key");
                }
                (stream.id.clone(), stream)
            })
            .collect();

        // without an id, whatever time is stored doesn't belong to anything, and an id that is
        // never due isn't worth tracking
        let schedule = match file.next_id {
            Some(id) if file.next_time != NEVER => ScheduleTracker::tracking(id, file.next_time),
            _ => ScheduleTracker::default(),
        };

        Self { streams, schedule }
    }
}

impl From<PersistedState> for StateFileFormat {
    fn from(state: PersistedState) -> Self {
        Self {
            next_time: state.schedule.next_time(),
            next_id: state.schedule.next_id().map(str::to_string),
            streams: state.streams,
        }
    }
}

/// The JSON file [`PersistedState`] is kept in.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> eyre::Result<PersistedState> {
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read state file {}", self.path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("parse state file {}", self.path.display()))
    }

    /// Loads the saved state, falling back to a fresh one if there is no usable state file.
    pub async fn load_or_default(&self) -> PersistedState {
        match self.load().await {
            Ok(state) => {
                tracing::info!(
                    path = %self.path.display(),
                    streams = state.streams.len(),
                    next = ?state.schedule.next_id(),
                    "loaded saved state"
                );
                state
            }
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound) =>
            {
                tracing::info!(path = %self.path.display(), "no saved state, starting fresh");
                PersistedState::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "unusable saved state, starting fresh: {e:#}");
                PersistedState::default()
            }
        }
    }

    /// Writes the state out, replacing the previous file only once the new one is complete.
    pub async fn save(&self, state: &PersistedState) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create state directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(state).context("serialize state")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("write state to {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("move state into place at {}", self.path.display()))?;

        tracing::trace!(path = %self.path.display(), "saved state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BroadcastLifeCycleStatus as S;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn sample() -> PersistedState {
        let mut state = PersistedState::default();
        for stream in [
            KnownStream::new("upcoming", S::Ready, 1714672800),
            KnownStream::new("old", S::Complete, 1714000000),
        ] {
            state.streams.insert(stream.id.clone(), stream);
        }
        state.schedule = ScheduleTracker::tracking("upcoming", 1714672800);
        state
    }

    #[test]
    fn test_file_format() {
        assert_snapshot!(serde_json::to_string_pretty(&sample()).unwrap(), @r#"
        {
          "streams": {
            "old": {
              "id": "old",
              "status": "complete",
              "startTime": 1714000000
            },
            "upcoming": {
              "id": "upcoming",
              "status": "ready",
              "startTime": 1714672800
            }
          },
          "nextTime": 1714672800,
          "nextId": "upcoming"
        }
        "#);
    }

    #[test]
    fn test_nothing_next_is_stored_as_never() {
        let json = serde_json::to_string(&PersistedState::default()).unwrap();
        assert_snapshot!(json, @r#"{"streams":{},"nextTime":9223372036854775807}"#);
        assert_eq!(
            serde_json::from_str::<PersistedState>(&json).unwrap(),
            PersistedState::default()
        );
    }

    #[test]
    fn test_missing_next_id_forces_never() {
        let state: PersistedState =
            serde_json::from_str(r#"{"streams":{},"nextTime":1714672800}"#).unwrap();
        assert_eq!(state.schedule.next_id(), None);
        assert_eq!(state.schedule.next_time(), NEVER);
    }

    #[test]
    fn test_next_id_without_next_time_is_due_at_zero() {
        let state: PersistedState =
            serde_json::from_str(r#"{"streams":{},"nextId":"a"}"#).unwrap();
        assert_eq!(state.schedule, ScheduleTracker::tracking("a", 0));
        assert_snapshot!(
            serde_json::to_string(&state).unwrap(),
            @r#"{"streams":{},"nextTime":0,"nextId":"a"}"#
        );
    }

    #[test]
    fn test_next_id_at_never_is_dropped() {
        let state: PersistedState = serde_json::from_str(
            r#"{"streams":{},"nextTime":9223372036854775807,"nextId":"a"}"#,
        )
        .unwrap();
        assert_eq!(state.schedule, ScheduleTracker::default());
        assert_snapshot!(
            serde_json::to_string(&state).unwrap(),
            @r#"{"streams":{},"nextTime":9223372036854775807}"#
        );
    }

    #[test]
    fn test_keys_follow_stream_ids() {
        let state: PersistedState = serde_json::from_str(
            r#"{"streams":{"wrong":{"id":"right","status":"live","startTime":5}},"nextTime":5,"nextId":"right"}"#,
        )
        .unwrap();
        assert_eq!(
            state.streams.keys().collect::<Vec<_>>(),
            vec![&"right".to_string()]
        );
        assert_eq!(state.streams["right"].status, S::Live);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("persist").join("data.json"));

        file.save(&sample()).await.unwrap();
        assert_eq!(file.load().await.unwrap(), sample());
        assert!(!dir.path().join("persist").join("data.json.tmp").exists());

        // saving again replaces the old contents
        file.save(&PersistedState::default()).await.unwrap();
        assert_eq!(file.load().await.unwrap(), PersistedState::default());
    }

    #[tokio::test]
    async fn test_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("data.json"));
        assert!(file.load().await.is_err());
        assert_eq!(file.load_or_default().await, PersistedState::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let file = StateFile::new(&path);
        let err = file.load().await.unwrap_err();
        assert!(format!("{err}").starts_with("parse state file"));
        assert_eq!(file.load_or_default().await, PersistedState::default());
    }

    #[tokio::test]
    async fn test_save_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a file where the parent directory should be
        let blocker = dir.path().join("persist");
        std::fs::write(&blocker, "").unwrap();

        let file = StateFile::new(blocker.join("data.json"));
        assert!(file.save(&sample()).await.is_err());
    }
}
