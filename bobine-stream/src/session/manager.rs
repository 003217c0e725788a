//! Encoder session lifecycle.
//!
//! A session is one external encoder process plus its output directory and
//! bookkeeping, keyed by `(asset, quality)` so concurrent viewers of the
//! same rendition share one encode. The registry mutex guards insert,
//! lookup and removal only; process waits and directory cleanup happen
//! outside it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use bobine_core::config::TranscodeConfig;
use bobine_core::models::{MediaAsset, SubtitleTrack, UserId, VideoCodec};
use bobine_core::service::{LoopHandle, TranscodeMonitor};

use crate::playback::{PlaybackPlan, VideoDisposition};
use crate::quality::QualityLevel;
use crate::session::args::{hls_transcode_args, HlsJob};
use crate::session::hwaccel::{HardwareEncoderCache, TargetCodec};
use crate::session::process::{spawn_stderr_drain, StderrTail};
use crate::{Result, StreamError};

/// Registry key. Deliberately `(asset, quality)` and not `(user, asset,
/// quality)`: the output is deterministic in these two inputs, so users
/// share sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub asset_id: bobine_core::models::AssetId,
    pub quality: QualityLevel,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.asset_id, self.quality)
    }
}

pub struct EncoderSession {
    key: SessionKey,
    owner: UserId,
    output_dir: PathBuf,
    start_secs: f64,
    started_at: Instant,
    last_accessed: Mutex<Instant>,
    segments_ready: AtomicUsize,
    stderr_tail: StderrTail,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    waiter: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl EncoderSession {
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    #[must_use]
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    #[must_use]
    pub fn start_secs(&self) -> f64 {
        self.start_secs
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join("stream.m3u8")
    }

    /// Resolve a segment file inside the session directory. Rejects names
    /// that would escape it.
    #[must_use]
    pub fn segment_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.output_dir.join(name))
    }

    #[must_use]
    pub fn segments_ready(&self) -> usize {
        self.segments_ready.load(Ordering::Relaxed)
    }

    /// Last ~1 KB of the encoder's stderr.
    #[must_use]
    pub fn error_log(&self) -> String {
        self.stderr_tail.contents()
    }

    pub fn touch(&self) {
        *self.last_accessed.lock() = Instant::now();
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_accessed.lock().elapsed()
    }

    /// Kill the child (if still running) and wait for its waiter task, so
    /// the process is reaped before the directory goes away.
    async fn shutdown(&self) {
        if let Some(tx) = self.kill_tx.lock().take() {
            let _ = tx.send(());
        }
        let handle = self.waiter.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(key = %self.key, "session waiter panicked: {}", e);
            }
        }
    }
}

pub struct SessionManager {
    ffmpeg_path: PathBuf,
    output_root: PathBuf,
    segment_seconds: u32,
    ttl: Duration,
    cleanup_interval: Duration,
    hw_cache: Arc<HardwareEncoderCache>,
    sessions: Mutex<HashMap<SessionKey, Arc<EncoderSession>>>,
    // Serializes session creation so two first requests for a key spawn
    // exactly one encoder.
    create_lock: tokio::sync::Mutex<()>,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: &TranscodeConfig, hw_cache: Arc<HardwareEncoderCache>) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            output_root: config.output_dir.clone(),
            segment_seconds: config.segment_seconds,
            ttl: Duration::from_secs(config.session_ttl_seconds),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_seconds),
            hw_cache,
            sessions: Mutex::new(HashMap::new()),
            create_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Look up a live session, bumping its access time.
    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<Arc<EncoderSession>> {
        let sessions = self.sessions.lock();
        let session = sessions.get(key).cloned();
        if let Some(ref s) = session {
            s.touch();
        }
        session
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Return the session for `(asset, quality)`, spawning the encoder on
    /// first request. A request with a different start offset stops the
    /// old session and starts a fresh one (HLS seek).
    pub async fn get_or_create(
        &self,
        asset: &MediaAsset,
        plan: &PlaybackPlan,
        subtitles: &[SubtitleTrack],
        user: &UserId,
    ) -> Result<Arc<EncoderSession>> {
        let key = SessionKey {
            asset_id: asset.id.clone(),
            quality: plan.quality,
        };

        if let Some(session) = self.get(&key) {
            if (session.start_secs - plan.start_secs).abs() < 0.5 {
                return Ok(session);
            }
            debug!(key = %key, "seek requested, restarting session");
            // A concurrent stop may have beaten us to the key.
            let _ = self.stop(&key).await;
        }

        let _create = self.create_lock.lock().await;
        // Another request may have finished creating while we waited.
        if let Some(session) = self.get(&key) {
            if (session.start_secs - plan.start_secs).abs() < 0.5 {
                return Ok(session);
            }
            // Recreated at a different offset while we waited; replace it.
            let _ = self.stop(&key).await;
        }

        let session = self.spawn_session(key.clone(), asset, plan, subtitles, user).await?;
        self.sessions.lock().insert(key.clone(), session.clone());
        bobine_core::metrics::TRANSCODES_ACTIVE.set(self.active_count() as i64);
        info!(key = %key, dir = %session.output_dir.display(), "encoder session started");
        Ok(session)
    }

    async fn spawn_session(
        &self,
        key: SessionKey,
        asset: &MediaAsset,
        plan: &PlaybackPlan,
        subtitles: &[SubtitleTrack],
        user: &UserId,
    ) -> Result<Arc<EncoderSession>> {
        let output_dir = self
            .output_root
            .join(format!("{}_{}", key.asset_id, key.quality));
        tokio::fs::create_dir_all(&output_dir).await?;

        let target = match plan.video {
            VideoDisposition::Encode {
                codec: VideoCodec::Hevc,
                ..
            } => TargetCodec::Hevc,
            _ => TargetCodec::H264,
        };
        let encoder = self.hw_cache.encoder_for(target).await;

        let job = HlsJob {
            asset,
            plan,
            encoder: &encoder,
            subtitles,
            output_dir: &output_dir,
            segment_seconds: self.segment_seconds,
        };
        let args = match hls_transcode_args(&job) {
            Ok(args) => args,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&output_dir).await;
                return Err(e);
            }
        };

        let spawned = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&output_dir).await;
                return Err(StreamError::SpawnFailed(e.to_string()));
            }
        };

        let stderr_tail = child
            .stderr
            .take()
            .map(spawn_stderr_drain)
            .unwrap_or_default();

        let (kill_tx, kill_rx) = oneshot::channel();
        let now = Instant::now();
        let session = Arc::new(EncoderSession {
            key: key.clone(),
            owner: user.clone(),
            output_dir: output_dir.clone(),
            start_secs: plan.start_secs,
            started_at: now,
            last_accessed: Mutex::new(now),
            segments_ready: AtomicUsize::new(0),
            stderr_tail,
            kill_tx: Mutex::new(Some(kill_tx)),
            waiter: tokio::sync::Mutex::new(None),
        });

        let waiter_session = session.clone();
        let waiter = tokio::spawn(async move {
            let mut kill_rx = kill_rx;
            let (status, killed) = tokio::select! {
                status = child.wait() => (status.ok(), false),
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    (child.wait().await.ok(), true)
                }
            };

            let ready = count_segments(&waiter_session.output_dir).await;
            waiter_session.segments_ready.store(ready, Ordering::Relaxed);

            match status {
                Some(status) if status.success() || killed => {
                    debug!(key = %waiter_session.key, segments = ready, killed, "encoder exited");
                }
                Some(status) => {
                    bobine_core::metrics::TRANSCODE_FAILURES_TOTAL.inc();
                    warn!(
                        key = %waiter_session.key,
                        %status,
                        tail = %waiter_session.error_log(),
                        "encoder exited with error"
                    );
                }
                None => warn!(key = %waiter_session.key, "encoder wait failed"),
            }
        });
        *session.waiter.lock().await = Some(waiter);

        Ok(session)
    }

    /// Explicitly stop a session: remove the key, kill and reap the child,
    /// delete the output directory.
    pub async fn stop(&self, key: &SessionKey) -> Result<()> {
        let removed = self.sessions.lock().remove(key);
        let Some(session) = removed else {
            return Err(StreamError::SessionNotFound(key.to_string()));
        };
        bobine_core::metrics::TRANSCODES_ACTIVE.set(self.active_count() as i64);
        self.teardown(session).await;
        Ok(())
    }

    /// Stop every session; used on shutdown.
    pub async fn stop_all(&self) {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.lock();
            sessions.drain().map(|(_, s)| s).collect()
        };
        bobine_core::metrics::TRANSCODES_ACTIVE.set(0);
        for session in drained {
            self.teardown(session).await;
        }
    }

    async fn teardown(&self, session: Arc<EncoderSession>) {
        session.shutdown().await;
        if let Err(e) = tokio::fs::remove_dir_all(&session.output_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %session.output_dir.display(), "failed to remove session dir: {}", e);
            }
        }
        info!(key = %session.key, "encoder session torn down");
    }

    /// Remove and tear down sessions idle past the TTL.
    pub async fn sweep_idle(&self) {
        let expired: Vec<_> = {
            let mut sessions = self.sessions.lock();
            let keys: Vec<_> = sessions
                .iter()
                .filter(|(_, s)| s.idle_for() > self.ttl)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| sessions.remove(&k))
                .collect()
        };

        if expired.is_empty() {
            return;
        }
        bobine_core::metrics::TRANSCODES_ACTIVE.set(self.active_count() as i64);
        for session in expired {
            debug!(key = %session.key, "session idle past TTL");
            self.teardown(session).await;
        }
    }

    /// Spawn the periodic idle sweep.
    pub fn start_cleanup(self: Arc<Self>) -> LoopHandle {
        let manager = self;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.cleanup_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => manager.sweep_idle().await,
                    _ = stop_rx.changed() => return,
                }
            }
        });
        LoopHandle::new(stop_tx, handle)
    }
}

impl TranscodeMonitor for SessionManager {
    fn active_transcodes(&self) -> usize {
        self.active_count()
    }
}

/// One-shot scan of a session directory for finished media segments.
async fn count_segments(dir: &std::path::Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };

    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_segment = (name.ends_with(".ts") || name.ends_with(".mp4") || name.ends_with(".m4s"))
            && !name.starts_with("init");
        if is_segment {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{decide_playback, PlaybackRequest};
    use crate::session::hwaccel::{EncoderProbe, HardwareEncoderCache};
    use async_trait::async_trait;
    use bobine_core::models::{AssetId, AudioCodec};

    struct NoHardware;

    #[async_trait]
    impl EncoderProbe for NoHardware {
        async fn list_encoders(&self) -> crate::Result<String> {
            Ok(String::new())
        }

        async fn test_encode(&self, _encoder: &str) -> bool {
            false
        }
    }

    fn test_manager(root: &std::path::Path) -> SessionManager {
        let config = TranscodeConfig {
            // A stand-in binary: spawns successfully, exits immediately
            // complaining to stderr, which is all the registry tests need.
            ffmpeg_path: PathBuf::from("sleep"),
            ffprobe_path: PathBuf::from("ffprobe"),
            output_dir: root.to_path_buf(),
            segment_seconds: 6,
            session_ttl_seconds: 180,
            cleanup_interval_seconds: 60,
        };
        SessionManager::new(
            &config,
            Arc::new(HardwareEncoderCache::new(Box::new(NoHardware))),
        )
    }

    fn hevc_asset() -> MediaAsset {
        MediaAsset {
            id: AssetId::from("asset-000001"),
            path: PathBuf::from("/media/movie.mkv"),
            container: "matroska".to_string(),
            video_codec: VideoCodec::Hevc,
            audio_codec: AudioCodec::Dts,
            audio_channels: 6,
            duration_secs: 7200.0,
            width: 1920,
            height: 1080,
            loudness_gain_db: None,
        }
    }

    #[tokio::test]
    async fn same_key_reuses_the_session() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(root.path()));
        let asset = hevc_asset();
        let plan = decide_playback(&asset, &PlaybackRequest::default());

        let alice = UserId::from("user-alice001");
        let bob = UserId::from("user-bob00001");

        let (first, second) = tokio::join!(
            manager.get_or_create(&asset, &plan, &[], &alice),
            manager.get_or_create(&asset, &plan, &[], &bob),
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.active_count(), 1);
        assert_eq!(first.output_dir(), second.output_dir());
    }

    #[tokio::test]
    async fn stop_removes_key_reaps_child_and_deletes_dir() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(root.path()));
        let asset = hevc_asset();
        let plan = decide_playback(&asset, &PlaybackRequest::default());
        let user = UserId::from("user-alice001");

        let session = manager.get_or_create(&asset, &plan, &[], &user).await.unwrap();
        let dir = session.output_dir().clone();
        assert!(dir.exists());

        manager.stop(session.key()).await.unwrap();

        assert_eq!(manager.active_count(), 0);
        assert!(!dir.exists());
        assert!(matches!(
            manager.stop(session.key()).await,
            Err(StreamError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn idle_sweep_reclaims_expired_sessions() {
        let root = tempfile::tempdir().unwrap();
        let mut manager = test_manager(root.path());
        manager.ttl = Duration::from_millis(10);
        let manager = Arc::new(manager);

        let asset = hevc_asset();
        let plan = decide_playback(&asset, &PlaybackRequest::default());
        let user = UserId::from("user-alice001");

        let session = manager.get_or_create(&asset, &plan, &[], &user).await.unwrap();
        let dir = session.output_dir().clone();

        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.sweep_idle().await;

        assert_eq!(manager.active_count(), 0);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn seek_restarts_the_session() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(root.path()));
        let asset = hevc_asset();
        let user = UserId::from("user-alice001");

        let plan = decide_playback(&asset, &PlaybackRequest::default());
        let first = manager.get_or_create(&asset, &plan, &[], &user).await.unwrap();

        let seek_plan = decide_playback(
            &asset,
            &PlaybackRequest {
                start_secs: 600.0,
                ..Default::default()
            },
        );
        let second = manager
            .get_or_create(&asset, &seek_plan, &[], &user)
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.start_secs(), 600.0);
        assert_eq!(manager.active_count(), 1);
    }

    #[tokio::test]
    async fn stderr_tail_is_retained_after_exit() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(root.path()));
        let asset = hevc_asset();
        let plan = decide_playback(&asset, &PlaybackRequest::default());
        let user = UserId::from("user-alice001");

        let session = manager.get_or_create(&asset, &plan, &[], &user).await.unwrap();
        // The stand-in binary rejects the arguments and says so on stderr.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!session.error_log().is_empty());
    }

    #[test]
    fn segment_names_cannot_escape_the_directory() {
        let session = EncoderSession {
            key: SessionKey {
                asset_id: AssetId::from("asset-000001"),
                quality: QualityLevel::Q720,
            },
            owner: UserId::from("user-alice001"),
            output_dir: PathBuf::from("/tmp/session"),
            start_secs: 0.0,
            started_at: Instant::now(),
            last_accessed: Mutex::new(Instant::now()),
            segments_ready: AtomicUsize::new(0),
            stderr_tail: StderrTail::new(),
            kill_tx: Mutex::new(None),
            waiter: tokio::sync::Mutex::new(None),
        };

        assert!(session.segment_path("seg00001.ts").is_some());
        assert!(session.segment_path("../etc/passwd").is_none());
        assert!(session.segment_path("a/b.ts").is_none());
        assert!(session.segment_path("").is_none());
    }
}
