//! Photo retrieval after a review pause.
//!
//! The camera needs a moment to write the photo and the media index can lag
//! behind, so retrieval waits a settle delay and then makes a bounded number
//! of attempts, each: refresh index (falling back to the other storage
//! location), pick the newest photo taken since the pause, download its
//! thumbnail or, failing that, its preview.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use inspection_link::{MediaFileRef, MediaLink, Photo, StorageLocation};
use tokio::time::{sleep, timeout_at, Instant};

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Wait before the first attempt while the camera stores the photo
    pub settle_delay: Duration,
    /// Wait between a successful index refresh and reading the index
    pub list_delay: Duration,
    /// Wait between failed attempts
    pub retry_delay: Duration,
    pub max_attempts: u32,
    /// Photos created up to this long before the pause still qualify
    pub creation_slack: Duration,
    pub attempt_timeout: Duration,
    pub initial_location: StorageLocation,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            list_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(2),
            max_attempts: 5,
            creation_slack: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(15),
            initial_location: StorageLocation::InternalStorage,
        }
    }
}

/// One bounded try within a fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoFetchAttempt {
    pub attempt_number: u32,
    pub started_at: Instant,
    pub deadline: Instant,
}

impl PhotoFetchAttempt {
    pub fn begin(attempt_number: u32, timeout: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            attempt_number,
            started_at,
            deadline: started_at + timeout,
        }
    }
}

/// Intermediate progress, used for status updates only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchProgress {
    AttemptStarted { attempt: u32, max_attempts: u32 },
    AttemptFailed { attempt: u32, reason: String },
}

/// Final result of a fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Delivered {
        photo: Photo,
        /// Storage location that served the photo
        location: StorageLocation,
    },
    Exhausted {
        error: FetchError,
        location: StorageLocation,
    },
}

pub struct PhotoFetchCoordinator {
    media: Arc<dyn MediaLink>,
    policy: FetchPolicy,
    location: StorageLocation,
}

impl PhotoFetchCoordinator {
    pub fn new(media: Arc<dyn MediaLink>, policy: FetchPolicy, location: StorageLocation) -> Self {
        Self {
            media,
            policy,
            location,
        }
    }

    /// Run one fetch cycle for a photo captured around `since`.
    ///
    /// Cancellation is by dropping the future; nothing is reported afterwards.
    pub async fn run<F>(mut self, since: DateTime<Utc>, mut on_progress: F) -> FetchOutcome
    where
        F: FnMut(FetchProgress) + Send,
    {
        sleep(self.policy.settle_delay).await;

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = FetchError::NoCandidatePhoto;

        for attempt_number in 1..=max_attempts {
            let attempt = PhotoFetchAttempt::begin(attempt_number, self.policy.attempt_timeout);
            on_progress(FetchProgress::AttemptStarted {
                attempt: attempt_number,
                max_attempts,
            });
            tracing::debug!(attempt = attempt_number, max_attempts, location = ?self.location, "Photo fetch attempt");

            let result = match timeout_at(attempt.deadline, self.attempt(since)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::AttemptTimedOut {
                    attempt: attempt.attempt_number,
                }),
            };

            match result {
                Ok(photo) => {
                    tracing::info!(
                        attempt = attempt_number,
                        file = %photo.file_name,
                        content = ?photo.content,
                        "Photo retrieved"
                    );
                    return FetchOutcome::Delivered {
                        photo,
                        location: self.location,
                    };
                }
                Err(err) => {
                    tracing::warn!(attempt = attempt_number, max_attempts, error = %err, "Photo fetch attempt failed");
                    on_progress(FetchProgress::AttemptFailed {
                        attempt: attempt_number,
                        reason: err.to_string(),
                    });
                    last_error = err;
                    if attempt_number < max_attempts {
                        sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        FetchOutcome::Exhausted {
            error: FetchError::Exhausted {
                attempts: max_attempts,
                last: Box::new(last_error),
            },
            location: self.location,
        }
    }

    async fn attempt(&mut self, since: DateTime<Utc>) -> Result<Photo, FetchError> {
        if let Err(err) = self.media.refresh_file_list(self.location).await {
            let alternate = self.location.alternate();
            tracing::warn!(
                error = %err,
                from = ?self.location,
                to = ?alternate,
                "File list refresh failed, switching storage location"
            );
            self.location = alternate;
            self.media.refresh_file_list(alternate).await?;
        }

        sleep(self.policy.list_delay).await;

        let slack = chrono::Duration::from_std(self.policy.creation_slack).unwrap_or_else(|_| chrono::Duration::zero());
        let files = self.media.list_files(self.location);
        let candidate = newest_photo_since(&files, since - slack).ok_or(FetchError::NoCandidatePhoto)?;
        tracing::debug!(file = %candidate.file_name, created_at = %candidate.created_at, "Selected photo");

        match self.media.fetch_thumbnail(candidate).await {
            Ok(photo) => return Ok(photo),
            Err(err) => tracing::debug!(error = %err, "Thumbnail unavailable, trying preview"),
        }

        self.media.fetch_preview(candidate).await.map_err(|err| {
            tracing::debug!(error = %err, "Preview unavailable");
            FetchError::ThumbnailUnavailable {
                file_name: candidate.file_name.clone(),
            }
        })
    }
}

/// Newest photo (JPEG or RAW) created at or after `threshold`.
pub fn newest_photo_since(files: &[MediaFileRef], threshold: DateTime<Utc>) -> Option<&MediaFileRef> {
    files
        .iter()
        .filter(|file| file.media_type.is_photo() && file.created_at >= threshold)
        .max_by_key(|file| file.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inspection_link::{LinkError, LinkOp, MediaType, PhotoContent};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedMedia {
        failing_locations: Vec<StorageLocation>,
        files: Mutex<Vec<(StorageLocation, MediaFileRef)>>,
        thumbnail_ok: bool,
        preview_ok: bool,
        hang_refresh: bool,
        refreshes: AtomicU32,
        listings: AtomicU32,
        thumbnails: AtomicU32,
        previews: AtomicU32,
    }

    impl ScriptedMedia {
        fn with_photo(location: StorageLocation, created_at: DateTime<Utc>) -> Self {
            let media = Self::default();
            media.add(location, "DJI_0001.JPG", created_at, MediaType::Jpeg);
            media
        }

        fn add(&self, location: StorageLocation, name: &str, created_at: DateTime<Utc>, media_type: MediaType) {
            self.files.lock().unwrap().push((
                location,
                MediaFileRef {
                    file_name: name.to_string(),
                    created_at,
                    media_type,
                    size_bytes: 1024,
                },
            ));
        }

        fn photo(file: &MediaFileRef, content: PhotoContent) -> Photo {
            Photo {
                file_name: file.file_name.clone(),
                created_at: file.created_at,
                content,
                bytes: vec![0xFF, 0xD8],
            }
        }
    }

    #[async_trait]
    impl MediaLink for ScriptedMedia {
        async fn refresh_file_list(&self, location: StorageLocation) -> Result<(), LinkError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.hang_refresh {
                std::future::pending::<()>().await;
            }
            if self.failing_locations.contains(&location) {
                return Err(LinkError::rejected(LinkOp::RefreshFileList, "storage busy"));
            }
            Ok(())
        }

        fn list_files(&self, location: StorageLocation) -> Vec<MediaFileRef> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .unwrap()
                .iter()
                .filter(|(loc, _)| *loc == location)
                .map(|(_, file)| file.clone())
                .collect()
        }

        async fn fetch_thumbnail(&self, file: &MediaFileRef) -> Result<Photo, LinkError> {
            self.thumbnails.fetch_add(1, Ordering::SeqCst);
            if self.thumbnail_ok {
                Ok(Self::photo(file, PhotoContent::Thumbnail))
            } else {
                Err(LinkError::rejected(LinkOp::FetchThumbnail, "no thumbnail"))
            }
        }

        async fn fetch_preview(&self, file: &MediaFileRef) -> Result<Photo, LinkError> {
            self.previews.fetch_add(1, Ordering::SeqCst);
            if self.preview_ok {
                Ok(Self::photo(file, PhotoContent::Preview))
            } else {
                Err(LinkError::rejected(LinkOp::FetchPreview, "no preview"))
            }
        }
    }

    fn coordinator(media: &Arc<ScriptedMedia>) -> PhotoFetchCoordinator {
        PhotoFetchCoordinator::new(media.clone(), FetchPolicy::default(), StorageLocation::InternalStorage)
    }

    fn attempts_of(outcome: &FetchOutcome) -> Option<u32> {
        match outcome {
            FetchOutcome::Exhausted {
                error: FetchError::Exhausted { attempts, .. },
                ..
            } => Some(*attempts),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_exhausts_exactly_max_attempts() {
        let media = Arc::new(ScriptedMedia::default());
        let mut progress = Vec::new();

        let outcome = coordinator(&media).run(Utc::now(), |p| progress.push(p)).await;

        assert_eq!(attempts_of(&outcome), Some(5));
        assert_eq!(media.listings.load(Ordering::SeqCst), 5);
        assert_eq!(
            progress
                .iter()
                .filter(|p| matches!(p, FetchProgress::AttemptStarted { .. }))
                .count(),
            5
        );
        match outcome {
            FetchOutcome::Exhausted {
                error: FetchError::Exhausted { last, .. },
                ..
            } => assert_eq!(*last, FetchError::NoCandidatePhoto),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_downloads_exhaust_exactly_max_attempts() {
        let now = Utc::now();
        let media = Arc::new(ScriptedMedia::with_photo(StorageLocation::InternalStorage, now));

        let outcome = coordinator(&media).run(now, |_| {}).await;

        assert_eq!(attempts_of(&outcome), Some(5));
        assert_eq!(media.thumbnails.load(Ordering::SeqCst), 5);
        assert_eq!(media.previews.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_takes_settle_plus_attempts_plus_retry_delays() {
        let media = Arc::new(ScriptedMedia::default());
        let started = Instant::now();

        coordinator(&media).run(Utc::now(), |_| {}).await;

        // 3s settle + 5 x 1s list delay + 4 x 2s retry delay
        assert_eq!(started.elapsed(), Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_stays_constant_between_attempts() {
        let media = Arc::new(ScriptedMedia::default());
        let policy = FetchPolicy {
            settle_delay: Duration::ZERO,
            list_delay: Duration::ZERO,
            retry_delay: Duration::from_secs(7),
            max_attempts: 4,
            ..FetchPolicy::default()
        };
        let started = Instant::now();
        let mut failures = Vec::new();

        PhotoFetchCoordinator::new(media.clone(), policy, StorageLocation::InternalStorage)
            .run(Utc::now(), |p| {
                if matches!(p, FetchProgress::AttemptFailed { .. }) {
                    failures.push(Instant::now());
                }
            })
            .await;

        assert_eq!(failures.len(), 4);
        for pair in failures.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(7));
        }
        assert_eq!(started.elapsed(), Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn thumbnail_wins_when_available() {
        let now = Utc::now();
        let mut media = ScriptedMedia::with_photo(StorageLocation::InternalStorage, now);
        media.thumbnail_ok = true;
        let media = Arc::new(media);

        let outcome = coordinator(&media).run(now, |_| {}).await;

        match outcome {
            FetchOutcome::Delivered { photo, location } => {
                assert_eq!(photo.content, PhotoContent::Thumbnail);
                assert_eq!(location, StorageLocation::InternalStorage);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(media.previews.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_is_the_fallback() {
        let now = Utc::now();
        let mut media = ScriptedMedia::with_photo(StorageLocation::InternalStorage, now);
        media.preview_ok = true;
        let media = Arc::new(media);

        let outcome = coordinator(&media).run(now, |_| {}).await;

        assert!(matches!(
            outcome,
            FetchOutcome::Delivered { ref photo, .. } if photo.content == PhotoContent::Preview
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_failure_switches_storage_location() {
        let now = Utc::now();
        let mut media = ScriptedMedia::with_photo(StorageLocation::SdCard, now);
        media.failing_locations = vec![StorageLocation::InternalStorage];
        media.thumbnail_ok = true;
        let media = Arc::new(media);

        let outcome = coordinator(&media).run(now, |_| {}).await;

        match outcome {
            FetchOutcome::Delivered { location, .. } => assert_eq!(location, StorageLocation::SdCard),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(media.refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn both_locations_failing_counts_as_attempt_failure() {
        let mut media = ScriptedMedia::default();
        media.failing_locations = vec![StorageLocation::InternalStorage, StorageLocation::SdCard];
        let media = Arc::new(media);

        let outcome = coordinator(&media).run(Utc::now(), |_| {}).await;

        assert_eq!(attempts_of(&outcome), Some(5));
        assert_eq!(media.refreshes.load(Ordering::SeqCst), 10);
        assert_eq!(media.listings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_is_bounded_by_attempt_deadline() {
        let mut media = ScriptedMedia::default();
        media.hang_refresh = true;
        let media = Arc::new(media);

        let outcome = coordinator(&media).run(Utc::now(), |_| {}).await;

        match outcome {
            FetchOutcome::Exhausted {
                error: FetchError::Exhausted { attempts, last },
                ..
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(*last, FetchError::AttemptTimedOut { attempt: 5 });
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn candidate_selection_respects_slack_and_type() {
        let pause = Utc::now();
        let threshold = pause - chrono::Duration::seconds(1);
        let file = |name: &str, offset_ms: i64, media_type| MediaFileRef {
            file_name: name.to_string(),
            created_at: pause + chrono::Duration::milliseconds(offset_ms),
            media_type,
            size_bytes: 0,
        };

        let files = vec![
            file("old.jpg", -5_000, MediaType::Jpeg),
            file("skewed.jpg", -500, MediaType::Jpeg),
            file("clip.mp4", 2_000, MediaType::Mp4),
        ];
        assert_eq!(
            newest_photo_since(&files, threshold).map(|f| f.file_name.as_str()),
            Some("skewed.jpg")
        );

        let files = vec![file("a.jpg", 100, MediaType::Jpeg), file("b.dng", 200, MediaType::RawDng)];
        assert_eq!(
            newest_photo_since(&files, threshold).map(|f| f.file_name.as_str()),
            Some("b.dng")
        );

        let files = vec![file("old.jpg", -5_000, MediaType::Jpeg)];
        assert!(newest_photo_since(&files, threshold).is_none());
    }
}
