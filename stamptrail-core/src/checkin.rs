//! Check-in workflow state machine.
//!
//! Drives one attempt from spot selection through geolocation, backend
//! verification, optional photo upload, and the bounded wait for the
//! asynchronous stamp award. The detail view owns exactly one
//! [`CheckinSession`]; closing the view resets it on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::client::ApiClient;
use crate::api::models::{CollectionMethod, GpsVerification, StampRecord};
use crate::config::AppConfig;
use crate::location::{FixRequest, LocationProvider};
use crate::retry::{spawn_poll, PollOutcome, RetrySchedule};
use crate::spots::{Spot, SpotCatalog};
use crate::{Result, StampTrailError};

/// User id sent with verification requests when no session exists.
/// Anonymous sessions may verify but are never permitted to award or
/// upload.
pub const ANONYMOUS_USER_ID: &str = "user123";

/// Where the current check-in attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckinPhase {
    #[default]
    Idle,
    SpotSelected,
    LocationRequested,
    /// Verification reported `within`; the upload control enables once a
    /// photo is attached.
    UploadArmed,
    Uploading,
    PollingForAward,
    Settled,
}

/// A photo staged for upload.
#[derive(Debug, Clone)]
pub struct PendingPhoto {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Result of one verification attempt, as applied to the view.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    /// Inside the geofence; upload step unlocked.
    Within(GpsVerification),
    /// Outside the geofence; upload stays locked.
    Outside(GpsVerification),
    /// The view was closed or the spot changed while the request was in
    /// flight; the late result was dropped.
    Discarded,
}

/// Terminal state of the upload-and-await-award sequence.
#[derive(Debug, Clone)]
pub enum AwardOutcome {
    /// The award appeared in the stamp list while polling.
    Awarded { stamps: Vec<StampRecord> },
    /// Polling ran out of attempts; not an error, the award may still land.
    Inconclusive { stamps: Vec<StampRecord> },
    /// The view was closed while the sequence was in flight.
    Discarded,
}

/// One check-in attempt's mutable state. Reset when the detail view closes.
#[derive(Debug, Default)]
struct CheckinSession {
    phase: CheckinPhase,
    selected_spot: Option<Spot>,
    last_verification: Option<GpsVerification>,
    upload_armed: bool,
    pending_photo: Option<PendingPhoto>,
    status: Option<String>,
    /// Bumped on every close and re-selection; in-flight results are
    /// applied only when their captured epoch still matches.
    epoch: u64,
}

impl CheckinSession {
    fn reset(&mut self) {
        self.phase = CheckinPhase::Idle;
        self.selected_spot = None;
        self.last_verification = None;
        self.upload_armed = false;
        self.pending_photo = None;
        self.status = None;
        self.epoch += 1;
    }
}

/// The check-in engine. `&self` API; safe to share behind an `Arc`.
pub struct CheckinEngine {
    api: Arc<ApiClient>,
    catalog: SpotCatalog,
    location: Arc<dyn LocationProvider>,
    config: AppConfig,
    state: Mutex<CheckinSession>,
    closing: AtomicBool,
}

impl CheckinEngine {
    pub fn new(
        api: Arc<ApiClient>,
        catalog: SpotCatalog,
        location: Arc<dyn LocationProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            api,
            catalog,
            location,
            config,
            state: Mutex::new(CheckinSession::default()),
            closing: AtomicBool::new(false),
        }
    }

    pub async fn phase(&self) -> CheckinPhase {
        self.state.lock().await.phase
    }

    /// Whether the upload control is currently enabled.
    pub async fn upload_ready(&self) -> bool {
        self.state.lock().await.upload_armed
    }

    pub async fn selected_spot(&self) -> Option<Spot> {
        self.state.lock().await.selected_spot.clone()
    }

    pub async fn status_line(&self) -> Option<String> {
        self.state.lock().await.status.clone()
    }

    pub async fn last_verification(&self) -> Option<GpsVerification> {
        self.state.lock().await.last_verification.clone()
    }

    /// Open the detail view for a spot.
    ///
    /// Re-selection resets any staged photo and disarms the upload control;
    /// an in-flight result for the previous spot will no longer apply.
    pub async fn select_spot(&self, local_key: &str) -> Result<Spot> {
        let spot = self
            .catalog
            .by_local_key(local_key)
            .cloned()
            .ok_or_else(|| StampTrailError::Validation(format!("unknown spot: {}", local_key)))?;

        let mut state = self.state.lock().await;
        state.phase = CheckinPhase::SpotSelected;
        state.selected_spot = Some(spot.clone());
        state.last_verification = None;
        state.upload_armed = false;
        state.pending_photo = None;
        state.status = None;
        state.epoch += 1;
        info!(spot = %spot.id, "spot selected");
        Ok(spot)
    }

    /// Verify the device position against the selected spot.
    ///
    /// Requests a single fresh high-accuracy fix, sends it to the backend,
    /// and applies the result unless the view moved on in the meantime.
    /// Geolocation failure ends the attempt; it is never retried silently.
    pub async fn check_in(&self) -> Result<VerifyOutcome> {
        let (spot, epoch) = {
            let mut state = self.state.lock().await;
            let spot = state
                .selected_spot
                .clone()
                .ok_or_else(|| StampTrailError::Validation("select a spot first".into()))?;
            state.phase = CheckinPhase::LocationRequested;
            state.status = Some("acquiring position...".into());
            (spot, state.epoch)
        };

        let request = FixRequest::fresh(self.config.geo_fix_timeout);
        let fix = match self.location.current_position(&request).await {
            Ok(fix) => fix,
            Err(e) => {
                self.revert_to_selected(epoch, format!("location error: {}", e))
                    .await;
                return Err(e.into());
            }
        };

        let user_id = self
            .api
            .session()
            .user_id()
            .await
            .unwrap_or_else(|| ANONYMOUS_USER_ID.to_string());

        let verification = match self
            .api
            .verify_gps(&user_id, &spot.id, fix.lat, fix.lon, Some(fix.accuracy_m))
            .await
        {
            Ok(v) if v.ok => v,
            Ok(v) => {
                let message = v
                    .message
                    .clone()
                    .unwrap_or_else(|| "location verification failed".to_string());
                self.revert_to_selected(epoch, message.clone()).await;
                return Err(StampTrailError::application(
                    message,
                    502,
                    serde_json::to_value(&v).unwrap_or_default(),
                ));
            }
            Err(e) => {
                self.revert_to_selected(epoch, e.to_string()).await;
                return Err(e);
            }
        };

        let authenticated = self.api.session().is_authenticated().await;
        let within = verification.within;
        {
            let mut state = self.state.lock().await;
            if state.epoch != epoch
                || state.selected_spot.as_ref().map(|s| s.id.as_str()) != Some(spot.id.as_str())
            {
                debug!(spot = %spot.id, "discarding stale verification result");
                return Ok(VerifyOutcome::Discarded);
            }
            state.last_verification = Some(verification.clone());
            if within {
                state.phase = CheckinPhase::UploadArmed;
                state.upload_armed = state.pending_photo.is_some();
                state.status = Some(format!(
                    "Within range: {} (distance {:.0} m, radius {:.0} m)",
                    verification.name, verification.distance_m, verification.radius_m
                ));
            } else {
                state.phase = CheckinPhase::SpotSelected;
                state.upload_armed = false;
                state.status = Some(format!(
                    "Out of range (distance {:.0} m, radius {:.0} m)",
                    verification.distance_m, verification.radius_m
                ));
            }
        }

        if within {
            if authenticated {
                // Direct GPS award; failure here usually means the stamp is
                // already collected, so the result is logged and dropped.
                if let Err(e) = self
                    .api
                    .award_stamp(&user_id, &spot.id, CollectionMethod::Gps)
                    .await
                {
                    debug!(spot = %spot.id, "direct award not applied: {}", e);
                }
            }
            Ok(VerifyOutcome::Within(verification))
        } else {
            Ok(VerifyOutcome::Outside(verification))
        }
    }

    /// Stage a photo for upload. Arms the upload control when the current
    /// verification allows it.
    ///
    /// A missing file name gets a generated one, matching what the upload
    /// backend would do on its side.
    pub async fn attach_photo(&self, file_name: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        if bytes.is_empty() {
            return Err(StampTrailError::Validation("photo file is empty".into()));
        }
        let mut file_name = file_name.into();
        if file_name.trim().is_empty() {
            file_name = format!("{}.jpg", Uuid::new_v4());
        }
        let mut state = self.state.lock().await;
        if state.phase == CheckinPhase::Idle {
            return Err(StampTrailError::Validation(
                "open a spot before choosing a photo".into(),
            ));
        }
        state.pending_photo = Some(PendingPhoto { file_name, bytes });
        state.upload_armed = state.phase == CheckinPhase::UploadArmed;
        Ok(())
    }

    /// Upload the staged photo and wait, bounded, for the award to appear.
    ///
    /// The award is produced by a server-side recognition step; the stamp
    /// list is polled on the configured schedule. Running out of attempts
    /// is an inconclusive outcome, not an error.
    pub async fn upload_photo(&self) -> Result<AwardOutcome> {
        let (spot, photo, epoch) = {
            let state = self.state.lock().await;
            let spot = state
                .selected_spot
                .clone()
                .ok_or_else(|| StampTrailError::Validation("select a spot first".into()))?;
            let photo = state
                .pending_photo
                .clone()
                .ok_or_else(|| StampTrailError::Validation("choose a photo first".into()))?;
            if !state.upload_armed {
                return Err(StampTrailError::Validation(
                    "verify your location before uploading".into(),
                ));
            }
            (spot, photo, state.epoch)
        };

        let Some(user_id) = self.api.session().user_id().await else {
            return Err(StampTrailError::Validation(
                "sign in before uploading a photo".into(),
            ));
        };

        {
            let mut state = self.state.lock().await;
            if state.epoch == epoch {
                state.phase = CheckinPhase::Uploading;
                state.status = Some("uploading photo...".into());
            }
        }

        let ticket = match self.api.upload_url(&user_id, &photo.file_name).await {
            Ok(ticket) if ticket.ok => ticket,
            Ok(ticket) => {
                let message = ticket
                    .message
                    .unwrap_or_else(|| "could not prepare the upload".to_string());
                self.rearm_after_upload_failure(epoch, message.clone()).await;
                return Err(StampTrailError::application(
                    message,
                    502,
                    serde_json::Value::Null,
                ));
            }
            Err(e) => {
                self.rearm_after_upload_failure(epoch, e.to_string()).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .api
            .upload_to_storage(&ticket, &photo.file_name, photo.bytes.clone())
            .await
        {
            self.rearm_after_upload_failure(epoch, e.to_string()).await;
            return Err(e);
        }

        {
            let mut state = self.state.lock().await;
            if state.epoch == epoch {
                state.phase = CheckinPhase::PollingForAward;
                state.status = Some("photo uploaded; waiting for the stamp award...".into());
            }
        }
        info!(spot = %spot.id, "photo uploaded, polling for award");

        let schedule = RetrySchedule::new(
            self.config.award_poll_interval,
            self.config.award_poll_attempts,
        );
        let api = self.api.clone();
        let poll_user = user_id.clone();
        let stamp_id = spot.id.clone();
        let handle = spawn_poll(schedule, move |attempt| {
            let api = api.clone();
            let user_id = poll_user.clone();
            let stamp_id = stamp_id.clone();
            async move {
                match api.stamps(&user_id).await {
                    Ok(stamps) if stamps.iter().any(|s| s.stamp_id == stamp_id) => Some(stamps),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(attempt, "award poll failed: {}", e);
                        None
                    }
                }
            }
        });

        let outcome = handle.outcome().await;
        let refreshed = match &outcome {
            PollOutcome::Completed(stamps) => stamps.clone(),
            _ => self.api.stamps_best_effort(&user_id).await,
        };

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(spot = %spot.id, "discarding award outcome for a closed view");
            return Ok(AwardOutcome::Discarded);
        }
        match outcome {
            PollOutcome::Completed(stamps) => {
                state.phase = CheckinPhase::Settled;
                state.status = Some(format!("Stamp awarded: {}", spot.display_name));
                Ok(AwardOutcome::Awarded { stamps })
            }
            PollOutcome::Exhausted => {
                state.phase = CheckinPhase::Settled;
                state.status = Some(
                    "Photo received. The stamp may take a little longer to appear.".into(),
                );
                Ok(AwardOutcome::Inconclusive { stamps: refreshed })
            }
            PollOutcome::Cancelled => Ok(AwardOutcome::Discarded),
        }
    }

    /// Close the detail view and reset the attempt.
    ///
    /// Every exit path funnels through here exactly once; a second trigger
    /// while a close is already in flight is suppressed. Returns whether a
    /// reset was performed.
    pub async fn close_view(&self) -> bool {
        if self.closing.swap(true, Ordering::SeqCst) {
            return false;
        }
        let was_open = {
            let mut state = self.state.lock().await;
            let was_open = state.phase != CheckinPhase::Idle;
            state.reset();
            was_open
        };
        self.closing.store(false, Ordering::SeqCst);
        if was_open {
            debug!("detail view closed");
        }
        was_open
    }

    async fn revert_to_selected(&self, epoch: u64, message: String) {
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.phase = CheckinPhase::SpotSelected;
            state.upload_armed = false;
            state.status = Some(message);
        }
    }

    async fn rearm_after_upload_failure(&self, epoch: u64, message: String) {
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.phase = CheckinPhase::UploadArmed;
            state.status = Some(message);
        }
    }
}
