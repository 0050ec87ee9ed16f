//! Host messaging-platform SDK seam and the identity bootstrap.
//!
//! The embedding platform injects its SDK asynchronously; the bootstrap
//! waits for it, initializes it with the configured application id, and
//! resolves the user's session against the backend.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::api::client::ApiClient;
use crate::api::models::StampRecord;
use crate::config::AppConfig;
use crate::{Result, StampTrailError};

/// Surface of the host platform SDK consumed by the bootstrap.
#[async_trait]
pub trait HostSdk: Send + Sync {
    /// Whether the SDK has finished loading into the page.
    async fn is_ready(&self) -> bool;
    /// Initialize the SDK with the platform application id.
    async fn init(&self, app_id: &str) -> Result<()>;
    async fn is_logged_in(&self) -> bool;
    /// Identity token for the logged-in user, if one is available.
    async fn id_token(&self) -> Option<String>;
    /// Start the platform login redirect. No continuation runs on this
    /// page load after a successful call.
    async fn login(&self) -> Result<()>;
    async fn logout(&self);
}

/// Observable bootstrap progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    WaitingForSdk,
    Initializing,
    LoggedOut,
    Authenticating,
    Ready,
    Failed,
}

/// Terminal bootstrap result.
#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    /// The user must log in through the host platform first.
    LoggedOut,
    /// Authenticated and ready; carries the initial stamp board.
    Ready {
        user_id: String,
        display_name: Option<String>,
        stamps: Vec<StampRecord>,
    },
}

/// Runs the startup sequence: SDK wait, init, login check, backend auth.
pub struct IdentityBootstrap {
    sdk: Arc<dyn HostSdk>,
    api: Arc<ApiClient>,
    config: AppConfig,
    phase: RwLock<BootstrapPhase>,
}

impl IdentityBootstrap {
    pub fn new(sdk: Arc<dyn HostSdk>, api: Arc<ApiClient>, config: AppConfig) -> Self {
        Self {
            sdk,
            api,
            config,
            phase: RwLock::new(BootstrapPhase::WaitingForSdk),
        }
    }

    pub async fn phase(&self) -> BootstrapPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: BootstrapPhase) {
        *self.phase.write().await = phase;
    }

    /// Run the bootstrap to a terminal state.
    ///
    /// Any failure leaves the machine in `Failed` with the session cleared.
    /// A stamp-list failure after authentication does not fail the
    /// bootstrap; it degrades to an empty board.
    pub async fn run(&self) -> Result<BootstrapOutcome> {
        match self.run_inner().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.set_phase(BootstrapPhase::Failed).await;
                self.api.session().clear().await;
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> Result<BootstrapOutcome> {
        self.set_phase(BootstrapPhase::WaitingForSdk).await;
        self.wait_for_sdk().await?;

        self.set_phase(BootstrapPhase::Initializing).await;
        self.sdk.init(&self.config.app_id).await?;

        if !self.sdk.is_logged_in().await {
            info!("host SDK reports logged out");
            self.set_phase(BootstrapPhase::LoggedOut).await;
            return Ok(BootstrapOutcome::LoggedOut);
        }

        self.set_phase(BootstrapPhase::Authenticating).await;
        let id_token = self.sdk.id_token().await.ok_or_else(|| {
            StampTrailError::Capability(
                "no identity token available; open this page inside the messaging app".into(),
            )
        })?;

        let auth = self.api.authenticate(&id_token).await?;
        let user_id = auth.user_id.clone().ok_or_else(|| {
            StampTrailError::application(
                "authentication response is missing required fields",
                502,
                serde_json::Value::Null,
            )
        })?;

        let stamps = self.api.stamps_best_effort(&user_id).await;

        self.set_phase(BootstrapPhase::Ready).await;
        info!(user_id = %user_id, "bootstrap ready");
        Ok(BootstrapOutcome::Ready {
            user_id,
            display_name: auth.display_name,
            stamps,
        })
    }

    async fn wait_for_sdk(&self) -> Result<()> {
        for attempt in 1..=self.config.sdk_wait_attempts {
            if self.sdk.is_ready().await {
                return Ok(());
            }
            if attempt == self.config.sdk_wait_attempts {
                break;
            }
            tokio::time::sleep(self.config.sdk_wait_interval).await;
        }
        warn!(
            attempts = self.config.sdk_wait_attempts,
            "host SDK never became ready"
        );
        Err(StampTrailError::Capability(
            "host SDK did not load in time; reload the page".into(),
        ))
    }
}
