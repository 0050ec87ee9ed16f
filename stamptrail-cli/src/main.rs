use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stamptrail_core::api::models::RankingPeriod;
use stamptrail_core::checkin::{AwardOutcome, VerifyOutcome};
use stamptrail_core::display;
use stamptrail_core::location::{FixedLocation, PositionFix};
use stamptrail_core::{
    ApiClient, AppConfig, BootstrapOutcome, CheckinEngine, HostSdk, IdentityBootstrap,
    SessionStore, SpotCatalog, StampTrailError,
};

/// Environment variable carrying the platform identity token.
const ENV_ID_TOKEN: &str = "STAMPTRAIL_ID_TOKEN";

/// StampTrail CLI - location stamp-rally client
#[derive(Parser)]
#[command(name = "stamptrail")]
#[command(about = "Collect location stamps and browse leaderboards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate against the backend and show the session
    Login,

    /// Show the collected stamp board
    Stamps {
        /// Emit the rendered markup instead of plain text
        #[arg(long)]
        html: bool,
    },

    /// List the check-in spots
    Spots,

    /// Check in at a spot from the given coordinates
    Checkin {
        /// Spot key (see `spots`)
        #[arg(long)]
        spot: String,

        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lon: f64,

        /// Estimated accuracy in meters
        #[arg(long, default_value_t = 10.0)]
        accuracy: f64,

        /// Photo to upload after a successful verification
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Show the friends leaderboard
    Ranking {
        #[arg(long, value_enum, default_value = "weekly")]
        period: PeriodArg,
    },

    /// Add a friend relation
    AddFriend {
        /// Friend user id
        friend: String,
    },

    /// List confirmed friends
    Friends,

    /// Compare stamp counts with a friend
    Compare {
        /// Friend user id
        friend: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodArg {
    Weekly,
    Monthly,
}

impl From<PeriodArg> for RankingPeriod {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Weekly => RankingPeriod::Weekly,
            PeriodArg::Monthly => RankingPeriod::Monthly,
        }
    }
}

/// Host-SDK stand-in for the terminal: the identity token arrives through
/// the environment instead of an in-app SDK object.
struct EnvTokenSdk;

#[async_trait]
impl HostSdk for EnvTokenSdk {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn init(&self, app_id: &str) -> stamptrail_core::Result<()> {
        info!(app_id, "host shim initialized");
        Ok(())
    }

    async fn is_logged_in(&self) -> bool {
        std::env::var(ENV_ID_TOKEN).is_ok()
    }

    async fn id_token(&self) -> Option<String> {
        std::env::var(ENV_ID_TOKEN).ok()
    }

    async fn login(&self) -> stamptrail_core::Result<()> {
        Err(StampTrailError::Capability(format!(
            "no interactive login from the terminal; set {}",
            ENV_ID_TOKEN
        )))
    }

    async fn logout(&self) {}
}

struct App {
    config: AppConfig,
    api: Arc<ApiClient>,
    catalog: SpotCatalog,
}

impl App {
    fn from_env() -> Result<Self> {
        let config = AppConfig::from_env()?;
        let api = Arc::new(ApiClient::new(&config, SessionStore::new())?);
        Ok(Self {
            config,
            api,
            catalog: SpotCatalog::default_catalog(),
        })
    }

    /// Run the identity bootstrap; `LoggedOut` is acceptable when the
    /// command can proceed anonymously.
    async fn bootstrap(&self) -> Result<BootstrapOutcome> {
        let bootstrap = IdentityBootstrap::new(
            Arc::new(EnvTokenSdk),
            self.api.clone(),
            self.config.clone(),
        );
        Ok(bootstrap.run().await?)
    }

    async fn require_user(&self) -> Result<String> {
        match self.bootstrap().await? {
            BootstrapOutcome::Ready { user_id, .. } => Ok(user_id),
            BootstrapOutcome::LoggedOut => anyhow::bail!(
                "not logged in; set {} with your platform identity token",
                ENV_ID_TOKEN
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let app = App::from_env()?;

    match cli.command {
        Commands::Login => {
            match app.bootstrap().await? {
                BootstrapOutcome::LoggedOut => {
                    println!("Not logged in. Set {} and retry.", ENV_ID_TOKEN);
                }
                BootstrapOutcome::Ready {
                    user_id,
                    display_name,
                    stamps,
                } => {
                    let name = display_name.unwrap_or_else(|| "you".to_string());
                    println!("Signed in as {} ({})", name, user_id);
                    println!(
                        "Progress: {}",
                        display::render_progress(stamps.len(), app.catalog.len())
                    );
                }
            }
        }
        Commands::Stamps { html } => {
            let user_id = app.require_user().await?;
            let stamps = app.api.stamps(&user_id).await?;
            if html {
                println!("{}", display::render_stamp_board(&app.catalog, &stamps));
            } else if stamps.is_empty() {
                println!("No stamps collected yet");
            } else {
                for stamp in &stamps {
                    println!(
                        "{}  {}  ({})",
                        stamp.stamp_id,
                        stamp.name,
                        display::format_collected_at(stamp.collected_at)
                    );
                }
                println!(
                    "Progress: {}",
                    display::render_progress(stamps.len(), app.catalog.len())
                );
            }
        }
        Commands::Spots => {
            for spot in app.catalog.spots() {
                println!("{:<8} {}  - {}", spot.local_key, spot.id, spot.display_name);
            }
        }
        Commands::Checkin {
            spot,
            lat,
            lon,
            accuracy,
            photo,
        } => {
            // Anonymous check-in is allowed; award and upload are not.
            let _ = app.bootstrap().await?;
            let location = FixedLocation(PositionFix {
                lat,
                lon,
                accuracy_m: accuracy,
            });
            let engine = CheckinEngine::new(
                app.api.clone(),
                app.catalog.clone(),
                Arc::new(location),
                app.config.clone(),
            );

            engine.select_spot(&spot).await?;
            if let Some(path) = &photo {
                let bytes = std::fs::read(path)?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("photo.jpg")
                    .to_string();
                engine.attach_photo(file_name, bytes).await?;
            }

            let outcome = engine.check_in().await?;
            if let Some(status) = engine.status_line().await {
                println!("{}", status);
            }

            if matches!(outcome, VerifyOutcome::Within(_)) && photo.is_some() {
                match engine.upload_photo().await? {
                    AwardOutcome::Awarded { stamps } => {
                        println!("Stamp awarded! You now hold {} stamp(s).", stamps.len());
                    }
                    AwardOutcome::Inconclusive { .. } => {
                        println!("Photo received. The stamp may take a little longer to appear.");
                    }
                    AwardOutcome::Discarded => {}
                }
            }
            engine.close_view().await;
        }
        Commands::Ranking { period } => {
            let user_id = app.require_user().await?;
            let entries = app.api.friends_ranking(period.into(), &user_id).await?;
            if entries.is_empty() {
                println!("No ranking data yet");
            } else {
                for (index, entry) in entries.iter().enumerate() {
                    let rank = entry.rank.unwrap_or(index as u32 + 1);
                    let name = entry.display_name.as_deref().unwrap_or("Unknown");
                    let marker = if entry.is_self { " (you)" } else { "" };
                    println!("{:>3}. {}{}  {} stamp(s)", rank, name, marker, entry.stamp_count);
                }
            }
        }
        Commands::AddFriend { friend } => {
            let user_id = app.require_user().await?;
            let response = app.api.add_friend(&user_id, &friend).await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Friend added".to_string())
            );
        }
        Commands::Friends => {
            let user_id = app.require_user().await?;
            let response = app.api.friends(&user_id).await?;
            if response.friends.is_empty() {
                println!("No friends yet");
            } else {
                for friend in &response.friends {
                    println!("{}", friend.friend_id);
                }
            }
        }
        Commands::Compare { friend } => {
            let user_id = app.require_user().await?;
            let comparison = app.api.compare(&user_id, &friend).await?;
            println!(
                "{}: {} stamp(s)",
                comparison.user.display_name, comparison.user.stamp_count
            );
            println!(
                "{}: {} stamp(s)",
                comparison.friend.display_name, comparison.friend.stamp_count
            );
        }
    }

    Ok(())
}
