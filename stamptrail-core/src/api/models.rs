//! Wire models for the stamp-rally backend.
//!
//! Field names follow the backend exactly, including the camelCase
//! `distanceM` / `radiusM` pair on the GPS verification response.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Response to `POST /auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A stamp credited to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampRecord {
    pub stamp_id: String,
    #[serde(default)]
    pub name: String,
    /// Epoch seconds; absent while the award is still settling.
    #[serde(default)]
    pub collected_at: Option<i64>,
}

/// Response to `GET /stamps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampsResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub stamps: Vec<StampRecord>,
}

/// Response to `POST /stamps/award`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// How a stamp was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionMethod {
    #[serde(rename = "GPS")]
    Gps,
    #[serde(rename = "IMAGE")]
    Image,
}

impl CollectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gps => "GPS",
            Self::Image => "IMAGE",
        }
    }
}

/// Response to `POST /gps/verify`. One verification attempt; not persisted.
///
/// Some backend variants omit `ok` on success, so only an explicit
/// `ok: false` marks a refusal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsVerification {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub within: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "spotId")]
    pub spot_id: Option<String>,
    #[serde(default, rename = "distanceM")]
    pub distance_m: f64,
    #[serde(default, rename = "radiusM")]
    pub radius_m: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Pre-signed upload destination returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTicket {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub upload_url: String,
    /// Form fields the storage endpoint expects alongside the file part.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One row of a friends leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub stamp_count: u32,
    #[serde(default)]
    pub is_self: bool,
}

/// Response to `GET /ranking/friends/{period}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingsResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub rankings: Vec<RankingEntry>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Leaderboard period selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingPeriod {
    Weekly,
    Monthly,
}

impl RankingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Per-user side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparedUser {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub stamp_count: u32,
}

/// Response to `GET /ranking/compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    #[serde(default)]
    pub ok: bool,
    pub user: ComparedUser,
    pub friend: ComparedUser,
    /// Signed stamp-count difference, user minus friend.
    #[serde(default)]
    pub rank_diff: i64,
    #[serde(default)]
    pub user_is_higher: bool,
}

/// A confirmed friend relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRecord {
    pub friend_id: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Response to `GET /friends/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendsResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub friends: Vec<FriendRecord>,
    #[serde(default)]
    pub count: u32,
}

/// Response to `POST /friends/add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFriendResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}
