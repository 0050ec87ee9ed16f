//! HTTP client for the stamp-rally backend gateway.

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::envelope;
use crate::api::models::{
    AddFriendResponse, AuthResponse, AwardResponse, CollectionMethod, CompareResponse,
    FriendsResponse, GpsVerification, RankingEntry, RankingPeriod, RankingsResponse,
    StampRecord, StampsResponse, UploadTicket,
};
use crate::config::AppConfig;
use crate::session::SessionStore;
use crate::{Result, StampTrailError};

/// Gateway client for the stamp-rally backend.
///
/// Attaches the JSON content type and, when a session exists, the bearer
/// token to every request, and funnels every response through the envelope
/// normalization in [`crate::api::envelope`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(config: &AppConfig, session: SessionStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| StampTrailError::Connectivity(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Session store this client reads tokens from and writes auth results to.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Issue one request against the gateway and normalize the response.
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Content-Type", "application/json");

        if let Some(token) = self.session.access_token().await {
            request = request.bearer_auth(token);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, endpoint, "calling backend");

        let response = request.send().await.map_err(|e| {
            StampTrailError::Connectivity(format!(
                "network error, check your connection: {}",
                e
            ))
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(|e| {
            StampTrailError::Connectivity(format!("failed to read response body: {}", e))
        })?;

        let normalized = envelope::normalize(status, content_type.as_deref(), &text)?;
        Ok(normalized.payload)
    }

    /// Exchange a host-platform identity token for a backend session.
    ///
    /// On success the returned token, user id, and display name are stored
    /// into the session in one write. On any failure, including a response
    /// missing the success flag or the required fields, the session is
    /// cleared before the error is returned.
    pub async fn authenticate(&self, id_token: &str) -> Result<AuthResponse> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            self.session.clear().await;
            return Err(StampTrailError::Validation("identity token is empty".into()));
        }

        let result = self.authenticate_inner(id_token).await;
        if result.is_err() {
            self.session.clear().await;
        }
        result
    }

    async fn authenticate_inner(&self, id_token: &str) -> Result<AuthResponse> {
        let body = serde_json::json!({ "id_token": id_token });
        let payload = self.call(Method::POST, "/auth/verify", &[], Some(&body)).await?;
        let response: AuthResponse = from_payload(payload.clone())?;

        if !response.ok {
            let message = response
                .message
                .clone()
                .unwrap_or_else(|| "authentication failed".to_string());
            return Err(StampTrailError::application(message, 401, payload));
        }
        let (Some(token), Some(user_id)) = (response.access_token.clone(), response.user_id.clone())
        else {
            return Err(StampTrailError::application(
                "authentication response is missing required fields",
                502,
                payload,
            ));
        };

        self.session
            .establish(token, user_id, response.display_name.clone())
            .await;
        Ok(response)
    }

    /// Fetch the user's collected stamps.
    pub async fn stamps(&self, user_id: &str) -> Result<Vec<StampRecord>> {
        let payload = self
            .call(Method::GET, "/stamps", &[("userId", user_id)], None)
            .await?;
        let response: StampsResponse = from_payload(payload)?;
        Ok(response.stamps)
    }

    /// Fetch the stamp list, degrading to an empty board on failure.
    pub async fn stamps_best_effort(&self, user_id: &str) -> Vec<StampRecord> {
        match self.stamps(user_id).await {
            Ok(stamps) => stamps,
            Err(e) => {
                warn!("stamp list refresh failed, showing empty board: {}", e);
                Vec::new()
            }
        }
    }

    /// Credit a stamp to the user.
    pub async fn award_stamp(
        &self,
        user_id: &str,
        stamp_id: &str,
        method: CollectionMethod,
    ) -> Result<AwardResponse> {
        let body = serde_json::json!({
            "user_id": user_id,
            "stamp_id": stamp_id,
            "method": method.as_str(),
        });
        let payload = self.call(Method::POST, "/stamps/award", &[], Some(&body)).await?;
        from_payload(payload)
    }

    /// Verify the device position against a spot's geofence.
    pub async fn verify_gps(
        &self,
        user_id: &str,
        spot_id: &str,
        lat: f64,
        lon: f64,
        accuracy: Option<f64>,
    ) -> Result<GpsVerification> {
        let mut body = serde_json::json!({
            "userId": user_id,
            "spotId": spot_id,
            "lat": lat,
            "lon": lon,
        });
        if let Some(accuracy) = accuracy {
            body["accuracy"] = serde_json::json!(accuracy);
        }
        let payload = self.call(Method::POST, "/gps/verify", &[], Some(&body)).await?;
        from_payload(payload)
    }

    /// Request a pre-signed upload destination for a photo.
    pub async fn upload_url(&self, user_id: &str, file_name: &str) -> Result<UploadTicket> {
        let body = serde_json::json!({
            "user_id": user_id,
            "file_name": file_name,
        });
        let payload = self.call(Method::POST, "/s3/upload-url", &[], Some(&body)).await?;
        from_payload(payload)
    }

    /// Transfer photo bytes directly to the pre-signed storage destination.
    ///
    /// The destination expects a multipart form carrying every ticket field
    /// followed by the file part; this does not go through the gateway.
    pub async fn upload_to_storage(&self, ticket: &UploadTicket, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let mut form = reqwest::multipart::Form::new();
        for (key, value) in &ticket.fields {
            form = form.text(key.clone(), value.clone());
        }
        form = form.part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()),
        );

        let response = self
            .http
            .post(&ticket.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                StampTrailError::Connectivity(format!("photo transfer failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StampTrailError::application(
                format!("photo transfer rejected, status: {}", status.as_u16()),
                status.as_u16(),
                serde_json::json!({ "message": text }),
            ));
        }
        Ok(())
    }

    /// Fetch the friends leaderboard for a period.
    pub async fn friends_ranking(
        &self,
        period: RankingPeriod,
        user_id: &str,
    ) -> Result<Vec<RankingEntry>> {
        let endpoint = format!("/ranking/friends/{}", period.as_str());
        let payload = self
            .call(Method::GET, &endpoint, &[("user_id", user_id)], None)
            .await?;
        let response: RankingsResponse = from_payload(payload.clone())?;
        if !response.ok {
            let message = response
                .message
                .unwrap_or_else(|| "failed to load rankings".to_string());
            return Err(StampTrailError::application(message, 502, payload));
        }
        Ok(response.rankings)
    }

    /// Compare two users' stamp counts.
    pub async fn compare(&self, user_id: &str, friend_id: &str) -> Result<CompareResponse> {
        let payload = self
            .call(
                Method::GET,
                "/ranking/compare",
                &[("user_id", user_id), ("friend_id", friend_id)],
                None,
            )
            .await?;
        from_payload(payload)
    }

    /// Record a mutual friend relation.
    pub async fn add_friend(&self, user_id: &str, friend_id: &str) -> Result<AddFriendResponse> {
        let body = serde_json::json!({
            "user_id": user_id,
            "friend_id": friend_id,
        });
        let payload = self.call(Method::POST, "/friends/add", &[], Some(&body)).await?;
        from_payload(payload)
    }

    /// List the user's friends.
    pub async fn friends(&self, user_id: &str) -> Result<FriendsResponse> {
        let payload = self
            .call(Method::GET, "/friends/list", &[("user_id", user_id)], None)
            .await?;
        from_payload(payload)
    }
}

fn from_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        StampTrailError::application(
            format!("unexpected response shape: {}", e),
            502,
            payload,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let config = AppConfig::new(server.uri(), "app-test");
        ApiClient::new(&config, SessionStore::new()).unwrap()
    }

    #[tokio::test]
    async fn authenticate_persists_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .and(body_json(serde_json::json!({ "id_token": "abc" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "access_token": "T",
                "user_id": "U1",
                "display_name": "Alice",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client.authenticate("abc").await.unwrap();

        assert_eq!(response.user_id.as_deref(), Some("U1"));
        let session = client.session().snapshot().await.unwrap();
        assert_eq!(session.access_token, "T");
        assert_eq!(session.user_id, "U1");
        assert_eq!(session.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn failed_authentication_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "message": "token expired",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .session()
            .establish("stale".into(), "U0".into(), None)
            .await;

        let err = client.authenticate("abc").await.unwrap_err();
        match err {
            StampTrailError::Application { message, .. } => assert_eq!(message, "token expired"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.session().snapshot().await.is_none());
    }

    #[tokio::test]
    async fn auth_response_missing_user_id_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "access_token": "T",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.authenticate("abc").await.is_err());
        assert!(client.session().snapshot().await.is_none());
    }

    #[tokio::test]
    async fn empty_id_token_is_rejected_without_network() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let err = client.authenticate("   ").await.unwrap_err();
        assert!(matches!(err, StampTrailError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bearer_token_attached_when_session_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stamps"))
            .and(query_param("userId", "U1"))
            .and(header("Authorization", "Bearer T"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "stamps": [
                    { "stamp_id": "YIL-001", "name": "YIL Entrance", "collected_at": 1700000000 }
                ],
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.session().establish("T".into(), "U1".into(), None).await;

        let stamps = client.stamps("U1").await.unwrap();
        assert_eq!(stamps.len(), 1);
        assert_eq!(stamps[0].stamp_id, "YIL-001");
        assert_eq!(stamps[0].collected_at, Some(1700000000));
    }

    #[tokio::test]
    async fn gateway_wrapped_verification_is_unwrapped() {
        let server = MockServer::start().await;
        let inner = r#"{"ok":true,"within":true,"name":"Plaza","distanceM":12.0,"radiusM":50.0}"#;
        Mock::given(method("POST"))
            .and(path("/gps/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "statusCode": 200,
                "body": inner,
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let verification = client
            .verify_gps("U1", "YIL-001", 35.68, 139.76, Some(8.0))
            .await
            .unwrap();

        assert!(verification.within);
        assert_eq!(verification.distance_m, 12.0);
        assert_eq!(verification.radius_m, 50.0);
    }

    #[tokio::test]
    async fn verify_gps_omits_absent_accuracy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gps/verify"))
            .and(body_json(serde_json::json!({
                "userId": "U1",
                "spotId": "YIL-001",
                "lat": 1.0,
                "lon": 2.0,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true, "within": false, "name": "YIL Entrance",
                "distanceM": 900.0, "radiusM": 50.0,
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let verification = client.verify_gps("U1", "YIL-001", 1.0, 2.0, None).await.unwrap();
        assert!(!verification.within);
    }

    #[tokio::test]
    async fn award_stamp_posts_the_collection_method() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stamps/award"))
            .and(body_json(serde_json::json!({
                "user_id": "U1",
                "stamp_id": "STATUE-001",
                "method": "IMAGE",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "message": "stamp awarded",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client
            .award_stamp("U1", "STATUE-001", CollectionMethod::Image)
            .await
            .unwrap();
        assert!(response.ok);
        assert_eq!(response.message.as_deref(), Some("stamp awarded"));
    }

    #[tokio::test]
    async fn stamps_best_effort_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stamps"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "backend down",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.stamps_best_effort("U1").await.is_empty());
    }

    #[tokio::test]
    async fn connectivity_failure_is_distinguished() {
        // Nothing listens on this port.
        let config = AppConfig::new("http://127.0.0.1:9", "app-test");
        let client = ApiClient::new(&config, SessionStore::new()).unwrap();
        let err = client.stamps("U1").await.unwrap_err();
        assert!(matches!(err, StampTrailError::Connectivity(_)));
    }

    #[tokio::test]
    async fn upload_to_storage_posts_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bucket"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let config = AppConfig::new(server.uri(), "app-test");
        let client = ApiClient::new(&config, SessionStore::new()).unwrap();
        let ticket = UploadTicket {
            ok: true,
            upload_url: format!("{}/bucket", server.uri()),
            fields: [("key".to_string(), "users/U1/images/a.jpg".to_string())]
                .into_iter()
                .collect(),
            key: Some("users/U1/images/a.jpg".to_string()),
            message: None,
        };

        client
            .upload_to_storage(&ticket, "a.jpg", vec![0xFF, 0xD8, 0xFF])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn storage_rejection_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bucket"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let config = AppConfig::new(server.uri(), "app-test");
        let client = ApiClient::new(&config, SessionStore::new()).unwrap();
        let ticket = UploadTicket {
            ok: true,
            upload_url: format!("{}/bucket", server.uri()),
            fields: Default::default(),
            key: None,
            message: None,
        };

        let err = client
            .upload_to_storage(&ticket, "a.jpg", vec![1])
            .await
            .unwrap_err();
        match err {
            StampTrailError::Application { status, .. } => assert_eq!(status, 403),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn friends_ranking_reports_backend_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ranking/friends/weekly"))
            .and(query_param("user_id", "U1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "message": "user_id is required",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .friends_ranking(RankingPeriod::Weekly, "U1")
            .await
            .unwrap_err();
        match err {
            StampTrailError::Application { message, .. } => {
                assert_eq!(message, "user_id is required")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
