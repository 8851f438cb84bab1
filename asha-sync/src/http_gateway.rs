//! REST implementation of [`RemoteGateway`]
//!
//! Every request carries the configured timeout and optional bearer token.
//! Responses are classified before any body is interpreted:
//! - transport failure → `Network`, elapsed timeout → `Timeout`
//! - 409, or 404 on a DELETE → `Conflict`
//! - any other non-2xx → `Status`

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SyncConfig;
use crate::entities::{
    Alert, BeneficiaryProfile, Child, ChildUpdate, DailyLog, Enrollment, HealthLog,
    ProfileUpdate, Scheme, SchemeUpdate, User,
};
use crate::error::{SyncError, SyncResult};
use crate::gateway::{GatewayError, GatewayResult, RemoteGateway};
use crate::wire::{
    WireAlert, WireBeneficiary, WireChild, WireChildUpdate, WireDailyLog, WireDailyLogCreate,
    WireEnrollment, WireEnrollmentCreate, WireHealthLog, WireHealthLogCreate, WireProfileCreate,
    WireProfileUpdate, WireScheme, WireSchemeWrite, WireUser,
};

pub struct HttpGateway {
    client: Client,
    base_url: String,
    health_url: String,
    auth_token: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            health_url: config.health_url(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> GatewayResult<Response> {
        let response = req.send().await.map_err(classify_transport)?;
        check_status(response).await
    }

    /// Send and discard the response body
    async fn execute(&self, req: RequestBuilder) -> GatewayResult<()> {
        self.send(req).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> GatewayResult<()> {
        match self.execute(self.request(Method::DELETE, path)).await {
            Err(GatewayError::Status { status: 404, message }) => {
                Err(GatewayError::Conflict(format!("already deleted: {}", message)))
            }
            other => other,
        }
    }

    async fn fetch_list<W, T>(&self, path: &str) -> GatewayResult<Vec<T>>
    where
        W: DeserializeOwned,
        T: From<W>,
    {
        let response = self.send(self.request(Method::GET, path)).await?;
        let items: Vec<W> = decode(response).await?;
        debug!(path, count = items.len(), "Fetched list");
        Ok(items.into_iter().map(T::from).collect())
    }
}

fn classify_transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(err.to_string())
    } else if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else {
        GatewayError::Network(err.to_string())
    }
}

async fn check_status(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::CONFLICT {
        return Err(GatewayError::Conflict(message));
    }
    Err(GatewayError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let bytes = response.bytes().await.map_err(classify_transport)?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn create_health_log(&self, log: &HealthLog) -> GatewayResult<()> {
        let body = WireHealthLogCreate::from(log);
        self.execute(self.request(Method::POST, "/health-logs/").json(&body))
            .await
    }

    async fn create_daily_log(&self, log: &DailyLog) -> GatewayResult<()> {
        let body = WireDailyLogCreate::from(log);
        self.execute(self.request(Method::POST, "/daily-logs/").json(&body))
            .await
    }

    async fn update_profile(&self, id: &str, updates: &ProfileUpdate) -> GatewayResult<()> {
        let body = WireProfileUpdate::from(updates);
        let path = format!("/beneficiaries/{}", id);
        self.execute(self.request(Method::PUT, &path).json(&body)).await
    }

    async fn trigger_sos(&self, beneficiary_id: &str) -> GatewayResult<()> {
        let path = format!("/alerts/sos/{}", beneficiary_id);
        self.execute(self.request(Method::POST, &path)).await
    }

    async fn enroll(&self, scheme_id: &str, beneficiary_id: &str) -> GatewayResult<()> {
        let body = WireEnrollmentCreate {
            scheme_id,
            beneficiary_id,
        };
        self.execute(self.request(Method::POST, "/enrollments/").json(&body))
            .await
    }

    async fn create_child(&self, child: &Child) -> GatewayResult<()> {
        let body = WireChild::from(child);
        self.execute(self.request(Method::POST, "/children/").json(&body))
            .await
    }

    async fn update_child(&self, id: &str, updates: &ChildUpdate) -> GatewayResult<()> {
        let body = WireChildUpdate::from(updates);
        let path = format!("/children/{}", id);
        self.execute(self.request(Method::PUT, &path).json(&body)).await
    }

    async fn create_scheme(&self, scheme: &Scheme) -> GatewayResult<()> {
        let body = WireSchemeWrite::from(scheme);
        self.execute(self.request(Method::POST, "/schemes/").json(&body))
            .await
    }

    async fn update_scheme(&self, id: &str, updates: &SchemeUpdate) -> GatewayResult<()> {
        let body = WireSchemeWrite::from(updates);
        let path = format!("/schemes/{}", id);
        self.execute(self.request(Method::PUT, &path).json(&body)).await
    }

    async fn resolve_alert(&self, id: &str, notes: Option<&str>) -> GatewayResult<()> {
        let path = format!("/alerts/{}/resolve", id);
        let mut req = self.request(Method::POST, &path);
        if let Some(notes) = notes {
            req = req.query(&[("resolution_notes", notes)]);
        }
        self.execute(req).await
    }

    async fn delete_beneficiary(&self, id: &str) -> GatewayResult<()> {
        self.delete(&format!("/beneficiaries/{}", id)).await
    }

    async fn delete_scheme(&self, id: &str) -> GatewayResult<()> {
        self.delete(&format!("/schemes/{}", id)).await
    }

    async fn list_beneficiaries(&self) -> GatewayResult<Vec<BeneficiaryProfile>> {
        self.fetch_list::<WireBeneficiary, _>("/beneficiaries/").await
    }

    async fn list_children(&self) -> GatewayResult<Vec<Child>> {
        self.fetch_list::<WireChild, _>("/children/").await
    }

    async fn list_schemes(&self) -> GatewayResult<Vec<Scheme>> {
        self.fetch_list::<WireScheme, _>("/schemes/").await
    }

    async fn list_enrollments(&self) -> GatewayResult<Vec<Enrollment>> {
        self.fetch_list::<WireEnrollment, _>("/enrollments/").await
    }

    async fn list_daily_logs(&self) -> GatewayResult<Vec<DailyLog>> {
        self.fetch_list::<WireDailyLog, _>("/daily-logs/").await
    }

    async fn list_health_logs(&self) -> GatewayResult<Vec<HealthLog>> {
        self.fetch_list::<WireHealthLog, _>("/health-logs/").await
    }

    async fn list_alerts(&self) -> GatewayResult<Vec<Alert>> {
        self.fetch_list::<WireAlert, _>("/alerts/").await
    }

    async fn current_user(&self) -> GatewayResult<User> {
        let response = self.send(self.request(Method::GET, "/auth/me")).await?;
        let user: WireUser = decode(response).await?;
        Ok(user.into())
    }

    async fn my_profile(&self) -> GatewayResult<Option<BeneficiaryProfile>> {
        match self
            .send(self.request(Method::GET, "/beneficiaries/my-profile"))
            .await
        {
            Ok(response) => {
                let profile: WireBeneficiary = decode(response).await?;
                Ok(Some(profile.into()))
            }
            Err(GatewayError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_profile(&self, name: &str) -> GatewayResult<BeneficiaryProfile> {
        let body = WireProfileCreate::new(name);
        let response = self
            .send(self.request(Method::POST, "/beneficiaries/").json(&body))
            .await?;
        let profile: WireBeneficiary = decode(response).await?;
        Ok(profile.into())
    }

    async fn health(&self) -> GatewayResult<()> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(classify_transport)?;
        check_status(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> HttpGateway {
        let config = SyncConfig {
            api_base_url: format!("{}/api/v1", server.uri()),
            auth_token: Some("test-token".to_string()),
            request_timeout_secs: 1,
            ..Default::default()
        };
        HttpGateway::new(&config).unwrap()
    }

    fn health_log() -> HealthLog {
        HealthLog {
            id: "log-1".into(),
            beneficiary_id: "ben-1".into(),
            date: "2024-05-01".into(),
            bp_systolic: 150,
            bp_diastolic: 95,
            symptoms: vec!["swelling".into()],
            mood: "anxious".into(),
            is_emergency: true,
        }
    }

    #[tokio::test]
    async fn test_create_health_log_sends_snake_case_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/health-logs/"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "beneficiary_id": "ben-1",
                "bp_systolic": 150,
                "is_emergency": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "log-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        assert_eq!(gateway.create_health_log(&health_log()).await, Ok(()));
    }

    #[tokio::test]
    async fn test_conflict_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/alerts/sos/ben-1"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate"))
            .mount(&server)
            .await;

        let err = gateway_for(&server).trigger_sos("ben-1").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_server_error_is_application_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/children/c1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .update_child("c1", &ChildUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Status {
                status: 500,
                message: "boom".into()
            }
        );
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn test_delete_not_found_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/schemes/s1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = gateway_for(&server).delete_scheme("s1").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        let config = SyncConfig {
            api_base_url: "http://127.0.0.1:9/api/v1".to_string(),
            request_timeout_secs: 1,
            ..Default::default()
        };
        let gateway = HttpGateway::new(&config).unwrap();
        let err = gateway.list_alerts().await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/alerts/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = gateway_for(&server).list_alerts().await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_list_schemes_maps_wire_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/schemes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "s1",
                "scheme_name": "Poshan Abhiyaan",
                "provider": "Govt",
                "status": "active",
                "category": "nutrition",
                "enrolled_count": 4
            }])))
            .mount(&server)
            .await;

        let schemes = gateway_for(&server).list_schemes().await.unwrap();
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes[0].title, "Poshan Abhiyaan");
        assert_eq!(schemes[0].enrolled_count, 4);
    }

    #[tokio::test]
    async fn test_malformed_list_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/children/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = gateway_for(&server).list_children().await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[tokio::test]
    async fn test_my_profile_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/beneficiaries/my-profile"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_eq!(gateway_for(&server).my_profile().await, Ok(None));
    }

    #[tokio::test]
    async fn test_resolve_alert_passes_notes_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/alerts/a1/resolve"))
            .and(query_param("resolution_notes", "visited"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway_for(&server).resolve_alert("a1", Some("visited")).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_health_probe_hits_server_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(gateway_for(&server).health().await, Ok(()));
    }
}
