//! Thin typed wrapper over the Farewatch HTTP API.
//!
//! One method per backend call. Methods report failures as [`ApiError`]
//! and never retry; callers decide what a failure means for their state.

use reqwest::{header, Client, Method, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::airports::AirportSuggestion;
use crate::error::ApiError;
use crate::search::{FlightResult, SearchRequest};
use crate::session::StoredSession;
use crate::watches::{PriceWatch, WatchPayload};

/// Cookie values issued by a successful login.
///
/// Either token may be absent if the server changes its cookie contract;
/// callers decide which ones they cannot live without.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<FlightResult>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    cookie: Option<String>,
}

impl ApiClient {
    pub fn new(http: Client, base_url: String) -> Self {
        Self {
            http,
            base_url,
            cookie: None,
        }
    }

    /// Attach stored credentials; they ride along as a `Cookie` header.
    pub fn with_session(mut self, session: &StoredSession) -> Self {
        self.cookie = Some(session.cookie_header());
        self
    }

    pub fn set_session(&mut self, session: &StoredSession) {
        self.cookie = Some(session.cookie_header());
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let mut req = self.http.request(method, url);
        if let Some(cookie) = &self.cookie {
            req = req.header(header::COOKIE, cookie);
        }
        req
    }

    async fn send_checked(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let fallback = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
        let body = resp.text().await.unwrap_or_default();
        let detail = detail_from_body(&body).unwrap_or(fallback);
        Err(ApiError::Status { status, detail })
    }

    /// Probe the authenticated landing route. Success means the current
    /// cookies are accepted; any failure means they are not.
    pub async fn probe_home(&self) -> Result<(), ApiError> {
        self.send_checked(self.request(Method::GET, "/auth/home"))
            .await?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginTokens, ApiError> {
        let req = self
            .request(Method::POST, "/auth/login")
            .json(&serde_json::json!({ "email": email, "password": password }));
        let resp = self.send_checked(req).await?;

        let mut tokens = LoginTokens {
            access_token: None,
            refresh_token: None,
        };
        for cookie in resp.cookies() {
            match cookie.name() {
                "access_token" => tokens.access_token = Some(cookie.value().to_string()),
                "refresh_token" => tokens.refresh_token = Some(cookie.value().to_string()),
                _ => {}
            }
        }
        Ok(tokens)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let req = self
            .request(Method::POST, "/auth/register")
            .json(&serde_json::json!({ "email": email, "password": password }));
        let resp = self.send_checked(req).await?;
        let out: MessageResponse = resp.json().await.map_err(ApiError::Decode)?;
        Ok(out.message)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send_checked(self.request(Method::POST, "/auth/logout"))
            .await?;
        Ok(())
    }

    /// Exchange the refresh cookie for a new access token.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let resp = self
            .send_checked(self.request(Method::POST, "/auth/refresh"))
            .await?;
        let out: RefreshResponse = resp.json().await.map_err(ApiError::Decode)?;
        Ok(out.access_token)
    }

    /// Run one page of a destination search. An absent `data` field is an
    /// empty page.
    pub async fn flight_destinations(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<FlightResult>, ApiError> {
        let req = self
            .request(Method::POST, "/api/flight_destinations")
            .json(request);
        let resp = self.send_checked(req).await?;
        let out: SearchResponse = resp.json().await.map_err(ApiError::Decode)?;
        Ok(out.data)
    }

    pub async fn airport_autocomplete(
        &self,
        term: &str,
    ) -> Result<Vec<AirportSuggestion>, ApiError> {
        let req = self
            .request(Method::GET, "/api/airport_autocomplete")
            .query(&[("term", term)]);
        let resp = self.send_checked(req).await?;
        resp.json().await.map_err(ApiError::Decode)
    }

    pub async fn list_watches(&self) -> Result<Vec<PriceWatch>, ApiError> {
        let resp = self
            .send_checked(self.request(Method::GET, "/notify/notifications/"))
            .await?;
        resp.json().await.map_err(ApiError::Decode)
    }

    pub async fn create_watch(&self, payload: &WatchPayload) -> Result<PriceWatch, ApiError> {
        let req = self
            .request(Method::POST, "/notify/notifications/")
            .json(payload);
        let resp = self.send_checked(req).await?;
        resp.json().await.map_err(ApiError::Decode)
    }

    pub async fn delete_watch(&self, id: i64) -> Result<(), ApiError> {
        let path = format!("/notify/notifications/{}/", id);
        self.send_checked(self.request(Method::DELETE, &path))
            .await?;
        Ok(())
    }
}

/// Pull the human-readable message out of an error body. The backend
/// reports failures as `{"detail": ...}`; anything else is passed through
/// verbatim.
fn detail_from_body(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(body.to_string()),
        },
        Err(_) => Some(body.to_string()),
    }
}
