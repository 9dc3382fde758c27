//! REST client for the meal-tracking backend.
//!
//! Every endpoint goes through a [`CallGateway`] whose timeout depends on
//! the endpoint family (see [`EndpointTimeouts`]). The bearer token comes
//! from a [`TokenManager`]; a 401 from any endpoint purges it and
//! broadcasts [`SessionEvent::SignInRequired`].

pub mod token;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use token::{FileStore, MemoryStore, SecureStore, TokenManager};
pub use types::*;

use crate::error::retry_after;
use crate::gateway::{CallGateway, RetryConfig};
use crate::{MealgateError, Result};

/// Per-endpoint-family attempt timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTimeouts {
    /// Questionnaires, profile, calendar. Default: 15s.
    pub default: Duration,
    /// Login, register, logout. Default: 10s.
    pub auth: Duration,
    /// Meal log. Default: 30s.
    pub meals: Duration,
    /// Chat. Default: 60s.
    pub chat: Duration,
}

impl Default for EndpointTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(15),
            auth: Duration::from_secs(10),
            meals: Duration::from_secs(30),
            chat: Duration::from_secs(60),
        }
    }
}

impl EndpointTimeouts {
    pub fn for_endpoint(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Default => self.default,
            Endpoint::Auth => self.auth,
            Endpoint::Meals => self.meals,
            Endpoint::Chat => self.chat,
        }
    }
}

/// Endpoint family, selects the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Default,
    Auth,
    Meals,
    Chat,
}

/// Authentication state changes observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// The backend rejected the stored token. It has been purged.
    SignInRequired,
}

const EVENT_CAPACITY: usize = 16;

/// Backend API client.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use mealgate::backend::{BackendClient, MemoryStore, TokenManager};
/// # async fn run() -> mealgate::Result<()> {
/// let tokens = TokenManager::new(Arc::new(MemoryStore::new()));
/// let client = BackendClient::new("https://api.example.com", tokens)?;
/// client.login("me@example.com", "hunter2").await?;
/// let meals = client.list_meals(Some("2026-01-31")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Arc<str>,
    gateway: CallGateway,
    timeouts: EndpointTimeouts,
    tokens: TokenManager,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client with default retry policy and timeouts.
    pub fn new(base_url: impl AsRef<str>, tokens: TokenManager) -> Result<Self> {
        Self::with_config(
            base_url,
            tokens,
            RetryConfig::default(),
            EndpointTimeouts::default(),
        )
    }

    pub fn with_config(
        base_url: impl AsRef<str>,
        tokens: TokenManager,
        retry: RetryConfig,
        timeouts: EndpointTimeouts,
    ) -> Result<Self> {
        let http = Client::builder().build().map_err(|e| {
            MealgateError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            http,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
            gateway: CallGateway::new(retry, timeouts.default),
            timeouts,
            tokens,
            events,
        })
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn timeouts(&self) -> &EndpointTimeouts {
        &self.timeouts
    }

    // Auth

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .send("login", Endpoint::Auth, Method::POST, "/auth/login", &[], Some(&body))
            .await?;
        self.start_session(&auth).await?;
        Ok(auth)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        let auth: AuthResponse = self
            .send(
                "register",
                Endpoint::Auth,
                Method::POST,
                "/auth/register",
                &[],
                Some(request),
            )
            .await?;
        self.start_session(&auth).await?;
        Ok(auth)
    }

    /// Sign out. The local token is dropped even when the backend call fails.
    pub async fn logout(&self) -> Result<()> {
        let result = self
            .send_unit::<()>("logout", Endpoint::Auth, Method::POST, "/auth/logout", None)
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "logout request failed, clearing local session anyway");
        }
        self.tokens.clear().await?;
        info!("signed out");
        let _ = self.events.send(SessionEvent::SignedOut);
        result
    }

    // Meals

    /// Meals logged on `date` (`YYYY-MM-DD`), or all meals.
    pub async fn list_meals(&self, date: Option<&str>) -> Result<Vec<Meal>> {
        let query: Vec<(&str, &str)> = date.into_iter().map(|d| ("date", d)).collect();
        self.send::<(), _>("list_meals", Endpoint::Meals, Method::GET, "/meals", &query, None)
            .await
    }

    pub async fn get_meal(&self, id: &str) -> Result<Meal> {
        let path = format!("/meals/{id}");
        self.send::<(), _>("get_meal", Endpoint::Meals, Method::GET, &path, &[], None)
            .await
    }

    pub async fn create_meal(&self, meal: &NewMeal) -> Result<Meal> {
        self.send("create_meal", Endpoint::Meals, Method::POST, "/meals", &[], Some(meal))
            .await
    }

    pub async fn delete_meal(&self, id: &str) -> Result<()> {
        let path = format!("/meals/{id}");
        self.send_unit::<()>("delete_meal", Endpoint::Meals, Method::DELETE, &path, None)
            .await
    }

    // Chat

    pub async fn list_messages(&self) -> Result<Vec<ChatMessage>> {
        self.send::<(), _>("list_messages", Endpoint::Chat, Method::GET, "/chat/messages", &[], None)
            .await
    }

    /// Send a chat message and return the assistant's reply.
    pub async fn send_message(&self, content: &str) -> Result<ChatMessage> {
        let body = NewChatMessage {
            content: content.to_string(),
        };
        self.send(
            "send_message",
            Endpoint::Chat,
            Method::POST,
            "/chat/messages",
            &[],
            Some(&body),
        )
        .await
    }

    // Questionnaires

    pub async fn get_questionnaire(&self, id: &str) -> Result<Questionnaire> {
        let path = format!("/questionnaires/{id}");
        self.send::<(), _>("get_questionnaire", Endpoint::Default, Method::GET, &path, &[], None)
            .await
    }

    pub async fn submit_questionnaire(
        &self,
        id: &str,
        answers: &[QuestionnaireAnswer],
    ) -> Result<()> {
        let path = format!("/questionnaires/{id}/responses");
        self.send_unit(
            "submit_questionnaire",
            Endpoint::Default,
            Method::POST,
            &path,
            Some(answers),
        )
        .await
    }

    // Profile

    pub async fn get_profile(&self) -> Result<UserProfile> {
        self.send::<(), _>("get_profile", Endpoint::Default, Method::GET, "/users/me", &[], None)
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        self.send(
            "update_profile",
            Endpoint::Default,
            Method::PUT,
            "/users/me",
            &[],
            Some(update),
        )
        .await
    }

    // Calendar

    /// Events between `from` and `to` (RFC 3339), when given.
    pub async fn list_events(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<CalendarEvent>> {
        let query: Vec<(&str, &str)> = [("from", from), ("to", to)]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        self.send::<(), _>("list_events", Endpoint::Default, Method::GET, "/calendar/events", &query, None)
            .await
    }

    pub async fn create_event(&self, event: &NewCalendarEvent) -> Result<CalendarEvent> {
        self.send(
            "create_event",
            Endpoint::Default,
            Method::POST,
            "/calendar/events",
            &[],
            Some(event),
        )
        .await
    }

    async fn start_session(&self, auth: &AuthResponse) -> Result<()> {
        self.tokens.set_token(&auth.access_token).await?;
        info!("signed in");
        let _ = self.events.send(SessionEvent::SignedIn);
        Ok(())
    }

    /// One gateway-wrapped request whose JSON reply is decoded into `T`.
    ///
    /// Decoding happens after the gateway returns, so a 2xx reply that
    /// doesn't match `T` is reported once and never re-sent.
    async fn send<B, T>(
        &self,
        operation: &'static str,
        endpoint: Endpoint,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let text = self
            .request(operation, endpoint, method, path, query, body)
            .await?;
        decode_body(operation, &text)
    }

    /// Like [`send`](Self::send) for endpoints whose reply body is ignored.
    async fn send_unit<B>(
        &self,
        operation: &'static str,
        endpoint: Endpoint,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.request(operation, endpoint, method, path, &[], body)
            .await
            .map(drop)
    }

    /// Retried transport: returns the raw body of a 2xx reply.
    /// The token is read once per call.
    async fn request<B>(
        &self,
        operation: &'static str,
        endpoint: Endpoint,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<String>
    where
        B: Serialize + ?Sized + Sync,
    {
        let timeout = self.timeouts.for_endpoint(endpoint);
        let gateway = self.gateway.with_timeout(timeout);
        let url = format!("{}{path}", self.base_url);
        let token = self.tokens.token().await?;

        let http = &self.http;
        let url = &url;
        let token = token.as_deref();
        let method = &method;

        let result = gateway
            .call(operation, || async move {
                let mut request = http.request(method.clone(), url);
                if !query.is_empty() {
                    request = request.query(query);
                }
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| MealgateError::from_reqwest(e, timeout))?;
                read_response(response, timeout).await
            })
            .await;

        if matches!(result, Err(MealgateError::Unauthorized)) {
            self.handle_unauthorized(operation).await;
        }
        result
    }

    async fn handle_unauthorized(&self, operation: &str) {
        if let Err(e) = self.tokens.clear().await {
            warn!(operation, error = %e, "failed to purge rejected token");
        }
        info!(operation, "backend rejected credentials, sign-in required");
        let _ = self.events.send(SessionEvent::SignInRequired);
    }
}

async fn read_response(response: reqwest::Response, timeout: Duration) -> Result<String> {
    let status = response.status();
    let hint = retry_after(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| MealgateError::from_reqwest(e, timeout))?;

    if !status.is_success() {
        debug!(status = status.as_u16(), "backend returned error status");
        return Err(MealgateError::from_status(status.as_u16(), hint, &body));
    }
    Ok(body)
}

fn decode_body<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| {
        warn!(operation, error = %e, "backend reply did not match the expected shape");
        MealgateError::ParseFailed(format!("unexpected backend response: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_timeouts_defaults() {
        let t = EndpointTimeouts::default();
        assert_eq!(t.for_endpoint(Endpoint::Auth), Duration::from_secs(10));
        assert_eq!(t.for_endpoint(Endpoint::Meals), Duration::from_secs(30));
        assert_eq!(t.for_endpoint(Endpoint::Chat), Duration::from_secs(60));
        assert_eq!(t.for_endpoint(Endpoint::Default), Duration::from_secs(15));
    }

    #[test]
    fn base_url_is_normalized() {
        let tokens = TokenManager::new(Arc::new(MemoryStore::new()));
        let client = BackendClient::new("http://localhost:8080/", tokens).unwrap();
        assert_eq!(&*client.base_url, "http://localhost:8080");
    }
}
