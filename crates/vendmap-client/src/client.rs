//! Typed client for the vendmap server.
//!
//! Session handling mirrors a browser: `login`/`register` capture the `auth`
//! cookie from `Set-Cookie`, and later calls send it back in a `Cookie`
//! header.

use std::time::Duration;

use reqwest::{header, multipart, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use vendmap_core::{serialize_items, MachineUpdate, MapView, NewMachine, VendingMachineRecord};

use crate::error::ClientError;
use crate::types::{
    BuildingSearch, CurrentUser, ErrorEnvelope, Health, ImageUpload, MapKey, Message,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SESSION_COOKIE: &str = "auth";

pub struct VendmapClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl VendmapClient {
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`ClientError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_base_url(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`ClientError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vendmap-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // A trailing slash keeps `join("api/...")` from replacing the last
        // path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The current session token, if logged in.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // -----------------------------------------------------------------------
    // Machines
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn list_machines(&self) -> Result<Vec<VendingMachineRecord>, ClientError> {
        let response = self.send(self.request(Method::GET, "api/vending-machine")?).await?;
        Self::decode(response, "list_machines").await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 for an unknown id.
    pub async fn get_machine(&self, id: i64) -> Result<VendingMachineRecord, ClientError> {
        let path = format!("api/vending-machine/{id}");
        let response = self.send(self.request(Method::GET, &path)?).await?;
        Self::decode(response, &format!("get_machine(id={id})")).await
    }

    /// Create a machine, optionally uploading a photo in the same request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn create_machine(
        &self,
        machine: &NewMachine,
        image: Option<ImageUpload>,
    ) -> Result<VendingMachineRecord, ClientError> {
        let mut form = multipart::Form::new()
            .text("lat", machine.lat.to_string())
            .text("lon", machine.lon.to_string())
            .text("location", machine.location.clone())
            .text("desc", machine.desc.clone())
            .text("available", machine.available.to_string())
            .text("items", serialize_items(&machine.items));
        if let Some(image) = image {
            form = form.part(
                "image",
                multipart::Part::bytes(image.bytes).file_name(image.file_name),
            );
        }

        let request = self
            .request(Method::POST, "api/vending-machine")?
            .multipart(form);
        let response = self.send(request).await?;
        Self::decode(response, "create_machine").await
    }

    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn update_machine(
        &self,
        id: i64,
        update: &MachineUpdate,
    ) -> Result<VendingMachineRecord, ClientError> {
        let path = format!("api/vending-machine/{id}");
        let request = self.request(Method::PATCH, &path)?.json(update);
        let response = self.send(request).await?;
        Self::decode(response, &format!("update_machine(id={id})")).await
    }

    // -----------------------------------------------------------------------
    // Map helpers
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn map_key(&self) -> Result<Option<String>, ClientError> {
        let response = self.send(self.request(Method::GET, "api/map-key")?).await?;
        let body: MapKey = Self::decode(response, "map_key").await?;
        Ok(body.key)
    }

    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn search_buildings(&self, query: &str) -> Result<BuildingSearch, ClientError> {
        let request = self
            .request(Method::GET, "api/buildings")?
            .query(&[("q", query)]);
        let response = self.send(request).await?;
        Self::decode(response, &format!("search_buildings(q={query})")).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 503 when the database is down.
    pub async fn health(&self) -> Result<Health, ClientError> {
        let response = self.send(self.request(Method::GET, "api/health")?).await?;
        Self::decode(response, "health").await
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    /// Register and keep the issued session token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for missing fields (400) or a taken email
    /// (409).
    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<String, ClientError> {
        let mut body = serde_json::json!({ "email": email, "password": password });
        if let Some(username) = username {
            body["username"] = serde_json::Value::String(username.to_owned());
        }
        let request = self.request(Method::POST, "api/register")?.json(&body);
        self.start_session(request, "register").await
    }

    /// Log in and keep the issued session token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with 404 for an unknown user and 401 for a
    /// wrong password.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<String, ClientError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let request = self.request(Method::POST, "api/login")?.json(&body);
        self.start_session(request, "login").await
    }

    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or status failure.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let response = self.send(self.request(Method::POST, "api/logout")?).await?;
        let ack: Message = Self::decode(response, "logout").await?;
        tracing::debug!(message = %ack.message, "logged out");
        self.token = None;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with 401 when not logged in.
    pub async fn me(&self) -> Result<CurrentUser, ClientError> {
        let response = self.send(self.request(Method::GET, "api/me")?).await?;
        Self::decode(response, "me").await
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}{path}: {e}", self.base_url)))?;
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
        }
        Ok(builder)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| {
                if text.trim().is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_owned()
                } else {
                    text
                }
            });
        tracing::debug!(status = status.as_u16(), %message, "request failed");
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        context: &str,
    ) -> Result<T, ClientError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }

    async fn start_session(
        &mut self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<String, ClientError> {
        let response = self.send(request).await?;
        let token = session_token(&response).ok_or_else(|| ClientError::Api {
            status: response.status().as_u16(),
            message: format!("{context} response did not set a session cookie"),
        })?;
        let ack: Message = Self::decode(response, context).await?;
        tracing::debug!(message = %ack.message, context, "session started");
        self.token = Some(token.clone());
        Ok(token)
    }
}

fn session_token(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}

/// Re-fetch the full list into the view's store. Returns the record count.
///
/// # Errors
///
/// Returns [`ClientError`] if the list request fails; the view is left
/// unchanged in that case.
pub async fn refresh_view(
    client: &VendmapClient,
    view: &mut MapView,
) -> Result<usize, ClientError> {
    let records = client.list_machines().await?;
    let count = records.len();
    view.refresh(records);
    tracing::debug!(count, "map view refreshed");
    Ok(count)
}
