// Cloud API HTTP client
//
// Wraps `reqwest::Client` with envelope unwrapping and session handling.
// Every authenticated call goes through `call()`, which renews the session
// once and retries once when the server answers with the invalid-token
// code.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, codes, preview};
use crate::models::ApiResponse;
use crate::session::Session;
use crate::transport::TransportConfig;

/// HTTP client for the Powafree cloud.
///
/// Holds the account credentials and the current session; nothing else.
/// The underlying `reqwest::Client` is built once and reused for every
/// request.
pub struct CloudClient {
    http: reqwest::Client,
    base_url: Url,
    email: String,
    password: SecretString,
    session: RwLock<Option<Arc<Session>>>,
    /// Serializes logins so concurrent token rejections renew once.
    login_lock: Mutex<()>,
}

impl CloudClient {
    /// Create a client for `base_url` (e.g. `http://www.powafree.com`).
    pub fn new(
        base_url: Url,
        email: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            transport.build_client()?,
            base_url,
            email,
            password,
        ))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        email: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            email: email.into(),
            password,
            session: RwLock::new(None),
            login_lock: Mutex::new(()),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    // ── Session state ────────────────────────────────────────────────

    /// The current session, if logged in.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_session(&self) -> bool {
        self.session().is_some()
    }

    /// Forget the current session. The next call must authenticate again.
    pub fn clear_session(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn install_session(&self, session: Arc<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.password
    }

    pub(crate) async fn login_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.login_lock.lock().await
    }

    /// Replace `stale` with a fresh session, unless another task already
    /// did so while this one waited for the login lock.
    async fn renew_session(&self, stale: &Arc<Session>) -> Result<Arc<Session>, Error> {
        let _guard = self.login_guard().await;
        if let Some(current) = self.session() {
            if !Arc::ptr_eq(&current, stale) {
                debug!("session already renewed by a concurrent request");
                return Ok(current);
            }
        }
        self.login().await
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// POST `body` to `path` and unwrap the envelope, returning `data`
    /// (`null` when absent).
    pub(crate) async fn send(
        &self,
        path: &str,
        token: Option<&SecretString>,
        body: &Value,
    ) -> Result<Value, Error> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);

        let mut builder = self.http.post(url).json(body);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token.expose_secret());
        }
        let resp = builder.send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        trace!(%status, body = %text, "response");

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview(&text),
            });
        }

        let envelope: ApiResponse = serde_json::from_str(&text).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&text)),
                body: text.clone(),
            }
        })?;

        if envelope.code == codes::SUCCESS {
            Ok(envelope.data.unwrap_or(Value::Null))
        } else {
            Err(Error::from_code(envelope.code, envelope.message))
        }
    }

    /// Authenticated call with transparent re-authentication.
    ///
    /// `body` is rebuilt from the session so a retry after renewal carries
    /// the new user id as well as the new token.
    pub(crate) async fn call<T, F>(&self, path: &str, body: F) -> Result<T, Error>
    where
        T: DeserializeOwned,
        F: Fn(&Session) -> Value + Send,
    {
        let session = self.session().ok_or(Error::NotAuthenticated)?;

        let data = match self.send(path, Some(session.token()), &body(&session)).await {
            Err(Error::TokenExpired) => {
                warn!(path, "token rejected, re-authenticating");
                let fresh = self.renew_session(&session).await?;
                self.send(path, Some(fresh.token()), &body(&fresh)).await?
            }
            other => other?,
        };

        decode(data)
    }

    /// Authenticated device-scoped call with `{userId, bleMac}` as body.
    pub(crate) async fn device_call<T>(&self, path: &str, mac: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        require_mac(mac)?;
        self.call(path, |s| json!({ "userId": s.user_id(), "bleMac": mac }))
            .await
    }
}

pub(crate) fn require_mac(mac: &str) -> Result<(), Error> {
    if mac.trim().is_empty() {
        Err(Error::MissingDevice)
    } else {
        Ok(())
    }
}

pub(crate) fn decode<T: DeserializeOwned>(data: Value) -> Result<T, Error> {
    T::deserialize(&data).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: data.to_string(),
    })
}
