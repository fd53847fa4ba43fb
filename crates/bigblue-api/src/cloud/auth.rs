// Cloud authentication
//
// Email/password login. The returned token is sent verbatim in the
// `Authorization` header of every later request, together with the user
// id in the request body.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, error, info};

use super::client::{CloudClient, decode};
use super::paths;
use crate::error::Error;
use crate::models::LoginData;
use crate::session::Session;

impl CloudClient {
    /// Log in and install a fresh session, replacing any previous one.
    pub async fn authenticate(&self) -> Result<Arc<Session>, Error> {
        let _guard = self.login_guard().await;
        self.login().await
    }

    /// Boolean form of [`authenticate`](Self::authenticate); the failure
    /// is logged.
    pub async fn try_authenticate(&self) -> bool {
        match self.authenticate().await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, email = %self.email(), "authentication failed");
                false
            }
        }
    }

    /// Login without taking the lock. Callers must hold `login_guard()`.
    pub(super) async fn login(&self) -> Result<Arc<Session>, Error> {
        debug!(email = %self.email(), "logging in");

        let body = json!({
            "email": self.email(),
            "password": self.password().expose_secret(),
        });

        let data = self
            .send(paths::LOGIN, None, &body)
            .await
            .map_err(|e| match e {
                Error::Api { code, message } => Error::Authentication {
                    message: format!("login rejected (code {code}): {message}"),
                },
                Error::Http {
                    status: status @ (401 | 403),
                    body,
                } => Error::Authentication {
                    message: format!("login failed (HTTP {status}): {body}"),
                },
                other => other,
            })?;

        let login: LoginData = decode(data)?;

        let token = login
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no token".into(),
            })?;
        let user_id = login
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no user id".into(),
            })?;

        let session = Arc::new(Session::new(token.into(), user_id, login.name));
        self.install_session(Arc::clone(&session));

        info!(user_id = %session.user_id(), "login successful");
        Ok(session)
    }
}
