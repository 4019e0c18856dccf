//! Auth session state machine and route guard.
//!
//! ```text
//!             CheckStarted                 Authenticated(user)
//!  Anonymous ─────────────▶ Checking ──────────────────────────▶ Authenticated
//!      ▲                       │                                      │
//!      └──── Unauthenticated ──┘◀──────────── LoggedOut ──────────────┘
//! ```
//!
//! The transition logic ([`next_state`]) and the route guard ([`guard`]) are
//! pure. [`AuthSession`] performs the network calls and returns a
//! [`Navigation`] directive instead of navigating itself.

use serde_json::json;
use std::fmt;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{LoginRequest, LogoutAllResponse, TokenResponse, UserInfo};
use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";
pub const WORKSPACE_PATH: &str = "/research";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Anonymous,
    Checking,
    Authenticated(UserInfo),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserInfo> {
        match self {
            AuthState::Authenticated(u) => Some(u),
            _ => None,
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Anonymous => f.write_str("anonymous"),
            AuthState::Checking => f.write_str("checking"),
            AuthState::Authenticated(u) => write!(f, "authenticated as {}", u.username),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    CheckStarted,
    Authenticated(UserInfo),
    Unauthenticated,
    LoggedOut,
}

/// Computes the next state.
///
/// A user only becomes authenticated out of `Checking`; a check result that
/// arrives after a logout leaves the session anonymous.
pub fn next_state(state: &AuthState, event: AuthEvent) -> AuthState {
    match (state, event) {
        (_, AuthEvent::CheckStarted) => AuthState::Checking,
        (AuthState::Checking, AuthEvent::Authenticated(user)) => AuthState::Authenticated(user),
        (current, AuthEvent::Authenticated(_)) => current.clone(),
        (_, AuthEvent::Unauthenticated) | (_, AuthEvent::LoggedOut) => AuthState::Anonymous,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Workspace,
    Protected(String),
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            LOGIN_PATH => Route::Login,
            "" | WORKSPACE_PATH => Route::Workspace,
            other => Route::Protected(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Login => LOGIN_PATH,
            Route::Workspace => WORKSPACE_PATH,
            Route::Protected(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    /// Show a loading placeholder; auth is still being resolved.
    Loading,
    Redirect(Route),
}

pub fn guard(state: &AuthState, route: &Route) -> RouteDecision {
    match (state, route) {
        (AuthState::Checking, _) => RouteDecision::Loading,
        (AuthState::Anonymous, Route::Login) => RouteDecision::Render,
        (AuthState::Anonymous, _) => RouteDecision::Redirect(Route::Login),
        (AuthState::Authenticated(_), Route::Login) => RouteDecision::Redirect(Route::Workspace),
        (AuthState::Authenticated(_), _) => RouteDecision::Render,
    }
}

/// What the UI should do after an auth operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Redirect(Route),
}

/// Drives the auth state machine against the backend.
pub struct AuthSession {
    client: ApiClient,
    session: Session,
    state: AuthState,
}

impl AuthSession {
    /// Starts in `Checking`, the state on page load.
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self {
            client,
            session,
            state: AuthState::Checking,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn guard(&self, route: &Route) -> RouteDecision {
        guard(&self.state, route)
    }

    fn apply(&mut self, event: AuthEvent) {
        self.state = next_state(&self.state, event);
    }

    /// Exchanges the refresh cookie for a token and loads the current user.
    ///
    /// A 401 from either call clears the token and ends `Anonymous`. Any
    /// other error is returned and the state stays `Checking`.
    pub async fn check_auth(&mut self) -> Result<&AuthState> {
        self.apply(AuthEvent::CheckStarted);

        let outcome = async {
            self.client
                .post(&self.session, "/auth/refresh", &json!({}))
                .await?;
            self.client
                .get_json::<UserInfo>(&self.session, "/auth/me", &[])
                .await
        }
        .await;

        match outcome {
            Ok(user) => {
                info!(username = %user.username, "session restored");
                self.apply(AuthEvent::Authenticated(user));
            }
            Err(e) if e.is_unauthorized() => {
                self.session.clear();
                self.apply(AuthEvent::Unauthenticated);
            }
            Err(e) => return Err(e),
        }

        Ok(&self.state)
    }

    /// Logs in, then re-runs the refresh check.
    ///
    /// Returns a redirect to the workspace when the check succeeds.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Navigation> {
        self.apply(AuthEvent::CheckStarted);

        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        if let Err(e) = self
            .client
            .post_json::<_, TokenResponse>(&self.session, "/auth/login", &req)
            .await
        {
            self.session.clear();
            self.apply(AuthEvent::Unauthenticated);
            return Err(e);
        }

        if self.check_auth().await?.is_authenticated() {
            Ok(Navigation::Redirect(Route::Workspace))
        } else {
            Ok(Navigation::Stay)
        }
    }

    /// Revokes this device's refresh token. Local state is cleared even if
    /// the backend call fails; the failure is only logged.
    pub async fn logout(&mut self) {
        if let Err(e) = self
            .client
            .post(&self.session, "/auth/logout", &json!({}))
            .await
        {
            warn!(error = %e, "logout request failed; clearing local session anyway");
        }
        self.session.clear();
        self.apply(AuthEvent::LoggedOut);
    }

    /// Revokes every refresh token of the user.
    ///
    /// Returns the number revoked, or `None` when the backend call failed
    /// (the local session is cleared either way).
    pub async fn logout_all(&mut self) -> Option<u64> {
        let revoked = match self
            .client
            .post_json::<_, LogoutAllResponse>(&self.session, "/auth/logout-all", &json!({}))
            .await
        {
            Ok(resp) => {
                info!(tokens_revoked = resp.tokens_revoked, "logged out from all devices");
                Some(resp.tokens_revoked)
            }
            Err(e) => {
                warn!(error = %e, "logout-all request failed; clearing local session anyway");
                None
            }
        };
        self.session.clear();
        self.apply(AuthEvent::LoggedOut);
        revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserInfo {
        UserInfo {
            user_id: "user-demo-001".into(),
            username: "demo".into(),
            email: None,
            role: "user".into(),
            created_at: None,
        }
    }

    #[test]
    fn transitions() {
        let s = next_state(&AuthState::Anonymous, AuthEvent::CheckStarted);
        assert_eq!(s, AuthState::Checking);
        let s = next_state(&s, AuthEvent::Authenticated(user()));
        assert!(s.is_authenticated());
        let s = next_state(&s, AuthEvent::LoggedOut);
        assert_eq!(s, AuthState::Anonymous);
        let s = next_state(&AuthState::Checking, AuthEvent::Unauthenticated);
        assert_eq!(s, AuthState::Anonymous);
    }

    #[test]
    fn late_check_result_does_not_resurrect() {
        let s = next_state(&AuthState::Anonymous, AuthEvent::Authenticated(user()));
        assert_eq!(s, AuthState::Anonymous);
    }

    #[test]
    fn guard_while_checking_shows_loading() {
        assert_eq!(
            guard(&AuthState::Checking, &Route::Workspace),
            RouteDecision::Loading
        );
        assert_eq!(guard(&AuthState::Checking, &Route::Login), RouteDecision::Loading);
    }

    #[test]
    fn guard_redirects() {
        let authed = AuthState::Authenticated(user());
        let reports = Route::from_path("/reports");
        assert_eq!(
            guard(&AuthState::Anonymous, &reports),
            RouteDecision::Redirect(Route::Login)
        );
        assert_eq!(guard(&AuthState::Anonymous, &Route::Login), RouteDecision::Render);
        assert_eq!(
            guard(&authed, &Route::Login),
            RouteDecision::Redirect(Route::Workspace)
        );
        assert_eq!(guard(&authed, &reports), RouteDecision::Render);
    }

    #[test]
    fn route_paths() {
        assert_eq!(Route::from_path("/login/"), Route::Login);
        assert_eq!(Route::from_path("/"), Route::Workspace);
        assert_eq!(Route::from_path("/research"), Route::Workspace);
        assert_eq!(Route::from_path("/crypto").path(), "/crypto");
        assert_eq!(Route::Workspace.path(), WORKSPACE_PATH);
    }
}
