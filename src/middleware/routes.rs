use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{Redirect, Response};
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use url::Url;

use super::config::{AuthSettings, SsoAuthConfig};
use super::cookies;
use super::error::AuthError;
use super::state::AuthState;
use super::traits::{BrowserSlot, SsoStateStore};
use crate::error::LoginError;
use crate::handshake::{Handshake, ReturnQuery, Step};
use crate::reconcile::{AuditLog, Reconciler, SessionEstablisher, UserStorage};
use crate::signing;
use crate::types::LocalAccount;

/// Create the VATSIM SSO router.
///
/// Mounts `GET {auth_path}/login`, the single hook that starts a login,
/// receives the return from VATSIM, and finishes the local login.
pub fn sso_routes<U, E, A, T>(
    config: SsoAuthConfig,
    storage: U,
    establisher: E,
    state_store: T,
    audit: A,
) -> Router
where
    U: UserStorage + 'static,
    E: SessionEstablisher + 'static,
    A: AuditLog + 'static,
    T: SsoStateStore,
{
    let auth_path = config.settings.auth_path.clone();
    let return_url = config.client.config().return_url().clone();

    let state = AuthState {
        handshake: Arc::new(Handshake::new(config.client, return_url)),
        reconciler: Arc::new(
            Reconciler::new(storage, establisher, config.reconciler).with_audit(audit),
        ),
        state_store: Arc::new(state_store),
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/login"), get(login_hook::<U, E, A, T>))
        .with_state(state)
}

// ── Login hook ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HookParams {
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
    oauth_cancel: Option<String>,
    wants: Option<String>,
}

async fn login_hook<U, E, A, T>(
    State(state): State<AuthState<U, E, A, T>>,
    jar: PrivateCookieJar,
    Query(params): Query<HookParams>,
) -> Result<(PrivateCookieJar, Redirect), Response>
where
    U: UserStorage + 'static,
    E: SessionEstablisher + 'static,
    A: AuditLog + 'static,
    T: SsoStateStore,
{
    let settings = &state.settings;
    let fail = |e: LoginError| AuthError::from(e).into_response_with(&settings.error_redirect);

    let (browser_session, mut jar) = match cookies::get_browser_session(&jar) {
        Some(id) => (id, jar),
        None => {
            let id = signing::generate_nonce();
            let cookie =
                cookies::browser_session_cookie(&id, settings.secure_cookies, &settings.auth_path);
            (id, jar.add(cookie))
        }
    };

    if let Some(wants) = params.wants {
        if is_same_site(&wants, settings.site_url.as_ref()) {
            jar = jar.add(cookies::wants_cookie(
                &wants,
                settings.secure_cookies,
                &settings.auth_path,
            ));
        } else {
            tracing::debug!(wants = %wants, "Ignoring off-site post-login target");
        }
    }

    let query = ReturnQuery {
        oauth_token: params.oauth_token,
        oauth_verifier: params.oauth_verifier,
        oauth_cancel: params.oauth_cancel,
    };

    let slot = BrowserSlot::new(state.state_store.as_ref(), &browser_session);
    let step = state
        .handshake
        .handle_return(&slot, &query)
        .await
        .map_err(fail)?;

    let identity = match step {
        Step::AwaitingReturn { authorization_url }
        | Step::Restarted {
            authorization_url, ..
        } => return Ok((jar, Redirect::to(authorization_url.as_str()))),
        Step::Verified(identity) => identity,
    };

    let outcome = state
        .reconciler
        .reconcile(&identity)
        .await
        .map_err(fail)?;
    let account = outcome.account();

    let session_id = state
        .reconciler
        .establisher()
        .complete_login(account)
        .await
        .map_err(|e| fail(LoginError::Storage(e)))?;

    let wants = cookies::get_wants(&jar);
    let target = post_login_target(account, wants.as_deref(), settings);

    let session_cookie = cookies::session_cookie(
        &settings.session_cookie_name,
        &session_id,
        settings.session_ttl_days,
        settings.secure_cookies,
    );
    let (clear_browser_session, clear_wants) =
        cookies::clear_handshake_cookies(&settings.auth_path);

    jar = jar.add(session_cookie).add(clear_browser_session);
    // Keep the wanted URL for after the profile has been completed.
    if !target.keeps_wants {
        jar = jar.add(clear_wants);
    }

    tracing::info!(
        user_id = %account.id,
        new_account = outcome.is_new(),
        "VATSIM SSO login successful"
    );

    Ok((jar, Redirect::to(&target.location)))
}

// ── Helpers ────────────────────────────────────────────────────────

struct PostLoginTarget {
    location: String,
    keeps_wants: bool,
}

/// Profile page if the account is incomplete, else the wanted URL, else home.
fn post_login_target(
    account: &LocalAccount,
    wants: Option<&str>,
    settings: &AuthSettings,
) -> PostLoginTarget {
    if !account.is_fully_set_up() {
        return PostLoginTarget {
            location: settings.profile_path.clone(),
            keeps_wants: true,
        };
    }

    let location = wants
        .filter(|w| is_same_site(w, settings.site_url.as_ref()))
        .map_or_else(|| settings.login_redirect.clone(), str::to_string);

    PostLoginTarget {
        location,
        keeps_wants: false,
    }
}

/// A local path, or an absolute URL under the configured site root.
/// Never true for targets containing control characters or whitespace.
fn is_same_site(target: &str, site_url: Option<&Url>) -> bool {
    if target
        .chars()
        .any(|c| c.is_control() || c.is_whitespace())
    {
        return false;
    }
    if target.starts_with('/') {
        return !target.starts_with("//") && !target.starts_with("/\\");
    }
    site_url.is_some_and(|site| target.starts_with(site.as_str()))
}
