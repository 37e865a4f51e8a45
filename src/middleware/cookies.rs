use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

const BROWSER_SESSION_COOKIE_NAME: &str = "__vatsim_sso_sid";
const WANTS_COOKIE_NAME: &str = "__vatsim_wants";

/// Browser session lifetime; long enough for a slow login at VATSIM.
const HANDSHAKE_TTL_MINUTES: i64 = 30;

/// [`HANDSHAKE_TTL_MINUTES`] for server-side handshake state.
pub(super) const HANDSHAKE_TTL: std::time::Duration =
    std::time::Duration::from_secs(HANDSHAKE_TTL_MINUTES.unsigned_abs() * 60);

/// Create the cookie identifying this browser's handshake session.
pub(super) fn browser_session_cookie(
    browser_session: &str,
    secure: bool,
    auth_path: &str,
) -> Cookie<'static> {
    Cookie::build((BROWSER_SESSION_COOKIE_NAME, browser_session.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_string())
        .max_age(Duration::minutes(HANDSHAKE_TTL_MINUTES))
        .build()
}

/// Create the cookie remembering where the user wanted to go.
pub(super) fn wants_cookie(wants: &str, secure: bool, auth_path: &str) -> Cookie<'static> {
    Cookie::build((WANTS_COOKIE_NAME, wants.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_string())
        .max_age(Duration::minutes(HANDSHAKE_TTL_MINUTES))
        .build()
}

/// Create removal cookies for the browser session id + wants URL.
pub(super) fn clear_handshake_cookies(auth_path: &str) -> (Cookie<'static>, Cookie<'static>) {
    let browser_session = Cookie::build((BROWSER_SESSION_COOKIE_NAME, ""))
        .path(auth_path.to_string())
        .max_age(Duration::ZERO)
        .build();

    let wants = Cookie::build((WANTS_COOKIE_NAME, ""))
        .path(auth_path.to_string())
        .max_age(Duration::ZERO)
        .build();

    (browser_session, wants)
}

/// Create session cookie.
pub(super) fn session_cookie(
    name: &str,
    session_id: &str,
    ttl_days: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(ttl_days))
        .build()
}

/// Get the browser session id from cookies.
pub(super) fn get_browser_session(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(BROWSER_SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Get the remembered post-login target from cookies.
pub(super) fn get_wants(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(WANTS_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
