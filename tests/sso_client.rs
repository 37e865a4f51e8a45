use serde_json::json;
use url::Url;
use vatsim_sso::{
    Error, ProviderConfig, RequestToken, SignedRequestClient, SigningMethod, SsoClient,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSA_KEY: &str = include_str!("fixtures/rsa_test_key.pem");

fn client_for(server: &MockServer) -> SsoClient {
    let base: Url = format!("{}/sso/", server.uri()).parse().unwrap();
    let config = ProviderConfig::new(
        base,
        "SSO_DEMO",
        "consumer-secret",
        "https://lms.example/auth/vatsim/login".parse().unwrap(),
    );
    SsoClient::new(config).unwrap()
}

fn return_url() -> Url {
    "https://lms.example/auth/vatsim/login".parse().unwrap()
}

fn token(key: &str, secret: &str) -> RequestToken {
    RequestToken {
        token: key.into(),
        token_secret: secret.into(),
    }
}

#[tokio::test]
async fn request_token_sends_signed_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_token/"))
        .and(body_string_contains("oauth_consumer_key=SSO_DEMO"))
        .and(body_string_contains("oauth_signature_method=HMAC-SHA1"))
        .and(body_string_contains("oauth_callback="))
        .and(body_string_contains("oauth_allow_suspended=false"))
        .and(body_string_contains("oauth_signature="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request": { "result": "success", "message": "" },
            "token": { "oauth_token": "tok1", "oauth_token_secret": "sec1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let issued = client
        .request_token(&return_url(), false, false)
        .await
        .unwrap();

    assert_eq!(issued, token("tok1", "sec1"));
}

#[tokio::test]
async fn rsa_client_signs_with_rsa_method() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_token/"))
        .and(body_string_contains("oauth_signature_method=RSA-SHA1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request": { "result": "success" },
            "token": { "oauth_token": "tok1", "oauth_token_secret": "sec1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base: Url = format!("{}/sso/", server.uri()).parse().unwrap();
    let config = ProviderConfig::new(base, "SSO_DEMO", "unused", return_url())
        .with_signing_method(SigningMethod::Rsa)
        .with_certificate(RSA_KEY);
    let client = SsoClient::new(config).unwrap();

    let issued = client
        .request_token(&return_url(), false, false)
        .await
        .unwrap();
    assert_eq!(issued.token, "tok1");
}

#[tokio::test]
async fn failed_result_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request": { "result": "fail", "message": "Invalid consumer key" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .request_token(&return_url(), false, false)
        .await
        .unwrap_err();

    match err {
        Error::Provider { status, detail, .. } => {
            assert_eq!(status, None);
            assert_eq!(detail, "Invalid consumer key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn http_failure_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_token/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .request_token(&return_url(), false, false)
        .await
        .unwrap_err();

    match err {
        Error::Provider { status, detail, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(detail, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn success_without_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request": { "result": "success" },
            "token": { "oauth_token": "", "oauth_token_secret": "" }
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .request_token(&return_url(), false, false)
        .await;
    assert!(matches!(result, Err(Error::Provider { .. })));
}

#[tokio::test]
async fn exchange_returns_member_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_return/"))
        .and(body_string_contains("oauth_token=tok1"))
        .and(body_string_contains("oauth_verifier=ver1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request": { "result": "success", "message": "" },
            "user": {
                "id": 800123,
                "name_first": "Pat",
                "name_last": "Pilot",
                "email": "p@vatsim.example",
                "country": { "code": "GB", "name": "United Kingdom" },
                "rating": { "id": 1, "short": "OBS" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = client_for(&server)
        .exchange_verifier(&token("tok1", "sec1"), "ver1")
        .await
        .unwrap();

    assert_eq!(identity.external_id.as_str(), "800123");
    assert_eq!(identity.email, "p@vatsim.example");
    assert_eq!(identity.first_name, "Pat");
    assert_eq!(identity.last_name, "Pilot");
    assert_eq!(identity.country_code, "GB");
}

#[tokio::test]
async fn exchange_without_user_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sso/api/login_return/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request": { "result": "success" }
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .exchange_verifier(&token("tok1", "sec1"), "ver1")
        .await;
    assert!(matches!(result, Err(Error::Provider { .. })));
}
