//! Integration tests for the two-step session bootstrap: anti-forgery
//! acquisition strictly before the credentialed login call.

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pandora_api::{ApiError, RestClient};

fn client_for(server: &MockServer) -> RestClient {
    RestClient::with_base_url(server.uri()).expect("mock server URI is a valid base")
}

#[tokio::test]
async fn test_login_attaches_bootstrapped_csrf_token_and_credentials() {
    let server = MockServer::start().await;

    // Step 1: the bare root hands out the anti-forgery cookie.
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "csrftoken=abc123;Domain=.pandora.com;Secure"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Step 2: login must carry the freshly acquired token and the
    // credentials as a JSON body.
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(header("x-csrftoken", "abc123"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "username": "u",
            "password": "p"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"username":"u","webname":"u"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.login("u", "p").await.expect("login should complete");

    assert!(response.status.is_success());
    let body: serde_json::Value = response.json().expect("login body should be JSON");
    assert_eq!(body["username"], "u");
    assert_eq!(client.cookie("csrftoken").as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_login_orders_bootstrap_strictly_before_auth_call() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).append_header("Set-Cookie", "csrftoken=ordered"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login("u", "p").await.expect("login should complete");

    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "HEAD");
    assert_eq!(requests[0].url.path(), "/");
    assert_eq!(requests[1].method.as_str(), "POST");
    assert_eq!(requests[1].url.path(), "/api/v1/auth/login");
}

#[tokio::test]
async fn test_bootstrap_transport_failure_aborts_login() {
    // Nothing listens here, so the HEAD bootstrap fails at the transport
    // layer and auth/login must never be attempted.
    let client = RestClient::with_base_url("http://127.0.0.1:1/").expect("valid base URL");

    let result = client.login("u", "p").await;

    match result {
        Err(ApiError::Transport { url, .. }) => {
            assert!(
                !url.contains("auth/login"),
                "failure must come from the bootstrap request, got {url}"
            );
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(client.cookie_header(), "", "jar must remain untouched");
}

#[tokio::test]
async fn test_bootstrap_status_is_not_interpreted() {
    let server = MockServer::start().await;

    // Even a failing root status still yields its cookies; only transport
    // errors abort the sequence.
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(500).append_header("Set-Cookie", "csrftoken=from500"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(header("x-csrftoken", "from500"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.login("u", "p").await.expect("login should complete");
    assert!(response.status.is_success());
}

#[tokio::test]
async fn test_bad_credentials_surface_as_envelope_not_error() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).append_header("Set-Cookie", "csrftoken=abc123"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"errorCode":1011,"message":"Invalid username or password"}"#),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .login("u", "wrong")
        .await
        .expect("a rejected login is still a completed exchange");

    assert_eq!(response.status.as_u16(), 401);
    let body: serde_json::Value = response.json().expect("error body should be JSON");
    assert_eq!(body["errorCode"], 1011);
}
