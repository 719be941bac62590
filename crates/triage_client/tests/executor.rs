use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use triage_client::{ClientError, ClientSettings, NewProfile, TriageClient};
use triage_core::{ManualSelection, ProfileChoice, SelectionCommit, TargetPick};
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> ClientSettings {
    ClientSettings::new("t0ken").with_root_url(server.uri())
}

fn client(server: &MockServer) -> TriageClient {
    TriageClient::new(settings(server)).unwrap()
}

#[tokio::test]
async fn requests_carry_token_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/s1"))
        .and(header("authorization", "Bearer t0ken"))
        .and(header_regex("user-agent", "^Triage Rust Client/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s1",
            "status": "reported",
            "kind": "url",
            "url": "http://example.com",
            "tasks": [{ "id": "behavioral1", "status": "reported" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = client(&server).sample_by_id("s1").await.unwrap();
    assert_eq!(sample.id, "s1");
    assert_eq!(sample.target(), "http://example.com");
    assert_eq!(sample.tasks.len(), 1);
}

#[tokio::test]
async fn service_errors_decode_the_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "NOT_FOUND",
            "message": "no such sample"
        })))
        .mount(&server)
        .await;

    let err = client(&server).sample_by_id("nope").await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Service {
            status: 404,
            kind: "NOT_FOUND".to_string(),
            message: "no such sample".to_string(),
        }
    );
}

#[tokio::test]
async fn non_json_error_bodies_are_kept_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/s1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway\n"))
        .mount(&server)
        .await;

    let err = client(&server).sample_by_id("s1").await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Service {
            status: 502,
            kind: String::new(),
            message: "Bad Gateway".to_string(),
        }
    );
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client(&server).sample_by_id("s1").await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn empty_body_counts_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v0/samples/s1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_sample("s1").await.unwrap();
}

#[tokio::test]
async fn commit_posts_the_automatic_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/samples/s1/profile"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "auto": true, "pick": ["a.exe"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let commit = SelectionCommit::automatic(&[TargetPick {
        name: "a.exe".to_string(),
        path: "a.exe".to_string(),
    }]);
    client(&server).commit_selection("s1", &commit).await.unwrap();
}

#[tokio::test]
async fn commit_posts_the_manual_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/samples/s1/profile"))
        .and(body_json(json!({
            "auto": false,
            "profiles": [{ "profile": "win10", "pick": "bundle.zip/a.exe" }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let selection = ManualSelection::new(vec![ProfileChoice {
        profile: "win10".to_string(),
        pick: "bundle.zip/a.exe".to_string(),
    }])
    .unwrap();
    client(&server)
        .commit_selection("s1", &SelectionCommit::Manual(selection))
        .await
        .unwrap();
}

#[tokio::test]
async fn url_submission_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/samples"))
        .and(body_json(json!({
            "kind": "url",
            "url": "http://example.com",
            "interactive": true,
            "profiles": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s9",
            "status": "pending",
            "kind": "url",
            "url": "http://example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = client(&server)
        .submit_url("http://example.com", true, &[])
        .await
        .unwrap();
    assert_eq!(sample.id, "s9");
}

#[tokio::test]
async fn file_submission_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/samples"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"_json\""))
        .and(body_string_contains("filename=\"sample.exe\""))
        .and(body_string_contains("MZ-payload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s10",
            "status": "pending",
            "kind": "file",
            "filename": "sample.exe"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = client(&server)
        .submit_file("sample.exe", b"MZ-payload".to_vec(), false, &[], None)
        .await
        .unwrap();
    assert_eq!(sample.target(), "sample.exe");

    let requests = server.received_requests().await.unwrap_or_default();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(!body.contains("password"));
}

#[tokio::test]
async fn archive_password_travels_in_the_json_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/samples"))
        .and(body_string_contains("name=\"_json\""))
        .and(body_string_contains("\"password\":\"infected\""))
        .and(body_string_contains("filename=\"bundle.zip\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s11",
            "status": "pending",
            "kind": "file",
            "filename": "bundle.zip"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = client(&server)
        .submit_file("bundle.zip", b"PK".to_vec(), false, &[], Some("infected"))
        .await
        .unwrap();
    assert_eq!(sample.id, "s11");
}

#[tokio::test]
async fn profiles_are_listed_created_and_deleted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "p1", "name": "win10", "tags": [], "network": "internet", "timeout": 120 }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v0/profiles"))
        .and(body_json(json!({
            "name": "quick",
            "tags": ["x64"],
            "network": "drop",
            "timeout": 60
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p2",
            "name": "quick",
            "tags": ["x64"],
            "network": "drop",
            "timeout": 60
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v0/profiles/p2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let profiles = client.profiles().await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].selector(), "p1");

    let created = client
        .create_profile(&NewProfile {
            name: "quick".to_string(),
            tags: vec!["x64".to_string()],
            network: "drop".to_string(),
            timeout: 60,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "p2");
    client.delete_profile("p2").await.unwrap();
}

#[tokio::test]
async fn reports_are_fetched_by_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/s1/overview.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "analysis": { "score": 10 } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/s1/behavioral1/report_triage.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task": "behavioral1" })))
        .mount(&server)
        .await;

    let client = client(&server);
    let overview: Value = client.overview_report("s1").await.unwrap();
    assert_eq!(overview["analysis"]["score"], 10);
    let task = client.task_report("s1", "behavioral1").await.unwrap();
    assert_eq!(task["task"], "behavioral1");
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/samples/s1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "s1" }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.request_timeout = Duration::from_millis(200);
    let err = TriageClient::new(settings)
        .unwrap()
        .sample_by_id("s1")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
}

#[tokio::test]
async fn root_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/samples/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "s1" })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = ClientSettings::new("t0ken").with_root_url(format!("{}/api/", server.uri()));
    let sample = TriageClient::new(settings)
        .unwrap()
        .sample_by_id("s1")
        .await
        .unwrap();
    assert_eq!(sample.id, "s1");
}

#[test]
fn invalid_root_url_is_rejected() {
    let settings = ClientSettings::new("t0ken").with_root_url("not a url");
    assert!(matches!(
        TriageClient::new(settings),
        Err(ClientError::Transport(_))
    ));
}

#[tokio::test]
async fn set_profile_without_choices_goes_automatic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/samples/s1/profile"))
        .and(body_json(json!({ "auto": true, "pick": [] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v0/samples/s2/profile"))
        .and(body_json(json!({ "auto": true, "pick": ["a.exe", "b.dll"] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.set_profile("s1", Vec::new()).await.unwrap();
    client
        .set_profile_automatically("s2", &["a.exe".to_string(), "b.dll".to_string()])
        .await
        .unwrap();
}
