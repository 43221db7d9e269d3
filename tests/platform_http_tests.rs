// Platform adapter tests - GitHub and GitLab REST against a local server
//
// The fake APIs answer fixed routes and record the headers and bodies the
// adapters send.

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use dewhale::domain::IssueRef;
use dewhale::platform::{GithubPlatform, GitlabPlatform, Platform, PlatformError};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorder {
    headers: Arc<Mutex<Vec<HeaderMap>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    posted: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    fn seen(&self, headers: HeaderMap, query: HashMap<String, String>) {
        self.headers.lock().expect("headers lock").push(headers);
        self.queries.lock().expect("queries lock").push(query);
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .expect("headers lock")
            .first()
            .and_then(|headers| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn issue_ref(repo: &str, id: u64) -> IssueRef {
    IssueRef {
        owner: "acme".into(),
        repo: repo.into(),
        id,
    }
}

// ============================================================================
// GitHub
// ============================================================================

async fn github_api() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route(
            "/repos/acme/rocket/issues/7",
            get(|State(r): State<Recorder>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                r.seen(headers, q);
                Json(json!({
                    "number": 7,
                    "title": "Launch fails",
                    "body": "Countdown stops at 3",
                    "state": "open",
                    "labels": [{"name": "bug"}]
                }))
            }),
        )
        .route(
            "/repos/acme/rocket/issues/7/comments",
            get(|State(r): State<Recorder>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                r.seen(headers, q);
                Json(json!([
                    {"user": {"login": "ada"}, "body": "Seen it too"},
                    {"user": {"login": "dewhale-bot"}, "body": "[Dewhale]\nLooking"}
                ]))
            })
            .post(|State(r): State<Recorder>, Json(body): Json<Value>| async move {
                r.posted.lock().expect("posted lock").push(body);
                (StatusCode::CREATED, Json(json!({"id": 1})))
            }),
        )
        .route(
            "/repos/acme/rocket/issues",
            get(|State(r): State<Recorder>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                r.seen(headers, q);
                Json(json!([
                    {"number": 7, "title": "Launch fails", "state": "open", "labels": ["schedule"]},
                    {"number": 8, "title": "Fix launch", "state": "open", "labels": ["schedule"], "pull_request": {}}
                ]))
            }),
        )
        .route(
            "/repos/acme/broken/issues/1",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
        )
        .with_state(recorder.clone());
    (serve(app).await, recorder)
}

#[tokio::test]
async fn github_fetches_issue_with_comments() {
    let (addr, recorder) = github_api().await;
    let github = GithubPlatform::new(&format!("http://{addr}"), "ghp_secret").expect("platform");

    let issue = github.get_issue(&issue_ref("rocket", 7)).await.expect("issue");

    assert_eq!(issue.title, "Launch fails");
    assert_eq!(issue.content, "Countdown stops at 3");
    assert!(issue.is_open());
    assert!(issue.has_label("bug"));
    assert_eq!(issue.comments.len(), 2);
    assert_eq!(issue.comments[0].author, "ada");

    assert_eq!(recorder.header("authorization").as_deref(), Some("Bearer ghp_secret"));
    assert_eq!(recorder.header("user-agent").as_deref(), Some("dewhale"));
    assert_eq!(recorder.header("accept").as_deref(), Some("application/vnd.github+json"));
    let queries = recorder.queries.lock().expect("queries lock").clone();
    assert_eq!(queries[1].get("per_page").map(String::as_str), Some("100"));
    assert_eq!(queries[1].get("page").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn github_lists_labelled_issues_without_pull_requests() {
    let (addr, recorder) = github_api().await;
    let github = GithubPlatform::new(&format!("http://{addr}"), "t").expect("platform");

    let issues = github
        .list_issues("acme", "rocket", &["schedule".to_string()])
        .await
        .expect("issues");

    let ids: Vec<u64> = issues.iter().map(|issue| issue.id).collect();
    assert_eq!(ids, vec![7]);
    assert_eq!(issues[0].comments.len(), 2);
    let queries = recorder.queries.lock().expect("queries lock").clone();
    assert_eq!(queries[0].get("labels").map(String::as_str), Some("schedule"));
    assert_eq!(queries[0].get("state").map(String::as_str), Some("open"));
}

#[tokio::test]
async fn github_posts_comment_body() {
    let (addr, recorder) = github_api().await;
    let github = GithubPlatform::new(&format!("http://{addr}"), "t").expect("platform");

    github
        .create_issue_comment(&issue_ref("rocket", 7), "[Dewhale]\nDone")
        .await
        .expect("comment");

    let posted = recorder.posted.lock().expect("posted lock").clone();
    assert_eq!(posted, vec![json!({"body": "[Dewhale]\nDone"})]);
}

#[tokio::test]
async fn github_error_status_keeps_body() {
    let (addr, _recorder) = github_api().await;
    let github = GithubPlatform::new(&format!("http://{addr}"), "t").expect("platform");

    let result = github.get_issue(&issue_ref("broken", 1)).await;

    match result {
        Err(PlatformError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream down");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

// ============================================================================
// GitLab
// ============================================================================

async fn gitlab_api() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route(
            "/api/v4/projects/42",
            get(|| async { Json(json!({"id": 42, "namespace": {"name": "Rocketry", "path": "rocketry"}})) }),
        )
        .route(
            "/api/v4/projects/42/issues/3",
            get(|State(r): State<Recorder>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                r.seen(headers, q);
                Json(json!({
                    "iid": 3,
                    "title": "Fuel leak",
                    "description": null,
                    "state": "opened",
                    "labels": ["bug"]
                }))
            }),
        )
        .route(
            "/api/v4/projects/42/issues/3/notes",
            get(|State(r): State<Recorder>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                r.seen(headers, q);
                Json(json!([
                    {"body": "changed the description", "system": true, "author": {"name": "Ada"}},
                    {"body": "Valve 2 again", "system": false, "author": {"name": "Ada"}}
                ]))
            })
            .post(|State(r): State<Recorder>, Json(body): Json<Value>| async move {
                r.posted.lock().expect("posted lock").push(body);
                StatusCode::CREATED
            }),
        )
        .route(
            "/api/v4/projects/42/issues",
            get(|State(r): State<Recorder>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                r.seen(headers, q);
                Json(json!([{"iid": 3, "title": "Fuel leak", "state": "opened", "labels": ["schedule"]}]))
            }),
        )
        .with_state(recorder.clone());
    (serve(app).await, recorder)
}

#[tokio::test]
async fn gitlab_fetches_issue_with_human_notes() {
    let (addr, recorder) = gitlab_api().await;
    let gitlab = GitlabPlatform::new(&format!("http://{addr}"), "glpat-secret").expect("platform");

    let issue = gitlab.get_issue(&issue_ref("42", 3)).await.expect("issue");

    assert_eq!(issue.owner, "Rocketry");
    assert_eq!(issue.repo, "42");
    assert_eq!(issue.state, "open");
    assert_eq!(issue.content, "");
    assert_eq!(issue.comments.len(), 1);
    assert_eq!(issue.comments[0].content, "Valve 2 again");

    assert_eq!(recorder.header("private-token").as_deref(), Some("glpat-secret"));
    let queries = recorder.queries.lock().expect("queries lock").clone();
    let notes_query = &queries[1];
    assert_eq!(notes_query.get("sort").map(String::as_str), Some("asc"));
    assert_eq!(notes_query.get("order_by").map(String::as_str), Some("created_at"));
}

#[tokio::test]
async fn gitlab_lists_opened_issues_by_label() {
    let (addr, recorder) = gitlab_api().await;
    let gitlab = GitlabPlatform::new(&format!("http://{addr}"), "t").expect("platform");

    let issues = gitlab
        .list_issues("ignored", "42", &["schedule".to_string()])
        .await
        .expect("issues");

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].owner, "Rocketry");
    assert!(issues[0].is_open());
    let queries = recorder.queries.lock().expect("queries lock").clone();
    assert_eq!(queries[0].get("state").map(String::as_str), Some("opened"));
    assert_eq!(queries[0].get("labels").map(String::as_str), Some("schedule"));
}

#[tokio::test]
async fn gitlab_posts_note() {
    let (addr, recorder) = gitlab_api().await;
    let gitlab = GitlabPlatform::new(&format!("http://{addr}"), "t").expect("platform");

    gitlab
        .create_issue_comment(&issue_ref("42", 3), "[Dewhale]\nPatched")
        .await
        .expect("note");

    let posted = recorder.posted.lock().expect("posted lock").clone();
    assert_eq!(posted, vec![json!({"body": "[Dewhale]\nPatched"})]);
}
