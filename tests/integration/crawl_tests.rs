//! Integration tests for the sweep
//!
//! These tests use wiremock to stand in for the application under test and
//! a scripted checker, and run the full login, crawl and check cycle.

use a11y_sweep::check::{Checker, CheckerOutput, IgnoreRules};
use a11y_sweep::config::Config;
use a11y_sweep::crawler::{Coordinator, HttpFetcher, PageFetcher, Request};
use a11y_sweep::output::RunStatus;
use a11y_sweep::storage::{read_index, read_reports, JsonReportStore};
use a11y_sweep::SweepError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records each checked URL with the headers from its config file
struct RecordingChecker {
    fail: bool,
    seen: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingChecker {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }
}

#[async_trait]
impl Checker for RecordingChecker {
    async fn run(&self, url: &str, config_path: &Path) -> std::io::Result<CheckerOutput> {
        let config: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
        self.seen
            .lock()
            .unwrap()
            .push((url.to_string(), config["headers"].clone()));

        if self.fail {
            return Ok(CheckerOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "Error: net::ERR_CONNECTION_RESET".to_string(),
            });
        }

        Ok(CheckerOutput {
            exit_code: Some(2),
            stdout: r#"[{"type":"error","code":"WCAG2AA.Principle1.Guideline1_1.1_1_1.H37","message":"Img element missing an alt attribute.","context":"<img src=\"x.png\">","selector":"img"}]"#.to_string(),
            stderr: String::new(),
        })
    }

    fn describe(&self, url: &str, config_path: &Path) -> String {
        format!("recording-checker {} --config={}", url, config_path.display())
    }
}

fn test_config(server: &MockServer, reports: &TempDir) -> Config {
    let mut config = Config::for_site(server.uri());
    config.site.start_urls = vec!["/dashboard".to_string()];
    config.crawler.max_depth = 2;
    config.crawler.max_concurrent_pages = 4;
    config.crawler.request_timeout_secs = 5;
    config.checker.verify_on_start = false;
    config.output.reports_dir = reports.path().to_string_lossy().to_string();
    config
}

fn coordinator(config: Config, checker: Arc<RecordingChecker>) -> Coordinator {
    let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
    let store = Arc::new(JsonReportStore::new(&config.output.reports_dir, false));
    Coordinator::with_parts(
        config,
        "test-hash".to_string(),
        fetcher,
        checker,
        store,
        IgnoreRules::empty(),
    )
    .unwrap()
}

fn html(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
}

async fn mount_auto_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auto_auth"))
        .and(header("accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .insert_header("set-cookie", "sessionid=s1; Path=/; HttpOnly")
                .set_body_string(r#"{"email":"a@b.com","password":"p","username":"auto"}"#),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_auto_auth_crawl_checks_each_canonical_page_once() {
    let server = MockServer::start().await;
    let reports = TempDir::new().unwrap();
    mount_auto_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(html(
            "Dashboard",
            r#"
            <a href="/courses/c1/courseware/ch/seq/1">Unit 1</a>
            <a href="/courses/c1/courseware/ch/seq/2">Unit 2</a>
            <a href="/api/courses/v1/blocks/?course_id=c1">Blocks</a>
            <a href="/logout/">Sign out</a>
            <a href="http://elsewhere.test/page">Elsewhere</a>
            <a href="mailto:help@example.com">Help</a>
            "#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/courses/c1/courseware/ch/seq/\d+$"))
        .respond_with(html("Sequence", ""))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/courses/v1/blocks/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(
                    r#"{"root":"b0","blocks":{"b1":{"lms_web_url":"/courses/c1/jump/unit1","student_view_url":"/xblock/b1"}}}"#,
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/courses/c1/jump/unit1"))
        .respond_with(html("Unit One", ""))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/logout/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(path_regex("^/xblock/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let checker = RecordingChecker::new(false);
    let mut coordinator = coordinator(test_config(&server, &reports), Arc::clone(&checker));
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.logins, 1);
    assert_eq!(summary.counters.pages, 3);
    assert_eq!(summary.counters.error, 3);
    assert_eq!(summary.scope.duplicates, 1);
    assert_eq!(summary.scope.api_rejected, 1);

    let base = server.uri();
    let urls = checker.urls();
    assert_eq!(urls.len(), 3);
    assert!(urls.contains(&format!("{}/dashboard", base)));
    assert!(urls.contains(&format!("{}/courses/c1/jump/unit1", base)));
    assert!(urls.iter().any(|u| u.contains("/courseware/ch/seq/")));

    for (_, headers) in checker.seen.lock().unwrap().iter() {
        assert_eq!(headers["Cookie"], "sessionid=s1");
    }

    assert_eq!(read_reports(reports.path()).unwrap().len(), 3);
    let index = read_index(reports.path()).unwrap();
    assert_eq!(
        index[&format!("{}/dashboard", base)].title.as_deref(),
        Some("Dashboard")
    );
}

#[tokio::test]
async fn test_credentials_login_posts_csrf_token() {
    let server = MockServer::start().await;
    let reports = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            html("Sign in", "").insert_header("set-cookie", "csrftoken=tok; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_api/v1/account/login_session/"))
        .and(header("x-csrftoken", "tok"))
        .and(header("cookie", "csrftoken=tok"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "sessionid=s2; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(html("Dashboard", ""))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, &reports);
    config.auth.email = Some("staff@example.com".to_string());
    config.auth.password = Some("edx".to_string());

    let checker = RecordingChecker::new(false);
    let summary = coordinator(config, Arc::clone(&checker)).run().await.unwrap();

    assert_eq!(summary.counters.pages, 1);
    let seen = checker.seen.lock().unwrap();
    assert_eq!(seen[0].1["Cookie"], "csrftoken=tok; sessionid=s2");
}

#[tokio::test]
async fn test_rejected_credentials_abort_run() {
    let server = MockServer::start().await;
    let reports = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html("Sign in", "").insert_header("set-cookie", "csrftoken=tok"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_api/v1/account/login_session/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(path("/dashboard"))
        .respond_with(html("Dashboard", ""))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, &reports);
    config.auth.email = Some("staff@example.com".to_string());
    config.auth.password = Some("wrong".to_string());

    let checker = RecordingChecker::new(false);
    let err = coordinator(config, Arc::clone(&checker)).run().await.unwrap_err();

    assert!(matches!(err, SweepError::AuthFailure(_)));
    assert!(checker.urls().is_empty());
}

#[tokio::test]
async fn test_unexpected_logout_relogs_and_resumes_target() {
    let server = MockServer::start().await;
    let reports = TempDir::new().unwrap();
    mount_auto_auth(&server).await;

    // First visit finds the session gone
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/login?next=%2Fdashboard"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(html("Dashboard", ""))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html("Sign in", "").insert_header("set-cookie", "csrftoken=tok2"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_api/v1/account/login_session/"))
        .and(header("x-csrftoken", "tok2"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sessionid=s3; Path=/"))
        .expect(1)
        .mount(&server)
        .await;

    let checker = RecordingChecker::new(false);
    let summary = coordinator(test_config(&server, &reports), Arc::clone(&checker))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.logins, 2);
    assert_eq!(checker.urls(), vec![format!("{}/dashboard", server.uri())]);
    let seen = checker.seen.lock().unwrap();
    assert!(seen[0].1["Cookie"].as_str().unwrap().contains("sessionid=s3"));
}

#[tokio::test]
async fn test_exhausted_checker_drops_page() {
    let server = MockServer::start().await;
    let reports = TempDir::new().unwrap();
    mount_auto_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(html("Dashboard", ""))
        .mount(&server)
        .await;

    let checker = RecordingChecker::new(true);
    let summary = coordinator(test_config(&server, &reports), Arc::clone(&checker))
        .run()
        .await
        .unwrap();

    assert_eq!(checker.seen.lock().unwrap().len(), 3);
    assert_eq!(summary.counters.dropped, 1);
    assert_eq!(summary.counters.pages, 0);
    assert_eq!(summary.counters.error, 0);
    assert_eq!(summary.dropped_urls, vec![format!("{}/dashboard", server.uri())]);
    assert!(read_reports(reports.path()).unwrap().is_empty());
}

#[tokio::test]
async fn test_single_url_mode_follows_nothing() {
    let server = MockServer::start().await;
    let reports = TempDir::new().unwrap();
    mount_auto_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(html("Progress", r#"<a href="/other">Other</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(path("/other"))
        .respond_with(html("Other", ""))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, &reports);
    config.crawler.single_url = Some("/progress".to_string());

    let checker = RecordingChecker::new(false);
    let summary = coordinator(config, Arc::clone(&checker)).run().await.unwrap();

    assert_eq!(summary.counters.pages, 1);
    assert_eq!(checker.urls(), vec![format!("{}/progress", server.uri())]);
}

#[tokio::test]
async fn test_fetcher_carries_cookies_across_redirects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/end")
                .insert_header("set-cookie", "hop=1; Path=/"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/end"))
        .and(header("cookie", "hop=1"))
        .respond_with(html("End", ""))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&Config::for_site(server.uri()).crawler).unwrap();
    let request = Request::get(url::Url::parse(&format!("{}/start", server.uri())).unwrap());
    let response = fetcher.fetch(&request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.url.path(), "/end");
    assert_eq!(response.requested_url.path(), "/start");
    assert_eq!(response.set_cookies().collect::<Vec<_>>(), vec!["hop=1; Path=/"]);
}

#[tokio::test]
async fn test_fetcher_redirect_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&Config::for_site(server.uri()).crawler).unwrap();
    let request = Request::get(url::Url::parse(&format!("{}/loop", server.uri())).unwrap());
    let err = fetcher.fetch(&request).await.unwrap_err();

    assert!(matches!(err, SweepError::RedirectLimit { .. }));
}
