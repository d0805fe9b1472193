//! Integration tests for archive jobs
//!
//! These tests use wiremock to create mock HTTP servers and run full jobs
//! end-to-end through the archiver.

use crate::common::{html, test_archive};
use rewind::{JobStatus, ResourceKind};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_budget_of_one_stores_only_the_seed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a><a href="/b">b</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("a"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("b"))
        .expect(0)
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 1, 4)
        .unwrap();
    let job_id = handle.job_id();

    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let resources = test.store.list_resources_by_job(job_id).unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].link, format!("{}/", server.uri()));
    assert_eq!(resources[0].kind, ResourceKind::Html);
}

#[tokio::test]
async fn test_out_of_host_links_are_recorded_not_fetched() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<a href="/a">a</a><a href="{}/b">b</a>"#,
            other.uri()
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("<p>a</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&other)
        .await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());
    let handle = test.archiver.start_archive(&seed, 10, 2).unwrap();
    let job_id = handle.job_id();

    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let links: Vec<String> = test
        .store
        .list_resources_by_job(job_id)
        .unwrap()
        .into_iter()
        .map(|r| r.link)
        .collect();
    assert_eq!(links.len(), 2);
    assert!(links.contains(&format!("{}/a", server.uri())));

    let external = test.store.list_external_links(job_id).unwrap();
    assert_eq!(external.len(), 1);
    assert_eq!(external[0].link, format!("{}/b", other.uri()));
    assert_eq!(external[0].referrer, seed);
}

#[tokio::test]
async fn test_not_found_is_stored_and_job_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/missing">gone</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 10, 2)
        .unwrap();
    let job_id = handle.job_id();

    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let missing = test
        .store
        .get_resource(job_id, &format!("{}/missing", server.uri()))
        .unwrap()
        .expect("404 should still produce a row");
    assert_eq!(missing.record.status_code, Some(404));
    assert!(missing.content.is_none());
    assert!(missing.record.failure.is_some());

    let job = test.store.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn test_each_url_fetched_once() {
    let server = MockServer::start().await;
    let uri = server.uri();

    // Every page links to every other page, in several spellings
    let nav = format!(
        r#"<a href="/">home</a><a href="/a">a</a><a href="{uri}/a#top">a again</a>
           <a href="/b">b</a><a href="//{host}/b">b again</a><a href="./c">c</a>"#,
        uri = uri,
        host = uri.trim_start_matches("http://"),
    );
    for page in ["/", "/a", "/b", "/c"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(nav.clone()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", uri), 50, 8)
        .unwrap();
    let job_id = handle.job_id();

    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);
    assert_eq!(test.store.list_resources_by_job(job_id).unwrap().len(), 4);
}

#[tokio::test]
async fn test_budget_holds_with_many_workers() {
    let server = MockServer::start().await;
    let links: String = (0..50)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(links))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html("<p>leaf</p>"))
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 10, 8)
        .unwrap();
    let job_id = handle.job_id();

    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);
    assert_eq!(test.store.list_resources_by_job(job_id).unwrap().len(), 10);
    assert_eq!(test.store.get_job(job_id).unwrap().unwrap().page_count, 10);
}

#[tokio::test]
async fn test_assets_classified_and_css_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<link rel="stylesheet" href="/site.css"><script src="/app.js"></script>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site.css"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                "body { background: url(/img/bg.png) } @import 'extra.css';",
                "text/css",
            ),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/extra.css"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("p { color: red }", "text/css"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("console.log(1)", "application/javascript"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/bg.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 20, 3)
        .unwrap();
    let job_id = handle.job_id();
    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let kind_of = |suffix: &str| {
        test.store
            .get_resource(job_id, &format!("{}{}", server.uri(), suffix))
            .unwrap()
            .map(|r| r.record.kind)
    };
    assert_eq!(kind_of("/"), Some(ResourceKind::Html));
    assert_eq!(kind_of("/site.css"), Some(ResourceKind::Css));
    assert_eq!(kind_of("/extra.css"), Some(ResourceKind::Css));
    assert_eq!(kind_of("/app.js"), Some(ResourceKind::Js));
    assert_eq!(kind_of("/img/bg.png"), Some(ResourceKind::Image));
}

#[tokio::test]
async fn test_off_host_redirect_recorded_as_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/out">out</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/out"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "http://elsewhere.invalid/"),
        )
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 10, 2)
        .unwrap();
    let job_id = handle.job_id();
    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let out = test
        .store
        .get_resource(job_id, &format!("{}/out", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(out.record.status_code, Some(302));
    assert!(out.content.is_none());
}

#[tokio::test]
async fn test_same_host_redirect_stored_under_requested_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/home"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(html(r#"<a href="about">about</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("about"))
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 10, 2)
        .unwrap();
    let job_id = handle.job_id();
    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let seed = test
        .store
        .get_resource(job_id, &format!("{}/", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(seed.record.status_code, Some(200));
    assert!(test
        .store
        .get_resource(job_id, &format!("{}/about", server.uri()))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_cancel_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let test = test_archive();
    let handle = test
        .archiver
        .start_archive(&format!("{}/", server.uri()), 10, 2)
        .unwrap();
    let job_id = handle.job_id();

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    assert_eq!(handle.wait().await.unwrap(), JobStatus::Failed);
    let job = test.store.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(test.store.list_resources_by_job(job_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_jobs_are_neighbors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<p>same</p>"))
        .mount(&server)
        .await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let handle = test.archiver.start_archive(&seed, 5, 1).unwrap();
        ids.push(handle.job_id());
        assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);
    }

    let middle = test.archiver.neighbors(ids[1]).unwrap();
    assert_eq!(middle.older, Some(ids[0]));
    assert_eq!(middle.newer, Some(ids[2]));

    let sites = test.store.list_archived_sites().unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].job_count, 3);
    assert_eq!(sites[0].page_count, 3);
}
