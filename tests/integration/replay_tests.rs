//! Integration tests for replaying captured jobs

use crate::common::{html, test_archive};
use rewind::replay::{parse_replay_path, replay_path, ReplayError};
use rewind::{ArchiveError, JobStatus, ResourceKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><link rel="stylesheet" href="/style.css"></head>
<body><a href="/about#team">About</a> <img src="/logo.png"> <a href="https://elsewhere.example/x">x</a></body></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(r#"<a href="/">Home</a>"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("body { margin: 0 }", "text/css"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_replay_rewrites_into_job() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());
    let handle = test.archiver.start_archive(&seed, 10, 2).unwrap();
    let job_id = handle.job_id();
    assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

    let home = test.archiver.render_archived_page(job_id, &seed).unwrap();
    assert_eq!(home.kind, ResourceKind::Html);
    assert_eq!(home.status_code, Some(200));
    let body = String::from_utf8(home.body).unwrap();

    let about = format!("{}/about", server.uri());
    let css = format!("{}/style.css", server.uri());
    let logo = format!("{}/logo.png", server.uri());
    assert!(body.contains(&format!(
        r#"href="{}#team""#,
        replay_path(job_id, &about, ResourceKind::Html)
    )));
    assert!(body.contains(&replay_path(job_id, &css, ResourceKind::Css)));
    assert!(body.contains(&replay_path(job_id, &logo, ResourceKind::Image)));
    assert!(body.contains(r#"href="https://elsewhere.example/x""#));

    let about_page = test.archiver.render_archived_page(job_id, &about).unwrap();
    assert_eq!(
        String::from_utf8(about_page.body).unwrap(),
        format!(
            r#"<a href="{}">Home</a>"#,
            replay_path(job_id, &seed, ResourceKind::Html)
        )
    );
}

#[tokio::test]
async fn test_replay_is_idempotent_and_assets_verbatim() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());
    let handle = test.archiver.start_archive(&seed, 10, 2).unwrap();
    let job_id = handle.job_id();
    handle.wait().await.unwrap();

    let first = test.archiver.render_archived_page(job_id, &seed).unwrap();
    let second = test.archiver.render_archived_page(job_id, &seed).unwrap();
    assert_eq!(first, second);

    let logo = test
        .archiver
        .render_archived_page(job_id, &format!("{}/logo.png", server.uri()))
        .unwrap();
    assert_eq!(logo.body, vec![0x89, b'P', b'N', b'G']);
    assert_eq!(logo.content_type, "image/png");
}

#[tokio::test]
async fn test_replay_path_round_trips_through_render() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());
    let handle = test.archiver.start_archive(&seed, 10, 2).unwrap();
    let job_id = handle.job_id();
    handle.wait().await.unwrap();

    let address = replay_path(job_id, &format!("{}/style.css", server.uri()), ResourceKind::Css);
    let (parsed_job, url) = parse_replay_path(&address).unwrap();
    assert_eq!(parsed_job, job_id);

    let css = test.archiver.render_archived_page(parsed_job, &url).unwrap();
    assert_eq!(css.body, b"body { margin: 0 }");
}

#[tokio::test]
async fn test_replay_of_uncaptured_url_is_not_found() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());
    let handle = test.archiver.start_archive(&seed, 1, 1).unwrap();
    let job_id = handle.job_id();
    handle.wait().await.unwrap();

    let result = test
        .archiver
        .render_archived_page(job_id, &format!("{}/about", server.uri()));
    assert!(matches!(
        result,
        Err(ArchiveError::Replay(ReplayError::NotFound { .. }))
    ));

    // The seed only captured itself, so its links point at the live site
    let home = test.archiver.render_archived_page(job_id, &seed).unwrap();
    let body = String::from_utf8(home.body).unwrap();
    assert!(body.contains(&format!(r#"href="{}/about#team""#, server.uri())));
}

#[tokio::test]
async fn test_snapshots_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>first</p>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>second</p>"))
        .mount(&server)
        .await;

    let test = test_archive();
    let seed = format!("{}/", server.uri());

    let first = test.archiver.start_archive(&seed, 1, 1).unwrap();
    let first_id = first.job_id();
    first.wait().await.unwrap();
    let second = test.archiver.start_archive(&seed, 1, 1).unwrap();
    let second_id = second.job_id();
    second.wait().await.unwrap();

    let old = test.archiver.render_archived_page(first_id, &seed).unwrap();
    let new = test.archiver.render_archived_page(second_id, &seed).unwrap();
    assert_eq!(old.body, b"<p>first</p>");
    assert_eq!(new.body, b"<p>second</p>");

    test.store.delete_job(first_id).unwrap();
    assert!(test.archiver.render_archived_page(first_id, &seed).is_err());
    assert!(test.archiver.render_archived_page(second_id, &seed).is_ok());
}
