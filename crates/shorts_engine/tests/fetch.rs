use std::time::Duration;

use pretty_assertions::assert_eq;
use shorts_core::ErrorClass;
use shorts_engine::{decode_html, DecodedHtml, FailureKind, FetchSettings, Fetcher, ReqwestFetcher};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The fetcher blocks on its own runtime, so the mock server lives on a
/// separate one and the fetch runs on the plain test thread.
fn serve(route: &str, response: ResponseTemplate) -> (Runtime, MockServer) {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    });
    (rt, server)
}

fn fetcher(settings: FetchSettings) -> ReqwestFetcher {
    ReqwestFetcher::new(settings).expect("runtime")
}

#[test]
fn fetcher_returns_html_bytes_and_metadata() {
    let (_rt, server) = serve(
        "/sermon",
        ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
    );
    let url = format!("{}/sermon", server.uri());

    let output = fetcher(FetchSettings::default()).fetch(&url).expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert_eq!(output.metadata.byte_len, 15);
    assert!(output
        .metadata
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(output.bytes, b"<html>ok</html>");
}

#[test]
fn http_errors_are_classified() {
    let (_rt, server) = serve("/missing", ResponseTemplate::new(404));
    let err = fetcher(FetchSettings::default())
        .fetch(&format!("{}/missing", server.uri()))
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert_eq!(err.class(), ErrorClass::Permanent);

    let (_rt, server) = serve("/busy", ResponseTemplate::new(503));
    let err = fetcher(FetchSettings::default())
        .fetch(&format!("{}/busy", server.uri()))
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
    assert_eq!(err.class(), ErrorClass::Transient);
}

#[test]
fn slow_responses_time_out_as_transient() {
    let (_rt, server) = serve(
        "/slow",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(300))
            .set_body_raw("slow", "text/html"),
    );
    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };

    let err = fetcher(settings)
        .fetch(&format!("{}/slow", server.uri()))
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
    assert_eq!(err.class(), ErrorClass::Transient);
}

#[test]
fn oversized_responses_are_rejected() {
    let (_rt, server) = serve(
        "/large",
        ResponseTemplate::new(200).set_body_raw("01234567890", "text/html"),
    );
    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };

    let err = fetcher(settings)
        .fetch(&format!("{}/large", server.uri()))
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[test]
fn non_html_content_is_rejected() {
    let (_rt, server) = serve(
        "/feed.json",
        ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
    );
    let err = fetcher(FetchSettings::default())
        .fetch(&format!("{}/feed.json", server.uri()))
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "application/json".to_string()
        }
    );
}

#[test]
fn malformed_urls_fail_without_network() {
    let err = fetcher(FetchSettings::default()).fetch("not a url").unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[test]
fn legacy_korean_pages_decode_from_header_charset() {
    let (bytes, _, _) = encoding_rs::EUC_KR.encode("<h1>은혜의 말씀</h1>");
    let (_rt, server) = serve(
        "/euc",
        ResponseTemplate::new(200).set_body_raw(bytes.into_owned(), "text/html; charset=EUC-KR"),
    );

    let output = fetcher(FetchSettings::default())
        .fetch(&format!("{}/euc", server.uri()))
        .unwrap();
    let decoded = DecodedHtml::from_fetch(&output).unwrap();
    assert_eq!(decoded.html, "<h1>은혜의 말씀</h1>");
    assert_eq!(decoded.encoding_label, "EUC-KR");
}

#[test]
fn decode_prefers_bom_over_declared_charset() {
    let decoded = decode_html(b"\xEF\xBB\xBFhello", Some("text/html; charset=EUC-KR")).unwrap();
    assert_eq!(decoded.html, "hello");
    assert_eq!(decoded.encoding_label, "UTF-8");
}
