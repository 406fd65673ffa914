mod common;

use common::site;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wikiapi_client::{params, PageStream, WikiError};
use wikiapi_test_utils::{responses, MockTransport};

fn cont(n: u32) -> Option<Value> {
    Some(json!({"rvcontinue": format!("{n}|0"), "continue": "||"}))
}

async fn drain(stream: &mut PageStream<'_>) -> (Vec<Value>, Option<WikiError>) {
    let mut pages = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(page) => pages.push(page),
            Err(e) => {
                assert!(stream.next().await.is_none(), "an error must end the stream");
                return (pages, Some(e));
            }
        }
    }
    (pages, None)
}

#[tokio::test]
async fn test_fragments_are_merged() {
    let mock = MockTransport::new();
    mock.push_json(responses::query_pages(
        vec![json!({"pageid": 1, "lastrevid": 100, "title": "A", "a": 1})],
        cont(1),
    ))
    .push_json(responses::query_pages(
        vec![json!({"pageid": 1, "lastrevid": 100, "title": "A", "b": 2})],
        None,
    ));
    let mut site = site(&mock);

    let mut stream = site.query_pages(params! { "titles" => "A" }).unwrap();
    let (pages, error) = drain(&mut stream).await;

    assert!(error.is_none());
    assert_eq!(
        pages,
        vec![json!({"pageid": 1, "lastrevid": 100, "title": "A", "a": 1, "b": 2})]
    );
}

#[tokio::test]
async fn test_modified_page_is_reported_after_stream() {
    let mock = MockTransport::new();
    mock.push_json(responses::query_pages(
        vec![
            json!({"pageid": 7, "lastrevid": 1, "title": "Moving"}),
            json!({"pageid": 8, "lastrevid": 5, "title": "Stable"}),
        ],
        cont(1),
    ))
    .push_json(responses::query_pages(
        vec![
            json!({"pageid": 7, "lastrevid": 2, "title": "Moving"}),
            json!({"pageid": 8, "lastrevid": 5, "title": "Stable", "extra": true}),
        ],
        cont(2),
    ))
    .push_json(responses::query_pages(
        vec![json!({"pageid": 7, "lastrevid": 2, "title": "Moving"})],
        None,
    ));
    let mut site = site(&mock);

    let mut stream = site.query_pages(params! { "generator" => "allpages" }).unwrap();
    let (pages, error) = drain(&mut stream).await;

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["pageid"], 8);
    assert_eq!(pages[0]["extra"], true);
    match error {
        Some(WikiError::PagesModified { ids }) => assert_eq!(ids, vec![7]),
        other => panic!("expected PagesModified, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_page_yielded_once() {
    let mock = MockTransport::new();
    let missing = json!({"ns": 0, "title": "Nope", "missing": true});
    mock.push_json(responses::query_pages(vec![missing.clone()], cont(1)))
        .push_json(responses::query_pages(vec![missing.clone()], None));
    let mut site = site(&mock);

    let mut stream = site.query_pages(params! { "titles" => "Nope" }).unwrap();
    let (pages, error) = drain(&mut stream).await;

    assert!(error.is_none());
    assert_eq!(pages, vec![missing]);
}

#[tokio::test]
async fn test_end_to_end_ordering() {
    let mock = MockTransport::new();
    mock.push_json(responses::query_pages(
        vec![
            json!({"pageid": 1, "lastrevid": 11, "title": "Entity1", "revisions": [{"revid": 11}]}),
            json!({"pageid": 2, "lastrevid": 22, "title": "Entity2"}),
        ],
        cont(1),
    ))
    .push_json(responses::query_pages(
        vec![
            json!({"pageid": 1, "lastrevid": 11, "categories": [{"title": "Category:X"}]}),
            json!({"pageid": 3, "lastrevid": 33, "title": "Entity3"}),
        ],
        None,
    ));
    let mut site = site(&mock);

    let mut stream = site
        .query_pages(params! { "titles" => vec!["Entity1", "Entity2", "Entity3"] })
        .unwrap();
    let (pages, error) = drain(&mut stream).await;

    assert!(error.is_none());
    let titles: Vec<&str> = pages.iter().filter_map(|p| p["title"].as_str()).collect();
    assert_eq!(titles, vec!["Entity2", "Entity1", "Entity3"]);
    assert_eq!(pages[1]["revisions"], json!([{"revid": 11}]));
    assert_eq!(pages[1]["categories"], json!([{"title": "Category:X"}]));
}

#[tokio::test]
async fn test_duplicate_id_within_one_response_merges() {
    let mock = MockTransport::new();
    mock.push_json(responses::query_pages(
        vec![
            json!({"pageid": 4, "lastrevid": 9, "links": [{"title": "L1"}]}),
            json!({"pageid": 4, "lastrevid": 9, "links": [{"title": "L2"}]}),
        ],
        None,
    ));
    let mut site = site(&mock);

    let mut stream = site.query_pages(params! { "pageids" => 4 }).unwrap();
    let (pages, _) = drain(&mut stream).await;

    assert_eq!(
        pages,
        vec![json!({"pageid": 4, "lastrevid": 9, "links": [{"title": "L1"}, {"title": "L2"}]})]
    );
}

#[tokio::test]
async fn test_missing_pages_element_is_protocol_error() {
    let mock = MockTransport::new();
    mock.push_json(responses::query(json!({"allpages": []}), None));
    let mut site = site(&mock);

    let mut stream = site.query_pages(params! { "list" => "allpages" }).unwrap();
    match stream.next().await {
        Some(Err(WikiError::Protocol { message, .. })) => {
            assert_eq!(message, "Missing pages element in query result")
        }
        other => panic!("expected Protocol error, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_query_pages_requests_formatversion_2() {
    let mock = MockTransport::new();
    mock.push_json(responses::query_pages(vec![], None));
    let mut site = site(&mock);

    let mut stream = site.query_pages(params! { "titles" => "A" }).unwrap();
    assert!(stream.next().await.is_none());
    drop(stream);

    let request = mock.last_request().unwrap();
    assert_eq!(request.param("action"), Some("query"));
    assert_eq!(request.param("formatversion"), Some("2"));
    assert_eq!(request.param("continue"), Some(""));
}
