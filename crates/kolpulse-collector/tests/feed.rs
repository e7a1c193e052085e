//! Integration tests for `HttpSourceFeed` using wiremock HTTP mocks.

use kolpulse_collector::{FeedError, HttpSourceFeed, SourceFeed};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_feed(base_url: &str, max_retries: u32) -> HttpSourceFeed {
    HttpSourceFeed::new(base_url, 5, max_retries, 0).expect("client construction should not fail")
}

fn posts_body() -> serde_json::Value {
    serde_json::json!({
        "posts": [
            {
                "tweetId": "1",
                "content": "Excited about the new AI developments!",
                "authorUsername": "kol_x",
                "createdAt": "2026-03-01T09:00:00Z",
                "metrics": { "likes": 10, "retweets": 2, "replies": 1 }
            },
            {
                "postId": "2",
                "text": "Concerned about market volatility today.",
                "authorUsername": "kol_x"
            }
        ]
    })
}

#[tokio::test]
async fn fetch_user_posts_keeps_feed_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/kol_x/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_body()))
        .expect(1)
        .mount(&server)
        .await;

    let posts = test_feed(&server.uri(), 0)
        .fetch_user_posts("kol_x")
        .await
        .expect("should parse posts");

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].post_id.as_deref(), Some("1"));
    assert_eq!(posts[0].text, "Excited about the new AI developments!");
    assert!(posts[0].created_at.is_some());
    assert_eq!(posts[1].post_id.as_deref(), Some("2"));
    assert!(posts[1].metrics.is_none());
}

#[tokio::test]
async fn search_sends_every_term() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "#ai"))
        .and(query_param("q", "@kol_x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "posts": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let terms = vec!["launch".to_string(), "#ai".to_string(), "@kol_x".to_string()];
    let posts = test_feed(&server.uri(), 0).search(&terms).await.unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn empty_search_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let posts = test_feed(&server.uri(), 0).search(&[]).await.unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/kol_x/posts"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/kol_x/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_body()))
        .expect(1)
        .mount(&server)
        .await;

    let posts = test_feed(&server.uri(), 2)
        .fetch_user_posts("kol_x")
        .await
        .expect("second attempt should succeed");
    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn rate_limit_without_retries_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = test_feed(&server.uri(), 0)
        .fetch_user_posts("kol_x")
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::RateLimited { retry_after_secs: 7 }));
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_feed(&server.uri(), 3)
        .fetch_user_posts("ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::UnexpectedStatus { status: 404, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = test_feed(&server.uri(), 3)
        .fetch_user_posts("kol_x")
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Deserialize { .. }));
}
