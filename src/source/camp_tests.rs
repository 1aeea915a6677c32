//! Tests for `CampApiSource`.

use std::sync::Arc;

use serde_json::json;
use url::Url;

use super::{CampApiSource, DataSource, EntityId, FetchError, TokenCache};
use crate::time::InstantSleeper;
use crate::transport::mock::ScriptedClient;
use crate::transport::{HttpError, HttpResponse, RequestError, RetryPolicy};

fn base_url() -> Url {
    Url::parse("https://kohcamp.example.com").unwrap()
}

fn battle_list(entries: &serde_json::Value) -> HttpResponse {
    HttpResponse::ok(json!({ "returnCode": 0, "data": { "list": entries } }).to_string())
}

fn source(client: Arc<ScriptedClient>) -> CampApiSource<Arc<ScriptedClient>, InstantSleeper> {
    CampApiSource::new(client, base_url()).with_sleeper(InstantSleeper)
}

mod request_shape {
    use super::*;

    #[tokio::test]
    async fn posts_battle_list_query_for_entity() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&json!([])))]));

        source(client.clone())
            .fetch_latest(&EntityId::from("2118558336"))
            .await
            .unwrap();

        let requests = client.captured_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(
            requests[0].url.as_str(),
            "https://kohcamp.example.com/game/morebattlelist"
        );

        let body = client.request_json(0);
        assert_eq!(body["friendUserId"], "2118558336");
        assert_eq!(body["apiVersion"], 5);
        assert_eq!(body["lastTime"], 0);
    }

    #[tokio::test]
    async fn sends_static_headers() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&json!([])))]));
        let mut headers = http::HeaderMap::new();
        headers.insert("cgameid", http::HeaderValue::from_static("20001"));

        source(client.clone())
            .with_headers(headers)
            .fetch_latest(&EntityId::from("1"))
            .await
            .unwrap();

        let request = &client.captured_requests()[0];
        assert_eq!(request.headers.get("cgameid").unwrap(), "20001");
        assert!(request.headers.get("token").is_none());
    }

    #[tokio::test]
    async fn attaches_token_when_available() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(HttpResponse::ok(json!({ "token": "tok-123" }).to_string())),
            Ok(battle_list(&json!([]))),
        ]));
        let tokens = TokenCache::new(Url::parse("https://token.example.com/").unwrap());

        source(client.clone())
            .with_tokens(tokens)
            .fetch_latest(&EntityId::from("1"))
            .await
            .unwrap();

        let requests = client.captured_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, http::Method::GET);
        assert_eq!(requests[1].headers.get("token").unwrap(), "tok-123");
    }
}

mod response_handling {
    use super::*;

    #[tokio::test]
    async fn returns_first_entry_as_latest() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&json!([
            { "gameSeq": "101", "gametime": "1005", "heroName": "Newest" },
            { "gameSeq": "100", "gametime": "1000", "heroName": "Older" }
        ])))]));

        let record = source(client)
            .fetch_latest(&EntityId::from("1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.hero_name, "Newest");
        assert_eq!(record.fingerprint().as_str(), "101_1005");
    }

    #[tokio::test]
    async fn empty_list_means_no_data_yet() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&json!([])))]));

        let result = source(client).fetch_latest(&EntityId::from("1")).await;

        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn missing_data_without_error_code_means_no_data_yet() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok("{}"))]));

        let result = source(client).fetch_latest(&EntityId::from("1")).await;

        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn error_code_without_data_is_unavailable() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok(
            json!({ "returnCode": -30107, "returnMsg": "busy" }).to_string(),
        ))]));

        let result = source(client).fetch_latest(&EntityId::from("1")).await;

        match result {
            Err(FetchError::Api { code, message }) => {
                assert_eq!(code, -30107);
                assert_eq!(message, "busy");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_unavailable() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok("<html>"))]));

        let result = source(client).fetch_latest(&EntityId::from("1")).await;

        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }
}

mod retries {
    use super::*;

    #[tokio::test]
    async fn retries_transient_failures_before_succeeding() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(HttpError::Timeout),
            Ok(battle_list(&json!([{ "gameSeq": "1", "gametime": "2" }]))),
        ]));

        let record = source(client.clone())
            .fetch_latest(&EntityId::from("1"))
            .await
            .unwrap();

        assert!(record.is_some());
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn reports_failure_after_exhausting_attempts() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(HttpError::Timeout),
            Err(HttpError::Timeout),
        ]));

        let result = source(client.clone())
            .with_retry_policy(RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            })
            .fetch_latest(&EntityId::from("1"))
            .await;

        assert!(matches!(
            result,
            Err(FetchError::Request(RequestError::MaxRetriesExceeded { attempts: 2, .. }))
        ));
        assert_eq!(client.calls(), 2);
    }
}

mod recent_records {
    use super::*;

    fn three_battles() -> serde_json::Value {
        json!([
            { "gameSeq": "103", "gametime": "1010", "heroName": "Third" },
            { "gameSeq": "102", "gametime": "1005", "heroName": "Second" },
            { "gameSeq": "101", "gametime": "1000", "heroName": "First" }
        ])
    }

    #[tokio::test]
    async fn returns_the_first_count_entries_in_api_order() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&three_battles()))]));

        let records = source(client)
            .fetch_recent(&EntityId::from("1"), 2)
            .await
            .unwrap();

        let heroes: Vec<_> = records.iter().map(|r| r.hero_name.as_str()).collect();
        assert_eq!(heroes, ["Third", "Second"]);
    }

    #[tokio::test]
    async fn count_larger_than_list_returns_everything() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&three_battles()))]));

        let records = source(client)
            .fetch_recent(&EntityId::from("1"), 10)
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn uses_the_same_query_as_latest() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(battle_list(&json!([])))]));

        let records = source(client.clone())
            .fetch_recent(&EntityId::from("556677"), 5)
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(client.request_json(0)["friendUserId"], "556677");
    }

    #[tokio::test]
    async fn error_code_without_data_is_unavailable() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok(
            json!({ "returnCode": -30107, "returnMsg": "busy" }).to_string(),
        ))]));

        let result = source(client).fetch_recent(&EntityId::from("1"), 5).await;

        assert!(matches!(result, Err(FetchError::Api { code: -30107, .. })));
    }
}
