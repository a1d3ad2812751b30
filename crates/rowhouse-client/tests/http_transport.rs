//! Transport scenarios against the scripted mock server: connection reuse,
//! retries, server-error extraction, settings and header merging.

mod mock;

use std::time::Duration;

use rowhouse_client::{Client, ClientConfig, ClientError, FaultCause, TransportError, Value};

use mock::{rows_body, MockResponse, MockServer};

fn select_one_body() -> Vec<u8> {
    rows_body(&[("1", "String")], &[vec![Value::from("1")]])
}

fn select_one_response() -> MockResponse {
    MockResponse::ok()
        .header("Content-Type", "application/octet-stream")
        .body(select_one_body())
}

#[tokio::test]
async fn test_connection_ttl_expiry_opens_new_socket() {
    // Two identical calls separated by more than the TTL: the first socket
    // has aged out, so the second call opens a fresh one.
    let server = MockServer::start(vec![select_one_response(), select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .connection_ttl(Duration::from_millis(150)),
    )
    .unwrap();

    let rows = client.query_all("select 1").await.unwrap();
    assert_eq!(rows[0].field_at(1).unwrap().as_str().unwrap(), "1");

    tokio::time::sleep(Duration::from_millis(250)).await;

    let rows = client.query_all("select 1").await.unwrap();
    assert_eq!(rows[0].field_at(1).unwrap().as_str().unwrap(), "1");

    assert_eq!(server.opened_sockets(), 2);
}

#[tokio::test]
async fn test_connection_reused_within_ttl() {
    let server = MockServer::start(vec![select_one_response(), select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .connection_ttl(Duration::from_secs(5)),
    )
    .unwrap();

    client.query_all("select 1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.query_all("select 1").await.unwrap();

    assert_eq!(server.opened_sockets(), 1);
}

#[tokio::test]
async fn test_keep_alive_expiry_opens_new_socket() {
    let server = MockServer::start(vec![select_one_response(), select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .keep_alive(Duration::from_millis(100)),
    )
    .unwrap();

    client.query_all("select 1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    client.query_all("select 1").await.unwrap();

    assert_eq!(server.opened_sockets(), 2);
}

#[tokio::test]
async fn test_retry_after_empty_response() {
    // The first attempt gets no response at all; one retry succeeds.
    let server = MockServer::start(vec![MockResponse::empty_fault(), select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .max_retries(1),
    )
    .unwrap();

    let rows = client.query_all("select 1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(client.stats().retries, 1);
}

#[tokio::test]
async fn test_no_retry_budget_surfaces_no_response() {
    let server = MockServer::start(vec![MockResponse::empty_fault(), select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .max_retries(0),
    )
    .unwrap();

    let err = client.query_all("select 1").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::NoResponse)
    ));
}

#[tokio::test]
async fn test_insert_retry_sees_written_rows() {
    let describe = MockResponse::ok().body(mock::describe_body(&[("v", "UInt64", "")]));
    let summary_ok = MockResponse::ok().summary(r#"{ "read_bytes": "10", "read_rows": "1", "written_rows": "1", "written_bytes": "8" }"#);
    let server = MockServer::start(vec![describe, MockResponse::empty_fault(), summary_ok]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .max_retries(1),
    )
    .unwrap();

    let mut insert = client.insert("table01").await.unwrap();
    insert.set("v", 7u64).unwrap();
    insert.commit_row().unwrap();
    let outcome = insert.send().await.unwrap();
    assert_eq!(outcome.written_rows(), 1);
}

#[tokio::test]
async fn test_server_error_on_http_200() {
    let message = "Code: 241. DB::Exception: Memory limit (for query) exceeded: would use 97.21 MiB";
    let server = MockServer::start(vec![MockResponse::ok()
        .header("X-ClickHouse-Exception-Code", "241")
        .summary(r#"{ "read_bytes": "10", "read_rows": "1"}"#)
        .body(message)]).await;
    let client = Client::new(ClientConfig::new().add_endpoint(server.endpoint())).unwrap();

    let err = client.query_all("SELECT 1").await.unwrap_err();
    match err {
        ClientError::Server { code, message: m } => {
            assert_eq!(code, 241);
            assert_eq!(m, message);
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_multiline_server_error_is_folded() {
    let body = "Code: 901. DB::Exception: I write, erase, rewrite\nErase again, and then\nA poppy blooms\n (by Katsushika Hokusai)";
    let server = MockServer::start(vec![MockResponse::ok()
        .header("X-ClickHouse-Exception-Code", "901")
        .chunked()
        .body(body)]).await;
    let client = Client::new(ClientConfig::new().add_endpoint(server.endpoint())).unwrap();

    let err = client.query_all("SELECT 1").await.unwrap_err();
    match err {
        ClientError::Server { code, message } => {
            assert_eq!(code, 901);
            assert_eq!(
                message,
                "Code: 901. DB::Exception: I write, erase, rewrite Erase again, and then A poppy blooms (by Katsushika Hokusai)"
            );
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authentication_failure_code() {
    let server = MockServer::start(vec![MockResponse::ok()
        .status(403)
        .header("X-ClickHouse-Exception-Code", "516")
        .body("Code: 516. DB::Exception: default: Authentication failed")]).await;
    let client = Client::new(ClientConfig::new().add_endpoint(server.endpoint())).unwrap();

    let err = client.query_all("SELECT 1").await.unwrap_err();
    assert!(matches!(err, ClientError::Auth { .. }));
}

#[tokio::test]
async fn test_per_call_settings_win_over_defaults() {
    let server = MockServer::start(vec![select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .server_setting("max_threads", "10")
            .server_setting("async_insert", "1")
            .roles(["role1", "role2"]),
    )
    .unwrap();

    let settings = rowhouse_client::Settings::new()
        .server_setting("async_insert", "3")
        .roles(["role3", "role2"]);
    client
        .query_with_settings("SELECT 1", settings)
        .await
        .unwrap()
        .close()
        .await
        .unwrap();

    let request = &server.requests()[0];
    assert!(request.target.contains("max_threads=10"), "{}", request.target);
    assert!(request.target.contains("async_insert=3"), "{}", request.target);
    assert!(!request.target.contains("async_insert=1"), "{}", request.target);
    assert!(request.target.contains("roles=role3%2Crole2"), "{}", request.target);
}

#[tokio::test]
async fn test_custom_headers_merge() {
    let server = MockServer::start(vec![select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .http_header("X-ClickHouse-Test", "default_value")
            .http_header("X-ClickHouse-Test-4", "default_value4"),
    )
    .unwrap();

    let settings = rowhouse_client::Settings::new()
        .http_header("X-ClickHouse-Test", "test")
        .http_header_list("X-ClickHouse-Test-2", ["test1", "test2"]);
    client
        .query_with_settings("SELECT 1", settings)
        .await
        .unwrap()
        .close()
        .await
        .unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.header("X-ClickHouse-Test"), Some("test"));
    assert_eq!(request.header("X-ClickHouse-Test-2"), Some("test1,test2"));
    assert_eq!(request.header("X-ClickHouse-Test-4"), Some("default_value4"));
}

#[tokio::test]
async fn test_basic_auth_and_user_agent() {
    let server = MockServer::start(vec![select_one_response()]).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .username("default")
            .password("")
            .client_name("test-client/1.0"),
    )
    .unwrap();

    client.query_all("SELECT 1").await.unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.header("Authorization"), Some("Basic ZGVmYXVsdDo="));
    let ua = request.header("User-Agent").unwrap();
    assert!(ua.starts_with("test-client/1.0 rowhouse-client/"), "{}", ua);
}

#[tokio::test]
async fn test_connection_request_timeout() {
    let server = MockServer::start(vec![
        select_one_response().delay(Duration::from_millis(400)),
        select_one_response(),
    ])
    .await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .max_connections(1)
            .max_retries(0)
            .retry_on_failures(FaultCause::empty())
            .connection_request_timeout(Duration::from_millis(50)),
    )
    .unwrap();

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.query_all("select 1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = client.query_all("select 1").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::ConnectionRequestTimeout(_))
    ));
    slow.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_max_connections_bound() {
    let script: Vec<MockResponse> = (0..8)
        .map(|_| select_one_response().delay(Duration::from_millis(60)))
        .collect();
    let server = MockServer::start(script).await;
    let client = Client::new(
        ClientConfig::new()
            .add_endpoint(server.endpoint())
            .max_connections(2),
    )
    .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move { client.query_all("select 1").await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert!(
        server.max_concurrent_sockets() <= 2,
        "peak sockets {}",
        server.max_concurrent_sockets()
    );
}

#[tokio::test]
async fn test_chunked_response_decoding() {
    let server = MockServer::start(vec![MockResponse::ok()
        .chunked()
        .body(select_one_body())]).await;
    let client = Client::new(ClientConfig::new().add_endpoint(server.endpoint())).unwrap();

    let rows = client.query_all("select 1").await.unwrap();
    assert_eq!(rows[0].field_at(1).unwrap().as_str().unwrap(), "1");
}

#[tokio::test]
async fn test_lifo_and_fifo_reuse() {
    use rowhouse_client::ConnectionReuseStrategy;

    for strategy in [ConnectionReuseStrategy::Lifo, ConnectionReuseStrategy::Fifo] {
        let server = MockServer::start(vec![select_one_response(), select_one_response()]).await;
        let client = Client::new(
            ClientConfig::new()
                .add_endpoint(server.endpoint())
                .connection_reuse_strategy(strategy),
        )
        .unwrap();
        client.query_all("select 1").await.unwrap();
        client.query_all("select 1").await.unwrap();
        assert_eq!(server.opened_sockets(), 1, "strategy {:?}", strategy);
    }
}
