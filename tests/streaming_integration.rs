//! Streaming completions against a mock server

use parley::{AsyncClient, ChatMessage, Client, ClientConfig, CompletionParams, StreamCallbacks};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig::new("test-key", "test-org", "test-proj").with_base_url(server.uri())
}

fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {{\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n",
            fragment
        ));
    }
    body.push_str(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    );
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mount_stream(server: &MockServer, fragments: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(fragments), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_async_stream_end_to_end() {
    let server = MockServer::start().await;
    mount_stream(&server, &["Once", " upon", " a time"]).await;

    let client = AsyncClient::new(test_config(&server)).unwrap();
    let stream = client
        .completions()
        .create_stream(
            vec![ChatMessage::user("tell a story")],
            &CompletionParams::default(),
            StreamCallbacks::new(),
        )
        .await
        .unwrap();

    let (content, chunks) = stream.collect_all().await.unwrap();
    assert_eq!(content, "Once upon a time");
    // three content chunks plus the finish_reason chunk
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[3].finish_reason(), Some("stop"));
}

#[tokio::test]
async fn test_async_stream_callbacks_fire() {
    let server = MockServer::start().await;
    mount_stream(&server, &["a", "b", "c"]).await;

    let fragments = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));
    let callbacks = StreamCallbacks::new()
        .on_content({
            let fragments = fragments.clone();
            move |fragment| fragments.lock().unwrap().push(fragment.to_string())
        })
        .on_complete({
            let completions = completions.clone();
            move |full| {
                assert_eq!(full, "abc");
                completions.fetch_add(1, Ordering::SeqCst);
            }
        });

    let client = AsyncClient::new(test_config(&server)).unwrap();
    let mut stream = client
        .completions()
        .create_stream(
            vec![ChatMessage::user("go")],
            &CompletionParams::default(),
            callbacks,
        )
        .await
        .unwrap();

    while let Some(chunk) = stream.next_chunk().await {
        chunk.unwrap();
    }
    assert_eq!(
        fragments.lock().unwrap().as_slice(),
        &["a".to_string(), "b".to_string(), "c".to_string()]
    );
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_error_status_is_not_a_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({"error": {"message": "slow down"}})),
        )
        .mount(&server)
        .await;

    let client = AsyncClient::new(test_config(&server)).unwrap();
    let error = client
        .completions()
        .create_stream(
            vec![ChatMessage::user("go")],
            &CompletionParams::default(),
            StreamCallbacks::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, parley::Error::RateLimit(_)));
}

#[tokio::test]
async fn test_blocking_stream_end_to_end() {
    let server = MockServer::start().await;
    mount_stream(&server, &["Hel", "lo"]).await;

    let config = test_config(&server);
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = completions.clone();

    let (content, chunk_count) = tokio::task::spawn_blocking(move || {
        let client = Client::new(config)?;
        let callbacks = StreamCallbacks::new().on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let stream = client.completions().create_stream(
            vec![ChatMessage::user("hi")],
            &CompletionParams::default(),
            callbacks,
        )?;
        let (content, chunks) = stream.collect_all()?;
        Ok::<_, parley::Error>((content, chunks.len()))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(content, "Hello");
    assert_eq!(chunk_count, 3);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}
