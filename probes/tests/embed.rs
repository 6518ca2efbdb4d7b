use httpmock::prelude::*;
use probes::embed::{run, Config};
use serde_json::json;

fn probe_config(base_url: String) -> Config {
    Config {
        base_url,
        api_key: "sk-test".into(),
        model: "text-embedding-ada-002".into(),
        input: "Hello, world!".into(),
    }
}

#[tokio::test]
async fn run_prints_dimension_and_usage() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .body_contains("text-embedding-ada-002");
            then.status(200).json_body(json!({
                "data": [{"embedding": vec![0.25f32; 8]}],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            }));
        })
        .await;

    let mut out = Vec::new();
    run(probe_config(server.url("/v1")), &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(
        text,
        "Embedding 维度: 8\nToken 使用: prompt_tokens=4 completion_tokens=0 total_tokens=4\n"
    );
}

#[tokio::test]
async fn empty_data_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200)
                .json_body(json!({"data": [], "usage": {"prompt_tokens": 0, "total_tokens": 0}}));
        })
        .await;

    let mut out = Vec::new();
    assert!(run(probe_config(server.url("/v1")), &mut out)
        .await
        .is_err());
}

#[tokio::test]
async fn unreachable_service_errors_out() {
    let cfg = probe_config("http://127.0.0.1:1/v1".into());
    let mut out = Vec::new();
    assert!(run(cfg, &mut out).await.is_err());
}
