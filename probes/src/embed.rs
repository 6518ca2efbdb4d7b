use anyhow::Context;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use relay::wire::EmbeddingsRequest;
use relay::OpenAiClient;

/// Everything the embedding probe needs for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub input: String,
}

/// Run the probe: one embeddings request, reporting the dimensionality of
/// the first vector and the token usage.
pub async fn run<W>(cfg: Config, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let client = OpenAiClient::new(&cfg.base_url, &cfg.api_key)?;

    let response = client
        .embeddings(&EmbeddingsRequest {
            model: cfg.model.clone(),
            input: cfg.input.clone(),
        })
        .await?;
    let first = response
        .data
        .first()
        .context("response contained no embeddings")?;

    out.write_all(
        format!(
            "Embedding 维度: {}\nToken 使用: {}\n",
            first.embedding.len(),
            response.usage
        )
        .as_bytes(),
    )
    .await?;
    out.flush().await?;
    Ok(())
}
