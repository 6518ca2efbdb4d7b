use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use relay::wire::{ChatRequest, Message};
use relay::OpenAiClient;

/// Everything the chat probe needs for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub prompt: String,
}

/// Run the probe: one blocking completion, then the same request streamed.
///
/// Output goes to `out` so tests can capture it; the binaries pass stdout.
/// Any transport or protocol error aborts the run.
pub async fn run<W>(cfg: Config, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let client = OpenAiClient::new(&cfg.base_url, &cfg.api_key)?;

    out.write_all(
        format!(
            "基础 URL: {}\n模型: {}\n提示词: {}\n\n",
            cfg.base_url, cfg.model, cfg.prompt
        )
        .as_bytes(),
    )
    .await?;

    blocking(&client, &cfg, out).await?;
    streamed(&client, &cfg, out).await?;
    Ok(())
}

async fn banner<W>(out: &mut W, title: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = "=".repeat(50);
    out.write_all(format!("{line}\n{title}\n{line}\n").as_bytes())
        .await
}

async fn blocking<W>(client: &OpenAiClient, cfg: &Config, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    banner(out, "测试阻塞请求").await?;

    let request = ChatRequest {
        model: cfg.model.clone(),
        messages: vec![Message::user(&cfg.prompt)],
        stream: false,
    };
    let response = client.chat(&request).await?;

    out.write_all(
        format!(
            "模型: {}\n回复: {}\nToken 使用: {}\n\n",
            response.model,
            response.text(),
            response.usage
        )
        .as_bytes(),
    )
    .await?;
    Ok(())
}

async fn streamed<W>(client: &OpenAiClient, cfg: &Config, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    banner(out, "测试流式请求").await?;

    let request = ChatRequest {
        model: cfg.model.clone(),
        messages: vec![Message::user(&cfg.prompt)],
        stream: true,
    };
    let mut stream = client.chat_stream(&request).await?;

    out.write_all("回复: ".as_bytes()).await?;
    out.flush().await?;
    // Each fragment goes out the moment it arrives, with no separators.
    while let Some(fragment) = stream.next().await {
        out.write_all(fragment.as_bytes()).await?;
        out.flush().await?;
    }
    out.write_all(b"\n\n").await?;
    out.flush().await?;
    Ok(())
}
