use clap::Parser;
use probes::chat::{run, Config};

/// Manual check of a chat-completions endpoint, blocking then streamed.
#[derive(Parser, Debug)]
#[command(name = "chat-probe", version)]
struct Cli {
    /// Base URL of the OpenAI-compatible service
    #[arg(long, default_value = "http://localhost:3000/v1")]
    base_url: String,

    /// API key sent as a bearer token
    #[arg(long, default_value = "sk-your-api-key")]
    api_key: String,

    /// Model name
    #[arg(long, default_value = "gpt-4")]
    model: String,

    /// Prompt sent as a single user message
    #[arg(long, default_value = "你好，请用一句话介绍自己")]
    prompt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config {
        base_url: cli.base_url,
        api_key: cli.api_key,
        model: cli.model,
        prompt: cli.prompt,
    };
    run(cfg, &mut tokio::io::stdout()).await
}
