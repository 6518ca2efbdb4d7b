use clap::Parser;
use probes::embed::{run, Config};

/// Manual check of an embeddings endpoint.
#[derive(Parser, Debug)]
#[command(name = "embed-probe", version)]
struct Cli {
    /// Base URL of the OpenAI-compatible service
    #[arg(long, default_value = "http://localhost:8080/v1")]
    base_url: String,

    /// API key sent as a bearer token
    #[arg(long, default_value = "sk-your-api-key")]
    api_key: String,

    /// Embedding model name
    #[arg(long, default_value = "text-embedding-ada-002")]
    model: String,

    /// Text to embed
    #[arg(long, default_value = "Hello, world!")]
    input: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config {
        base_url: cli.base_url,
        api_key: cli.api_key,
        model: cli.model,
        input: cli.input,
    };
    run(cfg, &mut tokio::io::stdout()).await
}
