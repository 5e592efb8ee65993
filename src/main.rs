use std::fs::File;
use std::sync::Arc;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use dify_chat::api::{DifyClient, ResponseMode};
use dify_chat::core::config::{self, CliOverrides};
use dify_chat::core::conversation::ConversationId;
use dify_chat::tui;

#[derive(Parser)]
#[command(name = "dify-chat", about = "Terminal chat client for Dify apps")]
struct Args {
    /// Open an existing conversation by its server id
    #[arg(short, long)]
    conversation: Option<String>,

    /// API base URL (overrides config file and DIFY_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// End-user identifier sent with every request
    #[arg(short, long)]
    user: Option<String>,

    /// How answers are delivered
    #[arg(long, value_enum)]
    response_mode: Option<ResponseMode>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to dify-chat.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("dify-chat.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let cli = CliOverrides {
        base_url: args.base_url,
        user: args.user,
        response_mode: args.response_mode,
    };
    let resolved = config::resolve(&file_config, &cli);

    let api_key = match resolved.require_api_key() {
        Ok(key) => key.to_string(),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    log::info!(
        "dify-chat starting up: base_url={}, user={}, mode={}",
        resolved.base_url,
        resolved.user,
        resolved.response_mode.as_str()
    );

    let client = DifyClient::new(
        api_key,
        Some(resolved.base_url.clone()),
        resolved.user.clone(),
    );
    let initial = args.conversation.as_deref().and_then(ConversationId::parse);

    tui::run(Arc::new(client), &resolved, initial)
}
