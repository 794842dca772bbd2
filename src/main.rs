mod config;
mod discord_log;
mod events;
mod meeting_vote;
mod tasks;

use std::sync::Arc;

use serenity::http::Http;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use config::Config;
use events::{Handler, Registry};
use meeting_vote::{BallotListener, DiscordClient, MeetingVote, MeetingVoteTask, NewProposalListener};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "meetingbot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let http = Arc::new(Http::new(&config.discord_token));

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("meetingbot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_channel_id) = config.log_channel_id {
        let discord_layer = discord_log::DiscordLogLayer::new(http.clone(), log_channel_id);
        registry.with(discord_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting meetingbot...");
    info!("Loaded config from {config_path}");
    info!(
        "Vote channel {} with {} elector(s), sweeping every {:?}",
        config.meeting_vote_channel_id,
        config.electors.len(),
        config.sweep_interval
    );

    let bot_user_id = match http.get_current_user().await {
        Ok(me) => {
            info!("Bot user ID: {}, name: {}", me.id, me.name);
            me.id.get()
        }
        Err(e) => {
            error!("Failed to get bot info: {e}");
            std::process::exit(1);
        }
    };

    let platform = Arc::new(DiscordClient::new(http.clone(), bot_user_id));
    let vote = Arc::new(MeetingVote::new(platform, config.vote_settings()));

    let mut listeners = Registry::new(config.guild_id);
    listeners.register(Arc::new(NewProposalListener::new(vote.clone())));
    listeners.register(Arc::new(BallotListener::new(vote.clone())));

    tasks::spawn_task(Arc::new(MeetingVoteTask::new(vote, config.sweep_interval)));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(listeners))
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Discord client: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = client.start().await {
        error!("Discord client stopped: {e}");
    }
}
