mod commands;
mod config;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use snaps_cache::{AvatarService, CacheConfig, PostPreviewCache, PostPreviewFetcher};
use snaps_chat::{ChatClient, Synchronizer};
use snaps_classifier::classify;
use snaps_hive::HiveClient;
use snaps_store::persisted::DEFAULT_DEBOUNCE;
use snaps_store::{Credentials, KeyValueStore, PersistedMap, SqliteStore};

use commands::Command;
use config::Config;

const AVATAR_NAMESPACE: &str = "avatars";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snaps=debug,snaps_chat=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Storage
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&config.db_path)?);
    let saved_avatars = PersistedMap::load_bounded(
        store.clone(),
        AVATAR_NAMESPACE,
        DEFAULT_DEBOUNCE,
        CacheConfig::default().max_entries,
    )?;

    // Chain access and caches
    let hive = Arc::new(match config.hive_nodes.clone() {
        Some(nodes) => HiveClient::new(nodes)?,
        None => HiveClient::with_default_nodes()?,
    });
    let avatars = AvatarService::new(CacheConfig::default(), hive.clone(), Some(saved_avatars.clone()));
    let previews = PostPreviewCache::new(CacheConfig::default(), PostPreviewFetcher::new(hive.clone()));
    let sweepers = [
        avatars.cache().spawn_sweeper(config.cache_sweep),
        previews.spawn_sweeper(config.cache_sweep),
    ];

    // Chat
    let chat = Arc::new(ChatClient::new(&config.chat_url)?);
    let sync = Synchronizer::new(chat, config.poll);

    let username = match config.username.clone() {
        Some(username) => Some(username),
        None => Credentials::load(store.as_ref())?.map(|c| c.username),
    };
    match &username {
        Some(username) => {
            if let Err(e) = sync.initialize(username, config.chat_token.as_deref()).await {
                warn!("Chat unavailable: {}", e);
            }
        }
        None => warn!("No username configured, chat stays offline"),
    }

    info!("HiveSnaps client ready, reading commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Event(event) => {
                sync.handle(event).await;
                println!("state: {:?}", sync.state().await);
            }
            Command::Select(channel_id) => match sync.select_channel(Some(&channel_id)).await {
                Ok(()) => {
                    for message in sync.messages().await {
                        println!("[{}] {}: {}", message.created_at, message.author, message.body);
                    }
                }
                Err(e) => println!("error: {}", e),
            },
            Command::Send(body) => match sync.send_message(&body).await {
                Ok(message) => println!("sent {}", message.id),
                Err(e) => println!("error: {}", e),
            },
            Command::Classify(key) => match hive.get_content(&key).await {
                Ok(Some(post)) => println!("{}: {:?}", key, classify(&post, hive.as_ref()).await),
                Ok(None) => println!("{}: not found", key),
                Err(e) => println!("error: {}", e),
            },
            Command::Preview(key) => match previews.get_or_fetch(key.clone()).await {
                Some(preview) => println!("{}\n{}", preview.title, preview.excerpt),
                None => println!("{}: no preview", key),
            },
            Command::Avatar(user) => match avatars.avatar(&user).await {
                Some(url) => println!("{}", url),
                None => println!("no avatar for {}", user),
            },
            Command::Unread => {
                let unread = sync.unread().await;
                println!(
                    "unread: {} ({} community, {} direct)",
                    unread.total, unread.community, unread.direct
                );
                if let Some(error) = sync.last_error().await {
                    println!("last error: {}", error);
                }
            }
        }
    }

    sync.stop().await;
    for sweeper in sweepers {
        sweeper.abort();
    }
    saved_avatars.flush()?;
    info!("Shut down");
    Ok(())
}
