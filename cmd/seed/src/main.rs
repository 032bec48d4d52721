//! # seed
//!
//! Wipes the database, seeds one thread with a small reply forest and logs
//! every page of each sort mode. Useful for eyeballing orderings against a
//! real Postgres.

use std::sync::Arc;

use configs::{LogSettings, Settings};
use domains::{NewPost, Post, PostId};
use secrecy::ExposeSecret;
use services::{PostService, PostServiceConfig, RawPageParams};
use storage_adapters::PostgresStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const THREAD_SLUG: &str = "black-pearl";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    // 1. Connect and prepare the schema
    let store = Arc::new(
        PostgresStore::connect(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
            settings.database.acquire_timeout(),
        )
        .await?,
    );
    if settings.database.run_migrations {
        store.migrate().await?;
    }
    store.clear().await?;

    // 2. Rows owned by other services
    for nickname in ["j.sparrow", "h.barbossa", "w.turner"] {
        store.create_user(nickname).await?;
    }
    store.create_forum("pirates", "Pirates of the Caribbean", "j.sparrow").await?;
    let thread = store
        .create_thread(Some(THREAD_SLUG), "pirates", "j.sparrow", "The Black Pearl")
        .await?;
    info!(thread_id = thread.id, slug = THREAD_SLUG, "seeded thread");

    let service = PostService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        PostServiceConfig {
            default_limit: settings.posts.default_limit,
        },
    );

    // 3. Reply forest, one batch per depth
    let roots = service
        .create_posts(
            THREAD_SLUG,
            vec![
                NewPost::root("j.sparrow", "Has anyone seen my ship?"),
                NewPost::root("w.turner", "Looking for a blacksmith apprentice."),
                NewPost::root("h.barbossa", "Apples, anyone?"),
            ],
        )
        .await?;
    let replies = service
        .create_posts(
            THREAD_SLUG,
            vec![
                NewPost::reply("h.barbossa", "She's mine now.", roots[0].id),
                NewPost::reply("w.turner", "Which ship?", roots[0].id),
                NewPost::reply("j.sparrow", "Try Tortuga.", roots[1].id),
            ],
        )
        .await?;
    service
        .create_posts(
            THREAD_SLUG,
            vec![NewPost::reply("j.sparrow", "Not for long.", replies[0].id)],
        )
        .await?;

    // 4. Walk every sort mode in both directions, two per page
    for sort in ["flat", "tree", "parent_tree"] {
        for desc in [false, true] {
            let mut params = RawPageParams::new(sort).desc(desc).limit(2);
            let mut page_no = 1;
            loop {
                let page = service.get_sorted_posts(THREAD_SLUG, &params).await?;
                info!(sort, desc, page = page_no, ids = ?ids(&page.posts), "page");
                let Some(cursor) = page.next_cursor else {
                    break;
                };
                params = params.since(cursor);
                page_no += 1;
            }
        }
    }

    let sample = service.get_post_details(replies[0].id, "user,forum,thread").await?;
    info!(details = %serde_json::to_string(&sample)?, "first reply");

    Ok(())
}

fn ids(posts: &[Post]) -> Vec<PostId> {
    posts.iter().map(|post| post.id).collect()
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
