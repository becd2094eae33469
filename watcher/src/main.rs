use actix_web::{web, App, HttpServer, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;

use drivesync_config::sites::SiteConfig;
use drivesync_config::{AppConfig, StoreBackend};
use drivesync_models::change::DriveChange;
use drivesync_utils::unique_queue::UniqueQueue;

mod errors;

mod services {
    pub mod change_processor;
    pub mod crawler;
    pub mod drive;
    pub mod publisher;
    pub mod store;
    pub mod watch_renewal;
}

mod handlers {
    pub mod changes;
}

#[cfg(test)]
mod test_support;

use services::change_processor::ChangeProcessor;
use services::drive::{DriveApi, DriveApiClient};
use services::publisher::{HttpPublisher, Publisher};
use services::store::{MemoryStore, RedisStore, SubscriptionStore};
use services::watch_renewal::WatchRenewer;

/// One watched site's live pieces, shared between the HTTP handlers and the
/// background workers.
pub struct SiteRuntime {
    pub config: SiteConfig,
    pub queue: Arc<UniqueQueue<DriveChange>>,
}

pub struct AppState {
    pub sites: HashMap<String, Arc<SiteRuntime>>,
    pub store: Arc<dyn SubscriptionStore>,
}

impl AppState {
    pub fn site_by_key(&self, hook_key: &str) -> Option<Arc<SiteRuntime>> {
        self.sites.get(hook_key).cloned()
    }
}

async fn init_store(config: &AppConfig) -> Arc<dyn SubscriptionStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("🗄️  [Drive Watcher] Using in-memory subscription store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Redis => match RedisStore::connect(&config.redis_url).await {
            Ok(store) => {
                info!("✅ [Drive Watcher] Redis connection established");
                Arc::new(store)
            }
            Err(e) => {
                warn!("⚠️  [Drive Watcher] Failed to connect to Redis: {}", e);
                warn!("⚠️  [Drive Watcher] Falling back to in-memory store; watch leases will not exclude other processes");
                Arc::new(MemoryStore::new())
            }
        },
    }
}

/// Seeds the folder mapping for the site root and spawns the site's change
/// processor and watch renewal loop.
async fn start_site(
    config: &AppConfig,
    site: SiteConfig,
    store: Arc<dyn SubscriptionStore>,
    drive: Arc<dyn DriveApi>,
    publisher: Arc<dyn Publisher>,
) -> Arc<SiteRuntime> {
    info!(
        "📁 [Drive Watcher] Watching site {} (folder {})",
        site.name, site.drive_folder_id
    );

    // Notifications for the root folder must resolve to the site's path
    // prefix before the first one arrives.
    if let Err(e) = store
        .set_document_folder(&site.drive_folder_id, &site.path_prefix)
        .await
    {
        warn!("could not seed folder mapping for site {}: {}", site.name, e);
    }

    let queue = Arc::new(UniqueQueue::new(config.queue_max_len));
    let address = config.notification_address(&site);

    let renewer = WatchRenewer::new(
        &site.name,
        &site.drive_folder_id,
        &address,
        store.clone(),
        drive.clone(),
    );
    tokio::spawn(renewer.run());

    let runtime = Arc::new(SiteRuntime {
        config: site.clone(),
        queue: queue.clone(),
    });

    let processor = ChangeProcessor::new(site, queue, store, drive, publisher, config.throttle());
    tokio::spawn(processor.run());

    runtime
}

async fn health_check(state: web::Data<AppState>) -> Result<web::Json<serde_json::Value>> {
    Ok(web::Json(serde_json::json!({
        "status": "healthy",
        "service": "drive-watcher",
        "sites": state.sites.len(),
        "timestamp": chrono::Utc::now()
    })))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ [Drive Watcher] Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("🚀 [Drive Watcher] Starting on port {}", config.port);

    let store = init_store(&config).await;
    let drive: Arc<dyn DriveApi> = Arc::new(DriveApiClient::new(config.oauth.clone()));
    let publisher: Arc<dyn Publisher> = Arc::new(HttpPublisher::new(config.publish_url.clone()));

    let mut sites = HashMap::new();
    for site in config.sites.clone() {
        let key = site.hook_key.clone();
        let runtime = start_site(
            &config,
            site,
            store.clone(),
            drive.clone(),
            publisher.clone(),
        )
        .await;
        sites.insert(key, runtime);
    }

    let state = web::Data::new(AppState { sites, store });
    let bind_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route(
                "/api/hooks/drive/{site_key}",
                web::post().to(handlers::changes::handle_drive_notification),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
