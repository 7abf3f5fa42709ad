//! # Pet-Adopter Binary
//!
//! Assembles the application from the plugins enabled at compile time.
//!
//! `pet-adopter` serves the API; `pet-adopter hash-admin <token>` prints the
//! argon2 hash to put in `auth.admin_token_hash`.

mod config;

use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use async_trait::async_trait;
use pa_api::handlers::AppState;
use pa_api::middleware::{cors_policy, standard_middleware};
use pa_core::error::Result as CoreResult;
use pa_core::models::PhotoUpload;
use pa_core::traits::{DescriptionService, PhotoClassifier};
use pa_core::{AdService, Color, ColorDescriber, SearchOrchestrator, SimilarityService, UserService};
use uuid::Uuid;

#[cfg(feature = "db-sqlite")]
use pa_db_sqlite::SqliteRepo;

#[cfg(feature = "storage-local")]
use pa_storage_local::LocalPhotoStore;

#[cfg(feature = "auth-simple")]
use pa_auth_simple::SimpleAuthProvider;

/// Recognises nothing; ads stay untagged until a real classifier is plugged in.
struct NoClassifier;

#[async_trait]
impl PhotoClassifier for NoClassifier {
    async fn classify(&self, photo: &PhotoUpload) -> CoreResult<Option<Color>> {
        log::debug!("no classifier for {} byte {} photo", photo.data.len(), photo.extension);
        Ok(None)
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        return run_command(&command, args.next());
    }

    let settings = config::load()?;

    // 1. Database
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(SqliteRepo::connect(&settings.database.url, settings.database.max_connections).await?);

    // 2. Photo storage
    #[cfg(feature = "storage-local")]
    let photos = {
        tokio::fs::create_dir_all(&settings.photos.dir).await?;
        Arc::new(LocalPhotoStore::new(settings.photos.dir.clone()))
    };

    // 3. Auth
    #[cfg(feature = "auth-simple")]
    let auth = {
        let secret = if settings.auth.token_secret.is_empty() {
            log::warn!("auth.token_secret is not set: issued tokens will not survive a restart");
            Uuid::new_v4().simple().to_string()
        } else {
            settings.auth.token_secret.clone()
        };
        let ttl = chrono::Duration::seconds(settings.auth.token_ttl_secs);
        Arc::new(SimpleAuthProvider::new(&secret, settings.auth.admin_token_hash.clone()).with_token_ttl(ttl))
    };

    let describer: Arc<dyn DescriptionService> = Arc::new(ColorDescriber::new(Arc::new(NoClassifier), repo.clone()));
    let search = Arc::new(SearchOrchestrator::new(repo.clone(), repo.clone(), repo.clone()));

    let state = web::Data::new(AppState {
        search: Arc::clone(&search),
        ads: AdService::new(repo.clone(), photos.clone()),
        similar: SimilarityService::new(repo.clone(), repo.clone(), settings.colors, settings.search.max_limit),
        users: UserService::new(repo.clone(), auth.clone()),
        catalog: repo,
        photos,
        describer,
        auth,
        limits: settings.search,
        max_photo_bytes: settings.photos.max_bytes,
    });

    let photos_dir = settings.photos.dir.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(standard_middleware())
            .wrap(cors_policy())
            .configure(pa_api::configure_routes)
            .service(Files::new("/photos", photos_dir.clone()))
    })
    .bind((settings.server.host.as_str(), settings.server.port))?;
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    log::info!("pet-adopter listening on http://{}:{}", settings.server.host, settings.server.port);
    server.run().await?;

    let grace = Duration::from_secs(settings.server.drain_timeout_secs);
    if tokio::time::timeout(grace, search.drain_background()).await.is_err() {
        log::warn!("search history writes still pending after {grace:?}, cancelling");
        search.shutdown();
    }
    Ok(())
}

fn run_command(command: &str, arg: Option<String>) -> anyhow::Result<()> {
    match (command, arg) {
        #[cfg(feature = "auth-simple")]
        ("hash-admin", Some(token)) => {
            println!("{}", pa_auth_simple::hash_secret(&token)?);
            Ok(())
        }
        (other, _) => anyhow::bail!("unknown command {other:?}; usage: pet-adopter [hash-admin <token>]"),
    }
}
