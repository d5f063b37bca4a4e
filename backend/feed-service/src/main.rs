use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use feed_service::config::Config;
use feed_service::consumers::notification_consumer::NotificationConsumer;
use feed_service::handlers;
use feed_service::jobs;
use feed_service::kafka::EventPublisher;
use feed_service::metrics::{serve_metrics, FeedMetrics};
use feed_service::services::classifier::Classifier;
use feed_service::services::ingestion::IngestionService;
use feed_service::services::link_preview::LinkPreviewClient;
use feed_service::services::media::MediaService;
use feed_service::services::moderation::ModerationService;
use feed_service::services::notifications::{NotificationDispatcher, WebhookChannel};
use feed_service::services::plugins::{PluginRegistry, PluginRunner};
use feed_service::services::posts::PostService;
use feed_service::services::rate_limit::RateLimitService;
use feed_service::services::storage::Storage;
use redis::aio::ConnectionManager;
use redis::RedisError;
use redis_utils::{RateCounter, RedisPool, TtlGuard};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct HealthState {
    db_pool: sqlx::PgPool,
    redis_manager: Arc<Mutex<ConnectionManager>>,
    storage: Storage,
}

impl HealthState {
    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db_pool)
            .await
            .map(|_| ())
    }

    async fn check_redis(&self) -> Result<(), RedisError> {
        let mut conn = self.redis_manager.lock().await;
        let pong: String = redis::cmd("PING").query_async(&mut *conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RedisError::from((
                redis::ErrorKind::ResponseError,
                "unexpected PING response",
            )))
        }
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.check_postgres().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "feed-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "feed-service"
        })),
    }
}

async fn liveness_summary() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "alive": true }))
}

async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let postgres_ok = state.check_postgres().await.is_ok();
    let redis_ok = state.check_redis().await.is_ok();
    let storage_ok = state.storage.health_check().await.is_ok();
    let ready = postgres_ok && redis_ok && storage_ok;

    let body = serde_json::json!({
        "ready": ready,
        "checks": {
            "postgresql": if postgres_ok { "healthy" } else { "unhealthy" },
            "redis": if redis_ok { "healthy" } else { "unhealthy" },
            "storage": if storage_ok { "healthy" } else { "unhealthy" },
        }
    });

    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(io::Error::other)?;
    tracing::info!(env = config.app.env, "starting feed-service");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| io::Error::other(format!("database connect: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::other(format!("migrations: {e}")))?;

    let redis_pool = RedisPool::connect(&config.cache.url)
        .await
        .map_err(|e| io::Error::other(format!("redis connect: {e}")))?;

    let metrics = Arc::new(FeedMetrics::new().map_err(io::Error::other)?);
    let storage = Storage::connect(&config.storage).await;

    let publisher = Arc::new(EventPublisher::new(&config.kafka).map_err(io::Error::other)?);
    let preview = LinkPreviewClient::new(Duration::from_secs(config.ingestion.fetch_timeout_secs));

    let moderation = Arc::new(ModerationService::new(
        pool.clone(),
        config.moderation.flag_limit,
    ));
    let posts = Arc::new(PostService::new(
        pool.clone(),
        &config.moderation,
        Arc::clone(&moderation),
        Arc::clone(&publisher),
        preview.clone(),
        Arc::clone(&metrics),
    ));
    let media = Arc::new(MediaService::new(
        pool.clone(),
        storage.clone(),
        config.media.clone(),
        Arc::clone(&metrics),
    ));

    let ingestion = Arc::new(IngestionService::new(
        pool.clone(),
        TtlGuard::new(redis_pool.manager()),
        Classifier::new(&config.moderation),
        Arc::clone(&moderation),
        Arc::clone(&publisher),
        preview.clone(),
        storage.clone(),
        Arc::clone(&metrics),
        &config.ingestion,
        config.moderation.content_limit,
    ));
    tokio::spawn(jobs::feed_ingestion::run_feed_ingestion_loop(
        Arc::clone(&ingestion),
        Duration::from_secs(config.ingestion.run_interval_secs),
    ));

    let plugin_runner = Arc::new(PluginRunner::new(
        pool.clone(),
        PluginRegistry::with_builtins(),
        Arc::clone(&posts),
        Arc::clone(&metrics),
    ));
    tokio::spawn(jobs::plugin_runner::run_plugin_loop(
        plugin_runner,
        Duration::from_secs(config.notifications.plugin_interval_secs),
    ));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        pool.clone(),
        Arc::new(WebhookChannel::new(config.notifications.webhook_url.clone())),
        TtlGuard::new(redis_pool.manager()),
        Arc::clone(&metrics),
        &config.notifications,
    ));
    let consumer = NotificationConsumer::new(&config.kafka, dispatcher)
        .map_err(io::Error::other)?;
    tokio::spawn(async move { consumer.run().await });

    let rate_limits = Arc::new(RateLimitService::new(
        pool.clone(),
        RateCounter::new(redis_pool.manager()),
        &config.rate_limits,
    ));

    let health_state = web::Data::new(HealthState {
        db_pool: pool.clone(),
        redis_manager: redis_pool.manager(),
        storage: storage.clone(),
    });

    let bind_addr = (config.app.host.clone(), config.app.port);
    tracing::info!(host = bind_addr.0, port = bind_addr.1, "feed-service listening");

    let cors_origins = config.cors.allowed_origins.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
            .allow_any_header()
            .max_age(3600);
        for origin in cors_origins.split(',') {
            let origin = origin.trim();
            if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(health_state.clone())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(Arc::clone(&metrics)))
            .app_data(web::Data::new(Arc::clone(&moderation)))
            .app_data(web::Data::new(Arc::clone(&posts)))
            .app_data(web::Data::new(Arc::clone(&media)))
            .app_data(web::Data::new(Arc::clone(&publisher)))
            .app_data(web::Data::new(Arc::clone(&rate_limits)))
            .route("/metrics", web::get().to(serve_metrics))
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/live", web::get().to(liveness_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
