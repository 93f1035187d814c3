use std::sync::Arc;

use axum::{Router, routing::get};
use museca_card_backend::config::AppConfig;
use museca_card_backend::features::health::handler::health_check;
use museca_card_backend::features::scorecard;
use museca_card_backend::features::scorecard::allocator::ImageAllocator;
use museca_card_backend::features::scorecard::dispatch::{GameHandler, HandlerRegistry};
use museca_card_backend::features::scorecard::museca::{AssetStore, MusecaHandler, RenderSettings};
use museca_card_backend::request_id::request_id_middleware;
use museca_card_backend::startup::{dispatch_loader, music_loader, run_startup_checks};
use museca_card_backend::state::AppState;
use tokio::sync::Semaphore;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    // 主响应是 PNG，压缩纯属浪费 CPU；JSON/SVG/文档类响应照常压缩。
    SizeAbove::default()
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::const_new("application/octet-stream"))
}


#[derive(OpenApi)]
#[openapi(
    paths(
        museca_card_backend::features::scorecard::handler::submit_scorecard,
        museca_card_backend::features::health::handler::health_check,
    ),
    components(
        schemas(
            museca_card_backend::AppError,
            museca_card_backend::error::ProblemDetails,
            museca_card_backend::features::health::handler::HealthResponse,
        )
    ),
    tags(
        (name = "Scorecard", description = "Scorecard 渲染 APIs"),
        (name = "Health", description = "Health APIs"),
    ),
    info(
        title = "MUSECA Card Backend API",
        version = "0.1.0",
        description = "MUSECA scorecard 渲染服务 (Axum)"
    )
)]
pub struct ApiDoc;

/// 等待 ctrl-c 或 SIGTERM，触发优雅退出
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("安装 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("安装 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("接收到退出信号，开始优雅关闭 HTTP 服务器...");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "museca_card_backend=info,tower_http=info".into()),
        )
        .init();

    // Load config
    if let Err(e) = AppConfig::init_global() {
        tracing::error!("Config init failed: {}", e);
        std::process::exit(1);
    }
    let config = AppConfig::global();

    // Run startup checks
    if let Err(e) = run_startup_checks(config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // Load music db
    let catalog = music_loader::load_music_catalog(&config.music_db_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to load music db: {}", e);
        panic!("missing or invalid music db");
    });

    // Load dispatch table
    let table = dispatch_loader::load_dispatch_table(&config.dispatch_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to load dispatch table: {}", e);
        panic!("missing or invalid games.json");
    });

    // 注册 handler 集合（封闭集合，启动期组装完毕）
    let catalog = Arc::new(catalog);
    let assets = Arc::new(AssetStore::new(config.assets_path()));
    let museca_handler: Arc<dyn GameHandler> = Arc::new(MusecaHandler::new(
        Arc::clone(&catalog),
        Arc::clone(&assets),
        RenderSettings {
            fonts_dir: config.fonts_path(),
            optimize_speed: config.image.optimize_speed,
        },
    ));
    let registry = match HandlerRegistry::new(table, vec![museca_handler]) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            tracing::error!("Handler registry init failed: {}", e);
            std::process::exit(1);
        }
    };

    // Shared state
    let app_state = AppState {
        catalog,
        registry,
        allocator: Arc::new(ImageAllocator::new(config.cards_path())),
        render_semaphore: Arc::new(Semaphore::new({
            let m = config.image.max_parallel as usize;
            if m == 0 { num_cpus::get() } else { m }
        })),
    };

    // Routes
    let api_router = Router::<AppState>::new().merge(scorecard::create_scorecard_router());

    let mut app = Router::<AppState>::new()
        .route("/health", get(health_check))
        // 生成的 scorecard 对外通过静态目录服务访问
        .nest_service("/cards", ServeDir::new(config.cards_path()))
        .nest(&config.api.prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    app = app.layer(axum::middleware::from_fn(request_id_middleware));
    app = app.layer(CompressionLayer::new().compress_when(compression_predicate()));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!(
        "Scorecard API: http://{}{}/scorecard",
        addr,
        config.api.prefix
    );
    tracing::info!("Cards: http://{}/cards", addr);

    let graceful = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    tracing::info!("服务器已优雅关闭");
}
