#![forbid(unsafe_code)]

use contactd_server::{
    build_router, validate_startup_config, ApiConfig, AppState, ContactContext,
    ContactStoreBackend, HttpStoreBackend, MemoryStore, RetryPolicy,
};
use std::env;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_token_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("CONTACTD_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("CONTACTD_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let api_cfg = ApiConfig {
        max_body_bytes: env_usize("CONTACTD_MAX_BODY_BYTES", 16 * 1024),
        request_timeout: env_duration_ms("CONTACTD_REQUEST_TIMEOUT_MS", 5000),
        store_timeout: env_duration_ms("CONTACTD_STORE_TIMEOUT_MS", 2000),
        require_write_token: env_bool("CONTACTD_REQUIRE_WRITE_TOKEN", false),
        allowed_write_tokens: env_token_list("CONTACTD_WRITE_TOKENS"),
        readiness_requires_store: env_bool("CONTACTD_READINESS_REQUIRES_STORE", true),
    };
    validate_startup_config(&api_cfg)?;

    let retry = RetryPolicy {
        max_attempts: env_usize("CONTACTD_STORE_RETRY_ATTEMPTS", 4),
        base_backoff_ms: env_u64("CONTACTD_STORE_RETRY_BASE_MS", 120),
    };
    let backend: Arc<dyn ContactStoreBackend> = match env::var("CONTACTD_STORE_URL") {
        Ok(url) if !url.trim().is_empty() => Arc::new(HttpStoreBackend::new(
            url,
            env::var("CONTACTD_STORE_BUCKET").unwrap_or_else(|_| "contacts".to_string()),
            env::var("CONTACTD_STORE_BEARER").ok(),
            retry,
            env_bool("CONTACTD_STORE_ALLOW_PRIVATE_HOSTS", false),
        )),
        _ => Arc::new(MemoryStore::default()),
    };

    let context = Arc::new(ContactContext::new(backend, api_cfg.store_timeout));
    info!(backend = context.backend_tag(), "store backend selected");

    let state = AppState::with_config(context.clone(), api_cfg);
    let app = build_router(state.clone());

    // Ready only once the store answers, when readiness requires it.
    if state.api.readiness_requires_store {
        state.ready.store(false, Ordering::Relaxed);
        match context.ping().await {
            Ok(()) => state.ready.store(true, Ordering::Relaxed),
            Err(e) => error!("initial store ping failed: {e}"),
        }
        let context_bg = context.clone();
        let ready_bg = state.ready.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));
            loop {
                interval.tick().await;
                match context_bg.ping().await {
                    Ok(()) => ready_bg.store(true, Ordering::Relaxed),
                    Err(e) => {
                        error!("store ping failed: {e}");
                        ready_bg.store(false, Ordering::Relaxed);
                    }
                }
            }
        });
    }

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("contactd listening on {bind_addr}");
    let accepting = state.accepting_requests.clone();
    let ready = state.ready.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            // Stop admitting requests and report not-ready, then drain
            // whatever is still in flight.
            accepting.store(false, Ordering::Relaxed);
            ready.store(false, Ordering::Relaxed);
            let drain_ms = env_u64("CONTACTD_SHUTDOWN_DRAIN_MS", 5000);
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
