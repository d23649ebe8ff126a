use tracing::{error, info};

mod api_events;
mod api_state;
mod app_state;
mod config;
mod feed;
mod router;
mod tail;
#[cfg(test)]
mod test_support;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    roiwatch_otel::init();

    let cfg = match config::server_config_from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let state = AppState::new(cfg.log_csv.clone(), cfg.bus_capacity);
    let feed_task = tokio::spawn(feed::run(state.clone(), cfg.poll));
    let app = router::build(state);

    let listener = match tokio::net::TcpListener::bind(cfg.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %cfg.addr, "failed to bind server socket: {err}");
            std::process::exit(2);
        }
    };
    info!(addr = %cfg.addr, log = %cfg.log_csv.display(), "roiwatch server listening");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("http server exited with error: {err}");
    }

    info!("stopping detection feed");
    feed_task.abort();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
