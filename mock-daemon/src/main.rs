use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "2375".to_string());
    let locked = std::env::var("MOCK_DAEMON_LOCKED").is_ok_and(|v| v == "1");
    let state = if locked {
        mock_daemon::DaemonState::locked()
    } else {
        mock_daemon::DaemonState::new()
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, locked, "mock daemon listening");
    mock_daemon::run(listener, state).await
}
