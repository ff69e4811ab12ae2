//! Relay server bootstrap and router wiring.

use super::*;

pub async fn run_relay_server(config: RelayServerConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    let state = Arc::new(RelayServerState::new(config)?);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind relay server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound relay server address")?;
    println!(
        "relay server listening: addr={} state_dir={}",
        local_addr,
        state.config.state_dir.display()
    );

    let app = build_relay_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("relay server exited unexpectedly")?;
    Ok(())
}

pub(super) fn build_relay_router(state: Arc<RelayServerState>) -> Router {
    // Headroom over the evidence cap covers multipart framing and the text
    // fields that ride along with the file.
    let max_body_bytes = state
        .config
        .max_evidence_bytes
        .saturating_add(64 * 1024)
        .min(usize::MAX as u64) as usize;
    Router::new()
        .route(EVENTS_ENDPOINT, post(handle_event_ingest))
        .route(EVIDENCE_ENDPOINT, post(handle_evidence_upload))
        .route(EVIDENCE_DETAIL_ENDPOINT, get(handle_evidence_download))
        .route(STATUS_ENDPOINT, get(handle_relay_status))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
