#[tokio::main]
async fn main() {
    opsdesk_observability::init();

    let services = match std::env::var("DATABASE_URL") {
        Ok(url) => match opsdesk_api::app::services::build_postgres_services(&url).await {
            Ok(services) => services,
            Err(err) => {
                tracing::error!(error = %err, "failed to connect to the database");
                std::process::exit(1);
            }
        },
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores (state is lost on exit)");
            opsdesk_api::app::services::build_in_memory_services()
        }
    };

    let app = opsdesk_api::app::build_app(services);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
