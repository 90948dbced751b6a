use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};

/// Serve `/metrics` and `/health` until the server is stopped
pub async fn start_metrics_server(registry: Registry, port: u16) -> std::io::Result<()> {
    tracing::info!("Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(registry: web::Data<Registry>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "todo-backend"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body::to_bytes, test as actix_test};

    #[actix_web::test]
    async fn test_metrics_endpoint_renders_registry() {
        let metrics = crate::metrics::Metrics::new().unwrap();
        metrics.record_events_appended(4);

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(metrics.registry().clone()))
                .route("/metrics", web::get().to(metrics_handler)),
        )
        .await;

        let response = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/metrics").to_request()).await;
        assert!(response.status().is_success());

        let body = to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("store_events_appended_total 4"));
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = actix_test::init_service(App::new().route("/health", web::get().to(health_handler))).await;

        let response = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/health").to_request()).await;
        assert!(response.status().is_success());
    }
}
