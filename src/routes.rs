use crate::{
    api::{attendance, health, ws},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;
use anyhow::{Result, anyhow};

pub type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter for the query endpoints, refilling evenly over a minute.
pub fn build_limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = 60_000 / requests_per_min as u64;
    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms.max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests per minute"))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiter: &LimiterConfig) {
    let query_limiter = Arc::new(Governor::new(limiter));

    cfg.service(health::health);

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::resource("/merged-attendance")
                    .wrap(query_limiter.clone())
                    .route(web::get().to(attendance::merged_attendance)),
            )
            .service(
                web::resource("/snapshot")
                    .wrap(query_limiter)
                    .route(web::get().to(attendance::snapshot)),
            )
            // long-lived, not rate limited
            .service(
                web::resource("/ws/merged-attendance").route(web::get().to(ws::subscribe)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    use super::*;
    use crate::sync::hub::SnapshotHub;
    use crate::sync::reshape::fixtures::{attendance, user};
    use crate::sync::source::memory::MemorySource;
    use crate::sync::{MemorySnapshotCache, Pipeline};

    fn config(rate: u32) -> Config {
        Config {
            server_addr: "127.0.0.1:0".into(),
            database_url: "mysql://unused".into(),
            database_max_connections: 1,
            cache_url: None,
            snapshot_key: "merged_attendance_csv".into(),
            watch_interval: Duration::from_millis(100),
            subscriber_buffer: 4,
            rate_query_per_min: rate,
            api_prefix: "/api".into(),
            log_dir: "logs".into(),
        }
    }

    fn pipeline() -> web::Data<Pipeline> {
        let source = Arc::new(MemorySource::new(
            vec![attendance("a1", "u1")],
            vec![user("u1", "Asha")],
        ));
        web::Data::new(Pipeline::new(
            source,
            Arc::new(MemorySnapshotCache::new()),
            SnapshotHub::new(4),
            "merged_attendance_csv",
        ))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[actix_web::test]
    async fn zero_rate_is_clamped() {
        assert!(build_limiter(0).is_ok());
    }

    #[actix_web::test]
    async fn routes_are_mounted_under_prefix() {
        let config = config(60);
        let limiter = build_limiter(config.rate_query_per_min).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(pipeline())
                .configure(|cfg| configure(cfg, &config, &limiter)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/merged-attendance")
            .peer_addr(peer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subscribers"], 0);
    }

    #[actix_web::test]
    async fn query_routes_are_rate_limited() {
        let config = config(2);
        let limiter = build_limiter(config.rate_query_per_min).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(pipeline())
                .configure(|cfg| configure(cfg, &config, &limiter)),
        )
        .await;

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri("/api/merged-attendance")
                .peer_addr(peer())
                .to_request();
            statuses.push(test::call_service(&app, req).await.status());
        }

        assert_eq!(
            statuses,
            [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}
