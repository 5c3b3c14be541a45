use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::ApiError;
use crate::model::MergedTable;
use crate::sync::{Pipeline, cache};

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SnapshotQuery {
    /// Cache key to read; the publish key when omitted
    #[param(example = "merged_attendance_csv")]
    pub key: Option<String>,
    /// Response body format
    pub format: Option<SnapshotFormat>,
}

/// Fresh merge of attendance and users
#[utoipa::path(
    get,
    path = "/api/merged-attendance",
    responses(
        (status = 200, description = "One row per attendance record; empty when a source collection is empty", body = [MergedRow]),
        (status = 429, description = "Too many requests"),
        (status = 503, description = "Source store unreachable", body = Object, example = json!({
            "error": "Service Unavailable"
        }))
    ),
    tag = "Attendance"
)]
pub async fn merged_attendance(pipeline: web::Data<Pipeline>) -> Result<HttpResponse, ApiError> {
    let rows = pipeline
        .recompute()
        .await?
        .map(MergedTable::into_rows)
        .unwrap_or_default();

    info!(rows = rows.len(), "Served merged attendance");
    Ok(HttpResponse::Ok().json(rows))
}

/// Last published snapshot, read back from the cache
#[utoipa::path(
    get,
    path = "/api/snapshot",
    params(SnapshotQuery),
    responses(
        (status = 200, description = "Cached rows as JSON, or as CSV with format=csv", body = [MergedRow]),
        (status = 404, description = "Nothing cached under the key", body = Object, example = json!({
            "error": "No snapshot stored under 'merged_attendance_csv'"
        })),
        (status = 429, description = "Too many requests"),
        (status = 503, description = "Cache backend unreachable")
    ),
    tag = "Attendance"
)]
pub async fn snapshot(
    pipeline: web::Data<Pipeline>,
    query: web::Query<SnapshotQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let key = query
        .key
        .as_deref()
        .filter(|k| !k.is_empty())
        .unwrap_or(pipeline.snapshot_key());

    let table = cache::get(pipeline.cache(), key)
        .await?
        .ok_or_else(|| ApiError::NoData(format!("No snapshot stored under '{key}'")))?;

    match query.format.unwrap_or_default() {
        SnapshotFormat::Json => Ok(HttpResponse::Ok().json(table.rows())),
        SnapshotFormat::Csv => Ok(HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .body(table.to_csv()?)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;

    use super::*;
    use crate::model::NOT_AVAILABLE;
    use crate::sync::hub::SnapshotHub;
    use crate::sync::reshape::fixtures::{attendance, user};
    use crate::sync::source::memory::MemorySource;
    use crate::sync::{MemorySnapshotCache, SnapshotCache};

    const KEY: &str = "merged_attendance_csv";

    fn pipeline(source: Arc<MemorySource>) -> (web::Data<Pipeline>, Arc<MemorySnapshotCache>) {
        let cache = Arc::new(MemorySnapshotCache::new());
        let pipeline = Pipeline::new(source, cache.clone(), SnapshotHub::new(4), KEY);
        (web::Data::new(pipeline), cache)
    }

    fn seeded() -> Arc<MemorySource> {
        Arc::new(MemorySource::new(
            vec![attendance("a1", "u1"), attendance("a2", "ghost")],
            vec![user("u1", "Asha")],
        ))
    }

    macro_rules! app {
        ($data:expr) => {
            test::init_service(
                App::new()
                    .app_data($data.clone())
                    .route("/merged-attendance", web::get().to(merged_attendance))
                    .route("/snapshot", web::get().to(snapshot)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn merged_attendance_returns_rows() {
        let (data, _) = pipeline(seeded());
        let app = app!(data);

        let req = test::TestRequest::get().uri("/merged-attendance").to_request();
        let body: Vec<Value> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["employee_name"], "Asha");
        assert_eq!(body[1]["employee_name"], NOT_AVAILABLE);
        assert!(body.iter().all(|row| row.get("password").is_none()));
    }

    #[actix_web::test]
    async fn merged_attendance_is_empty_array_without_users() {
        let source = Arc::new(MemorySource::new(vec![attendance("a1", "u1")], Vec::new()));
        let (data, _) = pipeline(source);
        let app = app!(data);

        let req = test::TestRequest::get().uri("/merged-attendance").to_request();
        let body: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(body.is_empty());
    }

    #[actix_web::test]
    async fn unreachable_store_is_503() {
        let source = seeded();
        source.go_offline();
        let (data, _) = pipeline(source);
        let app = app!(data);

        let req = test::TestRequest::get().uri("/merged-attendance").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn snapshot_absent_is_404() {
        let (data, _) = pipeline(seeded());
        let app = app!(data);

        let req = test::TestRequest::get().uri("/snapshot").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn snapshot_corrupt_value_is_404() {
        let (data, cache) = pipeline(seeded());
        cache
            .set_text("employee_data_csv", "attendance_id,break_count\nx,lots\n".into())
            .await
            .unwrap();
        let app = app!(data);

        let req = test::TestRequest::get()
            .uri("/snapshot?key=employee_data_csv")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn snapshot_serves_published_table_in_both_formats() {
        let (data, _) = pipeline(seeded());
        let table = data.recompute().await.unwrap().unwrap();
        cache::put(data.cache(), KEY, &table).await.unwrap();
        let app = app!(data);

        let req = test::TestRequest::get().uri("/snapshot").to_request();
        let rows: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rows, serde_json::to_value(table.rows()).unwrap());

        let req = test::TestRequest::get()
            .uri("/snapshot?format=csv")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body, table.to_csv().unwrap().as_bytes());
    }

    #[actix_web::test]
    async fn unknown_format_is_rejected() {
        let (data, _) = pipeline(seeded());
        let app = app!(data);

        let req = test::TestRequest::get()
            .uri("/snapshot?format=xml")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
