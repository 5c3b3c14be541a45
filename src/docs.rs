use crate::api::attendance::SnapshotFormat;
use crate::api::health::HealthResponse;
use crate::model::MergedRow;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Sync API",
        version = "0.1.0",
        description = r#"
## Attendance Sync

Keeps a denormalized view of attendance records joined with employee
profiles, caches the latest snapshot and streams updates to subscribers.

### Endpoints
- **Merged attendance**: fresh join of both collections as JSON
- **Snapshot**: last published table, read back from the cache as JSON or CSV
- **Live feed**: websocket that sends the full table as CSV on connect and on
  every change

### Column policy
Employee contact details, identifiers and credentials are never selected.
Rows whose employee cannot be resolved carry `N/A` in every `employee_*` column.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::merged_attendance,
        crate::api::attendance::snapshot,
        crate::api::ws::subscribe,
        crate::api::health::health,
    ),
    components(
        schemas(
            MergedRow,
            SnapshotFormat,
            HealthResponse
        )
    ),
    tags(
        (name = "Attendance", description = "Merged attendance APIs"),
        (name = "Health", description = "Service status"),
    )
)]
pub struct ApiDoc;
