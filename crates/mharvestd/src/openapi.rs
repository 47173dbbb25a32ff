//! OpenAPI document for the JSON endpoints.

use utoipa::OpenApi;

use crate::handlers::{HealthResponse, InfoResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_metrics,
        crate::handlers::handle_health,
        crate::handlers::handle_info,
    ),
    components(schemas(HealthResponse, InfoResponse)),
    info(
        title = "metric harvester API",
        version = "1.0",
        description = "Host and container resource metrics scraped from diagnostic commands"
    )
)]
pub(crate) struct ApiDoc;
