use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scout API",
        version = "0.1.0",
        description = "Scheduled content scraper with a live item stream."
    ),
    paths(
        crate::routes::latest,
        crate::routes::subscribe,
        crate::routes::status,
        crate::routes::enqueue,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ItemResponse,
        crate::dto::LatestResponse,
        crate::dto::Pagination,
        crate::dto::StatusResponse,
        crate::dto::EnqueueRequest,
        crate::dto::EnqueueResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "items", description = "Stored items and the live stream"),
        (name = "admin", description = "Operator actions"),
        (name = "system", description = "Health and scheduler status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin token. Set via SCOUT_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
