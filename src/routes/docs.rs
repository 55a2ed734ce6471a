use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::documentation::ApiDoc;

/// Where the generated OpenAPI document is served.
pub const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI at `/docs`, backed by the document served at [`OPENAPI_PATH`].
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/docs")
        .url(OPENAPI_PATH, ApiDoc::openapi())
        .into()
}
