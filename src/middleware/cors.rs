use actix_cors::Cors;

use crate::configuration::ApplicationSettings;

/// `"*"` accepts any origin. Cookies may only cross origins in production,
/// where the origin list is expected to be explicit.
pub fn cors(settings: &ApplicationSettings) -> Cors {
    let cors = match settings.allowed_origins() {
        None => Cors::default().allow_any_origin(),
        Some(origins) => origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin)),
    };

    let cors = cors
        .allow_any_method()
        .allow_any_header()
        .expose_headers(["x-request-id", "ratelimit", "ratelimit-policy"])
        .max_age(3600);

    if settings.is_production() {
        cors.supports_credentials()
    } else {
        cors
    }
}
