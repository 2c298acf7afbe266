use actix_web::HttpResponse;
use chrono::{DateTime, Utc};

/// Same shape as JavaScript's `Date.prototype.toDateString`.
fn date_string(now: DateTime<Utc>) -> String {
    now.format("%a %b %d %Y").to_string()
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Healthy",
        "time": date_string(Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::date_string;

    #[test]
    fn dates_are_rendered_like_to_date_string() {
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(date_string(date), "Thu Mar 07 2024");
    }
}
