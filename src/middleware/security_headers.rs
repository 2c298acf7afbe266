use actix_web::middleware::DefaultHeaders;

const SECURITY_HEADERS: [(&str, &str); 9] = [
    ("Content-Security-Policy", "default-src 'self'; frame-ancestors 'self'; object-src 'none'"),
    ("Cross-Origin-Opener-Policy", "same-origin"),
    ("Cross-Origin-Resource-Policy", "same-origin"),
    ("Referrer-Policy", "no-referrer"),
    ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-DNS-Prefetch-Control", "off"),
    ("X-Frame-Options", "SAMEORIGIN"),
    ("X-XSS-Protection", "0"),
];

/// Hardening headers added to every response unless a handler set them.
pub fn security_headers() -> DefaultHeaders {
    SECURITY_HEADERS
        .iter()
        .fold(DefaultHeaders::new(), |headers, &header| headers.add(header))
}
