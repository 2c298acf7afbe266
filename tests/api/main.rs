mod auth;
mod health_check;
mod helpers;
mod me;
mod rate_limit;
mod shutdown;
