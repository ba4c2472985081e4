//! Typed wrappers for the Tillar API endpoints
//!
//! Auth endpoints live under `/api/keycloak/`. Downstream services
//! (coins, news, AI bots) are reached through a single gateway endpoint
//! that forwards a [`MicroserviceProxyRequest`](models::MicroserviceProxyRequest).

mod auth;
pub mod models;
mod proxy;

pub const CSRF_PATH: &str = "/api/keycloak/csrf/";
pub const REGISTER_PATH: &str = "/api/keycloak/register/";
pub const LOGIN_PATH: &str = "/api/keycloak/login/";
pub const REFRESH_PATH: &str = "/api/keycloak/refresh/";
pub const USER_INFO_PATH: &str = "/api/keycloak/userinfo/";
pub const LOGOUT_PATH: &str = "/api/keycloak/logout/";
pub const PROXY_PATH: &str = "/api/microservices/proxy/";
