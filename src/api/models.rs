//! Request and response bodies of the Tillar API

use serde::{Deserialize, Serialize};

use crate::json::JsonValue;

// Common

/// Generic `{ success, status, message, data }` envelope
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: Option<bool>,
    pub status: Option<i64>,
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMessage {
    pub success: Option<bool>,
    pub message: Option<String>,
}

/// Error envelope: a list of human-readable messages
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorResponse {
    pub errors: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn first_error(&self) -> Option<&str> {
        self.errors.as_ref()?.first().map(String::as_str)
    }
}

// Auth

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

/// Token pair as returned by refresh, where either half may be missing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshedTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub keycloak_uuid: Option<String>,
}

impl AuthUser {
    /// "First Last", falling back to the username
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.username.clone().unwrap_or_default()
        } else {
            full
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub user: Option<AuthUser>,
    pub tokens: Option<AuthTokens>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub tokens: Option<RefreshedTokens>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfoResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub user: Option<AuthUser>,
}

// Microservices proxy

/// Body of the gateway call that reaches downstream services
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicroserviceProxyRequest {
    pub service: String,
    /// Downstream HTTP method, as a string
    pub method: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinsBalanceResponse {
    pub success: Option<bool>,
    pub status: Option<i64>,
    pub data: Option<CoinsBalanceData>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinsBalanceData {
    pub coins: Option<i64>,
    pub balance: Option<i64>,
    pub amount: Option<i64>,
}

impl CoinsBalanceResponse {
    /// The balance under whichever field the service filled in
    pub fn balance(&self) -> i64 {
        self.data
            .as_ref()
            .and_then(|d| d.coins.or(d.balance).or(d.amount))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewsListResponse {
    pub success: Option<bool>,
    pub status: Option<i64>,
    pub data: Option<NewsListData>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsListData {
    pub content: Option<Vec<NewsItem>>,
    #[serde(alias = "total_pages")]
    pub total_pages: Option<i64>,
    #[serde(alias = "total_elements")]
    pub total_elements: Option<i64>,
}

// The news service speaks camelCase, unlike the gateway. Snake case is
// accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: i64,
    pub translation: Option<NewsTranslation>,
    pub status: Option<String>,
    #[serde(alias = "author_id")]
    pub author_id: Option<i64>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(alias = "image_url")]
    pub image_url: Option<String>,
    pub featured: Option<bool>,
    #[serde(alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(alias = "updated_at")]
    pub updated_at: Option<String>,
    #[serde(alias = "published_at")]
    pub published_at: Option<String>,
    #[serde(alias = "available_languages")]
    pub available_languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsTranslation {
    pub id: Option<i64>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "localized_slug")]
    pub localized_slug: Option<String>,
}

impl NewsListResponse {
    pub fn items(&self) -> &[NewsItem] {
        self.data
            .as_ref()
            .and_then(|d| d.content.as_deref())
            .unwrap_or(&[])
    }
}

/// Reply from an AI bot. The bot service's schema is loose, so the text
/// is looked up under the usual field names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AiBotResponse {
    pub success: Option<bool>,
    pub status: Option<i64>,
    pub message: Option<String>,
    pub data: Option<JsonValue>,
}

impl AiBotResponse {
    pub fn reply(&self) -> Option<&str> {
        let data = self.data.as_ref();
        data.and_then(|d| d.as_str())
            .or_else(|| {
                let obj = data?.as_object()?;
                ["answer", "response", "message", "text"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(JsonValue::as_str))
            })
            .or(self.message.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_decodes() {
        let raw = r#"{
            "success": true,
            "message": "ok",
            "user": {"id": 7, "username": "a", "first_name": "Ali", "last_name": "", "keycloak_uuid": "u-1"},
            "tokens": {"access_token": "X", "refresh_token": "Y", "expires_in": 300, "token_type": "Bearer"}
        }"#;
        let resp: LoginResponse = serde_json::from_str(raw).unwrap();
        let tokens = resp.tokens.unwrap();
        assert_eq!(tokens.access_token, "X");
        assert_eq!(tokens.refresh_token, "Y");
        let user = resp.user.unwrap();
        assert_eq!(user.display_name(), "Ali");
        assert_eq!(user.keycloak_uuid.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_coins_balance_fallbacks() {
        let resp: CoinsBalanceResponse =
            serde_json::from_str(r#"{"success":true,"data":{"amount":12}}"#).unwrap();
        assert_eq!(resp.balance(), 12);

        let resp: CoinsBalanceResponse =
            serde_json::from_str(r#"{"data":{"coins":3,"balance":9}}"#).unwrap();
        assert_eq!(resp.balance(), 3);

        let resp: CoinsBalanceResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(resp.balance(), 0);
    }

    #[test]
    fn test_news_list_camel_case() {
        let raw = r#"{"success":true,"data":{"content":[{"id":1,"imageUrl":"https://x/img.png",
            "translation":{"title":"Salom","localizedSlug":"salom"},"availableLanguages":["uz","ru"]}],
            "totalPages":3,"totalElements":41}}"#;
        let resp: NewsListResponse = serde_json::from_str(raw).unwrap();
        let items = resp.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].image_url.as_deref(), Some("https://x/img.png"));
        let translation = items[0].translation.as_ref().unwrap();
        assert_eq!(translation.localized_slug.as_deref(), Some("salom"));
        assert_eq!(resp.data.unwrap().total_pages, Some(3));
    }

    #[test]
    fn test_news_list_snake_case() {
        let raw = r#"{"data":{"content":[{"id":2,"image_url":"https://x/b.png","author_id":9,
            "translation":{"title":"Yangilik","localized_slug":"yangilik"}}],"total_pages":1}}"#;
        let resp: NewsListResponse = serde_json::from_str(raw).unwrap();
        let item = &resp.items()[0];
        assert_eq!(item.image_url.as_deref(), Some("https://x/b.png"));
        assert_eq!(item.author_id, Some(9));
        let translation = item.translation.as_ref().unwrap();
        assert_eq!(translation.localized_slug.as_deref(), Some("yangilik"));
        assert_eq!(resp.data.unwrap().total_pages, Some(1));
    }

    #[test]
    fn test_user_info_envelope() {
        let resp: UserInfoResponse = serde_json::from_str(
            r#"{"success":true,"user":{"id":3,"username":"ali","email":"ali@example.com"}}"#,
        )
        .unwrap();
        let user = resp.user.unwrap();
        assert_eq!(user.id, Some(3));
        assert_eq!(user.email.as_deref(), Some("ali@example.com"));
    }

    #[test]
    fn test_proxy_request_skips_absent_fields() {
        let req = MicroserviceProxyRequest {
            service: "news".into(),
            method: "GET".into(),
            endpoint: "/api/v1/news".into(),
            user_id: None,
            data: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"service": "news", "method": "GET", "endpoint": "/api/v1/news"})
        );
    }

    #[test]
    fn test_ai_bot_reply_lookup() {
        let resp: AiBotResponse =
            serde_json::from_str(r#"{"data":{"answer":"Hello"}}"#).unwrap();
        assert_eq!(resp.reply(), Some("Hello"));

        let resp: AiBotResponse = serde_json::from_str(r#"{"data":"plain"}"#).unwrap();
        assert_eq!(resp.reply(), Some("plain"));

        let resp: AiBotResponse = serde_json::from_str(r#"{"message":"fallback"}"#).unwrap();
        assert_eq!(resp.reply(), Some("fallback"));
    }

    #[test]
    fn test_envelope_with_typed_data() {
        let env: ApiEnvelope<CoinsBalanceData> =
            serde_json::from_str(r#"{"success":true,"status":200,"data":{"coins":5}}"#).unwrap();
        assert_eq!(env.status, Some(200));
        assert_eq!(env.data.unwrap().coins, Some(5));
        assert_eq!(env.message, None);
    }

    #[test]
    fn test_error_response_first() {
        let resp: ErrorResponse = serde_json::from_str(r#"{"errors":["a","b"]}"#).unwrap();
        assert_eq!(resp.first_error(), Some("a"));
        let resp: ErrorResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(resp.first_error(), None);
    }
}
