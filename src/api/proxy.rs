//! Downstream services reached through the microservices gateway

use serde::de::DeserializeOwned;

use super::models::{AiBotResponse, CoinsBalanceResponse, MicroserviceProxyRequest, NewsListResponse};
use super::PROXY_PATH;
use crate::client::{ApiClient, ApiError, RequestSpec};
use crate::json::{JsonValue, Parameters};

impl MicroserviceProxyRequest {
    pub fn new(service: &str, method: &str, endpoint: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            method: method.to_string(),
            endpoint: endpoint.into(),
            user_id: None,
            data: None,
        }
    }

    /// Ask the gateway to attach the caller's user id
    pub fn with_user_id(mut self) -> Self {
        self.user_id = Some(true);
        self
    }

    pub fn with_data(mut self, data: Parameters) -> Self {
        self.data = Some(JsonValue::Object(data));
        self
    }
}

impl ApiClient {
    /// Forward a call to a downstream service
    pub async fn microservice_proxy<T: DeserializeOwned>(
        &self,
        req: &MicroserviceProxyRequest,
    ) -> Result<T, ApiError> {
        tracing::debug!(
            service = %req.service,
            endpoint = %req.endpoint,
            "proxying to microservice"
        );
        let spec = RequestSpec::post(PROXY_PATH)
            .payload(req)
            .auth(true)
            .csrf(true);
        self.request(&spec).await
    }

    pub async fn coins_balance(&self) -> Result<CoinsBalanceResponse, ApiError> {
        let req = MicroserviceProxyRequest::new("coins", "GET", "/v1/coins").with_user_id();
        self.microservice_proxy(&req).await
    }

    pub async fn news_list(&self) -> Result<NewsListResponse, ApiError> {
        let req = MicroserviceProxyRequest::new("news", "GET", "/api/v1/news");
        self.microservice_proxy(&req).await
    }

    pub async fn send_to_ai_bot(&self, bot_id: &str, message: &str) -> Result<AiBotResponse, ApiError> {
        let mut data = Parameters::new();
        data.insert("message".to_string(), JsonValue::from(message));

        let req = MicroserviceProxyRequest::new("aibot", "POST", format!("/ai/{bot_id}"))
            .with_user_id()
            .with_data(data);
        self.microservice_proxy(&req).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ApiConfig;
    use crate::notify::NoopNotifier;
    use crate::store::CredentialStore;
    use crate::transport::mock::MockTransport;

    fn client(transport: MockTransport) -> (ApiClient, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let client = ApiClient::new(
            &ApiConfig::default(),
            transport.clone(),
            CredentialStore::in_memory(),
            Arc::new(NoopNotifier),
        )
        .unwrap();
        client.credentials().set_tokens("A1", "R1").unwrap();
        client.credentials().set_csrf_token("c1").unwrap();
        (client, transport)
    }

    #[tokio::test]
    async fn test_coins_balance_goes_through_proxy() {
        let (client, transport) =
            client(MockTransport::new().reply(200, r#"{"success":true,"data":{"balance":40}}"#));

        let resp = client.coins_balance().await.unwrap();
        assert_eq!(resp.balance(), 40);

        let sent = &transport.requests()[0];
        assert_eq!(sent.url.path(), PROXY_PATH);
        assert_eq!(sent.header("Authorization"), Some("Bearer A1"));
        assert_eq!(sent.header("X-CSRFToken"), Some("c1"));

        let params = sent.parameters.as_ref().unwrap();
        assert_eq!(params["service"], JsonValue::from("coins"));
        assert_eq!(params["method"], JsonValue::from("GET"));
        assert_eq!(params["endpoint"], JsonValue::from("/v1/coins"));
        assert_eq!(params["user_id"], JsonValue::Bool(true));
        assert!(!params.contains_key("data"));
    }

    #[tokio::test]
    async fn test_news_list_omits_user_id() {
        let (client, transport) = client(
            MockTransport::new().reply(200, r#"{"data":{"content":[{"id":5}],"totalPages":1}}"#),
        );

        let resp = client.news_list().await.unwrap();
        assert_eq!(resp.items()[0].id, 5);

        let params = transport.requests()[0].parameters.clone().unwrap();
        assert_eq!(params["service"], JsonValue::from("news"));
        assert!(!params.contains_key("user_id"));
    }

    #[tokio::test]
    async fn test_ai_bot_message_in_data() {
        let (client, transport) =
            client(MockTransport::new().reply(200, r#"{"data":{"answer":"Salom!"}}"#));

        let resp = client.send_to_ai_bot("tutor", "Salom").await.unwrap();
        assert_eq!(resp.reply(), Some("Salom!"));

        let params = transport.requests()[0].parameters.clone().unwrap();
        assert_eq!(params["endpoint"], JsonValue::from("/ai/tutor"));
        let data = params["data"].as_object().unwrap();
        assert_eq!(data["message"], JsonValue::from("Salom"));
    }
}
