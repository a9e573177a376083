use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use herald_core::delivery::DeliveryClient;
use herald_types::api::OperatorAction;
use herald_types::delivery::DeliveryFailure;
use herald_types::models::{ContentRef, MessageHandle, UserId};

/// A hung connection surfaces as a transport failure after this long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery over a Telegram-Bot-API compatible HTTP endpoint.
pub struct TelegramClient {
    http: reqwest::Client,
    /// `{api_base}/bot{token}`
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, DeliveryFailure> {
        let response = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .json(body)
            .send()
            .await
            .map_err(|e| DeliveryFailure::transport(e.to_string()))?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, DeliveryFailure> {
        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| DeliveryFailure::transport(format!("{}: {}", status, e)))?;

        if parsed.ok {
            if let Some(result) = parsed.result {
                return Ok(result);
            }
        }
        Err(classify(
            status,
            parsed.description.as_deref().unwrap_or_default(),
            parsed.parameters.and_then(|p| p.retry_after),
        ))
    }
}

#[async_trait]
impl DeliveryClient for TelegramClient {
    async fn copy_content(&self, to: UserId, content: ContentRef) -> Result<(), DeliveryFailure> {
        let _: Value = self
            .call(
                "copyMessage",
                &json!({
                    "chat_id": to,
                    "from_chat_id": content.chat_id,
                    "message_id": content.message_id,
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_text(&self, to: UserId, text: &str) -> Result<MessageHandle, DeliveryFailure> {
        let sent: SentMessage = self
            .call("sendMessage", &json!({ "chat_id": to, "text": text }))
            .await?;
        Ok(MessageHandle {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    async fn edit_text(
        &self,
        handle: MessageHandle,
        text: &str,
        actions: &[OperatorAction],
    ) -> Result<(), DeliveryFailure> {
        let mut body = json!({
            "chat_id": handle.chat_id,
            "message_id": handle.message_id,
            "text": text,
        });
        if !actions.is_empty() {
            body["reply_markup"] = inline_keyboard(actions);
        }
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<(), DeliveryFailure> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": handle.chat_id, "message_id": handle.message_id }),
            )
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        to: UserId,
        path: &Path,
        caption: &str,
    ) -> Result<(), DeliveryFailure> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeliveryFailure::transport(format!("read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "users_list.txt".into());

        let form = Form::new()
            .text("chat_id", to.to_string())
            .text("caption", caption.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(format!("{}/sendDocument", self.endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryFailure::transport(e.to_string()))?;
        let _: Value = self.decode(response).await?;
        Ok(())
    }
}

/// One button per row, callback data is the action id.
fn inline_keyboard(actions: &[OperatorAction]) -> Value {
    let rows: Vec<Value> = actions
        .iter()
        .map(|action| {
            json!([{
                "text": action.label(),
                "callback_data": serde_json::to_value(action).unwrap_or(Value::Null),
            }])
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Map an API error onto the delivery failure taxonomy.
fn classify(status: StatusCode, description: &str, retry_after: Option<u64>) -> DeliveryFailure {
    let lower = description.to_ascii_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS || retry_after.is_some() {
        return DeliveryFailure::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        };
    }
    if lower.contains("deactivated") {
        return DeliveryFailure::Deactivated;
    }
    if status == StatusCode::FORBIDDEN {
        // blocked by the user, kicked, or never started the bot
        return DeliveryFailure::Blocked;
    }
    if lower.contains("chat not found") {
        return DeliveryFailure::Deactivated;
    }
    DeliveryFailure::transport(format!("{}: {}", status, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_user_is_blocked() {
        let failure = classify(StatusCode::FORBIDDEN, "Forbidden: bot was blocked by the user", None);
        assert_eq!(failure, DeliveryFailure::Blocked);
    }

    #[test]
    fn deactivated_user_is_deactivated() {
        let failure = classify(StatusCode::FORBIDDEN, "Forbidden: user is deactivated", None);
        assert_eq!(failure, DeliveryFailure::Deactivated);
        let failure = classify(StatusCode::BAD_REQUEST, "Bad Request: chat not found", None);
        assert_eq!(failure, DeliveryFailure::Deactivated);
    }

    #[test]
    fn throttling_carries_retry_after() {
        let failure = classify(
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests: retry after 7",
            Some(7),
        );
        assert_eq!(failure, DeliveryFailure::RateLimited { retry_after_secs: 7 });
    }

    #[test]
    fn anything_else_is_transport() {
        let failure = classify(StatusCode::BAD_GATEWAY, "Bad Gateway", None);
        assert!(matches!(failure, DeliveryFailure::Transport { .. }));
    }

    #[test]
    fn keyboard_uses_action_ids() {
        let keyboard = inline_keyboard(&[OperatorAction::ConfirmSend, OperatorAction::CancelSend]);
        assert_eq!(keyboard["inline_keyboard"][0][0]["callback_data"], "confirm_send");
        assert_eq!(keyboard["inline_keyboard"][1][0]["text"], "Cancel");
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(client.endpoint, "https://api.telegram.org/bot123:abc");
    }
}
