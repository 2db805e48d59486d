use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyDirection {
    In,
    Out,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    pub uid: String,
    pub direction: ReplyDirection,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostedMessage {
    pub uid: String,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    uid: &'a str,
    text: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl ApiClient {
    /// Posts a user prompt; the returned uid correlates the answer.
    pub async fn send_message(&self, project_id: &str, uid: &str, text: &str) -> Result<PostedMessage> {
        let api_url = self.url(&["projects", project_id, "messages"]);
        let body = OutgoingMessage {
            uid,
            text,
            kind: "text",
        };
        self.send_json(self.client.post(&api_url).json(&body), &api_url)
            .await
    }

    pub async fn replies(&self, project_id: &str, uid: &str) -> Result<Vec<Reply>> {
        let api_url = self.url(&["projects", project_id, "messages", uid, "out"]);
        self.send_json(self.client.get(&api_url), &api_url).await
    }
}
