// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Action dispatch
//
// Validates an inbound `{action, conversationId, message}` request and routes
// it to the matching gateway operation. Nothing touches the network until
// the action name and its required fields have been checked.

use serde::{Deserialize, Serialize};

use super::ConversationGateway;
use crate::error::GatewayError;
use crate::message::{CallerId, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Send,
    History,
}

impl Action {
    pub fn parse(name: Option<&str>) -> Result<Self, GatewayError> {
        match name {
            Some("create") => Ok(Action::Create),
            Some("send") => Ok(Action::Send),
            Some("history") => Ok(Action::History),
            other => Err(GatewayError::invalid_action(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Send => "send",
            Action::History => "history",
        }
    }
}

/// Inbound action body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionRequest {
    pub fn create() -> Self {
        Self {
            action: Some("create".to_string()),
            ..Self::default()
        }
    }

    pub fn send(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: Some("send".to_string()),
            conversation_id: Some(conversation_id.into()),
            message: Some(message.into()),
        }
    }

    pub fn history(conversation_id: impl Into<String>) -> Self {
        Self {
            action: Some("history".to_string()),
            conversation_id: Some(conversation_id.into()),
            message: None,
        }
    }
}

/// Outbound action body; the shape depends on the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    #[serde(rename_all = "camelCase")]
    Created { conversation_id: String },
    Reply { content: String, role: Role },
    History { messages: Vec<Message> },
}

impl ConversationGateway {
    /// Validate and run one action on behalf of `caller`.
    pub async fn dispatch(
        &self,
        caller: &CallerId,
        request: ActionRequest,
    ) -> Result<ActionResponse, GatewayError> {
        let action = Action::parse(request.action.as_deref())?;
        tracing::debug!(action = action.as_str(), "dispatching action");

        match action {
            Action::Create => {
                let conversation_id = self.create(caller).await?;
                Ok(ActionResponse::Created { conversation_id })
            }
            Action::Send => {
                let conversation_id = require(request.conversation_id, "conversationId")?;
                let message = require(request.message, "message")?;
                let reply = self.send(caller, &conversation_id, &message).await?;
                Ok(ActionResponse::Reply {
                    content: reply.content,
                    role: reply.role,
                })
            }
            Action::History => {
                let conversation_id = require(request.conversation_id, "conversationId")?;
                let messages = self.history(caller, &conversation_id).await?;
                Ok(ActionResponse::History { messages })
            }
        }
    }
}

fn require(value: Option<String>, field: &str) -> Result<String, GatewayError> {
    value.ok_or_else(|| GatewayError::invalid_input(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_known_actions() {
        assert_eq!(Action::parse(Some("create")).unwrap(), Action::Create);
        assert_eq!(Action::parse(Some("send")).unwrap(), Action::Send);
        assert_eq!(Action::parse(Some("history")).unwrap(), Action::History);
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!(Action::parse(Some("Create")).is_err());
        assert!(Action::parse(Some("")).is_err());
        assert!(Action::parse(None).is_err());
    }

    #[test]
    fn request_uses_camel_case() {
        let req: ActionRequest = serde_json::from_value(json!({
            "action": "send",
            "conversationId": "c1",
            "message": "hi"
        }))
        .unwrap();
        assert_eq!(req, ActionRequest::send("c1", "hi"));
    }

    #[test]
    fn response_shapes() {
        let created = ActionResponse::Created {
            conversation_id: "c1".into(),
        };
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"conversationId": "c1"})
        );

        let reply = ActionResponse::Reply {
            content: "The answer is 0.5.".into(),
            role: Role::Assistant,
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"content": "The answer is 0.5.", "role": "assistant"})
        );

        let history = ActionResponse::History {
            messages: vec![Message::new(Role::User, "hi")],
        };
        assert_eq!(
            serde_json::to_value(&history).unwrap(),
            json!({"messages": [{"role": "user", "content": "hi"}]})
        );
    }
}
