//! Parameter and result shapes of the app-server methods.
//!
//! The bridge itself treats params and results as opaque JSON; these types
//! are a convenience for callers of the typed request helpers on
//! [`AppServerBridge`](crate::AppServerBridge).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client identification sent with `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: "codex-electron-poc".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
        }
    }
}

/// When the agent must ask before running commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AskForApproval {
    UnlessTrusted,
    OnFailure,
    OnRequest,
    Never,
}

/// Sandbox applied to commands the agent runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SandboxPolicy {
    ReadOnly,
    DangerFullAccess,
    WorkspaceWrite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        writable_roots: Option<Vec<PathBuf>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        network_access: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exclude_tmpdir_env_var: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exclude_slash_tmp: Option<bool>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<AskForApproval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_policy: Option<SandboxPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalImageInput {
    pub path: PathBuf,
}

/// One piece of user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum InputItem {
    Text(TextInput),
    Image(ImageInput),
    LocalImage(LocalImageInput),
}

impl InputItem {
    pub fn text(text: impl Into<String>) -> Self {
        InputItem::Text(TextInput { text: text.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendUserMessageParams {
    pub conversation_id: String,
    pub items: Vec<InputItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConversationListenerParams {
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConversationListenerResult {
    pub subscription_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveConversationListenerParams {
    pub subscription_id: String,
}

/// Event payload streamed for a conversation the client listens to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEvent {
    pub conversation_id: String,
    pub summary: String,
    pub method: String,
    pub payload: Value,
}

/// Answer to an approval request initiated by the app server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    ApprovedForSession,
    Denied,
    Abort,
}

/// Params of the peer-initiated `execCommandApproval` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommandApprovalParams {
    pub conversation_id: String,
    pub call_id: String,
    pub command: Vec<String>,
    pub cwd: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecCommandApprovalResult {
    pub decision: ReviewDecision,
}

/// Params of the peer-initiated `applyPatchApproval` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPatchApprovalParams {
    pub conversation_id: String,
    pub call_id: String,
    pub file_changes: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyPatchApprovalResult {
    pub decision: ReviewDecision,
}

/// Client-side method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const NEW_CONVERSATION: &str = "newConversation";
    pub const SEND_USER_MESSAGE: &str = "sendUserMessage";
    pub const SEND_USER_TURN: &str = "sendUserTurn";
    pub const ADD_CONVERSATION_LISTENER: &str = "addConversationListener";
    pub const REMOVE_CONVERSATION_LISTENER: &str = "removeConversationListener";
    pub const EXEC_COMMAND_APPROVAL: &str = "execCommandApproval";
    pub const APPLY_PATCH_APPROVAL: &str = "applyPatchApproval";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_initialize_params_identify_the_client() {
        let value = serde_json::to_value(InitializeParams::default()).unwrap();
        assert_eq!(value["clientInfo"]["name"], "codex-electron-poc");
        assert!(value["clientInfo"].get("title").is_none());
    }

    #[test]
    fn new_conversation_uses_camel_case_and_skips_unset_fields() {
        let params = NewConversationParams {
            approval_policy: Some(AskForApproval::OnRequest),
            sandbox_policy: Some(SandboxPolicy::WorkspaceWrite {
                writable_roots: Some(vec![PathBuf::from("/tmp/work")]),
                network_access: Some(false),
                exclude_tmpdir_env_var: None,
                exclude_slash_tmp: None,
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(params).unwrap();
        assert_eq!(
            value,
            json!({
                "approvalPolicy": "on-request",
                "sandboxPolicy": {
                    "mode": "workspace-write",
                    "writable_roots": ["/tmp/work"],
                    "network_access": false
                }
            })
        );
    }

    #[test]
    fn input_items_are_tagged_by_type_with_data() {
        let items = vec![
            InputItem::text("hello"),
            InputItem::Image(ImageInput {
                image_url: "https://example.com/a.png".to_string(),
            }),
            InputItem::LocalImage(LocalImageInput {
                path: PathBuf::from("/tmp/a.png"),
            }),
        ];
        let value = serde_json::to_value(items).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "text", "data": {"text": "hello"}},
                {"type": "image", "data": {"imageUrl": "https://example.com/a.png"}},
                {"type": "localImage", "data": {"path": "/tmp/a.png"}}
            ])
        );
    }

    #[test]
    fn exec_command_approval_params_parse_from_peer_request() {
        let params: ExecCommandApprovalParams = serde_json::from_value(json!({
            "conversationId": "conv",
            "callId": "call-1",
            "command": ["ls", "-la"],
            "cwd": "/repo"
        }))
        .unwrap();
        assert_eq!(params.command, vec!["ls", "-la"]);
        assert!(params.reason.is_none());
    }

    #[test]
    fn review_decision_uses_snake_case() {
        let result = ExecCommandApprovalResult {
            decision: ReviewDecision::ApprovedForSession,
        };
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"decision": "approved_for_session"})
        );
    }
}
