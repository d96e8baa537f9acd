use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::MessageResponse;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A message was posted to a conversation the client has joined
    NewMessage { message: MessageResponse },

    /// A participant marked the conversation's messages as read
    MessagesRead {
        conversation_id: Uuid,
        read_by: Uuid,
    },

    /// A participant started typing
    UserTyping {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    /// A participant stopped typing
    UserStopTyping {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    /// A user disconnected — broadcast to every connected client
    UserOffline {
        user_id: Uuid,
        last_seen: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Returns the conversation id if this event is scoped to a conversation
    /// room. Events that return `None` are global and go to all clients.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::NewMessage { message } => Some(message.conversation_id),
            Self::MessagesRead {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::UserTyping {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::UserStopTyping {
                conversation_id, ..
            } => Some(*conversation_id),
            // Ready and UserOffline are global
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Enter a conversation's broadcast room
    JoinConversation { conversation_id: Uuid },

    /// Leave a conversation's broadcast room
    LeaveConversation { conversation_id: Uuid },

    /// Indicate typing in a conversation
    Typing { conversation_id: Uuid },

    /// Stop the typing indicator
    StopTyping { conversation_id: Uuid },
}
