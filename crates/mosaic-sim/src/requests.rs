use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SimResult, Simulation};

pub(crate) const CONVERSATIONS_KEY: &str = "conversations";
pub(crate) const MESSAGES_KEY: &str = "messages";
pub(crate) const REQUESTS_KEY: &str = "message_requests";
pub(crate) const BLOCKED_KEY: &str = "blocked_users";

/// Lifecycle of an inbound message request. Only `Pending` requests show
/// in the inbox; the other states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Blocked,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub is_read: bool,
}

/// A conversation is scoped to its initiator: the account that started it
/// (or accepted the request) sees it in their list, the other side does
/// not until they initiate their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConversation {
    pub id: String,
    pub initiator_id: String,
    pub other_user_id: String,
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Flat sender/receiver message — no conversation foreign key, pairs are
/// recovered by filtering, exactly like the storage model this mirrors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Simulation {
    // -- Conversations --

    pub fn conversations(&self) -> SimResult<Vec<SimConversation>> {
        self.store.get_or_default(CONVERSATIONS_KEY)
    }

    /// Creates the initiator-scoped conversation unless one already exists
    /// for this (initiator, other) pair.
    pub fn add_conversation(
        &self,
        initiator_id: &str,
        other_user_id: &str,
    ) -> SimResult<SimConversation> {
        let mut conversations = self.conversations()?;
        if let Some(existing) = conversations
            .iter()
            .find(|c| c.initiator_id == initiator_id && c.other_user_id == other_user_id)
        {
            return Ok(existing.clone());
        }

        let conversation = SimConversation {
            id: Uuid::new_v4().to_string(),
            initiator_id: initiator_id.to_string(),
            other_user_id: other_user_id.to_string(),
            participants: vec![initiator_id.to_string(), other_user_id.to_string()],
            created_at: Utc::now(),
        };
        conversations.push(conversation.clone());
        self.store.set(CONVERSATIONS_KEY, &conversations)?;
        Ok(conversation)
    }

    pub fn has_conversation_with(&self, current_id: &str, other_id: &str) -> SimResult<bool> {
        Ok(self
            .conversations()?
            .iter()
            .any(|c| c.initiator_id == current_id && c.other_user_id == other_id))
    }

    // -- Messages --

    pub fn send_sim_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> SimResult<SimMessage> {
        let mut messages: Vec<SimMessage> = self.store.get_or_default(MESSAGES_KEY)?;
        let message = SimMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };
        messages.push(message.clone());
        self.store.set(MESSAGES_KEY, &messages)?;
        Ok(message)
    }

    pub fn last_message_between(&self, a: &str, b: &str) -> SimResult<Option<SimMessage>> {
        let messages: Vec<SimMessage> = self.store.get_or_default(MESSAGES_KEY)?;
        Ok(messages
            .into_iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b)
                    || (m.sender_id == b && m.receiver_id == a)
            })
            .max_by_key(|m| m.created_at))
    }

    pub fn unread_count_from(&self, current_id: &str, other_id: &str) -> SimResult<usize> {
        let messages: Vec<SimMessage> = self.store.get_or_default(MESSAGES_KEY)?;
        Ok(messages
            .iter()
            .filter(|m| m.sender_id == other_id && m.receiver_id == current_id && !m.is_read)
            .count())
    }

    pub fn mark_messages_read(&self, current_id: &str, other_id: &str) -> SimResult<()> {
        let mut messages: Vec<SimMessage> = self.store.get_or_default(MESSAGES_KEY)?;
        for message in messages.iter_mut() {
            if message.sender_id == other_id && message.receiver_id == current_id {
                message.is_read = true;
            }
        }
        self.store.set(MESSAGES_KEY, &messages)
    }

    // -- Message requests --

    pub fn message_requests(&self) -> SimResult<Vec<MessageRequest>> {
        self.store.get_or_default(REQUESTS_KEY)
    }

    pub fn pending_requests_for(&self, user_id: &str) -> SimResult<Vec<MessageRequest>> {
        Ok(self
            .message_requests()?
            .into_iter()
            .filter(|r| r.to_user_id == user_id && r.status == RequestStatus::Pending)
            .collect())
    }

    /// Records an inbound first message as a pending request. A second
    /// message from the same sender does not create a second request.
    pub fn add_message_request(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        message: &str,
    ) -> SimResult<MessageRequest> {
        let mut requests = self.message_requests()?;
        if let Some(existing) = requests
            .iter()
            .find(|r| r.from_user_id == from_user_id && r.to_user_id == to_user_id)
        {
            return Ok(existing.clone());
        }

        let request = MessageRequest {
            id: Uuid::new_v4().to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            status: RequestStatus::Pending,
            is_read: false,
        };
        requests.push(request.clone());
        self.store.set(REQUESTS_KEY, &requests)?;
        Ok(request)
    }

    /// Marks the request as viewed in the inbox without changing its state.
    pub fn mark_request_read(&self, request_id: &str) -> SimResult<()> {
        let mut requests = self.message_requests()?;
        for request in requests.iter_mut() {
            if request.id == request_id {
                request.is_read = true;
            }
        }
        self.store.set(REQUESTS_KEY, &requests)
    }

    /// pending → accepted. The durable effects: a conversation scoped to
    /// the accepting user as initiator, and the request's message copied
    /// into the message list. Returns the conversation, or None when the
    /// request is missing or no longer pending.
    pub fn accept_request(&self, request_id: &str) -> SimResult<Option<SimConversation>> {
        let Some(request) = self.transition(request_id, RequestStatus::Accepted)? else {
            return Ok(None);
        };

        let conversation = self.add_conversation(&request.to_user_id, &request.from_user_id)?;

        let mut messages: Vec<SimMessage> = self.store.get_or_default(MESSAGES_KEY)?;
        messages.push(SimMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: request.from_user_id.clone(),
            receiver_id: request.to_user_id.clone(),
            content: request.message.clone(),
            // Accepting happens from the request view, so the copied
            // message has already been seen.
            is_read: true,
            created_at: request.created_at,
        });
        self.store.set(MESSAGES_KEY, &messages)?;

        Ok(Some(conversation))
    }

    /// pending → blocked. The sender lands on the blocked list.
    pub fn block_request(&self, request_id: &str) -> SimResult<bool> {
        let Some(request) = self.transition(request_id, RequestStatus::Blocked)? else {
            return Ok(false);
        };

        let mut blocked: Vec<String> = self.store.get_or_default(BLOCKED_KEY)?;
        if !blocked.contains(&request.from_user_id) {
            blocked.push(request.from_user_id.clone());
            self.store.set(BLOCKED_KEY, &blocked)?;
        }
        Ok(true)
    }

    /// pending → deleted.
    pub fn delete_request(&self, request_id: &str) -> SimResult<bool> {
        Ok(self.transition(request_id, RequestStatus::Deleted)?.is_some())
    }

    pub fn blocked_users(&self) -> SimResult<Vec<String>> {
        self.store.get_or_default(BLOCKED_KEY)
    }

    /// Applies a pending-only state transition, returning the request as it
    /// was before the change. Terminal states never transition again.
    fn transition(
        &self,
        request_id: &str,
        to: RequestStatus,
    ) -> SimResult<Option<MessageRequest>> {
        let mut requests = self.message_requests()?;
        let Some(request) = requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == RequestStatus::Pending)
        else {
            return Ok(None);
        };

        request.status = to;
        let snapshot = request.clone();
        self.store.set(REQUESTS_KEY, &requests)?;
        Ok(Some(snapshot))
    }
}
