use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use mosaic_db::{Database, DbError, models::ConversationRow};
use mosaic_types::api::{
    Claims, ConversationResponse, CreateConversationRequest, MessagesPage, SendMessageRequest,
};
use mosaic_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, join_err};
use crate::util::{Pagination, message_response, now_ts, parse_ts, parse_uuid, participant_summary};

pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let uid = claims.sub.to_string();
    let conversations = tokio::task::spawn_blocking(move || {
        let rows = db.get_user_conversations(&uid)?;
        rows.into_iter()
            .map(|row| build_conversation(&db, row, &uid))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(join_err)??;

    Ok(Json(json!({ "conversations": conversations })))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.participant_ids.is_empty() {
        return Err(ApiError::Validation("participants are required".into()));
    }

    let db = state.db.clone();
    let uid = claims.sub.to_string();
    let (_, now) = now_ts();

    let (conversation, reused) = tokio::task::spawn_blocking(move || {
        // For a 1:1 request, reuse an existing conversation between the
        // same two participants if one exists.
        if !req.is_group && req.participant_ids.len() == 1 {
            let other = req.participant_ids[0].to_string();
            if let Some(existing) = db.find_direct_conversation(&uid, &other)? {
                let row = db.get_conversation(&existing)?.ok_or(DbError::NotFound)?;
                return Ok((build_conversation(&db, row, &uid)?, true));
            }
        }

        let conversation_id = Uuid::new_v4().to_string();
        db.insert_conversation(
            &conversation_id,
            req.is_group,
            req.group_name.as_deref().filter(|_| req.is_group),
            &now,
        )?;
        db.insert_participant(&Uuid::new_v4().to_string(), &conversation_id, &uid, &now)?;
        for participant in &req.participant_ids {
            db.insert_participant(
                &Uuid::new_v4().to_string(),
                &conversation_id,
                &participant.to_string(),
                &now,
            )?;
        }

        let row = db.get_conversation(&conversation_id)?.ok_or(DbError::NotFound)?;
        Ok::<_, DbError>((build_conversation(&db, row, &uid)?, false))
    })
    .await
    .map_err(join_err)??;

    let status = if reused { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(json!({ "conversation": conversation }))))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = pagination.clamp();

    let db = state.db.clone();
    let cid = conversation_id.to_string();
    let uid = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || {
        if !db.is_participant(&cid, &uid)? {
            return Err(DbError::NotFound); // remapped to 403 below
        }
        let rows = db.get_messages(&cid, limit, offset)?;
        // Viewing the thread marks the others' messages as read.
        db.mark_read(&cid, &uid)?;
        Ok(rows)
    })
    .await
    .map_err(join_err)?
    .map_err(|e| match e {
        DbError::NotFound => ApiError::Forbidden("not a participant of this conversation"),
        other => other.into(),
    })?;

    // Fetched newest-first for pagination; returned oldest-first for display.
    let messages: Vec<_> = rows.into_iter().rev().map(message_response).collect();

    Ok(Json(MessagesPage {
        messages,
        page,
        limit,
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("message content is required".into()));
    }

    let message_id = Uuid::new_v4();
    let (_, created_at) = now_ts();

    let db = state.db.clone();
    let cid = conversation_id.to_string();
    let mid = message_id.to_string();
    let uid = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || {
        if !db.is_participant(&cid, &uid)? {
            return Err(DbError::NotFound); // remapped to 403 below
        }
        db.insert_message(&mid, &cid, &uid, &content, &created_at)?;
        // Independent write; no transaction spans the two.
        db.touch_conversation(&cid, &created_at)?;
        db.get_message(&mid)?.ok_or(DbError::NotFound)
    })
    .await
    .map_err(join_err)?
    .map_err(|e| match e {
        DbError::NotFound => ApiError::Forbidden("not a participant of this conversation"),
        other => other.into(),
    })?;

    let message = message_response(row);

    // Push to every participant present in the conversation's room.
    state
        .dispatcher
        .dispatch(GatewayEvent::NewMessage {
            message: message.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

pub async fn mark_as_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let cid = conversation_id.to_string();
    let uid = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        if !db.is_participant(&cid, &uid)? {
            return Err(DbError::NotFound); // remapped to 403 below
        }
        db.mark_read(&cid, &uid)
    })
    .await
    .map_err(join_err)?
    .map_err(|e| match e {
        DbError::NotFound => ApiError::Forbidden("not a participant of this conversation"),
        other => other.into(),
    })?;

    state
        .dispatcher
        .dispatch(GatewayEvent::MessagesRead {
            conversation_id,
            read_by: claims.sub,
        })
        .await;

    Ok(Json(json!({ "message": "messages marked as read" })))
}

/// Assembles the conversation listing entry: other participants, most
/// recent message, unread count. Runs on the blocking pool.
fn build_conversation(
    db: &Database,
    row: ConversationRow,
    viewer_id: &str,
) -> Result<ConversationResponse, DbError> {
    let participants = db
        .get_participants(&row.id)?
        .into_iter()
        .filter(|p| p.user_id != viewer_id)
        .map(participant_summary)
        .collect();

    let last_message = db.get_last_message(&row.id)?.map(message_response);
    let unread_count = db.unread_count(&row.id, viewer_id)?;

    Ok(ConversationResponse {
        id: parse_uuid(&row.id, "conversation"),
        is_group: row.is_group,
        group_name: row.group_name,
        participants,
        last_message,
        unread_count,
        updated_at: parse_ts(&row.updated_at, "conversation"),
    })
}
