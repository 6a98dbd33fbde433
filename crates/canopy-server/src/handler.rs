use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use canopy_forest::PostView;
use canopy_types::{CommentId, NewComment, NewPost, Post, PostId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Body of `POST /v1/posts/:id/comments`.
#[derive(Clone, Debug, Deserialize)]
pub struct AddCommentRequest {
    pub text: String,
    #[serde(default)]
    pub author: Option<UserId>,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
}

impl From<AddCommentRequest> for NewComment {
    fn from(req: AddCommentRequest) -> Self {
        NewComment {
            text: req.text,
            author: req.author,
            parent: req.parent_comment_id,
        }
    }
}

fn parse_post_id(raw: &str) -> ServerResult<PostId> {
    PostId::from_str(raw).map_err(|e| ServerError::BadRequest(e.to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ServerResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewPost>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<Post>)> {
    let post = state.facade().create_post(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<PostView>> {
    let id = parse_post_id(&id)?;
    let view = state.facade().get_post_with_discussion(&id).await?;
    Ok(Json(view))
}

pub async fn add_comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> ServerResult<Json<PostView>> {
    let id = parse_post_id(&id)?;
    let input = NewComment::from(body(payload)?);
    let view = state.facade().add_comment(&id, input).await?;
    Ok(Json(view))
}
