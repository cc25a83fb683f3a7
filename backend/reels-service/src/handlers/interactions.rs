//! Interaction write endpoints.

use actix_web::{delete, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ViewBody {
    pub duration_seconds: Option<i32>,
}

#[post("/users/{user_id}/reels/{reel_id}/like")]
pub async fn like_reel(
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user_id, reel_id) = path.into_inner();
    let likes_count = state.interactions.record_like(user_id, reel_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "reel_id": reel_id, "likes_count": likes_count, "is_liked": true },
    })))
}

#[delete("/users/{user_id}/reels/{reel_id}/like")]
pub async fn unlike_reel(
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user_id, reel_id) = path.into_inner();
    let likes_count = state.interactions.record_unlike(user_id, reel_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "reel_id": reel_id, "likes_count": likes_count, "is_liked": false },
    })))
}

#[post("/users/{user_id}/reels/{reel_id}/view")]
pub async fn view_reel(
    path: web::Path<(Uuid, Uuid)>,
    body: Option<web::Json<ViewBody>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user_id, reel_id) = path.into_inner();
    let duration = body.and_then(|b| b.duration_seconds);

    let outcome = state
        .interactions
        .record_view(user_id, reel_id, duration)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": {
            "reel_id": reel_id,
            "views_count": outcome.views_count,
            "counted": outcome.fresh_view,
        },
    })))
}

#[post("/users/{user_id}/reels/{reel_id}/share")]
pub async fn share_reel(
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user_id, reel_id) = path.into_inner();
    let shares_count = state.interactions.record_share(user_id, reel_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "reel_id": reel_id, "shares_count": shares_count },
    })))
}

#[post("/users/{user_id}/follows/{merchant_id}")]
pub async fn follow_merchant(
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user_id, merchant_id) = path.into_inner();
    state.interactions.follow(user_id, merchant_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "merchant_id": merchant_id, "is_following": true },
    })))
}

#[delete("/users/{user_id}/follows/{merchant_id}")]
pub async fn unfollow_merchant(
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user_id, merchant_id) = path.into_inner();
    state.interactions.unfollow(user_id, merchant_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "merchant_id": merchant_id, "is_following": false },
    })))
}
