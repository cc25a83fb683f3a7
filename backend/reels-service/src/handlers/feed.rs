//! Feed read endpoints.
//!
//! Thin layer: parse paging/projection parameters, call the engine,
//! shape the JSON envelope. The gateway upstream resolves and injects
//! the user id; there is no auth here.

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::TimeWindow;
use crate::services::feed::FeedPage;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Comma-separated projection of response fields
    pub fields: Option<String>,
    /// Trending window: 24h, 7d or 30d
    pub time_window: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl FeedQueryParams {
    fn clamped_page_size(&self) -> u32 {
        self.page_size.clamp(1, 100)
    }

    fn field_list(&self) -> Option<Vec<String>> {
        self.fields.as_ref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

fn feed_response(page: FeedPage, params: &FeedQueryParams) -> HttpResponse {
    let fields = params.field_list();
    let page_size = params.clamped_page_size();

    let data: Vec<serde_json::Value> = page
        .reels
        .iter()
        .map(|reel| reel.project(fields.as_deref()))
        .collect();

    // Totals are an estimate; deep pages shrink when content runs out
    let total = if params.page == 1 {
        data.len() as u64
    } else {
        (params.page as u64) * (page_size as u64)
    };

    HttpResponse::Ok().json(json!({
        "status": "success",
        "data": data,
        "pagination": {
            "page": params.page,
            "page_size": page_size,
            "total": total,
        },
        "feed_info": page.feed_info,
    }))
}

#[get("/users/{user_id}/feed")]
pub async fn get_personalized_feed(
    path: web::Path<Uuid>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let page = state
        .feed
        .get_personalized_feed(user_id, query.page, query.clamped_page_size())
        .await?;

    Ok(feed_response(page, &query))
}

#[get("/feed/trending")]
pub async fn get_trending_feed(
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let window = match query.time_window.as_deref() {
        None => TimeWindow::TwentyFourHours,
        Some(raw) => TimeWindow::parse(raw).ok_or_else(|| {
            AppError::BadRequest("time_window must be one of 24h, 7d, 30d".to_string())
        })?,
    };

    let page = state
        .feed
        .get_trending_feed(query.page, query.clamped_page_size(), window)
        .await?;

    Ok(feed_response(page, &query))
}

#[get("/users/{user_id}/feed/following")]
pub async fn get_followed_feed(
    path: web::Path<Uuid>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let page = state
        .feed
        .get_followed_feed(user_id, query.page, query.clamped_page_size())
        .await?;

    Ok(feed_response(page, &query))
}
