use std::collections::BTreeMap;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::schemas::{
    EntityAddQuery, EntityAddResponse, EntityMappingEntry, EntitySearchQuery,
    EntitySearchResponse, HealthResponse, ServiceStatus, TranslationRequest, TranslationResponse,
};
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const MAX_SEARCH_LIMIT: i64 = 100;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/translate", post(translate_announcement))
        .route("/entities/search", get(search_entities))
        .route("/entities/add", post(add_entity))
}

/// Full application: routes, request tracing and open CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Japanese Train Announcement Translation API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "translate": "/translate",
            "health": "/health",
            "search_entities": "/entities/search",
            "add_entity": "/entities/add"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (ner_service, translation_service) =
        tokio::join!(state.ner.is_ready(), state.translation.is_ready());
    let database_service = state.database.is_connected();

    let services = ServiceStatus {
        ner_service,
        translation_service,
        database_service,
    };
    let status = if services.all_ready() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        database_entities_count: if database_service {
            state.database.cached_entity_count()
        } else {
            0
        },
        services,
    })
}

async fn translate_announcement(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TranslationRequest>,
) -> ApiResult<Json<TranslationResponse>> {
    let japanese_text = request.text.trim();
    if japanese_text.is_empty() {
        return Err(ApiError::BadRequest("Input text cannot be empty".to_string()));
    }

    let request_id = Uuid::new_v4();
    let span = info_span!("translate", %request_id);

    async move {
        let preview: String = japanese_text.chars().take(50).collect();
        info!("Processing translation request: {}...", preview);

        let masked = state
            .ner
            .replace_entities_and_map(japanese_text)
            .await
            .map_err(|e| ApiError::internal("Translation processing failed", e))?;
        info!("NER found {} entities", masked.entities.len());

        let outcome = state
            .translation
            .process_translation(&masked)
            .await
            .map_err(|e| ApiError::internal("Translation processing failed", e))?;
        info!("Translation completed successfully");

        let entity_mapping: BTreeMap<String, EntityMappingEntry> = outcome
            .entities
            .into_iter()
            .map(|entity| (entity.placeholder.clone(), EntityMappingEntry::from(entity)))
            .collect();

        Ok::<_, ApiError>(Json(TranslationResponse {
            original_text: japanese_text.to_string(),
            text_with_placeholders: masked.text,
            entities_count: entity_mapping.len(),
            entity_mapping,
            english_translation: outcome.english_translation,
        }))
    }
    .instrument(span)
    .await
}

/// Requested limit, defaulting to 10 and kept within `0..=100`
fn clamp_limit(limit: Option<i64>) -> u32 {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(0, MAX_SEARCH_LIMIT) as u32
}

async fn search_entities(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EntitySearchQuery>,
) -> ApiResult<Json<EntitySearchResponse>> {
    if !state.database.is_connected() {
        return Err(ApiError::ServiceUnavailable(
            "Database service not available".to_string(),
        ));
    }

    let results = state
        .database
        .search_entities(&query.q, clamp_limit(query.limit))
        .await
        .map_err(|e| ApiError::internal("Entity search failed", e))?;

    Ok(Json(EntitySearchResponse {
        query: query.q,
        count: results.len(),
        results,
    }))
}

async fn add_entity(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EntityAddQuery>,
) -> ApiResult<Json<EntityAddResponse>> {
    let japanese = query.japanese.trim();
    let english = query.english.trim();
    if japanese.is_empty() || english.is_empty() {
        return Err(ApiError::BadRequest(
            "Both Japanese and English text must be provided".to_string(),
        ));
    }

    if !state.database.is_connected() {
        return Err(ApiError::ServiceUnavailable(
            "Database service not available".to_string(),
        ));
    }

    state
        .database
        .add_entity(japanese, english)
        .await
        .map_err(|e| ApiError::internal("Failed to add entity", e))?;

    Ok(Json(EntityAddResponse {
        message: "Entity added successfully".to_string(),
        japanese: japanese.to_string(),
        english: english.to_string(),
    }))
}
