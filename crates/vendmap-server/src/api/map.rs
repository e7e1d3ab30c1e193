use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use vendmap_core::Building;

use super::AppState;

#[derive(Debug, Serialize)]
pub(in crate::api) struct MapKeyResponse {
    pub key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(in crate::api) struct BuildingQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct BuildingSearchResponse {
    pub suggestions: Vec<Building>,
    /// Exact (case-insensitive) match for the query, if any.
    #[serde(rename = "match")]
    pub exact: Option<Building>,
}

/// GET /api/map-key
pub(in crate::api) async fn map_key(State(state): State<AppState>) -> Json<MapKeyResponse> {
    Json(MapKeyResponse {
        key: state.map_api_key.clone(),
    })
}

/// GET /api/buildings?q=: prefix suggestions. An empty query lists everything.
pub(in crate::api) async fn search_buildings(
    State(state): State<AppState>,
    Query(query): Query<BuildingQuery>,
) -> Json<BuildingSearchResponse> {
    let q = query.q.unwrap_or_default();
    let suggestions = state.buildings.suggest(&q).into_iter().cloned().collect();
    let exact = if q.trim().is_empty() {
        None
    } else {
        state.buildings.find(&q).cloned()
    };

    Json(BuildingSearchResponse { suggestions, exact })
}
