//! HTTP handler functions for the notion map API.

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use notion_map_extractor::{ExtractError, StaticPage};
use notion_map_location_models::{DatabaseProperty, DatabaseSchema};
use notion_map_notion::{NotionError, load_locations, save_location};
use notion_map_presentation::glyph::cluster_diameter;
use notion_map_presentation::{ClusterIndex, MapView, ViewState, cluster_glyph, filter_locations};
use notion_map_schema::affordances::{
    filterable_properties, groupable_properties, sortable_properties,
};
use notion_map_schema::{SchemaError, ValidationSchema, build_schema};
use notion_map_server_models::{
    ApiCluster, ApiCreated, ApiError, ApiExtraction, ApiHealth, ApiIssue, ApiSchema,
    ClusterQueryParams, ExtractRequest,
};
use serde_json::Value;

use crate::{AppState, EXTENSION_ASSET_SUFFIX};

/// Maps a store failure to a response. Upstream 404s stay 404s; anything
/// else is reported as a bad gateway.
fn store_failure(e: &NotionError, what: &str) -> HttpResponse {
    log::error!("{what}: {e}");
    match e {
        NotionError::Status { status: 404, .. } => {
            HttpResponse::NotFound().json(ApiError::message("Database not found"))
        }
        _ => HttpResponse::BadGateway().json(ApiError::message(what)),
    }
}

fn owned(properties: Vec<&DatabaseProperty>) -> Vec<DatabaseProperty> {
    properties.into_iter().cloned().collect()
}

fn schema_failure(e: &SchemaError) -> HttpResponse {
    log::error!("Unusable database schema: {e}");
    HttpResponse::UnprocessableEntity().json(ApiError::message(e.to_string()))
}

async fn form_schema(
    state: &AppState,
    database_id: &str,
) -> Result<(DatabaseSchema, ValidationSchema), HttpResponse> {
    let schema = state
        .store
        .retrieve_database(database_id)
        .await
        .map_err(|e| store_failure(&e, "Failed to load database"))?;
    let form = build_schema(&schema.properties).map_err(|e| schema_failure(&e))?;
    Ok((schema, form))
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/databases`
///
/// Lists the databases shared with the integration.
pub async fn databases(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_databases().await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => store_failure(&e, "Failed to list databases"),
    }
}

/// `GET /api/databases/{id}/schema`
///
/// Returns the save form and the filter/group/sort affordances.
pub async fn schema(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let (schema, form) = match form_schema(&state, &path).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    HttpResponse::Ok().json(ApiSchema {
        id: schema.id.clone(),
        title: schema.title.clone(),
        fields: form.fields().to_vec(),
        defaults: form.defaults(),
        filterable: owned(filterable_properties(&schema)),
        groupable: owned(groupable_properties(&schema)),
        sortable: owned(sortable_properties(&schema)),
    })
}

/// `GET /api/databases/{id}/locations?filter=…&group=…&direction=…`
///
/// Returns the rendered view for the query's view state.
pub async fn locations(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    let view = ViewState::from_query(req.query_string());

    match load_locations(state.store.as_ref(), &path).await {
        Ok((schema, locations)) => {
            HttpResponse::Ok().json(MapView::new(schema).render(&locations, &view))
        }
        Err(e) => store_failure(&e, "Failed to load locations"),
    }
}

/// `GET /api/databases/{id}/clusters?zoom=…`
///
/// Clusters the filtered locations for one zoom level.
pub async fn clusters(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<ClusterQueryParams>,
    req: HttpRequest,
) -> HttpResponse {
    if !params.zoom.is_finite() {
        return HttpResponse::BadRequest().json(ApiError::message("zoom must be a finite number"));
    }
    let view = ViewState::from_query(req.query_string());

    let locations = match load_locations(state.store.as_ref(), &path).await {
        Ok((_, locations)) => locations,
        Err(e) => return store_failure(&e, "Failed to load locations"),
    };

    let visible = filter_locations(&locations, &view.filters);
    let clusters: Vec<ApiCluster> = ClusterIndex::new(&visible)
        .clusters(params.zoom)
        .into_iter()
        .map(|cluster| {
            let glyph = (!cluster.is_single())
                .then(|| cluster_glyph(&cluster.icons, cluster_diameter(cluster.len())));
            ApiCluster { cluster, glyph }
        })
        .collect();

    HttpResponse::Ok().json(clusters)
}

/// `POST /api/databases/{id}/locations`
///
/// Validates the submission against the live schema, then creates the
/// page. Nothing is written when validation fails.
pub async fn create_location(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    let database_id = path.into_inner();
    let (schema, form) = match form_schema(&state, &database_id).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let submission = match form.validate(&body) {
        Ok(submission) => submission,
        Err(e) => {
            log::warn!("Rejected submission for {database_id}: {e}");
            return HttpResponse::BadRequest().json(ApiError {
                error: "Invalid submission".to_string(),
                issues: e.issues().iter().map(ApiIssue::from).collect(),
                ..ApiError::default()
            });
        }
    };

    match save_location(state.store.as_ref(), &database_id, &schema, &submission).await {
        Ok(page) => {
            log::info!("Saved '{}' to {database_id}", submission.title);
            HttpResponse::Created().json(ApiCreated {
                id: page
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                url: page.get("url").and_then(Value::as_str).map(str::to_owned),
            })
        }
        Err(e) => {
            log::error!("Failed to save location in {database_id}: {e}");
            HttpResponse::BadGateway().json(ApiError::message("Failed to save location"))
        }
    }
}

/// `POST /api/extract`
///
/// Runs the matching site extractor over a posted page snapshot.
pub async fn extract(state: web::Data<AppState>, body: web::Json<ExtractRequest>) -> HttpResponse {
    let request = body.into_inner();
    let page = StaticPage::new(&request.url, &request.html);

    let data = match state.registry.extract(&page).await {
        Ok(data) => data,
        Err(e @ ExtractError::NoExtractorFound { .. }) => {
            log::info!("{e}");
            return HttpResponse::UnprocessableEntity().json(ApiError {
                error: e.to_string(),
                supported_sites: state.registry.supported_sites(),
                ..ApiError::default()
            });
        }
        Err(e) if e.is_retryable() => {
            log::info!("Extraction from {} found nothing: {e}", request.url);
            return HttpResponse::UnprocessableEntity().json(ApiError::message(e.to_string()));
        }
        Err(e) => {
            log::error!("Extraction from {} failed: {e}", request.url);
            return HttpResponse::InternalServerError()
                .json(ApiError::message("Failed to extract location"));
        }
    };

    let prefill = match &request.database_id {
        Some(database_id) => match form_schema(&state, database_id).await {
            Ok((_, form)) => Some(form.prefill(&data)),
            Err(_) => {
                log::warn!("No prefill for {database_id}: schema unavailable");
                None
            }
        },
        None => None,
    };

    HttpResponse::Ok().json(ApiExtraction { data, prefill })
}

/// `GET /api/extension/latest`
///
/// Redirects to the packaged extension of the latest stable release.
pub async fn extension_latest(state: web::Data<AppState>) -> HttpResponse {
    let Some(feed) = &state.releases else {
        return HttpResponse::NotFound().json(ApiError::message("Release feed is not configured"));
    };

    let releases =
        match notion_map_releases::fetch_releases_from(&state.http, &feed.api_url, &feed.repo)
            .await
        {
            Ok(releases) => releases,
            Err(e) => {
                log::error!("Failed to fetch releases for {}: {e}", feed.repo);
                return HttpResponse::BadGateway()
                    .json(ApiError::message("Failed to fetch releases"));
            }
        };

    let Some(latest) = notion_map_releases::latest_stable(&releases) else {
        return HttpResponse::NotFound().json(ApiError::message("No stable release"));
    };

    let target = notion_map_releases::asset_url(latest, EXTENSION_ASSET_SUFFIX)
        .unwrap_or(&latest.html_url);
    log::debug!("Redirecting to {} asset {target}", latest.tag_name);

    HttpResponse::Found()
        .insert_header((header::LOCATION, target.to_owned()))
        .finish()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, PoisonError};

    use actix_web::{App, http::StatusCode, test};
    use async_trait::async_trait;
    use notion_map_notion::mapping::schema_from_database;
    use notion_map_notion::{DatabaseSummary, NotionStore};
    use serde_json::json;

    use super::*;
    use crate::ReleaseFeed;

    struct FakeStore {
        database: Value,
        records: Vec<Value>,
        created: Mutex<Vec<Value>>,
        fail_writes: bool,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                database: json!({
                    "id": "db",
                    "title": [{ "plain_text": "Coffee" }],
                    "properties": {
                        "Name": { "id": "title", "type": "title", "title": {} },
                        "Address": { "id": "a", "type": "rich_text", "rich_text": {} },
                        "Latitude": { "id": "b", "type": "number", "number": {} },
                        "Longitude": { "id": "c", "type": "number", "number": {} },
                        "Category": { "id": "d", "type": "select", "select": { "options": [
                            { "name": "Cafe", "color": "brown" },
                            { "name": "Bar", "color": "red" }
                        ]}},
                        "Tags": { "id": "e", "type": "multi_select", "multi_select": { "options": [] } }
                    }
                }),
                records: vec![
                    record("p1", Some((37.76, -122.42)), "Cafe", "☕"),
                    record("p2", Some((37.76, -122.42)), "Bar", "🍸"),
                    record("p3", Some((40.7, -74.0)), "Cafe", "🥐"),
                    record("p4", None, "Cafe", "☕"),
                ],
                created: Mutex::new(Vec::new()),
                fail_writes: false,
            }
        }

        fn created(&self) -> Vec<Value> {
            self.created
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    fn record(id: &str, coords: Option<(f64, f64)>, category: &str, icon: &str) -> Value {
        let (lat, lng) = coords.map_or((Value::Null, Value::Null), |(a, b)| (json!(a), json!(b)));
        json!({
            "id": id,
            "url": format!("https://www.notion.so/{id}"),
            "icon": { "type": "emoji", "emoji": icon },
            "properties": {
                "Name": { "type": "title", "title": [{ "plain_text": id }] },
                "Latitude": { "type": "number", "number": lat },
                "Longitude": { "type": "number", "number": lng },
                "Category": { "type": "select", "select": { "name": category } },
                "Tags": { "type": "multi_select", "multi_select": [] }
            }
        })
    }

    fn not_found(id: &str) -> NotionError {
        NotionError::Status {
            status: 404,
            message: format!("Could not find database with ID: {id}"),
        }
    }

    #[async_trait]
    impl NotionStore for FakeStore {
        async fn retrieve_database(&self, id: &str) -> Result<DatabaseSchema, NotionError> {
            if id != "db" {
                return Err(not_found(id));
            }
            schema_from_database(&self.database)
        }

        async fn query_database(&self, id: &str) -> Result<Vec<Value>, NotionError> {
            if id != "db" {
                return Err(not_found(id));
            }
            Ok(self.records.clone())
        }

        async fn create_page(
            &self,
            _: &str,
            properties: Value,
            icon: Option<String>,
        ) -> Result<Value, NotionError> {
            if self.fail_writes {
                return Err(NotionError::WriteFailed {
                    message: "validation_error".into(),
                });
            }
            let page = json!({
                "id": "new-page",
                "url": "https://www.notion.so/new-page",
                "properties": properties,
                "icon": icon,
            });
            self.created
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(page.clone());
            Ok(page)
        }

        async fn retrieve_page(&self, id: &str) -> Result<Value, NotionError> {
            Ok(json!({ "id": id }))
        }

        async fn list_databases(&self) -> Result<Vec<DatabaseSummary>, NotionError> {
            Ok(vec![DatabaseSummary {
                id: "db".into(),
                title: "Coffee".into(),
            }])
        }
    }

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState::new($store)))
                    .configure(crate::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(body.healthy);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn lists_databases() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get().uri("/api/databases").to_request();
        let body: Vec<DatabaseSummary> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0].title, "Coffee");
    }

    #[actix_web::test]
    async fn schema_lists_fields_and_affordances() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/databases/db/schema")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let keys: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["key"].as_str())
            .collect();
        assert!(keys.contains(&"category"));
        assert!(keys.contains(&"tags"));
        assert_eq!(body["defaults"]["tags"], json!([]));
        assert_eq!(body["filterable"][0]["name"], "Category");
        assert_eq!(body["groupable"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn unknown_database_is_not_found() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/databases/missing/locations")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn renders_filtered_grouped_view() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/databases/db/locations?filter=Category:Cafe&group=Category&direction=asc")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["total"], 3);
        assert_eq!(body["markers"].as_array().unwrap().len(), 2);
        assert_eq!(body["groups"][0]["name"], "Cafe");
        assert_eq!(
            body["query"],
            "filter=Category:Cafe&group=Category&direction=asc"
        );
    }

    #[actix_web::test]
    async fn duplicate_coordinates_are_offset() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/databases/db/locations")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let markers = body["markers"].as_array().unwrap();
        let lat = |id: &str| {
            markers
                .iter()
                .find(|m| m["id"] == id)
                .and_then(|m| m["lat"].as_f64())
                .unwrap()
        };
        assert!((lat("p1") - lat("p2")).abs() > 1e-5);
    }

    #[actix_web::test]
    async fn clusters_nearby_markers() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/databases/db/clusters?zoom=4")
            .to_request();
        let body: Vec<Value> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.len(), 2);
        let pair = body
            .iter()
            .find(|c| c["memberIds"].as_array().unwrap().len() == 2)
            .unwrap();
        assert_eq!(pair["glyph"]["count"], 2);
        let lone = body.iter().find(|c| c["memberIds"] == json!(["p3"])).unwrap();
        assert!(lone.get("glyph").is_none());
    }

    #[actix_web::test]
    async fn non_finite_zoom_is_bad_request() {
        let app = app!(Arc::new(FakeStore::new()));
        for zoom in ["NaN", "inf", "-inf"] {
            let req = test::TestRequest::get()
                .uri(&format!("/api/databases/db/clusters?zoom={zoom}"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "zoom={zoom}");
        }
    }

    #[actix_web::test]
    async fn huge_zoom_still_clusters() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/databases/db/clusters?zoom=1100")
            .to_request();
        let body: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(!body.is_empty());
    }

    #[actix_web::test]
    async fn invalid_submission_is_rejected_without_write() {
        let store = Arc::new(FakeStore::new());
        let app = app!(store.clone());
        let req = test::TestRequest::post()
            .uri("/api/databases/db/locations")
            .set_json(json!({ "title": "", "latitude": 200, "longitude": "x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: ApiError = test::read_body_json(resp).await;
        let fields: Vec<&str> = body.issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"latitude"));
        assert!(fields.contains(&"longitude"));
        assert!(store.created().is_empty());
    }

    #[actix_web::test]
    async fn valid_submission_creates_page() {
        let store = Arc::new(FakeStore::new());
        let app = app!(store.clone());
        let req = test::TestRequest::post()
            .uri("/api/databases/db/locations")
            .set_json(json!({
                "title": "Sightglass",
                "address": "270 7th St",
                "latitude": "37.7770",
                "longitude": -122.4085,
                "emoji": "☕",
                "category": "Cafe",
                "tags": ["Roaster"]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: ApiCreated = test::read_body_json(resp).await;
        assert_eq!(body.id, "new-page");

        let created = store.created();
        assert_eq!(created.len(), 1);
        let props = &created[0]["properties"];
        assert_eq!(props["Name"]["title"][0]["text"]["content"], "Sightglass");
        assert_eq!(props["Category"]["select"]["name"], "Cafe");
        assert_eq!(created[0]["icon"], "☕");
    }

    #[actix_web::test]
    async fn write_failure_is_bad_gateway() {
        let mut store = FakeStore::new();
        store.fail_writes = true;
        let app = app!(Arc::new(store));
        let req = test::TestRequest::post()
            .uri("/api/databases/db/locations")
            .set_json(json!({ "title": "X", "latitude": 1, "longitude": 2 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "Failed to save location");
    }

    #[actix_web::test]
    async fn extract_unsupported_site_lists_supported() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::post()
            .uri("/api/extract")
            .set_json(json!({ "url": "https://example.com/", "html": "<p></p>" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.supported_sites, vec!["Google Maps", "Tripadvisor", "Yelp"]);
    }

    #[actix_web::test]
    async fn extract_prefills_form() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::post()
            .uri("/api/extract")
            .set_json(json!({
                "url": "https://www.google.com/maps/place/Tartine/@37.7614,-122.4241,17z",
                "html": "<html><body><h1>Tartine Bakery</h1></body></html>",
                "databaseId": "db"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["title"], "Tartine Bakery");
        assert_eq!(body["data"]["latitude"], "37.7614");
        assert_eq!(body["prefill"]["title"], "Tartine Bakery");
        assert_eq!(body["prefill"]["category"], "");
    }

    #[actix_web::test]
    async fn extension_redirect_needs_feed() {
        let app = app!(Arc::new(FakeStore::new()));
        let req = test::TestRequest::get()
            .uri("/api/extension/latest")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn unreachable_feed_is_bad_gateway() {
        let state = AppState::new(Arc::new(FakeStore::new())).with_releases(ReleaseFeed {
            repo: "notion-map/extension".into(),
            api_url: "http://127.0.0.1:9".into(),
        });
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/extension/latest")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
