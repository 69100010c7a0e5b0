//! Subcommand implementations.

use std::path::Path;
use std::time::Duration;

use notion_map_extractor::{ExtractorRegistry, StaticPage};
use notion_map_location_models::{FilterState, LocationData, SortDirection};
use notion_map_notion::{
    NotionClient, NotionConfig, NotionStore, SchemaCache, build_page_properties, load_locations,
    save_location,
};
use notion_map_presentation::{MapView, ViewState};
use notion_map_schema::{FieldKind, SchemaError, ValidationSchema, build_schema};
use serde_json::{Map, Value, json};

use crate::SettingsAction;
use crate::settings::{SettingKey, Settings, SettingsStore};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Delay between extraction attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Argument parsers
// ---------------------------------------------------------------------------

/// Parses `KEY=VALUE`.
pub fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{arg}'"));
    }
    Ok((key.to_lowercase(), value.trim().to_owned()))
}

/// Parses `Property:Value,Value`.
pub fn parse_filter_arg(arg: &str) -> Result<FilterState, String> {
    let (property, values) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected Property:Value,Value, got '{arg}'"))?;
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect();
    if property.trim().is_empty() || values.is_empty() {
        return Err(format!("filter '{arg}' needs a property and at least one value"));
    }
    Ok(FilterState {
        property: property.trim().to_owned(),
        values,
    })
}

/// Parses `asc` or `desc`.
pub fn parse_direction(arg: &str) -> Result<SortDirection, String> {
    arg.to_lowercase()
        .parse()
        .map_err(|_| format!("expected asc or desc, got '{arg}'"))
}

/// Parses a settings key.
pub fn parse_setting_key(arg: &str) -> Result<SettingKey, String> {
    arg.parse().map_err(|_| {
        format!(
            "unknown setting '{arg}', expected one of: {}",
            <SettingKey as strum::VariantNames>::VARIANTS.join(", ")
        )
    })
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn notion_store() -> Result<SchemaCache<NotionClient>, Box<dyn std::error::Error>> {
    let config = NotionConfig::from_env()?;
    let ttl = config.schema_cache_ttl;
    Ok(SchemaCache::new(NotionClient::new(config)?, ttl))
}

fn resolve_database(arg: Option<&str>, settings: &Settings) -> Result<String, String> {
    arg.or_else(|| settings.get(SettingKey::SelectedDatabaseId))
        .map(str::to_owned)
        .ok_or_else(|| {
            "no database given: pass --database or run \
             `settings set selected_database_id <id>`"
                .to_owned()
        })
}

async fn extract_page(
    url: &str,
    html: Option<&Path>,
    attempts: u32,
) -> Result<LocationData, Box<dyn std::error::Error>> {
    let page = match html {
        Some(path) => StaticPage::new(url, &std::fs::read_to_string(path)?),
        None => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("notion-map/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(30))
                .build()?;
            StaticPage::fetch(&client, url).await?
        }
    };

    let registry = ExtractorRegistry::with_default_sites();
    Ok(registry
        .extract_with_retry(&page, attempts, RETRY_DELAY)
        .await?)
}

/// Applies `--set` overrides to prefilled form values. Multi-select
/// values are split on commas.
fn apply_overrides(
    form: &ValidationSchema,
    values: &mut Map<String, Value>,
    overrides: &[(String, String)],
) -> Result<(), String> {
    for (key, raw) in overrides {
        let field = form
            .field(key)
            .ok_or_else(|| format!("unknown field '{key}'"))?;
        let value = match field.kind {
            FieldKind::MultiSelect => json!(
                raw.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .collect::<Vec<_>>()
            ),
            _ => json!(raw),
        };
        values.insert(key.clone(), value);
    }
    Ok(())
}

const fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Coordinate { .. } => "coordinate",
        FieldKind::Url => "url",
        FieldKind::Select => "select",
        FieldKind::MultiSelect => "multi_select",
        FieldKind::Number => "number",
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Prints the extracted record as JSON.
pub async fn cmd_extract(url: &str, html: Option<&Path>, attempts: u32) -> CmdResult {
    let data = extract_page(url, html, attempts).await?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Extracts, validates, and saves one page.
pub async fn cmd_save(
    url: &str,
    database: Option<&str>,
    html: Option<&Path>,
    overrides: &[(String, String)],
    dry_run: bool,
) -> CmdResult {
    let settings = SettingsStore::from_env()?.load()?;
    let database_id = resolve_database(database, &settings)?;

    let data = extract_page(url, html, 3).await?;
    println!("Extracted: {} ({}, {})", data.title, data.latitude, data.longitude);

    let store = notion_store()?;
    let schema = store.retrieve_database(&database_id).await?;
    let form = build_schema(&schema.properties)?;

    let mut values = form.prefill(&data);
    apply_overrides(&form, &mut values, overrides)?;

    let submission = match form.validate(&Value::Object(values)) {
        Ok(submission) => submission,
        Err(e @ SchemaError::Validation { .. }) => {
            eprintln!("Cannot save, the form has problems:");
            for issue in e.issues() {
                eprintln!("  {issue}");
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if dry_run {
        let properties = build_page_properties(&schema, &submission);
        println!("{}", serde_json::to_string_pretty(&properties)?);
        return Ok(());
    }

    let page = save_location(&store, &database_id, &schema, &submission).await?;
    println!(
        "Saved '{}': {}",
        submission.title,
        page.get("url").and_then(Value::as_str).unwrap_or_default()
    );
    Ok(())
}

/// Prints the rendered view as grouped text or JSON.
pub async fn cmd_locations(
    database: Option<&str>,
    filters: Vec<FilterState>,
    group_by: Option<String>,
    direction: SortDirection,
    json: bool,
) -> CmdResult {
    let settings = SettingsStore::from_env()?.load()?;
    let database_id = resolve_database(database, &settings)?;

    let store = notion_store()?;
    let (schema, locations) = load_locations(&store, &database_id).await?;
    let state = ViewState {
        filters,
        group_by,
        direction,
        selected: None,
    };
    let view = MapView::new(schema).render(&locations, &state);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{} of {} locations", view.markers.len(), view.total);
    for group in &view.groups {
        println!();
        println!("{} ({})", group.name, group.locations.len());
        for location in &group.locations {
            let icon = location.icon.as_deref().unwrap_or(" ");
            if location.address.is_empty() {
                println!("  {icon} {}", location.name);
            } else {
                println!("  {icon} {} - {}", location.name, location.address);
            }
        }
    }
    if let Some(bounds) = view.bounds {
        println!();
        println!(
            "Bounds: {:.4},{:.4} to {:.4},{:.4}",
            bounds.south, bounds.west, bounds.north, bounds.east
        );
    }
    println!("Share query: ?{}", view.query);
    Ok(())
}

/// Prints the form fields generated from the schema.
pub async fn cmd_schema(database: Option<&str>) -> CmdResult {
    let settings = SettingsStore::from_env()?.load()?;
    let database_id = resolve_database(database, &settings)?;

    let store = notion_store()?;
    let schema = store.retrieve_database(&database_id).await?;
    let form = build_schema(&schema.properties)?;

    println!("=== {} ===", schema.title);
    for field in form.fields() {
        let required = if field.required { "required" } else { "" };
        let options: Vec<&str> = field.options.iter().map(|o| o.name.as_str()).collect();
        println!(
            "{:<20} {:<12} {:<8} {}",
            field.key,
            kind_label(&field.kind),
            required,
            options.join(", ")
        );
    }
    Ok(())
}

/// Lists databases and caches them in settings.
pub async fn cmd_databases() -> CmdResult {
    let store = notion_store()?;
    let databases = store.list_databases().await?;

    let settings = SettingsStore::from_env()?.update(|s| {
        s.cache_databases(databases.clone(), chrono::Utc::now());
    })?;

    for db in &databases {
        let marker = if settings.get(SettingKey::SelectedDatabaseId) == Some(db.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}  {}", db.id, db.title);
    }
    Ok(())
}

/// Runs the API server until interrupted.
pub async fn cmd_serve() -> CmdResult {
    // The server uses actix-web's runtime, so we need to run it
    // in a blocking task to avoid nesting tokio runtimes.
    tokio::task::spawn_blocking(|| {
        actix_web::rt::System::new().block_on(async {
            let state = notion_map_server::AppState::from_env()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            notion_map_server::run_server(state, notion_map_server::ServerConfig::from_env()).await
        })
    })
    .await??;
    Ok(())
}

/// Reads or writes settings.
pub fn cmd_settings(action: SettingsAction) -> CmdResult {
    let store = SettingsStore::from_env()?;

    match action {
        SettingsAction::List => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Get { key } => {
            let settings = store.load()?;
            println!("{}", settings.get(key).unwrap_or_default());
        }
        SettingsAction::Set { key, value } => {
            store.update(|s| s.set(key, &value))?;
            log::info!("Set {key} in {}", store.path().display());
        }
        SettingsAction::Unset { key } => {
            store.update(|s| s.unset(key))?;
            log::info!("Cleared {key}");
        }
    }
    Ok(())
}

/// Compares the installed version against the release feed.
pub async fn cmd_check_update(repo: Option<String>, current: &str, dismiss: bool) -> CmdResult {
    let repo = repo
        .or_else(|| std::env::var("NOTION_MAP_RELEASES_REPO").ok())
        .filter(|r| !r.is_empty())
        .ok_or("no repository given: pass --repo or set NOTION_MAP_RELEASES_REPO")?;

    let client = reqwest::Client::new();
    let releases = notion_map_releases::fetch_releases(&client, &repo).await?;
    let Some(latest) = notion_map_releases::latest_stable(&releases) else {
        println!("No stable release of {repo} yet");
        return Ok(());
    };

    let store = SettingsStore::from_env()?;
    let settings = store.load()?;
    let dismissed = settings.get(SettingKey::DismissedUpdateVersion);

    println!("Current version: {current}");
    println!("Latest version:  {}", latest.tag_name);

    if notion_map_releases::update_available(current, latest, dismissed)? {
        println!("Update available: {}", latest.html_url);
        if let Some(url) =
            notion_map_releases::asset_url(latest, notion_map_server::EXTENSION_ASSET_SUFFIX)
        {
            println!("Download: {url}");
        }
    } else {
        println!("No update to show");
    }

    if dismiss {
        store.update(|s| s.set(SettingKey::DismissedUpdateVersion, &latest.tag_name))?;
        println!("Dismissed {}", latest.tag_name);
    }
    Ok(())
}
