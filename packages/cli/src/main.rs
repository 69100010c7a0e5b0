#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the notion map toolchain.
//!
//! Extracts places from supported map pages, saves them to a Notion
//! database through the schema-generated form, lists saved locations
//! with the same filter/group/sort rules as the map view, runs the API
//! server, and manages the settings the browser extension persists
//! (selected database, cached database list, dismissed update).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notion_map_location_models::{FilterState, SortDirection};

mod commands;
mod settings;

// ---------------------------------------------------------------------------
// CLI definitions
// ---------------------------------------------------------------------------

/// Save places from map sites to Notion and browse them on a map.
#[derive(Parser)]
#[command(name = "notion_map")]
#[command(about = "Save places from map sites to Notion and browse them on a map")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Extract location data from a supported map page.
    Extract {
        /// Page URL; selects the site extractor.
        url: String,

        /// Read the page from a saved HTML file instead of fetching it.
        #[arg(long)]
        html: Option<PathBuf>,

        /// Extraction attempts while coordinates are not yet available.
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },

    /// Extract a page and save it as a new database record.
    Save {
        /// Page URL; selects the site extractor.
        url: String,

        /// Target database (default: the selected database).
        #[arg(long)]
        database: Option<String>,

        /// Read the page from a saved HTML file instead of fetching it.
        #[arg(long)]
        html: Option<PathBuf>,

        /// Override a form field, e.g. `--set category=Cafe` or
        /// `--set tags=Vegan,Brunch`.
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = commands::parse_key_value)]
        overrides: Vec<(String, String)>,

        /// Validate and print the page properties without saving.
        #[arg(long)]
        dry_run: bool,
    },

    /// List a database's locations, filtered and grouped like the map.
    Locations {
        /// Database to read (default: the selected database).
        #[arg(long)]
        database: Option<String>,

        /// Filter as `Property:Value,Value`; repeat for more properties.
        #[arg(long, value_parser = commands::parse_filter_arg)]
        filter: Vec<FilterState>,

        /// Property to group by.
        #[arg(long)]
        group: Option<String>,

        /// Group and sort direction (`asc` or `desc`).
        #[arg(long, default_value = "asc", value_parser = commands::parse_direction)]
        direction: SortDirection,

        /// Print the full rendered view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the save form generated from a database's schema.
    Schema {
        /// Database to describe (default: the selected database).
        #[arg(long)]
        database: Option<String>,
    },

    /// List databases shared with the integration and cache the list.
    Databases,

    /// Start the API server.
    Serve,

    /// Read or write persistent settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Check whether a newer extension release is available.
    CheckUpdate {
        /// Repository as `owner/name` (default: `NOTION_MAP_RELEASES_REPO`).
        #[arg(long)]
        repo: Option<String>,

        /// Installed version.
        #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
        current: String,

        /// Stop notifying about the latest release.
        #[arg(long)]
        dismiss: bool,
    },
}

/// Actions for the `settings` subcommand.
#[derive(Subcommand)]
enum SettingsAction {
    /// Print every setting.
    List,

    /// Print one setting.
    Get {
        /// Setting key.
        #[arg(value_parser = commands::parse_setting_key)]
        key: settings::SettingKey,
    },

    /// Change one setting.
    Set {
        /// Setting key.
        #[arg(value_parser = commands::parse_setting_key)]
        key: settings::SettingKey,

        /// New value.
        value: String,
    },

    /// Clear one setting.
    Unset {
        /// Setting key.
        #[arg(value_parser = commands::parse_setting_key)]
        key: settings::SettingKey,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            url,
            html,
            attempts,
        } => commands::cmd_extract(&url, html.as_deref(), attempts).await,
        Commands::Save {
            url,
            database,
            html,
            overrides,
            dry_run,
        } => {
            commands::cmd_save(
                &url,
                database.as_deref(),
                html.as_deref(),
                &overrides,
                dry_run,
            )
            .await
        }
        Commands::Locations {
            database,
            filter,
            group,
            direction,
            json,
        } => commands::cmd_locations(database.as_deref(), filter, group, direction, json).await,
        Commands::Schema { database } => commands::cmd_schema(database.as_deref()).await,
        Commands::Databases => commands::cmd_databases().await,
        Commands::Serve => commands::cmd_serve().await,
        Commands::Settings { action } => commands::cmd_settings(action),
        Commands::CheckUpdate {
            repo,
            current,
            dismiss,
        } => commands::cmd_check_update(repo, &current, dismiss).await,
    }
}
