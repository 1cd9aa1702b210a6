use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use tracing::info;

use weft_cli::demo::demo_application;
use weft_cli::server;
use weft_core::Application;
use weft_model::ApplicationSettings;

use crate::cli::ServeArgs;

pub fn load_settings(path: Option<&Path>) -> Result<ApplicationSettings> {
    match path {
        Some(path) => ApplicationSettings::load(path)
            .with_context(|| format!("load settings from {}", path.display())),
        None => Ok(ApplicationSettings::default()),
    }
}

/// Command-line flags win over the settings file.
pub fn apply_serve_overrides(mut settings: ApplicationSettings, args: &ServeArgs) -> ApplicationSettings {
    if let Some(strategy) = args.render_strategy {
        settings = settings.with_render_strategy(strategy.into());
    }
    if let Some(root) = &args.static_root {
        settings = settings.with_static_root(root.clone());
    }
    if let Some(max_pages) = args.max_pages {
        settings = settings.with_max_pages_per_map(max_pages);
    }
    settings
}

pub fn run_serve(settings: ApplicationSettings, args: &ServeArgs) -> Result<()> {
    let settings = apply_serve_overrides(settings, args);
    let app = demo_application(settings).context("build demo application")?;
    info!(
        render_strategy = app.settings().render_strategy.as_str(),
        pages = app.registry().len(),
        "starting server"
    );
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    runtime
        .block_on(server::serve(Arc::new(app), args.bind))
        .with_context(|| format!("serve on {}", args.bind))
}

pub fn run_pages(settings: ApplicationSettings) -> Result<()> {
    let app = demo_application(settings).context("build demo application")?;
    let mut table = Table::new();
    table.set_header(vec!["Page", "Role"]);
    apply_table_style(&mut table);
    for class in app.registry().classes() {
        table.add_row(vec![class.to_string(), page_role(&app, class).to_string()]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_check_config(settings: ApplicationSettings) -> Result<()> {
    let app = demo_application(settings).context("settings do not produce a working application")?;
    let settings = app.settings();
    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    apply_table_style(&mut table);
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    table.add_row(vec!["home_page".to_string(), settings.home_page.clone()]);
    table.add_row(vec![
        "page_expired_page".to_string(),
        optional(&settings.page_expired_page),
    ]);
    table.add_row(vec![
        "stale_data_page".to_string(),
        optional(&settings.stale_data_page),
    ]);
    table.add_row(vec![
        "internal_error_page".to_string(),
        optional(&settings.internal_error_page),
    ]);
    table.add_row(vec![
        "render_strategy".to_string(),
        settings.render_strategy.as_str().to_string(),
    ]);
    table.add_row(vec![
        "max_pages_per_map".to_string(),
        settings.max_pages_per_map.to_string(),
    ]);
    table.add_row(vec![
        "buffer_capacity_per_session".to_string(),
        settings.buffer_capacity_per_session.to_string(),
    ]);
    table.add_row(vec![
        "default_max_upload_size".to_string(),
        settings.default_max_upload_size.to_string(),
    ]);
    table.add_row(vec![
        "max_request_body_size".to_string(),
        settings.max_request_body_size.to_string(),
    ]);
    table.add_row(vec![
        "session_timeout_secs".to_string(),
        settings.session_timeout_secs.to_string(),
    ]);
    table.add_row(vec![
        "max_sessions".to_string(),
        settings.max_sessions.to_string(),
    ]);
    table.add_row(vec![
        "static_root".to_string(),
        settings
            .static_root
            .as_ref()
            .map_or_else(|| "-".to_string(), |root| root.display().to_string()),
    ]);
    table.add_row(vec![
        "session_cookie_name".to_string(),
        settings.session_cookie_name.clone(),
    ]);
    table.add_row(vec![
        "message overrides".to_string(),
        settings.messages.len().to_string(),
    ]);
    println!("{table}");
    Ok(())
}

fn page_role(app: &Application, class: &str) -> &'static str {
    let settings = app.settings();
    if settings.home_page == class {
        "home"
    } else if settings.page_expired_page.as_deref() == Some(class) {
        "page expired"
    } else if settings.stale_data_page.as_deref() == Some(class) {
        "stale data"
    } else if settings.internal_error_page.as_deref() == Some(class) {
        "internal error"
    } else {
        ""
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}
