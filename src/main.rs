mod actions;
mod api;
mod app;
mod assistant;
mod cache;
mod charts;
mod config;
mod debounce;
mod error;
mod format;
mod logging;
mod models;
mod picker;
mod queries;
mod query;
mod ui;

use crate::api::ApiClient;
use crate::app::App;
use crate::cache::QueryCache;
use crate::config::Config;
use crate::queries::Queries;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // config problems are reported before the terminal is taken over
    let config = Config::load()?;
    logging::init_tracing(&config.log_file)?;
    tracing::info!(api_url = %config.api_url, "starting dashboard");

    let api = ApiClient::from_config(&config)?;
    let queries = Queries::new(api, QueryCache::new());
    let app = App::new(queries, &config);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    exit_status(res)
}

/// Reports an event loop failure once the terminal is restored and passes it on.
fn exit_status(res: io::Result<()>) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = &res {
        tracing::error!(error = %err, "event loop failed");
    }
    res.map_err(Into::into)
}
