//! mptrack dashboard: four-panel terminal view over the calc artifacts.
//!
//! Panels:
//! 1. Overview: headline index levels and the model/original/VNINDEX chart
//! 2. Attribution: top/bottom contributors and all tickers for the range
//! 3. Analysts: attribution summed per analyst
//! 4. Help: keyboard shortcuts

mod app;
mod input;
mod theme;
mod ui;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use mptrack_runner::TrackerConfig;

use crate::app::{App, ArtifactSources};

#[derive(Parser, Debug)]
#[command(name = "mptrack-tui", about = "Browse model portfolio attribution")]
struct Args {
    /// Path to mptrack.toml (defaults to ./mptrack.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read artifacts from this directory instead of the configured one
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = TrackerConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }

    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let mut app = App::new(ArtifactSources::from_config(&config));

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // 50ms poll keeps the loop responsive without spinning.
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                input::handle_key(app, key);
            }
        }

        if !app.running {
            break;
        }
    }
    Ok(())
}
