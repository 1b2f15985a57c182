use std::sync::{Arc, Mutex};

use clap::Parser;
use log::info;

use hipgraph::HttpBackend;
use hipgraph::cli::Args;
use hipgraph::graph::Element;
use hipgraph::navigator::{ContextNavigator, GraphView};
use hipgraph::session::{Pan, Session, ViewState};

/// Headless graph canvas: holds the element set, no layout engine.
#[derive(Default)]
struct ConsoleView {
    elements: Vec<Element>,
    view: Option<ViewState>,
}

impl GraphView for ConsoleView {
    fn clear(&mut self) {
        self.elements.clear();
    }

    fn add_elements(&mut self, elements: &[Element]) {
        self.elements.extend_from_slice(elements);
    }

    fn run_layout(&mut self) {
        // Default framing stands in for the layout engine's fit
        self.view = Some(ViewState { zoom: 1.0, pan: Pan::default() });
    }

    fn view(&self) -> ViewState {
        self.view
            .unwrap_or(ViewState { zoom: 1.0, pan: Pan::default() })
    }

    fn restore_view(&mut self, view: ViewState) {
        self.view = Some(view);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    info!("Fetching {} from {}", args.context, args.backend);

    let session = Arc::new(Mutex::new(Session::new()));
    let backend = HttpBackend::new(&args.backend);
    let mut navigator =
        ContextNavigator::new(backend, ConsoleView::default(), Arc::clone(&session));
    navigator.initialize(args.file, &args.context)?;

    let trail: Vec<&str> = navigator
        .breadcrumbs()
        .iter()
        .map(|crumb| crumb.label.as_str())
        .collect();
    println!(
        "Context: {}  [{}]  ({} elements)",
        args.context,
        trail.join(" > "),
        navigator.view().elements.len()
    );
    {
        let session = session.lock().expect("lock");
        println!(
            "Default frame range: {} - {}",
            session.default_start(),
            session.default_end()
        );
    }
    if navigator.can_cook_all() {
        println!("Context supports whole-context rendering");
    }

    println!("\n{:<20} {:<32} {:>9} {:>9}", "NODE", "PATH", "ENTERABLE", "COOKABLE");
    for node in navigator.displayed_nodes() {
        println!(
            "{:<20} {:<32} {:>9} {:>9}",
            node.id,
            node.path,
            if node.can_enter { "yes" } else { "no" },
            if node.can_cook.allowed() { "yes" } else { "no" },
        );
    }

    Ok(())
}
