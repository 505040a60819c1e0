//! Codebook CLI: inspect and edit a group's classification scheme.
//!
//! Usage:
//!   codebook [--db path] [--config path] [--user U] [--group G] <command>

use clap::{Parser, Subcommand};
use codebook::annotation::Annotation;
use codebook::coding::{CellKey, SheetMirror};
use codebook::{
    describe, resolve, AnnotationStore, AppContext, ClassificationScheme, CodeId, CodebookManager,
    CodingManager, Config, Document, MoveOutcome, OpenStore, SqliteStore, TextRange,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "codebook",
    version,
    about = "Classification schemes for collaborative literature reviews"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to the YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Act as this user
    #[arg(long, global = true)]
    user: Option<String>,
    /// Annotation group holding the codebook
    #[arg(long, global = true)]
    group: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load annotation records from a JSON array into the local store
    Import {
        /// JSON file holding an array of annotations
        path: PathBuf,
    },
    /// Print the classification scheme
    Tree,
    /// Move a code under another code, or to the root
    Move {
        /// Code to move
        code: String,
        /// New parent; omit to make the code top-level
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a code
    Remove {
        code: String,
        /// Delete the whole subtree instead of promoting the children
        #[arg(long)]
        recursive: bool,
    },
    /// Show which codes were applied, and how often
    Codings {
        /// Only the current user's codings
        #[arg(long)]
        mine: bool,
        /// Restrict to one document
        #[arg(long)]
        uri: Option<String>,
    },
    /// Show agreement between coders per document and facet
    Consensus {
        #[arg(long)]
        uri: Option<String>,
    },
    /// Print the selectors describing a span of a Markdown document
    Describe {
        path: PathBuf,
        /// First character of the span
        start: usize,
        /// One past the last character
        end: usize,
    },
    /// Re-anchor a stored annotation in a Markdown document
    Anchor {
        path: PathBuf,
        annotation_id: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codebook=warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let path = cli.config.clone().or_else(Config::default_path);
    let mut config = match path {
        Some(path) => Config::load(&path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => Config::default(),
    };
    if let Some(db) = &cli.db {
        config.db = Some(db.clone());
    }
    if let Some(user) = &cli.user {
        config.user = user.clone();
    }
    if let Some(group) = &cli.group {
        config.group = group.clone();
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>, String> {
    let db_path = config.db_path();
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

async fn load_codebook(context: &AppContext) -> Result<CodebookManager, String> {
    let manager = CodebookManager::new(context);
    manager
        .load()
        .await
        .map_err(|e| format!("Failed to load codebook: {}", e))?;
    Ok(manager)
}

fn read_markdown(path: &Path) -> Result<Document, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let uri = match path.canonicalize() {
        Ok(p) => format!("file://{}", p.display()),
        Err(_) => path.display().to_string(),
    };
    Ok(Document::from_markdown(uri, &text))
}

async fn cmd_import(store: &SqliteStore, path: &Path) -> i32 {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", path.display(), e);
            return 1;
        }
    };
    let records: Vec<Annotation> = match serde_json::from_str(&text) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: invalid annotation file: {}", e);
            return 1;
        }
    };
    let mut imported = 0;
    for record in records {
        let id = record.id.clone();
        let result = if !id.is_empty() && matches!(store.get(&id), Ok(Some(_))) {
            store.update(&id, record).await
        } else {
            store.create(record).await
        };
        match result {
            Ok(_) => imported += 1,
            Err(e) => {
                eprintln!("Error: failed to store '{}': {}", id, e);
                return 1;
            }
        }
    }
    println!("Imported {} annotation(s)", imported);
    0
}

fn print_subtree(scheme: &ClassificationScheme, id: &CodeId, depth: usize) {
    let Some(code) = scheme.get(id) else {
        return;
    };
    let marker = if code.multivalued { " [multivalued]" } else { "" };
    println!(
        "{}{} ({}) {}{}",
        "  ".repeat(depth),
        code.name(),
        id,
        code.element.color,
        marker
    );
    for child in &code.element.children {
        print_subtree(scheme, child, depth + 1);
    }
}

async fn cmd_tree(context: &AppContext) -> i32 {
    let manager = match load_codebook(context).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let scheme = manager.scheme().await;
    if scheme.is_empty() {
        println!("No codes defined.");
        return 0;
    }
    for top in &scheme.element.children {
        print_subtree(&scheme, top, 0);
    }
    if !scheme.dangling_links().is_empty() {
        eprintln!(
            "Warning: {} linking record(s) ignored: {}",
            scheme.dangling_links().len(),
            scheme.dangling_links().join(", ")
        );
    }
    0
}

async fn cmd_move(context: &AppContext, code: &str, parent: Option<&str>) -> i32 {
    let manager = match load_codebook(context).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let parent = parent.map(CodeId::from);
    let (outcome, pending) = manager.change_parent(&CodeId::from(code), parent.as_ref()).await;
    match outcome {
        MoveOutcome::Rejected(reason) => {
            eprintln!("Move ignored: {}", reason);
            0
        }
        MoveOutcome::Moved(mv) => match pending.wait().await {
            Ok(_) => {
                let target = match &mv.new_parent {
                    codebook::scheme::ParentRef::Scheme => "the root".to_string(),
                    codebook::scheme::ParentRef::Code(p) => format!("'{}'", p),
                };
                println!("Moved '{}' under {}", code, target);
                0
            }
            Err(e) => {
                eprintln!("Error: moved locally but not saved: {}", e);
                1
            }
        },
    }
}

async fn cmd_remove(context: &AppContext, code: &str, recursive: bool) -> i32 {
    let manager = match load_codebook(context).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let Some((removal, pending)) = manager.remove_code(&CodeId::from(code), recursive).await else {
        eprintln!("Error: code '{}' not found", code);
        return 1;
    };
    match pending.wait().await {
        Ok(report) => {
            println!(
                "Removed {} code(s), promoted {}, deleted {} record(s)",
                removal.removed.len(),
                removal.promoted.len(),
                report.written.len()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: removed locally but not saved: {}", e);
            1
        }
    }
}

async fn cmd_codings(context: &AppContext, mine: bool, uri: Option<&str>) -> i32 {
    let manager = match load_codebook(context).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let scheme = manager.snapshot().await;
    let codings = match CodingManager::new(context).codings(&scheme, uri).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let view = if mine { &codings.mine } else { &codings.all };
    if view.is_empty() {
        println!("No codings.");
        return 0;
    }
    println!("{:<24}  {:>11}  {:>9}", "CODE", "ANNOTATIONS", "VALIDATED");
    println!("{}", "-".repeat(48));
    for (id, evidence) in view {
        let name = scheme.get(id).map(|c| c.name()).unwrap_or_default();
        println!(
            "{:<24}  {:>11}  {:>9}",
            name,
            evidence.annotations.len(),
            if evidence.validated { "yes" } else { "no" }
        );
    }
    0
}

fn cell_label(scheme: &ClassificationScheme, key: &CellKey) -> String {
    let name = |id: &CodeId| {
        scheme
            .get(id)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| id.to_string())
    };
    match &key.code {
        Some(code) => format!("{} / {}", name(&key.facet), name(code)),
        None => name(&key.facet),
    }
}

async fn cmd_consensus(context: &AppContext, uri: Option<&str>) -> i32 {
    let manager = match load_codebook(context).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let scheme = manager.snapshot().await;
    let consensus = match CodingManager::new(context).consensus(&scheme, uri).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mut sheet = SheetMirror::new();
    sheet.paint(consensus);

    for (key, cell) in sheet.cells() {
        let codes: Vec<String> = cell
            .codes
            .iter()
            .map(|c| scheme.get(c).map(|c| c.name().to_string()).unwrap_or_else(|| c.to_string()))
            .collect();
        println!(
            "{}  {:<28}  {:<12} ({:<6})  {}",
            key.uri,
            cell_label(&scheme, key),
            cell.status,
            cell.status.fill_name(),
            codes.join(", ")
        );
    }
    for (status, count) in sheet.summary() {
        println!("{}: {}", status, count);
    }
    0
}

fn cmd_describe(path: &Path, start: usize, end: usize) -> i32 {
    let document = match read_markdown(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let selectors = match describe(&document, TextRange::new(start, end)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match serde_json::to_string_pretty(&selectors) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_anchor(store: &SqliteStore, path: &Path, annotation_id: &str) -> i32 {
    let document = match read_markdown(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let annotation = match store.get(annotation_id) {
        Ok(Some(a)) => a,
        Ok(None) => {
            eprintln!("Error: annotation '{}' not found", annotation_id);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match resolve(&document, annotation.selectors()) {
        Ok(range) => {
            let text = document.slice(range).unwrap_or_default();
            println!("{}  {:?}", range, text);
            0
        }
        Err(e) => {
            eprintln!("Not anchored: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // describe works on files alone
    if let Commands::Describe { path, start, end } = &cli.command {
        std::process::exit(cmd_describe(path, *start, *end));
    }

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let context = AppContext::new(config, store.clone());

    let code = match &cli.command {
        Commands::Import { path } => cmd_import(&store, path).await,
        Commands::Tree => cmd_tree(&context).await,
        Commands::Move { code, parent } => cmd_move(&context, code, parent.as_deref()).await,
        Commands::Remove { code, recursive } => cmd_remove(&context, code, *recursive).await,
        Commands::Codings { mine, uri } => cmd_codings(&context, *mine, uri.as_deref()).await,
        Commands::Consensus { uri } => cmd_consensus(&context, uri.as_deref()).await,
        Commands::Describe { path, start, end } => cmd_describe(path, *start, *end),
        Commands::Anchor { path, annotation_id } => cmd_anchor(&store, path, annotation_id),
    };
    std::process::exit(code);
}
