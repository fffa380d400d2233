use std::env;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ragkit_core::config::{resolve_with_base, Config, Settings};
use ragkit_strategy::loader::render_report;
use ragkit_strategy::{ComponentRegistry, PipelineBuilder, SchemaValidator, StrategyLoader, StrategyRegistry};

const USAGE: &str = "Usage: ragkit [--strategies <file>]... <command> [args...]

Commands:
  ingest <strategy> <path>...           parse, embed and store files or directories
  query <strategy> <text> [--top-k N]   search with a strategy
  validate <file>                       check a strategy file and print diagnostics
  list                                  show loaded strategies";

struct Args {
    strategy_files: Vec<PathBuf>,
    cmd: String,
    rest: Vec<String>,
}

fn parse_args() -> Args {
    let mut strategy_files = Vec::new();
    let mut positional = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--strategies" | "-s" => match args.next() {
                Some(file) => strategy_files.push(PathBuf::from(file)),
                None => { eprintln!("Error: --strategies requires a file"); std::process::exit(1); }
            },
            "--help" | "-h" => { println!("{USAGE}"); std::process::exit(0); }
            _ => positional.push(arg),
        }
    }
    if positional.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = positional.remove(0);
    Args { strategy_files, cmd, rest: positional }
}

fn loader(settings: &Settings) -> StrategyLoader {
    StrategyLoader::new(SchemaValidator::new(ComponentRegistry::builtin().known_types())).with_merge(settings.strategies.merge)
}

/// Command-line files win over `strategies.files`; with neither, `./strategies.yaml`.
fn strategy_files(args: &Args, settings: &Settings) -> anyhow::Result<Vec<PathBuf>> {
    if !args.strategy_files.is_empty() { return Ok(args.strategy_files.clone()); }
    let cwd = env::current_dir()?;
    if settings.strategies.files.is_empty() { return Ok(vec![cwd.join("strategies.yaml")]); }
    Ok(settings.strategies.files.iter().map(|f| resolve_with_base(&cwd, f)).collect())
}

fn load_registry(args: &Args, settings: &Settings) -> anyhow::Result<&'static StrategyRegistry> {
    let files = strategy_files(args, settings)?;
    debug!(files = ?files, "loading strategy files");
    let registry = StrategyRegistry::global();
    registry.reload(&loader(settings), &files)?;
    Ok(registry)
}

fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let t = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, finishing current batch...");
            t.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let args = parse_args();

    match args.cmd.as_str() {
        "ingest" => {
            if args.rest.len() < 2 { eprintln!("Usage: ragkit ingest <strategy> <path>..."); std::process::exit(1); }
            let registry = load_registry(&args, &settings)?;
            let definition = registry.get(&args.rest[0])?;
            let inputs: Vec<PathBuf> = args.rest[1..].iter().map(PathBuf::from).collect();
            let pipeline = PipelineBuilder::new(settings.clone()).build(definition)?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
            spinner.set_message(format!("Ingesting with '{}'", pipeline.name()));
            spinner.enable_steady_tick(Duration::from_millis(120));
            let report = pipeline.ingest_with_cancel(&inputs, &ctrl_c_token()).await;
            spinner.finish_and_clear();
            let report = report?;

            println!("✅ Ingest complete");
            println!("📄 Files: {} seen, {} failed", report.files_seen, report.files_failed);
            println!("📊 Documents: {} written, {} rejected by validation rules", report.documents_written, report.documents_skipped);
            if report.batches_failed > 0 { println!("⚠️  {} batch(es) failed; see log for details", report.batches_failed); }
        }
        "query" => {
            let mut top_k = None;
            let mut words = Vec::new();
            let mut rest = args.rest.iter();
            while let Some(arg) = rest.next() {
                if arg == "--top-k" || arg == "-k" {
                    match rest.next().and_then(|n| n.parse::<usize>().ok()) {
                        Some(n) => top_k = Some(n),
                        None => { eprintln!("Error: --top-k requires a number"); std::process::exit(1); }
                    }
                } else {
                    words.push(arg.as_str());
                }
            }
            if words.len() < 2 { eprintln!("Usage: ragkit query <strategy> \"<text>\" [--top-k N]"); std::process::exit(1); }
            let registry = load_registry(&args, &settings)?;
            let pipeline = PipelineBuilder::new(settings.clone()).build(registry.get(words[0])?)?;
            let text = words[1..].join(" ");
            let top_k = top_k.unwrap_or_else(|| pipeline.default_top_k());
            info!(strategy = pipeline.name(), top_k, "query");

            let results = pipeline.search_with_cancel(text.as_str(), top_k, &ctrl_c_token()).await?;
            if results.is_empty() { println!("No results."); }
            for r in &results {
                let preview: String = r.document.content.chars().take(200).collect();
                println!("{:>2}. [{:.4}] {} ({})", r.rank + 1, r.score, r.document.source, r.document.id);
                println!("    {}", preview.replace('\n', " "));
            }
        }
        "validate" => {
            let Some(file) = args.rest.first() else { eprintln!("Usage: ragkit validate <file>"); std::process::exit(1) };
            let text = std::fs::read_to_string(file)?;
            let loader = loader(&settings);
            let report = loader.check_str(&text, file)?;
            let (rendered, has_errors) = render_report(&report);
            if !rendered.is_empty() { println!("{rendered}"); }
            if has_errors {
                eprintln!("❌ {} has {} error(s)", file, report.errors().count());
                std::process::exit(1);
            }
            for def in loader.load_str(&text, file)? {
                for hint in loader.validator().suggest(&def) {
                    println!("💡 {}: {}", def.name, hint);
                }
            }
            println!("✅ {} is valid", file);
        }
        "list" => {
            let registry = load_registry(&args, &settings)?;
            for name in registry.names() {
                let def = registry.get(&name)?;
                let kind = &def.components.retrieval_strategy.kind;
                if def.tags.is_empty() {
                    println!("{name}  ({kind})  {}", def.description);
                } else {
                    println!("{name}  ({kind}) [{}]  {}", def.tags.join(", "), def.description);
                }
            }
        }
        _ => { eprintln!("Unknown command: {}\n\n{USAGE}", args.cmd); std::process::exit(1); }
    }
    Ok(())
}
