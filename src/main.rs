use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use photoo::{logging, Config, ImportProgress, ImportSummary, Photo, PhotoLibrary};

enum Command {
    Import { source: PathBuf, json: bool },
    List { json: bool },
    SetDate { id: i64, date: String },
    History { id: i64 },
    Resolve { filename: String },
    Thumbnail { filename: String },
}

struct Args {
    config_path: Option<PathBuf>,
    verbose: bool,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("Run 'photoo --help' for usage.");
    std::process::exit(2);
}

fn parse_id(value: Option<&String>) -> i64 {
    match value.map(|v| v.parse::<i64>()) {
        Some(Ok(id)) => id,
        Some(Err(_)) => usage_error("photo id must be an integer"),
        None => usage_error("missing photo id"),
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut verbose = false;
    let mut json = false;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photoo {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    usage_error("--config requires a path argument");
                }
            }
            "--verbose" | "-v" | "--stderr" => verbose = true,
            "--json" => json = true,
            other if other.starts_with('-') && other.len() > 1 => {
                usage_error(&format!("unknown option: {}", other));
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let command = match positional.first().map(String::as_str) {
        Some("import") => match positional.get(1) {
            Some(source) => Command::Import {
                source: PathBuf::from(source),
                json,
            },
            None => usage_error("import requires a source folder"),
        },
        Some("list") => Command::List { json },
        Some("set-date") => {
            let id = parse_id(positional.get(1));
            match positional.get(2) {
                Some(date) => Command::SetDate {
                    id,
                    date: date.clone(),
                },
                None => usage_error("set-date requires a date"),
            }
        }
        Some("history") => Command::History {
            id: parse_id(positional.get(1)),
        },
        Some("resolve") => match positional.get(1) {
            Some(filename) => Command::Resolve {
                filename: filename.clone(),
            },
            None => usage_error("resolve requires a filename"),
        },
        Some("thumbnail") => match positional.get(1) {
            Some(filename) => Command::Thumbnail {
                filename: filename.clone(),
            },
            None => usage_error("thumbnail requires a filename"),
        },
        Some(other) => usage_error(&format!("unknown command: {}", other)),
        None => {
            print_help();
            std::process::exit(2);
        }
    };

    Args {
        config_path,
        verbose,
        command,
    }
}

fn print_help() {
    println!(
        r#"photoo - import photos into a deduplicated library

USAGE:
    photoo [OPTIONS] <COMMAND>

COMMANDS:
    import <folder>             Import every photo under <folder>
    list                        List catalogued photos
    set-date <id> <date>        Change a photo's capture date
    history <id>                Show capture date edits for a photo
    resolve <filename>          Print the library path for a filename
    thumbnail <filename>        Render (or reuse) a cached thumbnail

OPTIONS:
    --config, -c PATH   Path to config file
    --json              Machine-readable output (import, list)
    --verbose, -v       Log to stderr (alias: --stderr)
    --version, -V       Show version
    --help, -h          Show this help message

DATES:
    2024-03-01T10:00:00Z, 2024-03-01T12:00:00+02:00,
    2024-03-01T10:00 (UTC), 2024-03-01 (midnight UTC)

ENVIRONMENT:
    PHOTOO_CONFIG       Path to config file (overrides default location)
    PHOTOO_LOG          Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photoo/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.verbose {
        let _ = logging::init_stderr();
    } else {
        let _ = logging::init(Some(Config::config_dir().join("logs")));
    }

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let library = PhotoLibrary::open(config).context("Failed to open photo library")?;

    match args.command {
        Command::Import { source, json } => run_import(&library, source, json).await?,
        Command::List { json } => {
            let photos = library.get_photos()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&photos)?);
            } else {
                print_photos(&photos);
            }
        }
        Command::SetDate { id, date } => {
            let photo = library.update_photo_date(id, &date)?;
            println!("{}  {}", photo.id, photo.date_taken.to_rfc3339());
        }
        Command::History { id } => {
            for change in library.photo_history(id)? {
                println!(
                    "{}  {} -> {}",
                    change.changed_at.format("%Y-%m-%d %H:%M:%S"),
                    change.old_value,
                    change.new_value
                );
            }
        }
        Command::Resolve { filename } => {
            println!("{}", library.resolve_filename(&filename)?.display());
        }
        Command::Thumbnail { filename } => {
            println!("{}", library.thumbnail(&filename)?.display());
        }
    }

    Ok(())
}

async fn run_import(library: &PhotoLibrary, source: PathBuf, json: bool) -> Result<()> {
    let task = library.spawn_import(&source)?;

    let cancel_flag = task.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling import after the files in progress...");
            cancel_flag.store(true, Ordering::SeqCst);
        }
    });

    let summary = tokio::task::spawn_blocking(move || task.wait(report_progress))
        .await
        .context("Import worker failed")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn report_progress(event: &ImportProgress) {
    match event {
        ImportProgress::Imported { path, photo } => {
            eprintln!("imported {} -> {}", path.display(), photo.filename);
        }
        ImportProgress::Failed { path, reason } => {
            eprintln!("failed   {}: {}", path.display(), reason);
        }
        _ => {}
    }
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Imported: {}  Skipped: {}  Failed: {}",
        summary.imported, summary.skipped, summary.failed
    );
    for failure in &summary.failures {
        println!("  {}: {}", failure.path.display(), failure.reason);
    }
    if summary.cancelled {
        println!("Import was cancelled; run it again to pick up the rest.");
    }
}

fn print_photos(photos: &[Photo]) {
    for photo in photos {
        let location = match photo.location() {
            Some(loc) => format!("{:.5},{:.5}", loc.latitude, loc.longitude),
            None => "-".to_string(),
        };
        let camera = if photo.camera_model.is_empty() {
            "-"
        } else {
            photo.camera_model.as_str()
        };
        println!(
            "{:>6}  {}  {:<40}  {:<20}  {}",
            photo.id,
            photo.date_taken.format("%Y-%m-%d %H:%M:%S"),
            photo.filename,
            camera,
            location
        );
    }
    println!("{} photo(s)", photos.len());
}
