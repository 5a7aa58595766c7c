use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use pagestore::{Document, Shell, StoreConfig};

/// Interactive shell over paged, disk-backed sample stores
#[derive(Debug, Parser)]
#[command(name = "pagestore", version, about)]
struct Args {
    /// JSON store configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of in-memory frames per store
    #[arg(long)]
    frames: Option<usize>,

    /// Maximum page size in bytes
    #[arg(long)]
    page_size: Option<usize>,

    /// Directory for page backing files
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Number of channels in the document
    #[arg(short = 'n', long, default_value_t = 1)]
    channels: usize,

    /// Run the commands in this file instead of starting the shell
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Run these commands instead of starting the shell
    #[arg(short, long)]
    execute: Option<String>,
}

fn load_config(args: &Args) -> Result<StoreConfig, String> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => StoreConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.frame_count = frames;
    }
    if let Some(page_size) = args.page_size {
        config.max_page_size = page_size;
    }
    if let Some(temp_dir) = &args.temp_dir {
        config.temp_dir = Some(temp_dir.clone());
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Run each line; stops at the first failing line
fn run_batch<'a>(shell: &mut Shell, lines: impl Iterator<Item = &'a str>) -> ExitCode {
    for line in lines {
        match shell.run_line(line) {
            Ok(output) => output.iter().for_each(|text| println!("{}", text)),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        if shell.is_finished() {
            break;
        }
    }
    ExitCode::SUCCESS
}

fn run_repl(shell: &mut Shell) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error: cannot start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("pagestore shell, type `help` for commands");
    while !shell.is_finished() {
        match editor.readline("pagestore> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                match shell.run_line(&line) {
                    Ok(output) => output.iter().for_each(|text| println!("{}", text)),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let document = match Document::new(args.channels, config) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!("opened document with {} channels", document.channel_count());
    let mut shell = Shell::new(document);

    if let Some(commands) = &args.execute {
        return run_batch(&mut shell, std::iter::once(commands.as_str()));
    }
    if let Some(path) = &args.script {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error: cannot read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        return run_batch(&mut shell, content.lines().filter(|l| !l.trim().is_empty()));
    }
    run_repl(&mut shell)
}
