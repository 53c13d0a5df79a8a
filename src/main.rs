mod checker;
mod commands;
mod config;
mod corpus;
mod diagnostics;
mod error;
mod grammar;
mod hasher;
mod info;
mod logging;
mod manifest;
mod parser;
mod publication;
mod rules;
mod scanner;
mod slug;
mod types;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::Format;

/// Top-level CLI definition.
#[derive(Parser)]
#[command(
    name = "mdcorpus",
    version,
    about = "Content model, topic lookup and link/anchor linting for markdown documentation"
)]
struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Corpus root directory.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Log more (-v info, -vv debug, -vvv trace). `MDCORPUS_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List every anchor of a document as file#anchor
    Anchors {
        /// Document path or topic name.
        file: String,
    },
    /// Lint links, anchors, fences and examples (exit 0 clean, 1 warnings, 2 errors)
    Check {
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Rewrite broken anchors that have exactly one close match
    Fix {
        /// Report what would change without writing files.
        #[arg(long)]
        dry_run: bool,
    },
    /// List topic documents in index order
    Index {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print a complete reference for mdcorpus
    Info {
        /// Output as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
    /// Record the content hash of every document in .mdcorpus.lock
    Publish,
    /// Set a rule's severity in .mdcorpus.toml
    Rule {
        /// Rule name, e.g. `unlisted-document`.
        name: String,
        /// One of off, warn, error.
        severity: String,
    },
    /// Outline a topic document, or print one section with `topic#anchor`
    Show {
        /// Topic name, title or path, optionally followed by `#anchor`.
        topic: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compare every document to the last publish (always exits 0)
    Status,
    /// Run check, then re-run on every markdown or config change
    Watch {
        /// Output format for each check.
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let root = cli.root.as_path();

    let result = match cli.command {
        Commands::Anchors { file } => commands::anchors(root, &file).map(|()| return ExitCode::SUCCESS),
        Commands::Check { format } => commands::check(root, format),
        Commands::Fix { dry_run } => commands::fix(root, dry_run).map(|()| return ExitCode::SUCCESS),
        Commands::Index { json } => commands::index(root, json).map(|()| return ExitCode::SUCCESS),
        Commands::Info { json } => {
            commands::info(root, json);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Publish => commands::publish(root).map(|()| return ExitCode::SUCCESS),
        Commands::Rule { name, severity } => {
            commands::rule(root, &name, &severity).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Show { json, topic } => commands::show(root, &topic, json).map(|()| return ExitCode::SUCCESS),
        Commands::Status => commands::status(root).map(|()| return ExitCode::SUCCESS),
        Commands::Watch { format } => watch::run(root, format),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3)
        },
    };
}
