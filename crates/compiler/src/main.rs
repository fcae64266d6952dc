//! Structured Text compiler CLI
//!
//! Command-line interface for compiling .st programs to ladder IR JSON
//! and running validation checks.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use rungc::diagnostics::format_diagnostics;
use rungc::{transform, TransformOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "rungc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Structured Text compiler - lower .st programs to ladder IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .st file to ladder IR JSON
    Build {
        /// Input .st source file
        input: PathBuf,

        /// Output JSON path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include the parsed AST in the JSON output
        #[arg(long)]
        intermediates: bool,
    },

    /// Run validation checks on .st files
    Check {
        /// Input .st files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only show errors (not warnings)
        #[arg(long)]
        errors_only: bool,

        /// Treat warnings as errors (exit with failure if any warnings)
        #[arg(long)]
        deny_warnings: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            intermediates,
        } => {
            run_build(&input, output.as_deref(), intermediates);
        }
        Commands::Check {
            paths,
            errors_only,
            deny_warnings,
        } => {
            run_check(&paths, errors_only, deny_warnings);
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "rungc", &mut io::stdout());
}

fn run_build(input: &Path, output: Option<&Path>, intermediates: bool) {
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            process::exit(1);
        }
    };

    let options = TransformOptions {
        include_intermediates: intermediates,
        ..Default::default()
    };
    let result = transform(&source, &options);

    let name = input.display().to_string();
    eprint!("{}", format_diagnostics(Some(&name), &result.errors));
    eprint!("{}", format_diagnostics(Some(&name), &result.warnings));

    let json = match serde_json::to_string_pretty(&result) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serialising ladder IR: {}", e);
            process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, json) {
                eprintln!("Error writing {}: {}", path.display(), e);
                process::exit(1);
            }
            eprintln!(
                "Compiled {} -> {} ({} rungs)",
                input.display(),
                path.display(),
                result.rungs.len()
            );
        }
        None => println!("{}", json),
    }

    if !result.success {
        process::exit(1);
    }
}

fn run_check(paths: &[PathBuf], errors_only: bool, deny_warnings: bool) {
    let mut files_checked = 0;
    let mut error_count = 0;
    let mut warning_count = 0;

    for path in paths {
        if path.is_dir() {
            for entry in walkdir(path) {
                if entry.extension().is_some_and(|e| e == "st") {
                    check_file(&entry, errors_only, &mut error_count, &mut warning_count);
                    files_checked += 1;
                }
            }
        } else if path.exists() {
            check_file(path, errors_only, &mut error_count, &mut warning_count);
            files_checked += 1;
        } else {
            eprintln!("Warning: {} does not exist", path.display());
        }
    }

    if error_count == 0 && warning_count == 0 {
        println!("No issues found in {} file(s)", files_checked);
    } else {
        println!(
            "\n{} error(s), {} warning(s) in {} file(s)",
            error_count, warning_count, files_checked
        );
    }

    if error_count > 0 || (deny_warnings && warning_count > 0) {
        process::exit(1);
    }
}

fn check_file(path: &Path, errors_only: bool, error_count: &mut usize, warning_count: &mut usize) {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            return;
        }
    };

    let result = transform(&source, &TransformOptions::default());
    let name = path.display().to_string();

    print!("{}", format_diagnostics(Some(&name), &result.errors));
    *error_count += result.errors.len();

    if !errors_only {
        print!("{}", format_diagnostics(Some(&name), &result.warnings));
    }
    *warning_count += result.warnings.len();
}

/// Simple recursive directory walker with error logging
fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if path.is_dir() {
                            files.extend(walkdir(&path));
                        } else {
                            files.push(path);
                        }
                    }
                    Err(e) => {
                        eprintln!(
                            "Warning: Could not read directory entry in {}: {}",
                            dir.display(),
                            e
                        );
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("Warning: Could not read directory {}: {}", dir.display(), e);
        }
    }
    files
}
