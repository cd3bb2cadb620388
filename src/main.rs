use clap::{Parser, Subcommand};
use siteport::{config, output, pipeline};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "siteport")]
#[command(about = "Post-processor for statically exported websites")]
#[command(long_about = "\
Post-processor for statically exported websites

Takes the tree a site builder exported and makes it deployable anywhere:
renames builder-marked assets, lower-cases filenames for case-sensitive
hosting, resolves .htaccess virtual URLs to real pages, rewrites every
internal reference to match, and audits what remains.

A fix run is six sequential stages:

  1. Assets   rename marker-named files, delete junk
  2. Scrub    clean robots/readme remnants and the 404 page
  3. Case     lower-case filenames and the references to them
  4. Routes   parse .htaccess rewrite rules
  5. Rewrite  resolve every reference in every text file
  6. Audit    read-only existence check of all links

Every rename is recorded in a rename map dumped as JSON next to the
project root, so each run leaves a reviewable record.

Run 'siteport gen-config' to generate a documented siteport.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Exported site directory
    #[arg(long, default_value = "site", global = true)]
    root: PathBuf,

    /// Directory holding siteport.toml (defaults to the site directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: assets → scrub → case → routes → rewrite → audit
    Fix,
    /// Check all links without modifying anything
    Audit,
    /// Print the parsed routing rules
    Routes,
    /// Print a stock siteport.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_dir = cli.config.as_ref().unwrap_or(&cli.root);

    match cli.command {
        Command::Fix => {
            let config = config::load_config(config_dir)?;
            println!("==> Fixing {}", cli.root.display());
            let stats = pipeline::run_fix(&cli.root, &config)?;
            output::print_fix_output(&stats);
        }
        Command::Audit => {
            let config = config::load_config(config_dir)?;
            println!("==> Auditing {}", cli.root.display());
            let report = pipeline::run_audit(&cli.root, &config)?;
            output::print_audit_output(&report);
        }
        Command::Routes => {
            let table = pipeline::collect_routes(&cli.root)?;
            output::print_routes_output(&table);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
