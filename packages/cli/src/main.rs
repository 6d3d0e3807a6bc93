#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Publishes a generated site directory with a registered deployer.
//!
//! ```text
//! site-deploy deploy ./public --config deploy.toml
//! site-deploy deploy ./public --param BucketName=site-bucket --param Region=us-east-1 --yes
//! site-deploy deployers [--json]
//! ```
//!
//! Deployer fields come from the config file's `[params]` table,
//! `SITE_DEPLOY_<FIELD>` environment variables and `--param` flags, in
//! increasing precedence.
//!
//! Uses `indicatif-log-bridge` (via [`site_deploy_cli_utils::init_logger`])
//! so log lines and the upload progress bar share the terminal.

mod config;
mod deploy;
mod registry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use site_deploy::DeployerDefinition;

#[derive(Parser)]
#[command(name = "site-deploy", about = "Publish a generated site to remote storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a site directory
    Deploy {
        /// Directory to publish
        root: PathBuf,
        /// Deployer id (see `site-deploy deployers`)
        #[arg(long)]
        deployer: Option<String>,
        /// TOML file with `deployer` and a `[params]` table
        #[arg(long)]
        config: Option<PathBuf>,
        /// Deployer field as KEY=VALUE; repeatable
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Do not ask before deleting existing content
        #[arg(long, short)]
        yes: bool,
    },
    /// List available deployers and their fields
    Deployers {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = site_deploy_cli_utils::init_logger();
    let cli = Cli::parse();
    let registry = registry::builtin();

    match cli.command {
        Commands::Deploy {
            root,
            deployer,
            config,
            params,
            yes,
        } => {
            let args = deploy::DeployArgs {
                root,
                deployer,
                config,
                params,
                yes,
            };
            let published = deploy::run(args, &registry, &multi).await?;
            Ok(if published {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Deployers { json } => {
            let definitions = registry.definitions();
            if json {
                println!("{}", serde_json::to_string_pretty(&definitions)?);
            } else {
                print!("{}", describe(&definitions));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Renders deployer definitions as a human-readable listing.
fn describe(definitions: &[&DeployerDefinition]) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    for definition in definitions {
        let _ = writeln!(out, "{} ({})", definition.id, definition.name);
        let _ = writeln!(out, "  {}", definition.help);
        for field in definition.fields {
            let mut tags = Vec::new();
            if field.required {
                tags.push("required");
            }
            if field.secret {
                tags.push("secret");
            }
            if field.destructive {
                tags.push("destructive");
            }
            let env = config::env_var_name(field.name);
            if tags.is_empty() {
                let _ = writeln!(out, "    {:<12} ${env}", field.name);
            } else {
                let _ = writeln!(out, "    {:<12} ${env} [{}]", field.name, tags.join(", "));
            }
        }
    }
    out
}
