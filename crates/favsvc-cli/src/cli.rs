use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use favsvc_core::cache::DiskCache;
use favsvc_core::config;
use favsvc_core::resolve::{Conditional, DefaultIcon, Resolver};

/// Top-level CLI for the favsvc favicon resolution service.
#[derive(Debug, Parser)]
#[command(name = "favsvc")]
#[command(about = "favsvc: favicon resolution service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve the best icon for a page URL (cache-aware) and write it out.
    Resolve {
        /// Page URL; the scheme may be omitted.
        url: String,

        /// File to write the icon bytes to; defaults to stdout summary only.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove the cached icon for a host.
    Purge {
        /// Host exactly as it appears in resolved URLs (e.g. www.example.com).
        host: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Resolve { url, out } => {
                let default_icon = DefaultIcon::load(&cfg)?;
                let resolver = Resolver::new(cfg, default_icon)?;
                let res = resolver.respond(Some(&url), Conditional::default()).await;
                if res.status != 200 {
                    bail!("resolution returned status {}", res.status);
                }
                let content_type = res.content_type.as_deref().unwrap_or("unknown");
                match out {
                    Some(path) => {
                        std::fs::write(&path, &res.body)
                            .with_context(|| format!("cannot write {}", path.display()))?;
                        println!(
                            "wrote {} bytes ({}) to {}",
                            res.content_length,
                            content_type,
                            path.display()
                        );
                    }
                    None => {
                        println!("{} bytes ({})", res.content_length, content_type);
                    }
                }
            }
            CliCommand::Purge { host } => {
                let cache = DiskCache::new(&cfg.cache_dir, &cfg.etag_salt);
                if cache.remove(&host)? {
                    println!("removed cached icon for {}", host);
                } else {
                    println!("no cached icon for {}", host);
                }
            }
        }

        Ok(())
    }
}
