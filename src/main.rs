use anyhow::Context;
use clap::Parser;
use serde_json::json;

use decormatch::config::Config;
use decormatch::similarity::{canonical_category, SimilarityService};

mod cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();
    let config = Config::load_or_default(&args.config);

    match args.command {
        cli::Command::Load { catalog } => {
            let service = SimilarityService::new(config.matcher)
                .context("failed to initialize similarity service")?;
            let report = service.load(&catalog)?;

            let index = service.current();
            let categories: Vec<_> = index
                .categories()
                .into_iter()
                .map(|(category, count)| json!({ "category": category, "count": count }))
                .collect();

            let summary = json!({
                "rows": report.rows,
                "indexed": report.indexed,
                "skipped": report.skipped,
                "categories": categories,
            });
            println!("{}", serde_json::to_string_pretty(&summary).unwrap());
            Ok(())
        }

        cli::Command::Match {
            catalog,
            image,
            label,
            top_n,
        } => {
            let top_n = top_n.unwrap_or(config.matcher.default_top_n);
            let service = SimilarityService::new(config.matcher)
                .context("failed to initialize similarity service")?;

            // Startup-style load: a failed load leaves an empty index and the
            // match below reports no results instead of aborting
            if let Err(err) = service.load(&catalog) {
                tracing::error!("catalog load failed: {}", err);
            }

            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read {}", image.display()))?;

            // Detector vocabulary -> catalog vocabulary ("couch" -> "sofa")
            let category = canonical_category(&label);
            let results = service.find_similar_items_bytes(&bytes, &category, top_n)?;

            println!("{}", serde_json::to_string_pretty(&results).unwrap());
            Ok(())
        }
    }
}
