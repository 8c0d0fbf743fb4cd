use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML config file
    #[clap(short, long, default_value = "decormatch.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the catalog index and print a load summary
    Load {
        /// Catalog CSV location (http(s) url or local path)
        #[clap(short = 'C', long)]
        catalog: String,
    },

    /// Match a cropped furniture image against the catalog
    Match {
        /// Catalog CSV location (http(s) url or local path)
        #[clap(short = 'C', long)]
        catalog: String,

        /// Cropped query image
        #[clap(short, long)]
        image: PathBuf,

        /// Detected class label (e.g. "chair", "couch", "dining table")
        #[clap(short = 'l', long)]
        label: String,

        /// Number of matches to return (config default when omitted)
        #[clap(short, long)]
        top_n: Option<usize>,
    },
}
