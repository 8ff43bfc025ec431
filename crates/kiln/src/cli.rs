use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "kiln", version, about = "Build container images without a daemon")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Engine configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build an image from a Dockerfile and a context
    Build(BuildArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Build context directory, or `-` to read it from stdin
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Name of the Dockerfile (default is 'PATH/Dockerfile'), `-` reads stdin
    #[arg(short, long, value_name = "FILE", default_value = "")]
    pub file: String,

    /// Name and optionally a tag in the 'name:tag' format
    #[arg(short, long = "tag", value_name = "NAME")]
    pub tags: Vec<String>,

    /// Set the target build stage
    #[arg(long)]
    pub target: Option<String>,

    /// Target platform, e.g. linux/arm64 (repeatable)
    #[arg(long = "platform", value_name = "PLATFORM")]
    pub platforms: Vec<String>,

    /// Build-time variable (KEY=VALUE)
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// Image metadata label (KEY=VALUE)
    #[arg(long = "label", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,

    /// Do not use cache when building the image
    #[arg(long)]
    pub no_cache: bool,
}
