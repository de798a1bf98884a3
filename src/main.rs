use clap::{Parser, ValueEnum};
use log::{error, info};
use pagechain::{ChainBuilder, ChainConfig, ChainOutput, DeviceKind, DisplayList, ObjectKinds, PipelineError};
use std::path::{Path, PathBuf};

// Chains allocate and free many small buffers per page.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Omit {
    Vector,
    Image,
    Text,
}

/// Replays JSON display lists through a device chain.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Display lists to render, one chain each
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Chain configuration (JSON); flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First page to keep, zero-based
    #[arg(long)]
    first_page: Option<i32>,

    /// Last page to keep, zero-based and inclusive; 0 keeps the rest
    #[arg(long, requires = "first_page")]
    last_page: Option<i32>,

    /// Terminal device
    #[arg(short, long, value_parser = parse_device)]
    device: Option<DeviceKind>,

    /// Object kinds to drop
    #[arg(long, value_enum)]
    filter: Vec<Omit>,

    /// Output path; with several inputs, each input's stem is appended
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_device(value: &str) -> Result<DeviceKind, String> {
    match value {
        "raster" => Ok(DeviceKind::Raster),
        "pdf" | "pdfwrite" => Ok(DeviceKind::Pdf),
        other => Err(format!("unknown device '{other}', expected raster or pdf")),
    }
}

impl Args {
    fn chain_config(&self) -> Result<ChainConfig, PipelineError> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_file(path)?,
            None => ChainConfig::default(),
        };
        if let Some(first) = self.first_page {
            config.pages = Some(pagechain::PageSpan { first, last: self.last_page.unwrap_or(0) });
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if !self.filter.is_empty() {
            config.filter = ObjectKinds {
                vector: self.filter.contains(&Omit::Vector),
                image: self.filter.contains(&Omit::Image),
                text: self.filter.contains(&Omit::Text),
            };
        }
        Ok(config)
    }

    fn output_for(&self, input: &Path, config: &ChainConfig) -> Option<PathBuf> {
        let output = self.output.clone().or_else(|| config.output.clone())?;
        if self.inputs.len() < 2 {
            return Some(output);
        }
        let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let name = output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Some(output.with_file_name(format!("{stem}-{name}")))
    }
}

fn render(args: &Args, config: &ChainConfig, input: &Path) -> Result<(), PipelineError> {
    let list = DisplayList::from_file(input)?;
    let mut config = config.clone();
    config.output = args.output_for(input, &config);
    let output_path = config.output.clone();

    let mut chain = ChainBuilder::new().with_config(config).build()?;
    chain.replay(&list)?;
    match chain.finish()? {
        ChainOutput::Pdf(Some(bytes)) => {
            let path = input.with_extension("pdf");
            std::fs::write(&path, bytes)?;
            info!("{} -> {}", input.display(), path.display());
        }
        ChainOutput::Raster(pages) if output_path.is_none() => {
            info!("{} rendered {} pages (not written; pass --output)", input.display(), pages.len());
        }
        _ => {
            if let Some(path) = output_path {
                info!("{} -> {}", input.display(), path.display());
            }
        }
    }
    Ok(())
}

#[cfg(feature = "rayon-executor")]
fn render_all(args: &Args, config: &ChainConfig) -> Vec<Result<(), PipelineError>> {
    use rayon::prelude::*;
    args.inputs.par_iter().map(|input| render(args, config, input)).collect()
}

#[cfg(not(feature = "rayon-executor"))]
fn render_all(args: &Args, config: &ChainConfig) -> Vec<Result<(), PipelineError>> {
    args.inputs.iter().map(|input| render(args, config, input)).collect()
}

fn main() -> Result<(), PipelineError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.chain_config()?;

    let mut failed = 0;
    for (input, result) in args.inputs.iter().zip(render_all(&args, &config)) {
        if let Err(err) = result {
            error!("{}: {err}", input.display());
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(PipelineError::Config(format!("{failed} of {} inputs failed", args.inputs.len())));
    }
    Ok(())
}
