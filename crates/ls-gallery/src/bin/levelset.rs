//! `levelset`: run discrete level-set segmentation on PNG inputs.
//!
//! ```text
//! levelset segment --input cells.png --out out/cells --mu 2 --preserve-topology
//! levelset components --input mask.png --out out/mask --connectivity 8
//! ```
//!
//! Every run writes its images next to a `meta.json` describing the
//! effective configuration and the outcome. Logging goes through
//! `tracing`; set `RUST_LOG` or pass `--verbose`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use ls_core::Raster;
use ls_label::{ComponentConfig, Connectivity, label_components};
use ls_nonpde::{
    BG_PHASE, FittingKind, InitSource, Initialization, SegmentationConfig, Termination, segment,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "levelset")]
#[command(about = "Topology-aware discrete level-set segmentation")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Segment a grayscale image.
    #[command(name = "segment")]
    Segment(SegmentArgs),
    /// Label connected components of a binary image.
    #[command(name = "components")]
    Components(ComponentsArgs),
}

#[derive(Args, Debug, Clone)]
struct SegmentArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// JSON segmentation config; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Initial label image (8- or 16-bit PNG).
    #[arg(long)]
    labels: Option<PathBuf>,
    /// Initial object mask; nonzero pixels are object.
    #[arg(long)]
    binary: Option<PathBuf>,
    /// Pixels that are nonzero here are excluded from segmentation.
    #[arg(long)]
    invalid: Option<PathBuf>,
    #[arg(long)]
    threshold: Option<f32>,
    #[arg(long)]
    lambda_bg: Option<f64>,
    #[arg(long)]
    lambda_fg: Option<f64>,
    #[arg(long)]
    mu: Option<f64>,
    #[arg(long)]
    nu: Option<f64>,
    #[arg(long)]
    gaussian: bool,
    #[arg(long)]
    max_iterations: Option<usize>,
    #[arg(long)]
    preserve_topology: bool,
    #[arg(long)]
    multiphase: bool,
    /// Write a label snapshot every N sweeps (0 keeps only first and last).
    #[arg(long)]
    snapshot_interval: Option<usize>,
    #[arg(long)]
    verify_energy: bool,
}

#[derive(Args, Debug, Clone)]
struct ComponentsArgs {
    #[arg(long, required = true)]
    input: PathBuf,
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// 4 or 8.
    #[arg(long, default_value_t = 4)]
    connectivity: u8,
    #[arg(long, default_value_t = 1)]
    min_component_size: usize,
}

// ── JSON output ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct EnergyTermDto {
    name: &'static str,
    value: f64,
}

#[derive(Debug, Clone, Serialize)]
struct PhaseCountDto {
    label: u16,
    count: usize,
}

#[derive(Debug, Clone, Serialize)]
struct MetaSegment {
    width: usize,
    height: usize,
    init_source: InitSource,
    iterations: usize,
    termination: Termination,
    flips_per_sweep: Vec<usize>,
    initial_energy: f64,
    final_energy: f64,
    energy_terms: Vec<EnergyTermDto>,
    invalid_count: usize,
    phases: Vec<PhaseCountDto>,
    snapshots: Vec<String>,
    config: SegmentationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct ComponentDto {
    label: usize,
    size: usize,
    centroid: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Serialize)]
struct MetaComponents {
    width: usize,
    height: usize,
    connectivity: Connectivity,
    min_component_size: usize,
    pixel_rule: &'static str,
    components: Vec<ComponentDto>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Segment(args) => run_segment(args),
        Command::Components(args) => run_components(args),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .init();
}

fn run_segment(args: SegmentArgs) -> Result<()> {
    let cfg = effective_config(&args)?;
    cfg.validate().context("invalid segmentation config")?;

    let img = load_input_f32(&args.input)?;
    let labels = args.labels.as_deref().map(load_labels).transpose()?;
    let binary = args.binary.as_deref().map(load_mask).transpose()?;
    let invalid = args.invalid.as_deref().map(load_mask).transpose()?;
    for (what, dims) in [
        ("labels", labels.as_ref().map(Raster::dims)),
        ("binary", binary.as_ref().map(Raster::dims)),
        ("invalid", invalid.as_ref().map(Raster::dims)),
    ] {
        if let Some(dims) = dims
            && dims != img.dims()
        {
            bail!(
                "{what} dimensions ({}, {}) do not match input dimensions ({}, {}).",
                dims.0,
                dims.1,
                img.width(),
                img.height()
            );
        }
    }

    let init = Initialization {
        invalid: invalid.as_ref(),
        labels: labels.as_ref(),
        binary: binary.as_ref(),
        regions: None,
    };
    let seg = segment(&img, &init, &cfg)
        .with_context(|| format!("segmenting {}", args.input.display()))?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let final_labels = seg.labels();
    save_labels_u16(args.out.join("labels.png"), &final_labels)?;
    save_u8_image(args.out.join("binary.png"), &seg.membership.to_binary())?;
    save_u8_image(args.out.join("overlay.png"), &seg.overlay(&img))?;

    let mut snapshots = Vec::with_capacity(seg.report.snapshots.len());
    for (i, snap) in seg.report.snapshots.iter().enumerate() {
        let name = format!("snapshot_{i:03}.png");
        save_labels_u16(args.out.join(&name), snap)?;
        snapshots.push(name);
    }

    let phi = &seg.membership;
    let phases = (BG_PHASE..=phi.num_phases())
        .map(|p| PhaseCountDto {
            label: p - BG_PHASE,
            count: phi.count(p),
        })
        .collect();

    write_json(
        args.out.join("meta.json"),
        &MetaSegment {
            width: img.width(),
            height: img.height(),
            init_source: seg.source,
            iterations: seg.report.iterations,
            termination: seg.report.termination,
            flips_per_sweep: seg.report.flips_per_sweep.clone(),
            initial_energy: seg.report.initial_energy,
            final_energy: seg.report.final_energy,
            energy_terms: seg
                .energy_terms
                .iter()
                .map(|&(name, value)| EnergyTermDto { name, value })
                .collect(),
            invalid_count: phi.invalid_count(),
            phases,
            snapshots,
            config: cfg,
        },
    )?;

    info!(
        out = %args.out.display(),
        iterations = seg.report.iterations,
        termination = ?seg.report.termination,
        objects = phi.total_object_count(),
        "segmentation written"
    );
    Ok(())
}

fn run_components(args: ComponentsArgs) -> Result<()> {
    let connectivity = match args.connectivity {
        4 => Connectivity::C4,
        8 => Connectivity::C8,
        other => bail!("connectivity must be 4 or 8, got {other}."),
    };
    let cfg = ComponentConfig {
        connectivity,
        min_component_size: args.min_component_size,
    };

    let mask = load_mask(&args.input)?;
    let labeling = label_components(&mask, &cfg);
    let labels = labels_to_u16(&labeling.labels)?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;
    save_labels_u16(args.out.join("labels.png"), &labels)?;

    let components = labeling
        .regions
        .iter()
        .enumerate()
        .map(|(i, r)| ComponentDto {
            label: i + 1,
            size: r.len(),
            centroid: r.centroid().map(|c| [c[0], c[1]]),
        })
        .collect();
    write_json(
        args.out.join("meta.json"),
        &MetaComponents {
            width: mask.width(),
            height: mask.height(),
            connectivity,
            min_component_size: args.min_component_size,
            pixel_rule: "foreground iff value > 0",
            components,
        },
    )?;

    info!(
        out = %args.out.display(),
        components = labeling.num_components(),
        "components written"
    );
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied.
fn effective_config(args: &SegmentArgs) -> Result<SegmentationConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            ensure_file_exists(path, "config")?;
            let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("parsing json {}", path.display()))?
        }
        None => SegmentationConfig::default(),
    };

    if let Some(t) = args.threshold {
        cfg.threshold = Some(t);
    }
    if let Some(v) = args.lambda_bg {
        cfg.lambda_bg = v;
    }
    if let Some(v) = args.lambda_fg {
        cfg.lambda_fg = v;
    }
    if let Some(v) = args.mu {
        cfg.mu = v;
    }
    if let Some(v) = args.nu {
        cfg.nu = v;
    }
    if let Some(v) = args.max_iterations {
        cfg.max_iterations = v;
    }
    if let Some(v) = args.snapshot_interval {
        cfg.snapshot_interval = v;
    }
    if args.gaussian {
        cfg.fitting = FittingKind::Gaussian;
    }
    cfg.preserve_topology |= args.preserve_topology;
    cfg.multiphase |= args.multiphase;
    cfg.verify_energy |= args.verify_energy;
    Ok(cfg)
}

// ── Image I/O ───────────────────────────────────────────────────────────

fn open_image(path: &Path) -> Result<DynamicImage> {
    ensure_file_exists(path, "image")?;
    image::open(path).with_context(|| format!("opening image {}", path.display()))
}

/// Grayscale intensities; 16-bit inputs keep their full range.
fn load_input_f32(path: &Path) -> Result<Raster<f32>> {
    let (w, h, data): (u32, u32, Vec<f32>) = match open_image(path)? {
        DynamicImage::ImageLuma16(img) => {
            let (w, h) = img.dimensions();
            (w, h, img.into_raw().into_iter().map(f32::from).collect())
        }
        other => {
            let img = other.to_luma8();
            let (w, h) = img.dimensions();
            (w, h, img.into_raw().into_iter().map(f32::from).collect())
        }
    };
    Raster::from_vec_2d(w as usize, h as usize, data)
        .with_context(|| format!("constructing raster from {}", path.display()))
}

fn load_labels(path: &Path) -> Result<Raster<u32>> {
    let img = open_image(path)?.to_luma16();
    let (w, h) = img.dimensions();
    let data = img.into_raw().into_iter().map(u32::from).collect();
    Raster::from_vec_2d(w as usize, h as usize, data)
        .with_context(|| format!("constructing label raster from {}", path.display()))
}

fn load_mask(path: &Path) -> Result<Raster<u8>> {
    let img = open_image(path)?.to_luma8();
    let (w, h) = img.dimensions();
    let data = img.into_raw().into_iter().map(|v| u8::from(v > 0)).collect();
    Raster::from_vec_2d(w as usize, h as usize, data)
        .with_context(|| format!("constructing mask raster from {}", path.display()))
}

/// Narrows component labels for a 16-bit PNG, failing on the first label
/// that does not fit.
fn labels_to_u16(labels: &Raster<u32>) -> Result<Raster<u16>> {
    let data = labels
        .data()
        .iter()
        .map(|&l| {
            u16::try_from(l)
                .with_context(|| format!("component label {l} does not fit a 16-bit label image"))
        })
        .collect::<Result<Vec<u16>>>()?;
    Raster::from_vec(labels.width(), labels.height(), labels.depth(), data)
        .context("constructing 16-bit label raster")
}

fn check_2d<T>(path: &Path, raster: &Raster<T>) -> Result<(u32, u32)> {
    if !raster.is_2d() {
        bail!("cannot write {}: raster has {} slices.", path.display(), raster.depth());
    }
    let w = u32::try_from(raster.width()).context("image width exceeds u32")?;
    let h = u32::try_from(raster.height()).context("image height exceeds u32")?;
    Ok((w, h))
}

fn save_u8_image(path: PathBuf, img: &Raster<u8>) -> Result<()> {
    let (w, h) = check_2d(&path, img)?;
    let gray = GrayImage::from_raw(w, h, img.data().to_vec())
        .context("constructing GrayImage from raw bytes")?;
    gray.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

fn save_labels_u16(path: PathBuf, labels: &Raster<u16>) -> Result<()> {
    let (w, h) = check_2d(&path, labels)?;
    let gray: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(w, h, labels.data().to_vec())
            .context("constructing 16-bit image from labels")?;
    gray.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(&path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn ensure_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} file does not exist: {}", what, path.display());
    }
    if !path.is_file() {
        bail!("{} path is not a file: {}", what, path.display());
    }
    Ok(())
}
