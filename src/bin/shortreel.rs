use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "shortreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every block in a script document (requires `ffmpeg` on PATH for MP4 output).
    Compose(ComposeArgs),
    /// Render a single frame of one block as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Output format per block.
    #[arg(long, value_enum, default_value_t = EmitChoice::Mp4)]
    emit: EmitChoice,

    /// Base seed for reproducible music selection (block i uses seed + i).
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Overwrite existing output files.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// 0-based index of the block within the script document.
    #[arg(long, default_value_t = 0)]
    block: usize,

    /// Timestamp in seconds to composite.
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Base seed for music selection (matches compose for reproducibility).
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Parser, Debug)]
struct InputArgs {
    /// Input script document (plain text or JSON).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Regular-weight TTF/OTF font file.
    #[arg(long)]
    font: PathBuf,

    /// Bold-weight TTF/OTF font file (defaults to the regular font).
    #[arg(long)]
    font_bold: Option<PathBuf>,

    /// Directory holding referenced images.
    #[arg(long, default_value = "images")]
    images: PathBuf,

    /// Directory holding background music, one subdirectory per category.
    #[arg(long, default_value = "music")]
    music: PathBuf,

    /// Optional render configuration JSON (missing fields keep their defaults).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmitChoice {
    Mp4,
    Manifest,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

struct LoadedInputs {
    blocks: Vec<shortreel::ShortreelResult<shortreel::ContentBlock>>,
    cfg: shortreel::RenderConfig,
    fonts: shortreel::FontSet,
    library: shortreel::AssetLibrary,
}

fn load_inputs(args: &InputArgs) -> anyhow::Result<LoadedInputs> {
    let text = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read script '{}'", args.in_path.display()))?;
    let blocks = if text.trim_start().starts_with(['{', '[']) {
        shortreel::script::parse_json(&text)?
    } else {
        shortreel::parse_document(&text)
    };
    if blocks.is_empty() {
        anyhow::bail!("script '{}' contains no blocks", args.in_path.display());
    }

    let cfg = match &args.config {
        Some(path) => read_config_json(path)?,
        None => shortreel::RenderConfig::default(),
    };
    cfg.validate()?;

    let bold = args.font_bold.as_deref().unwrap_or(&args.font);
    let fonts = shortreel::FontSet::load(&args.font, bold)?;
    let library = shortreel::AssetLibrary::new(&args.images, &args.music);

    Ok(LoadedInputs {
        blocks,
        cfg,
        fonts,
        library,
    })
}

fn read_config_json(path: &Path) -> anyhow::Result<shortreel::RenderConfig> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let r = BufReader::new(f);
    let cfg: shortreel::RenderConfig =
        serde_json::from_reader(r).with_context(|| "parse render config JSON")?;
    Ok(cfg)
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let inputs = load_inputs(&args.inputs)?;

    let opts = shortreel::BatchOptions {
        out_dir: args.out,
        emit: match args.emit {
            EmitChoice::Mp4 => shortreel::EmitMode::Mp4,
            EmitChoice::Manifest => shortreel::EmitMode::Manifest,
        },
        base_seed: args.seed,
        overwrite: args.overwrite,
    };

    let report = shortreel::run_batch(
        inputs.blocks,
        &inputs.cfg,
        &inputs.fonts,
        &inputs.library,
        &opts,
    )?;

    eprintln!(
        "rendered {}/{} blocks into {}",
        report.succeeded,
        report.total,
        opts.out_dir.display()
    );
    for failure in &report.failures {
        eprintln!("  block {} ({}): {}", failure.index, failure.title, failure.error);
    }

    if report.all_succeeded() {
        Ok(())
    } else {
        anyhow::bail!("{} block(s) failed", report.failures.len());
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let inputs = load_inputs(&args.inputs)?;

    let block = inputs
        .blocks
        .into_iter()
        .nth(args.block)
        .with_context(|| format!("script has no block at index {}", args.block))?
        .with_context(|| format!("block {} failed to parse", args.block))?;

    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(args.block as u64));
    let timeline = shortreel::compose_block(
        &block,
        &inputs.cfg,
        &inputs.fonts,
        &inputs.library,
        &mut rng,
    )?;
    let frame = shortreel::render_frame(&timeline, args.at)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
