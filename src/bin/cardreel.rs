use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use cardreel::pipeline::{GenerateRequest, RendererKind, generate};
use cardreel::render_cpu::{CardRenderer, CpuCardRenderer};
use cardreel::render_html::HtmlCardRenderer;
use cardreel::store::EntryStore;
use cardreel::text::TextEngine;
use cardreel::{DecisionCard, Rgba8};

#[derive(Parser, Debug)]
#[command(name = "cardreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one choice card as a PNG.
    Card(CardArgs),
    /// Generate the full decision video (requires `ffmpeg` on PATH).
    Generate(GenerateArgs),
    /// Save a card JSON into the entry store.
    Save(SaveArgs),
    /// List stored entry titles.
    List(ListArgs),
}

#[derive(Parser, Debug)]
struct CardArgs {
    /// Input decision card JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Choice index to highlight (0-based).
    #[arg(long, default_value_t = 0)]
    choice: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Font file to use (otherwise CARDREEL_FONT or a system font).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Use the HTML-to-image fallback renderer.
    #[arg(long, default_value_t = false)]
    html: bool,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Input decision card JSON.
    #[arg(long = "in")]
    in_path: Option<PathBuf>,

    /// Load the card from the entry store by title instead.
    #[arg(long, conflicts_with = "in_path")]
    entry: Option<String>,

    /// Entry store path.
    #[arg(long, default_value = cardreel::store::DEFAULT_STORE_FILE)]
    store: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Caption shown for the whole video.
    #[arg(long)]
    caption: Option<String>,

    /// Background audio file (looped or trimmed to fit).
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Background video file (cover-cropped, looped).
    #[arg(long)]
    bg_video: Option<PathBuf>,

    /// Seconds each card stays on screen.
    #[arg(long, default_value_t = cardreel::assemble::DEFAULT_DURATION_PER_CARD)]
    duration: f64,

    /// Font file to use (otherwise CARDREEL_FONT or a system font).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Use the HTML-to-image fallback renderer for the cards.
    #[arg(long, default_value_t = false)]
    html: bool,

    /// Also save the card into the entry store.
    #[arg(long, default_value_t = false)]
    save: bool,
}

#[derive(Parser, Debug)]
struct SaveArgs {
    /// Input decision card JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Entry store path.
    #[arg(long, default_value = cardreel::store::DEFAULT_STORE_FILE)]
    store: PathBuf,
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Entry store path.
    #[arg(long, default_value = cardreel::store::DEFAULT_STORE_FILE)]
    store: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Card(args) => cmd_card(args),
        Command::Generate(args) => cmd_generate(args),
        Command::Save(args) => cmd_save(args),
        Command::List(args) => cmd_list(args),
    }
}

fn load_card(path: &PathBuf) -> anyhow::Result<DecisionCard> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read card json '{}'", path.display()))?;
    let card: DecisionCard = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse card json '{}'", path.display()))?;
    Ok(card)
}

fn cmd_card(args: CardArgs) -> anyhow::Result<()> {
    let card = load_card(&args.in_path)?;
    card.validate()?;

    let mut renderer: Box<dyn CardRenderer> = if args.html {
        Box::new(HtmlCardRenderer::new(None))
    } else {
        Box::new(CpuCardRenderer::new(TextEngine::from_system_font(
            args.font.as_deref(),
        )?))
    };
    let rendered = renderer.render(&card, args.choice)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &rendered.rgba8_premul,
        rendered.width,
        rendered.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let card = match (&args.in_path, &args.entry) {
        (Some(path), _) => load_card(path)?,
        (None, Some(title)) => {
            let store = EntryStore::load(&args.store)?;
            store
                .get(title)
                .cloned()
                .with_context(|| format!("no stored entry titled '{title}'"))?
        }
        (None, None) => anyhow::bail!("pass --in <card.json> or --entry <title>"),
    };

    if args.save {
        let mut store = EntryStore::load(&args.store)?;
        store.save_entry(card.clone())?;
    }

    let request = GenerateRequest {
        card,
        caption: args.caption,
        audio_path: args.audio,
        bg_video_path: args.bg_video,
        bg_color: Rgba8::BLACK,
        duration_per_card: args.duration,
        out_path: args.out.clone(),
        font: args.font,
        renderer: if args.html {
            RendererKind::Html
        } else {
            RendererKind::Cpu
        },
    };
    generate(&request)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_save(args: SaveArgs) -> anyhow::Result<()> {
    let card = load_card(&args.in_path)?;
    card.validate()?;
    let title = card.title.clone();
    let mut store = EntryStore::load(&args.store)?;
    store.save_entry(card)?;
    eprintln!("saved '{title}' to {}", args.store.display());
    Ok(())
}

fn cmd_list(args: ListArgs) -> anyhow::Result<()> {
    let store = EntryStore::load(&args.store)?;
    for title in store.titles() {
        println!("{title}");
    }
    Ok(())
}
