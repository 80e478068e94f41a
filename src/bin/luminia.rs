//! CLI for Luminia - prompt-to-image studio.

use clap::{Args, Parser, Subcommand, ValueEnum};
use luminia::session::presets::STYLE_PRESETS;
use luminia::{
    select_api_key, AspectRatio, EnvKeySelector, GeminiModel, GeminiProvider, ImageProvider,
    LuminiaError, Session, SimulatedProgress, StaticProgress, SubmitOutcome,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "luminia")]
#[command(about = "Compose prompts and generate images with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gemini model ("flash", "pro" or a full model id)
    #[arg(long, global = true, env = "LUMINIA_MODEL", default_value = "flash")]
    model: String,

    /// Override the API endpoint
    #[arg(long, global = true, env = "LUMINIA_BASE_URL")]
    base_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one image and save it
    Generate(GenerateArgs),

    /// Interactive studio session
    Studio(StudioArgs),

    /// List aspect ratios and style presets
    Presets,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    #[arg(default_value = "")]
    prompt: String,

    /// Aspect ratio
    #[arg(short, long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Reference image to work from (max 5 MB)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Style preset to append (repeatable)
    #[arg(short, long)]
    style: Vec<String>,

    /// Directory the image is saved into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Hide the progress line
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct StudioArgs {
    /// Directory images are saved into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Hide the progress line
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "4:3")]
    Wide,
    #[value(name = "3:4")]
    Tall,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Wide => AspectRatio::Wide,
            AspectRatioArg::Tall => AspectRatio::Tall,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(ref args) => {
            generate(&cli, args).await?;
        }
        Commands::Studio(ref args) => {
            studio(&cli, args).await?;
        }
        Commands::Presets => {
            list_presets(cli.json)?;
        }
    }

    Ok(())
}

fn build_provider(cli: &Cli) -> anyhow::Result<GeminiProvider> {
    let model: GeminiModel = cli.model.parse()?;
    let mut builder = GeminiProvider::builder().model(model);
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    Ok(builder.build()?)
}

async fn generate(cli: &Cli, args: &GenerateArgs) -> anyhow::Result<()> {
    let provider = build_provider(cli)?;
    let session = Session::with_progress(provider, SimulatedProgress::new());

    session.set_prompt(args.prompt.as_str());
    session.set_aspect_ratio(args.aspect_ratio.into());
    for tag in &args.style {
        session.select_style(tag);
    }
    if let Some(ref path) = args.reference {
        session.set_reference_image_file(path).await?;
    }

    let image = match submit_with_progress(&session, !args.quiet && !cli.json).await {
        SubmitOutcome::Generated(image) => image,
        SubmitOutcome::Failed(message) => anyhow::bail!(message),
        SubmitOutcome::Skipped(reason) => return Err(LuminiaError::from(reason).into()),
    };

    let path = session.download(&image, &args.output).await?;

    if cli.json {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": path.display().to_string(),
            "prompt": image.prompt,
            "aspect_ratio": image.aspect_ratio,
            "timestamp": image.timestamp,
            "model": session.provider().model(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({}) via {}",
            path.display(),
            image.aspect_ratio,
            session.provider().model()
        );
    }

    Ok(())
}

/// Awaits a submission, redrawing the progress line on stderr meanwhile.
async fn submit_with_progress<P: ImageProvider>(
    session: &Session<P>,
    show_progress: bool,
) -> SubmitOutcome {
    let submit = session.submit();
    tokio::pin!(submit);
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            outcome = &mut submit => {
                if show_progress {
                    eprintln!("\r{:>3.0}%  {:<40}", session.progress().percent, "DONE");
                }
                return outcome;
            }
            _ = ticker.tick(), if show_progress => {
                if session.is_generating() {
                    let p = session.progress();
                    eprint!("\r{:>3.0}%  {:<40}", p.percent.floor(), p.caption());
                }
            }
        }
    }
}

/// A line of studio input.
#[derive(Debug, PartialEq, Eq)]
enum StudioCommand {
    Prompt(String),
    Generate,
    Ratio(String),
    Style(String),
    Reference(PathBuf),
    ClearReference,
    Reset,
    History,
    Select(usize),
    Save,
    ShowError,
    Dismiss,
    Status,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> StudioCommand {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return StudioCommand::Prompt(line.to_string());
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match (name, arg) {
        ("generate" | "go", _) => StudioCommand::Generate,
        ("ratio", r) if !r.is_empty() => StudioCommand::Ratio(r.to_string()),
        ("style", s) if !s.is_empty() => StudioCommand::Style(s.to_string()),
        ("ref", p) if !p.is_empty() => StudioCommand::Reference(PathBuf::from(p)),
        ("unref", _) => StudioCommand::ClearReference,
        ("reset", _) => StudioCommand::Reset,
        ("history", _) => StudioCommand::History,
        ("select", n) => match n.parse() {
            Ok(n) if n > 0 => StudioCommand::Select(n),
            _ => StudioCommand::Unknown(line.to_string()),
        },
        ("save", _) => StudioCommand::Save,
        ("error", _) => StudioCommand::ShowError,
        ("dismiss", _) => StudioCommand::Dismiss,
        ("status", _) => StudioCommand::Status,
        ("help", _) => StudioCommand::Help,
        ("quit" | "exit", _) => StudioCommand::Quit,
        _ => StudioCommand::Unknown(line.to_string()),
    }
}

const STUDIO_HELP: &str = "\
Type a prompt to set it, then /generate.
  /generate         submit the current prompt
  /ratio R          1:1, 9:16, 16:9, 4:3 or 3:4
  /style TAG        append a style (see `luminia presets`)
  /ref PATH         use an image file as reference (max 5 MB)
  /unref            remove the reference image
  /reset            clear prompt, reference, result and error
  /history          list generated images, newest first
  /select N         show history entry N again
  /save             save the current image
  /error            print the last error verbatim
  /dismiss          clear the last error
  /status           show the current settings
  /quit";

async fn studio(cli: &Cli, args: &StudioArgs) -> anyhow::Result<()> {
    select_api_key(&EnvKeySelector::default(), || {
        println!("API key found.");
    })
    .await?;

    let provider = build_provider(cli)?;
    let session = if args.quiet {
        Session::with_progress(provider, StaticProgress::new())
    } else {
        Session::new(provider)
    };

    println!("Luminia studio ({}). /help for commands.", session.provider().model());
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            StudioCommand::Prompt(prompt) => {
                if !prompt.is_empty() {
                    session.set_prompt(prompt);
                }
            }
            StudioCommand::Generate => {
                match submit_with_progress(&session, !args.quiet).await {
                    SubmitOutcome::Generated(image) => {
                        println!("Generated image #{} ({})", image.timestamp, image.aspect_ratio);
                    }
                    SubmitOutcome::Failed(message) => {
                        println!("Error: {message}  (/error to copy, /dismiss to clear)");
                    }
                    SubmitOutcome::Skipped(reason) => {
                        println!("{}", LuminiaError::from(reason));
                    }
                }
            }
            StudioCommand::Ratio(ratio) => match ratio.parse::<AspectRatio>() {
                Ok(ratio) => session.set_aspect_ratio(ratio),
                Err(e) => println!("{e}"),
            },
            StudioCommand::Style(tag) => {
                if !session.select_style(&tag) {
                    println!("'{tag}' is already in the prompt");
                }
                println!("Prompt: {}", session.prompt());
            }
            StudioCommand::Reference(path) => {
                if let Err(e) = session.set_reference_image_file(&path).await {
                    println!("Error: {e}");
                }
            }
            StudioCommand::ClearReference => session.clear_reference_image(),
            StudioCommand::Reset => session.reset(),
            StudioCommand::History => {
                let history = session.history();
                if history.is_empty() {
                    println!("No images yet.");
                }
                for (i, image) in history.iter().enumerate() {
                    println!("  {:>2}. [{}] {}", i + 1, image.aspect_ratio, image.prompt);
                }
            }
            StudioCommand::Select(n) => {
                let selected = session
                    .history()
                    .get(n - 1)
                    .and_then(|image| session.select_from_history(image.timestamp));
                match selected {
                    Some(image) => println!("Showing #{}: {}", image.timestamp, image.prompt),
                    None => println!("No history entry {n}"),
                }
            }
            StudioCommand::Save => match session.current_result() {
                Some(image) => {
                    let path = session.download(&image, &args.output).await?;
                    println!("Saved {}", path.display());
                }
                None => println!("Nothing to save."),
            },
            StudioCommand::ShowError => match session.error_report() {
                Some(message) => println!("{message}"),
                None => println!("No error."),
            },
            StudioCommand::Dismiss => session.dismiss_error(),
            StudioCommand::Status => {
                let state = session.snapshot();
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                    "prompt": state.prompt,
                    "aspect_ratio": state.aspect_ratio,
                    "reference_image": state.reference_image.as_ref().and_then(|r| r.mime_type()),
                    "current_result": state.current_result.as_ref().map(|r| r.timestamp),
                    "history": state.history.len(),
                    "last_error": state.last_error,
                }))?);
            }
            StudioCommand::Help => println!("{STUDIO_HELP}"),
            StudioCommand::Quit => break,
            StudioCommand::Unknown(input) => println!("Unknown command: {input}"),
        }
    }

    Ok(())
}

fn list_presets(json_output: bool) -> anyhow::Result<()> {
    let ratios: Vec<&str> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();

    if json_output {
        let result = serde_json::json!({
            "aspect_ratios": ratios,
            "styles": STYLE_PRESETS,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("ASPECT RATIOS:");
        println!("  {}", ratios.join("  "));
        println!("\nSTYLES:");
        for style in STYLE_PRESETS {
            println!("  {style}");
        }
    }

    Ok(())
}
