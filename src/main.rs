use clap::{Args, Parser, Subcommand};
use photo_reframe::config::{self, AppConfig};
use photo_reframe::credentials::{self, ApiKeyStore, FileStore, GeminiProbe};
use photo_reframe::formats::{self, FORMATS, FormatSpec, LEGACY_FORMATS};
use photo_reframe::image_ref::ImageRef;
use photo_reframe::imaging::{self, FitResult, HttpFetcher, RustBackend};
use photo_reframe::output::{self, WriteOutcome};
use photo_reframe::session::{Completion, ResultView};
use photo_reframe::slider::{ContainerBox, SliderController, SliderEvent, TrackingHost};
use photo_reframe::upload::{self, WebhookTransport};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let describe = env!("BUILD_GIT_DESCRIBE");
    if describe.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{} ({describe})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "photo-reframe")]
#[command(about = "Reframe photos into social-media formats by cover fitting")]
#[command(long_about = "\
Reframe photos into social-media formats by cover fitting

The source is scaled until it fills the whole target, centered, and the
overhang cropped. Output is always JPEG at the format's exact dimensions.

Sources can be local paths, file:// or http(s):// URLs, or data: URLs.

Formats:
  instagram-3-4        1080x1440
  instagram-4-5        1080x1350
  instagram-square     1080x1080
  instagram-landscape  1080x566
  stories              1080x1920

Run 'photo-reframe gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml and the credentials store
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cover-fit an image into one or more formats
    Fit(FitArgs),
    /// List the available formats
    Formats,
    /// Show source dimensions and the placement for every format
    Inspect {
        /// Image path, URL, or data: URL
        source: String,
    },
    /// Replay scripted events through the comparison slider
    Slide {
        /// Container width in pixels
        #[arg(long)]
        width: f64,
        /// Container left edge in pixels
        #[arg(long, default_value_t = 0.0)]
        left: f64,
        /// Events: start, move:<x>, end, cancel, resize:<width>
        #[arg(required = true)]
        events: Vec<SliderEvent>,
    },
    /// Send a photo to the editing service and save the edited image
    Edit(EditArgs),
    /// Check a file against the upload limits
    Validate {
        file: PathBuf,
        /// MIME type declared by the client
        #[arg(long)]
        mime: Option<String>,
    },
    /// Manage the stored API key
    #[command(subcommand)]
    Key(KeyCommand),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct FitArgs {
    /// Image path, URL, or data: URL
    source: String,

    /// Target format (repeatable)
    #[arg(long = "format", short = 'f', required_unless_present = "all")]
    formats: Vec<String>,

    /// Fit into every format
    #[arg(long, conflicts_with = "formats")]
    all: bool,

    /// Directory for output files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output file when fitting a single format
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct EditArgs {
    /// Photo to send
    file: PathBuf,

    /// MIME type declared by the client
    #[arg(long)]
    mime: Option<String>,

    /// Reformat the edited image into this format before saving
    #[arg(long = "format", short = 'f')]
    format: Option<String>,

    /// Directory for the saved image
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output file (default: <out-dir>/<output.filename>)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Webhook URL, overriding [upload] webhook_url
    #[arg(long)]
    webhook_url: Option<String>,
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Store a key after checking its format
    Set { key: String },
    /// Show the stored key, masked
    Show,
    /// Remove the stored key
    Clear,
    /// Check the stored key
    Check {
        /// Also send a test request to the provider
        #[arg(long)]
        online: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config_dir)?;

    match cli.command {
        Command::Fit(args) => {
            init_thread_pool(&config.processing);
            run_fit(&config, args)?;
        }
        Command::Formats => {
            let legacy = if config.formats.accept_legacy {
                LEGACY_FORMATS
            } else {
                &[]
            };
            output::print_formats_table(FORMATS, legacy);
        }
        Command::Inspect { source } => {
            let image = ImageRef::parse(&source)?;
            let backend = backend(&config)?;
            let dims = imaging::get_dimensions(&backend, &image)?;
            let all: Vec<&'static FormatSpec> = FORMATS.iter().collect();
            let placements = imaging::plan_placements(dims, &all);
            output::print_inspect(&image.to_string(), dims, &placements);
        }
        Command::Slide {
            width,
            left,
            events,
        } => {
            let mut slider =
                SliderController::new(TrackingHost::new(), ContainerBox::new(left, width));
            for event in events {
                let frame = slider.apply(event);
                output::print_slider_frame(&event, &frame);
            }
            log::debug!(
                "slider finished with {} live subscription(s)",
                slider.host().live_subscriptions()
            );
        }
        Command::Edit(args) => run_edit(&config, args)?,
        Command::Validate { file, mime } => {
            let bytes = std::fs::read(&file)?;
            let result = upload::validate_upload(&bytes, mime.as_deref(), &config.upload_config());
            let shown = match &result {
                Ok(mime) => Ok(*mime),
                Err(e) => Err(e.to_string()),
            };
            output::print_upload_result(&file, &shown);
            result?;
        }
        Command::Key(command) => run_key(&config, &cli.config_dir, command)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn backend(config: &AppConfig) -> Result<RustBackend, imaging::FetchError> {
    let fetcher = HttpFetcher::new(config.fetch.timeout(), config.fetch.max_bytes)?;
    Ok(RustBackend::with_fetcher(fetcher))
}

fn run_fit(config: &AppConfig, args: FitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let targets: Vec<&'static FormatSpec> = if args.all {
        FORMATS.iter().collect()
    } else {
        args.formats
            .iter()
            .map(|name| formats::resolve(name, config.formats.accept_legacy))
            .collect::<Result<_, _>>()?
    };

    if args.output.is_some() && targets.len() > 1 {
        return Err("--output only applies to a single format; use --out-dir".into());
    }

    let source = ImageRef::parse(&args.source)?;
    let backend = backend(config)?;
    let fit_config = config.fit_config();

    let results: Vec<(&FormatSpec, WriteOutcome)> = if let [format] = targets.as_slice() {
        let format = *format;
        let path = match &args.output {
            Some(path) => path.clone(),
            None => args.out_dir.join(&config.output.filename),
        };
        let outcome = write_result(imaging::fit(&backend, &source, format, &fit_config), &path);
        vec![(format, outcome)]
    } else {
        imaging::fit_all(&backend, &source, &targets, &fit_config)
            .into_iter()
            .map(|(format, result)| {
                let path = args.out_dir.join(format!("{}.jpg", format.name));
                (format, write_result(result, &path))
            })
            .collect()
    };

    output::print_fit_report(&source.to_string(), &results);

    let failed = results
        .iter()
        .filter(|(_, o)| matches!(o, WriteOutcome::Failed(_)))
        .count();
    if failed > 0 {
        return Err(format!("{failed} of {} formats failed", results.len()).into());
    }
    Ok(())
}

fn write_result(result: imaging::operations::Result<FitResult>, path: &Path) -> WriteOutcome {
    let fitted = match result {
        Ok(fitted) => fitted,
        Err(e) => return WriteOutcome::Failed(e.to_string()),
    };
    match fitted.image.bytes() {
        Some(bytes) => write_bytes(bytes, path),
        None => WriteOutcome::Failed("fit produced no inline image".to_string()),
    }
}

fn write_bytes(bytes: &[u8], path: &Path) -> WriteOutcome {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return WriteOutcome::Failed(e.to_string());
    }
    match std::fs::write(path, bytes) {
        Ok(()) => WriteOutcome::Written {
            path: path.to_path_buf(),
            bytes: bytes.len(),
        },
        Err(e) => WriteOutcome::Failed(e.to_string()),
    }
}

fn run_edit(config: &AppConfig, args: EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the format first so a typo fails before anything is uploaded.
    let format = args
        .format
        .as_deref()
        .map(|name| formats::resolve(name, config.formats.accept_legacy))
        .transpose()?;

    let bytes = std::fs::read(&args.file)?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    let url = args.webhook_url.as_deref().unwrap_or(&config.upload.webhook_url);
    let transport = WebhookTransport::new(url, config.upload.timeout())?;
    let result = upload::send_for_edit(
        &transport,
        &file_name,
        &bytes,
        args.mime.as_deref(),
        &config.upload_config(),
    )?;

    let mut view = ResultView::new(result);
    if let Some(format) = format {
        let backend = backend(config)?;
        let ticket = view.request();
        let fitted = imaging::fit(&backend, view.source(), format, &config.fit_config());
        if let Completion::Failed(message) = view.complete(ticket, fitted) {
            return Err(message.into());
        }
    }

    let path = args
        .output
        .unwrap_or_else(|| args.out_dir.join(&config.output.filename));
    let saved = view.edited().bytes().map(|bytes| write_bytes(bytes, &path));
    output::print_edit_result(view.original(), view.edited(), saved.as_ref());
    if let Some(WriteOutcome::Failed(reason)) = saved {
        return Err(reason.into());
    }
    Ok(())
}

fn run_key(
    config: &AppConfig,
    config_dir: &Path,
    command: KeyCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut keys = ApiKeyStore::new(FileStore::new(config.credentials_path(config_dir)));

    match command {
        KeyCommand::Set { key } => {
            credentials::validate_key_format(&key)?;
            keys.save(&key)?;
            println!("API key saved");
        }
        KeyCommand::Show => match keys.get()? {
            Some(key) => println!("{}", output::mask_key(&key)),
            None => println!("No API key stored"),
        },
        KeyCommand::Clear => {
            keys.clear()?;
            println!("API key removed");
        }
        KeyCommand::Check { online } => {
            let key = keys.get()?.ok_or("No API key stored")?;
            credentials::validate_key_format(&key)?;
            println!("API key format looks valid");
            if online {
                let probe = GeminiProbe::new(&config.credentials.endpoint, config.fetch.timeout())?;
                let check = credentials::check_key(&probe, &key);
                output::print_key_check(&check);
                if !check.is_valid() {
                    return Err("API key check failed".into());
                }
            }
        }
    }
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
