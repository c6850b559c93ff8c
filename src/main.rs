use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use clickshot::perception::screenshot::ScreenGrabber;
use clickshot::{
    load_config, load_config_from, Button, ClickOptions, ClickshotError, ClickshotResult,
    ConfigFile, Devices, Rect, Region,
};

/// Find reference images on screen and click them.
#[derive(Parser, Debug)]
#[command(name = "clickshot", version)]
struct Args {
    /// Config file (default: clickshot.toml next to the executable, then in the
    /// working directory)
    #[arg(short, long, env = "CLICKSHOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Offer to continue when a reference image is missing
    #[arg(long, global = true)]
    interactive: bool,

    /// Show a seconds counter while searching
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for an element and click it
    Click {
        region: String,
        element: String,

        #[arg(short, long, default_value = "left")]
        button: Button,

        /// Number of clicks
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Seconds to keep searching (default: click_retry_seconds)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Wait until an element is on screen
    Wait {
        region: String,
        element: String,

        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Exit 0 if the element is on screen, 1 otherwise
    Visible {
        region: String,
        element: String,

        #[arg(short, long, default_value_t = 0)]
        timeout: u64,
    },

    /// Save a screenshot, e.g. to cut a new reference image from
    Grab {
        out: PathBuf,

        /// left,top,width,height (default: whole display)
        #[arg(short, long)]
        rect: Option<Rect>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    clickshot::init_tracing("info");

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "clickshot failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> ClickshotResult<ExitCode> {
    let mut file = read_config(args.config.as_deref())?;
    file.settings.interactive |= args.interactive;
    file.settings.log_progress |= args.progress;

    let devices = Devices::system()?;

    match args.command {
        Command::Click {
            region,
            element,
            button,
            count,
            timeout,
        } => {
            let mut region = open_region(&file, &region, devices);
            region.element(&element)?.click(ClickOptions {
                button,
                count,
                timeout: timeout.map(Duration::from_secs),
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Wait {
            region,
            element,
            timeout,
        } => {
            let mut region = open_region(&file, &region, devices);
            region
                .element(&element)?
                .wait_until_visible(timeout.map(Duration::from_secs))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Visible {
            region,
            element,
            timeout,
        } => {
            let mut region = open_region(&file, &region, devices);
            let el = region.element(&element)?;
            if el.is_visible(Duration::from_secs(timeout))? {
                println!("{el} is visible");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{el} is not visible");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Grab { out, rect } => {
            let shot = ScreenGrabber::new(devices.screen.clone()).grab(rect)?;
            let written = shot.save(&out)?;
            println!("{}", written.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_config(path: Option<&std::path::Path>) -> ClickshotResult<ConfigFile> {
    match path {
        Some(path) => load_config_from(path),
        None => match load_config() {
            Ok(file) => Ok(file),
            Err(ClickshotError::Config(reason)) => {
                tracing::warn!(%reason, "using default settings");
                Ok(ConfigFile::default())
            }
            Err(e) => Err(e),
        },
    }
}

fn open_region(file: &ConfigFile, name: &str, devices: Devices) -> Region {
    match file.region(name) {
        Some(config) => Region::from_config(config, &file.settings, devices),
        None => Region::new(name, &file.settings, None, devices),
    }
}
