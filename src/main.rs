use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;

use isodrive::config::ConfigStore;
use isodrive::msd::{
    image, MountDecision, MountRequest, MsdController, WindowsRequest, WindowsVersion,
};
use isodrive::otg::MsdBackendType;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// isodrive command line arguments
#[derive(Parser, Debug)]
#[command(name = "isodrive")]
#[command(version, about = "Mount an ISO or disk image as a USB mass storage device", long_about = None)]
struct CliArgs {
    /// Image to expose; without it the current image is unmounted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Mount the file in read-write mode
    #[arg(long)]
    rw: bool,

    /// Present the file as a CD-ROM
    #[arg(long)]
    cdrom: bool,

    /// Present the file as a hard disk, skipping image detection
    #[arg(long, conflicts_with = "cdrom")]
    hdd: bool,

    /// Force Windows installer compatibility mode
    #[arg(long)]
    windows: bool,

    /// Force Windows mode for Windows 10 media
    #[arg(long, conflicts_with = "win11")]
    win10: bool,

    /// Force Windows mode for Windows 11 media
    #[arg(long)]
    win11: bool,

    /// Use USB 3.0 descriptors in Windows mode
    #[arg(long)]
    usb3: bool,

    /// Force the configfs backend
    #[arg(long, conflicts_with = "usbgadget")]
    configfs: bool,

    /// Force the legacy android_usb sysfs backend
    #[arg(long)]
    usbgadget: bool,

    /// Print image detection results as JSON and exit
    #[arg(long, requires = "file")]
    inspect: bool,

    /// Configuration file (default: $ISODRIVE_CONFIG or /etc/isodrive.toml)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

impl CliArgs {
    /// Backend forced on the command line, if any
    fn forced_backend(&self) -> Option<MsdBackendType> {
        if self.configfs {
            Some(MsdBackendType::Configfs)
        } else if self.usbgadget {
            Some(MsdBackendType::AndroidUsb)
        } else {
            None
        }
    }

    fn mount_request(&self) -> MountRequest {
        let version = if self.win10 {
            Some(WindowsVersion::Win10)
        } else if self.win11 {
            Some(WindowsVersion::Win11)
        } else {
            None
        };

        MountRequest {
            cdrom: self.cdrom,
            read_only: !self.rw,
            force_hdd: self.hdd,
            windows: WindowsRequest {
                enabled: self.windows || version.is_some(),
                version,
                use_usb3: self.usb3,
            },
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let level = effective_level(args.log_level, args.verbose, args.quiet);

    // Scoped to this call; nothing is installed process-wide
    tracing::subscriber::with_default(build_subscriber(level), || match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    })
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    if args.inspect {
        if let Some(file) = &args.file {
            return inspect(file);
        }
    }

    if !nix::unistd::Uid::effective().is_root() {
        bail!("Permission denied: isodrive must be run as root");
    }

    let store = ConfigStore::open(args.config.as_deref())?;
    let config = store.get();

    let backend_type = args.forced_backend().unwrap_or(config.backend);
    tracing::debug!("Backend selection: {}", backend_type.name_str());
    if backend_type == MsdBackendType::Auto
        && MsdBackendType::detect(config) == MsdBackendType::Auto
    {
        bail!("Device does not support isodrive");
    }

    let controller = MsdController::new(backend_type.create(config));
    tracing::debug!("Using {} backend", controller.backend_name());

    match &args.file {
        Some(file) => {
            let decision = controller
                .mount(file, &args.mount_request())
                .with_context(|| format!("Failed to mount {}", file.display()))?;
            tracing::info!(
                "{}",
                mount_summary(file, &decision, controller.supports_lun_flags())
            );
        }
        None => {
            controller.unmount().context("Failed to unmount image")?;
        }
    }

    Ok(())
}

/// Result line for a mount; flags are left out where the backend ignores them
fn mount_summary(file: &Path, decision: &MountDecision, lun_flags: bool) -> String {
    if lun_flags {
        format!(
            "Mounted {} (cdrom: {}, ro: {})",
            file.display(),
            decision.is_cdrom(),
            decision.is_read_only()
        )
    } else {
        format!("Mounted {}", file.display())
    }
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    if !file.is_file() {
        bail!("File not found: {}", file.display());
    }
    let info = image::classify(file);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn effective_level(level: LogLevel, verbose_count: u8, quiet: bool) -> LogLevel {
    if quiet {
        return LogLevel::Error;
    }
    // Verbose count overrides log level
    match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

fn build_subscriber(level: LogLevel) -> impl tracing::Subscriber + Send + Sync {
    let filter = match level {
        LogLevel::Error => "isodrive=error",
        LogLevel::Warn => "isodrive=warn",
        LogLevel::Info => "isodrive=info",
        LogLevel::Verbose => "isodrive=debug",
        LogLevel::Debug => "isodrive=debug",
        LogLevel::Trace => "isodrive=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    )
}
