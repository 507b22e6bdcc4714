use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use tubepod::acquire::{DEFAULT_BITRATE, DEFAULT_TRANSCODE_TIMEOUT};
use tubepod::source::DEFAULT_METADATA_TIMEOUT;
use tubepod::{
    AcquireOptions, DEFAULT_CHANNELS_FILE, FfmpegTranscoder, LocalStore, NoopReporter,
    ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter, SyncOptions,
    YtDlpSource, load_channels, run,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static CONVERT: Emoji<'_, '_> = Emoji("🔊 ", "[>] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WAITING: Emoji<'_, '_> = Emoji("⏳ ", "[.] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Archive video channels as podcast feeds
#[derive(Parser, Debug)]
#[command(name = "tubepod")]
#[command(about = "Archive video channels as audio podcasts")]
#[command(version)]
struct Args {
    /// Channel list (YAML)
    #[arg(default_value = DEFAULT_CHANNELS_FILE)]
    channels: PathBuf,

    /// Directory for audio files, record files and feeds
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Maximum number of episodes processed at once
    #[arg(short = 'c', long, default_value = "3")]
    concurrent: usize,

    /// Audio bitrate of converted episodes
    #[arg(short, long, default_value = DEFAULT_BITRATE)]
    bitrate: String,

    /// Smallest converted file accepted as a complete episode
    #[arg(long, default_value_t = tubepod::acquire::DEFAULT_MIN_AUDIO_BYTES)]
    min_audio_bytes: u64,

    /// Do not write podcast feeds
    #[arg(long)]
    no_publish: bool,

    /// Keep downloaded video after conversion
    #[arg(long)]
    keep_intermediate: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<usize, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_or_create_bar(&self, download_id: usize) -> ProgressBar {
        let mut bars = self.bars();

        if let Some(bar) = bars.get(&download_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(download_id, bar.clone());
        bar
    }

    fn finish_bar(&self, download_id: usize) {
        if let Some(bar) = self.bars().remove(&download_id) {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingChannel { channel } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching channel: {}", channel.cyan()));
            }

            ProgressEvent::ChannelReconciled {
                channel,
                stored_episodes,
                remote_episodes,
                merged_episodes,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} stored, {} in feed, {} to check",
                    channel.bold().green(),
                    stored_episodes.to_string().cyan(),
                    remote_episodes.to_string().cyan(),
                    merged_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.main_bar
                    .println(format!("  Removed {count} leftover file(s)").dimmed().to_string());
            }

            ProgressEvent::EpisodeDeferred { episode_title } => {
                self.main_bar.println(format!(
                    "  {WAITING}{} {}",
                    truncate_title(&episode_title, 40).yellow(),
                    "(not live yet)".dimmed()
                ));
            }

            ProgressEvent::DownloadStarting {
                download_id,
                episode_title,
                episode_index,
                total_episodes,
                content_length,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total_episodes.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                download_id,
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                let bar = self.get_or_create_bar(download_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadRetrying {
                download_id,
                episode_title,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_message(format!(
                    "{} {}",
                    truncate_title(&episode_title, 40),
                    "(retrying)".yellow()
                ));
            }

            ProgressEvent::ConversionStarting {
                download_id,
                episode_title,
                attempt,
            } => {
                let bar = self.get_or_create_bar(download_id);
                let suffix = if attempt > 1 {
                    format!(" (attempt {attempt})")
                } else {
                    String::new()
                };
                bar.set_message(format!(
                    "{CONVERT}{}{}",
                    truncate_title(&episode_title, 40),
                    suffix.yellow()
                ));
            }

            ProgressEvent::EpisodeCompleted {
                download_id,
                episode_title,
                ..
            } => {
                self.main_bar.println(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&episode_title, 60).green()
                ));
                self.finish_bar(download_id);
            }

            ProgressEvent::EpisodeFailed {
                download_id,
                episode_title,
                error,
            } => {
                self.main_bar.println(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.finish_bar(download_id);
            }

            ProgressEvent::FeedPublished {
                channel,
                path,
                item_count,
            } => {
                self.main_bar.println(format!(
                    "  {FOLDER}{} feed: {} ({} episodes)",
                    channel.bold(),
                    path.cyan(),
                    item_count
                ));
            }

            ProgressEvent::ChannelCompleted {
                channel,
                acquired_count,
                present_count,
                deferred_count,
                failed_count,
            } => {
                self.main_bar.println(format!(
                    "{PARTY}{} {} new, {} present, {} deferred, {} failed",
                    format!("{channel}:").bold().green(),
                    acquired_count.to_string().green().bold(),
                    present_count.to_string().yellow(),
                    deferred_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                ));
            }
        }
    }
}

impl Drop for IndicatifReporter {
    fn drop(&mut self) {
        self.main_bar.finish_and_clear();
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "tubepod".bold().magenta(),
            "- Channel Archiver".dimmed()
        );
    }

    let channels = load_channels(&args.channels)
        .with_context(|| format!("Failed to load {}", args.channels.display()))?;

    let client = ReqwestClient::new().context("Failed to build HTTP client")?;
    let source = YtDlpSource::from_path(client, DEFAULT_METADATA_TIMEOUT)?;
    let transcoder = FfmpegTranscoder::from_path(&args.bitrate, DEFAULT_TRANSCODE_TIMEOUT)?;
    let store = LocalStore::new(&args.output_dir);

    let options = SyncOptions {
        max_concurrent: args.concurrent,
        publish: !args.no_publish,
        acquire: AcquireOptions {
            min_audio_bytes: args.min_audio_bytes,
            keep_intermediate: args.keep_intermediate,
            ..AcquireOptions::default()
        },
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let summary = run(
        &source,
        &transcoder,
        &channels.channels,
        &store,
        &args.output_dir,
        &options,
        reporter,
    )
    .await
    .context("Failed to archive channels")?;

    if !args.quiet {
        let failed: Vec<_> = summary
            .channels
            .iter()
            .flat_map(|c| c.failed_episodes.iter())
            .chain(summary.failed_channels.iter())
            .collect();

        if !failed.is_empty() {
            println!("\n{}", "Failed:".red().bold());
            for (title, error) in failed {
                println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
            }
        }

        println!(
            "\n{FOLDER}Output: {}\n",
            args.output_dir.display().to_string().cyan()
        );
    }

    if summary.failed() > 0 && summary.acquired() == 0 {
        std::process::exit(1);
    }

    Ok(())
}
