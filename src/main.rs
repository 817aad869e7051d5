mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use audioprism::analysis::PercussionDetection;
use audioprism::audio::capture::to_adc_counts;
use audioprism::audio::decode::AudioStream;
use audioprism::config::{self, Config, MODULE_KINDS};
use audioprism::pipeline::Pipeline;
use audioprism::report::{FrameReport, ReportWriter};
use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if cli.list_modules {
        println!("Available modules:");
        for (kind, description) in MODULE_KINDS {
            println!("  {:<20} {}", kind, description);
        }
        return Ok(());
    }

    // Load config: explicit --config path, or auto-detect audioprism.toml / global config
    let mut cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log::warn!("{:#}", e);
                Config::default()
            }
        },
        None => Config::default(),
    };
    // Merge: config values apply only when CLI is at its default
    if cli.window_size == 256 { cli.window_size = cfg.analysis.window_size; }
    if cli.history == 8 { cli.history = cfg.analysis.history; }
    cfg.analysis.window_size = cli.window_size;
    cfg.analysis.history = cli.history;

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("audioprism - spectral analysis for haptics");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());

    let mut stream = AudioStream::open(input)?;
    let registry = cfg
        .build_registry(stream.sample_rate())
        .context("Invalid analysis configuration")?;
    log::info!(
        "Window {} samples at {}Hz ({:.1}Hz per bin), {} frames of history",
        registry.window_size(),
        registry.sample_rate(),
        registry.bin_width(),
        cli.history
    );
    let names: Vec<&str> = registry.modules().map(|m| m.name()).collect();
    log::info!("Modules: {}", names.join(", "));
    log::info!("Noise floor: {:?}", cfg.noise_floor);

    let window_size = registry.window_size() as u64;
    let mut pipeline = Pipeline::new(registry, cfg.noise_floor)?;
    let capture = pipeline.capture();
    let mut writer = ReportWriter::create(&cli.output)?;

    let expected = stream
        .total_frames()
        .map(|n| n / window_size)
        .map(|n| cli.max_frames.map_or(n, |max| n.min(max)));
    let pb = match expected {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let mut chunk = Vec::new();
    let mut percussive = 0u64;
    'decode: while stream.next_chunk(&mut chunk)? {
        for &sample in &chunk {
            // same path as the sampling interrupt on the device
            capture.record(to_adc_counts(sample));
            if !pipeline.poll() {
                continue;
            }

            let frame = pipeline.frames() - 1;
            let registry = pipeline.registry();
            if registry
                .find::<PercussionDetection>()
                .is_some_and(|p| p.detected())
            {
                percussive += 1;
            }
            let report = FrameReport::new(frame, capture.dropped_samples(), registry, &cfg.output);
            writer.write_frame(&report)?;
            pb.inc(1);

            if cli.max_frames.is_some_and(|max| pipeline.frames() >= max) {
                log::info!("Reached --max-frames limit");
                break 'decode;
            }
        }
    }

    pb.finish();
    let written = writer.written();
    writer.finish()?;

    if capture.dropped_samples() > 0 {
        log::warn!("{} samples dropped during capture", capture.dropped_samples());
    }
    log::info!(
        "Done! {} frames written to {} ({} percussive)",
        written,
        cli.output.display(),
        percussive
    );

    Ok(())
}
