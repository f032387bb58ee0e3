use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{info, warn};
use plotters::prelude::*;
use qrsd_lib::{
    config::{load_config, PipelineConfig},
    io::{
        capture::{capture_samples, open_serial, CaptureConfig, SerialConfig},
        csv as csv_io, text as text_io,
    },
    pipeline::{run_detection, DetectionReport},
    plot::{figure_from_detection, Figure, Series},
    signal::Recording,
    synth::{synthetic_ecg, SyntheticEcg},
};
use std::{
    fs::{self, File},
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "qrsd",
    version,
    about = "qrsd: adaptive-threshold QRS detection and RR intervals"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum InputFormat {
    /// `timestamp,ecg_value` with a header row
    Csv,
    /// One amplitude per line
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect QRS complexes and RR intervals; prints a JSON report on stdout
    Detect {
        /// Recording to analyse; newline-delimited amplitudes are read from stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<InputFormat>,
        /// TOML pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        refractory_period: Option<usize>,
        #[arg(long)]
        qrs_filter_factor: Option<f64>,
        #[arg(long)]
        noise_filter_factor: Option<f64>,
        #[arg(long)]
        threshold_weight: Option<f64>,
        #[arg(long)]
        min_height: Option<f64>,
        #[arg(long)]
        min_distance: Option<usize>,
        /// Write the annotated CSV and summary into the log directory
        #[arg(long)]
        log: bool,
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Render the signal and detected peaks to a PNG in the plot directory
        #[arg(long)]
        plot: bool,
        #[arg(long)]
        plot_dir: Option<PathBuf>,
    },
    /// Record newline-delimited samples from a serial port (or stdin) into a CSV
    Capture {
        /// Serial port, e.g. /dev/ttyUSB0 or COM3; stdin is read when omitted
        #[arg(long)]
        device: Option<String>,
        #[arg(long, default_value_t = 115_200)]
        baud: u32,
        /// Per-read timeout on the serial port
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 60.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 5.0)]
        settle_s: f64,
    },
    /// Write a synthetic ECG recording as CSV
    Simulate {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 250.0)]
        fs: f64,
        #[arg(long, default_value_t = 60.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 75.0)]
        bpm: f64,
        #[arg(long, default_value_t = 0.01)]
        noise: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

/// Command-line values that take precedence over the config file.
struct Overrides {
    fs: Option<f64>,
    refractory_period: Option<usize>,
    qrs_filter_factor: Option<f64>,
    noise_filter_factor: Option<f64>,
    threshold_weight: Option<f64>,
    min_height: Option<f64>,
    min_distance: Option<usize>,
    log_dir: Option<PathBuf>,
    plot_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, cfg: &mut PipelineConfig) {
        if let Some(v) = self.fs {
            cfg.sampling_frequency_hz = v;
        }
        if let Some(v) = self.refractory_period {
            cfg.classifier.refractory_period = v;
        }
        if let Some(v) = self.qrs_filter_factor {
            cfg.classifier.qrs_filter_factor = v;
        }
        if let Some(v) = self.noise_filter_factor {
            cfg.classifier.noise_filter_factor = v;
        }
        if let Some(v) = self.threshold_weight {
            cfg.classifier.threshold_weight = v;
        }
        if let Some(v) = self.min_height {
            cfg.peaks.min_height = v;
        }
        if let Some(v) = self.min_distance {
            cfg.peaks.min_distance = v;
        }
        if let Some(v) = self.log_dir {
            cfg.output.log_dir = v;
        }
        if let Some(v) = self.plot_dir {
            cfg.output.plot_dir = v;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    match cli.command {
        Commands::Detect {
            input,
            format,
            config,
            fs,
            refractory_period,
            qrs_filter_factor,
            noise_filter_factor,
            threshold_weight,
            min_height,
            min_distance,
            log,
            log_dir,
            plot,
            plot_dir,
        } => {
            let overrides = Overrides {
                fs,
                refractory_period,
                qrs_filter_factor,
                noise_filter_factor,
                threshold_weight,
                min_height,
                min_distance,
                log_dir,
                plot_dir,
            };
            cmd_detect(
                input.as_deref(),
                format,
                config.as_deref(),
                overrides,
                log,
                plot,
            )?
        }
        Commands::Capture {
            device,
            baud,
            timeout_ms,
            out,
            duration_s,
            settle_s,
        } => {
            let serial = device.map(|port| SerialConfig {
                baud_rate: baud,
                timeout: Duration::from_millis(timeout_ms),
                ..SerialConfig::new(port)
            });
            cmd_capture(serial.as_ref(), &out, duration_s, settle_s)?
        }
        Commands::Simulate {
            out,
            fs,
            duration_s,
            bpm,
            noise,
            seed,
        } => {
            let spec = SyntheticEcg {
                fs,
                duration_s,
                heart_rate_bpm: bpm,
                noise,
                seed,
                ..SyntheticEcg::default()
            };
            cmd_simulate(out.as_deref(), &spec)?
        }
    }
    Ok(())
}

fn load_recording(input: Option<&Path>, format: Option<InputFormat>, fs: f64) -> Result<Recording> {
    let Some(path) = input else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let data = text_io::parse_f64_series(&buf)?;
        return Ok(Recording::from_amplitudes(fs, &data));
    };
    let format = format.unwrap_or_else(|| {
        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            InputFormat::Csv
        } else {
            InputFormat::Text
        }
    });
    match format {
        InputFormat::Csv => csv_io::read_ecg_csv(path, fs),
        InputFormat::Text => text_io::read_text_recording(path, fs),
    }
}

fn cmd_detect(
    input: Option<&Path>,
    format: Option<InputFormat>,
    config: Option<&Path>,
    overrides: Overrides,
    log: bool,
    plot: bool,
) -> Result<()> {
    let mut cfg = match config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut cfg);
    cfg.validate()?;

    let recording = load_recording(input, format, cfg.sampling_frequency_hz)?;
    let report = run_detection(&recording, &cfg.peaks, &cfg)?;

    let stamp = chrono::Utc::now().format("%Y_%m_%d_%H_%M_%S").to_string();
    if log {
        write_logs(&cfg.output.log_dir, &stamp, &report)?;
    }
    if plot {
        fs::create_dir_all(&cfg.output.plot_dir)
            .with_context(|| format!("creating {}", cfg.output.plot_dir.display()))?;
        let path = cfg
            .output
            .plot_dir
            .join(format!("QRS_offline_detector_plot_{}.png", stamp));
        let fig = figure_from_detection(&recording, &report.qrs, &report.noise, 4096);
        draw_plotters_figure(&path, &fig)?;
        info!("plot written to {}", path.display());
    }

    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn write_logs(dir: &Path, stamp: &str, report: &DetectionReport) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let log_path = dir.join(format!("QRS_offline_detector_log_{}.csv", stamp));
    csv_io::write_annotated_csv(&log_path, &report.annotated)?;
    let summary_path = csv_io::summary_path_for(&log_path);
    csv_io::write_summary(&summary_path, &report.summary, &report.rr)?;
    info!(
        "detection log written to {} and {}",
        log_path.display(),
        summary_path.display()
    );
    Ok(())
}

fn cmd_capture(
    serial: Option<&SerialConfig>,
    out: &Path,
    duration_s: f64,
    settle_s: f64,
) -> Result<()> {
    let cfg = CaptureConfig {
        duration: Duration::try_from_secs_f64(duration_s).context("invalid --duration-s")?,
        settle: Duration::try_from_secs_f64(settle_s).context("invalid --settle-s")?,
    };
    let stats = match serial {
        Some(serial) => {
            let port = open_serial(serial)?;
            let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
            capture_samples(port, file, &cfg)?
        }
        None => {
            let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
            capture_samples(BufReader::new(io::stdin().lock()), file, &cfg)?
        }
    };
    if stats.written == 0 {
        warn!("no samples captured");
    }
    eprintln!(
        "captured {} samples into {} ({} lines dropped)",
        stats.written,
        out.display(),
        stats.dropped
    );
    Ok(())
}

fn cmd_simulate(out: Option<&Path>, spec: &SyntheticEcg) -> Result<()> {
    let (recording, beats) = synthetic_ecg(spec)?;
    info!("simulated {} samples with {} beats", recording.len(), beats.len());
    match out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            csv_io::write_recording_to(file, &recording)
        }
        None => csv_io::write_recording_to(io::stdout().lock(), &recording),
    }
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let Some((x_min, mut x_max, y_min, mut y_max)) = fig.bounds() else {
        warn!("nothing to plot");
        return Ok(());
    };
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    let backend = BitMapBackend::new(path, (1500, 800));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    &RGBColor(r, g, b),
                ))?;
            }
            Series::Points(points) => {
                let (r, g, b) = points.style.color.rgb();
                let radius = points.style.width.round() as i32;
                chart.draw_series(points.points.iter().map(|p| {
                    Circle::new((p[0], p[1]), radius, RGBColor(r, g, b).filled())
                }))?;
            }
        }
    }
    root.present()?;
    Ok(())
}
