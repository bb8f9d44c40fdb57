//! cvatkit: pull annotation projects out of a CVAT server.
//!
//! cvatkit walks the tasks of a CVAT instance, reconciles each task's
//! segments, jobs and media metadata into a frame table, and flattens the
//! heterogeneous annotation payloads (tags, shapes and tracks) into one
//! frame-indexed JSON dataset. Mask shapes are not exported; they are
//! counted as unknown annotation types.
//!
//! # Modules
//!
//! - [`api`]: REST client, typed models and paginated fetching
//! - [`reconcile`]: task/job/frame reconciliation
//! - [`normalize`]: annotation normalization into export records
//! - [`mask`]: RLE mask codec, contours, rasterization and image splitting
//! - [`assemble`]: multi-task orchestration into an export payload
//! - [`export`]: dataset archive polling and image download
//! - [`split`]: train/test split of an exported payload
//! - [`report`]: aggregated non-fatal errors
//! - [`error`]: error types

pub mod api;
pub mod assemble;
pub mod config;
pub mod error;
pub mod export;
pub mod io_json;
pub mod mask;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod split;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use api::ids::{ProjectId, TaskId};
use api::transport::HttpTransport;
use api::ApiClient;
use assemble::{DatasetAssembler, ExportOptions, ExportPayload};
use config::ClientConfig;
use export::{ImageDownloadOptions, ImageDownloader, PollPolicy};
use normalize::NormalizeOptions;
use split::SplitOptions;

pub use error::CvatError;

/// File name of the exported dataset inside the output directory.
pub const METADATA_FILE: &str = "metadata.json";

/// The cvatkit CLI application.
#[derive(Parser)]
#[command(name = "cvatkit")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download annotations (and optionally images) of tasks or a project.
    Download(DownloadArgs),
    /// Split an exported metadata.json into train.json and test.json.
    Split(SplitArgs),
}

#[derive(clap::Args)]
struct DownloadArgs {
    /// Task ids to export.
    #[arg(long, num_args = 1.., value_name = "ID")]
    task_ids: Vec<u64>,

    /// Export every task of this project (merged with --task-ids).
    #[arg(long, value_name = "ID")]
    project_id: Option<u64>,

    /// Directory receiving metadata.json and images/.
    #[arg(long, value_name = "DIR")]
    output_path: PathBuf,

    /// Also download the task images.
    #[arg(long)]
    load_images: bool,

    /// Keep points annotations.
    #[arg(long)]
    points: bool,

    /// Keep polyline annotations.
    #[arg(long)]
    polylines: bool,

    /// Keep polygon points.
    #[arg(long)]
    polygons: bool,

    /// Add bounding boxes to polygons.
    #[arg(long)]
    bboxes: bool,

    /// Keep rectangle annotations.
    #[arg(long)]
    rectangles: bool,

    /// Keep tags.
    #[arg(long)]
    tags: bool,

    /// Include jobs that are not completed.
    #[arg(long)]
    all_jobs: bool,

    /// Place images at their archive paths instead of images/task-<id>/.
    #[arg(long)]
    keep_original_paths: bool,

    /// Archives larger than this many bytes are spooled to disk.
    #[arg(long, value_name = "BYTES", default_value_t = export::DEFAULT_MEMORY_THRESHOLD)]
    memory_threshold: u64,

    /// Tasks processed concurrently.
    #[arg(long, value_name = "N", default_value_t = 1)]
    workers: usize,

    /// Give up waiting for a dataset export after this many seconds.
    #[arg(long, value_name = "SECS")]
    export_timeout: Option<u64>,
}

#[derive(clap::Args)]
struct SplitArgs {
    /// metadata.json produced by `cvatkit download`.
    input: PathBuf,

    /// Fraction of images assigned to the test set.
    #[arg(long, default_value_t = split::DEFAULT_TEST_SIZE)]
    test_size: f64,

    /// Seed for a reproducible split.
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory (defaults to the input's directory).
    #[arg(long, value_name = "DIR")]
    output_path: Option<PathBuf>,
}

/// Run the cvatkit CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CvatError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Download(args)) => run_download(args),
        Some(Commands::Split(args)) => run_split(args),
        None => {
            println!("cvatkit {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Pull annotation projects out of a CVAT server.");
            println!();
            println!("Run 'cvatkit --help' for usage information.");
            Ok(())
        }
    }
}

fn run_download(args: DownloadArgs) -> Result<(), CvatError> {
    let metadata_path = args.output_path.join(METADATA_FILE);
    if metadata_path.exists() {
        log::warn!(
            "{} already exists, skipping download",
            metadata_path.display()
        );
        return Ok(());
    }

    let config = ClientConfig::from_env()?;
    log::info!("Connecting to {}", config.host);
    let transport = HttpTransport::connect(&config)?;
    let client = ApiClient::new(transport, config);

    let mut task_ids: Vec<TaskId> = args.task_ids.iter().copied().map(TaskId::new).collect();
    if let Some(project_id) = args.project_id {
        let project = client.project(ProjectId::new(project_id))?;
        log::info!(
            "Project {} '{}' has {} task(s)",
            project.id,
            project.name,
            project.task_ids.len()
        );
        task_ids.extend(project.task_ids);
    }
    let mut seen = HashSet::new();
    task_ids.retain(|id| seen.insert(*id));
    if task_ids.is_empty() {
        log::warn!("No tasks selected; pass --task-ids or --project-id");
    }

    std::fs::create_dir_all(&args.output_path)?;

    let options = ExportOptions {
        normalize: NormalizeOptions {
            points: args.points,
            polylines: args.polylines,
            polygons: args.polygons,
            bboxes: args.bboxes,
            rectangles: args.rectangles,
            tags: args.tags,
        },
        all_jobs: args.all_jobs,
        workers: args.workers,
    }
    .with_default_selection();

    let mut assembler = DatasetAssembler::new(&client, options).with_progress(true);
    if args.load_images {
        let mut download = ImageDownloadOptions::new(&args.output_path);
        download.keep_original_paths = args.keep_original_paths;
        download.memory_threshold = args.memory_threshold;
        download.poll = PollPolicy {
            deadline: args.export_timeout.map(Duration::from_secs),
            ..PollPolicy::default()
        };
        assembler = assembler.with_images(ImageDownloader::new(download));
    }

    let dataset = assembler.run(&task_ids)?;
    io_json::write_json(&dataset.payload, &metadata_path)?;
    log::info!("Wrote {}", metadata_path.display());

    if dataset.errors.is_empty() {
        Ok(())
    } else {
        Err(CvatError::CompletedWithErrors {
            error_count: dataset.errors.total(),
            errors: dataset.errors,
        })
    }
}

fn run_split(args: SplitArgs) -> Result<(), CvatError> {
    let payload: ExportPayload = io_json::read_json(&args.input)?;
    let output_dir = match args.output_path {
        Some(dir) => dir,
        None => args
            .input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default(),
    };
    std::fs::create_dir_all(&output_dir)?;

    let halves = split::split_payload(
        &payload,
        &SplitOptions {
            test_size: args.test_size,
            seed: args.seed,
        },
    )?;

    let train_path = output_dir.join("train.json");
    let test_path = output_dir.join("test.json");
    io_json::write_json(&halves.train, &train_path)?;
    io_json::write_json(&halves.test, &test_path)?;

    println!(
        "Wrote {} ({} images, {} annotations) and {} ({} images, {} annotations)",
        train_path.display(),
        halves.train.images.len(),
        halves.train.annotations.len(),
        test_path.display(),
        halves.test.images.len(),
        halves.test.annotations.len()
    );
    Ok(())
}
