use mnist_zca::idx;
use mnist_zca::prepare::{prepare_features, Summary};
use mnist_zca::vectorize::to_feature_matrix;
use mnist_zca::visualize::{save_grid, Grid};
use mnist_zca::whitening::{Centering, CovarianceDivisor, WhiteningConfig, ZcaWhitening};
use mnist_zca::argmax_index;

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Vectorize and ZCA-whiten an IDX image/label pair
    Prepare {
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        labels: PathBuf,
        #[arg(long, default_value_t = 10)]
        num_classes: usize,
        #[arg(long, default_value_t = mnist_zca::whitening::DEFAULT_EPSILON)]
        epsilon: f64,
        #[arg(long, value_enum, default_value_t = CenteringArg::RowThenColumn)]
        centering: CenteringArg,
        #[arg(long, value_enum, default_value_t = DivisorArg::Features)]
        divisor: DivisorArg,
        /// Only use the first N images
        #[arg(long)]
        limit: Option<usize>,
        /// Side of the square preview grid
        #[arg(long, default_value_t = 10)]
        grid: usize,
        #[arg(long, default_value_t = 28)]
        width: usize,
        #[arg(long, default_value_t = 28)]
        height: usize,
        #[arg(long, default_value = "prepared/")]
        out_dir: PathBuf,
        /// Run one seeded epoch shuffle of the prepared dataset
        #[arg(long)]
        seed: Option<u64>,
        /// How many eigenvalues to record in the summary
        #[arg(long, default_value_t = 10)]
        top_eigenvalues: usize,
    },
    /// Print the header of an IDX image file and the class counts of a label file
    Inspect {
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        labels: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CenteringArg {
    RowThenColumn,
    Column,
}

impl From<CenteringArg> for Centering {
    fn from(arg: CenteringArg) -> Centering {
        match arg {
            CenteringArg::RowThenColumn => Centering::RowThenColumn,
            CenteringArg::Column => Centering::Column,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DivisorArg {
    Features,
    SamplesMinusOne,
}

impl From<DivisorArg> for CovarianceDivisor {
    fn from(arg: DivisorArg) -> CovarianceDivisor {
        match arg {
            DivisorArg::Features => CovarianceDivisor::Features,
            DivisorArg::SamplesMinusOne => CovarianceDivisor::SamplesMinusOne,
        }
    }
}

struct PrepareArgs {
    images: PathBuf,
    labels: PathBuf,
    num_classes: usize,
    config: WhiteningConfig,
    limit: Option<usize>,
    grid: Grid,
    out_dir: PathBuf,
    seed: Option<u64>,
    top_eigenvalues: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            images,
            labels,
            num_classes,
            epsilon,
            centering,
            divisor,
            limit,
            grid,
            width,
            height,
            out_dir,
            seed,
            top_eigenvalues,
        } => {
            let args = PrepareArgs {
                images,
                labels,
                num_classes,
                config: WhiteningConfig {
                    epsilon,
                    centering: centering.into(),
                    divisor: divisor.into(),
                },
                limit,
                grid: Grid {
                    grid_rows: grid,
                    grid_cols: grid,
                    width,
                    height,
                },
                out_dir,
                seed,
                top_eigenvalues,
            };
            if let Err(e) = run_prepare(args) {
                eprintln!("Error during preparation: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Inspect { images, labels } => {
            if let Err(e) = run_inspect(&images, labels.as_deref()) {
                eprintln!("Error inspecting dataset: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (mut images, mut labels) = idx::load_dataset(&args.images, &args.labels)?;
    if let Some(n) = args.limit {
        images.truncate(n);
        labels.truncate(n);
        info!("limited to the first {} samples", images.len());
    }
    fs::create_dir_all(&args.out_dir)?;

    let raw = to_feature_matrix(&images)?;
    preview(&raw, args.grid, &args.out_dir.join("raw.png"));

    let whitener = ZcaWhitening::new(args.config);
    let mut dataset = prepare_features(&raw, &labels, args.num_classes, &whitener)?;
    preview(&dataset.features, args.grid, &args.out_dir.join("whitened.png"));

    let summary = Summary::new(
        &dataset,
        &labels,
        args.num_classes,
        args.config,
        args.top_eigenvalues,
    );
    if let Some(seed) = args.seed {
        let first_class = dataset.class_of(0);
        dataset.shuffle(&mut StdRng::seed_from_u64(seed))?;
        info!(
            "seed {seed} epoch shuffle: row 0 went from class {:?} to class {:?}",
            first_class,
            dataset.class_of(0)
        );
    }

    let summary_path = args.out_dir.join("summary.json");
    summary.save(&summary_path)?;
    println!("Summary written to: {}", summary_path.display());

    println!(
        "Prepared {} samples x {} features (output range {:.3}..{:.3})",
        summary.samples, summary.features, summary.output_min, summary.output_max
    );
    Ok(())
}

/// Preview grids are best effort: a dataset smaller than the grid is still prepared.
fn preview(features: &ndarray::Array2<f64>, grid: Grid, path: &Path) {
    if let Err(e) = save_grid(features.view(), grid, path) {
        warn!("skipping preview {}: {}", path.display(), e);
    }
}

fn run_inspect(
    images: &Path,
    labels: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(File::open(images)?);
    let header = idx::read_image_header(&mut reader)?;
    println!(
        "{}: {} images of {}x{} pixels",
        images.display(),
        header.count,
        header.rows,
        header.cols
    );

    if let Some(path) = labels {
        let labels = idx::load_labels(path)?;
        let num_classes = labels.iter().map(|&l| l as usize + 1).max().unwrap_or(0);
        let mut counts = vec![0.0; num_classes];
        for &l in &labels {
            counts[l as usize] += 1.0;
        }
        println!("{}: {} labels", path.display(), labels.len());
        for (class, count) in counts.iter().enumerate() {
            println!("  class {class}: {count}");
        }
        if let Some(most) = argmax_index(&counts) {
            println!("most frequent class: {most}");
        }
    }
    Ok(())
}
