use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use moodlens_core::{EmotionClassifier, FaceDetector};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "moodlens", about = "moodlens face sentiment CLI", version)]
struct Cli {
    /// Haar cascade XML (default: <model dir>/haarcascade_frontalface_default.xml)
    #[arg(long, global = true)]
    cascade: Option<PathBuf>,
    /// FER+ ONNX model (default: <model dir>/emotion-ferplus-8.onnx)
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse the largest face in an image and print the result as JSON
    Analyze {
        /// Image file (any format the image crate decodes)
        image: PathBuf,
        /// ONNX Runtime intra-op threads
        #[arg(long, default_value_t = 2)]
        threads: usize,
    },
    /// Print every face rectangle found in an image
    Detect {
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cascade = artifact_path(cli.cascade, moodlens_core::CASCADE_FILE);

    match cli.command {
        Commands::Analyze { image, threads } => {
            let model = artifact_path(cli.model, moodlens_core::FERPLUS_MODEL_FILE);
            let img = open_image(&image)?;

            let mut detector = FaceDetector::load(&cascade)?;
            let mut classifier = EmotionClassifier::load_with_threads(&model, threads)?;

            let result = moodlens_core::analyze_image(&img, &mut detector, &mut classifier)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Detect { image } => {
            let img = open_image(&image)?;
            let mut detector = FaceDetector::load(&cascade)?;

            let faces = detector.detect(&img)?;
            if faces.is_empty() {
                eprintln!("no face detected in {}", image.display());
            }
            println!("{}", serde_json::to_string_pretty(&faces)?);
        }
    }

    Ok(())
}

fn artifact_path(explicit: Option<PathBuf>, file_name: &str) -> String {
    explicit
        .unwrap_or_else(|| moodlens_core::default_model_dir().join(file_name))
        .to_string_lossy()
        .into_owned()
}

/// Decode an image file, applying its EXIF orientation.
fn open_image(path: &Path) -> Result<RgbImage> {
    let mut decoder = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .with_context(|| format!("cannot read {}", path.display()))?
        .into_decoder()
        .with_context(|| format!("cannot decode {}", path.display()))?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("cannot decode {}", path.display()))?;
    img.apply_orientation(orientation);
    tracing::debug!(width = img.width(), height = img.height(), ?orientation, "image decoded");
    Ok(img.to_rgb8())
}
