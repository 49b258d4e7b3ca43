use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use region::{
    remote::RemoteSegmenter, AnnotationSet, BoundingBox, Dimensions, DisplaySpace, ImageSession,
    LocationTokenCodec, ModelSpace, Polygon, RegionCommand, RegionConfig, RegionManager, RegionPipelineBuilder,
    SegmentationDriver, SourceSpace,
};
use region_cli::{load_mask, outline_mask, parse_box, parse_dimensions, resolve_model_size, to_annotation_set};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Outline a mask image and write the result as GeoJSON
    Outline {
        /// Path to the mask image (foreground > 128)
        #[arg(short, long)]
        mask: PathBuf,
        /// Pipeline configuration (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Display size WIDTHxHEIGHT to map the outline onto
        #[arg(long, value_parser = parse_dimensions)]
        display: Option<Dimensions>,
        /// GeoJSON output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write a PNG preview of mask and outline
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Encode a box as location tokens
    EncodeBox {
        /// Source image size WIDTHxHEIGHT
        #[arg(long, value_parser = parse_dimensions)]
        source: Dimensions,
        /// Box corners x1,y1,x2,y2
        #[arg(long = "box")]
        bbox: String,
    },
    /// Decode location tokens into polygon vertices
    DecodeTokens {
        /// Target size WIDTHxHEIGHT
        #[arg(long, value_parser = parse_dimensions)]
        target: Dimensions,
        /// Token stream, e.g. "<loc_10><loc_20><loc_300><loc_400>"
        tokens: String,
    },
    /// Execute a JSON-encoded region command
    Run {
        /// Command JSON, e.g. '{"type": "extract_polygon", "params": {}}'
        #[arg(long)]
        command: String,
        /// Mask image for commands that need one
        #[arg(short, long)]
        mask: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List available region commands
    Commands,
    /// Print the JSON schema of the pipeline configuration
    Schema,
    /// Segment through a hosted segmentation API
    Remote {
        /// API base URL
        #[arg(long)]
        api: String,
        /// URL of the image the API should fetch
        #[arg(long)]
        image_url: String,
        /// Original image size WIDTHxHEIGHT
        #[arg(long, value_parser = parse_dimensions)]
        source: Dimensions,
        /// Size the API processes images at, WIDTHxHEIGHT; defaults to the config's model_size
        #[arg(long, value_parser = parse_dimensions)]
        model: Option<Dimensions>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Box x1,y1,x2,y2 in source pixels; segments everything when omitted
        #[arg(long = "box")]
        bbox: Option<String>,
        /// GeoJSON output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Outline {
            mask,
            config,
            display,
            output,
            preview,
        } => outline(&mask, config.as_deref(), display, output.as_deref(), preview.as_deref())?,
        Commands::EncodeBox { source, bbox } => {
            let bbox = BoundingBox::<SourceSpace>::from(parse_box(&bbox)?);
            println!("{}", LocationTokenCodec.encode(&bbox, source)?);
        }
        Commands::DecodeTokens { target, tokens } => {
            let polygon: Polygon<ModelSpace> = LocationTokenCodec.decode(&tokens, target)?;
            let vertices: Vec<[f64; 2]> = polygon.into_vertices().into_iter().map(<[f64; 2]>::from).collect();
            println!("{}", serde_json::to_string(&vertices)?);
        }
        Commands::Run { command, mask, config } => run_command(&command, mask.as_deref(), config.as_deref())?,
        Commands::Commands => {
            for name in RegionCommand::command_names() {
                println!("{name}");
            }
        }
        Commands::Schema => println!("{}", serde_json::to_string_pretty(&RegionConfig::schema())?),
        Commands::Remote {
            api,
            image_url,
            source,
            model,
            config,
            bbox,
            output,
        } => {
            remote(
                &api,
                &image_url,
                source,
                model,
                config.as_deref(),
                bbox.as_deref(),
                output.as_deref(),
            )
            .await?
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RegionConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Ok(RegionConfig::from_file(path)?)
        }
        None => Ok(RegionConfig::default()),
    }
}

fn write_geojson(set: &AnnotationSet<DisplaySpace>, output: Option<&Path>) -> Result<()> {
    let geojson = set.to_geojson_string()?;
    match output {
        Some(path) => {
            std::fs::write(path, geojson)?;
            info!("Wrote {} region(s) to {:?}", set.len(), path);
        }
        None => println!("{geojson}"),
    }
    Ok(())
}

fn outline(
    mask_path: &Path,
    config_path: Option<&Path>,
    display: Option<Dimensions>,
    output: Option<&Path>,
    preview: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let outlined = outline_mask(load_mask(mask_path)?, &config)?;
    info!(
        "Outlined {:?}: {} vertices, area {:.1}",
        mask_path,
        outlined.polygon.len(),
        outlined.polygon.area()
    );

    if let Some(preview_path) = preview {
        let base = image::open(mask_path)?.to_rgba8();
        let rendered = region::render_preview(&base, &outlined.mask, 0, Some(&outlined.polygon))?;
        rendered.save(preview_path)?;
        info!("Preview saved to {:?}", preview_path);
    }

    write_geojson(&to_annotation_set(&outlined, display)?, output)
}

fn run_command(command_json: &str, mask: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    let command: RegionCommand = serde_json::from_str(command_json)?;
    info!("Executing {}: {}", command, command.description());

    let mut manager = RegionManager::with_config(load_config(config_path)?)?;
    if let Some(mask) = mask {
        manager.load_mask_image(mask)?;
    }
    let output = manager.execute(command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn remote(
    api: &str,
    image_url: &str,
    source: Dimensions,
    model: Option<Dimensions>,
    config_path: Option<&Path>,
    bbox: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let provider = RemoteSegmenter::new(api, image_url)?;
    let session = ImageSession::new(source, resolve_model_size(model, &config)?)?;
    let driver = SegmentationDriver::new(RegionPipelineBuilder::from_config(&config)?.build(), session);
    // Output polygons are in source pixels; the source image is the display.
    let display = driver.session().source_size();
    let mut set = AnnotationSet::new(display);

    match bbox {
        Some(bbox) => {
            let bbox = BoundingBox::<DisplaySpace>::from(parse_box(bbox)?);
            set.push(driver.segment_box(&provider, &bbox, display).await?);
        }
        None => {
            let cancel = AtomicBool::new(false);
            let mut produced = Vec::new();
            let summary = driver
                .segment_all(&provider, display, &cancel, |index, outcome| match outcome {
                    Ok(annotation) => produced.push(annotation),
                    Err(e) => warn!("Region {} skipped: {}", index, e),
                })
                .await?;
            info!(
                "Segmented {} region(s), {} failed, {} lost in transport",
                summary.produced, summary.failed, summary.transport_failed
            );
            for annotation in produced {
                set.push(annotation);
            }
        }
    }

    if set.is_empty() {
        return Err(eyre!("the API returned no usable regions"));
    }
    write_geojson(&set, output)
}
