use anyhow::Context;
use clap::Parser;
use dataset::LoadConfig;
use render::RenderConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// CLI for rendering a registered view of a COLMAP reconstruction as gaussian splats.
#[derive(Parser)]
struct Args {
    /// Directory containing the COLMAP files
    #[arg(short, long)]
    colmap_path: PathBuf,

    /// Id of the registered image to render
    #[arg(short, long)]
    image_id: i32,

    /// Output directory to save the rendered image
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// JSON file with render settings, defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Size the splats by the distance to their nearest neighbours
    #[arg(long)]
    neighbor_scales: bool,

    /// Only keep points seen by at least this many images
    #[arg(long, default_value_t = 2)]
    min_track_length: usize,
}

// Info and up unless RUST_LOG says otherwise.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

fn save_png(img: &render::RenderImage, path: &Path) -> anyhow::Result<()> {
    let buffer = image::RgbImage::from_raw(img.width(), img.height(), img.to_rgb8())
        .context("Rendered image doesn't match its dimensions")?;
    buffer
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&directives))
        .init();
    let args = Args::parse();

    let render_config = match &args.config {
        Some(path) => RenderConfig::load_overrides(path)
            .with_context(|| format!("Failed to read render config {}", path.display()))?,
        None => RenderConfig::new(),
    };
    let load_config = LoadConfig::new().with_min_track_length(args.min_track_length);

    let dataset = dataset::load_dataset(&args.colmap_path, &load_config).await?;
    let mut scene = dataset.into_scene()?;

    if args.neighbor_scales {
        scene.splats_mut().init_scales_from_neighbors();
    }

    if let Some((min, max)) = scene.splats().bounds() {
        tracing::info!("Scene bounds: {min} .. {max}");
    }

    let (img, stats) = scene.render_view(args.image_id, &render_config)?;
    tracing::info!(
        "Rendered view {} ({}x{}): {} visible splats, {} tile intersections, {} culled, {} skipped",
        args.image_id,
        img.width(),
        img.height(),
        stats.num_visible,
        stats.num_intersections,
        stats.num_culled,
        stats.num_skipped
    );

    tokio::fs::create_dir_all(&args.output).await?;
    let path = args.output.join(format!("rendered_image_{}.png", args.image_id));
    save_png(&img, &path)?;
    tracing::info!("Saved {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter("").max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            log_filter("render=debug").max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from(["render-cmd", "-c", "scene", "-i", "3"]).unwrap();
        assert_eq!(args.image_id, 3);
        assert_eq!(args.output, PathBuf::from("output"));
        assert_eq!(args.min_track_length, 2);
        assert!(!args.neighbor_scales);
    }
}
