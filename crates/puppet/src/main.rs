use std::path::PathBuf;

use clap::Parser;
use puppet::{load_catalog, load_character, CharacterController, PuppetConfig};
use puppet_render::{FrameStats, RenderContext};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: puppet.ron in the working directory, if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RON rig file
    #[arg(long)]
    rig: Option<String>,

    /// Directory of atlas page PNGs
    #[arg(long)]
    pages: Option<String>,

    /// Cosmetic catalog file
    #[arg(long)]
    catalog: Option<String>,

    /// Outfit file to equip
    #[arg(long)]
    outfit: Option<String>,

    /// Number of frames to simulate
    #[arg(long)]
    frames: Option<u32>,

    /// Simulation rate in frames per second
    #[arg(long)]
    fps: Option<f32>,

    /// RNG seed for reproducible behavior
    #[arg(long)]
    seed: Option<u64>,

    /// Episode to start immediately: glance, extended
    #[arg(long)]
    behavior: Option<String>,

    /// List catalog items and exit
    #[arg(long)]
    list_items: bool,

    /// Render the last frame offscreen and save it as PNG
    #[arg(long)]
    #[cfg(feature = "gpu")]
    gpu: bool,

    /// Output path for the captured frame
    #[arg(long)]
    #[cfg(feature = "gpu")]
    output: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut PuppetConfig) {
        let character = &mut config.character;
        if let Some(rig) = &self.rig {
            character.rig = rig.clone();
        }
        if self.pages.is_some() {
            character.pages = self.pages.clone();
        }
        if self.catalog.is_some() {
            character.catalog = self.catalog.clone();
        }
        if self.outfit.is_some() {
            character.outfit = self.outfit.clone();
        }
        if let Some(frames) = self.frames {
            config.simulation.frames = frames;
        }
        if let Some(fps) = self.fps {
            config.simulation.fps = fps;
        }
        if self.seed.is_some() {
            config.simulation.seed = self.seed;
        }
        #[cfg(feature = "gpu")]
        if let Some(output) = &self.output {
            config.capture.output = output.clone();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = PuppetConfig::load_from(args.config.as_deref())?;
    args.apply(&mut config);

    if args.list_items {
        let catalog = load_catalog(config.character.catalog.as_deref())?;
        for item in &catalog.items {
            let socket = format!("{:?}", item.socket);
            println!("{:<22} {:<8} {:>5}  {}", item.id, socket, item.cost, item.name);
        }
        return Ok(());
    }

    let mut controller = load_character(&config)?;
    if let Some(behavior) = &args.behavior {
        if !controller.force_behavior(behavior) {
            log::warn!("Could not start behavior '{}'", behavior);
        }
    }

    let mut ctx = RenderContext::new();
    let stats = simulate(&mut controller, &mut ctx, &config);
    let counters = controller.idle().counters();
    log::info!(
        "Simulated {} frames: {} blinks, {} glances ({} skipped), {} episodes, {} variations",
        config.simulation.frames,
        counters.blinks,
        counters.glances,
        counters.skipped,
        counters.episodes,
        counters.variations
    );
    log::info!(
        "Last frame: {} visible, {} hidden, {} clipped, {} triangles; {} materials, {} recolor materials",
        stats.visible,
        stats.hidden,
        stats.clipped,
        stats.triangles,
        ctx.materials.len(),
        ctx.recolor.len()
    );

    #[cfg(feature = "gpu")]
    if args.gpu {
        capture(&controller, &config)?;
    }

    Ok(())
}

fn simulate(
    controller: &mut CharacterController,
    ctx: &mut RenderContext,
    config: &PuppetConfig,
) -> FrameStats {
    let dt = config.frame_dt();
    let log_every = config.simulation.log_every;
    let mut stats = controller.refresh(ctx);

    for frame in 0..config.simulation.frames {
        controller.update(dt);
        stats = controller.refresh(ctx);

        if log_every > 0 && frame % log_every == 0 {
            log::debug!(
                "frame {:>5} [{}] visible={} triangles={} missing_textures={}",
                frame,
                controller.idle().state().name(),
                stats.visible,
                stats.triangles,
                stats.missing_textures
            );
        }
    }
    stats
}

#[cfg(feature = "gpu")]
fn capture(controller: &CharacterController, config: &PuppetConfig) -> anyhow::Result<()> {
    use puppet_render::GpuRenderer;

    let capture = &config.capture;
    let mut renderer = GpuRenderer::new(capture.width, capture.height)?;
    let center = controller
        .bounds()
        .map_or(glam::Vec2::ZERO, |(min, max)| (min + max) * 0.5);
    renderer.set_view(center, capture.pixels_per_unit);

    let draws = renderer.render(controller.mesh())?;
    let pixels = renderer.read_pixels()?;
    puppet::pages::save_png(pixels, capture.width, capture.height, &capture.output)?;
    log::info!("Saved {} draw calls to {}", draws, capture.output);
    Ok(())
}
