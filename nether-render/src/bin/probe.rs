//! nether-render-probe - exercise the renderer without a window
//!
//! # Commands
//!
//! - `nether-render-probe caps` - print the capabilities the renderer derives
//!   from the device
//! - `nether-render-probe render` - render a demo scene for a few frames and
//!   print per-frame statistics
//! - `nether-render-probe config` - print the effective configuration as TOML
//!
//! Every command runs on the command-recording device, so the output reflects
//! what the renderer would ask of a GPU.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glam::{UVec2, Vec3};
use nether_render::device::{DeviceCommand, RecordingDevice};
use nether_render::scene::{Background, Geometry, Light, LightShadow, Node};
use nether_render::{Camera, Material, Renderer, RendererConfig, Scene, ShadowType};

/// Headless probe for the nether-render pipeline
#[derive(Parser)]
#[command(name = "nether-render-probe")]
#[command(about = "Headless probe for the nether-render pipeline")]
#[command(version)]
struct Cli {
    /// Renderer configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print device capabilities
    Caps,

    /// Render the demo scene and print frame statistics
    Render(RenderArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct RenderArgs {
    /// Number of frames to render
    #[arg(short, long, default_value_t = 3)]
    frames: u32,

    /// Enable shadow maps regardless of the configuration
    #[arg(long)]
    shadows: bool,

    /// Shadow filtering when `--shadows` is given
    #[arg(long, value_enum, default_value = "pcf")]
    shadow_type: ShadowArg,

    /// Print the device commands of the last frame
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ShadowArg {
    Basic,
    Pcf,
    PcfSoft,
    Vsm,
}

impl From<ShadowArg> for ShadowType {
    fn from(value: ShadowArg) -> Self {
        match value {
            ShadowArg::Basic => ShadowType::Basic,
            ShadowArg::Pcf => ShadowType::Pcf,
            ShadowArg::PcfSoft => ShadowType::PcfSoft,
            ShadowArg::Vsm => ShadowType::Vsm,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RendererConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RendererConfig::default(),
    };

    match cli.command {
        Commands::Caps => caps(config),
        Commands::Render(args) => render(config, args),
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn caps(config: RendererConfig) -> Result<()> {
    let renderer = Renderer::new(RecordingDevice::new(), config)?;
    let caps = renderer.capabilities();
    println!("precision:            {:?}", caps.precision);
    println!("max textures:         {}", caps.max_textures);
    println!("max vertex textures:  {}", caps.max_vertex_textures);
    println!("max texture size:     {}", caps.max_texture_size);
    println!("max cubemap size:     {}", caps.max_cubemap_size);
    println!("max attributes:       {}", caps.max_attributes);
    println!("max vertex uniforms:  {}", caps.max_vertex_uniforms);
    println!("max fragment uniforms:{}", caps.max_fragment_uniforms);
    println!("max varyings:         {}", caps.max_varyings);
    println!("max samples:          {}", caps.max_samples);
    println!("max anisotropy:       {}", caps.max_anisotropy);
    println!("max bones:            {}", caps.max_bones());
    println!("float target type:    {:?}", caps.float_target_type());
    println!("extensions:           {}", caps.extensions.len());
    Ok(())
}

fn render(mut config: RendererConfig, args: RenderArgs) -> Result<()> {
    if args.shadows {
        config.shadows.enabled = true;
        config.shadows.shadow_type = args.shadow_type.into();
    }
    let (width, height) = (config.render.width, config.render.height);
    let mut renderer = Renderer::new(RecordingDevice::new(), config)?;
    let mut scene = demo_scene();
    let camera = Camera::perspective(50.0, width as f32 / height.max(1) as f32, 0.1, 100.0)
        .with_position(Vec3::new(0.0, 3.0, 8.0), Vec3::ZERO);

    for _ in 0..args.frames {
        renderer.device_mut().clear_commands();
        renderer.render(&mut scene, &camera)?;
        let info = renderer.info();
        println!(
            "frame {:>3}: {} calls, {} triangles, {} lines, {} points ({} programs, {} geometries, {} textures)",
            info.frame,
            info.calls,
            info.triangles,
            info.lines,
            info.points,
            info.programs,
            info.geometries,
            info.textures
        );
    }

    let device = renderer.device();
    let state_changes = device.count(|command| {
        !matches!(
            command,
            DeviceCommand::Draw { .. } | DeviceCommand::Clear { .. }
        )
    });
    println!(
        "last frame: {} device commands, {} state changes",
        device.commands().len(),
        state_changes
    );
    if args.trace {
        for command in device.commands() {
            println!("  {command:?}");
        }
    }
    if !device.errors().is_empty() {
        anyhow::bail!("device reported {} errors", device.errors().len());
    }
    Ok(())
}

/// Ground plane, a row of cubes, a glass pane and two shadow-casting lights.
fn demo_scene() -> Scene {
    let mut scene = Scene::new();
    scene.background = Some(Background::Color(Vec3::new(0.05, 0.05, 0.08)));

    let cube = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
    let ground = scene.add_geometry(Geometry::cuboid(20.0, 0.1, 20.0));

    let floor = scene.add_material(Material::standard(Vec3::splat(0.6), 0.9, 0.0));
    scene.add(
        Node::mesh(ground, floor)
            .with_position(Vec3::new(0.0, -0.55, 0.0))
            .with_shadows(false, true),
    );

    let colors = [
        Vec3::new(0.9, 0.2, 0.2),
        Vec3::new(0.2, 0.9, 0.2),
        Vec3::new(0.2, 0.2, 0.9),
    ];
    for (i, color) in colors.into_iter().enumerate() {
        let material = scene.add_material(Material::standard(color, 0.4, 0.1));
        scene.add(
            Node::mesh(cube, material)
                .with_position(Vec3::new(i as f32 * 2.0 - 2.0, 0.0, 0.0))
                .with_shadows(true, true),
        );
    }

    let glass = scene.add_material(Material::basic(Vec3::new(0.6, 0.8, 1.0)).with_transparency(0.4));
    scene.add(Node::mesh(cube, glass).with_position(Vec3::new(0.0, 0.5, 2.0)));

    scene.add(Node::light(Light::ambient(Vec3::ONE, 0.2)));
    let shadow = LightShadow {
        map_size: UVec2::splat(1024),
        ..LightShadow::default()
    };
    scene.add(
        Node::light(Light::directional(Vec3::ONE, 1.0).with_shadow(shadow))
            .with_position(Vec3::new(4.0, 8.0, 4.0))
            .with_shadows(true, false),
    );
    scene.add(
        Node::light(Light::point(Vec3::new(1.0, 0.8, 0.6), 2.0, 15.0).with_shadow(LightShadow::default()))
            .with_position(Vec3::new(-3.0, 3.0, 1.0))
            .with_shadows(true, false),
    );
    scene
}
