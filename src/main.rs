use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use bevy_ecs::prelude::*;
use clap::Parser;
use glam::{Quat, Vec3};
use rehti::{
    engine::{
        assets::load_scene,
        bone_palette::{GpuBonePalette, RecordingSink},
        config::Configuration,
        pose::Pose,
    },
    game::{
        animation::{BonePalette, CharacterData, DeltaTime, animation_schedule},
        model::ModelAsset,
        settings::AnimationSettings,
    },
};
use tracing::{info, warn};

#[derive(clap::Parser)]
struct Opts {
    /// Path to a rigged model (.gltf or .glb).
    model: PathBuf,

    /// Engine configuration file (key=value).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Index of the clip to play. Overrides the configured default clip.
    #[arg(long)]
    clip: Option<usize>,

    /// Simulated time in seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f32,

    /// Ticks per simulated second.
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Number of characters to spawn.
    #[arg(long, default_value_t = 1)]
    characters: usize,

    /// Upload bone palettes to a headless GPU device.
    #[arg(long)]
    gpu: bool,
}

fn create_renderer() -> Option<renderer::Renderer> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        force_fallback_adapter: false,
        compatible_surface: None,
    }))?;

    info!("Using adapter: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("rehti"),
            ..Default::default()
        },
        None,
    ))
    .map_err(|err| warn!("Could not request device: {err}"))
    .ok()?;

    Some(renderer::Renderer::new(device, queue))
}

fn time_per_tick(elapsed: Duration, ticks: usize) -> Duration {
    elapsed.div_f64(ticks.max(1) as f64)
}

fn main() {
    tracing_subscriber::fmt().init();

    let opts = Opts::parse();

    let config = match opts.config {
        Some(ref path) => Configuration::from_file(path).expect("load configuration"),
        None => Configuration::default(),
    };
    let mut settings = AnimationSettings::from_config(&config);
    if let Some(clip) = opts.clip {
        settings.default_clip = clip;
    }

    let scene = load_scene(&opts.model).expect("import model");
    let model = ModelAsset::from_scene(&scene, &settings).expect("build model");

    let vertex_count = model.meshes.iter().map(|m| m.vertices.len()).sum::<usize>();
    info!(
        "Loaded {}: {} meshes, {vertex_count} vertices",
        model.name,
        model.meshes.len()
    );
    for mesh in model.meshes.iter() {
        info!(
            "  {}: {:?}, {} byte stride",
            mesh.name, mesh.attributes, mesh.vertex_layout.array_stride
        );
    }

    let Some(rig) = model.rig.as_ref() else {
        warn!("{} is not animated, nothing to simulate.", model.name);
        return;
    };

    for (index, animation) in rig.animations.iter().enumerate() {
        info!(
            "  [{index}] {} ({:.2}s, {} nodes)",
            animation.name,
            animation.duration,
            animation.animation_nodes.len()
        );
    }

    let renderer = if opts.gpu {
        let renderer = create_renderer().map(Arc::new);
        if renderer.is_none() {
            warn!("No GPU available, recording bone palettes instead.");
        }
        renderer
    } else {
        None
    };

    let mut world = World::new();
    let delta_time = 1.0 / opts.fps.max(1.0);
    world.insert_resource(DeltaTime(delta_time));

    for i in 0..opts.characters {
        // Line the characters up and turn each one a bit.
        let orientation = Pose::from_position(Vec3::new(i as f32 * 2.0, 0.0, 0.0))
            .with_orientation(Quat::from_rotation_y(i as f32 * 0.3));
        let character = rig.instantiate(orientation);

        let palette = renderer
            .as_ref()
            .and_then(|renderer| {
                GpuBonePalette::new(Arc::clone(renderer), &format!("character_{i}"))
                    .map(BonePalette::new)
            })
            .unwrap_or_else(|| BonePalette::new(RecordingSink::with_limit(1)));

        world.spawn((character, palette));
    }

    let mut schedule = animation_schedule();
    let ticks = (opts.seconds.max(0.0) * opts.fps.max(1.0)).round() as usize;

    let start = Instant::now();
    for _ in 0..ticks {
        schedule.run(&mut world);
    }
    if let Some(renderer) = renderer.as_ref() {
        renderer.queue.submit(std::iter::empty());
    }
    let elapsed = start.elapsed();

    info!(
        "Simulated {ticks} ticks for {} characters in {:.2?} ({:.2?} per tick)",
        opts.characters,
        elapsed,
        time_per_tick(elapsed, ticks)
    );

    let mut query = world.query::<&CharacterData>();
    for character in query.iter(&world) {
        let animation_data = &character.animation_data;
        info!(
            "  clip {} at tick {:.2}, root at {:?}",
            animation_data.current_animation_index,
            animation_data.current_ticks,
            character
                .skinning_matrices()
                .first()
                .map(|m| m.w_axis.truncate())
        );
    }
}
