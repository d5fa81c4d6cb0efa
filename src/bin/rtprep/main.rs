//! rtprep CLI - inspect the buffers prepared for GPU ray tracing.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use rtprep::envmap::{EnvMap, EnvMapSamplingData};
use rtprep::prepare::RenderInputs;
use rtprep::sampling::QmcSequence;
use rtprep::scene::{flatten_with, shapes, FlattenOptions, SceneStats, VertexSpace};
use rtprep::settings::RenderSettings;

#[cfg(feature = "chrome-trace")]
type TraceGuard = Option<tracing_chrome::FlushGuard>;
#[cfg(not(feature = "chrome-trace"))]
type TraceGuard = ();

/// Install the fmt subscriber. `RUST_LOG` overrides `level`.
/// With `chrome-trace`, `RTPREP_TRACE=1` also writes `trace.json`.
fn init_tracing(level: &str) -> TraceGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(fmt);

    #[cfg(feature = "chrome-trace")]
    {
        if env::var("RTPREP_TRACE").ok().as_deref() == Some("1") {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file("trace.json")
                .build();
            return registry.with(chrome_layer).try_init().ok().map(|_| guard);
        }
        let _ = registry.try_init();
        None
    }

    #[cfg(not(feature = "chrome-trace"))]
    {
        let _ = registry.try_init();
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut world_space = false;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "-w" | "--world" => world_space = true,
            _ => filtered_args.push(arg),
        }
    }

    let _guard = init_tracing(level);

    let Some(&command) = filtered_args.first() else {
        print_help();
        return Ok(());
    };

    match command {
        "scene" | "s" => cmd_scene(world_space),
        "envmap" | "e" => {
            let Some(path) = filtered_args.get(1) else {
                eprintln!("Usage: rtprep envmap <file.hdr|file.exr>");
                std::process::exit(1);
            };
            cmd_envmap(Path::new(path))
        }
        "qmc" | "q" => {
            let samples = parse_arg(filtered_args.get(1), 16, "samples")?;
            let max_depth = parse_arg(filtered_args.get(2), 5, "max_depth")?;
            let replications = parse_arg(filtered_args.get(3), 1, "replications")?;
            cmd_qmc(samples, max_depth, replications)
        }
        "prepare" | "p" => cmd_prepare(filtered_args.get(1).map(PathBuf::from)),
        "init" => cmd_init(filtered_args.get(1).map(PathBuf::from)),
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    }
}

fn parse_arg(arg: Option<&&str>, default: u32, name: &str) -> Result<u32> {
    match arg {
        Some(s) => s.parse().with_context(|| format!("invalid {name}: '{s}'")),
        None => Ok(default),
    }
}

fn print_help() {
    println!("rtprep - prepare scenes and sampling tables for GPU ray tracing");
    println!();
    println!("USAGE:");
    println!("    rtprep [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    s, scene                           Flatten the default scene and show buffer sizes");
    println!("    e, envmap  <file>                  Build environment sampling tables for an HDR/EXR image");
    println!("    q, qmc     [spp] [depth] [reps]    Generate a scrambled Hammersley buffer");
    println!("    p, prepare [settings.json]         Prepare all render inputs");
    println!("    init       [settings.json]         Write default settings");
    println!("    h, help                            Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    -w, --world      Bake vertices to world space (scene)");
    println!();
    println!("NOTES:");
    println!("    - Without a path, prepare/init use the per-user config directory");
    println!("    - RUST_LOG overrides the log level");
}

fn cmd_scene(world_space: bool) -> Result<()> {
    let root = shapes::default_scene();
    let stats = SceneStats::collect(&root)?;

    let options = FlattenOptions {
        vertex_space: if world_space { VertexSpace::World } else { VertexSpace::Object },
        ..Default::default()
    };
    let store = flatten_with(&root, options).context("failed to flatten default scene")?;
    let buffers = store.export();

    println!("Scene:");
    println!("  Meshes:          {}", stats.meshes);
    println!("  Triangles:       {}", stats.triangles);
    println!("  Material scopes: {}", stats.material_scopes);
    println!("  Vertex space:    {:?}", options.vertex_space);
    println!();
    println!("Objects:");
    for (k, record) in buffers.objects.iter().enumerate() {
        let c = record.material.base_color;
        println!(
            "  [{k}] index_offset={:<6} vertex_offset={:<6} color=({:.2}, {:.2}, {:.2}) metallic={} roughness={}",
            record.index_offset, record.vertex_offset, c.x, c.y, c.z, record.material.metallic, record.material.roughness
        );
    }
    println!();
    println!("Buffers:");
    println!("  objects:    {:>8} bytes", buffers.object_bytes().len());
    println!("  indices:    {:>8} bytes ({} u16)", buffers.index_bytes().len(), buffers.indices.len());
    println!("  vertices:   {:>8} bytes", buffers.vertex_bytes().len());
    println!("  normals:    {:>8} bytes", buffers.normal_bytes().len());
    println!("  tex_coords: {:>8} bytes", buffers.tex_coord_bytes().len());
    println!("  tangents:   {:>8} bytes", buffers.tangent_bytes().len());
    println!("  instances:  {:>8} bytes", buffers.instance_bytes().len());
    println!("  total:      {:>8} bytes", buffers.total_bytes());
    println!("Bounds: {:?}", store.tlas().bounds());
    Ok(())
}

fn cmd_envmap(path: &Path) -> Result<()> {
    let env = EnvMap::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    let data = EnvMapSamplingData::build(&env)
        .with_context(|| format!("cannot importance-sample {}", path.display()))?;

    let marginal_end = data.marginal_cdf().last().copied().unwrap_or_default();
    let pdf_sum: f64 = data.pdf().iter().map(|&p| p as f64).sum();

    println!("Environment: {}", path.display());
    println!("  Size:            {}x{}", data.width(), data.height());
    println!("  Total luminance: {:.4}", data.total_luminance());
    println!("  Sum of pdf:      {pdf_sum:.6}");
    println!("  Marginal CDF end: {marginal_end:.6}");
    println!("  Table bytes:     pdf={} marginal={} conditional={}",
        data.pdf_bytes().len(),
        data.marginal_cdf_bytes().len(),
        data.conditional_cdf_bytes().len()
    );
    println!();
    println!("Sample directions (u, v -> row, col, pdf):");
    for &(u, v) in &[(0.1f32, 0.1f32), (0.5, 0.5), (0.9, 0.9)] {
        let s = data.sample(u, v);
        println!("  ({u:.1}, {v:.1}) -> ({}, {}, {:.3e})", s.row, s.col, s.pdf);
    }
    Ok(())
}

fn cmd_qmc(samples: u32, max_depth: u32, replications: u32) -> Result<()> {
    let seq = QmcSequence::new(max_depth, samples, replications, scrambled_hammersley::DEFAULT_SEED)?;
    let dims = seq.dimensions();

    println!("Scrambled Hammersley:");
    println!("  Dimensions:   {dims}");
    println!("  Samples:      {samples}");
    println!("  Replications: {replications}");
    println!("  Floats:       {} ({} bytes)", seq.as_slice().len(), seq.as_bytes().len());
    println!();
    for i in 0..(samples as usize).min(8) {
        let point = seq.set().point(0, i);
        let shown: Vec<String> = point.iter().take(4).map(|x| format!("{x:.4}")).collect();
        println!("  [{i}] {}{}", shown.join(" "), if dims > 4 { " ..." } else { "" });
    }
    Ok(())
}

fn settings_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path.or_else(RenderSettings::default_path) {
        Some(p) => Ok(p),
        None => bail!("no settings path given and no config directory available"),
    }
}

fn cmd_prepare(path: Option<PathBuf>) -> Result<()> {
    let path = settings_path(path)?;
    let settings = if path.exists() {
        RenderSettings::load(&path).with_context(|| format!("failed to load {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "no settings file, using defaults");
        RenderSettings::default()
    };

    let inputs = RenderInputs::from_settings(settings)?;
    let s = inputs.settings();
    let u = inputs.uniform();

    println!("Render inputs:");
    println!("  Screen:           {}x{}", s.width, s.height);
    println!("  Algorithm:        {}", s.algorithm);
    println!("  Samples/pixel:    {}", u.samples_per_pixel);
    println!("  Max depth:        {} ({} sample dimensions)", u.max_depth, s.sampling_dimensions());
    println!("  Env texture slot: {}", u.env_map_texture_idx);
    println!("  Objects:          {}", inputs.buffers().objects.len());
    println!("  Scene bytes:      {}", inputs.buffers().total_bytes());
    match inputs.qmc() {
        Some(qmc) => println!("  QMC buffer:       {} bytes", qmc.as_bytes().len()),
        None => println!("  QMC buffer:       -"),
    }
    Ok(())
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let path = settings_path(path)?;
    RenderSettings::default()
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
