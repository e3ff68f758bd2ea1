//! The asset build driver.
//!
//! Gathers `.texture`, `.object`, and `.shader` sources, runs every
//! compile pass, and writes the binary blob, generated C++ sources, and
//! caches. Exit code 0 on success, 1 on the first error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use ember_assets::texture::{TextureError, Textures};
use ember_common::buffer::{Buffer, BufferError};
use ember_common::cache::{AssetCache, CacheError};
use ember_objects::{ObjectError, Objects};
use ember_shaders::build::{ShaderBuildError, Shaders};
use ember_shaders::Target;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShaderTarget {
    Hlsl,
    Glsl,
}

impl From<ShaderTarget> for Target {
    fn from(target: ShaderTarget) -> Self {
        match target {
            ShaderTarget::Hlsl => Self::Hlsl,
            ShaderTarget::Glsl => Self::Glsl,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Compiles game assets into the runtime binary and generated sources")]
struct Args {
    /// Root directory of the source assets.
    #[arg(long, default_value = "assets")]
    source: PathBuf,
    /// Root directory for build outputs.
    #[arg(long, default_value = "output")]
    output: PathBuf,
    /// Shader backend to generate.
    #[arg(long, value_enum, default_value_t = ShaderTarget::Hlsl)]
    target: ShaderTarget,
    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum BuildError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Object(#[from] ObjectError),
    #[error(transparent)]
    Shader(#[from] ShaderBuildError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

fn main() -> ExitCode {
    let args = Args::parse();

    pretty_env_logger::formatted_builder()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match build(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Opens a per-domain cache file. A missing or unreadable cache starts
/// fresh and dirty, forcing a full rebuild of that domain.
fn open_cache(path: &Path) -> AssetCache {
    match AssetCache::read(path) {
        Ok(cache) => cache,
        Err(_) => {
            let mut cache = AssetCache::new();
            cache.dirty = true;
            cache
        }
    }
}

fn write_generated(path: &Path, contents: &str) -> Result<(), BuildError> {
    std::fs::write(path, contents)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn build(args: &Args) -> Result<(), BuildError> {
    let generated = args.output.join("generated");
    let cache_dir = args.output.join("cache");
    std::fs::create_dir_all(&generated)?;
    std::fs::create_dir_all(&cache_dir)?;

    let binary_path = args.output.join("assets.bin");
    let previous_binary = binary_path.exists().then(|| binary_path.clone());

    let mut texture_cache = open_cache(&cache_dir.join("textures.cache"));
    let mut object_cache = open_cache(&cache_dir.join("objects.cache"));
    let mut shader_cache = open_cache(&cache_dir.join("shaders.cache"));

    // A missing codegen output invalidates its domain regardless of the
    // cache contents.
    let texture_outputs = [
        generated.join("textures.generated.hpp"),
        generated.join("textures.generated.cpp"),
    ];
    let object_outputs = [
        generated.join("objects.system.generated.hpp"),
        generated.join("objects.generated.hpp"),
        generated.join("objects.generated.cpp"),
        generated.join("objects.generated.intellisense"),
    ];
    let shader_outputs = [
        generated.join("shaders.generated.hpp"),
        generated.join("shaders.generated.cpp"),
    ];
    if texture_outputs.iter().any(|p| !p.exists()) || previous_binary.is_none() {
        texture_cache.dirty = true;
    }
    if object_outputs.iter().any(|p| !p.exists()) {
        object_cache.dirty = true;
    }
    if shader_outputs.iter().any(|p| !p.exists()) {
        shader_cache.dirty = true;
    }

    // Gather
    let mut textures = Textures::new();
    let texture_count = textures.gather(&args.source, true, &mut texture_cache)?;

    let mut objects = Objects::new();
    let object_count = objects.gather(&args.source, true, &mut object_cache)?;

    let mut shaders = Shaders::new();
    let shader_count = shaders.gather(&args.source, true, args.target.into(), &mut shader_cache)?;

    log::info!(
        "gathered {texture_count} textures, {object_count} objects, {shader_count} shaders"
    );

    // Parse, resolve, and validate objects.
    objects.parse()?;
    objects.resolve()?;
    objects.validate()?;
    objects.cache_validate(&mut object_cache);
    shaders.cache_validate(&mut shader_cache);

    // Build the binary blob and texture tables. Cached entries splice
    // their byte ranges out of the previous blob when one exists.
    let mut binary = Buffer::new();
    let mut texture_header = String::new();
    let mut texture_source = String::new();
    textures.build(
        &mut binary,
        &mut texture_cache,
        previous_binary.as_deref(),
        &mut texture_header,
        &mut texture_source,
    )?;

    // Generated sources
    write_generated(&texture_outputs[0], &texture_header)?;
    write_generated(&texture_outputs[1], &texture_source)?;

    write_generated(&object_outputs[0], &objects.codegen_system_header())?;
    write_generated(&object_outputs[1], &objects.codegen_objects_header())?;
    write_generated(&object_outputs[2], &objects.codegen_objects_source()?)?;
    write_generated(&object_outputs[3], &objects.codegen_intellisense())?;

    let mut shader_header = String::new();
    let mut shader_source = String::new();
    shaders.write_header(&mut shader_header);
    shaders.write_source(&mut shader_source);
    write_generated(&shader_outputs[0], &shader_header)?;
    write_generated(&shader_outputs[1], &shader_source)?;

    // Binary blob and caches go last, so a failed build never leaves a
    // cache describing outputs that were not written.
    binary.save(&binary_path)?;
    log::info!("wrote {} ({} bytes)", binary_path.display(), binary.len());

    texture_cache.write(&cache_dir.join("textures.cache"))?;
    object_cache.write(&cache_dir.join("objects.cache"))?;
    shader_cache.write(&cache_dir.join("shaders.cache"))?;

    Ok(())
}
