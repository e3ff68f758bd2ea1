//! Shader build pipeline: gather, compile, and table generation.

use std::path::Path;

use ember_common::cache::{AssetCache, CacheRecord, FileCountRecord, StampRecord};
use ember_common::fs::directory_iterate;
use ember_common::hash::{hash64, mix64};
use thiserror::Error;

use crate::generator::Target;
use crate::{compile, ShaderCompilation, ShaderError};

pub const COMMENT_BREAK: &str = "////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////";

/// Cache key of the shader file-count record.
const CACHE_KEY_FILE_COUNT: u64 = 0;

#[derive(Debug, Error)]
pub enum ShaderBuildError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Compile(#[from] ShaderError),
}

#[derive(Clone, Debug)]
pub struct CompiledShader {
    pub name: String,
    pub cache_key: u64,
    pub compilation: ShaderCompilation,
}

/// All shaders of one build.
#[derive(Debug, Default)]
pub struct Shaders {
    pub shaders: Vec<CompiledShader>,
    pub file_count: u64,
}

impl Shaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovers and compiles every `.shader` file under `dir`.
    ///
    /// Each shader's content hash is stamped into the cache; an unknown
    /// hash marks the cache dirty so the generated sources are rewritten.
    pub fn gather(
        &mut self,
        dir: &Path,
        recurse: bool,
        target: Target,
        cache: &mut AssetCache,
    ) -> Result<usize, ShaderBuildError> {
        let files = directory_iterate(dir, "shader", recurse)?;

        for file in &files {
            let source = std::fs::read_to_string(&file.path)?;
            let cache_key = mix64(hash64(file.name.as_bytes()), hash64(source.as_bytes()));

            if !cache.dirty && !cache.contains(cache_key) {
                cache.dirty = true;
            }
            cache.store(cache_key, CacheRecord::Stamp(StampRecord));
            self.file_count += 1;

            let path = file.path.display().to_string();
            let compilation = compile(&path, &source, target)?;
            tracing::info!("shader (built) {}", file.name);

            self.shaders.push(CompiledShader {
                name: file.name.clone(),
                cache_key,
                compilation,
            });
        }

        Ok(files.len())
    }

    /// Dirties the cache when shader files were added or removed.
    pub fn cache_validate(&self, cache: &mut AssetCache) {
        match cache.fetch_file_count(CACHE_KEY_FILE_COUNT) {
            Some(count) if count == self.file_count => {}
            _ => cache.dirty = true,
        }

        cache.store(
            CACHE_KEY_FILE_COUNT,
            CacheRecord::FileCount(FileCountRecord {
                count: self.file_count,
            }),
        );
    }

    /// `shaders.generated.hpp`: the Shader enum and entry table.
    pub fn write_header(&self, header: &mut String) {
        header.push_str(COMMENT_BREAK);
        header.push_str("\n\n");

        header.push_str("enum_class\n(\n\tShader, u32,\n\n");
        for shader in &self.shaders {
            header.push('\t');
            header.push_str(&shader.name);
            header.push_str(",\n");
        }
        header.push_str(");\n\n");

        header.push_str("namespace Assets { struct ShaderEntry; }\n\n");
        header.push_str("namespace CoreAssets\n{\n");
        header.push_str(&format!(
            "\tconstexpr u32 shaderCount = {};\n",
            self.shaders.len()
        ));
        if self.shaders.is_empty() {
            header.push_str("\textern const Assets::ShaderEntry *shaders;\n");
        } else {
            header.push_str("\textern const Assets::ShaderEntry shaders[];\n");
        }
        header.push_str("}\n\n");

        // Uniform mirrors
        for shader in &self.shaders {
            if !shader.compilation.uniform_reflection.is_empty() {
                header.push_str(COMMENT_BREAK);
                header.push_str("\n\n");
                header.push_str(&shader.compilation.uniform_reflection);
            }
        }
    }

    /// `shaders.generated.cpp`: stage source literals, input layouts, and
    /// the entry table.
    pub fn write_source(&self, source: &mut String) {
        source.push_str(COMMENT_BREAK);
        source.push_str("\n\n");

        for shader in &self.shaders {
            for (stage, text) in &shader.compilation.stages {
                source.push_str(&format!(
                    "static const char *shader_{}_{}_source =\nR\"(\n{text})\";\n\n",
                    shader.name,
                    stage.name()
                ));
            }
            source.push_str(&shader.compilation.input_layouts);
        }

        source.push_str("namespace CoreAssets\n{\n");
        if self.shaders.is_empty() {
            source.push_str("\tconst Assets::ShaderEntry *shaders = nullptr;\n");
        } else {
            source.push_str("\tconst Assets::ShaderEntry shaders[shaderCount] =\n\t{\n");
            for shader in &self.shaders {
                let stage_ref = |stage: &str, implemented: bool| {
                    if implemented {
                        format!("shader_{}_{stage}_source", shader.name)
                    } else {
                        "nullptr".to_owned()
                    }
                };
                let has = |name: &str| {
                    shader
                        .compilation
                        .stages
                        .iter()
                        .any(|(stage, _)| stage.name() == name)
                };
                source.push_str(&format!(
                    "\t\t{{ {}, {}, {} }}, // {}\n",
                    stage_ref("vertex", has("vertex")),
                    stage_ref("fragment", has("fragment")),
                    stage_ref("compute", has("compute")),
                    shader.name
                ));
            }
            source.push_str("\t};\n");
        }
        source.push_str("}\n\n");
    }
}
