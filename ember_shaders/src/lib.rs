//! Shader cross compiler.
//!
//! Parses the engine's shader DSL into a typed AST and generates HLSL or
//! GLSL per stage, plus the CPU-side input layouts and padded uniform
//! mirrors the runtime links against.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_crate_dependencies)]

pub mod ast;
pub mod build;
pub mod generator;
pub mod parser;
pub mod reflection;
pub mod scanner;
pub mod token;

use std::fmt::{self, Display, Formatter};

pub use generator::{Generator, ShaderStage, Target};
pub use parser::Parser;

/// A fatal shader compile error, rendered with the offending source line
/// and a caret underline.
#[derive(Clone, Debug)]
pub struct ShaderError {
    pub path: String,
    pub line: u32,
    pub message: String,
    source_line: String,
    caret: usize,
}

impl ShaderError {
    pub fn at(path: &str, source: &[u8], line: u32, position: usize, message: String) -> Self {
        let position = position.min(source.len());
        let line_start = source[..position]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        let line_end = source[position..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(source.len(), |i| position + i);

        // Tabs are dropped from the rendering so the caret lines up.
        let raw = &source[line_start..line_end];
        let source_line: String = raw
            .iter()
            .filter(|&&b| b != b'\t')
            .map(|&b| b as char)
            .collect();
        let caret = raw[..(position - line_start).min(raw.len())]
            .iter()
            .filter(|&&b| b != b'\t')
            .count();

        Self {
            path: path.to_owned(),
            line,
            message,
            source_line,
            caret,
        }
    }
}

impl Display for ShaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f, "    {}:{}", self.path, self.line)?;
        writeln!(f)?;
        writeln!(f, "Line {}:", self.line)?;
        writeln!(f, "\t{}", self.source_line)?;
        write!(f, "~~~~{}^", "~".repeat(self.caret))
    }
}

impl std::error::Error for ShaderError {}

/// Everything generated from one shader source.
#[derive(Clone, Debug, Default)]
pub struct ShaderCompilation {
    /// Target-language source per implemented stage.
    pub stages: Vec<(ShaderStage, String)>,
    /// CPU-side vertex/instance layout descriptor functions.
    pub input_layouts: String,
    /// Padded C++ mirrors of the uniform structs.
    pub uniform_reflection: String,
}

/// Compiles a shader source for one target.
pub fn compile(path: &str, source: &str, target: Target) -> Result<ShaderCompilation, ShaderError> {
    let parser = Parser::parse(path, source)?;
    let mut generator = Generator::new(&parser, target);

    let mut stages = Vec::new();
    if parser.main_vertex.is_some() {
        stages.push((
            ShaderStage::Vertex,
            generator.generate_stage(ShaderStage::Vertex)?,
        ));
    }
    if parser.main_fragment.is_some() {
        stages.push((
            ShaderStage::Fragment,
            generator.generate_stage(ShaderStage::Fragment)?,
        ));
    }
    if parser.main_compute.is_some() {
        stages.push((
            ShaderStage::Compute,
            generator.generate_stage(ShaderStage::Compute)?,
        ));
    }

    let input_layouts = reflection::generate_input_layouts(&parser, target)?;
    let uniform_reflection = reflection::generate_uniform_reflection(&parser, false)?;

    tracing::debug!("compiled {} ({} stages)", path, stages.len());
    Ok(ShaderCompilation {
        stages,
        input_layouts,
        uniform_reflection,
    })
}
