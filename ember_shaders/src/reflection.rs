//! CPU-side reflection of shader interfaces.
//!
//! Emits the vertex/instance input-layout descriptors the runtime feeds
//! to the GPU API, and C++ mirrors of uniform structs padded to constant
//! buffer packing rules.

use crate::ast::{StructType, TypeId};
use crate::generator::Target;
use crate::parser::{InputFormat, Parser, SemanticType, Variable, SEMANTIC_COUNT};
use crate::parser::{
    PRIMITIVE_BOOL, PRIMITIVE_BOOL2, PRIMITIVE_BOOL3, PRIMITIVE_BOOL4, PRIMITIVE_FLOAT,
    PRIMITIVE_FLOAT2, PRIMITIVE_FLOAT2X2, PRIMITIVE_FLOAT3, PRIMITIVE_FLOAT3X3, PRIMITIVE_FLOAT4,
    PRIMITIVE_FLOAT4X4, PRIMITIVE_INT, PRIMITIVE_INT2, PRIMITIVE_INT3, PRIMITIVE_INT4,
    PRIMITIVE_UINT, PRIMITIVE_UINT2, PRIMITIVE_UINT3, PRIMITIVE_UINT4,
};
use crate::ShaderError;

fn lane_count(type_id: TypeId) -> Option<u32> {
    match type_id {
        PRIMITIVE_BOOL | PRIMITIVE_INT | PRIMITIVE_UINT | PRIMITIVE_FLOAT => Some(1),
        PRIMITIVE_BOOL2 | PRIMITIVE_INT2 | PRIMITIVE_UINT2 | PRIMITIVE_FLOAT2 => Some(2),
        PRIMITIVE_BOOL3 | PRIMITIVE_INT3 | PRIMITIVE_UINT3 | PRIMITIVE_FLOAT3 => Some(3),
        PRIMITIVE_BOOL4 | PRIMITIVE_INT4 | PRIMITIVE_UINT4 | PRIMITIVE_FLOAT4 => Some(4),
        _ => None,
    }
}

/// DXGI format and byte size for a lane count and packed format. Three
/// lane 8/16-bit attributes pad up to four lanes; three lane 32-bit NORM
/// formats have no DXGI equivalent and fall back to TYPELESS.
fn dxgi_format(lanes: u32, format: InputFormat) -> (&'static str, u32) {
    use InputFormat::*;
    match (lanes, format) {
        (1, Unorm8) => ("DXGI_FORMAT_R8_UNORM", 1),
        (1, Snorm8) => ("DXGI_FORMAT_R8_SNORM", 1),
        (1, Uint8) => ("DXGI_FORMAT_R8_UINT", 1),
        (1, Sint8) => ("DXGI_FORMAT_R8_SINT", 1),
        (1, Unorm16) => ("DXGI_FORMAT_R16_UNORM", 2),
        (1, Snorm16) => ("DXGI_FORMAT_R16_SNORM", 2),
        (1, Uint16) => ("DXGI_FORMAT_R16_UINT", 2),
        (1, Sint16) => ("DXGI_FORMAT_R16_SINT", 2),
        (1, Float16) => ("DXGI_FORMAT_R16_FLOAT", 2),
        (1, Unorm32) => ("DXGI_FORMAT_R32_UNORM", 4),
        (1, Snorm32) => ("DXGI_FORMAT_R32_SNORM", 4),
        (1, Uint32) => ("DXGI_FORMAT_R32_UINT", 4),
        (1, Sint32) => ("DXGI_FORMAT_R32_SINT", 4),
        (1, Float32) => ("DXGI_FORMAT_R32_FLOAT", 4),

        (2, Unorm8) => ("DXGI_FORMAT_R8G8_UNORM", 2),
        (2, Snorm8) => ("DXGI_FORMAT_R8G8_SNORM", 2),
        (2, Uint8) => ("DXGI_FORMAT_R8G8_UINT", 2),
        (2, Sint8) => ("DXGI_FORMAT_R8G8_SINT", 2),
        (2, Unorm16) => ("DXGI_FORMAT_R16G16_UNORM", 4),
        (2, Snorm16) => ("DXGI_FORMAT_R16G16_SNORM", 4),
        (2, Uint16) => ("DXGI_FORMAT_R16G16_UINT", 4),
        (2, Sint16) => ("DXGI_FORMAT_R16G16_SINT", 4),
        (2, Float16) => ("DXGI_FORMAT_R16G16_FLOAT", 4),
        (2, Unorm32) => ("DXGI_FORMAT_R32G32_UNORM", 8),
        (2, Snorm32) => ("DXGI_FORMAT_R32G32_SNORM", 8),
        (2, Uint32) => ("DXGI_FORMAT_R32G32_UINT", 8),
        (2, Sint32) => ("DXGI_FORMAT_R32G32_SINT", 8),
        (2, Float32) => ("DXGI_FORMAT_R32G32_FLOAT", 8),

        (3, Unorm8) => ("DXGI_FORMAT_R8G8B8A8_UNORM", 4),
        (3, Snorm8) => ("DXGI_FORMAT_R8G8B8A8_SNORM", 4),
        (3, Uint8) => ("DXGI_FORMAT_R8G8B8A8_UINT", 4),
        (3, Sint8) => ("DXGI_FORMAT_R8G8B8A8_SINT", 4),
        (3, Unorm16) => ("DXGI_FORMAT_R16G16B16A16_UNORM", 8),
        (3, Snorm16) => ("DXGI_FORMAT_R16G16B16A16_SNORM", 8),
        (3, Uint16) => ("DXGI_FORMAT_R16G16B16A16_UINT", 8),
        (3, Sint16) => ("DXGI_FORMAT_R16G16B16A16_SINT", 8),
        (3, Float16) => ("DXGI_FORMAT_R16G16B16A16_FLOAT", 8),
        (3, Unorm32) => ("DXGI_FORMAT_R32G32B32_TYPELESS", 12),
        (3, Snorm32) => ("DXGI_FORMAT_R32G32B32_TYPELESS", 12),
        (3, Uint32) => ("DXGI_FORMAT_R32G32B32_UINT", 12),
        (3, Sint32) => ("DXGI_FORMAT_R32G32B32_SINT", 12),
        (3, Float32) => ("DXGI_FORMAT_R32G32B32_FLOAT", 12),

        (_, Unorm8) => ("DXGI_FORMAT_R8G8B8A8_UNORM", 4),
        (_, Snorm8) => ("DXGI_FORMAT_R8G8B8A8_SNORM", 4),
        (_, Uint8) => ("DXGI_FORMAT_R8G8B8A8_UINT", 4),
        (_, Sint8) => ("DXGI_FORMAT_R8G8B8A8_SINT", 4),
        (_, Unorm16) => ("DXGI_FORMAT_R16G16B16A16_UNORM", 8),
        (_, Snorm16) => ("DXGI_FORMAT_R16G16B16A16_SNORM", 8),
        (_, Uint16) => ("DXGI_FORMAT_R16G16B16A16_UINT", 8),
        (_, Sint16) => ("DXGI_FORMAT_R16G16B16A16_SINT", 8),
        (_, Float16) => ("DXGI_FORMAT_R16G16B16A16_FLOAT", 8),
        (_, Unorm32) => ("DXGI_FORMAT_R32G32B32A32_TYPELESS", 16),
        (_, Snorm32) => ("DXGI_FORMAT_R32G32B32A32_TYPELESS", 16),
        (_, Uint32) => ("DXGI_FORMAT_R32G32B32A32_UINT", 16),
        (_, Sint32) => ("DXGI_FORMAT_R32G32B32A32_SINT", 16),
        (_, Float32) => ("DXGI_FORMAT_R32G32B32A32_FLOAT", 16),
    }
}

/// GL vertex attribute component type, normalized flag, and byte size
/// per component.
fn gl_format(format: InputFormat) -> (&'static str, bool, u32) {
    use InputFormat::*;
    match format {
        Unorm8 => ("GL_UNSIGNED_BYTE", true, 1),
        Snorm8 => ("GL_BYTE", true, 1),
        Uint8 => ("GL_UNSIGNED_BYTE", false, 1),
        Sint8 => ("GL_BYTE", false, 1),
        Unorm16 => ("GL_UNSIGNED_SHORT", true, 2),
        Snorm16 => ("GL_SHORT", true, 2),
        Uint16 => ("GL_UNSIGNED_SHORT", false, 2),
        Sint16 => ("GL_SHORT", false, 2),
        Float16 => ("GL_HALF_FLOAT", false, 2),
        Unorm32 => ("GL_UNSIGNED_INT", true, 4),
        Snorm32 => ("GL_INT", true, 4),
        Uint32 => ("GL_UNSIGNED_INT", false, 4),
        Sint32 => ("GL_INT", false, 4),
        Float32 => ("GL_FLOAT", false, 4),
    }
}

struct LayoutMember {
    variable: Variable,
    /// Row count; 4 for the instance 4x4 matrix, 1 otherwise.
    rows: u32,
    lanes: u32,
}

fn layout_members(parser: &Parser, type_id: TypeId) -> Result<Vec<LayoutMember>, ShaderError> {
    let ty = &parser.types[type_id];
    let mut members = Vec::new();

    for member in ty.member_first..ty.member_first + ty.member_count {
        let variable = parser.variables[member].clone();

        let (rows, lanes) = if variable.type_id == PRIMITIVE_FLOAT4X4 {
            (4, 4)
        } else {
            match lane_count(variable.type_id) {
                Some(lanes) => (1, lanes),
                None => {
                    return Err(parser.error(format!(
                        "member '{}' is not a packable input type",
                        variable.name
                    )));
                }
            }
        };

        members.push(LayoutMember {
            variable,
            rows,
            lanes,
        });
    }

    Ok(members)
}

/// Emits the input-layout descriptor function for one vertex or instance
/// format. `instanced` selects slot 1 / per-instance stepping.
fn generate_layout(
    parser: &Parser,
    target: Target,
    type_id: TypeId,
    instanced: bool,
    output: &mut String,
) -> Result<(), ShaderError> {
    let type_name = &parser.types[type_id].name;
    let members = layout_members(parser, type_id)?;
    let kind = if instanced { "instance" } else { "vertex" };

    match target {
        Target::Hlsl => {
            let mut semantic_index = [0u32; SEMANTIC_COUNT];
            let mut byte_offset = 0;
            let mut entries = Vec::new();

            for member in &members {
                let semantic = member.variable.semantic.unwrap_or(SemanticType::Texcoord);
                // A matrix input takes one row per attribute slot.
                for _ in 0..member.rows {
                    let format = member.variable.format.unwrap_or(InputFormat::Float32);
                    let (format_name, format_size) = dxgi_format(member.lanes, format);
                    let index = semantic_index[semantic.index()];
                    semantic_index[semantic.index()] += 1;

                    let (slot, class, step) = if instanced {
                        (1, "D3D11_INPUT_PER_INSTANCE_DATA", 1)
                    } else {
                        (0, "D3D11_INPUT_PER_VERTEX_DATA", 0)
                    };
                    entries.push(format!(
                        "\t\t{{ \"{}\", {index}, {format_name}, {slot}, {byte_offset}, {class}, {step} }},",
                        semantic.name()
                    ));
                    byte_offset += format_size;
                }
            }

            output.push_str(&format!(
                "static void d3d11_input_layout_desc_{kind}_{type_name}( D3D11InputLayoutDescription &desc )\n{{\n"
            ));
            if entries.is_empty() {
                output.push_str("\tstatic D3D11_INPUT_ELEMENT_DESC *inputDescription = nullptr;\n");
            } else {
                output.push_str("\tstatic D3D11_INPUT_ELEMENT_DESC inputDescription[] = \n\t{\n");
                for entry in &entries {
                    output.push_str(entry);
                    output.push('\n');
                }
                output.push_str("\t};\n");
            }
            output.push('\n');
            output.push_str("\tdesc.desc = inputDescription;\n");
            output.push_str(&format!("\tdesc.count = {};\n", entries.len()));
            output.push_str("}\n\n");
        }

        Target::Glsl => {
            let mut attribute = 0u32;
            let mut byte_offset = 0;
            let mut entries = Vec::new();

            for member in &members {
                let format = member.variable.format.unwrap_or(InputFormat::Float32);
                let (gl_type, normalized, component_size) = gl_format(format);
                for _ in 0..member.rows {
                    let divisor = u32::from(instanced);
                    entries.push(format!(
                        "\t\t{{ {attribute}, {}, {gl_type}, {}, {byte_offset}, {divisor} }}, // {}",
                        member.lanes,
                        if normalized { "GL_TRUE" } else { "GL_FALSE" },
                        member.variable.name
                    ));
                    attribute += 1;
                    byte_offset += member.lanes * component_size;
                }
            }

            output.push_str(&format!(
                "static void opengl_vertex_layout_{kind}_{type_name}( GLVertexLayoutDescription &desc )\n{{\n"
            ));
            if entries.is_empty() {
                output.push_str("\tstatic GLVertexAttribute *attributes = nullptr;\n");
            } else {
                output.push_str("\tstatic GLVertexAttribute attributes[] =\n\t{\n");
                for entry in &entries {
                    output.push_str(entry);
                    output.push('\n');
                }
                output.push_str("\t};\n");
            }
            output.push('\n');
            output.push_str("\tdesc.attributes = attributes;\n");
            output.push_str(&format!("\tdesc.count = {};\n", entries.len()));
            output.push_str(&format!("\tdesc.stride = {byte_offset};\n"));
            output.push_str("}\n\n");
        }
    }

    Ok(())
}

/// Input-layout descriptors for the shader's vertex and instance formats.
pub fn generate_input_layouts(parser: &Parser, target: Target) -> Result<String, ShaderError> {
    let mut output = String::new();

    if let Some(vertex) = parser.vertex_format_type {
        generate_layout(parser, target, vertex, false, &mut output)?;
    }
    if let Some(instance) = parser.instance_format_type {
        generate_layout(parser, target, instance, true, &mut output)?;
    }

    Ok(output)
}

/// CPU type name and `{size, align}` of a primitive under constant
/// buffer packing.
fn cpu_type(type_id: TypeId) -> Option<(&'static str, u32, u32)> {
    match type_id {
        PRIMITIVE_BOOL | PRIMITIVE_UINT => Some(("u32", 4, 4)),
        PRIMITIVE_BOOL2 | PRIMITIVE_UINT2 => Some(("u32_v2", 8, 4)),
        PRIMITIVE_BOOL3 | PRIMITIVE_UINT3 => Some(("u32_v3", 12, 4)),
        PRIMITIVE_BOOL4 | PRIMITIVE_UINT4 => Some(("u32_v4", 16, 16)),
        PRIMITIVE_INT => Some(("i32", 4, 4)),
        PRIMITIVE_INT2 => Some(("int_v2", 8, 4)),
        PRIMITIVE_INT3 => Some(("int_v3", 12, 4)),
        PRIMITIVE_INT4 => Some(("int_v4", 16, 16)),
        PRIMITIVE_FLOAT => Some(("float", 4, 4)),
        PRIMITIVE_FLOAT2 => Some(("float_v2", 8, 4)),
        PRIMITIVE_FLOAT3 => Some(("float_v3", 12, 4)),
        PRIMITIVE_FLOAT4 => Some(("float_v4", 16, 16)),
        PRIMITIVE_FLOAT2X2 | PRIMITIVE_FLOAT3X3 | PRIMITIVE_FLOAT4X4 => {
            Some(("float_m44", 64, 16))
        }
        _ => None,
    }
}

fn round_up16(value: u32) -> u32 {
    (value + 15) & !15
}

/// Padding inserted before a member at `offset`: first to its alignment,
/// then forward to the next 16-byte register if the member would
/// straddle one.
fn structure_padding(size: u32, align: u32, offset: u32) -> u32 {
    let mut pad = (align - offset % align) % align;
    let start = offset + pad;
    if size < 16 && start / 16 != (start + size - 1) / 16 {
        pad += 16 - start % 16;
    }
    pad
}

/// Member size and alignment, resolving shared-struct members to their
/// padded size.
fn member_layout(parser: &Parser, type_id: TypeId) -> Option<(String, u32, u32)> {
    if let Some((name, size, align)) = cpu_type(type_id) {
        return Some((name.to_owned(), size, align));
    }

    let ty = &parser.types[type_id];
    if ty.token == crate::token::TokenType::SharedStruct {
        let size = padded_struct_size(parser, type_id)?;
        return Some((format!("GfxStructPadded::{}", ty.name), size, 16));
    }

    None
}

/// Total padded byte size of a struct, rounded up to a full register.
fn padded_struct_size(parser: &Parser, type_id: TypeId) -> Option<u32> {
    let ty = &parser.types[type_id];
    let mut offset = 0;

    for member in ty.member_first..ty.member_first + ty.member_count {
        let variable = &parser.variables[member];
        let (_, size, align) = member_layout(parser, variable.type_id)?;

        let (total, align) = if variable.array_x > 0 {
            let count = variable.array_x * variable.array_y.max(1);
            (round_up16(size) * (count - 1) + size, 16)
        } else {
            (size, align)
        };

        offset += structure_padding(total.min(16), align, offset);
        offset += total;
    }

    Some(round_up16(offset))
}

/// Emits one padded C++ mirror struct.
fn generate_struct_reflection(
    parser: &Parser,
    type_id: TypeId,
    emit_size_asserts: bool,
    output: &mut String,
) -> Result<(), ShaderError> {
    let ty = &parser.types[type_id];
    let shared = ty.token == crate::token::TokenType::SharedStruct;

    if shared {
        output.push_str(&format!("namespace GfxStructPadded\n{{\n\nstruct {}\n{{\n", ty.name));
    } else {
        output.push_str(&format!("struct {}\n{{\n", ty.name));
    }

    let mut offset = 0u32;
    let mut padding_index = 0;
    for member in ty.member_first..ty.member_first + ty.member_count {
        let variable = parser.variables[member].clone();
        let Some((cpu_name, size, align)) = member_layout(parser, variable.type_id) else {
            return Err(parser.error(format!(
                "member '{}' has no constant buffer representation",
                variable.name
            )));
        };

        // Arrays use the wrapper templates with a 16-byte element stride.
        let (type_text, total, align) = if variable.array_x > 0 && variable.array_y > 0 {
            let text = format!(
                "std140_array_2d<{cpu_name}, {}, {}>",
                variable.array_x, variable.array_y
            );
            let count = variable.array_x * variable.array_y;
            (text, round_up16(size) * (count - 1) + size, 16)
        } else if variable.array_x > 0 {
            let text = format!("std140_array_1d<{cpu_name}, {}>", variable.array_x);
            (text, round_up16(size) * (variable.array_x - 1) + size, 16)
        } else {
            (cpu_name, size, align)
        };

        let pad = structure_padding(total.min(16), align, offset);
        if pad > 0 {
            output.push_str(&format!("\tu8 _padding{padding_index}[{pad}];\n"));
            padding_index += 1;
            offset += pad;
        }

        if emit_size_asserts {
            output.push_str(&format!(
                "\tstatic_assert( sizeof( {type_text} ) == {total}, \"size mismatch!\" );\n"
            ));
        }

        output.push_str(&format!("\t{type_text} {};", variable.name));
        if emit_size_asserts {
            output.push_str(&format!(" // Offset: {offset}"));
        }
        output.push('\n');

        offset += total;
    }

    if shared {
        output.push_str("};\n\n}\n\n");
    } else {
        output.push_str("};\n\n");
    }
    Ok(())
}

/// Padded C++ mirrors for every shared struct and uniform block.
pub fn generate_uniform_reflection(
    parser: &Parser,
    emit_size_asserts: bool,
) -> Result<String, ShaderError> {
    let mut output = String::new();

    for decl in &parser.structs {
        match decl.struct_type {
            StructType::SharedStruct
            | StructType::UniformBuffer
            | StructType::ConstantBuffer
            | StructType::MutableBuffer => {
                generate_struct_reflection(parser, decl.type_id, emit_size_asserts, &mut output)?;
            }
            _ => {}
        }
    }

    Ok(output)
}
