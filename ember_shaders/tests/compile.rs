use ember_shaders::{compile, ShaderStage, Target};

const FORWARD: &str = r#"
uniform_buffer( 0 ) Globals
{
	float4x4 matrixMVP;
	float2 uvScale;
};

texture2D( 0, float4 ) diffuse;

vertex_input VertexIn
{
	float3 position packed_as( FLOAT32 );
	float2 uv packed_as( FLOAT32 );
};

vertex_output VertexOut
{
	float4 position position_out;
	float2 uv;
};

fragment_input FragmentIn
{
	float4 position position_in;
	float2 uv;
};

fragment_output FragmentOut
{
	float4 color target( 0, COLOR );
};

float4 shade( float2 uv )
{
	return texture_sample_2d( diffuse, uv );
}

void vertex_main( VertexIn input, VertexOut output, Globals globals )
{
	output.position = mul( globals.matrixMVP, float4( input.position, 1.0 ) );
	output.uv = input.uv * globals.uvScale;
}

void fragment_main( FragmentIn input, FragmentOut output, Globals globals )
{
	output.color = shade( input.uv );
}
"#;

fn stage_source(stages: &[(ShaderStage, String)], stage: ShaderStage) -> &str {
    stages
        .iter()
        .find(|(s, _)| *s == stage)
        .map(|(_, text)| text.as_str())
        .expect("missing stage")
}

#[test]
fn forward_shader_hlsl() {
    let shader = compile("forward.shader", FORWARD, Target::Hlsl).unwrap();
    assert_eq!(shader.stages.len(), 2);

    let vertex = stage_source(&shader.stages, ShaderStage::Vertex);
    assert!(vertex.contains("struct SV"));
    assert!(vertex.contains("cbuffer Globals : register( b0 )"));
    assert!(vertex.contains("float4x4 Globals_matrixMVP;"));
    assert!(vertex.contains("Texture2D<float4> diffuse : register( t0 );"));
    assert!(vertex.contains("SamplerState GlobalSampler : register( s0 );"));
    assert!(vertex.contains("float4 position : SV_POSITION;"));
    assert!(vertex.contains("float2 uv : TEXCOORD0;"));
    assert!(vertex.contains(
        "void vs_main( in VertexIn input, out VertexOut output, \
         uint vertexID : SV_VERTEXID, uint instanceID : SV_INSTANCEID )"
    ));
    assert!(vertex.contains("sv.vertexID = vertexID;"));
    // Buffer members are globally namespaced; the buffer argument itself
    // is dropped from calls.
    assert!(vertex
        .contains("output.position = mul( Globals_matrixMVP, float4( input.position, 1.0 ) );"));

    let fragment = stage_source(&shader.stages, ShaderStage::Fragment);
    assert!(fragment.contains("void ps_main( in FragmentIn input, out FragmentOut output,"));
    assert!(fragment.contains("float4 color : SV_TARGET0;"));
    // User functions thread the system-value struct through.
    assert!(fragment.contains("float4 shade( SV sv, float2 uv )"));
    assert!(fragment.contains("output.color = shade( sv, input.uv );"));
    assert!(fragment.contains("diffuse.Sample( GlobalSampler, uv )"));
}

#[test]
fn forward_shader_glsl() {
    let shader = compile("forward.shader", FORWARD, Target::Glsl).unwrap();

    let vertex = stage_source(&shader.stages, ShaderStage::Vertex);
    assert!(vertex.starts_with("#version 450 core"));
    assert!(vertex.contains("layout( std140, binding = 0 ) uniform Globals"));
    assert!(vertex.contains("mat4 Globals_matrixMVP;"));
    assert!(vertex.contains("layout( location = 0 ) in vec3 VertexIn_position;"));
    assert!(vertex.contains("layout( location = 1 ) in vec2 VertexIn_uv;"));
    assert!(vertex.contains("layout( location = 0 ) out vec2 VertexOut_uv;"));
    assert!(vertex.contains("void main()"));
    // The position member resolves to the builtin.
    assert!(vertex.contains("gl_Position = "));
    assert!(vertex.contains("Globals_matrixMVP ) * ( vec4( VertexIn_position, 1.0 ) )"));

    let fragment = stage_source(&shader.stages, ShaderStage::Fragment);
    assert!(fragment.contains("layout( binding = 0 ) uniform sampler2D diffuse;"));
    assert!(fragment.contains("layout( location = 0 ) in vec2 FragmentIn_uv;"));
    assert!(fragment.contains("layout( location = 0 ) out vec4 FragmentOut_color;"));
    assert!(fragment.contains("texture( diffuse, uv )"));
    // No system-value plumbing in GLSL.
    assert!(!fragment.contains("SV sv"));
}

#[test]
fn input_layout_reflection() {
    let shader = compile("forward.shader", FORWARD, Target::Hlsl).unwrap();
    let layouts = &shader.input_layouts;

    assert!(layouts.contains(
        "static void d3d11_input_layout_desc_vertex_VertexIn( D3D11InputLayoutDescription &desc )"
    ));
    assert!(layouts
        .contains("{ \"TEXCOORD\", 0, DXGI_FORMAT_R32G32B32_FLOAT, 0, 0, D3D11_INPUT_PER_VERTEX_DATA, 0 },"));
    assert!(layouts
        .contains("{ \"TEXCOORD\", 1, DXGI_FORMAT_R32G32_FLOAT, 0, 12, D3D11_INPUT_PER_VERTEX_DATA, 0 },"));
    assert!(layouts.contains("desc.count = 2;"));

    let gl = compile("forward.shader", FORWARD, Target::Glsl).unwrap();
    assert!(gl.input_layouts.contains(
        "static void opengl_vertex_layout_vertex_VertexIn( GLVertexLayoutDescription &desc )"
    ));
    assert!(gl
        .input_layouts
        .contains("{ 0, 3, GL_FLOAT, GL_FALSE, 0, 0 }, // position"));
    assert!(gl.input_layouts.contains("desc.stride = 20;"));
}

#[test]
fn uniform_reflection_is_padded() {
    let source = r#"
vertex_input VertexIn
{
	float3 position packed_as( FLOAT32 );
};

vertex_output VertexOut
{
	float4 position position_out;
};

uniform_buffer( 0 ) Params
{
	float3 lightDirection;
	float intensity;
	float3 cameraPosition;
	float4 tint;
};

void vertex_main( VertexIn input, VertexOut output, Params params )
{
	output.position = float4( params.lightDirection, params.intensity );
}
"#;

    let shader = compile("params.shader", source, Target::Hlsl).unwrap();
    let reflection = &shader.uniform_reflection;

    assert!(reflection.contains("struct Params"));
    // float3 + float pack into one register; the float4 after the second
    // float3 must skip 4 bytes to reach a 16-byte boundary.
    assert!(reflection.contains("float_v3 lightDirection;"));
    assert!(reflection.contains("float intensity;"));
    assert!(reflection.contains("float_v3 cameraPosition;"));
    assert!(reflection.contains("u8 _padding0[4];"));
    assert!(reflection.contains("float_v4 tint;"));
}

#[test]
fn instance_input_merges_into_vertex_format() {
    let source = r#"
vertex_input VertexIn
{
	float3 position packed_as( FLOAT32 );
};

instance_input InstanceIn
{
	float4x4 transform packed_as( FLOAT32 );
};

vertex_output VertexOut
{
	float4 position position_out;
};

void vertex_main( VertexIn input, VertexOut output, InstanceIn instances )
{
	output.position = mul( instances.transform, float4( input.position, 1.0 ) );
}
"#;

    let shader = compile("instanced.shader", source, Target::Hlsl).unwrap();
    let vertex = stage_source(&shader.stages, ShaderStage::Vertex);

    // Instance attributes ride in the vertex input struct, accessed
    // through the vertex input variable.
    assert!(vertex.contains("float4x4 InstanceIn_transform : INSTANCE0;"));
    assert!(vertex.contains("mul( input.InstanceIn_transform, float4( input.position, 1.0 ) )"));

    // The matrix spans four per-instance rows at slot 1.
    let layouts = &shader.input_layouts;
    assert!(layouts.contains("d3d11_input_layout_desc_instance_InstanceIn"));
    assert!(layouts.contains(
        "{ \"INSTANCE\", 0, DXGI_FORMAT_R32G32B32A32_FLOAT, 1, 0, D3D11_INPUT_PER_INSTANCE_DATA, 1 },"
    ));
    assert!(layouts.contains(
        "{ \"INSTANCE\", 3, DXGI_FORMAT_R32G32B32A32_FLOAT, 1, 48, D3D11_INPUT_PER_INSTANCE_DATA, 1 },"
    ));
}

#[test]
fn compute_shader() {
    let source = r#"
mutable_buffer( 0, 1024 ) Counters
{
	uint values[256];
};

void compute_main( 8, 8, 1 )( Counters counters )
{
	atomic_add( counters.values[SV_GroupIndex], 1 );
}
"#;

    let shader = compile("tally.shader", source, Target::Hlsl).unwrap();
    let compute = stage_source(&shader.stages, ShaderStage::Compute);
    assert!(compute.contains("[numthreads( 8, 8, 1 )]"));
    assert!(compute.contains("void cs_main("));
    assert!(compute.contains("InterlockedAdd( Counters_values[sv.groupIndex], 1 )"));

    let glsl = compile("tally.shader", source, Target::Glsl).unwrap();
    let compute = stage_source(&glsl.stages, ShaderStage::Compute);
    assert!(compute.contains("layout( local_size_x = 8, local_size_y = 8, local_size_z = 1 ) in;"));
    assert!(compute.contains("layout( std430, binding = 0 ) buffer Counters"));
    assert!(compute.contains("atomicAdd( Counters_values[gl_LocalInvocationIndex], 1 )"));
}

#[test]
fn reversed_main_parameters_are_fatal() {
    let source = r#"
vertex_input VertexIn
{
	float3 position packed_as( FLOAT32 );
};

vertex_output VertexOut
{
	float4 position position_out;
};

void vertex_main( VertexOut output, VertexIn input )
{
	output.position = float4( input.position, 1.0 );
}
"#;

    let err = compile("reversed.shader", source, Target::Hlsl).unwrap_err();
    assert!(err
        .message
        .contains("vertex_main() first parameter must be type 'vertex_input'"));
}

#[test]
fn duplicate_buffer_slot_is_fatal() {
    let source = r#"
uniform_buffer( 2 ) A
{
	float x;
};

uniform_buffer( 2 ) B
{
	float y;
};
"#;

    let err = compile("slots.shader", source, Target::Hlsl).unwrap_err();
    assert!(err.message.contains("slot id '2' is already bound!"));
}

#[test]
fn depth_target_slot_is_restricted() {
    let source = r#"
fragment_input FragmentIn
{
	float4 position position_in;
};

fragment_output FragmentOut
{
	float depth target( 1, DEPTH );
};

void fragment_main( FragmentIn input, FragmentOut output )
{
	output.depth = 0.5;
}
"#;

    let err = compile("depth.shader", source, Target::Hlsl).unwrap_err();
    assert!(err
        .message
        .contains("DEPTH targets can only be bound to slot 0!"));
}

#[test]
fn assignment_to_const_is_fatal() {
    let source = r#"
vertex_input VertexIn
{
	float3 position packed_as( FLOAT32 );
};

vertex_output VertexOut
{
	float4 position position_out;
};

void vertex_main( VertexIn input, VertexOut output )
{
	const float locked = 1.0;
	locked = 2.0;
}
"#;

    let err = compile("const.shader", source, Target::Hlsl).unwrap_err();
    assert!(err.message.contains("LHS must be a modifiable expression"));
}

#[test]
fn unknown_member_is_fatal() {
    let source = r#"
struct Light
{
	float3 direction;
};

vertex_input VertexIn
{
	float3 position packed_as( FLOAT32 );
};

vertex_output VertexOut
{
	float4 position position_out;
};

void vertex_main( VertexIn input, VertexOut output )
{
	Light light = Light( float3( 0.0, 1.0, 0.0 ) );
	float3 up = light.up;
}
"#;

    let err = compile("member.shader", source, Target::Hlsl).unwrap_err();
    assert!(err
        .message
        .contains("'up' is not a member of LHS type 'Light'"));
}

#[test]
fn missing_main_is_fatal() {
    let source = r#"
float4 helper( float4 value )
{
	return value;
}
"#;

    let err = compile("nomain.shader", source, Target::Hlsl).unwrap_err();
    assert!(err
        .message
        .contains("shader does not implement a main function!"));
}

#[test]
fn error_renders_source_line() {
    let source = "void vertex_main( vertex_output o, vertex_input i )\n{\n}\n";
    let err = compile("bad.shader", source, Target::Hlsl).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("bad.shader:1"));
    assert!(rendered.contains("vertex_main"));
    assert!(rendered.contains('^'));
}
