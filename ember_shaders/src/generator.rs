//! Target-language source generation.
//!
//! One generator walks the AST for both backends; the points where HLSL
//! and GLSL genuinely differ dispatch on [`Target`].

use crate::ast::{
    BinaryOp, FunctionId, FunctionType, Node, NodeId, StructType, SVSemanticType, TextureDim,
    TypeId, VariableId,
};
use crate::parser::{
    intrinsic, Intrinsic, Parser, SemanticType, Variable, PRIMITIVE_BOOL, PRIMITIVE_BOOL2,
    PRIMITIVE_BOOL3, PRIMITIVE_BOOL4, PRIMITIVE_FLOAT2, PRIMITIVE_FLOAT2X2, PRIMITIVE_FLOAT3,
    PRIMITIVE_FLOAT3X3, PRIMITIVE_FLOAT4, PRIMITIVE_FLOAT4X4, PRIMITIVE_INT, PRIMITIVE_INT2,
    PRIMITIVE_INT3, PRIMITIVE_INT4, PRIMITIVE_UINT, PRIMITIVE_UINT2, PRIMITIVE_UINT3,
    PRIMITIVE_UINT4, SEMANTIC_COUNT,
};
use crate::ShaderError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Hlsl,
    Glsl,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }
}

pub struct Generator<'a> {
    parser: &'a Parser,
    target: Target,
    stage: ShaderStage,
    output: String,
    indent: String,
    semantic_counts: [u32; SEMANTIC_COUNT],
    generated_sampler: bool,
    /// HLSL folds instance attributes into the vertex input struct; dot
    /// accesses on the instance input are rerouted through this variable.
    vertex_input_variable: String,
}

impl<'a> Generator<'a> {
    pub fn new(parser: &'a Parser, target: Target) -> Self {
        Self {
            parser,
            target,
            stage: ShaderStage::Vertex,
            output: String::new(),
            indent: String::new(),
            semantic_counts: [0; SEMANTIC_COUNT],
            generated_sampler: false,
            vertex_input_variable: String::new(),
        }
    }

    /// Generates the full source of one stage.
    pub fn generate_stage(&mut self, stage: ShaderStage) -> Result<String, ShaderError> {
        self.stage = stage;
        self.output = String::new();
        self.indent = String::new();
        self.generated_sampler = false;

        match self.target {
            Target::Hlsl => self.generate_sv_struct(),
            Target::Glsl => {
                self.output.push_str("#version 450 core\n\n");
                if stage == ShaderStage::Compute {
                    let (x, y, z) = self.parser.thread_group;
                    self.output.push_str(&format!(
                        "layout( local_size_x = {x}, local_size_y = {y}, local_size_z = {z} ) in;\n\n"
                    ));
                }
            }
        }

        for &node in &self.parser.program {
            match *self.parser.ast.get(node) {
                Node::Struct {
                    struct_type,
                    struct_id,
                } => self.generate_structure(struct_type, struct_id)?,
                Node::Texture { dim, texture } => self.generate_texture(dim, texture),
                Node::FunctionDeclaration {
                    function_type,
                    function,
                    block,
                } => {
                    let skip = match function_type {
                        FunctionType::Custom => false,
                        FunctionType::MainVertex => stage != ShaderStage::Vertex,
                        FunctionType::MainFragment => stage != ShaderStage::Fragment,
                        FunctionType::MainCompute => stage != ShaderStage::Compute,
                        // Ray stages have no generated backend here.
                        _ => true,
                    };
                    if !skip {
                        self.generate_function_declaration(function_type, function, block)?;
                    }
                }
                _ => {}
            }
        }

        Ok(std::mem::take(&mut self.output))
    }

    fn indent_add(&mut self) {
        self.indent.push('\t');
    }

    fn indent_sub(&mut self) {
        self.indent.pop();
    }

    /// Target spelling of a type.
    fn type_name(&self, type_id: TypeId) -> String {
        let name = &self.parser.types[type_id].name;
        match self.target {
            Target::Hlsl => name.clone(),
            Target::Glsl => match type_id {
                PRIMITIVE_BOOL2 => "bvec2".to_owned(),
                PRIMITIVE_BOOL3 => "bvec3".to_owned(),
                PRIMITIVE_BOOL4 => "bvec4".to_owned(),
                PRIMITIVE_INT2 => "ivec2".to_owned(),
                PRIMITIVE_INT3 => "ivec3".to_owned(),
                PRIMITIVE_INT4 => "ivec4".to_owned(),
                PRIMITIVE_UINT2 => "uvec2".to_owned(),
                PRIMITIVE_UINT3 => "uvec3".to_owned(),
                PRIMITIVE_UINT4 => "uvec4".to_owned(),
                PRIMITIVE_FLOAT2 => "vec2".to_owned(),
                PRIMITIVE_FLOAT3 => "vec3".to_owned(),
                PRIMITIVE_FLOAT4 => "vec4".to_owned(),
                PRIMITIVE_FLOAT2X2 => "mat2".to_owned(),
                PRIMITIVE_FLOAT3X3 => "mat3".to_owned(),
                PRIMITIVE_FLOAT4X4 => "mat4".to_owned(),
                _ => name.clone(),
            },
        }
    }

    fn variable_name(&self, variable: VariableId) -> &str {
        &self.parser.variables[variable].name
    }

    // System values

    fn generate_sv_struct(&mut self) {
        self.output.push_str("struct SV\n{\n");
        match self.stage {
            ShaderStage::Vertex => {
                self.output.push_str("\tuint vertexID;\n");
                self.output.push_str("\tuint instanceID;\n");
            }
            ShaderStage::Fragment => {
                self.output.push_str("\tuint primitiveID;\n");
                self.output.push_str("\tbool isFrontFace;\n");
            }
            ShaderStage::Compute => {
                self.output.push_str("\tuint3 dispatchThreadID;\n");
                self.output.push_str("\tuint3 groupID;\n");
                self.output.push_str("\tuint3 groupThreadID;\n");
                self.output.push_str("\tuint groupIndex;\n");
            }
        }
        self.output.push_str("};\n\n");
    }

    fn generate_sv_entry_parameters(&mut self) {
        match self.stage {
            ShaderStage::Vertex => {
                self.output
                    .push_str("uint vertexID : SV_VERTEXID, uint instanceID : SV_INSTANCEID");
            }
            ShaderStage::Fragment => {
                self.output.push_str(
                    "uint primitiveID : SV_PRIMITIVEID, bool isFrontFace : SV_ISFRONTFACE",
                );
            }
            ShaderStage::Compute => {
                self.output.push_str(
                    "uint3 dispatchThreadID : SV_DISPATCHTHREADID, \
                     uint3 groupThreadID : SV_GROUPTHREADID, \
                     uint3 groupID : SV_GROUPID, \
                     uint groupIndex : SV_GROUPINDEX",
                );
            }
        }
    }

    fn generate_sv_entry_caching(&mut self) {
        self.output.push_str("\tSV sv;\n");
        match self.stage {
            ShaderStage::Vertex => {
                self.output.push_str("\tsv.vertexID = vertexID;\n");
                self.output.push_str("\tsv.instanceID = instanceID;\n");
            }
            ShaderStage::Fragment => {
                self.output.push_str("\tsv.primitiveID = primitiveID;\n");
                self.output.push_str("\tsv.isFrontFace = isFrontFace;\n");
            }
            ShaderStage::Compute => {
                self.output
                    .push_str("\tsv.dispatchThreadID = dispatchThreadID;\n");
                self.output.push_str("\tsv.groupThreadID = groupThreadID;\n");
                self.output.push_str("\tsv.groupID = groupID;\n");
                self.output.push_str("\tsv.groupIndex = groupIndex;\n");
            }
        }
        self.output.push('\n');
    }

    fn sv_semantic_text(&self, semantic: SVSemanticType) -> &'static str {
        match self.target {
            Target::Hlsl => match semantic {
                SVSemanticType::VertexId => "sv.vertexID",
                SVSemanticType::InstanceId => "sv.instanceID",
                SVSemanticType::PrimitiveId => "sv.primitiveID",
                SVSemanticType::SampleId => "sv.sampleIndex",
                SVSemanticType::IsFrontFace => "sv.isFrontFace",
                SVSemanticType::DispatchThreadId => "sv.dispatchThreadID",
                SVSemanticType::GroupThreadId => "sv.groupThreadID",
                SVSemanticType::GroupId => "sv.groupID",
                SVSemanticType::GroupIndex => "sv.groupIndex",
            },
            Target::Glsl => match semantic {
                SVSemanticType::VertexId => "gl_VertexID",
                SVSemanticType::InstanceId => "gl_InstanceID",
                SVSemanticType::PrimitiveId => "gl_PrimitiveID",
                SVSemanticType::SampleId => "gl_SampleID",
                SVSemanticType::IsFrontFace => "gl_FrontFacing",
                SVSemanticType::DispatchThreadId => "gl_GlobalInvocationID",
                SVSemanticType::GroupThreadId => "gl_LocalInvocationID",
                SVSemanticType::GroupId => "gl_WorkGroupID",
                SVSemanticType::GroupIndex => "gl_LocalInvocationIndex",
            },
        }
    }

    // Structures

    /// HLSL semantic string for a stage IO member, with per-class
    /// counters.
    fn semantic_name(
        &mut self,
        struct_type: StructType,
        variable: &Variable,
    ) -> Result<String, ShaderError> {
        let semantic = variable.semantic.ok_or_else(|| {
            self.parser
                .error(format!("member '{}' is missing a semantic", variable.name))
        })?;

        let base = match (struct_type, semantic) {
            (StructType::VertexOutput | StructType::FragmentInput, SemanticType::Position) => {
                return Ok("SV_POSITION".to_owned());
            }
            (StructType::VertexInput, SemanticType::Position) => {
                return Ok("POSITION".to_owned());
            }
            (StructType::FragmentOutput, SemanticType::Depth) => {
                return Ok("SV_DEPTH".to_owned());
            }
            (StructType::FragmentOutput, SemanticType::Color) => "SV_TARGET",
            (StructType::FragmentOutput, _) => {
                return Err(self.parser.error(format!(
                    "fragment_output: unsupported semantic {}",
                    semantic.name()
                )));
            }
            (_, SemanticType::Depth) => {
                return Err(self
                    .parser
                    .error(format!("{}: unsupported semantic DEPTH", struct_type.keyword())));
            }
            (_, semantic) => semantic.name(),
        };

        let slot = match variable.slot {
            Some(slot) => slot,
            None => {
                let slot = self.semantic_counts[semantic.index()];
                self.semantic_counts[semantic.index()] += 1;
                slot
            }
        };
        Ok(format!("{base}{slot}"))
    }

    fn struct_members(&self, type_id: TypeId) -> std::ops::Range<VariableId> {
        let ty = &self.parser.types[type_id];
        ty.member_first..ty.member_first + ty.member_count
    }

    /// The instance input type folded into the vertex input, when the
    /// shader declares one.
    fn instance_struct(&self) -> Option<TypeId> {
        if self.stage == ShaderStage::Vertex {
            self.parser.instance_format_type
        } else {
            None
        }
    }

    fn generate_structure(
        &mut self,
        struct_type: StructType,
        struct_id: usize,
    ) -> Result<(), ShaderError> {
        // Stage IO only exists in its own stage.
        let relevant = match struct_type {
            StructType::VertexInput | StructType::InstanceInput | StructType::VertexOutput => {
                self.stage == ShaderStage::Vertex
            }
            StructType::FragmentInput | StructType::FragmentOutput => {
                self.stage == ShaderStage::Fragment
            }
            _ => true,
        };
        if !relevant {
            return Ok(());
        }

        match self.target {
            Target::Hlsl => self.generate_structure_hlsl(struct_type, struct_id),
            Target::Glsl => self.generate_structure_glsl(struct_type, struct_id),
        }
    }

    fn generate_structure_hlsl(
        &mut self,
        struct_type: StructType,
        struct_id: usize,
    ) -> Result<(), ShaderError> {
        // Instance attributes are part of the vertex input struct.
        if struct_type == StructType::InstanceInput {
            return Ok(());
        }

        let decl = &self.parser.structs[struct_id];
        let type_id = decl.type_id;
        let type_name = self.type_name(type_id);
        let slot = decl.slot;

        let keyword = if struct_type.is_buffer() {
            "cbuffer"
        } else {
            "struct"
        };

        self.output.push_str(keyword);
        self.output.push(' ');
        self.output.push_str(&type_name);
        if struct_type.is_buffer() {
            self.output.push_str(&format!(" : register( b{slot} )"));
        }
        self.output.push_str("\n{\n");
        self.semantic_counts = [0; SEMANTIC_COUNT];
        self.indent_add();

        self.generate_structure_members_hlsl(struct_type, type_id, "")?;

        // In HLSL, instance_input members belong to the vertex format.
        if struct_type == StructType::VertexInput {
            if let Some(instance_type) = self.instance_struct() {
                let prefix = self.parser.types[instance_type].name.clone();
                self.output.push('\n');
                self.generate_structure_members_hlsl(
                    StructType::InstanceInput,
                    instance_type,
                    &prefix,
                )?;
            }
        }

        self.indent_sub();
        self.output.push_str("};\n\n");
        Ok(())
    }

    fn generate_structure_members_hlsl(
        &mut self,
        struct_type: StructType,
        type_id: TypeId,
        prefix: &str,
    ) -> Result<(), ShaderError> {
        let expect_semantic = !matches!(
            struct_type,
            StructType::Struct
                | StructType::SharedStruct
                | StructType::UniformBuffer
                | StructType::ConstantBuffer
                | StructType::MutableBuffer
        );
        let type_name = self.parser.types[type_id].name.clone();

        for member in self.struct_members(type_id) {
            let variable = self.parser.variables[member].clone();
            let member_type = self.type_name(variable.type_id);

            self.output.push_str(&self.indent.clone());

            // Integer varyings cannot be interpolated.
            if matches!(
                struct_type,
                StructType::VertexOutput | StructType::FragmentInput
            ) && matches!(
                variable.type_id,
                PRIMITIVE_BOOL
                    | PRIMITIVE_BOOL2
                    | PRIMITIVE_BOOL3
                    | PRIMITIVE_BOOL4
                    | PRIMITIVE_INT
                    | PRIMITIVE_INT2
                    | PRIMITIVE_INT3
                    | PRIMITIVE_INT4
                    | PRIMITIVE_UINT
                    | PRIMITIVE_UINT2
                    | PRIMITIVE_UINT3
                    | PRIMITIVE_UINT4
            ) {
                self.output.push_str("nointerpolation ");
            }

            self.output.push_str(&member_type);
            self.output.push(' ');

            // Buffer members live in the global namespace and are
            // prefixed with the buffer name.
            if struct_type.is_buffer() {
                self.output.push_str(&type_name);
                self.output.push('_');
            }
            if !prefix.is_empty() {
                self.output.push_str(prefix);
                self.output.push('_');
            }
            self.output.push_str(&variable.name);

            if variable.array_x > 0 {
                self.output.push_str(&format!("[{}]", variable.array_x));
            }
            if variable.array_y > 0 {
                self.output.push_str(&format!("[{}]", variable.array_y));
            }

            if expect_semantic {
                let semantic = self.semantic_name(struct_type, &variable)?;
                self.output.push_str(" : ");
                self.output.push_str(&semantic);
            }

            self.output.push_str(";\n");
        }

        Ok(())
    }

    fn generate_structure_glsl(
        &mut self,
        struct_type: StructType,
        struct_id: usize,
    ) -> Result<(), ShaderError> {
        let decl = &self.parser.structs[struct_id];
        let type_id = decl.type_id;
        let type_name = self.parser.types[type_id].name.clone();
        let slot = decl.slot;

        match struct_type {
            StructType::Struct | StructType::SharedStruct => {
                self.output.push_str(&format!("struct {type_name}\n{{\n"));
                for member in self.struct_members(type_id) {
                    let variable = self.parser.variables[member].clone();
                    let member_type = self.type_name(variable.type_id);
                    self.output
                        .push_str(&format!("\t{member_type} {}", variable.name));
                    if variable.array_x > 0 {
                        self.output.push_str(&format!("[{}]", variable.array_x));
                    }
                    if variable.array_y > 0 {
                        self.output.push_str(&format!("[{}]", variable.array_y));
                    }
                    self.output.push_str(";\n");
                }
                self.output.push_str("};\n\n");
            }

            StructType::UniformBuffer | StructType::ConstantBuffer => {
                self.output.push_str(&format!(
                    "layout( std140, binding = {slot} ) uniform {type_name}\n{{\n"
                ));
                self.generate_block_members_glsl(type_id, &type_name);
                self.output.push_str("};\n\n");
            }

            StructType::MutableBuffer => {
                self.output.push_str(&format!(
                    "layout( std430, binding = {slot} ) buffer {type_name}\n{{\n"
                ));
                self.generate_block_members_glsl(type_id, &type_name);
                self.output.push_str("};\n\n");
            }

            StructType::VertexInput => {
                let mut location = 0;
                self.generate_attributes_glsl(type_id, &type_name, "in", &mut location);
                if let Some(instance_type) = self.instance_struct() {
                    let instance_name = self.parser.types[instance_type].name.clone();
                    self.generate_attributes_glsl(
                        instance_type,
                        &instance_name,
                        "in",
                        &mut location,
                    );
                }
                self.output.push('\n');
            }

            // Instance attributes are emitted with the vertex input.
            StructType::InstanceInput => {}

            StructType::VertexOutput | StructType::FragmentInput => {
                let direction = if struct_type == StructType::VertexOutput
                    && self.stage == ShaderStage::Vertex
                {
                    "out"
                } else {
                    "in"
                };
                let mut location = 0;
                for member in self.struct_members(type_id) {
                    let variable = self.parser.variables[member].clone();
                    // The position member maps to gl_Position/gl_FragCoord.
                    if variable.semantic == Some(SemanticType::Position) {
                        continue;
                    }
                    let member_type = self.type_name(variable.type_id);
                    let flat = matches!(
                        variable.type_id,
                        PRIMITIVE_BOOL
                            | PRIMITIVE_INT
                            | PRIMITIVE_UINT
                            | PRIMITIVE_BOOL2
                            | PRIMITIVE_INT2
                            | PRIMITIVE_UINT2
                            | PRIMITIVE_BOOL3
                            | PRIMITIVE_INT3
                            | PRIMITIVE_UINT3
                            | PRIMITIVE_BOOL4
                            | PRIMITIVE_INT4
                            | PRIMITIVE_UINT4
                    );
                    self.output.push_str(&format!(
                        "layout( location = {location} ) {}{direction} {member_type} {type_name}_{};\n",
                        if flat { "flat " } else { "" },
                        variable.name
                    ));
                    location += 1;
                }
                self.output.push('\n');
            }

            StructType::FragmentOutput => {
                for member in self.struct_members(type_id) {
                    let variable = self.parser.variables[member].clone();
                    // Depth writes target gl_FragDepth.
                    if variable.semantic == Some(SemanticType::Depth) {
                        continue;
                    }
                    let member_type = self.type_name(variable.type_id);
                    let slot = variable.slot.unwrap_or(0);
                    self.output.push_str(&format!(
                        "layout( location = {slot} ) out {member_type} {type_name}_{};\n",
                        variable.name
                    ));
                }
                self.output.push('\n');
            }
        }

        Ok(())
    }

    fn generate_block_members_glsl(&mut self, type_id: TypeId, type_name: &str) {
        for member in self.struct_members(type_id) {
            let variable = self.parser.variables[member].clone();
            let member_type = self.type_name(variable.type_id);
            self.output
                .push_str(&format!("\t{member_type} {type_name}_{}", variable.name));
            if variable.array_x > 0 {
                self.output.push_str(&format!("[{}]", variable.array_x));
            }
            if variable.array_y > 0 {
                self.output.push_str(&format!("[{}]", variable.array_y));
            }
            self.output.push_str(";\n");
        }
    }

    fn generate_attributes_glsl(
        &mut self,
        type_id: TypeId,
        type_name: &str,
        direction: &str,
        location: &mut u32,
    ) {
        for member in self.struct_members(type_id) {
            let variable = self.parser.variables[member].clone();
            let member_type = self.type_name(variable.type_id);
            self.output.push_str(&format!(
                "layout( location = {location} ) {direction} {member_type} {type_name}_{};\n",
                variable.name
            ));
            // A 4x4 instance matrix consumes four attribute locations.
            *location += if variable.type_id == PRIMITIVE_FLOAT4X4 {
                4
            } else {
                1
            };
        }
    }

    fn generate_texture(&mut self, dim: TextureDim, texture: usize) {
        let decl = &self.parser.textures[texture];
        let variable = &self.parser.variables[decl.variable];
        let texel_type = self.type_name(variable.type_id);
        let name = variable.name.clone();
        let slot = decl.slot;

        match self.target {
            Target::Hlsl => {
                let texture_type = match dim {
                    TextureDim::Texture1D => "Texture1D",
                    TextureDim::Texture1DArray => "Texture1DArray",
                    TextureDim::Texture2D => "Texture2D",
                    TextureDim::Texture2DArray => "Texture2DArray",
                    TextureDim::Texture3D => "Texture3D",
                    TextureDim::TextureCube => "TextureCube",
                    TextureDim::TextureCubeArray => "TextureCubeArray",
                };
                self.output.push_str(&format!(
                    "{texture_type}<{texel_type}> {name} : register( t{slot} );\n"
                ));

                if !self.generated_sampler {
                    self.output
                        .push_str("SamplerState GlobalSampler : register( s0 );\n\n");
                    self.generated_sampler = true;
                }
            }
            Target::Glsl => {
                let sampler_type = match dim {
                    TextureDim::Texture1D => "sampler1D",
                    TextureDim::Texture1DArray => "sampler1DArray",
                    TextureDim::Texture2D => "sampler2D",
                    TextureDim::Texture2DArray => "sampler2DArray",
                    TextureDim::Texture3D => "sampler3D",
                    TextureDim::TextureCube => "samplerCube",
                    TextureDim::TextureCubeArray => "samplerCubeArray",
                };
                self.output.push_str(&format!(
                    "layout( binding = {slot} ) uniform {sampler_type} {name};\n\n"
                ));
            }
        }
    }

    // Functions

    fn generate_function_declaration(
        &mut self,
        function_type: FunctionType,
        function: FunctionId,
        block: NodeId,
    ) -> Result<(), ShaderError> {
        match function_type {
            FunctionType::MainVertex | FunctionType::MainFragment => {
                return self.generate_main_pipeline(function, block);
            }
            FunctionType::MainCompute => return self.generate_main_compute(block),
            _ => {}
        }

        let declaration = &self.parser.functions[function];
        let return_type = self.type_name(declaration.type_id);
        let name = declaration.name.clone();

        self.output.push_str(&return_type);
        self.output.push(' ');
        self.output.push_str(&name);

        let first = declaration.parameter_first;
        let last = first + declaration.parameter_count;

        // HLSL threads the system-value struct through every user
        // function.
        let mut parameters: Vec<String> = Vec::new();
        if self.target == Target::Hlsl {
            parameters.push("SV sv".to_owned());
        }
        for parameter in first..last {
            let variable = self.parser.variables[parameter].clone();
            let parameter_type = &self.parser.types[variable.type_id];

            // Buffers are globals in both targets.
            if parameter_type.token.is_buffer_keyword() {
                continue;
            }

            let mut text = String::new();
            if variable.is_in && !variable.is_out {
                text.push_str("in ");
            } else if !variable.is_in && variable.is_out {
                text.push_str("out ");
            } else if variable.is_in && variable.is_out {
                text.push_str("inout ");
            }
            if variable.constant {
                text.push_str("const ");
            }
            text.push_str(&self.type_name(variable.type_id));
            text.push(' ');
            text.push_str(&variable.name);
            parameters.push(text);
        }

        if parameters.is_empty() {
            self.output.push_str("()\n");
        } else {
            self.output.push_str("( ");
            self.output.push_str(&parameters.join(", "));
            self.output.push_str(" )\n");
        }

        self.generate_statement_block(block)?;
        self.output.push('\n');
        Ok(())
    }

    fn generate_main_pipeline(
        &mut self,
        function: FunctionId,
        block: NodeId,
    ) -> Result<(), ShaderError> {
        let declaration = &self.parser.functions[function];
        let in_id = declaration.parameter_first;
        let out_id = declaration.parameter_first + 1;
        self.vertex_input_variable = self.variable_name(in_id).to_owned();

        match self.target {
            Target::Hlsl => {
                let in_type = self.type_name(self.parser.variables[in_id].type_id);
                let out_type = self.type_name(self.parser.variables[out_id].type_id);
                let main_name = match self.stage {
                    ShaderStage::Vertex => "vs_main",
                    ShaderStage::Fragment => "ps_main",
                    ShaderStage::Compute => "cs_main",
                };

                self.output.push_str(&format!(
                    "void {main_name}( in {in_type} {}, out {out_type} {}, ",
                    self.variable_name(in_id),
                    self.variable_name(out_id)
                ));
                self.generate_sv_entry_parameters();
                self.output.push_str(" )\n{\n");
                self.generate_sv_entry_caching();
                self.generate_statement_block_no_braces(block)?;
                self.output.push_str("}\n");
            }
            Target::Glsl => {
                self.output.push_str("void main()\n{\n");
                self.generate_statement_block_no_braces(block)?;
                self.output.push_str("}\n");
            }
        }
        Ok(())
    }

    fn generate_main_compute(&mut self, block: NodeId) -> Result<(), ShaderError> {
        match self.target {
            Target::Hlsl => {
                let (x, y, z) = self.parser.thread_group;
                self.output
                    .push_str(&format!("[numthreads( {x}, {y}, {z} )]\n"));
                self.output.push_str("void cs_main( ");
                self.generate_sv_entry_parameters();
                self.output.push_str(" )\n{\n");
                self.generate_sv_entry_caching();
                self.generate_statement_block_no_braces(block)?;
                self.output.push_str("}\n");
            }
            Target::Glsl => {
                self.output.push_str("void main()\n{\n");
                self.generate_statement_block_no_braces(block)?;
                self.output.push_str("}\n");
            }
        }
        Ok(())
    }

    // Statements

    fn generate_statement_block(&mut self, block: NodeId) -> Result<(), ShaderError> {
        self.output.push_str(&format!("{}{{\n", self.indent));
        self.generate_statement_block_no_braces(block)?;
        self.output.push_str(&format!("{}}}\n", self.indent));
        Ok(())
    }

    fn generate_statement_block_no_braces(&mut self, block: NodeId) -> Result<(), ShaderError> {
        self.indent_add();
        let mut current = Some(block);
        while let Some(id) = current {
            let Node::StatementBlock { statement, next } = *self.parser.ast.get(id) else {
                // A lone statement hangs directly off control flow.
                self.generate_statement(id)?;
                break;
            };
            if let Some(statement) = statement {
                self.generate_statement(statement)?;
            }
            current = next;
        }
        self.indent_sub();
        Ok(())
    }

    fn generate_statement(&mut self, statement: NodeId) -> Result<(), ShaderError> {
        match *self.parser.ast.get(statement) {
            Node::StatementExpression { expr } => {
                self.output.push_str(&self.indent.clone());
                self.generate_node(expr)?;
                self.output.push_str(";\n");
            }

            Node::StatementBlock { .. } => {
                self.generate_statement_block(statement)?;
            }

            Node::StatementIf {
                condition,
                block_if,
                block_else,
            } => {
                self.output.push_str(&format!("{}if ( ", self.indent));
                self.generate_node(condition)?;
                self.output.push_str(" )\n");
                self.generate_statement_block(block_if)?;

                if let Some(block_else) = block_else {
                    if matches!(self.parser.ast.get(block_else), Node::StatementIf { .. }) {
                        self.output.push_str(&format!("{}else ", self.indent));
                        // Re-enter as a chained `else if`, trimming the
                        // indent the nested statement would add.
                        let trimmed = self.output.len();
                        self.generate_statement(block_else)?;
                        let indent_len = self.indent.len();
                        self.output.drain(trimmed..trimmed + indent_len);
                    } else {
                        self.output.push_str(&format!("{}else\n", self.indent));
                        self.generate_statement_block(block_else)?;
                    }
                }
            }

            Node::StatementWhile { condition, block } => {
                self.output.push_str(&format!("{}while ( ", self.indent));
                self.generate_node(condition)?;
                self.output.push_str(" )\n");
                self.generate_statement_block(block)?;
            }

            Node::StatementDoWhile { condition, block } => {
                self.output.push_str(&format!("{}do\n", self.indent));
                self.generate_statement_block(block)?;
                self.output.push_str(&format!("{}while ( ", self.indent));
                self.generate_node(condition)?;
                self.output.push_str(" );\n");
            }

            Node::StatementFor {
                init,
                condition,
                increment,
                block,
            } => {
                // HLSL compilers tend to unroll aggressively without it.
                let attribute = match self.target {
                    Target::Hlsl => "[loop] ",
                    Target::Glsl => "",
                };
                self.output
                    .push_str(&format!("{}{attribute}for( ", self.indent));
                if let Some(init) = init {
                    self.generate_node(init)?;
                }
                self.output.push_str("; ");
                match condition {
                    Some(condition) => self.generate_node(condition)?,
                    None => self.output.push_str("true"),
                }
                self.output.push(';');
                if let Some(increment) = increment {
                    self.output.push(' ');
                    self.generate_node(increment)?;
                }
                self.output.push_str(" )\n");
                self.generate_statement_block(block)?;
            }

            Node::StatementSwitch { expr, first } => {
                self.output.push_str(&format!("{}switch ( ", self.indent));
                self.generate_node(expr)?;
                self.output.push_str(" )\n");
                self.generate_statement_block(first)?;
            }

            Node::StatementCase { expr, block } => {
                self.output.push_str(&format!("{}case ", self.indent));
                self.generate_node(expr)?;
                self.output.push_str(":\n");
                if let Some(block) = block {
                    self.generate_statement_block(block)?;
                }
            }

            Node::StatementDefault { block } => {
                self.output.push_str(&format!("{}default:\n", self.indent));
                if let Some(block) = block {
                    self.generate_statement_block(block)?;
                }
            }

            Node::StatementReturn { expr } => {
                self.output.push_str(&format!("{}return", self.indent));
                if let Some(expr) = expr {
                    self.output.push(' ');
                    self.generate_node(expr)?;
                }
                self.output.push_str(";\n");
            }

            Node::StatementBreak => {
                self.output.push_str(&format!("{}break;\n", self.indent));
            }
            Node::StatementContinue => {
                self.output.push_str(&format!("{}continue;\n", self.indent));
            }
            Node::StatementDiscard => {
                self.output.push_str(&format!("{}discard;\n", self.indent));
            }

            _ => {
                self.output.push_str(&self.indent.clone());
                self.generate_node(statement)?;
                self.output.push_str(";\n");
            }
        }

        Ok(())
    }

    // Expressions

    fn generate_node(&mut self, node: NodeId) -> Result<(), ShaderError> {
        match *self.parser.ast.get(node) {
            Node::ExpressionBinary { op, lhs, rhs } => match op {
                BinaryOp::Dot => self.generate_expression_dot(lhs, rhs)?,
                BinaryOp::Subscript => {
                    self.generate_node(lhs)?;
                    self.output.push('[');
                    self.generate_node(rhs)?;
                    self.output.push(']');
                }
                _ => {
                    self.generate_node(lhs)?;
                    self.output.push_str(&format!(" {} ", op.symbol()));
                    self.generate_node(rhs)?;
                }
            },

            Node::ExpressionUnary { op, expr } => {
                if op.is_postfix() {
                    self.generate_node(expr)?;
                    self.output.push_str(op.symbol());
                } else {
                    self.output.push_str(op.symbol());
                    self.generate_node(expr)?;
                }
            }

            Node::ExpressionTernary {
                condition,
                expr_true,
                expr_false,
            } => {
                self.generate_node(condition)?;
                self.output.push_str(" ? ");
                self.generate_node(expr_true)?;
                self.output.push_str(" : ");
                self.generate_node(expr_false)?;
            }

            Node::FunctionCall { function, param } => {
                self.generate_function_call(function, param)?;
            }

            Node::VariableDeclaration {
                variable,
                assignment,
            } => {
                let declaration = self.parser.variables[variable].clone();
                if declaration.constant {
                    self.output.push_str("const ");
                }
                let type_name = self.type_name(declaration.type_id);
                self.output.push_str(&type_name);
                self.output.push(' ');
                self.output.push_str(&declaration.name);
                if declaration.array_x > 0 {
                    self.output.push_str(&format!("[{}]", declaration.array_x));
                }
                if declaration.array_y > 0 {
                    self.output.push_str(&format!("[{}]", declaration.array_y));
                }
                if let Some(assignment) = assignment {
                    self.output.push_str(" = ");
                    self.generate_node(assignment)?;
                }
            }

            Node::Variable { variable } => {
                let name = self.variable_name(variable).to_owned();
                self.output.push_str(&name);
            }

            Node::Cast { type_id, param } => {
                let name = self.type_name(type_id);
                self.output.push_str(&name);
                self.output.push_str("( ");
                self.generate_expression_list(param)?;
                self.output.push_str(" )");
            }

            Node::Group { expr } => {
                self.output.push_str("( ");
                self.generate_node(expr)?;
                self.output.push_str(" )");
            }

            Node::Swizzle { swizzle } => {
                let name = self.parser.swizzle_name(swizzle).to_owned();
                self.output.push_str(&name);
            }

            Node::SVSemantic { semantic } => {
                self.output.push_str(self.sv_semantic_text(semantic));
            }

            Node::Integer { value } => {
                self.output.push_str(&value.to_string());
            }

            Node::Number { value } => {
                if value.fract() == 0.0 {
                    self.output.push_str(&format!("{value:.1}"));
                } else {
                    self.output.push_str(&format!("{value}"));
                }
            }

            Node::Boolean { value } => {
                self.output.push_str(if value { "true" } else { "false" });
            }

            Node::ExpressionList { .. } => {
                self.generate_expression_list(Some(node))?;
            }

            _ => return Err(self.parser.error("unexpected node in expression position")),
        }

        Ok(())
    }

    /// First variable on the left spine of a dot chain.
    fn first_member(&self, node: NodeId) -> Option<VariableId> {
        match *self.parser.ast.get(node) {
            Node::Variable { variable } => Some(variable),
            Node::ExpressionBinary {
                op: BinaryOp::Dot | BinaryOp::Subscript,
                lhs,
                ..
            } => self.first_member(lhs),
            _ => None,
        }
    }

    fn generate_expression_dot(&mut self, lhs: NodeId, rhs: NodeId) -> Result<(), ShaderError> {
        if let Node::Variable { variable } = *self.parser.ast.get(lhs) {
            let type_id = self.parser.variables[variable].type_id;
            let ty = &self.parser.types[type_id];
            let type_name = ty.name.clone();
            let token = ty.token;

            // Buffer members are globally namespaced in both targets.
            if token.is_buffer_keyword() {
                self.output.push_str(&type_name);
                self.output.push('_');
                return self.generate_node(rhs);
            }

            if token == crate::token::TokenType::InstanceInput {
                match self.target {
                    Target::Hlsl => {
                        // Instance data rides in the vertex input struct:
                        // <vertex>.<InstanceType>_<member>
                        let substitution = self.vertex_input_variable.clone();
                        self.output.push_str(&substitution);
                        self.output.push('.');
                        self.output.push_str(&type_name);
                        self.output.push('_');
                    }
                    Target::Glsl => {
                        self.output.push_str(&type_name);
                        self.output.push('_');
                    }
                }
                return self.generate_node(rhs);
            }

            // GLSL flattens stage IO structs into globals.
            if self.target == Target::Glsl
                && matches!(
                    token,
                    crate::token::TokenType::VertexInput
                        | crate::token::TokenType::VertexOutput
                        | crate::token::TokenType::FragmentInput
                        | crate::token::TokenType::FragmentOutput
                )
            {
                if let Some(member) = self.first_member(rhs) {
                    let member_variable = &self.parser.variables[member];
                    match (token, member_variable.semantic) {
                        (crate::token::TokenType::VertexOutput, Some(SemanticType::Position)) => {
                            self.output.push_str("gl_Position");
                            return self.generate_dot_tail(rhs);
                        }
                        (crate::token::TokenType::FragmentInput, Some(SemanticType::Position)) => {
                            self.output.push_str("gl_FragCoord");
                            return self.generate_dot_tail(rhs);
                        }
                        (crate::token::TokenType::FragmentOutput, Some(SemanticType::Depth)) => {
                            self.output.push_str("gl_FragDepth");
                            return self.generate_dot_tail(rhs);
                        }
                        _ => {}
                    }
                }
                self.output.push_str(&type_name);
                self.output.push('_');
                return self.generate_node(rhs);
            }
        }

        self.generate_node(lhs)?;
        self.output.push('.');
        self.generate_node(rhs)
    }

    /// Emits everything after the first member of a dot chain, e.g. the
    /// `.xy` of `o.position.xy` once the member became a builtin.
    fn generate_dot_tail(&mut self, rhs: NodeId) -> Result<(), ShaderError> {
        match *self.parser.ast.get(rhs) {
            Node::Variable { .. } => Ok(()),
            Node::ExpressionBinary {
                op: BinaryOp::Dot,
                lhs,
                rhs,
            } => {
                self.generate_dot_tail(lhs)?;
                self.output.push('.');
                self.generate_node(rhs)
            }
            Node::ExpressionBinary {
                op: BinaryOp::Subscript,
                lhs,
                rhs,
            } => {
                self.generate_dot_tail(lhs)?;
                self.output.push('[');
                self.generate_node(rhs)?;
                self.output.push(']');
                Ok(())
            }
            _ => self.generate_node(rhs),
        }
    }

    fn generate_expression_list(&mut self, first: Option<NodeId>) -> Result<(), ShaderError> {
        let mut current = first;
        let mut count = 0;
        while let Some(id) = current {
            let Node::ExpressionList { expr, next } = *self.parser.ast.get(id) else {
                return Err(self.parser.error("malformed expression list"));
            };
            if count > 0 {
                self.output.push_str(", ");
            }
            self.generate_node(expr)?;
            current = next;
            count += 1;
        }
        Ok(())
    }

    // Function calls

    fn nth_param(&self, first: Option<NodeId>, index: usize) -> Result<NodeId, ShaderError> {
        let mut current = first;
        let mut count = 0;
        while let Some(id) = current {
            let Node::ExpressionList { expr, next } = *self.parser.ast.get(id) else {
                break;
            };
            if count == index {
                return Ok(expr);
            }
            current = next;
            count += 1;
        }
        Err(self.parser.error(format!("unable to get parameter {index}")))
    }

    fn generate_call_arguments(
        &mut self,
        function: FunctionId,
        param: Option<NodeId>,
    ) -> Result<(), ShaderError> {
        let is_intrinsic = intrinsic(function).is_some();

        self.output.push('(');
        let mut count = 0;

        if !is_intrinsic && self.target == Target::Hlsl {
            self.output.push_str(" sv");
            count += 1;
        }

        let mut current = param;
        while let Some(id) = current {
            let Node::ExpressionList { expr, next } = *self.parser.ast.get(id) else {
                return Err(self.parser.error("malformed expression list"));
            };

            // Buffer arguments are globals; they never travel through the
            // call.
            let mut skip = false;
            if let Node::Variable { variable } = *self.parser.ast.get(expr) {
                let token = self.parser.types[self.parser.variables[variable].type_id].token;
                if token.is_buffer_keyword() {
                    skip = true;
                }
            }

            if !skip {
                self.output.push_str(if count == 0 { " " } else { ", " });
                self.generate_node(expr)?;
                count += 1;
            }

            current = next;
        }

        self.output.push_str(if count > 0 { " )" } else { ")" });
        Ok(())
    }

    fn generate_function_call(
        &mut self,
        function: FunctionId,
        param: Option<NodeId>,
    ) -> Result<(), ShaderError> {
        let Some(builtin) = intrinsic(function) else {
            let name = self.parser.functions[function].name.clone();
            self.output.push_str(&name);
            return self.generate_call_arguments(function, param);
        };

        match self.target {
            Target::Hlsl => self.generate_intrinsic_hlsl(builtin, function, param),
            Target::Glsl => self.generate_intrinsic_glsl(builtin, function, param),
        }
    }

    fn generate_named_call(
        &mut self,
        name: &str,
        function: FunctionId,
        param: Option<NodeId>,
    ) -> Result<(), ShaderError> {
        self.output.push_str(name);
        self.generate_call_arguments(function, param)
    }

    fn generate_node_parenthesized(&mut self, node: NodeId) -> Result<(), ShaderError> {
        match self.parser.ast.get(node) {
            Node::Integer { .. } | Node::Number { .. } | Node::Variable { .. } | Node::Group { .. } => {
                self.generate_node(node)
            }
            _ => {
                self.output.push_str("( ");
                self.generate_node(node)?;
                self.output.push_str(" )");
                Ok(())
            }
        }
    }

    /// `depth_normalize( z, n, f )` -> `( ( z - n ) / ( f - n ) )`
    fn generate_depth_normalize(&mut self, param: Option<NodeId>) -> Result<(), ShaderError> {
        let depth = self.nth_param(param, 0)?;
        let near = self.nth_param(param, 1)?;
        let far = self.nth_param(param, 2)?;

        self.output.push_str("( ( ");
        self.generate_node_parenthesized(depth)?;
        self.output.push_str(" - ");
        self.generate_node_parenthesized(near)?;
        self.output.push_str(" ) / ( ");
        self.generate_node_parenthesized(far)?;
        self.output.push_str(" - ");
        self.generate_node_parenthesized(near)?;
        self.output.push_str(" ) )");
        Ok(())
    }

    /// `depth_linearize( z, n, f )` ->
    /// `( ( ( ( n * f ) / ( f - z * ( f - n ) ) ) - n ) / ( f - n ) )`
    fn generate_depth_linearize(&mut self, param: Option<NodeId>) -> Result<(), ShaderError> {
        let depth = self.nth_param(param, 0)?;
        let near = self.nth_param(param, 1)?;
        let far = self.nth_param(param, 2)?;

        self.output.push_str("( ( ( ( ");
        self.generate_node_parenthesized(near)?;
        self.output.push_str(" * ");
        self.generate_node_parenthesized(far)?;
        self.output.push_str(" ) / ( ");
        self.generate_node_parenthesized(far)?;
        self.output.push_str(" - ");
        self.generate_node_parenthesized(depth)?;
        self.output.push_str(" * ( ");
        self.generate_node_parenthesized(far)?;
        self.output.push_str(" - ");
        self.generate_node_parenthesized(near)?;
        self.output.push_str(" ) ) ) - ");
        self.generate_node_parenthesized(near)?;
        self.output.push_str(" ) / ( ");
        self.generate_node_parenthesized(far)?;
        self.output.push_str(" - ");
        self.generate_node_parenthesized(near)?;
        self.output.push_str(" ) )");
        Ok(())
    }

    fn generate_depth_unproject(&mut self, param: Option<NodeId>) -> Result<(), ShaderError> {
        let position = self.nth_param(param, 0)?;
        self.output.push_str("( ");
        self.generate_node_parenthesized(position)?;
        self.output.push_str(".z / ");
        self.generate_node_parenthesized(position)?;
        self.output.push_str(".w )");
        Ok(())
    }

    fn generate_depth_unproject_zw(&mut self, param: Option<NodeId>) -> Result<(), ShaderError> {
        let z = self.nth_param(param, 0)?;
        let w = self.nth_param(param, 1)?;
        self.output.push_str("( ");
        self.generate_node_parenthesized(z)?;
        self.output.push_str(" / ");
        self.generate_node_parenthesized(w)?;
        self.output.push_str(" )");
        Ok(())
    }

    fn generate_intrinsic_hlsl(
        &mut self,
        builtin: Intrinsic,
        function: FunctionId,
        param: Option<NodeId>,
    ) -> Result<(), ShaderError> {
        match builtin {
            Intrinsic::Mod => self.generate_named_call("fmod", function, param),

            Intrinsic::BitCount => self.generate_named_call("countbits", function, param),
            Intrinsic::BitFirstHigh => self.generate_named_call("firstbithigh", function, param),
            Intrinsic::BitFirstLow => self.generate_named_call("firstbitlow", function, param),
            Intrinsic::BitReverse => self.generate_named_call("reversebits", function, param),

            Intrinsic::AtomicAdd => self.generate_named_call("InterlockedAdd", function, param),
            Intrinsic::AtomicCompareExchange => {
                self.generate_named_call("InterlockedCompareExchange", function, param)
            }
            Intrinsic::AtomicExchange => {
                self.generate_named_call("InterlockedExchange", function, param)
            }
            Intrinsic::AtomicMax => self.generate_named_call("InterlockedMax", function, param),
            Intrinsic::AtomicMin => self.generate_named_call("InterlockedMin", function, param),
            Intrinsic::AtomicAnd => self.generate_named_call("InterlockedAnd", function, param),
            Intrinsic::AtomicOr => self.generate_named_call("InterlockedOr", function, param),
            Intrinsic::AtomicXor => self.generate_named_call("InterlockedXor", function, param),

            Intrinsic::FloatToIntBits => self.generate_named_call("asint", function, param),
            Intrinsic::FloatToUintBits => self.generate_named_call("asuint", function, param),
            Intrinsic::IntToFloatBits | Intrinsic::UintToFloatBits => {
                self.generate_named_call("asfloat", function, param)
            }

            Intrinsic::TextureSample1D
            | Intrinsic::TextureSample1DArray
            | Intrinsic::TextureSample2D
            | Intrinsic::TextureSample2DArray
            | Intrinsic::TextureSample3D
            | Intrinsic::TextureSample3DArray
            | Intrinsic::TextureSampleCube
            | Intrinsic::TextureSampleCubeArray => {
                // <texture>.Sample( GlobalSampler, location )
                let texture = self.nth_param(param, 0)?;
                let location = self.nth_param(param, 1)?;
                self.generate_node(texture)?;
                self.output.push_str(".Sample( GlobalSampler, ");
                self.generate_node(location)?;
                self.output.push_str(" )");
                Ok(())
            }

            Intrinsic::TextureSample1DLevel
            | Intrinsic::TextureSample2DLevel
            | Intrinsic::TextureSample3DLevel
            | Intrinsic::TextureSampleCubeLevel => {
                // <texture>.SampleLevel( GlobalSampler, location, lod )
                let texture = self.nth_param(param, 0)?;
                let location = self.nth_param(param, 1)?;
                let lod = self.nth_param(param, 2)?;
                self.generate_node(texture)?;
                self.output.push_str(".SampleLevel( GlobalSampler, ");
                self.generate_node(location)?;
                self.output.push_str(", ");
                self.generate_node(lod)?;
                self.output.push_str(" )");
                Ok(())
            }

            Intrinsic::TextureIndex1D => {
                // <texture>.Load( float2( u, lod ) )
                let texture = self.nth_param(param, 0)?;
                let u = self.nth_param(param, 1)?;
                let lod = self.nth_param(param, 2)?;
                self.generate_node(texture)?;
                self.output.push_str(".Load( float2( ");
                self.generate_node(u)?;
                self.output.push_str(", ");
                self.generate_node(lod)?;
                self.output.push_str(" ) )");
                Ok(())
            }

            Intrinsic::TextureIndex2D => {
                // <texture>.Load( float3( u, v, lod ) )
                let texture = self.nth_param(param, 0)?;
                let u = self.nth_param(param, 1)?;
                let v = self.nth_param(param, 2)?;
                let lod = self.nth_param(param, 3)?;
                self.generate_node(texture)?;
                self.output.push_str(".Load( float3( ");
                self.generate_node(u)?;
                self.output.push_str(", ");
                self.generate_node(v)?;
                self.output.push_str(", ");
                self.generate_node(lod)?;
                self.output.push_str(" ) )");
                Ok(())
            }

            Intrinsic::TextureIndex3D | Intrinsic::TextureIndexCube => {
                // <texture>.Load( float4( u, v, w, lod ) )
                let texture = self.nth_param(param, 0)?;
                let u = self.nth_param(param, 1)?;
                let v = self.nth_param(param, 2)?;
                let w = self.nth_param(param, 3)?;
                let lod = self.nth_param(param, 4)?;
                self.generate_node(texture)?;
                self.output.push_str(".Load( float4( ");
                self.generate_node(u)?;
                self.output.push_str(", ");
                self.generate_node(v)?;
                self.output.push_str(", ");
                self.generate_node(w)?;
                self.output.push_str(", ");
                self.generate_node(lod)?;
                self.output.push_str(" ) )");
                Ok(())
            }

            Intrinsic::DepthNormalize => self.generate_depth_normalize(param),
            Intrinsic::DepthLinearize => self.generate_depth_linearize(param),
            Intrinsic::DepthUnproject => self.generate_depth_unproject(param),
            Intrinsic::DepthUnprojectZw => self.generate_depth_unproject_zw(param),

            // Everything else keeps its name in HLSL.
            _ => {
                let name = self.parser.functions[function].name.clone();
                self.generate_named_call(&name, function, param)
            }
        }
    }

    fn generate_intrinsic_glsl(
        &mut self,
        builtin: Intrinsic,
        function: FunctionId,
        param: Option<NodeId>,
    ) -> Result<(), ShaderError> {
        match builtin {
            Intrinsic::ATan2 => self.generate_named_call("atan", function, param),
            Intrinsic::Frac => self.generate_named_call("fract", function, param),
            Intrinsic::RSqrt => self.generate_named_call("inversesqrt", function, param),
            Intrinsic::Lerp => self.generate_named_call("mix", function, param),
            Intrinsic::DDx | Intrinsic::DDxCoarse | Intrinsic::DDxFine => {
                self.generate_named_call("dFdx", function, param)
            }
            Intrinsic::DDy | Intrinsic::DDyCoarse | Intrinsic::DDyFine => {
                self.generate_named_call("dFdy", function, param)
            }

            Intrinsic::Saturate => {
                // No saturate in GLSL; expand to a clamp.
                let value = self.nth_param(param, 0)?;
                self.output.push_str("clamp( ");
                self.generate_node(value)?;
                self.output.push_str(", 0.0, 1.0 )");
                Ok(())
            }

            Intrinsic::Mul => {
                // mul( a, b ) -> ( a * b )
                let a = self.nth_param(param, 0)?;
                let b = self.nth_param(param, 1)?;
                self.output.push_str("( ");
                self.generate_node_parenthesized(a)?;
                self.output.push_str(" * ");
                self.generate_node_parenthesized(b)?;
                self.output.push_str(" )");
                Ok(())
            }

            Intrinsic::BitCount => self.generate_named_call("bitCount", function, param),
            Intrinsic::BitFirstHigh => self.generate_named_call("findMSB", function, param),
            Intrinsic::BitFirstLow => self.generate_named_call("findLSB", function, param),
            Intrinsic::BitReverse => self.generate_named_call("bitfieldReverse", function, param),

            Intrinsic::AtomicAdd => self.generate_named_call("atomicAdd", function, param),
            Intrinsic::AtomicCompareExchange => {
                self.generate_named_call("atomicCompSwap", function, param)
            }
            Intrinsic::AtomicExchange => self.generate_named_call("atomicExchange", function, param),
            Intrinsic::AtomicMax => self.generate_named_call("atomicMax", function, param),
            Intrinsic::AtomicMin => self.generate_named_call("atomicMin", function, param),
            Intrinsic::AtomicAnd => self.generate_named_call("atomicAnd", function, param),
            Intrinsic::AtomicOr => self.generate_named_call("atomicOr", function, param),
            Intrinsic::AtomicXor => self.generate_named_call("atomicXor", function, param),

            Intrinsic::FloatToIntBits => self.generate_named_call("floatBitsToInt", function, param),
            Intrinsic::FloatToUintBits => {
                self.generate_named_call("floatBitsToUint", function, param)
            }
            Intrinsic::IntToFloatBits => self.generate_named_call("intBitsToFloat", function, param),
            Intrinsic::UintToFloatBits => {
                self.generate_named_call("uintBitsToFloat", function, param)
            }

            Intrinsic::TextureSample1D
            | Intrinsic::TextureSample1DArray
            | Intrinsic::TextureSample2D
            | Intrinsic::TextureSample2DArray
            | Intrinsic::TextureSample3D
            | Intrinsic::TextureSample3DArray
            | Intrinsic::TextureSampleCube
            | Intrinsic::TextureSampleCubeArray => {
                let texture = self.nth_param(param, 0)?;
                let location = self.nth_param(param, 1)?;
                self.output.push_str("texture( ");
                self.generate_node(texture)?;
                self.output.push_str(", ");
                self.generate_node(location)?;
                self.output.push_str(" )");
                Ok(())
            }

            Intrinsic::TextureSample1DLevel
            | Intrinsic::TextureSample2DLevel
            | Intrinsic::TextureSample3DLevel
            | Intrinsic::TextureSampleCubeLevel => {
                let texture = self.nth_param(param, 0)?;
                let location = self.nth_param(param, 1)?;
                let lod = self.nth_param(param, 2)?;
                self.output.push_str("textureLod( ");
                self.generate_node(texture)?;
                self.output.push_str(", ");
                self.generate_node(location)?;
                self.output.push_str(", ");
                self.generate_node(lod)?;
                self.output.push_str(" )");
                Ok(())
            }

            Intrinsic::TextureIndex1D => {
                let texture = self.nth_param(param, 0)?;
                let u = self.nth_param(param, 1)?;
                let lod = self.nth_param(param, 2)?;
                self.output.push_str("texelFetch( ");
                self.generate_node(texture)?;
                self.output.push_str(", int( ");
                self.generate_node(u)?;
                self.output.push_str(" ), int( ");
                self.generate_node(lod)?;
                self.output.push_str(" ) )");
                Ok(())
            }

            Intrinsic::TextureIndex2D => {
                let texture = self.nth_param(param, 0)?;
                let u = self.nth_param(param, 1)?;
                let v = self.nth_param(param, 2)?;
                let lod = self.nth_param(param, 3)?;
                self.output.push_str("texelFetch( ");
                self.generate_node(texture)?;
                self.output.push_str(", ivec2( ");
                self.generate_node(u)?;
                self.output.push_str(", ");
                self.generate_node(v)?;
                self.output.push_str(" ), int( ");
                self.generate_node(lod)?;
                self.output.push_str(" ) )");
                Ok(())
            }

            Intrinsic::TextureIndex3D | Intrinsic::TextureIndexCube => {
                let texture = self.nth_param(param, 0)?;
                let u = self.nth_param(param, 1)?;
                let v = self.nth_param(param, 2)?;
                let w = self.nth_param(param, 3)?;
                let lod = self.nth_param(param, 4)?;
                self.output.push_str("texelFetch( ");
                self.generate_node(texture)?;
                self.output.push_str(", ivec3( ");
                self.generate_node(u)?;
                self.output.push_str(", ");
                self.generate_node(v)?;
                self.output.push_str(", ");
                self.generate_node(w)?;
                self.output.push_str(" ), int( ");
                self.generate_node(lod)?;
                self.output.push_str(" ) )");
                Ok(())
            }

            Intrinsic::DepthNormalize => self.generate_depth_normalize(param),
            Intrinsic::DepthLinearize => self.generate_depth_linearize(param),
            Intrinsic::DepthUnproject => self.generate_depth_unproject(param),
            Intrinsic::DepthUnprojectZw => self.generate_depth_unproject_zw(param),

            _ => {
                let name = self.parser.functions[function].name.clone();
                self.generate_named_call(&name, function, param)
            }
        }
    }
}
