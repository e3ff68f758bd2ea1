//! Recursive descent parser producing the typed shader AST.

use std::collections::HashMap;

use crate::ast::{
    Ast, BinaryOp, FunctionId, FunctionType, Node, NodeId, StructId, StructType, SVSemanticType,
    TextureDim, TextureId, TypeId, UnaryOp, VariableId, SV_SEMANTICS,
};
use crate::scanner::{Scanner, ScannerMode};
use crate::token::{Token, TokenType, KEYWORDS};
use crate::ShaderError;

pub const SHADER_MAX_BUFFER_SLOTS: usize = 16;
pub const SHADER_MAX_TEXTURE_SLOTS: usize = 16;
pub const SHADER_MAX_TARGET_SLOTS: usize = 8;

// Built-in primitive type ids. Registration order in `Parser::init`
// matches these indices.
pub const PRIMITIVE_VOID: TypeId = 0;
pub const PRIMITIVE_BOOL: TypeId = 1;
pub const PRIMITIVE_BOOL2: TypeId = 2;
pub const PRIMITIVE_BOOL3: TypeId = 3;
pub const PRIMITIVE_BOOL4: TypeId = 4;
pub const PRIMITIVE_INT: TypeId = 5;
pub const PRIMITIVE_INT2: TypeId = 6;
pub const PRIMITIVE_INT3: TypeId = 7;
pub const PRIMITIVE_INT4: TypeId = 8;
pub const PRIMITIVE_UINT: TypeId = 9;
pub const PRIMITIVE_UINT2: TypeId = 10;
pub const PRIMITIVE_UINT3: TypeId = 11;
pub const PRIMITIVE_UINT4: TypeId = 12;
pub const PRIMITIVE_FLOAT: TypeId = 13;
pub const PRIMITIVE_FLOAT2: TypeId = 14;
pub const PRIMITIVE_FLOAT3: TypeId = 15;
pub const PRIMITIVE_FLOAT4: TypeId = 16;
pub const PRIMITIVE_FLOAT2X2: TypeId = 17;
pub const PRIMITIVE_FLOAT3X3: TypeId = 18;
pub const PRIMITIVE_FLOAT4X4: TypeId = 19;
pub const PRIMITIVE_TEXTURE1D: TypeId = 20;
pub const PRIMITIVE_TEXTURE1D_ARRAY: TypeId = 21;
pub const PRIMITIVE_TEXTURE2D: TypeId = 22;
pub const PRIMITIVE_TEXTURE2D_ARRAY: TypeId = 23;
pub const PRIMITIVE_TEXTURE3D: TypeId = 24;
pub const PRIMITIVE_TEXTURE_CUBE: TypeId = 25;
pub const PRIMITIVE_TEXTURE_CUBE_ARRAY: TypeId = 26;
pub const PRIMITIVE_COUNT: usize = 27;

pub const PRIMITIVES: [&str; PRIMITIVE_COUNT] = [
    "void",
    "bool",
    "bool2",
    "bool3",
    "bool4",
    "int",
    "int2",
    "int3",
    "int4",
    "uint",
    "uint2",
    "uint3",
    "uint4",
    "float",
    "float2",
    "float3",
    "float4",
    "float2x2",
    "float3x3",
    "float4x4",
    "Texture1D",
    "Texture1DArray",
    "Texture2D",
    "Texture2DArray",
    "Texture3D",
    "TextureCube",
    "TextureCubeArray",
];

/// Built-in function vocabulary, remapped per target by the generators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Intrinsic {
    Cos,
    Sin,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    ASin,
    ACos,
    ATan,
    ATan2,
    Exp,
    Exp2,
    Log,
    Log2,
    Degrees,
    Radians,
    Round,
    Trunc,
    Ceil,
    Floor,
    Abs,
    Pow,
    Sqrt,
    RSqrt,
    Clamp,
    Max,
    Min,
    Mod,
    Frac,
    Ldexp,
    Fma,
    Sign,
    Saturate,
    DDx,
    DDy,
    DDxCoarse,
    DDxFine,
    DDyCoarse,
    DDyFine,
    Mul,
    Length,
    Distance,
    Dot,
    Cross,
    Normalize,
    Reflect,
    Refract,
    Faceforward,
    Transpose,
    Determinant,
    Lerp,
    Step,
    Smoothstep,
    BitCount,
    BitFirstHigh,
    BitFirstLow,
    BitReverse,
    AtomicAdd,
    AtomicCompareExchange,
    AtomicExchange,
    AtomicMax,
    AtomicMin,
    AtomicAnd,
    AtomicOr,
    AtomicXor,
    FloatToIntBits,
    FloatToUintBits,
    IntToFloatBits,
    UintToFloatBits,
    TextureSample1D,
    TextureSample1DArray,
    TextureSample1DLevel,
    TextureSample2D,
    TextureSample2DArray,
    TextureSample2DLevel,
    TextureSample3D,
    TextureSample3DArray,
    TextureSample3DLevel,
    TextureSampleCube,
    TextureSampleCubeArray,
    TextureSampleCubeLevel,
    TextureIndex1D,
    TextureIndex2D,
    TextureIndex3D,
    TextureIndexCube,
    DepthNormalize,
    DepthLinearize,
    DepthUnproject,
    DepthUnprojectZw,
}

pub const INTRINSICS: &[(&str, Intrinsic)] = &[
    ("cos", Intrinsic::Cos),
    ("sin", Intrinsic::Sin),
    ("tan", Intrinsic::Tan),
    ("sinh", Intrinsic::Sinh),
    ("cosh", Intrinsic::Cosh),
    ("tanh", Intrinsic::Tanh),
    ("asin", Intrinsic::ASin),
    ("acos", Intrinsic::ACos),
    ("atan", Intrinsic::ATan),
    ("atan2", Intrinsic::ATan2),
    ("exp", Intrinsic::Exp),
    ("exp2", Intrinsic::Exp2),
    ("log", Intrinsic::Log),
    ("log2", Intrinsic::Log2),
    ("degrees", Intrinsic::Degrees),
    ("radians", Intrinsic::Radians),
    ("round", Intrinsic::Round),
    ("trunc", Intrinsic::Trunc),
    ("ceil", Intrinsic::Ceil),
    ("floor", Intrinsic::Floor),
    ("abs", Intrinsic::Abs),
    ("pow", Intrinsic::Pow),
    ("sqrt", Intrinsic::Sqrt),
    ("rsqrt", Intrinsic::RSqrt),
    ("clamp", Intrinsic::Clamp),
    ("max", Intrinsic::Max),
    ("min", Intrinsic::Min),
    ("mod", Intrinsic::Mod),
    ("frac", Intrinsic::Frac),
    ("ldexp", Intrinsic::Ldexp),
    ("fma", Intrinsic::Fma),
    ("sign", Intrinsic::Sign),
    ("saturate", Intrinsic::Saturate),
    ("ddx", Intrinsic::DDx),
    ("ddy", Intrinsic::DDy),
    ("ddx_coarse", Intrinsic::DDxCoarse),
    ("ddx_fine", Intrinsic::DDxFine),
    ("ddy_coarse", Intrinsic::DDyCoarse),
    ("ddy_fine", Intrinsic::DDyFine),
    ("mul", Intrinsic::Mul),
    ("length", Intrinsic::Length),
    ("distance", Intrinsic::Distance),
    ("dot", Intrinsic::Dot),
    ("cross", Intrinsic::Cross),
    ("normalize", Intrinsic::Normalize),
    ("reflect", Intrinsic::Reflect),
    ("refract", Intrinsic::Refract),
    ("faceforward", Intrinsic::Faceforward),
    ("transpose", Intrinsic::Transpose),
    ("determinant", Intrinsic::Determinant),
    ("lerp", Intrinsic::Lerp),
    ("step", Intrinsic::Step),
    ("smoothstep", Intrinsic::Smoothstep),
    ("bit_count", Intrinsic::BitCount),
    ("bit_firsthigh", Intrinsic::BitFirstHigh),
    ("bit_firstlow", Intrinsic::BitFirstLow),
    ("bit_reverse", Intrinsic::BitReverse),
    ("atomic_add", Intrinsic::AtomicAdd),
    ("atomic_compare_exchange", Intrinsic::AtomicCompareExchange),
    ("atomic_exchange", Intrinsic::AtomicExchange),
    ("atomic_max", Intrinsic::AtomicMax),
    ("atomic_min", Intrinsic::AtomicMin),
    ("atomic_and", Intrinsic::AtomicAnd),
    ("atomic_or", Intrinsic::AtomicOr),
    ("atomic_xor", Intrinsic::AtomicXor),
    ("float_to_int_bits", Intrinsic::FloatToIntBits),
    ("float_to_uint_bits", Intrinsic::FloatToUintBits),
    ("int_to_float_bits", Intrinsic::IntToFloatBits),
    ("uint_to_float_bits", Intrinsic::UintToFloatBits),
    ("texture_sample_1d", Intrinsic::TextureSample1D),
    ("texture_sample_1d_array", Intrinsic::TextureSample1DArray),
    ("texture_sample_1d_level", Intrinsic::TextureSample1DLevel),
    ("texture_sample_2d", Intrinsic::TextureSample2D),
    ("texture_sample_2d_array", Intrinsic::TextureSample2DArray),
    ("texture_sample_2d_level", Intrinsic::TextureSample2DLevel),
    ("texture_sample_3d", Intrinsic::TextureSample3D),
    ("texture_sample_3d_array", Intrinsic::TextureSample3DArray),
    ("texture_sample_3d_level", Intrinsic::TextureSample3DLevel),
    ("texture_sample_cube", Intrinsic::TextureSampleCube),
    ("texture_sample_cube_array", Intrinsic::TextureSampleCubeArray),
    ("texture_sample_cube_level", Intrinsic::TextureSampleCubeLevel),
    ("texture_index_1d", Intrinsic::TextureIndex1D),
    ("texture_index_2d", Intrinsic::TextureIndex2D),
    ("texture_index_3d", Intrinsic::TextureIndex3D),
    ("texture_index_cube", Intrinsic::TextureIndexCube),
    ("depth_normalize", Intrinsic::DepthNormalize),
    ("depth_linearize", Intrinsic::DepthLinearize),
    ("depth_unproject", Intrinsic::DepthUnproject),
    ("depth_unproject_zw", Intrinsic::DepthUnprojectZw),
];

pub const INTRINSIC_COUNT: usize = INTRINSICS.len();

/// Intrinsic of a function id, if it is one.
pub fn intrinsic(function: FunctionId) -> Option<Intrinsic> {
    INTRINSICS.get(function).map(|(_, i)| *i)
}

/// Hardware semantic classes for stage IO members.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SemanticType {
    Position,
    Texcoord,
    Normal,
    Depth,
    Color,
    Binormal,
    Tangent,
    Instance,
}

pub const SEMANTIC_COUNT: usize = 8;

impl SemanticType {
    pub fn index(self) -> usize {
        match self {
            Self::Position => 0,
            Self::Texcoord => 1,
            Self::Normal => 2,
            Self::Depth => 3,
            Self::Color => 4,
            Self::Binormal => 5,
            Self::Tangent => 6,
            Self::Instance => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "POSITION",
            Self::Texcoord => "TEXCOORD",
            Self::Normal => "NORMAL",
            Self::Depth => "DEPTH",
            Self::Color => "COLOR",
            Self::Binormal => "BINORMAL",
            Self::Tangent => "TANGENT",
            Self::Instance => "INSTANCE",
        }
    }
}

/// `packed_as` input formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Unorm8,
    Unorm16,
    Unorm32,
    Snorm8,
    Snorm16,
    Snorm32,
    Uint8,
    Uint16,
    Uint32,
    Sint8,
    Sint16,
    Sint32,
    Float16,
    Float32,
}

impl InputFormat {
    fn from_token(ty: TokenType) -> Option<Self> {
        match ty {
            TokenType::Unorm8 => Some(Self::Unorm8),
            TokenType::Unorm16 => Some(Self::Unorm16),
            TokenType::Unorm32 => Some(Self::Unorm32),
            TokenType::Snorm8 => Some(Self::Snorm8),
            TokenType::Snorm16 => Some(Self::Snorm16),
            TokenType::Snorm32 => Some(Self::Snorm32),
            TokenType::Uint8 => Some(Self::Uint8),
            TokenType::Uint16 => Some(Self::Uint16),
            TokenType::Uint32 => Some(Self::Uint32),
            TokenType::Sint8 => Some(Self::Sint8),
            TokenType::Sint16 => Some(Self::Sint16),
            TokenType::Sint32 => Some(Self::Sint32),
            TokenType::Float16 => Some(Self::Float16),
            TokenType::Float32 => Some(Self::Float32),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Type {
    pub name: String,
    /// The declaring keyword for user structs; `Identifier` for builtins.
    pub token: TokenType,
    pub builtin: bool,
    /// Lives in the shader's global namespace (stage IO and buffers).
    pub global: bool,
    pub pipeline_varying: bool,
    pub member_first: VariableId,
    pub member_count: usize,
    pub slot: Option<u32>,
}

impl Type {
    fn builtin(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            token: TokenType::Identifier,
            builtin: true,
            global: false,
            pipeline_varying: false,
            member_first: 0,
            member_count: 0,
            slot: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Function {
    pub name: String,
    pub type_id: TypeId,
    pub builtin: bool,
    pub parameter_first: VariableId,
    pub parameter_count: usize,
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub type_id: TypeId,
    /// The texture primitive for texture variables.
    pub texture: Option<TypeId>,
    pub constant: bool,
    pub is_in: bool,
    pub is_out: bool,
    pub semantic: Option<SemanticType>,
    pub format: Option<InputFormat>,
    pub slot: Option<u32>,
    /// 0 means not an array.
    pub array_x: u32,
    pub array_y: u32,
}

impl Default for Variable {
    fn default() -> Self {
        Self {
            name: String::new(),
            type_id: PRIMITIVE_VOID,
            texture: None,
            constant: false,
            is_in: false,
            is_out: false,
            semantic: None,
            format: None,
            slot: None,
            array_x: 0,
            array_y: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StructDecl {
    pub struct_type: StructType,
    pub type_id: TypeId,
    pub slot: u32,
    pub size: u32,
}

#[derive(Clone, Debug)]
pub struct TextureDecl {
    pub dim: TextureDim,
    pub variable: VariableId,
    pub slot: u32,
}

#[derive(Debug)]
pub struct Parser {
    pub scanner: Scanner,
    pub ast: Ast,
    /// Program-level nodes in declaration order.
    pub program: Vec<NodeId>,

    pub types: Vec<Type>,
    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    pub structs: Vec<StructDecl>,
    pub textures: Vec<TextureDecl>,

    type_map: HashMap<String, TypeId>,
    function_map: HashMap<String, FunctionId>,
    texture_map: HashMap<String, TextureId>,
    swizzle_map: HashMap<String, usize>,
    pub swizzles: Vec<String>,
    sv_semantic_map: HashMap<String, SVSemanticType>,

    /// Visible variables, innermost last.
    scope: Vec<VariableId>,
    swizzling: bool,

    buffer_slots: [bool; SHADER_MAX_BUFFER_SLOTS],
    texture_slots: [bool; SHADER_MAX_TEXTURE_SLOTS],
    target_color_slots: [bool; SHADER_MAX_TARGET_SLOTS],
    target_depth_slots: [bool; SHADER_MAX_TARGET_SLOTS],

    pub main_vertex: Option<FunctionId>,
    pub main_fragment: Option<FunctionId>,
    pub main_compute: Option<FunctionId>,
    pub main_ray: Vec<FunctionId>,
    pub thread_group: (u64, u64, u64),
    pub vertex_format_type: Option<TypeId>,
    pub instance_format_type: Option<TypeId>,

    path: String,
}

fn keyword_name(ty: TokenType) -> &'static str {
    KEYWORDS
        .iter()
        .find(|(_, token)| *token == ty)
        .map(|(name, _)| *name)
        .unwrap_or("?")
}

fn vertex_input_type_allowed(type_id: TypeId) -> bool {
    matches!(
        type_id,
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
            | PRIMITIVE_FLOAT
            | PRIMITIVE_FLOAT2
            | PRIMITIVE_FLOAT3
            | PRIMITIVE_FLOAT4
    )
}

fn instance_input_type_allowed(type_id: TypeId) -> bool {
    vertex_input_type_allowed(type_id) || type_id == PRIMITIVE_FLOAT4X4
}

fn buffer_type_allowed(token: TokenType, type_id: TypeId) -> bool {
    if token == TokenType::SharedStruct {
        return true;
    }
    matches!(type_id, PRIMITIVE_VOID..=PRIMITIVE_FLOAT4X4)
}

impl Parser {
    /// Parses a whole shader source.
    pub fn parse(path: &str, source: &str) -> Result<Self, ShaderError> {
        let mut parser = Self {
            scanner: Scanner::new(source),
            ast: Ast::new(),
            program: Vec::new(),
            types: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            structs: Vec::new(),
            textures: Vec::new(),
            type_map: HashMap::new(),
            function_map: HashMap::new(),
            texture_map: HashMap::new(),
            swizzle_map: HashMap::new(),
            swizzles: Vec::new(),
            sv_semantic_map: HashMap::new(),
            scope: Vec::new(),
            swizzling: false,
            buffer_slots: [false; SHADER_MAX_BUFFER_SLOTS],
            texture_slots: [false; SHADER_MAX_TEXTURE_SLOTS],
            target_color_slots: [false; SHADER_MAX_TARGET_SLOTS],
            target_depth_slots: [false; SHADER_MAX_TARGET_SLOTS],
            main_vertex: None,
            main_fragment: None,
            main_compute: None,
            main_ray: Vec::new(),
            thread_group: (1, 1, 1),
            vertex_format_type: None,
            instance_format_type: None,
            path: path.to_owned(),
        };

        parser.init();
        parser.scanner.mode = ScannerMode::Compiler;
        parser.run()?;
        Ok(parser)
    }

    fn init(&mut self) {
        for name in PRIMITIVES {
            let type_id = self.types.len();
            self.types.push(Type::builtin(name));
            self.type_map.insert(name.to_owned(), type_id);
        }

        self.swizzles = crate::ast::swizzle_names();
        for (index, name) in self.swizzles.iter().enumerate() {
            self.swizzle_map.insert(name.clone(), index);
        }

        for (name, semantic) in SV_SEMANTICS {
            self.sv_semantic_map.insert((*name).to_owned(), *semantic);
        }

        for (name, _) in INTRINSICS {
            let function_id = self.functions.len();
            self.functions.push(Function {
                name: (*name).to_owned(),
                builtin: true,
                ..Function::default()
            });
            self.function_map.insert((*name).to_owned(), function_id);
        }
    }

    fn run(&mut self) -> Result<(), ShaderError> {
        loop {
            let token = self.scanner.next();
            match token.ty {
                TokenType::EndOfFile => break,
                TokenType::Error => {
                    return Err(self.error(format!("unknown token '{}'", token.name)));
                }
                ty if ty.is_struct_keyword() => {
                    let node = self.parse_structure()?;
                    self.program.push(node);
                }
                ty if ty.is_texture_keyword() => {
                    let node = self.parse_texture()?;
                    self.program.push(node);
                }
                TokenType::Identifier => {
                    let node = self.parse_function_declaration()?;
                    self.program.push(node);
                }
                _ => return Err(self.error("unexpected program-level token!")),
            }
        }

        let has_main =
            self.main_vertex.is_some() || self.main_fragment.is_some() || self.main_compute.is_some();
        if !has_main && self.main_ray.is_empty() {
            return Err(self.error("shader does not implement a main function!"));
        }

        Ok(())
    }

    pub fn error(&self, message: impl Into<String>) -> ShaderError {
        let token = self.scanner.current();
        ShaderError::at(
            &self.path,
            self.scanner.source(),
            token.line,
            token.start,
            message.into(),
        )
    }

    // Symbol registration

    fn register_struct(&mut self, decl: StructDecl) -> StructId {
        self.structs.push(decl);
        self.structs.len() - 1
    }

    fn register_texture(&mut self, decl: TextureDecl) -> TextureId {
        let texture_id = self.textures.len();
        let name = self.variables[decl.variable].name.clone();
        self.textures.push(decl);
        self.texture_map.insert(name, texture_id);
        texture_id
    }

    fn register_type(&mut self, ty: Type) -> TypeId {
        let type_id = self.types.len();
        self.type_map.insert(ty.name.clone(), type_id);
        self.types.push(ty);
        type_id
    }

    fn register_function(&mut self, function: Function) -> FunctionId {
        let function_id = self.functions.len();
        self.function_map.insert(function.name.clone(), function_id);
        self.functions.push(function);
        function_id
    }

    fn register_variable(&mut self, variable: Variable) -> VariableId {
        let variable_id = self.variables.len();
        self.variables.push(variable);
        self.scope.push(variable_id);
        variable_id
    }

    // Scope and typing helpers

    fn scope_find_variable(&self, name: &str) -> Option<VariableId> {
        self.scope
            .iter()
            .find(|&&id| self.variables[id].name == name)
            .copied()
    }

    fn scope_reset(&mut self, target: usize) {
        self.scope.truncate(target);
    }

    fn check_namespace_conflicts(&self, name: &str) -> Result<(), ShaderError> {
        if self.type_map.contains_key(name) {
            return Err(self.error(format!("namespace: '{name}' conflicts with existing type")));
        }
        if self.function_map.contains_key(name) {
            return Err(self.error(format!(
                "namespace: '{name}' conflicts with existing function"
            )));
        }
        if self.scope_find_variable(name).is_some() {
            return Err(self.error(format!(
                "namespace: '{name}' conflicts with existing variable"
            )));
        }
        Ok(())
    }

    fn expect_semicolon(&mut self) -> Result<(), ShaderError> {
        if self.scanner.current().ty != TokenType::Semicolon {
            self.scanner.back();
            return Err(self.error("missing semicolon"));
        }
        self.scanner.next();
        Ok(())
    }

    /// Resolved type of an expression node, if it has one.
    pub fn node_type(&self, node: NodeId) -> Option<TypeId> {
        match *self.ast.get(node) {
            Node::ExpressionBinary { op, lhs, rhs } => {
                if op == BinaryOp::Dot {
                    self.node_type(rhs)
                } else {
                    self.node_type(lhs)
                }
            }
            Node::ExpressionUnary { expr, .. } => self.node_type(expr),
            Node::FunctionCall { function, .. } => Some(self.functions[function].type_id),
            Node::Cast { type_id, .. } => Some(type_id),
            Node::Variable { variable } => Some(self.variables[variable].type_id),
            Node::Group { expr } => self.node_type(expr),
            Node::Texture { texture, .. } => self.variables[self.textures[texture].variable].texture,
            _ => None,
        }
    }

    /// Whether an expression may not be assigned to.
    pub fn node_is_constexpr(&self, node: NodeId) -> bool {
        match *self.ast.get(node) {
            Node::ExpressionBinary { op, lhs, rhs } => {
                if op == BinaryOp::Dot {
                    self.node_is_constexpr(rhs)
                } else {
                    self.node_is_constexpr(lhs)
                }
            }
            Node::ExpressionUnary { expr, .. } => self.node_is_constexpr(expr),
            Node::VariableDeclaration { variable, .. } | Node::Variable { variable } => {
                self.variables[variable].constant
            }
            Node::Swizzle { .. } => false,
            Node::Group { expr } => self.node_is_constexpr(expr),
            _ => true,
        }
    }

    pub fn swizzle_name(&self, swizzle: usize) -> &str {
        &self.swizzles[swizzle]
    }

    // Program-level declarations

    fn parse_structure(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();
        let scope_index = self.scope.len();

        let (struct_type, expect_slot, expect_size, global, pipeline_varying) = match token.ty {
            TokenType::Struct => (StructType::Struct, false, false, false, false),
            TokenType::SharedStruct => (StructType::SharedStruct, false, false, false, false),
            TokenType::UniformBuffer => (StructType::UniformBuffer, true, false, true, false),
            TokenType::ConstantBuffer => (StructType::ConstantBuffer, true, true, true, false),
            TokenType::MutableBuffer => (StructType::MutableBuffer, true, true, true, false),
            TokenType::InstanceInput => (StructType::InstanceInput, false, false, true, false),
            TokenType::VertexInput => (StructType::VertexInput, false, false, true, false),
            TokenType::VertexOutput => (StructType::VertexOutput, false, false, true, true),
            TokenType::FragmentInput => (StructType::FragmentInput, false, false, true, true),
            TokenType::FragmentOutput => (StructType::FragmentOutput, false, false, true, false),
            _ => return Err(self.error("unknown structure type!")),
        };
        let struct_name = struct_type.keyword();
        let struct_token = token.ty;

        let mut slot: u32 = 0;
        let mut size: u32 = 0;

        if expect_slot {
            let token = self.scanner.next();
            if token.ty != TokenType::LParen {
                return Err(self.error(format!("{struct_name}: expected '(' before slot")));
            }

            let token = self.scanner.next();
            if token.ty != TokenType::Integer {
                return Err(self.error(format!(
                    "{struct_name}: slot id must be a positive, constant integer"
                )));
            }
            slot = token.integer as u32;
            if slot as usize >= SHADER_MAX_BUFFER_SLOTS {
                return Err(self.error(format!(
                    "{struct_name}: slot id exceeded maximum: {SHADER_MAX_BUFFER_SLOTS}"
                )));
            }
            if self.buffer_slots[slot as usize] {
                return Err(
                    self.error(format!("{struct_name}: slot id '{slot}' is already bound!"))
                );
            }
            self.buffer_slots[slot as usize] = true;

            let token = self.scanner.next();
            if expect_size {
                if token.ty != TokenType::Comma {
                    return Err(self.error(format!("{struct_name}: expected ',' before size")));
                }
            } else if token.ty != TokenType::RParen {
                return Err(self.error(format!("{struct_name}: expected ')' after slot")));
            }
        }

        if expect_size {
            let token = self.scanner.next();
            if token.ty != TokenType::Integer {
                return Err(self.error(format!(
                    "{struct_name}: size must be a positive, non-zero integer"
                )));
            }
            if token.integer == 0 {
                return Err(self.error(format!("{struct_name}: size must be at least 1")));
            }
            if token.integer > u64::from(u32::MAX) {
                return Err(self.error(format!(
                    "{struct_name}: size exceeded maximum: {}",
                    u32::MAX
                )));
            }
            size = token.integer as u32;

            let token = self.scanner.next();
            if token.ty != TokenType::RParen {
                return Err(self.error(format!("{struct_name}: expected ')' after size")));
            }
        }

        // Name
        let token = self.scanner.next();
        if token.ty != TokenType::Identifier {
            return Err(self.error(format!("{struct_name}: expected name after struct keyword")));
        }
        self.check_namespace_conflicts(&token.name)?;
        let type_name = token.name;

        // '{'
        let token = self.scanner.next();
        if token.ty != TokenType::LCurly {
            return Err(self.error(format!("{struct_name}: expected '{{' after name")));
        }

        // Members
        let member_first = self.variables.len();
        let mut seen_attribute_position = false;
        let mut token = self.scanner.next();
        while token.ty != TokenType::RCurly {
            let declaration = self.parse_variable_declaration()?;
            let Node::VariableDeclaration { assignment, .. } = *self.ast.get(declaration) else {
                unreachable!();
            };
            if assignment.is_some() {
                return Err(self.error(format!(
                    "{struct_name}: member variable assignment not allowed"
                )));
            }

            let variable_id = self.variables.len() - 1;
            let variable_type_id = self.variables[variable_id].type_id;
            let variable_type_token = self.types[variable_type_id].token;
            token = self.scanner.current();

            // Restrictions
            if self.types[variable_type_id].global {
                self.scanner.back();
                return Err(self.error(format!(
                    "{struct_name}: member variables cannot be of constant structure type"
                )));
            }
            if self.variables[variable_id].constant {
                self.scanner.back();
                return Err(self.error(format!("{struct_name}: member variables cannot be const")));
            }
            if self.variables[variable_id].is_in || self.variables[variable_id].is_out {
                self.scanner.back();
                return Err(self.error(format!(
                    "{struct_name}: member variables cannot be declared with 'in', 'out', or 'inout'"
                )));
            }

            match struct_type {
                StructType::SharedStruct
                | StructType::UniformBuffer
                | StructType::ConstantBuffer
                | StructType::MutableBuffer => {
                    if !buffer_type_allowed(variable_type_token, variable_type_id) {
                        return Err(self.error(
                            "Type not allowed in this structure! Must be a primitive or shared_struct",
                        ));
                    }
                }
                StructType::InstanceInput => {
                    if !instance_input_type_allowed(variable_type_id) {
                        return Err(self.error("Type not allowed in instance_input!"));
                    }
                }
                StructType::VertexInput => {
                    if !vertex_input_type_allowed(variable_type_id) {
                        return Err(self.error(
                            "Type not allowed in vertex_input! Must be a primitive, non-matrix type",
                        ));
                    }
                }
                _ => {}
            }

            // Attributes
            match struct_type {
                StructType::VertexInput => {
                    token = self.parse_attribute_packed_as(variable_id)?;
                    self.variables[variable_id].semantic = Some(SemanticType::Texcoord);
                }
                StructType::InstanceInput => {
                    token = self.parse_attribute_packed_as(variable_id)?;
                    self.variables[variable_id].semantic = Some(SemanticType::Instance);
                }
                StructType::VertexOutput => {
                    if !seen_attribute_position {
                        token = self.parse_attribute_position(
                            variable_id,
                            TokenType::AttributePositionOut,
                            "position_out",
                        )?;
                        seen_attribute_position = true;
                    } else {
                        self.variables[variable_id].semantic = Some(SemanticType::Texcoord);
                    }
                }
                StructType::FragmentInput => {
                    if !seen_attribute_position {
                        token = self.parse_attribute_position(
                            variable_id,
                            TokenType::AttributePositionIn,
                            "position_in",
                        )?;
                        seen_attribute_position = true;
                    } else {
                        self.variables[variable_id].semantic = Some(SemanticType::Texcoord);
                    }
                }
                StructType::FragmentOutput => {
                    token = self.parse_attribute_target(variable_id)?;
                }
                _ => {}
            }

            if token.ty != TokenType::Semicolon {
                self.scanner.back();
                return Err(self.error(format!(
                    "{struct_name} member: expected semicolon after variable declaration"
                )));
            }
            token = self.scanner.next();
        }
        let member_count = self.variables.len() - member_first;

        // ';' after the closing brace
        let token = self.scanner.next();
        if token.ty != TokenType::Semicolon {
            self.scanner.back();
            return Err(self.error(format!(
                "{struct_name}: expected semicolon after final closing '}}'"
            )));
        }

        let type_id = self.register_type(Type {
            name: type_name,
            token: struct_token,
            builtin: false,
            global,
            pipeline_varying,
            member_first,
            member_count,
            slot: expect_slot.then_some(slot),
        });
        let struct_id = self.register_struct(StructDecl {
            struct_type,
            type_id,
            slot,
            size,
        });

        self.scope_reset(scope_index);
        Ok(self.ast.add(Node::Struct {
            struct_type,
            struct_id,
        }))
    }

    fn parse_attribute_packed_as(&mut self, variable: VariableId) -> Result<Token, ShaderError> {
        let token = self.scanner.current();
        if token.ty != TokenType::AttributePackedAs {
            return Err(self.error(format!(
                "unexpected attribute '{}' -- must be 'packed_as(...)'",
                token.name
            )));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error("expected '(' before format type"));
        }

        let token = self.scanner.next();
        let Some(format) = InputFormat::from_token(token.ty) else {
            return Err(self.error(format!("unexpected format type '{}'", token.name)));
        };
        self.variables[variable].format = Some(format);

        let token = self.scanner.next();
        if token.ty != TokenType::RParen {
            return Err(self.error("expected ')' after format type"));
        }

        Ok(self.scanner.next())
    }

    fn parse_attribute_position(
        &mut self,
        variable: VariableId,
        expected: TokenType,
        name: &str,
    ) -> Result<Token, ShaderError> {
        let token = self.scanner.current();
        if token.ty != expected {
            return Err(self.error(format!(
                "unexpected attribute '{}' -- must be '{name}'",
                token.name
            )));
        }

        self.variables[variable].semantic = Some(SemanticType::Position);
        Ok(self.scanner.next())
    }

    fn parse_attribute_target(&mut self, variable: VariableId) -> Result<Token, ShaderError> {
        let token = self.scanner.current();
        if token.ty != TokenType::AttributeTarget {
            return Err(self.error(format!(
                "unexpected attribute '{}' -- must be 'target(slot, type)'",
                token.name
            )));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error("expected '(' before target slot"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::Integer {
            return Err(self.error("slot must be a positive, constant integer"));
        }
        let slot = token.integer as usize;
        if slot >= SHADER_MAX_TARGET_SLOTS {
            return Err(self.error(format!("slot exceeded maximum: {SHADER_MAX_TARGET_SLOTS}")));
        }
        self.variables[variable].slot = Some(slot as u32);

        let token = self.scanner.next();
        if token.ty != TokenType::Comma {
            return Err(self.error("expected ',' after slot"));
        }

        let token = self.scanner.next();
        match token.ty {
            TokenType::Color => {
                self.variables[variable].semantic = Some(SemanticType::Color);
                if self.target_color_slots[slot] {
                    return Err(self.error(format!("target( {slot}, COLOR ) is already bound!")));
                }
                self.target_color_slots[slot] = true;
            }
            TokenType::Depth => {
                self.variables[variable].semantic = Some(SemanticType::Depth);
                if slot != 0 {
                    return Err(self.error("DEPTH targets can only be bound to slot 0!"));
                }
                if self.target_depth_slots[slot] {
                    return Err(self.error(format!("target( {slot}, DEPTH ) is already bound!")));
                }
                self.target_depth_slots[slot] = true;
            }
            _ => {
                return Err(self.error(format!(
                    "unexpected format '{}' -- must be COLOR or DEPTH",
                    token.name
                )));
            }
        }

        let token = self.scanner.next();
        if token.ty != TokenType::RParen {
            return Err(self.error("expected ')' after target type"));
        }

        Ok(self.scanner.next())
    }

    fn parse_texture(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        let (dim, primitive) = match token.ty {
            TokenType::Texture1D => (TextureDim::Texture1D, PRIMITIVE_TEXTURE1D),
            TokenType::Texture1DArray => (TextureDim::Texture1DArray, PRIMITIVE_TEXTURE1D_ARRAY),
            TokenType::Texture2D => (TextureDim::Texture2D, PRIMITIVE_TEXTURE2D),
            TokenType::Texture2DArray => (TextureDim::Texture2DArray, PRIMITIVE_TEXTURE2D_ARRAY),
            TokenType::Texture3D => (TextureDim::Texture3D, PRIMITIVE_TEXTURE3D),
            TokenType::TextureCube => (TextureDim::TextureCube, PRIMITIVE_TEXTURE_CUBE),
            TokenType::TextureCubeArray => {
                (TextureDim::TextureCubeArray, PRIMITIVE_TEXTURE_CUBE_ARRAY)
            }
            _ => return Err(self.error("unknown texture type!")),
        };
        let texture_name = token.name.clone();

        // (slot, type)
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error(format!("{texture_name}: expected '(' before slot")));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::Integer {
            return Err(self.error(format!(
                "{texture_name}: slot must be a positive, constant integer"
            )));
        }
        let slot = token.integer as usize;
        if slot >= SHADER_MAX_TEXTURE_SLOTS {
            return Err(self.error(format!(
                "{texture_name}: slot exceeded maximum: {SHADER_MAX_TEXTURE_SLOTS}"
            )));
        }
        if self.texture_slots[slot] {
            return Err(self.error(format!("{texture_name}: slot '{slot}' is already bound!")));
        }
        self.texture_slots[slot] = true;

        let token = self.scanner.next();
        if token.ty != TokenType::Comma {
            return Err(self.error(format!("{texture_name}: expected ',' before type")));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::Identifier {
            return Err(self.error(format!("{texture_name}: expected a texture type")));
        }
        let Some(&type_id) = self.type_map.get(&token.name) else {
            return Err(self.error(format!("{texture_name}: unknown type '{}'", token.name)));
        };

        let token = self.scanner.next();
        if token.ty != TokenType::RParen {
            return Err(self.error(format!("{texture_name}: expected ')' after type")));
        }

        // Name
        let token = self.scanner.next();
        if token.ty != TokenType::Identifier {
            return Err(self.error(format!(
                "{texture_name}: expected name after {texture_name}(slot, type) keyword"
            )));
        }
        self.check_namespace_conflicts(&token.name)?;

        let variable = Variable {
            name: token.name,
            type_id,
            texture: Some(primitive),
            slot: Some(slot as u32),
            ..Variable::default()
        };

        let token = self.scanner.next();
        if token.ty != TokenType::Semicolon {
            self.scanner.back();
            return Err(self.error(format!("{texture_name}: expected semicolon")));
        }

        let variable_id = self.register_variable(variable);
        let texture_id = self.register_texture(TextureDecl {
            dim,
            variable: variable_id,
            slot: slot as u32,
        });

        Ok(self.ast.add(Node::Texture {
            dim,
            texture: texture_id,
        }))
    }

    // Statements

    fn parse_statement(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        match token.ty {
            TokenType::LCurly => {
                let node = self.parse_statement_block(None)?;
                self.scanner.next();
                Ok(node)
            }
            TokenType::If => self.parse_statement_if(),
            TokenType::While => self.parse_statement_while(),
            TokenType::Do => {
                let node = self.parse_statement_do_while()?;
                self.expect_semicolon()?;
                Ok(node)
            }
            TokenType::For => self.parse_statement_for(),
            TokenType::Switch => self.parse_statement_switch(),
            TokenType::Case => Err(self.error("'case' keyword used outside of switch statement")),
            TokenType::Default => {
                Err(self.error("'default' keyword used outside of switch statement"))
            }
            TokenType::Return => {
                let node = self.parse_statement_return()?;
                self.expect_semicolon()?;
                Ok(node)
            }
            TokenType::Break => {
                self.scanner.next();
                let node = self.ast.add(Node::StatementBreak);
                self.expect_semicolon()?;
                Ok(node)
            }
            TokenType::Continue => {
                self.scanner.next();
                let node = self.ast.add(Node::StatementContinue);
                self.expect_semicolon()?;
                Ok(node)
            }
            TokenType::Discard => {
                self.scanner.next();
                let node = self.ast.add(Node::StatementDiscard);
                self.expect_semicolon()?;
                Ok(node)
            }
            _ => {
                let node = self.parse_statement_expression()?;
                self.expect_semicolon()?;
                Ok(node)
            }
        }
    }

    /// Parses `{ ... }`, leaving the scanner on the closing brace.
    fn parse_statement_block(&mut self, scope_index: Option<usize>) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();
        if token.ty != TokenType::LCurly {
            return Err(self.error("block must start with '{'"));
        }

        let scope_index = scope_index.unwrap_or(self.scope.len());

        let mut first = None;
        let mut previous: Option<NodeId> = None;
        let mut token = self.scanner.next();
        while token.ty != TokenType::RCurly {
            if token.ty == TokenType::EndOfFile {
                return Err(self.error("unterminated block"));
            }

            let statement = self.parse_statement()?;
            let current = self.ast.add(Node::StatementBlock {
                statement: Some(statement),
                next: None,
            });

            if first.is_none() {
                first = Some(current);
            }
            if let Some(previous) = previous {
                let Node::StatementBlock { next, .. } = self.ast.get_mut(previous) else {
                    unreachable!();
                };
                *next = Some(current);
            }

            previous = Some(current);
            token = self.scanner.current();
        }

        self.scope_reset(scope_index);
        Ok(first.unwrap_or_else(|| {
            self.ast.add(Node::StatementBlock {
                statement: None,
                next: None,
            })
        }))
    }

    fn parse_statement_expression(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        // Variable declaration or plain expression
        if token.ty == TokenType::Const || self.type_map.contains_key(&token.name) {
            let declaration = self.parse_variable_declaration()?;
            let variable_id = self.variables.len() - 1;
            let variable = &self.variables[variable_id];
            if variable.is_in || variable.is_out {
                return Err(
                    self.error("cannot declare a variable with 'in' or 'out' in a function body")
                );
            }
            if self.types[variable.type_id].global {
                return Err(self.error(
                    "cannot declare a variable of constant structure type in a function body",
                ));
            }
            Ok(self.ast.add(Node::StatementExpression { expr: declaration }))
        } else {
            let expr = self.parse_expression()?;
            Ok(self.ast.add(Node::StatementExpression { expr }))
        }
    }

    fn parse_statement_if(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("'if' condition requires '('"));
        }

        self.scanner.next();
        let condition = self.parse_expression()?;

        if self.scanner.current().ty != TokenType::RParen {
            self.scanner.back();
            return Err(self.error("'if' condition missing ')'"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LCurly {
            self.scanner.back();
            return Err(self.error("'if' condition body requires '{'"));
        }
        let block_if = self.parse_statement_block(None)?;

        // else / else if
        let token = self.scanner.next();
        let block_else = if token.ty == TokenType::Else {
            let token = self.scanner.next();
            if token.ty == TokenType::If {
                let node = self.parse_statement_if()?;
                self.scanner.back();
                Some(node)
            } else if token.ty == TokenType::LCurly {
                Some(self.parse_statement_block(None)?)
            } else {
                self.scanner.back();
                return Err(self.error("else must be followed by '{ ... }' or 'if'"));
            }
        } else {
            self.scanner.back();
            None
        };

        self.scanner.next();
        Ok(self.ast.add(Node::StatementIf {
            condition,
            block_if,
            block_else,
        }))
    }

    fn parse_statement_while(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("'while' condition requires '('"));
        }

        self.scanner.next();
        let condition = self.parse_expression()?;

        if self.scanner.current().ty != TokenType::RParen {
            self.scanner.back();
            return Err(self.error("'while' condition missing ')'"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LCurly {
            self.scanner.back();
            return Err(self.error("'while' body requires '{'"));
        }
        let block = self.parse_statement_block(None)?;

        self.scanner.next();
        Ok(self.ast.add(Node::StatementWhile { condition, block }))
    }

    fn parse_statement_do_while(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.next();
        if token.ty != TokenType::LCurly {
            self.scanner.back();
            return Err(self.error("'do' body requires '{'"));
        }
        let block = self.parse_statement_block(None)?;

        let token = self.scanner.next();
        if token.ty != TokenType::While {
            return Err(self.error("'do' body must be followed by 'while'"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("'while' condition requires '('"));
        }

        self.scanner.next();
        let condition = self.parse_expression()?;

        if self.scanner.current().ty != TokenType::RParen {
            self.scanner.back();
            return Err(self.error("'while' condition missing ')'"));
        }

        self.scanner.next();
        Ok(self.ast.add(Node::StatementDoWhile { condition, block }))
    }

    fn parse_statement_for(&mut self) -> Result<NodeId, ShaderError> {
        let scope_index = self.scope.len();

        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("'for' loop requires '('"));
        }

        // Initialization
        let token = self.scanner.next();
        let init = if token.ty == TokenType::Identifier && self.type_map.contains_key(&token.name) {
            Some(self.parse_variable_declaration()?)
        } else if token.ty != TokenType::Semicolon {
            Some(self.parse_expression()?)
        } else {
            None
        };

        if self.scanner.current().ty != TokenType::Semicolon {
            self.scanner.back();
            return Err(self.error("missing ';' after initialization expression"));
        }

        // Condition
        let token = self.scanner.next();
        let condition = if token.ty != TokenType::Semicolon {
            Some(self.parse_expression()?)
        } else {
            None
        };

        if self.scanner.current().ty != TokenType::Semicolon {
            self.scanner.back();
            return Err(self.error("missing ';' after condition expression"));
        }

        // Increment
        let token = self.scanner.next();
        let increment = if token.ty != TokenType::RParen {
            Some(self.parse_expression()?)
        } else {
            None
        };

        if self.scanner.current().ty != TokenType::RParen {
            self.scanner.back();
            return Err(self.error("missing ')' after increment expression"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LCurly {
            self.scanner.back();
            return Err(self.error("'for' loop body requires '{'"));
        }
        let block = self.parse_statement_block(Some(scope_index))?;

        self.scanner.next();
        Ok(self.ast.add(Node::StatementFor {
            init,
            condition,
            increment,
            block,
        }))
    }

    fn parse_statement_switch(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("'switch' statement requires '('"));
        }

        self.scanner.next();
        let expr = self.parse_expression()?;

        if self.scanner.current().ty != TokenType::RParen {
            self.scanner.back();
            return Err(self.error("'switch' statement requires ')'"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::LCurly {
            self.scanner.back();
            return Err(self.error("'switch' statement requires '{'"));
        }

        let mut first = None;
        let mut previous: Option<NodeId> = None;
        let mut token = self.scanner.next();
        while token.ty != TokenType::RCurly {
            let statement = match token.ty {
                TokenType::Case => self.parse_statement_case()?,
                TokenType::Default => self.parse_statement_default()?,
                TokenType::Return => {
                    let node = self.parse_statement_return()?;
                    self.expect_semicolon()?;
                    node
                }
                TokenType::Break => {
                    self.scanner.next();
                    let node = self.ast.add(Node::StatementBreak);
                    self.expect_semicolon()?;
                    node
                }
                TokenType::Continue => {
                    self.scanner.next();
                    let node = self.ast.add(Node::StatementContinue);
                    self.expect_semicolon()?;
                    node
                }
                _ => {
                    return Err(
                        self.error("unexpected statement/expression in switch statement!")
                    );
                }
            };

            let current = self.ast.add(Node::StatementBlock {
                statement: Some(statement),
                next: None,
            });
            if first.is_none() {
                first = Some(current);
            }
            if let Some(previous) = previous {
                let Node::StatementBlock { next, .. } = self.ast.get_mut(previous) else {
                    unreachable!();
                };
                *next = Some(current);
            }
            previous = Some(current);
            token = self.scanner.current();
        }

        let first = first.unwrap_or_else(|| {
            self.ast.add(Node::StatementBlock {
                statement: None,
                next: None,
            })
        });
        self.scanner.next();
        Ok(self.ast.add(Node::StatementSwitch { expr, first }))
    }

    fn parse_statement_case(&mut self) -> Result<NodeId, ShaderError> {
        self.scanner.next();
        let expr = self.parse_expression()?;

        if self.scanner.current().ty != TokenType::Colon {
            self.scanner.back();
            return Err(self.error("'case' requires ':' after expression"));
        }

        let token = self.scanner.next();
        let block = if token.ty == TokenType::LCurly {
            let block = self.parse_statement_block(None)?;
            self.scanner.next();
            Some(block)
        } else if matches!(
            token.ty,
            TokenType::Case
                | TokenType::Break
                | TokenType::Default
                | TokenType::Return
                | TokenType::Continue
        ) {
            None
        } else {
            let statement = self.parse_statement()?;
            Some(self.ast.add(Node::StatementBlock {
                statement: Some(statement),
                next: None,
            }))
        };

        Ok(self.ast.add(Node::StatementCase { expr, block }))
    }

    fn parse_statement_default(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.next();
        if token.ty != TokenType::Colon {
            self.scanner.back();
            return Err(self.error("'default' requires ':'"));
        }

        let token = self.scanner.next();
        let block = if token.ty == TokenType::LCurly {
            let block = self.parse_statement_block(None)?;
            self.scanner.next();
            Some(block)
        } else if matches!(
            token.ty,
            TokenType::Case
                | TokenType::Break
                | TokenType::Default
                | TokenType::Return
                | TokenType::Continue
        ) {
            None
        } else {
            let statement = self.parse_statement()?;
            Some(self.ast.add(Node::StatementBlock {
                statement: Some(statement),
                next: None,
            }))
        };

        Ok(self.ast.add(Node::StatementDefault { block }))
    }

    fn parse_statement_return(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.next();
        let expr = if token.ty != TokenType::Semicolon {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(self.ast.add(Node::StatementReturn { expr }))
    }

    // Declarations

    fn parse_variable_declaration(&mut self) -> Result<NodeId, ShaderError> {
        let mut variable = Variable::default();
        let mut token = self.scanner.current();

        // in / out / inout
        if matches!(token.ty, TokenType::In | TokenType::Out | TokenType::InOut) {
            variable.is_in = matches!(token.ty, TokenType::In | TokenType::InOut);
            variable.is_out = matches!(token.ty, TokenType::Out | TokenType::InOut);
            token = self.scanner.next();
        }

        // const
        if token.ty == TokenType::Const {
            if variable.is_out {
                return Err(self.error("const variable cannot be tagged 'out' or 'inout'"));
            }
            variable.constant = true;
            token = self.scanner.next();
        }

        // Type
        if token.ty != TokenType::Identifier {
            return Err(self.error("variable declaration: expected a type"));
        }
        let Some(&type_id) = self.type_map.get(&token.name) else {
            return Err(self.error(format!(
                "variable declaration: unknown type '{}'",
                token.name
            )));
        };
        variable.type_id = type_id;

        // Stage inputs are implicitly constant.
        if matches!(
            self.types[type_id].token,
            TokenType::InstanceInput | TokenType::VertexInput | TokenType::FragmentInput
        ) {
            if variable.is_out {
                return Err(self.error("const variable cannot be tagged 'out' or 'inout'"));
            }
            variable.constant = true;
        }

        // Name
        let token = self.scanner.next();
        if token.ty != TokenType::Identifier {
            return Err(self.error("variable declaration: expected identifier after type"));
        }
        self.check_namespace_conflicts(&token.name)?;
        variable.name = token.name;

        // Arrays
        let token = self.scanner.next();
        if token.ty == TokenType::LBrack {
            let token = self.scanner.next();
            if token.ty != TokenType::Integer {
                return Err(
                    self.error("variable declaration: array length must be a constant integer")
                );
            }
            if token.integer == 0 {
                return Err(self.error("variable declaration: array length cannot be zero"));
            }
            variable.array_x = token.integer as u32;

            let token = self.scanner.next();
            if token.ty != TokenType::RBrack {
                return Err(self.error("variable declaration: expected ']' after array length"));
            }

            let token = self.scanner.next();
            if token.ty == TokenType::LBrack {
                let token = self.scanner.next();
                if token.ty != TokenType::Integer {
                    return Err(
                        self.error("variable declaration: array length must be a constant integer")
                    );
                }
                if token.integer == 0 {
                    return Err(self.error("variable declaration: array length cannot be zero"));
                }
                variable.array_y = token.integer as u32;

                let token = self.scanner.next();
                if token.ty != TokenType::RBrack {
                    return Err(
                        self.error("variable declaration: expected ']' after array length")
                    );
                }
            } else {
                self.scanner.back();
            }
        } else {
            self.scanner.back();
        }

        // Assignment
        let token = self.scanner.next();
        let assignment = if token.ty == TokenType::Assign {
            if variable.array_x != 0 || variable.array_y != 0 {
                return Err(self.error("arrays do not support initialization assignment"));
            }
            self.scanner.next();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let variable_id = self.register_variable(variable);
        Ok(self.ast.add(Node::VariableDeclaration {
            variable: variable_id,
            assignment,
        }))
    }

    fn parse_function_declaration(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        // Return type
        if token.ty != TokenType::Identifier {
            return Err(self.error("function declaration: expected a return type"));
        }
        let Some(&type_id) = self.type_map.get(&token.name) else {
            return Err(self.error(format!(
                "function declaration: unknown type '{}'",
                token.name
            )));
        };

        // Name; stage entry points get dedicated parsers.
        let token = self.scanner.next();
        if token.ty != TokenType::Identifier {
            return Err(self.error("function declaration: expected a name"));
        }

        match token.name.as_str() {
            "vertex_main" => {
                self.scanner.back();
                return self.parse_main_pipeline(
                    FunctionType::MainVertex,
                    "vertex_main",
                    TokenType::VertexInput,
                    TokenType::VertexOutput,
                );
            }
            "fragment_main" => {
                self.scanner.back();
                return self.parse_main_pipeline(
                    FunctionType::MainFragment,
                    "fragment_main",
                    TokenType::FragmentInput,
                    TokenType::FragmentOutput,
                );
            }
            "compute_main" => {
                self.scanner.back();
                return self.parse_main_compute();
            }
            "ray_generate" => {
                self.scanner.back();
                return self.parse_main_raytracing(FunctionType::MainRayGenerate, "ray_generate");
            }
            "ray_hit_any" => {
                self.scanner.back();
                return self.parse_main_raytracing(FunctionType::MainRayHitAny, "ray_hit_any");
            }
            "ray_hit_closest" => {
                self.scanner.back();
                return self
                    .parse_main_raytracing(FunctionType::MainRayHitClosest, "ray_hit_closest");
            }
            "ray_miss" => {
                self.scanner.back();
                return self.parse_main_raytracing(FunctionType::MainRayMiss, "ray_miss");
            }
            "ray_intersection" => {
                self.scanner.back();
                return self
                    .parse_main_raytracing(FunctionType::MainRayIntersection, "ray_intersection");
            }
            "ray_callable" => {
                self.scanner.back();
                return self.parse_main_raytracing(FunctionType::MainRayCallable, "ray_callable");
            }
            _ => {}
        }

        self.check_namespace_conflicts(&token.name)?;
        let mut function = Function {
            name: token.name,
            type_id,
            ..Function::default()
        };

        // Parameters
        let scope_index = self.scope.len();
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error("function declaration: '(' before parameter list"));
        }
        let mut token = self.scanner.next();
        function.parameter_first = self.variables.len();
        while token.ty != TokenType::RParen {
            let declaration = self.parse_variable_declaration()?;
            let Node::VariableDeclaration { assignment, .. } = *self.ast.get(declaration) else {
                unreachable!();
            };
            if assignment.is_some() {
                return Err(self.error("function parameters cannot have assignment"));
            }
            token = self.scanner.current();

            let param_type = &self.types[self.variables[self.variables.len() - 1].type_id];
            let allowed = param_type.builtin
                || matches!(
                    param_type.token,
                    TokenType::Struct
                        | TokenType::SharedStruct
                        | TokenType::UniformBuffer
                        | TokenType::ConstantBuffer
                        | TokenType::MutableBuffer
                );
            if !allowed {
                self.scanner.back();
                return Err(
                    self.error("function parameter types can only be primitives, struct, or *_buffer")
                );
            }

            if token.ty == TokenType::RParen {
                break;
            }
            if token.ty != TokenType::Comma {
                return Err(self.error("function declaration: expected ',' between parameters"));
            }
            token = self.scanner.next();
        }
        function.parameter_count = self.variables.len() - function.parameter_first;

        // Body; the program loop consumes the token after the closing
        // brace.
        self.scanner.next();
        let block = self.parse_statement_block(Some(scope_index))?;

        let function_id = self.register_function(function);
        Ok(self.ast.add(Node::FunctionDeclaration {
            function_type: FunctionType::Custom,
            function: function_id,
            block,
        }))
    }

    fn parse_main_pipeline(
        &mut self,
        function_type: FunctionType,
        function_name: &str,
        in_token: TokenType,
        out_token: TokenType,
    ) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        let Some(&type_id) = self.type_map.get(&token.name) else {
            return Err(self.error(format!(
                "function declaration: unknown type '{}'",
                token.name
            )));
        };
        if type_id != PRIMITIVE_VOID {
            return Err(self.error(format!(
                "{function_name}() must have a 'void' return type"
            )));
        }

        let token = self.scanner.next();
        self.check_namespace_conflicts(&token.name)?;
        let mut function = Function {
            name: token.name,
            type_id,
            ..Function::default()
        };

        let mut has_in = false;
        let mut has_out = false;
        let mut has_instance = false;

        let scope_index = self.scope.len();
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error("function declaration: '(' before parameter list"));
        }
        let mut token = self.scanner.next();
        function.parameter_first = self.variables.len();
        let mut parameter_id = 0usize;
        while token.ty != TokenType::RParen {
            let declaration = self.parse_variable_declaration()?;
            let Node::VariableDeclaration { assignment, .. } = *self.ast.get(declaration) else {
                unreachable!();
            };
            if assignment.is_some() {
                return Err(self.error("function parameters cannot have assignment"));
            }
            token = self.scanner.current();

            let param_type_id = self.variables[self.variables.len() - 1].type_id;
            let param_token = self.types[param_type_id].token;

            if !has_in {
                if parameter_id != 0 || param_token != in_token {
                    self.scanner.back();
                    self.scanner.back();
                    return Err(self.error(format!(
                        "{function_name}() first parameter must be type '{}'",
                        keyword_name(in_token)
                    )));
                }
                if function_type == FunctionType::MainVertex {
                    self.vertex_format_type = Some(param_type_id);
                }
                has_in = true;
            } else if !has_out {
                if parameter_id != 1 || param_token != out_token {
                    self.scanner.back();
                    self.scanner.back();
                    return Err(self.error(format!(
                        "{function_name}() second parameter must be type '{}'",
                        keyword_name(out_token)
                    )));
                }
                has_out = true;
            } else if function_type == FunctionType::MainVertex
                && param_token == TokenType::InstanceInput
            {
                if has_instance {
                    self.scanner.back();
                    self.scanner.back();
                    return Err(self.error(format!(
                        "{function_name}() can only take one instance_input"
                    )));
                }
                self.instance_format_type = Some(param_type_id);
                has_instance = true;
            } else {
                let is_buffer = param_token.is_buffer_keyword();
                let is_instance = param_token == TokenType::InstanceInput;

                if is_instance && function_type != FunctionType::MainVertex {
                    self.scanner.back();
                    self.scanner.back();
                    return Err(self.error(format!(
                        "instance_input is not allowed as a parameter to {function_name}()"
                    )));
                }
                if !is_buffer && !is_instance {
                    self.scanner.back();
                    self.scanner.back();
                    return Err(self.error(format!(
                        "{function_name}() can only take in additional parameters of type *_buffer"
                    )));
                }
            }

            if token.ty == TokenType::RParen {
                break;
            }
            if token.ty != TokenType::Comma {
                return Err(self.error("function declaration: expected ',' between parameters"));
            }
            token = self.scanner.next();
            parameter_id += 1;
        }
        function.parameter_count = self.variables.len() - function.parameter_first;

        match function_type {
            FunctionType::MainVertex => {
                if !has_in {
                    return Err(self.error(format!(
                        "{function_name}() requires a first parameter of type 'vertex_input'"
                    )));
                }
                if !has_out {
                    return Err(self.error(format!(
                        "{function_name}() requires a second parameter of type 'vertex_output'"
                    )));
                }
            }
            FunctionType::MainFragment => {
                if !has_in {
                    return Err(self.error(format!(
                        "{function_name}() requires a first parameter of type 'fragment_input'"
                    )));
                }
                if !has_out {
                    return Err(self.error(format!(
                        "{function_name}() requires a second parameter of type 'fragment_output'"
                    )));
                }
            }
            _ => {}
        }

        self.scanner.next();
        let block = self.parse_statement_block(Some(scope_index))?;

        let function_id = self.register_function(function);
        match function_type {
            FunctionType::MainVertex => self.main_vertex = Some(function_id),
            FunctionType::MainFragment => self.main_fragment = Some(function_id),
            _ => {}
        }

        Ok(self.ast.add(Node::FunctionDeclaration {
            function_type,
            function: function_id,
            block,
        }))
    }

    fn parse_main_compute(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        let Some(&type_id) = self.type_map.get(&token.name) else {
            return Err(self.error(format!(
                "function declaration: unknown type '{}'",
                token.name
            )));
        };
        if type_id != PRIMITIVE_VOID {
            return Err(self.error("compute_main() must have a 'void' return type"));
        }

        let token = self.scanner.next();
        self.check_namespace_conflicts(&token.name)?;
        let mut function = Function {
            name: token.name,
            type_id,
            ..Function::default()
        };

        // (x, y, z) thread group counts
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error("compute_main: expected '(' before thread groups"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::Integer {
            return Err(self.error("compute_main: expected thread group x"));
        }
        self.thread_group.0 = token.integer;

        let token = self.scanner.next();
        if token.ty != TokenType::Comma {
            return Err(self.error("compute_main: expected ','"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::Integer {
            return Err(self.error("compute_main: expected thread group y"));
        }
        self.thread_group.1 = token.integer;

        let token = self.scanner.next();
        if token.ty != TokenType::Comma {
            return Err(self.error("compute_main: expected ','"));
        }

        let token = self.scanner.next();
        if token.ty != TokenType::Integer {
            return Err(self.error("compute_main: expected thread group z"));
        }
        self.thread_group.2 = token.integer;

        let token = self.scanner.next();
        if token.ty != TokenType::RParen {
            return Err(self.error("compute_main: expected ')' after thread groups"));
        }

        let block = self.parse_main_buffer_parameters(&mut function, "compute_main")?;

        let function_id = self.register_function(function);
        self.main_compute = Some(function_id);

        Ok(self.ast.add(Node::FunctionDeclaration {
            function_type: FunctionType::MainCompute,
            function: function_id,
            block,
        }))
    }

    fn parse_main_raytracing(
        &mut self,
        function_type: FunctionType,
        function_name: &str,
    ) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();

        let Some(&type_id) = self.type_map.get(&token.name) else {
            return Err(self.error(format!(
                "function declaration: unknown type '{}'",
                token.name
            )));
        };
        if type_id != PRIMITIVE_VOID {
            return Err(self.error(format!(
                "{function_name}() must have a 'void' return type"
            )));
        }

        let token = self.scanner.next();
        self.check_namespace_conflicts(&token.name)?;
        let mut function = Function {
            name: token.name,
            type_id,
            ..Function::default()
        };

        let block = self.parse_main_buffer_parameters(&mut function, function_name)?;

        let function_id = self.register_function(function);
        self.main_ray.push(function_id);

        Ok(self.ast.add(Node::FunctionDeclaration {
            function_type,
            function: function_id,
            block,
        }))
    }

    /// Parameter list that admits only `*_buffer` types, then the body.
    fn parse_main_buffer_parameters(
        &mut self,
        function: &mut Function,
        function_name: &str,
    ) -> Result<NodeId, ShaderError> {
        let scope_index = self.scope.len();
        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            return Err(self.error("function declaration: '(' before parameter list"));
        }
        let mut token = self.scanner.next();
        function.parameter_first = self.variables.len();
        while token.ty != TokenType::RParen {
            let declaration = self.parse_variable_declaration()?;
            let Node::VariableDeclaration { assignment, .. } = *self.ast.get(declaration) else {
                unreachable!();
            };
            if assignment.is_some() {
                return Err(self.error("function parameters cannot have assignment"));
            }
            token = self.scanner.current();

            let param_token = self.types[self.variables[self.variables.len() - 1].type_id].token;
            if !param_token.is_buffer_keyword() {
                self.scanner.back();
                return Err(self.error(format!(
                    "{function_name}() can only take parameters of type *_buffer"
                )));
            }

            if token.ty == TokenType::RParen {
                break;
            }
            if token.ty != TokenType::Comma {
                return Err(self.error("function declaration: expected ',' between parameters"));
            }
            token = self.scanner.next();
        }
        function.parameter_count = self.variables.len() - function.parameter_first;

        self.scanner.next();
        let block = self.parse_statement_block(Some(scope_index))?;
        Ok(block)
    }

    // Expressions, lowest to highest precedence.

    pub fn parse_expression(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<NodeId, ShaderError> {
        let node = self.parse_ternary_condition()?;

        let op = match self.scanner.current().ty {
            TokenType::Assign => BinaryOp::Assign,
            TokenType::PlusAssign => BinaryOp::AddAssign,
            TokenType::MinusAssign => BinaryOp::SubAssign,
            TokenType::StarAssign => BinaryOp::MulAssign,
            TokenType::SlashAssign => BinaryOp::DivAssign,
            TokenType::ModAssign => BinaryOp::ModAssign,
            TokenType::BitShiftLeftAssign => BinaryOp::BitShiftLeftAssign,
            TokenType::BitShiftRightAssign => BinaryOp::BitShiftRightAssign,
            TokenType::BitAndAssign => BinaryOp::BitAndAssign,
            TokenType::BitOrAssign => BinaryOp::BitOrAssign,
            TokenType::BitXorAssign => BinaryOp::BitXorAssign,
            _ => return Ok(node),
        };

        if self.node_is_constexpr(node) {
            return Err(self.error("LHS must be a modifiable expression"));
        }
        self.scanner.next();
        let rhs = self.parse_assignment()?;
        Ok(self.ast.add(Node::ExpressionBinary { op, lhs: node, rhs }))
    }

    fn parse_ternary_condition(&mut self) -> Result<NodeId, ShaderError> {
        let node = self.parse_logical_or()?;

        if self.scanner.current().ty == TokenType::Question {
            self.scanner.next();
            let expr_true = self.parse_ternary_condition()?;

            if self.scanner.current().ty != TokenType::Colon {
                return Err(self.error("Expected ':' in ternary statement"));
            }

            self.scanner.next();
            let expr_false = self.parse_ternary_condition()?;

            return Ok(self.ast.add(Node::ExpressionTernary {
                condition: node,
                expr_true,
                expr_false,
            }));
        }

        Ok(node)
    }

    fn parse_binary_chain(
        &mut self,
        next: fn(&mut Self) -> Result<NodeId, ShaderError>,
        ops: &[(TokenType, BinaryOp)],
    ) -> Result<NodeId, ShaderError> {
        let mut node = next(self)?;

        loop {
            let current = self.scanner.current().ty;
            let Some(&(_, op)) = ops.iter().find(|(token, _)| *token == current) else {
                return Ok(node);
            };

            self.scanner.next();
            let rhs = next(self)?;
            node = self.ast.add(Node::ExpressionBinary { op, lhs: node, rhs });
        }
    }

    fn parse_logical_or(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(Self::parse_logical_and, &[(TokenType::Or, BinaryOp::Or)])
    }

    fn parse_logical_and(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(Self::parse_bitwise_or, &[(TokenType::And, BinaryOp::And)])
    }

    fn parse_bitwise_or(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_bitwise_xor,
            &[(TokenType::BitOr, BinaryOp::BitOr)],
        )
    }

    fn parse_bitwise_xor(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_bitwise_and,
            &[(TokenType::BitXor, BinaryOp::BitXor)],
        )
    }

    fn parse_bitwise_and(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_equality,
            &[(TokenType::BitAnd, BinaryOp::BitAnd)],
        )
    }

    fn parse_equality(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_comparison,
            &[
                (TokenType::Equals, BinaryOp::Equals),
                (TokenType::NotEquals, BinaryOp::NotEquals),
            ],
        )
    }

    fn parse_comparison(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_bitwise_shift,
            &[
                (TokenType::GreaterThan, BinaryOp::Greater),
                (TokenType::GreaterThanEquals, BinaryOp::GreaterEquals),
                (TokenType::LessThan, BinaryOp::Less),
                (TokenType::LessThanEquals, BinaryOp::LessEquals),
            ],
        )
    }

    fn parse_bitwise_shift(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_add_sub,
            &[
                (TokenType::BitShiftLeft, BinaryOp::BitShiftLeft),
                (TokenType::BitShiftRight, BinaryOp::BitShiftRight),
            ],
        )
    }

    fn parse_add_sub(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_mul_div_mod,
            &[
                (TokenType::Plus, BinaryOp::Add),
                (TokenType::Minus, BinaryOp::Sub),
            ],
        )
    }

    fn parse_mul_div_mod(&mut self) -> Result<NodeId, ShaderError> {
        self.parse_binary_chain(
            Self::parse_prefix_operators,
            &[
                (TokenType::Star, BinaryOp::Mul),
                (TokenType::Slash, BinaryOp::Div),
                (TokenType::Mod, BinaryOp::Mod),
            ],
        )
    }

    fn parse_prefix_operators(&mut self) -> Result<NodeId, ShaderError> {
        let op = match self.scanner.current().ty {
            TokenType::PlusPlus => Some(UnaryOp::PreIncrement),
            TokenType::MinusMinus => Some(UnaryOp::PreDecrement),
            TokenType::Plus => Some(UnaryOp::Plus),
            TokenType::Minus => Some(UnaryOp::Minus),
            TokenType::BitNot => Some(UnaryOp::BitNot),
            TokenType::Bang => Some(UnaryOp::Not),
            _ => None,
        };

        match op {
            Some(op) => {
                self.scanner.next();
                let expr = self.parse_expression()?;
                Ok(self.ast.add(Node::ExpressionUnary { op, expr }))
            }
            None => self.parse_suffix_operators(),
        }
    }

    fn parse_suffix_operators(&mut self) -> Result<NodeId, ShaderError> {
        let node = self.parse_dot_operator()?;

        match self.scanner.current().ty {
            TokenType::PlusPlus => {
                self.scanner.next();
                Ok(self.ast.add(Node::ExpressionUnary {
                    op: UnaryOp::PostIncrement,
                    expr: node,
                }))
            }
            TokenType::MinusMinus => {
                self.scanner.next();
                Ok(self.ast.add(Node::ExpressionUnary {
                    op: UnaryOp::PostDecrement,
                    expr: node,
                }))
            }
            _ => Ok(node),
        }
    }

    fn parse_dot_operator(&mut self) -> Result<NodeId, ShaderError> {
        let mut node = self.parse_subscript_operator()?;

        while self.scanner.current().ty == TokenType::Dot {
            let token = self.scanner.next();
            if token.ty != TokenType::Identifier {
                return Err(self.error("RHS for '.' operator must be an identifier"));
            }

            let Some(type_id) = self.node_type(node) else {
                self.scanner.back();
                return Err(self.error("invalid LHS for '.' operator"));
            };

            if type_id >= PRIMITIVE_COUNT {
                // User type: the member scope is pushed only while the RHS
                // resolves, so members do not leak into the outer scope.
                let member = {
                    let ty = &self.types[type_id];
                    let first = ty.member_first;
                    let last = first + ty.member_count;
                    (first..last).find(|&i| self.variables[i].name == token.name)
                };

                let Some(member) = member else {
                    return Err(self.error(format!(
                        "'{}' is not a member of LHS type '{}'",
                        token.name, self.types[type_id].name
                    )));
                };

                self.scope.push(member);
                let expr = self.parse_dot_operator()?;
                self.scope.pop();
                node = self.ast.add(Node::ExpressionBinary {
                    op: BinaryOp::Dot,
                    lhs: node,
                    rhs: expr,
                });
            } else {
                // Built-in type: only swizzles are valid members.
                if !self.swizzle_map.contains_key(&token.name) {
                    return Err(self.error(format!(
                        "invalid swizzle on built-in type '{}'",
                        self.types[type_id].name
                    )));
                }
                self.swizzling = true;
                let expr = self.parse_fundamental()?;
                self.swizzling = false;
                node = self.ast.add(Node::ExpressionBinary {
                    op: BinaryOp::Dot,
                    lhs: node,
                    rhs: expr,
                });
            }
        }

        Ok(node)
    }

    fn parse_subscript_operator(&mut self) -> Result<NodeId, ShaderError> {
        let mut node = self.parse_fundamental()?;

        while self.scanner.current().ty == TokenType::LBrack {
            self.scanner.next();
            let expr = self.parse_expression()?;

            if self.scanner.current().ty != TokenType::RBrack {
                return Err(self.error("Expected ']' after array indexing"));
            }

            self.scanner.next();
            node = self.ast.add(Node::ExpressionBinary {
                op: BinaryOp::Subscript,
                lhs: node,
                rhs: expr,
            });
        }

        Ok(node)
    }

    fn parse_fundamental(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();
        match token.ty {
            TokenType::Identifier => {
                if self.swizzling {
                    if let Some(&swizzle) = self.swizzle_map.get(&token.name) {
                        self.scanner.next();
                        return Ok(self.ast.add(Node::Swizzle { swizzle }));
                    }
                }

                if let Some(&semantic) = self.sv_semantic_map.get(&token.name) {
                    self.scanner.next();
                    return Ok(self.ast.add(Node::SVSemantic { semantic }));
                }

                if let Some(variable) = self.scope_find_variable(&token.name) {
                    self.scanner.next();
                    return Ok(self.ast.add(Node::Variable { variable }));
                }

                if self.function_map.contains_key(&token.name) {
                    return self.parse_function_call();
                }

                if self.type_map.contains_key(&token.name) {
                    return self.parse_cast();
                }

                Err(self.error(format!("undeclared identifier '{}'", token.name)))
            }

            TokenType::Integer => {
                self.scanner.next();
                Ok(self.ast.add(Node::Integer {
                    value: token.integer,
                }))
            }

            TokenType::Number => {
                self.scanner.next();
                Ok(self.ast.add(Node::Number {
                    value: token.number,
                }))
            }

            TokenType::True | TokenType::False => {
                self.scanner.next();
                Ok(self.ast.add(Node::Boolean {
                    value: token.ty == TokenType::True,
                }))
            }

            TokenType::LParen => {
                self.scanner.next();
                let expr = self.parse_expression()?;

                if self.scanner.current().ty != TokenType::RParen {
                    return Err(self.error("missing closing ')' on group"));
                }

                self.scanner.next();
                Ok(self.ast.add(Node::Group { expr }))
            }

            _ => Err(self.error("unexpected symbol")),
        }
    }

    /// Parses `name( expr, ... )`, current token being the name.
    fn parse_function_call(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();
        let function = self.function_map[&token.name];

        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("function call requires '('"));
        }

        let param = self.parse_expression_list(TokenType::RParen, "function parameters")?;
        self.scanner.next();
        Ok(self.ast.add(Node::FunctionCall { function, param }))
    }

    /// Parses `type( expr, ... )` constructor casts.
    fn parse_cast(&mut self) -> Result<NodeId, ShaderError> {
        let token = self.scanner.current();
        let type_id = self.type_map[&token.name];

        let token = self.scanner.next();
        if token.ty != TokenType::LParen {
            self.scanner.back();
            return Err(self.error("type cast requires '('"));
        }

        let param = self.parse_expression_list(TokenType::RParen, "type cast parameters")?;
        self.scanner.next();
        Ok(self.ast.add(Node::Cast { type_id, param }))
    }

    fn parse_expression_list(
        &mut self,
        terminator: TokenType,
        what: &str,
    ) -> Result<Option<NodeId>, ShaderError> {
        let mut first = None;
        let mut previous: Option<NodeId> = None;

        let mut token = self.scanner.next();
        while token.ty != terminator {
            let expr = self.parse_expression()?;
            let current = self.ast.add(Node::ExpressionList { expr, next: None });

            if first.is_none() {
                first = Some(current);
            }
            if let Some(previous) = previous {
                let Node::ExpressionList { next, .. } = self.ast.get_mut(previous) else {
                    unreachable!();
                };
                *next = Some(current);
            }
            previous = Some(current);

            token = self.scanner.current();
            if token.ty == terminator {
                break;
            }
            if token.ty != TokenType::Comma {
                return Err(self.error(format!("{what} require ',' separation")));
            }
            token = self.scanner.next();
        }

        Ok(first)
    }
}
