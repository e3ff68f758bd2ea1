//! The shader AST.
//!
//! Nodes live in one arena and reference each other by index, so the tree
//! is freed by dropping the arena and no node owns another.

pub type NodeId = usize;
pub type TypeId = usize;
pub type FunctionId = usize;
pub type VariableId = usize;
pub type StructId = usize;
pub type TextureId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    BitShiftLeftAssign,
    BitShiftRightAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equals,
    NotEquals,
    Greater,
    GreaterEquals,
    Less,
    LessEquals,
    BitShiftLeft,
    BitShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Dot,
    Subscript,
}

impl BinaryOp {
    /// Source-level spelling; `Dot` and `Subscript` are emitted
    /// structurally, not via this symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::BitShiftLeftAssign => "<<=",
            Self::BitShiftRightAssign => ">>=",
            Self::BitAndAssign => "&=",
            Self::BitOrAssign => "|=",
            Self::BitXorAssign => "^=",
            Self::Or => "||",
            Self::And => "&&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Greater => ">",
            Self::GreaterEquals => ">=",
            Self::Less => "<",
            Self::LessEquals => "<=",
            Self::BitShiftLeft => "<<",
            Self::BitShiftRight => ">>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Dot => ".",
            Self::Subscript => "[]",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    PreIncrement,
    PreDecrement,
    Plus,
    Minus,
    BitNot,
    Not,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::PreIncrement | Self::PostIncrement => "++",
            Self::PreDecrement | Self::PostDecrement => "--",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::BitNot => "~",
            Self::Not => "!",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, Self::PostIncrement | Self::PostDecrement)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StructType {
    Struct,
    SharedStruct,
    UniformBuffer,
    ConstantBuffer,
    MutableBuffer,
    InstanceInput,
    VertexInput,
    VertexOutput,
    FragmentInput,
    FragmentOutput,
}

impl StructType {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::SharedStruct => "shared_struct",
            Self::UniformBuffer => "uniform_buffer",
            Self::ConstantBuffer => "constant_buffer",
            Self::MutableBuffer => "mutable_buffer",
            Self::InstanceInput => "instance_input",
            Self::VertexInput => "vertex_input",
            Self::VertexOutput => "vertex_output",
            Self::FragmentInput => "fragment_input",
            Self::FragmentOutput => "fragment_output",
        }
    }

    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer | Self::ConstantBuffer | Self::MutableBuffer
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureDim {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionType {
    Custom,
    MainVertex,
    MainFragment,
    MainCompute,
    MainRayGenerate,
    MainRayHitAny,
    MainRayHitClosest,
    MainRayMiss,
    MainRayIntersection,
    MainRayCallable,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SVSemanticType {
    VertexId,
    InstanceId,
    PrimitiveId,
    SampleId,
    IsFrontFace,
    DispatchThreadId,
    GroupThreadId,
    GroupId,
    GroupIndex,
}

pub const SV_SEMANTICS: &[(&str, SVSemanticType)] = &[
    ("SV_VertexID", SVSemanticType::VertexId),
    ("SV_InstanceID", SVSemanticType::InstanceId),
    ("SV_PrimitiveID", SVSemanticType::PrimitiveId),
    ("SV_SampleID", SVSemanticType::SampleId),
    ("SV_IsFrontFace", SVSemanticType::IsFrontFace),
    ("SV_DispatchThreadID", SVSemanticType::DispatchThreadId),
    ("SV_GroupThreadID", SVSemanticType::GroupThreadId),
    ("SV_GroupID", SVSemanticType::GroupId),
    ("SV_GroupIndex", SVSemanticType::GroupIndex),
];

#[derive(Clone, Debug)]
pub enum Node {
    StatementBlock {
        statement: Option<NodeId>,
        next: Option<NodeId>,
    },
    StatementExpression {
        expr: NodeId,
    },
    StatementIf {
        condition: NodeId,
        block_if: NodeId,
        block_else: Option<NodeId>,
    },
    StatementWhile {
        condition: NodeId,
        block: NodeId,
    },
    StatementDoWhile {
        condition: NodeId,
        block: NodeId,
    },
    StatementFor {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        block: NodeId,
    },
    StatementSwitch {
        expr: NodeId,
        first: NodeId,
    },
    StatementCase {
        expr: NodeId,
        block: Option<NodeId>,
    },
    StatementDefault {
        block: Option<NodeId>,
    },
    StatementReturn {
        expr: Option<NodeId>,
    },
    StatementBreak,
    StatementContinue,
    StatementDiscard,
    ExpressionBinary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    ExpressionUnary {
        op: UnaryOp,
        expr: NodeId,
    },
    ExpressionTernary {
        condition: NodeId,
        expr_true: NodeId,
        expr_false: NodeId,
    },
    FunctionCall {
        function: FunctionId,
        param: Option<NodeId>,
    },
    FunctionDeclaration {
        function_type: FunctionType,
        function: FunctionId,
        block: NodeId,
    },
    VariableDeclaration {
        variable: VariableId,
        assignment: Option<NodeId>,
    },
    Variable {
        variable: VariableId,
    },
    Struct {
        struct_type: StructType,
        struct_id: StructId,
    },
    Texture {
        dim: TextureDim,
        texture: TextureId,
    },
    Cast {
        type_id: TypeId,
        param: Option<NodeId>,
    },
    Group {
        expr: NodeId,
    },
    Swizzle {
        swizzle: usize,
    },
    SVSemantic {
        semantic: SVSemanticType,
    },
    Integer {
        value: u64,
    },
    Number {
        value: f64,
    },
    Boolean {
        value: bool,
    },
    ExpressionList {
        expr: NodeId,
        next: Option<NodeId>,
    },
}

/// The node arena.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Generates every swizzle mask: lengths 1..=4 over `xyzw` then `rgba`,
/// first component varying fastest.
pub fn swizzle_names() -> Vec<String> {
    let mut names = Vec::new();
    for len in 1..=4usize {
        for set in [b"xyzw", b"rgba"] {
            for combo in 0..4usize.pow(len as u32) {
                let mut name = String::with_capacity(len);
                for position in 0..len {
                    name.push(set[(combo >> (2 * position)) & 3] as char);
                }
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::swizzle_names;

    #[test]
    fn swizzle_table() {
        let names = swizzle_names();
        // 2 sets of 4 + 16 + 64 + 256.
        assert_eq!(names.len(), 2 * (4 + 16 + 64 + 256));
        assert!(names.iter().any(|n| n == "x"));
        assert!(names.iter().any(|n| n == "rgba"));
        assert!(names.iter().any(|n| n == "xyzw"));
        assert!(names.iter().any(|n| n == "wzyx"));

        // No duplicates.
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }
}
