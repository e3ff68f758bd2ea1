//! Token vocabulary of the shader language.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenType {
    EndOfFile,
    Error,

    // Whitespace
    Newline,
    Space,
    Tab,

    // Punctuation
    LParen,
    RParen,
    LCurly,
    RCurly,
    LBrack,
    RBrack,
    Dot,
    Comma,
    Colon,
    Semicolon,
    BitNot,
    Question,
    Quote,
    Escape,

    Assign,
    Equals,
    NotEquals,
    Bang,
    Plus,
    PlusAssign,
    PlusPlus,
    Minus,
    MinusAssign,
    MinusMinus,
    Star,
    StarAssign,
    Slash,
    SlashAssign,
    CommentLine,
    CommentStart,
    CommentEnd,
    Mod,
    ModAssign,
    BitXor,
    BitXorAssign,
    BitOr,
    BitOrAssign,
    Or,
    BitAnd,
    BitAndAssign,
    And,
    BitShiftLeft,
    BitShiftLeftAssign,
    LessThan,
    LessThanEquals,
    BitShiftRight,
    BitShiftRightAssign,
    GreaterThan,
    GreaterThanEquals,

    // Keywords
    In,
    Out,
    InOut,
    True,
    False,
    Const,
    Return,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Discard,
    If,
    Else,
    While,
    Do,
    For,
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
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    AttributePositionOut,
    AttributePositionIn,
    AttributeTarget,
    Depth,
    Color,
    AttributePackedAs,
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

    // Preprocessor directives
    DirectiveInclude,
    DirectiveDefine,
    DirectiveUndefine,
    DirectiveIf,
    DirectiveIfDefined,
    DirectiveIfUndefined,
    DirectiveElse,
    DirectiveElseIf,
    DirectiveEndIf,
    DirectivePragma,
    DirectiveOnce,
    DirectiveDefined,
    DirectiveUndefined,

    Identifier,
    Integer,
    Number,
}

impl TokenType {
    pub fn is_whitespace(self) -> bool {
        matches!(self, Self::Newline | Self::Space | Self::Tab)
    }

    pub fn is_packed_format(self) -> bool {
        matches!(
            self,
            Self::Unorm8
                | Self::Unorm16
                | Self::Unorm32
                | Self::Snorm8
                | Self::Snorm16
                | Self::Snorm32
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Sint8
                | Self::Sint16
                | Self::Sint32
                | Self::Float16
                | Self::Float32
        )
    }

    pub fn is_struct_keyword(self) -> bool {
        matches!(
            self,
            Self::Struct
                | Self::SharedStruct
                | Self::UniformBuffer
                | Self::ConstantBuffer
                | Self::MutableBuffer
                | Self::InstanceInput
                | Self::VertexInput
                | Self::VertexOutput
                | Self::FragmentInput
                | Self::FragmentOutput
        )
    }

    pub fn is_texture_keyword(self) -> bool {
        matches!(
            self,
            Self::Texture1D
                | Self::Texture1DArray
                | Self::Texture2D
                | Self::Texture2DArray
                | Self::Texture3D
                | Self::TextureCube
                | Self::TextureCubeArray
        )
    }

    pub fn is_buffer_keyword(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer | Self::ConstantBuffer | Self::MutableBuffer
        )
    }
}

pub const KEYWORDS: &[(&str, TokenType)] = &[
    ("in", TokenType::In),
    ("out", TokenType::Out),
    ("inout", TokenType::InOut),
    ("true", TokenType::True),
    ("false", TokenType::False),
    ("const", TokenType::Const),
    ("return", TokenType::Return),
    ("break", TokenType::Break),
    ("continue", TokenType::Continue),
    ("switch", TokenType::Switch),
    ("case", TokenType::Case),
    ("default", TokenType::Default),
    ("discard", TokenType::Discard),
    ("if", TokenType::If),
    ("else", TokenType::Else),
    ("while", TokenType::While),
    ("do", TokenType::Do),
    ("for", TokenType::For),
    ("struct", TokenType::Struct),
    ("shared_struct", TokenType::SharedStruct),
    ("uniform_buffer", TokenType::UniformBuffer),
    ("constant_buffer", TokenType::ConstantBuffer),
    ("mutable_buffer", TokenType::MutableBuffer),
    ("instance_input", TokenType::InstanceInput),
    ("vertex_input", TokenType::VertexInput),
    ("vertex_output", TokenType::VertexOutput),
    ("fragment_input", TokenType::FragmentInput),
    ("fragment_output", TokenType::FragmentOutput),
    ("texture1D", TokenType::Texture1D),
    ("texture1DArray", TokenType::Texture1DArray),
    ("texture2D", TokenType::Texture2D),
    ("texture2DArray", TokenType::Texture2DArray),
    ("texture3D", TokenType::Texture3D),
    ("textureCube", TokenType::TextureCube),
    ("textureCubeArray", TokenType::TextureCubeArray),
    ("position_out", TokenType::AttributePositionOut),
    ("position_in", TokenType::AttributePositionIn),
    ("target", TokenType::AttributeTarget),
    ("DEPTH", TokenType::Depth),
    ("COLOR", TokenType::Color),
    ("packed_as", TokenType::AttributePackedAs),
    ("UNORM8", TokenType::Unorm8),
    ("UNORM16", TokenType::Unorm16),
    ("UNORM32", TokenType::Unorm32),
    ("SNORM8", TokenType::Snorm8),
    ("SNORM16", TokenType::Snorm16),
    ("SNORM32", TokenType::Snorm32),
    ("UINT8", TokenType::Uint8),
    ("UINT16", TokenType::Uint16),
    ("UINT32", TokenType::Uint32),
    ("SINT8", TokenType::Sint8),
    ("SINT16", TokenType::Sint16),
    ("SINT32", TokenType::Sint32),
    ("FLOAT16", TokenType::Float16),
    ("FLOAT32", TokenType::Float32),
];

pub const DIRECTIVES: &[(&str, TokenType)] = &[
    ("#include", TokenType::DirectiveInclude),
    ("#define", TokenType::DirectiveDefine),
    ("#undef", TokenType::DirectiveUndefine),
    ("#if", TokenType::DirectiveIf),
    ("#ifdef", TokenType::DirectiveIfDefined),
    ("#ifndef", TokenType::DirectiveIfUndefined),
    ("#else", TokenType::DirectiveElse),
    ("#elif", TokenType::DirectiveElseIf),
    ("#endif", TokenType::DirectiveEndIf),
    ("#pragma", TokenType::DirectivePragma),
    ("once", TokenType::DirectiveOnce),
    ("defined", TokenType::DirectiveDefined),
    ("undefined", TokenType::DirectiveUndefined),
];

/// One scanned token. The lexeme is owned so tokens survive the source
/// buffer.
#[derive(Clone, Debug)]
pub struct Token {
    pub ty: TokenType,
    pub name: String,
    pub integer: u64,
    pub number: f64,
    /// Byte offset of the lexeme start.
    pub start: usize,
    /// Scanner position after the lexeme.
    pub position: usize,
    pub line: u32,
}

impl Token {
    pub fn new(ty: TokenType) -> Self {
        Self {
            ty,
            name: String::new(),
            integer: 0,
            number: 0.0,
            start: 0,
            position: 0,
            line: 1,
        }
    }
}
