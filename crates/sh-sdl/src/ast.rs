/// Source span as a byte range.
pub type Span = std::ops::Range<usize>;

/// An AST node with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The wrapped node.
    pub node: T,
    /// Byte range of the node in the source text.
    pub span: Span,
}

/// A parsed source file: a sequence of top-level elements.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    /// Top-level elements (`world` or `model`).
    pub elements: Vec<Spanned<Element>>,
}

/// A braced element, e.g. `model "box" { ... }` or `physics { ... }`.
///
/// The grammar does not restrict which kinds may appear where; the compiler
/// checks that, so misplaced elements get a precise diagnostic.
#[derive(Debug, Clone)]
pub struct Element {
    /// Element kind: the leading word.
    pub kind: Spanned<String>,
    /// Optional quoted name following the kind.
    pub name: Option<Spanned<String>>,
    /// Statements inside the braces.
    pub body: Vec<Spanned<Statement>>,
}

/// A statement inside an element body.
#[derive(Debug, Clone)]
pub enum Statement {
    /// `key value`
    Property(Property),
    /// A nested braced element.
    Element(Element),
    /// A `"""..."""` description.
    Description(String),
}

/// A key-value property, e.g. `mass 2.5`.
#[derive(Debug, Clone)]
pub struct Property {
    /// Property name.
    pub key: Spanned<String>,
    /// Property value.
    pub value: Spanned<Value>,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Quoted string.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// `true` or `false`.
    Boolean(bool),
    /// Bare word.
    Identifier(String),
    /// `[a, b, c]`
    List(Vec<Spanned<Value>>),
}

impl Value {
    /// Numeric view of the value, widening integers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// A list of numbers, or `None` if any item is not numeric.
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            Self::List(items) => items.iter().map(|v| v.node.as_number()).collect(),
            _ => None,
        }
    }

    /// Textual view: quoted strings and bare identifiers.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Identifier(s) => Some(s),
            _ => None,
        }
    }
}
