use std::fmt;
use std::rc::Rc;

use crate::error::SourceLoc;
use crate::interner::Sym;

/// Binary operators that can appear in an `Infix` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    RangeExclusive,
    RangeInclusive,
    And,
    Or,
    NilCoalesce,
    FalsyCoalesce,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::RangeExclusive => "..",
            BinOp::RangeInclusive => "..=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::NilCoalesce => "??",
            BinOp::FalsyCoalesce => "?:",
        };
        f.write_str(s)
    }
}

/// A function definition: shared between the `Fn` AST node and the closures
/// minted from it. Parameter layout is positional params (required prefix,
/// then optionals with default expressions), then an optional rest collector,
/// then an optional kwargs collector.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: Option<Sym>,
    pub params: Vec<Sym>,
    pub num_required: usize,
    pub defaults: Vec<Rc<Node>>,
    pub rest_param: Option<Sym>,
    pub kwargs_param: Option<Sym>,
    pub body: Rc<Node>,
}

/// One AST node. Children are held by `Rc` so a closure can keep its body
/// subtree alive directly, without a separate root handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub loc: SourceLoc,
}

impl Node {
    pub fn new(kind: NodeKind, loc: SourceLoc) -> Rc<Node> {
        Rc::new(Node { kind, loc })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    IntLit(i64),
    FloatLit(f64),
    StringLit(Vec<u8>),
    StringInterp(Vec<Rc<Node>>),
    SymbolLit(Sym),
    BoolLit(bool),
    NilLit,
    ArrayLit(Vec<Rc<Node>>),
    MapLit(Vec<(Sym, Rc<Node>)>),
    Name(Sym),
    DottedName {
        base: Rc<Node>,
        fields: Vec<Sym>,
    },
    /// A prefix call. A bare `Name`/`DottedName` in statement or argument
    /// position parses to a `Call` with no arguments (the auto-call rule).
    Call {
        head: Rc<Node>,
        args: Vec<Rc<Node>>,
        named: Vec<(Sym, Rc<Node>)>,
    },
    Infix {
        op: BinOp,
        lhs: Rc<Node>,
        rhs: Rc<Node>,
    },
    UnaryNot(Rc<Node>),
    UnaryNegate(Rc<Node>),
    /// `~expr`: evaluate the operand without auto-calling it.
    Ref(Rc<Node>),
    Block(Vec<Rc<Node>>),
    Index {
        target: Rc<Node>,
        index: Rc<Node>,
    },
    If {
        arms: Vec<(Rc<Node>, Rc<Node>)>,
        else_body: Option<Rc<Node>>,
    },
    For {
        var: Sym,
        iterable: Rc<Node>,
        body: Rc<Node>,
    },
    While {
        cond: Rc<Node>,
        body: Rc<Node>,
    },
    Match {
        scrutinee: Rc<Node>,
        arms: Vec<(Rc<Node>, Rc<Node>)>,
    },
    Set {
        target: Vec<Sym>,
        value: Rc<Node>,
    },
    Let {
        name: Sym,
        value: Rc<Node>,
    },
    Fn(Rc<FnDef>),
    On {
        event: Sym,
        body: Rc<Node>,
    },
    Return(Option<Rc<Node>>),
    Source(Rc<Node>),
}
