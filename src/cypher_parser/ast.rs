//! Abstract syntax tree for the Cypher subset this engine accepts.
//!
//! Parsing and validation are explicitly out of scope for the execution
//! engine (see SPEC_FULL.md §1): this AST and the `nom` grammar that builds
//! it exist only so the plan builder has something to consume end-to-end in
//! tests and the CLI. Unlike the upstream grammar this was grown from, nodes
//! own their strings rather than borrowing from an arena — the engine's hot
//! path is the operator tree, not the parser, so there is no reason to thread
//! a lifetime through every downstream module.

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
    /// Zero or more `UNION`/`UNION ALL` parts chained after the first
    /// statement (SPEC_FULL.md §4.2.3). Empty for an ordinary query.
    pub unions: Vec<UnionPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionPart {
    /// `true` for `UNION ALL` (duplicates kept), `false` for plain `UNION`
    /// (result rows deduplicated).
    pub all: bool,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(MatchClause),
    OptionalMatch(MatchClause),
    Where(Expr),
    Create(CreateClause),
    Merge(MergeClause),
    Set(SetClause),
    Remove(RemoveClause),
    Delete(DeleteClause),
    With(WithClause),
    Return(ReturnClause),
    Unwind(UnwindClause),
    Call(CallClause),
    CallSubquery(Query),
    Foreach(ForeachClause),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub path_var: Option<String>,
    pub pattern: Pattern,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateClause {
    pub pattern: Pattern,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    pub pattern: Pattern,
    pub on_match: Vec<SetItem>,
    pub on_create: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub items: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    Property { alias: String, key: String, value: Expr },
    Labels { alias: String, labels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveClause {
    pub items: Vec<RemoveItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    Property { alias: String, key: String },
    Label { alias: String, label: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub detach: bool,
    pub items: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub distinct: bool,
    pub items: Vec<ProjectionItem>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub distinct: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub desc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnwindClause {
    pub expr: Expr,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallClause {
    pub name: String,
    pub args: Vec<Expr>,
    pub yield_items: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeachClause {
    pub var: String,
    pub list: Expr,
    pub clauses: Vec<Clause>,
}

/// A pattern is a list of path elements: alternating nodes and connecting
/// relationships, e.g. `(a)-[r]->(b)-[r2]->(c)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub paths: Vec<PatternPath>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternPath {
    pub start: NodePattern,
    pub steps: Vec<(RelPattern, NodePattern)>,
    pub shortest_path: ShortestPathKind,
}

/// `shortestPath(...)` binds one shortest path; `allShortestPaths(...)`
/// binds every path tied for shortest (SPEC_FULL.md §4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortestPathKind {
    None,
    Single,
    All,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub alias: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub alias: Option<String>,
    pub rel_types: Vec<String>,
    pub direction: Direction,
    pub properties: Vec<(String, Expr)>,
    pub min_hops: Option<u32>,
    pub max_hops: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Either,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
    In,
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    Parameter(String),
    List(Vec<Expr>),
    Property { base: Box<Expr>, key: String },
    FunctionCall { name: String, args: Vec<Expr>, distinct: bool },
    BinaryOp { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    /// `EXISTS { pattern [WHERE ...] }` — path-existence predicate, see
    /// SPEC_FULL.md §4.2.5 / §4.5 (rewritten into Semi-/Anti-Semi-Apply).
    Exists { pattern: Pattern, where_clause: Option<Box<Expr>> },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }
}
