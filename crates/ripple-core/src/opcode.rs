//! The opcode table: every object kind and every named command, in a
//! fixed order that the whole runtime depends on.
//!
//! The position of a kind in this table is semantic: category predicates
//! (`is_integer`, `is_algebraic`, ...) are inclusive range checks over tag
//! values, and the persistence format freezes tag numbers forever (new
//! entries may only be appended).

use std::collections::HashMap;
use std::sync::OnceLock;

/// Tag values for every object kind and command.
///
/// The first block is payload-bearing object kinds, then the ten control
/// structures, then commands (no payload). Do not reorder.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u16)]
pub enum Op {
    // === Object kinds ===
    /// Integer displayed in the session base, arithmetic modulo 2^wordsize.
    BasedInteger = 0,
    /// Based integer wider than 64 bits.
    BasedBignum,
    /// Small non-negative integer (magnitude fits in 64 bits).
    Integer,
    /// Small negative integer.
    NegInteger,
    /// Arbitrary-precision non-negative integer.
    Bignum,
    /// Arbitrary-precision negative integer.
    NegBignum,
    /// Positive rational, numerator/denominator as small integers.
    Fraction,
    /// Negative rational with small components.
    NegFraction,
    /// Positive rational with bignum components.
    BigFraction,
    /// Negative rational with bignum components.
    NegBigFraction,
    /// IEEE-754 binary64.
    Decimal,
    /// Complex number in rectangular form (re, im).
    Rectangular,
    /// Complex number in polar form (modulus, argument).
    Polar,
    /// A name: either a command lookup miss or a variable reference.
    Symbol,
    /// Algebraic expression: an RPN program with `'` delimiters.
    Expression,
    /// UTF-8 text.
    Text,
    /// `{ ... }` ordered collection.
    List,
    /// `[ ... ]` numeric vector/matrix.
    Array,
    /// `« ... »` program.
    Program,
    /// `:label: object`.
    Tagged,
    /// Graphic object: width, height, packed bits.
    Grob,
    /// Named variables, possibly nested.
    Directory,
    /// Undelimited child sequence used as a control-structure branch.
    Block,
    /// `→ name ... « body »` locals declaration.
    Locals,
    /// Reference to a locals slot by flat index, innermost frame first.
    Local,
    /// `@ ...` source comment (parsed, then discarded from programs).
    Comment,

    // === Control structures ===
    IfThen,
    IfThenElse,
    IfErrThen,
    IfErrThenElse,
    DoUntil,
    WhileRepeat,
    StartNext,
    StartStep,
    ForNext,
    ForStep,

    // === Commands: arithmetic ===
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Rem,
    Neg,
    Inv,
    Pow,
    Sq,
    Sqrt,
    Cbrt,
    Fact,
    Abs,
    Sign,
    Min,
    Max,

    // === Commands: tests ===
    Same,
    TestEq,
    TestNe,
    TestLt,
    TestLe,
    TestGt,
    TestGe,

    // === Commands: logic (flags on reals, bitwise on based numbers) ===
    And,
    Or,
    Xor,
    Not,

    // === Commands: transcendentals ===
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Ln,
    Log,
    Pi,

    // === Commands: stack ===
    Dup,
    Dup2,
    Drop,
    Drop2,
    DropN,
    Swap,
    Over,
    Rot,
    Roll,
    RollD,
    Pick,
    Depth,
    ClearStk,
    LastArg,
    Undo,

    // === Commands: memory ===
    Sto,
    Rcl,
    Purge,
    CrDir,
    PgDir,
    UpDir,
    Home,
    Path,
    Vars,

    // === Commands: evaluation and conversion ===
    Eval,
    ToNum,
    ToText,
    Compile,
    ToFrac,
    TypeOf,

    // === Commands: lists ===
    Size,
    Get,
    Put,
    ToList,
    FromList,

    // === Commands: expressions ===
    Expand,
    Collect,
    Simplify,
    Rewrite,

    // === Commands: base and word size ===
    Bin,
    Oct,
    Dec,
    Hex,
    Stws,
    Rcws,

    // === Commands: angle mode ===
    Deg,
    Rad,
    Grad,
    PiRad,

    // === Commands: display mode ===
    Std,
    Fix,
    Sci,
    Eng,
    Sig,

    // === Commands: system ===
    Wait,
    Ticks,
    Mem,
    Gc,

    // === Commands: errors ===
    ErrN,
    ErrM,
    ClErr,
    DoErr,
}

/// Number of entries in the table.
pub const OP_COUNT: usize = Op::DoErr as usize + 1;

/// Static information about one table entry.
#[derive(Debug)]
pub struct OpInfo {
    pub op: Op,
    /// Canonical spelling, lowercase for alphabetic names.
    pub name: &'static str,
    /// Long-form spelling, or "" when there is none.
    pub long: &'static str,
    /// ASCII aliases accepted on parse.
    pub aliases: &'static [&'static str],
    /// Stack entries a command requires before executing.
    pub arity: u8,
    /// Infix precedence inside expressions; 0 when not an infix operator.
    pub prec: u8,
}

/// Precedence levels for the expression renderer and parser.
pub mod prec {
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const RELATIONAL: u8 = 3;
    pub const ADDITIVE: u8 = 5;
    pub const MULTIPLICATIVE: u8 = 7;
    pub const UNARY: u8 = 8;
    pub const POWER: u8 = 9;
    pub const POSTFIX: u8 = 10;
    pub const ATOM: u8 = 100;
}

macro_rules! op {
    ($op:ident, $name:expr) => {
        op!($op, $name, "", &[], 0, 0)
    };
    ($op:ident, $name:expr, $long:expr, $aliases:expr, $arity:expr) => {
        op!($op, $name, $long, $aliases, $arity, 0)
    };
    ($op:ident, $name:expr, $long:expr, $aliases:expr, $arity:expr, $prec:expr) => {
        OpInfo {
            op: Op::$op,
            name: $name,
            long: $long,
            aliases: $aliases,
            arity: $arity,
            prec: $prec,
        }
    };
}

/// The table itself, indexed by tag value.
pub static OPS: [OpInfo; OP_COUNT] = [
    // Object kinds: names are for diagnostics, never parsed as words.
    op!(BasedInteger, "based integer"),
    op!(BasedBignum, "based bignum"),
    op!(Integer, "integer"),
    op!(NegInteger, "negative integer"),
    op!(Bignum, "bignum"),
    op!(NegBignum, "negative bignum"),
    op!(Fraction, "fraction"),
    op!(NegFraction, "negative fraction"),
    op!(BigFraction, "big fraction"),
    op!(NegBigFraction, "negative big fraction"),
    op!(Decimal, "decimal"),
    op!(Rectangular, "rectangular"),
    op!(Polar, "polar"),
    op!(Symbol, "symbol"),
    op!(Expression, "expression"),
    op!(Text, "text"),
    op!(List, "list"),
    op!(Array, "array"),
    op!(Program, "program"),
    op!(Tagged, "tagged"),
    op!(Grob, "grob"),
    op!(Directory, "directory"),
    op!(Block, "block"),
    op!(Locals, "locals"),
    op!(Local, "local"),
    op!(Comment, "comment"),
    // Control structures: spelled with keywords, handled by the parser.
    op!(IfThen, "if-then"),
    op!(IfThenElse, "if-then-else"),
    op!(IfErrThen, "iferr-then"),
    op!(IfErrThenElse, "iferr-then-else"),
    op!(DoUntil, "do-until"),
    op!(WhileRepeat, "while-repeat"),
    op!(StartNext, "start-next"),
    op!(StartStep, "start-step"),
    op!(ForNext, "for-next"),
    op!(ForStep, "for-step"),
    // Arithmetic
    op!(Add, "+", "", &[], 2, prec::ADDITIVE),
    op!(Sub, "-", "", &[], 2, prec::ADDITIVE),
    op!(Mul, "·", "", &["*", "×"], 2, prec::MULTIPLICATIVE),
    op!(Div, "÷", "", &["/"], 2, prec::MULTIPLICATIVE),
    op!(Mod, "mod", "Modulo", &[], 2, prec::MULTIPLICATIVE),
    op!(Rem, "rem", "Remainder", &[], 2, prec::MULTIPLICATIVE),
    op!(Neg, "neg", "Negate", &[], 1, prec::UNARY),
    op!(Inv, "inv", "Invert", &[], 1),
    op!(Pow, "^", "", &[], 2, prec::POWER),
    op!(Sq, "sq", "Square", &[], 1),
    op!(Sqrt, "√", "SquareRoot", &["sqrt"], 1),
    op!(Cbrt, "∛", "CubeRoot", &["cbrt"], 1),
    op!(Fact, "!", "Factorial", &["fact"], 1, prec::POSTFIX),
    op!(Abs, "abs", "", &[], 1),
    op!(Sign, "sign", "", &[], 1),
    op!(Min, "min", "", &[], 2),
    op!(Max, "max", "", &[], 2),
    // Tests
    op!(Same, "same", "", &[], 2, prec::RELATIONAL),
    op!(TestEq, "==", "", &["="], 2, prec::RELATIONAL),
    op!(TestNe, "≠", "", &["!=", "<>"], 2, prec::RELATIONAL),
    op!(TestLt, "<", "", &[], 2, prec::RELATIONAL),
    op!(TestLe, "≤", "", &["<="], 2, prec::RELATIONAL),
    op!(TestGt, ">", "", &[], 2, prec::RELATIONAL),
    op!(TestGe, "≥", "", &[">="], 2, prec::RELATIONAL),
    // Logic
    op!(And, "and", "", &[], 2, prec::AND),
    op!(Or, "or", "", &[], 2, prec::OR),
    op!(Xor, "xor", "", &[], 2, prec::OR),
    op!(Not, "not", "", &[], 1, prec::UNARY),
    // Transcendentals
    op!(Sin, "sin", "Sine", &[], 1),
    op!(Cos, "cos", "Cosine", &[], 1),
    op!(Tan, "tan", "Tangent", &[], 1),
    op!(Asin, "sin⁻¹", "ArcSine", &["asin", "arcsin"], 1),
    op!(Acos, "cos⁻¹", "ArcCosine", &["acos", "arccos"], 1),
    op!(Atan, "tan⁻¹", "ArcTangent", &["atan", "arctan"], 1),
    op!(Exp, "exp", "Exponential", &[], 1),
    op!(Ln, "ln", "NaturalLog", &[], 1),
    op!(Log, "log", "Log10", &[], 1),
    op!(Pi, "π", "", &["pi"], 0),
    // Stack
    op!(Dup, "dup", "Duplicate", &[], 1),
    op!(Dup2, "dup2", "Duplicate2", &[], 2),
    op!(Drop, "drop", "", &[], 1),
    op!(Drop2, "drop2", "", &[], 2),
    op!(DropN, "dropn", "", &[], 1),
    op!(Swap, "swap", "", &[], 2),
    op!(Over, "over", "", &[], 2),
    op!(Rot, "rot", "Rotate", &[], 3),
    op!(Roll, "roll", "", &[], 1),
    op!(RollD, "rolld", "RollDown", &[], 1),
    op!(Pick, "pick", "", &[], 1),
    op!(Depth, "depth", "", &[], 0),
    op!(ClearStk, "clear", "ClearStack", &[], 0),
    op!(LastArg, "lastarg", "LastArguments", &[], 0),
    op!(Undo, "undo", "", &[], 0),
    // Memory
    op!(Sto, "sto", "Store", &["▶", "►"], 2),
    op!(Rcl, "rcl", "Recall", &[], 1),
    op!(Purge, "purge", "", &[], 1),
    op!(CrDir, "crdir", "CreateDirectory", &[], 1),
    op!(PgDir, "pgdir", "PurgeDirectory", &[], 1),
    op!(UpDir, "updir", "", &[], 0),
    op!(Home, "home", "", &[], 0),
    op!(Path, "path", "", &[], 0),
    op!(Vars, "vars", "Variables", &[], 0),
    // Evaluation and conversion
    op!(Eval, "eval", "Evaluate", &[], 1),
    op!(ToNum, "→Num", "ToNumber", &["->num"], 1),
    op!(ToText, "→Str", "ToText", &["->str"], 1),
    op!(Compile, "Str→", "FromText", &["str->"], 1),
    op!(ToFrac, "→Q", "ToFraction", &["->q"], 1),
    op!(TypeOf, "type", "TypeOf", &[], 1),
    // Lists
    op!(Size, "size", "", &[], 1),
    op!(Get, "get", "", &[], 2),
    op!(Put, "put", "", &[], 3),
    op!(ToList, "→List", "ToList", &["->list"], 1),
    op!(FromList, "List→", "FromList", &["list->"], 1),
    // Expressions
    op!(Expand, "expand", "", &[], 1),
    op!(Collect, "collect", "", &[], 1),
    op!(Simplify, "simplify", "", &[], 1),
    op!(Rewrite, "rewrite", "", &[], 3),
    // Base and word size
    op!(Bin, "bin", "Binary", &[], 0),
    op!(Oct, "oct", "Octal", &[], 0),
    op!(Dec, "dec", "Decimal", &[], 0),
    op!(Hex, "hex", "Hexadecimal", &[], 0),
    op!(Stws, "stws", "StoreWordSize", &[], 1),
    op!(Rcws, "rcws", "RecallWordSize", &[], 0),
    // Angle mode
    op!(Deg, "deg", "Degrees", &[], 0),
    op!(Rad, "rad", "Radians", &[], 0),
    op!(Grad, "grad", "Grads", &[], 0),
    op!(PiRad, "pirad", "PiRadians", &[], 0),
    // Display mode
    op!(Std, "std", "Standard", &[], 0),
    op!(Fix, "fix", "", &[], 1),
    op!(Sci, "sci", "Scientific", &[], 1),
    op!(Eng, "eng", "Engineering", &[], 1),
    op!(Sig, "sig", "Significant", &[], 1),
    // System
    op!(Wait, "wait", "", &[], 1),
    op!(Ticks, "ticks", "", &[], 0),
    op!(Mem, "mem", "", &[], 0),
    op!(Gc, "gc", "GarbageCollect", &[], 0),
    // Errors
    op!(ErrN, "errn", "ErrorNumber", &[], 0),
    op!(ErrM, "errm", "ErrorMessage", &[], 0),
    op!(ClErr, "clerr", "ClearError", &[], 0),
    op!(DoErr, "doerr", "", &[], 1),
];

fn command_index() -> &'static HashMap<String, Op> {
    static INDEX: OnceLock<HashMap<String, Op>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map = HashMap::new();
        for info in OPS.iter().filter(|i| i.op.is_command()) {
            map.insert(info.name.to_lowercase(), info.op);
            if !info.long.is_empty() {
                map.insert(info.long.to_lowercase(), info.op);
            }
            for alias in info.aliases {
                map.insert(alias.to_lowercase(), info.op);
            }
        }
        map
    })
}

impl Op {
    /// Recover an op from a decoded tag value.
    pub fn from_tag(tag: u64) -> Option<Op> {
        OPS.get(tag as usize).map(|info| info.op)
    }

    pub fn tag(self) -> u64 {
        self as u64
    }

    /// Table entry for this op.
    pub fn info(self) -> &'static OpInfo {
        &OPS[self as usize]
    }

    /// Case-folded command lookup over canonical names, long forms and
    /// aliases. Only commands are spelled as bare words.
    pub fn lookup(word: &str) -> Option<Op> {
        command_index().get(&word.to_lowercase()).copied()
    }

    // === Category predicates: inclusive tag ranges ===

    /// Fixed-word-size kinds displayed in the session base.
    pub fn is_based(self) -> bool {
        (Op::BasedInteger..=Op::BasedBignum).contains(&self)
    }

    /// Any integer kind, based or plain, small or big.
    pub fn is_integer(self) -> bool {
        (Op::BasedInteger..=Op::NegBignum).contains(&self)
    }

    pub fn is_fraction(self) -> bool {
        (Op::Fraction..=Op::NegBigFraction).contains(&self)
    }

    /// Ordered real kinds: plain integers, fractions, decimal.
    pub fn is_real(self) -> bool {
        (Op::Integer..=Op::Decimal).contains(&self)
    }

    pub fn is_complex(self) -> bool {
        (Op::Rectangular..=Op::Polar).contains(&self)
    }

    pub fn is_symbolic(self) -> bool {
        (Op::Symbol..=Op::Expression).contains(&self)
    }

    /// Anything usable inside an algebraic expression.
    pub fn is_algebraic(self) -> bool {
        (Op::BasedInteger..=Op::Expression).contains(&self)
    }

    pub fn is_plot(self) -> bool {
        self == Op::Grob
    }

    /// Objects the evaluator pushes unchanged. Symbols sit inside this
    /// range but are claimed by an earlier dispatch arm.
    pub fn is_immediate(self) -> bool {
        (Op::BasedInteger..=Op::Directory).contains(&self)
    }

    pub fn is_control(self) -> bool {
        (Op::IfThen..=Op::ForStep).contains(&self)
    }

    pub fn is_command(self) -> bool {
        self >= Op::Add
    }

    /// Negative-sign counterpart, for kinds that carry a sign in the tag.
    pub fn opposite(self) -> Op {
        match self {
            Op::Integer => Op::NegInteger,
            Op::NegInteger => Op::Integer,
            Op::Bignum => Op::NegBignum,
            Op::NegBignum => Op::Bignum,
            Op::Fraction => Op::NegFraction,
            Op::NegFraction => Op::Fraction,
            Op::BigFraction => Op::NegBigFraction,
            Op::NegBigFraction => Op::BigFraction,
            other => other,
        }
    }

    /// True for negative numeric kinds.
    pub fn is_neg(self) -> bool {
        matches!(
            self,
            Op::NegInteger | Op::NegBignum | Op::NegFraction | Op::NegBigFraction
        )
    }

    /// Infix precedence inside expressions (0 = not infix).
    pub fn precedence(self) -> u8 {
        self.info().prec
    }

    /// Binary operators rendered infix inside expressions.
    pub fn is_binary_infix(self) -> bool {
        self.info().prec > 0 && self.info().arity == 2
    }

    /// Right-associative infix operators.
    pub fn is_right_assoc(self) -> bool {
        self == Op::Pow
    }

    /// Unary commands rendered as `name(arg)` inside expressions.
    pub fn is_algebraic_function(self) -> bool {
        matches!(
            self,
            Op::Not
                | Op::Inv
                | Op::Sq
                | Op::Sqrt
                | Op::Cbrt
                | Op::Abs
                | Op::Sign
                | Op::Sin
                | Op::Cos
                | Op::Tan
                | Op::Asin
                | Op::Acos
                | Op::Atan
                | Op::Exp
                | Op::Ln
                | Op::Log
        )
    }
}
