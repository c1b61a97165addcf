//! A source-level expression builder.
//!
//! Rewrite rules are written as ordinary Rust expressions over [`E`]
//! values, which lower to exactly the postfix bytes the parser would
//! produce for the same algebraic text. The engine's rule batteries are
//! built this way; tests verify the equivalence against parsed
//! expressions byte for byte.

use std::ops;

use ripple_core::{leb128, Op, Result};
use ripple_mem::{Heap, ObjRef};

use crate::symbolic::{decode_payload, Node};

/// An expression under construction: postfix payload bytes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct E(Vec<u8>);

impl E {
    /// A symbol. In a rewrite pattern every symbol is a wildcard binding
    /// a sub-expression.
    pub fn sym(name: &str) -> E {
        let mut bytes = Vec::new();
        leb128::write(Op::Symbol.tag(), &mut bytes);
        leb128::write(name.len() as u64, &mut bytes);
        bytes.extend_from_slice(name.as_bytes());
        E(bytes)
    }

    /// A small integer constant.
    pub fn int(value: i64) -> E {
        let mut bytes = Vec::new();
        if value < 0 {
            leb128::write(Op::NegInteger.tag(), &mut bytes);
            leb128::write(value.unsigned_abs(), &mut bytes);
        } else {
            leb128::write(Op::Integer.tag(), &mut bytes);
            leb128::write(value as u64, &mut bytes);
        }
        E(bytes)
    }

    /// A decimal constant.
    pub fn dec(value: f64) -> E {
        let mut bytes = Vec::new();
        leb128::write(Op::Decimal.tag(), &mut bytes);
        bytes.extend_from_slice(&value.to_le_bytes());
        E(bytes)
    }

    fn apply1(mut self, op: Op) -> E {
        leb128::write(op.tag(), &mut self.0);
        self
    }

    fn apply2(mut self, other: E, op: Op) -> E {
        self.0.extend(other.0);
        leb128::write(op.tag(), &mut self.0);
        self
    }

    pub fn pow(self, exp: E) -> E {
        self.apply2(exp, Op::Pow)
    }

    pub fn neg(self) -> E {
        self.apply1(Op::Neg)
    }

    pub fn sq(self) -> E {
        self.apply1(Op::Sq)
    }

    pub fn sqrt(self) -> E {
        self.apply1(Op::Sqrt)
    }

    pub fn inv(self) -> E {
        self.apply1(Op::Inv)
    }

    pub fn abs(self) -> E {
        self.apply1(Op::Abs)
    }

    pub fn sin(self) -> E {
        self.apply1(Op::Sin)
    }

    pub fn cos(self) -> E {
        self.apply1(Op::Cos)
    }

    pub fn tan(self) -> E {
        self.apply1(Op::Tan)
    }

    pub fn exp(self) -> E {
        self.apply1(Op::Exp)
    }

    pub fn ln(self) -> E {
        self.apply1(Op::Ln)
    }

    pub fn fact(self) -> E {
        self.apply1(Op::Fact)
    }

    pub fn eq(self, other: E) -> E {
        self.apply2(other, Op::TestEq)
    }

    /// The raw postfix payload, as embedded in an expression object.
    pub fn payload(&self) -> &[u8] {
        &self.0
    }

    /// Lower into a heap expression object.
    pub fn to_expr(&self, heap: &mut Heap) -> Result<ObjRef> {
        heap.make_composite_raw(Op::Expression, &self.0)
    }

    /// The engine's working-tree view of this expression.
    pub(crate) fn node(&self) -> Node {
        decode_payload(&self.0).expect("builder output is well formed")
    }
}

impl ops::Add for E {
    type Output = E;
    fn add(self, rhs: E) -> E {
        self.apply2(rhs, Op::Add)
    }
}

impl ops::Sub for E {
    type Output = E;
    fn sub(self, rhs: E) -> E {
        self.apply2(rhs, Op::Sub)
    }
}

impl ops::Mul for E {
    type Output = E;
    fn mul(self, rhs: E) -> E {
        self.apply2(rhs, Op::Mul)
    }
}

impl ops::Div for E {
    type Output = E;
    fn div(self, rhs: E) -> E {
        self.apply2(rhs, Op::Div)
    }
}
