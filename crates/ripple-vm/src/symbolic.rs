//! The expression engine: building, rewriting and simplifying algebraic
//! expressions.
//!
//! Expressions live in the heap as postfix byte sequences. The engine
//! decodes them into a working tree, transforms the tree, and encodes
//! the result back. Rewrite rules are (pattern, replacement) trees whose
//! symbols bind arbitrary sub-expressions.

use ripple_core::{leb128, Error, Op, Result};
use ripple_mem::{object, ObjRef};

use crate::arith;
use crate::machine::Runtime;

/// Working form of an expression.
#[derive(Clone, PartialEq, Debug)]
pub(crate) enum Node {
    /// Any non-command object, as its encoded bytes.
    Atom(Vec<u8>),
    /// A command applied to its arguments.
    App(Op, Vec<Node>),
}

impl Node {
    fn int(value: i64) -> Node {
        let mut bytes = Vec::new();
        if value < 0 {
            leb128::write(Op::NegInteger.tag(), &mut bytes);
            leb128::write(value.unsigned_abs(), &mut bytes);
        } else {
            leb128::write(Op::Integer.tag(), &mut bytes);
            leb128::write(value as u64, &mut bytes);
        }
        Node::Atom(bytes)
    }

    /// The symbol name, when this atom is a symbol.
    fn symbol_name(&self) -> Option<&str> {
        let Node::Atom(bytes) = self else {
            return None;
        };
        let (op, mut off) = object::tag_at(bytes, 0).ok()?;
        if op != Op::Symbol {
            return None;
        }
        let len = leb128::read(bytes, &mut off)? as usize;
        std::str::from_utf8(&bytes[off..off + len]).ok()
    }

    /// The value, when this atom is a small plain integer.
    fn int_value(&self) -> Option<i64> {
        let Node::Atom(bytes) = self else {
            return None;
        };
        let (op, mut off) = object::tag_at(bytes, 0).ok()?;
        let value = leb128::read(bytes, &mut off)?;
        match op {
            Op::Integer => i64::try_from(value).ok(),
            Op::NegInteger => i64::try_from(value).ok().map(|v| -v),
            _ => None,
        }
    }

    /// Is this a numeric atom the folder may evaluate exactly?
    fn is_numeric(&self) -> bool {
        match self {
            Node::Atom(bytes) => object::tag_at(bytes, 0)
                .map(|(op, _)| op.is_real())
                .unwrap_or(false),
            Node::App(..) => false,
        }
    }
}

// ============================================================================
// Decode and encode
// ============================================================================

/// Decode a postfix payload into a tree.
pub(crate) fn decode_payload(bytes: &[u8]) -> Result<Node> {
    let mut stack: Vec<Node> = Vec::new();
    let mut off = 0;
    while off < bytes.len() {
        let (op, payload) = object::tag_at(bytes, off)?;
        let size = object::size_at(bytes, off)?;
        if op.is_command() {
            let arity = op.info().arity as usize;
            if stack.len() < arity {
                return Err(Error::InvalidObject);
            }
            let children = stack.split_off(stack.len() - arity);
            stack.push(Node::App(op, children));
        } else if op == Op::Expression {
            // Nested expressions flatten into the tree.
            let mut inner = payload;
            let len = leb128::read(bytes, &mut inner).ok_or(Error::InvalidObject)? as usize;
            stack.push(decode_payload(&bytes[inner..inner + len])?);
        } else {
            stack.push(Node::Atom(bytes[off..off + size].to_vec()));
        }
        off += size;
    }
    if stack.len() != 1 {
        return Err(Error::InvalidObject);
    }
    Ok(stack.pop().expect("checked"))
}

/// Decode an expression object.
pub(crate) fn decode(rt: &Runtime, expr: ObjRef) -> Result<Node> {
    decode_payload(rt.heap.composite_payload(expr)?)
}

fn encode_into(node: &Node, out: &mut Vec<u8>) {
    match node {
        Node::Atom(bytes) => out.extend_from_slice(bytes),
        Node::App(op, children) => {
            for child in children {
                encode_into(child, out);
            }
            leb128::write(op.tag(), out);
        }
    }
}

/// Encode a tree back into a heap expression. A bare numeric atom
/// collapses to the number itself.
pub(crate) fn to_object(rt: &mut Runtime, node: &Node) -> Result<ObjRef> {
    if node.is_numeric() {
        if let Node::Atom(bytes) = node {
            return rt.heap.make_from_bytes(bytes);
        }
    }
    let mut payload = Vec::new();
    encode_into(node, &mut payload);
    rt.heap.make_composite_raw(Op::Expression, &payload)
}

// ============================================================================
// Building expressions from stack operands
// ============================================================================

/// The postfix bytes an operand contributes: expressions splice their
/// children, other algebraics embed whole.
fn operand_payload(rt: &Runtime, obj: ObjRef) -> Result<Vec<u8>> {
    let op = rt.heap.op_of(obj)?;
    if op == Op::Expression {
        Ok(rt.heap.composite_payload(obj)?.to_vec())
    } else if op.is_algebraic() {
        Ok(rt.heap.obj_bytes(obj)?.to_vec())
    } else {
        Err(Error::Type)
    }
}

pub(crate) fn build_binary(rt: &mut Runtime, op: Op, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let mut payload = operand_payload(rt, x)?;
    payload.extend(operand_payload(rt, y)?);
    leb128::write(op.tag(), &mut payload);
    let expr = rt.heap.make_composite_raw(Op::Expression, &payload)?;
    if rt.settings.auto_simplify {
        simplify(rt, expr)
    } else {
        Ok(expr)
    }
}

pub(crate) fn build_unary(rt: &mut Runtime, op: Op, x: ObjRef) -> Result<ObjRef> {
    let mut payload = operand_payload(rt, x)?;
    leb128::write(op.tag(), &mut payload);
    let expr = rt.heap.make_composite_raw(Op::Expression, &payload)?;
    if rt.settings.auto_simplify {
        simplify(rt, expr)
    } else {
        Ok(expr)
    }
}

// ============================================================================
// Pattern matching and rewriting
// ============================================================================

type Bindings = Vec<(String, Node)>;

/// Match `node` against `pattern`. Pattern symbols bind sub-expressions;
/// everything else must match structurally.
fn match_node(node: &Node, pattern: &Node, binds: &mut Bindings) -> bool {
    if let Some(name) = pattern.symbol_name() {
        if let Some((_, bound)) = binds.iter().find(|(n, _)| n == name) {
            return bound == node;
        }
        binds.push((name.to_string(), node.clone()));
        return true;
    }
    match (node, pattern) {
        (Node::Atom(a), Node::Atom(b)) => a == b,
        (Node::App(aop, akids), Node::App(bop, bkids)) => {
            aop == bop
                && akids.len() == bkids.len()
                && akids
                    .iter()
                    .zip(bkids)
                    .all(|(a, b)| match_node(a, b, binds))
        }
        _ => false,
    }
}

/// Substitute bound sub-expressions into a replacement template.
fn substitute(template: &Node, binds: &Bindings) -> Node {
    if let Some(name) = template.symbol_name() {
        if let Some((_, bound)) = binds.iter().find(|(n, _)| n == name) {
            return bound.clone();
        }
    }
    match template {
        Node::Atom(_) => template.clone(),
        Node::App(op, children) => Node::App(
            *op,
            children.iter().map(|c| substitute(c, binds)).collect(),
        ),
    }
}

/// Apply one rule at the leftmost-innermost matching position.
fn rewrite_once(node: &Node, from: &Node, to: &Node) -> Option<Node> {
    if let Node::App(op, children) = node {
        for (i, child) in children.iter().enumerate() {
            if let Some(rewritten) = rewrite_once(child, from, to) {
                let mut children = children.clone();
                children[i] = rewritten;
                return Some(Node::App(*op, children));
            }
        }
    }
    let mut binds = Bindings::new();
    if match_node(node, from, &mut binds) {
        return Some(substitute(to, &binds));
    }
    None
}

/// Apply every rule to a fixpoint, bounded by the session rewrite cap.
/// The cap counts rule applications and resets per call.
fn rewrite_all_rules(
    node: Node,
    rules: &[(Node, Node)],
    max_rewrites: u32,
    count: &mut u32,
) -> Result<Node> {
    let mut current = node;
    'outer: loop {
        for (from, to) in rules {
            if let Some(next) = rewrite_once(&current, from, to) {
                *count += 1;
                if *count > max_rewrites {
                    return Err(Error::TooManyRewrites);
                }
                current = next;
                continue 'outer;
            }
        }
        return Ok(current);
    }
}

// ============================================================================
// Constant folding
// ============================================================================

/// Fold applications whose arguments are all exact numbers, using the
/// ordinary arithmetic dispatch. Operations that fail (division by
/// zero, oversized results) are left symbolic.
fn fold(rt: &mut Runtime, node: &Node) -> Result<Node> {
    let Node::App(op, children) = node else {
        return Ok(node.clone());
    };
    let children: Vec<Node> = children
        .iter()
        .map(|c| fold(rt, c))
        .collect::<Result<_>>()?;
    let foldable = matches!(
        op,
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow | Op::Neg | Op::Fact
    ) && children.iter().all(Node::is_numeric);
    if !foldable {
        return Ok(Node::App(*op, children));
    }

    let result = (|| -> Result<Node> {
        match children.as_slice() {
            [x] => {
                let Node::Atom(xb) = x else { unreachable!() };
                let xobj = rt.heap.make_from_bytes(xb)?;
                let out = arith::unary_on(rt, *op, xobj)?;
                Ok(Node::Atom(rt.heap.obj_bytes(out)?.to_vec()))
            }
            [x, y] => {
                let (Node::Atom(xb), Node::Atom(yb)) = (x, y) else {
                    unreachable!()
                };
                let xobj = rt.heap.make_from_bytes(xb)?;
                let pin = rt.heap.pin(xobj);
                let yobj = rt.heap.make_from_bytes(yb);
                let xobj = rt.heap.pinned(&pin).expect("strong pin");
                rt.heap.unpin(pin);
                let out = arith::binary_on(rt, *op, xobj, yobj?)?;
                Ok(Node::Atom(rt.heap.obj_bytes(out)?.to_vec()))
            }
            _ => Err(Error::InvalidObject),
        }
    })();
    match result {
        Ok(folded) => Ok(folded),
        Err(_) => Ok(Node::App(*op, children)),
    }
}

// ============================================================================
// Rule batteries
// ============================================================================

fn identity_rules() -> Vec<(Node, Node)> {
    use crate::eq::E;
    let a = || E::sym("a");
    vec![
        (a() + E::int(0), a()),
        (E::int(0) + a(), a()),
        (a() - E::int(0), a()),
        (a() - a(), E::int(0)),
        (a() * E::int(1), a()),
        (E::int(1) * a(), a()),
        (a() * E::int(0), E::int(0)),
        (E::int(0) * a(), E::int(0)),
        (a() / E::int(1), a()),
        (a().pow(E::int(1)), a()),
        (a().pow(E::int(0)), E::int(1)),
        (a().neg().neg(), a()),
        (E::int(0) - a(), a().neg()),
        (a() + a(), E::int(2) * a()),
    ]
    .into_iter()
    .map(|(f, t)| (f.node(), t.node()))
    .collect()
}

fn distribution_rules() -> Vec<(Node, Node)> {
    use crate::eq::E;
    let a = || E::sym("a");
    let b = || E::sym("b");
    let c = || E::sym("c");
    vec![
        ((a() + b()) * c(), a() * c() + b() * c()),
        (c() * (a() + b()), c() * a() + c() * b()),
        ((a() - b()) * c(), a() * c() - b() * c()),
        (c() * (a() - b()), c() * a() - c() * b()),
    ]
    .into_iter()
    .map(|(f, t)| (f.node(), t.node()))
    .collect()
}

// ============================================================================
// Collection: polynomial canonical form
// ============================================================================

/// One product term: an integer coefficient and base^exponent factors
/// keyed by the base's encoding.
struct Term {
    coeff: i64,
    factors: Vec<(Vec<u8>, Node, i64)>,
}

impl Term {
    fn one() -> Self {
        Term {
            coeff: 1,
            factors: Vec::new(),
        }
    }

    fn key(&self) -> Vec<Vec<u8>> {
        self.factors.iter().map(|(k, _, e)| {
            let mut key = k.clone();
            key.extend_from_slice(&e.to_le_bytes());
            key
        }).collect()
    }

    fn degree(&self) -> i64 {
        self.factors.iter().map(|(_, _, e)| *e).sum()
    }

    fn push_factor(&mut self, base: &Node, exp: i64) {
        let mut key = Vec::new();
        encode_into(base, &mut key);
        if let Some(entry) = self.factors.iter_mut().find(|(k, _, _)| *k == key) {
            entry.2 += exp;
        } else {
            self.factors.push((key, base.clone(), exp));
        }
    }

    /// Fold one multiplicand into the term. Anything that cannot merge
    /// exactly into the integer coefficient becomes an opaque factor.
    fn absorb(&mut self, node: &Node) {
        match node {
            Node::App(Op::Mul, kids) => {
                self.absorb(&kids[0]);
                self.absorb(&kids[1]);
            }
            Node::App(Op::Neg, kids) => {
                self.coeff = -self.coeff;
                self.absorb(&kids[0]);
            }
            Node::App(Op::Pow, kids) => match kids[1].int_value() {
                Some(exp) => self.push_factor(&kids[0], exp),
                None => self.push_factor(node, 1),
            },
            _ => match node.int_value() {
                Some(value) => match self.coeff.checked_mul(value) {
                    Some(coeff) => self.coeff = coeff,
                    None => self.push_factor(node, 1),
                },
                None => self.push_factor(node, 1),
            },
        }
    }

    fn rebuild(&self) -> Node {
        let mut factors = self.factors.clone();
        factors.retain(|(_, _, e)| *e != 0);
        let mut product: Option<Node> = None;
        for (_, base, exp) in &factors {
            let factor = if *exp == 1 {
                base.clone()
            } else {
                Node::App(Op::Pow, vec![base.clone(), Node::int(*exp)])
            };
            product = Some(match product {
                None => factor,
                Some(p) => Node::App(Op::Mul, vec![p, factor]),
            });
        }
        let magnitude = self.coeff.abs();
        let node = match (product, magnitude) {
            (None, m) => Node::int(m),
            (Some(p), 1) => p,
            (Some(p), m) => Node::App(Op::Mul, vec![Node::int(m), p]),
        };
        if self.coeff < 0 {
            Node::App(Op::Neg, vec![node])
        } else {
            node
        }
    }
}

fn flatten_sum(node: &Node, sign: i64, out: &mut Vec<(i64, Node)>) {
    match node {
        Node::App(Op::Add, kids) => {
            flatten_sum(&kids[0], sign, out);
            flatten_sum(&kids[1], sign, out);
        }
        Node::App(Op::Sub, kids) => {
            flatten_sum(&kids[0], sign, out);
            flatten_sum(&kids[1], -sign, out);
        }
        Node::App(Op::Neg, kids) => flatten_sum(&kids[0], -sign, out),
        _ => out.push((sign, node.clone())),
    }
}

/// Combine like terms across a sum, ordering by descending degree.
fn collect_node(node: &Node) -> Node {
    let mut addends = Vec::new();
    flatten_sum(node, 1, &mut addends);

    let mut terms: Vec<Term> = Vec::new();
    for (sign, addend) in &addends {
        let mut term = Term::one();
        term.coeff = *sign;
        term.absorb(addend);
        match terms.iter_mut().find(|t| t.key() == term.key()) {
            Some(existing) => match existing.coeff.checked_add(term.coeff) {
                Some(c) => existing.coeff = c,
                None => terms.push(term),
            },
            None => terms.push(term),
        }
    }
    terms.retain(|t| t.coeff != 0 || t.factors.is_empty());

    // Descending degree gives the conventional polynomial layout.
    terms.sort_by(|a, b| b.degree().cmp(&a.degree()).then(a.key().cmp(&b.key())));

    // Drop a lone zero constant when other terms remain.
    if terms.len() > 1 {
        terms.retain(|t| t.coeff != 0);
    }
    if terms.is_empty() {
        return Node::int(0);
    }

    let mut out: Option<Node> = None;
    for term in &terms {
        let negative = term.coeff < 0;
        let rebuilt = if negative {
            Term {
                coeff: -term.coeff,
                factors: term.factors.clone(),
            }
            .rebuild()
        } else {
            term.rebuild()
        };
        out = Some(match out {
            None => {
                if negative {
                    Node::App(Op::Neg, vec![rebuilt])
                } else {
                    rebuilt
                }
            }
            Some(acc) => {
                let op = if negative { Op::Sub } else { Op::Add };
                Node::App(op, vec![acc, rebuilt])
            }
        });
    }
    out.expect("at least one term")
}

// ============================================================================
// Public operations
// ============================================================================

/// Unroll small integer powers so distribution can reach them.
fn unroll_powers(node: &Node) -> Node {
    match node {
        Node::App(Op::Pow, kids) => {
            let base = unroll_powers(&kids[0]);
            match kids[1].int_value() {
                Some(n) if (2..=16).contains(&n) && !base.is_numeric() => {
                    let mut out = base.clone();
                    for _ in 1..n {
                        out = Node::App(Op::Mul, vec![out, base.clone()]);
                    }
                    out
                }
                _ => Node::App(Op::Pow, vec![base, unroll_powers(&kids[1])]),
            }
        }
        Node::App(op, kids) => {
            Node::App(*op, kids.iter().map(unroll_powers).collect())
        }
        Node::Atom(_) => node.clone(),
    }
}

/// Distribute products over sums, fold constants, and (with
/// auto-simplify) combine like terms.
pub fn expand(rt: &mut Runtime, expr: ObjRef) -> Result<ObjRef> {
    let node = decode(rt, expr)?;
    let node = unroll_powers(&node);
    let mut count = 0;
    let node = rewrite_all_rules(
        node,
        &distribution_rules(),
        rt.settings.maxrewrites,
        &mut count,
    )?;
    let node = fold(rt, &node)?;
    let node = if rt.settings.auto_simplify {
        collect_node(&node)
    } else {
        node
    };
    to_object(rt, &node)
}

/// Combine like terms.
pub fn collect(rt: &mut Runtime, expr: ObjRef) -> Result<ObjRef> {
    let node = decode(rt, expr)?;
    let node = fold(rt, &node)?;
    let node = collect_node(&node);
    to_object(rt, &node)
}

/// Identity rules plus constant folding, to a fixpoint.
pub fn simplify(rt: &mut Runtime, expr: ObjRef) -> Result<ObjRef> {
    let node = decode(rt, expr)?;
    let node = simplify_node(rt, node)?;
    to_object(rt, &node)
}

fn simplify_node(rt: &mut Runtime, node: Node) -> Result<Node> {
    let rules = identity_rules();
    let max = rt.settings.maxrewrites;
    let mut count = 0;
    let mut current = node;
    loop {
        let rewritten = rewrite_all_rules(current.clone(), &rules, max, &mut count)?;
        let folded = fold(rt, &rewritten)?;
        if folded == current {
            return Ok(folded);
        }
        current = folded;
    }
}

/// Apply one (pattern, replacement) rule to an expression.
pub fn rewrite(
    rt: &mut Runtime,
    expr: ObjRef,
    pattern: ObjRef,
    replacement: ObjRef,
) -> Result<ObjRef> {
    let node = decode(rt, expr)?;
    let from = decode(rt, pattern)?;
    let to = decode(rt, replacement)?;
    match rewrite_once(&node, &from, &to) {
        Some(rewritten) => to_object(rt, &rewritten),
        None => to_object(rt, &node),
    }
}

/// Apply a rule set to a fixpoint, bounded by `maxrewrites`.
pub fn rewrite_all(
    rt: &mut Runtime,
    expr: ObjRef,
    rules: &[(ObjRef, ObjRef)],
) -> Result<ObjRef> {
    let node = decode(rt, expr)?;
    let rules: Vec<(Node, Node)> = rules
        .iter()
        .map(|&(f, t)| Ok((decode(rt, f)?, decode(rt, t)?)))
        .collect::<Result<_>>()?;
    let mut count = 0;
    let node = rewrite_all_rules(node, &rules, rt.settings.maxrewrites, &mut count)?;
    to_object(rt, &node)
}

/// Extract a multiplicative factor: `expr = scale · factor^exponent`.
/// Returns the scale and the exponent.
pub fn factor_out(rt: &mut Runtime, expr: ObjRef, factor: ObjRef) -> Result<(ObjRef, ObjRef)> {
    let node = decode(rt, expr)?;
    let factor = match rt.heap.op_of(factor)? {
        Op::Expression => decode(rt, factor)?,
        _ => Node::Atom(rt.heap.obj_bytes(factor)?.to_vec()),
    };
    let mut factor_key = Vec::new();
    encode_into(&factor, &mut factor_key);

    let mut term = Term::one();
    term.absorb(&node);
    let mut exponent = 0;
    let mut rest = Term::one();
    rest.coeff = term.coeff;
    for (key, base, exp) in &term.factors {
        if *key == factor_key {
            exponent += exp;
        } else {
            rest.factors.push((key.clone(), base.clone(), *exp));
        }
    }
    let scale = to_object(rt, &rest.rebuild())?;
    let pin = rt.heap.pin(scale);
    let exp_obj = rt.heap.make_int(exponent);
    let scale = rt.heap.pinned(&pin).expect("strong pin");
    rt.heap.unpin(pin);
    Ok((scale, exp_obj?))
}

/// Turn `A = B` into `A - B` for the numeric solvers.
pub fn as_difference_for_solve(rt: &mut Runtime, expr: ObjRef) -> Result<ObjRef> {
    let node = decode(rt, expr)?;
    let node = match node {
        Node::App(Op::TestEq, kids) => Node::App(Op::Sub, kids),
        other => other,
    };
    to_object(rt, &node)
}
