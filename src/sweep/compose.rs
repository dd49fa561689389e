//! Generalized chain rule for one record.
//!
//! Substituting `r = φ(x, y)` into a truncated Taylor expansion in `r`: an
//! entry `T[r^m, rest]` (`rest` holding `xc` copies of `x` and `yc` of `y`)
//! contributes, for every `m ≤ a + b ≤ K - |rest|`,
//!
//! `T[rest ∪ x^a ∪ y^b] += T[r^m, rest] · C_m[a][b] · (xc+a)!/xc! · (yc+b)!/yc! / m!`
//!
//! where `C_m` is the m-th power of `Σ ∂ˣᵃ∂ʸᵇφ / (a! b!) · X^a Y^b` truncated at
//! degree `K`. Every term depends on the entry only through its [`CaseCode`],
//! so the term lists are built once per record and reused.

use std::collections::HashMap;

use crate::decode::DerivativeInfo;
use crate::float::Float;
use crate::scratch::ScratchArena;
use crate::tensor::{factorial, TensorBundle, TensorIndex};
use crate::trace::OpRecord;
use crate::MAX_ORDER;

const N: usize = MAX_ORDER + 1;

type Poly<F> = [[F; N]; N];

/// Shape of a slice entry relative to the record being processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CaseCode {
    /// Degree left for new `x`/`y` copies: `K - |rest|`.
    pub free: u8,
    /// Copies of `r` still in the slice index.
    pub r_count: u8,
    pub x_count: u8,
    pub y_count: u8,
}

#[derive(Clone, Copy, Debug)]
struct Term<F> {
    a: u8,
    b: u8,
    coef: F,
}

pub(crate) struct Composer<F> {
    order: usize,
    unary: bool,
    dx: F,
    dy: F,
    /// `powers[m - 1]` is `C_m`.
    powers: Vec<Poly<F>>,
    cache: HashMap<CaseCode, Vec<Term<F>>>,
}

fn zero_poly<F: Float>() -> Poly<F> {
    [[F::zero(); N]; N]
}

/// `(n+1)(n+2)…(n+k)`.
fn rising(n: usize, k: usize) -> f64 {
    (n + 1..=n + k).map(|i| i as f64).product()
}

impl<F: Float> Composer<F> {
    pub(crate) fn new(order: usize) -> Self {
        Composer {
            order,
            unary: true,
            dx: F::zero(),
            dy: F::zero(),
            powers: Vec::with_capacity(order),
            cache: HashMap::new(),
        }
    }

    /// Load the partials of the next record.
    pub(crate) fn prepare(&mut self, info: &DerivativeInfo<F>) {
        self.unary = info.is_unary();
        self.dx = info.get(1, 0);
        self.dy = info.get(0, 1);
        self.cache.clear();
        self.powers.clear();
        if self.order == 1 {
            return;
        }
        let mut p = zero_poly::<F>();
        for (a, row) in p.iter_mut().enumerate().take(self.order + 1) {
            for (b, slot) in row.iter_mut().enumerate().take(self.order + 1 - a) {
                let d = info.get(a, b);
                if d != F::zero() {
                    *slot = d / F::from_f64_lossy((factorial(a) * factorial(b)) as f64);
                }
            }
        }
        self.powers.push(p);
    }

    fn ensure_power(&mut self, m: usize) {
        let k = self.order;
        while self.powers.len() < m {
            let prev = self.powers[self.powers.len() - 1];
            let p = self.powers[0];
            let mut out = zero_poly::<F>();
            for a1 in 0..=k {
                for b1 in 0..=k - a1 {
                    let c1 = prev[a1][b1];
                    if c1 == F::zero() {
                        continue;
                    }
                    let room = k - a1 - b1;
                    for a2 in 0..=room {
                        for b2 in 0..=room - a2 {
                            let c2 = p[a2][b2];
                            if c2 != F::zero() {
                                out[a1 + a2][b1 + b2] = out[a1 + a2][b1 + b2] + c1 * c2;
                            }
                        }
                    }
                }
            }
            self.powers.push(out);
        }
    }

    fn build_terms(&mut self, code: CaseCode) -> Vec<Term<F>> {
        let m = code.r_count as usize + 1;
        let free = code.free as usize;
        if m > free {
            return Vec::new();
        }
        self.ensure_power(m);
        let c = &self.powers[m - 1];
        let inv_mfact = 1.0 / factorial(m) as f64;
        let (xc, yc) = (code.x_count as usize, code.y_count as usize);
        let mut terms = Vec::new();
        for total in m..=free {
            for a in 0..=total {
                let b = total - a;
                if self.unary && b > 0 {
                    continue;
                }
                let cm = c[a][b];
                if cm == F::zero() {
                    continue;
                }
                let scale = rising(xc, a) * rising(yc, b) * inv_mfact;
                terms.push(Term {
                    a: a as u8,
                    b: b as u8,
                    coef: cm * F::from_f64_lossy(scale),
                });
            }
        }
        terms
    }

    fn terms(&mut self, code: CaseCode) -> &[Term<F>] {
        if !self.cache.contains_key(&code) {
            let terms = self.build_terms(code);
            self.cache.insert(code, terms);
        }
        self.cache.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Push the slices of one dependent at `rec.r` onto `rec.x` / `rec.y`.
    pub(crate) fn compose(
        &mut self,
        rec: &OpRecord<F>,
        slices: &TensorBundle<F>,
        target: &mut TensorBundle<F>,
        arena: &mut ScratchArena<F>,
    ) {
        if self.order == 1 {
            let w = slices.rank(0).get(&[]);
            target.rank_mut(1).increase(TensorIndex::new(&[rec.x]), w * self.dx);
            if !self.unary {
                target.rank_mut(1).increase(TensorIndex::new(&[rec.y]), w * self.dy);
            }
            return;
        }

        let k = self.order;
        let mut lease = arena.lease();
        for s in 0..=slices.order() {
            for (index, &v) in slices.rank(s).iter_unordered() {
                let r_count = index.count(rec.r);
                let rest = if r_count > 0 {
                    index.remove_all(rec.r)
                } else {
                    *index
                };
                let code = CaseCode {
                    free: (k - rest.rank()) as u8,
                    r_count: r_count as u8,
                    x_count: rest.count(rec.x) as u8,
                    y_count: if self.unary { 0 } else { rest.count(rec.y) as u8 },
                };
                for t in self.terms(code) {
                    let mut out = rest.with_repeated(rec.x, t.a as usize);
                    if t.b > 0 {
                        out = out.with_repeated(rec.y, t.b as usize);
                    }
                    lease.push(out, v * t.coef);
                }
            }
        }
        for (index, v) in lease.iter() {
            target.rank_mut(index.rank()).increase(index, v);
        }
    }
}
