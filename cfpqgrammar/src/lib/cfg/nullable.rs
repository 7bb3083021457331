use vob::Vob;

use super::{Cfg, Symbol};

/// Compute the nullable set for the given grammar. For example, given this grammar:
/// ```text
///   S -> A b | B
///   A -> a | $
///   B -> A A
/// ```
/// then `A` is nullable, so `B` is too, and `S` is nullable through `S -> B`. Dropping the
/// `S -> B` production would leave only `A` and `B` nullable.
pub(crate) fn nullable(grm: &Cfg) -> Vob {
    let mut nullable = Vob::from_elem(false, grm.rules_len());
    // Loop looking for changes to the nullable set, until we reach a fixed point. A rule becomes
    // nullable as soon as one of its productions consists solely of nullable rules (which
    // includes empty productions).
    loop {
        let mut changed = false;
        for ridx in grm.iter_rules() {
            if nullable[usize::from(ridx)] {
                continue;
            }
            let is_nullable = grm.rule_to_prods(ridx).iter().any(|&pidx| {
                grm.prod(pidx).iter().all(|sym| match *sym {
                    Symbol::Rule(s_ridx) => nullable[usize::from(s_ridx)],
                    Symbol::Token(_) => false,
                })
            });
            if is_nullable {
                nullable.set(usize::from(ridx), true);
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}
