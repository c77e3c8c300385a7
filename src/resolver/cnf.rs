//! CNF encoding of an activated dependency graph
//!
//! Variable `i` (1-based) means "node at position `i - 1` is selected".

use crate::resolver::activator::Activated;

/// Signed variable reference: `i` selects node `i`, `-i` rejects it
pub type Literal = i32;

/// Disjunction of literals
pub type Clause = Vec<Literal>;

/// Above this many versions of one name, exactly-one is encoded pairwise
/// instead of by enumerating all 2^k patterns.
const MAX_ENUMERATED: usize = 12;

/// Conjunction of clauses over `variables` variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    pub clauses: Vec<Clause>,
    pub variables: usize,
}

/// Variable for a node position
pub fn variable(position: usize) -> Literal {
    Literal::try_from(position + 1).expect("too many activated nodes for a CNF variable")
}

/// Encode the activated sequence
pub fn encode(activated: &Activated) -> Cnf {
    let variables = activated.nodes.len();
    let mut clauses = Vec::new();

    for (name, positions) in activated.groups() {
        if let [only] = positions.as_slice() {
            clauses.push(vec![variable(*only)]);
        }

        for &position in &positions {
            implications(activated, position, &mut clauses);
        }

        if positions.len() > 1 {
            tracing::trace!("{} has {} candidate versions", name, positions.len());
            if positions.len() <= MAX_ENUMERATED {
                exactly_one_enumerated(&positions, &mut clauses);
            } else {
                exactly_one_pairwise(&positions, &mut clauses);
            }
        }
    }

    // the project itself is always selected
    for root in &activated.roots {
        clauses.push(root.candidates.iter().map(|&c| variable(c)).collect());
    }

    Cnf { clauses, variables }
}

/// Selecting a node selects at least one candidate of each primary dependency
fn implications(activated: &Activated, position: usize, clauses: &mut Vec<Clause>) {
    let node = &activated.nodes[position];
    for dep in node.deps.iter().filter(|d| d.requirement.source.is_primary()) {
        let mut clause = Vec::with_capacity(dep.candidates.len() + 1);
        clause.push(-variable(position));
        for &candidate in &dep.candidates {
            assert!(
                candidate < activated.nodes.len(),
                "{}@{} depends on missing node {}",
                node.name,
                node.version,
                candidate
            );
            clause.push(variable(candidate));
        }
        clauses.push(clause);
    }
}

/// One blocking clause for every selection pattern that is not a singleton
fn exactly_one_enumerated(positions: &[usize], clauses: &mut Vec<Clause>) {
    let k = positions.len();
    for pattern in 0u32..(1u32 << k) {
        if pattern.count_ones() == 1 {
            continue;
        }
        let clause = positions
            .iter()
            .enumerate()
            .map(|(bit, &position)| {
                if pattern & (1 << bit) == 0 {
                    variable(position)
                } else {
                    -variable(position)
                }
            })
            .collect();
        clauses.push(clause);
    }
}

/// At least one, and no two at once
fn exactly_one_pairwise(positions: &[usize], clauses: &mut Vec<Clause>) {
    clauses.push(positions.iter().map(|&p| variable(p)).collect());
    for (i, &a) in positions.iter().enumerate() {
        for &b in &positions[i + 1..] {
            clauses.push(vec![-variable(a), -variable(b)]);
        }
    }
}
