//! DPLL SAT solver
//!
//! Unit propagation, branching on the most frequent variable, chronological
//! backtracking. Exponential in the worst case; the decision budget keeps a
//! pathological graph from hanging the resolver.

use crate::core::{KilnError, KilnResult};
use crate::resolver::cnf::{Clause, Cnf, Literal};

/// Truth value of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    True,
    False,
    Unassigned,
}

/// Values of all variables, indexed from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<Value>,
}

impl Assignment {
    pub fn new(variables: usize) -> Self {
        Self {
            values: vec![Value::Unassigned; variables],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, variable: usize) -> Value {
        self.values[variable - 1]
    }

    /// Make `literal` true
    fn set(&mut self, literal: Literal) {
        let slot = &mut self.values[literal.unsigned_abs() as usize - 1];
        *slot = if literal > 0 { Value::True } else { Value::False };
    }

    /// Unassigned variables count as false
    pub fn is_true(&self, variable: usize) -> bool {
        self.value(variable) == Value::True
    }

    /// 0-based node positions whose variable is true
    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == Value::True)
            .map(|(i, _)| i)
    }
}

/// Outcome of a solve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Solution {
    Satisfiable(Assignment),
    Unsatisfiable,
}

enum Propagation {
    Satisfied,
    Conflict,
    Undecided,
}

/// DPLL solver with a decision budget shared by every solve it runs
#[derive(Debug)]
pub struct Solver {
    max_decisions: u64,
    decisions: u64,
}

impl Solver {
    /// `max_decisions == 0` disables the budget
    pub fn new(max_decisions: u64) -> Self {
        Self {
            max_decisions,
            decisions: 0,
        }
    }

    /// Decisions taken so far, across all solves
    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    pub fn solve(&mut self, cnf: &Cnf) -> KilnResult<Solution> {
        self.solve_clauses(&cnf.clauses, cnf.variables)
    }

    pub fn solve_clauses(&mut self, clauses: &[Clause], variables: usize) -> KilnResult<Solution> {
        assert!(
            clauses
                .iter()
                .flatten()
                .all(|&lit| lit != 0 && lit.unsigned_abs() as usize <= variables),
            "literal outside 1..={}",
            variables
        );

        let result = self.dpll(clauses.to_vec(), Assignment::new(variables))?;
        Ok(match result {
            Some(assignment) => Solution::Satisfiable(assignment),
            None => Solution::Unsatisfiable,
        })
    }

    fn dpll(&mut self, mut clauses: Vec<Clause>, mut assignment: Assignment) -> KilnResult<Option<Assignment>> {
        match propagate(&mut clauses, &mut assignment) {
            Propagation::Satisfied => return Ok(Some(assignment)),
            Propagation::Conflict => return Ok(None),
            Propagation::Undecided => {}
        }

        self.decisions += 1;
        if self.max_decisions > 0 && self.decisions > self.max_decisions {
            return Err(KilnError::ResolutionLimitExceeded {
                limit: self.max_decisions,
            });
        }

        let literal = branch_literal(&clauses, assignment.len());
        tracing::trace!("Decision {}: trying {}", self.decisions, literal);

        let mut first = clauses.clone();
        first.push(vec![literal]);
        if let Some(model) = self.dpll(first, assignment.clone())? {
            return Ok(Some(model));
        }

        clauses.push(vec![-literal]);
        self.dpll(clauses, assignment)
    }
}

/// Apply unit clauses until none are left
fn propagate(clauses: &mut Vec<Clause>, assignment: &mut Assignment) -> Propagation {
    loop {
        if clauses.is_empty() {
            return Propagation::Satisfied;
        }
        if clauses.iter().any(|c| c.is_empty()) {
            return Propagation::Conflict;
        }

        let unit = match clauses.iter().find(|c| c.len() == 1) {
            Some(clause) => clause[0],
            None => return Propagation::Undecided,
        };

        assignment.set(unit);
        if !simplify(clauses, unit) {
            return Propagation::Conflict;
        }
    }
}

/// Drop clauses satisfied by `literal` and strip its negation from the rest.
/// Returns false if some clause lost its last literal.
fn simplify(clauses: &mut Vec<Clause>, literal: Literal) -> bool {
    clauses.retain(|clause| !clause.contains(&literal));
    for clause in clauses.iter_mut() {
        clause.retain(|&l| l != -literal);
        if clause.is_empty() {
            return false;
        }
    }
    true
}

/// The most frequent variable (first found on ties), in its majority polarity
/// (positive on ties)
fn branch_literal(clauses: &[Clause], variables: usize) -> Literal {
    let mut positive = vec![0usize; variables + 1];
    let mut negative = vec![0usize; variables + 1];
    let mut first_seen = Vec::new();

    for &lit in clauses.iter().flatten() {
        let var = lit.unsigned_abs() as usize;
        if positive[var] + negative[var] == 0 {
            first_seen.push(var);
        }
        if lit > 0 {
            positive[var] += 1;
        } else {
            negative[var] += 1;
        }
    }

    let mut best = first_seen[0];
    for &var in &first_seen[1..] {
        if positive[var] + negative[var] > positive[best] + negative[best] {
            best = var;
        }
    }

    let literal = best as Literal;
    if positive[best] >= negative[best] {
        literal
    } else {
        -literal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satisfies(clauses: &[Clause], assignment: &Assignment) -> bool {
        clauses.iter().all(|clause| {
            clause.iter().any(|&lit| {
                let value = assignment.is_true(lit.unsigned_abs() as usize);
                if lit > 0 { value } else { !value }
            })
        })
    }

    /// `pigeons` pigeons in `holes` holes, unsatisfiable when pigeons > holes
    fn pigeonhole(pigeons: usize, holes: usize) -> (Vec<Clause>, usize) {
        let var = |p: usize, h: usize| (p * holes + h + 1) as Literal;
        let mut clauses = Vec::new();
        for p in 0..pigeons {
            clauses.push((0..holes).map(|h| var(p, h)).collect());
        }
        for h in 0..holes {
            for a in 0..pigeons {
                for b in a + 1..pigeons {
                    clauses.push(vec![-var(a, h), -var(b, h)]);
                }
            }
        }
        (clauses, pigeons * holes)
    }

    #[test]
    fn test_satisfiable() {
        let clauses = vec![vec![1, 2], vec![-1, 3], vec![-2, -3], vec![2, 3]];
        match Solver::new(0).solve_clauses(&clauses, 3).unwrap() {
            Solution::Satisfiable(model) => assert!(satisfies(&clauses, &model)),
            Solution::Unsatisfiable => panic!("formula is satisfiable"),
        }
    }

    #[test]
    fn test_unit_propagation_alone() {
        let clauses = vec![vec![1], vec![-1, 2], vec![-2, -3]];
        let mut solver = Solver::new(0);
        match solver.solve_clauses(&clauses, 4).unwrap() {
            Solution::Satisfiable(model) => {
                assert_eq!(model.value(1), Value::True);
                assert_eq!(model.value(2), Value::True);
                assert_eq!(model.value(3), Value::False);
                assert_eq!(model.value(4), Value::Unassigned);
                assert_eq!(model.selected().collect::<Vec<_>>(), vec![0, 1]);
            }
            Solution::Unsatisfiable => panic!("formula is satisfiable"),
        }
        assert_eq!(solver.decisions(), 0);
    }

    #[test]
    fn test_contradiction() {
        let clauses = vec![vec![1], vec![-1]];
        assert_eq!(
            Solver::new(0).solve_clauses(&clauses, 1).unwrap(),
            Solution::Unsatisfiable
        );
    }

    #[test]
    fn test_empty_formula() {
        match Solver::new(0).solve_clauses(&[], 2).unwrap() {
            Solution::Satisfiable(model) => assert_eq!(model.selected().count(), 0),
            Solution::Unsatisfiable => panic!("empty formula is satisfiable"),
        }
    }

    #[test]
    fn test_pigeonhole_unsat() {
        let (clauses, variables) = pigeonhole(4, 3);
        let mut solver = Solver::new(0);
        assert_eq!(
            solver.solve_clauses(&clauses, variables).unwrap(),
            Solution::Unsatisfiable
        );
        assert!(solver.decisions() > 1);
    }

    #[test]
    fn test_pigeonhole_sat() {
        let (clauses, variables) = pigeonhole(3, 3);
        match Solver::new(0).solve_clauses(&clauses, variables).unwrap() {
            Solution::Satisfiable(model) => assert!(satisfies(&clauses, &model)),
            Solution::Unsatisfiable => panic!("3 pigeons fit in 3 holes"),
        }
    }

    #[test]
    fn test_decision_budget() {
        let (clauses, variables) = pigeonhole(4, 3);
        let result = Solver::new(1).solve_clauses(&clauses, variables);
        assert!(matches!(
            result,
            Err(KilnError::ResolutionLimitExceeded { limit: 1 })
        ));
    }

    #[test]
    fn test_branch_heuristic() {
        // all three variables occur twice: the first one wins, positive on a tie
        assert_eq!(branch_literal(&[vec![1, 2], vec![2, -3], vec![-1, 3]], 3), 1);
        // variable 2 is the most frequent and mostly negative
        assert_eq!(branch_literal(&[vec![1, -2], vec![-2, 3], vec![2, 3]], 3), -2);
    }
}
