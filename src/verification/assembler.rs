//! Composite proof assembly.
//!
//! Merges the proof steps of several method results into one proof whose
//! steps are ordered so that every premise is concluded before it is used.
//! Steps are keyed by conclusion text. Ordering is best-effort: steps whose
//! premises can never be satisfied (cycles, dangling references) are kept
//! in a trailing unresolved block instead of being rejected.

use std::collections::{HashMap, HashSet};

use super::types::{CompositeProof, CounterExample, MethodResult, ProofStep, Theorem};

/// Default first applicability condition.
pub const DEFAULT_PREAMBLE: &str =
    "Holds within the model defined by the theorem's variables and constraints";

/// Builds [`CompositeProof`]s from method results.
#[derive(Debug, Clone)]
pub struct ProofAssembler {
    preamble: String,
}

impl ProofAssembler {
    pub fn new() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Assemble a composite proof from `results`.
    pub fn assemble(&self, results: &[MethodResult], theorem: &Theorem) -> CompositeProof {
        let merged = merge_steps(results);
        let (steps, unresolved_steps) = order_steps(merged);

        let mut seen = HashSet::new();
        let mut counter_examples = Vec::new();
        for result in results {
            for ce in &result.counter_examples {
                if seen.insert(ce.description.clone()) {
                    counter_examples.push(CounterExample {
                        source_method: ce.source_method.or(Some(result.method)),
                        ..ce.clone()
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        let limitations = results
            .iter()
            .flat_map(|r| r.limitations.iter())
            .filter(|l| seen.insert(l.as_str()))
            .cloned()
            .collect();

        CompositeProof {
            steps,
            unresolved_steps,
            counter_examples,
            limitations,
            applicability_conditions: self.applicability_conditions(theorem),
        }
    }

    fn applicability_conditions(&self, theorem: &Theorem) -> Vec<String> {
        let mut conditions = vec![self.preamble.clone()];
        conditions.extend(theorem.assumptions.iter().map(|a| format!("Requires {}", a)));
        let domain = if theorem.domain.trim().is_empty() {
            "general"
        } else {
            theorem.domain.trim()
        };
        conditions.push(format!("Domain: {}", domain));
        conditions
    }
}

impl Default for ProofAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Tag every step with its method and keep one step per conclusion,
/// preferring the variant with the fewest premises. Output is in
/// first-seen conclusion order.
fn merge_steps(results: &[MethodResult]) -> Vec<ProofStep> {
    let mut merged: Vec<ProofStep> = Vec::new();
    let mut by_conclusion: HashMap<String, usize> = HashMap::new();

    for result in results {
        for step in &result.proof_steps {
            let tagged = ProofStep {
                description: if step.description.is_empty() {
                    format!("[{}]", result.method)
                } else {
                    format!("[{}] {}", result.method, step.description)
                },
                ..step.clone()
            };

            match by_conclusion.get(&tagged.conclusion) {
                Some(&i) => {
                    if tagged.premises.len() < merged[i].premises.len() {
                        merged[i] = tagged;
                    }
                }
                None => {
                    by_conclusion.insert(tagged.conclusion.clone(), merged.len());
                    merged.push(tagged);
                }
            }
        }
    }

    merged
}

/// Order steps by dependency. Returns the ordered steps and the length of
/// the trailing unresolved block.
fn order_steps(steps: Vec<ProofStep>) -> (Vec<ProofStep>, usize) {
    let mut placed = vec![false; steps.len()];
    let mut order = Vec::with_capacity(steps.len());
    {
        let mut concluded: HashSet<&str> = HashSet::new();

        for (i, step) in steps.iter().enumerate() {
            if step.premises.is_empty() {
                placed[i] = true;
                order.push(i);
                concluded.insert(step.conclusion.as_str());
            }
        }

        loop {
            let mut progress = false;
            for (i, step) in steps.iter().enumerate() {
                if placed[i] {
                    continue;
                }
                if step.premises.iter().all(|p| concluded.contains(p.as_str())) {
                    placed[i] = true;
                    order.push(i);
                    concluded.insert(step.conclusion.as_str());
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
    }

    let resolved = order.len();
    order.extend((0..steps.len()).filter(|&i| !placed[i]));
    let unresolved = order.len() - resolved;

    let mut slots: Vec<Option<ProofStep>> = steps.into_iter().map(Some).collect();
    let ordered = order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();
    (ordered, unresolved)
}
