//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::gateway::{ProverGateway, ProverRequest};
use crate::verification::{CounterExample, MethodResult, ProofStep, Theorem, VerificationMethod};

#[derive(Debug, Clone)]
enum Script {
    Verdict {
        verified: bool,
        confidence: f64,
        steps: Vec<ProofStep>,
        counter_examples: Vec<CounterExample>,
        limitations: Vec<String>,
    },
    Error(String),
    Panic,
}

/// A [`ProverGateway`] with per-method scripted outcomes.
#[derive(Default)]
pub(crate) struct ScriptedProver {
    scripts: HashMap<VerificationMethod, Script>,
    /// Confidence lost when the named assumption is missing from the theorem.
    assumption_penalties: HashMap<String, f64>,
    /// Calls error when the named assumption is missing.
    erroring_without: HashSet<String>,
    delays_ms: HashMap<VerificationMethod, u64>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, ProverRequest)>>,
}

impl ScriptedProver {
    pub fn new() -> Self {
        Self::default()
    }

    fn verdict(mut self, method: VerificationMethod, verified: bool, confidence: f64) -> Self {
        self.scripts.insert(
            method,
            Script::Verdict {
                verified,
                confidence,
                steps: Vec::new(),
                counter_examples: Vec::new(),
                limitations: Vec::new(),
            },
        );
        self
    }

    pub fn verifies(self, method: VerificationMethod, confidence: f64) -> Self {
        self.verdict(method, true, confidence)
    }

    pub fn refutes(self, method: VerificationMethod, confidence: f64) -> Self {
        self.verdict(method, false, confidence)
    }

    pub fn errors(mut self, method: VerificationMethod, message: &str) -> Self {
        self.scripts.insert(method, Script::Error(message.to_string()));
        self
    }

    pub fn panics(mut self, method: VerificationMethod) -> Self {
        self.scripts.insert(method, Script::Panic);
        self
    }

    pub fn with_steps(mut self, method: VerificationMethod, new_steps: Vec<ProofStep>) -> Self {
        if let Some(Script::Verdict { steps, .. }) = self.scripts.get_mut(&method) {
            steps.extend(new_steps);
        }
        self
    }

    pub fn with_counter_example(mut self, method: VerificationMethod, ce: CounterExample) -> Self {
        if let Some(Script::Verdict {
            counter_examples, ..
        }) = self.scripts.get_mut(&method)
        {
            counter_examples.push(ce);
        }
        self
    }

    pub fn with_limitation(mut self, method: VerificationMethod, limitation: &str) -> Self {
        if let Some(Script::Verdict { limitations, .. }) = self.scripts.get_mut(&method) {
            limitations.push(limitation.to_string());
        }
        self
    }

    pub fn with_assumption_penalty(mut self, assumption: &str, penalty: f64) -> Self {
        self.assumption_penalties
            .insert(assumption.to_string(), penalty);
        self
    }

    pub fn erroring_without(mut self, assumption: &str) -> Self {
        self.erroring_without.insert(assumption.to_string());
        self
    }

    pub fn with_delay(mut self, method: VerificationMethod, delay_ms: u64) -> Self {
        self.delays_ms.insert(method, delay_ms);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Methods requested, in call order.
    pub fn called_methods(&self) -> Vec<VerificationMethod> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.method)
            .collect()
    }

    /// Theorem ids and requests, in call order.
    pub fn requests(&self) -> Vec<(String, ProverRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProverGateway for ScriptedProver {
    async fn verify(&self, theorem: &Theorem, request: &ProverRequest) -> Result<MethodResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((theorem.id.clone(), request.clone()));

        if let Some(delay) = self.delays_ms.get(&request.method) {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
        }

        let missing = |assumption: &String| !theorem.assumptions.contains(assumption);

        if self.erroring_without.iter().any(missing) {
            return Err(Error::prover_call(request.method, "probe rejected"));
        }

        match self.scripts.get(&request.method) {
            Some(Script::Verdict {
                verified,
                confidence,
                steps,
                counter_examples,
                limitations,
            }) => {
                let penalty: f64 = self
                    .assumption_penalties
                    .iter()
                    .filter(|(a, _)| missing(*a))
                    .map(|(_, p)| *p)
                    .sum();
                let mut result = if *verified {
                    MethodResult::verified(request.method, confidence - penalty)
                } else {
                    MethodResult::refuted(request.method, confidence - penalty)
                };
                result.proof_steps = steps.clone();
                result.counter_examples = counter_examples.clone();
                result.limitations = limitations.clone();
                Ok(result.with_duration(5))
            }
            Some(Script::Error(message)) => Err(Error::prover_call(request.method, message.clone())),
            Some(Script::Panic) => panic!("scripted prover panic for {}", request.method),
            None => Err(Error::prover_call(request.method, "no script for method")),
        }
    }
}
