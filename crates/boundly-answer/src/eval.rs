//! Batch evaluation against labelled questions.
//!
//! Each question file is a JSON object `{"q": ..., "label": "yes"|"no"|"unknown",
//! "explanation": ...}`; `explanation` is optional. Every question is answered
//! once. Decision accuracy is exact match, explanation quality is ROUGE-L F1
//! over lowercased alphanumeric tokens.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use boundly_core::{Error, Result};

use crate::service::{AnsweringService, Decision};

#[derive(Debug, Clone, Deserialize)]
pub struct EvalQuestion {
    #[serde(skip)]
    pub path: PathBuf,
    pub q: String,
    pub label: Decision,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Question files that parsed, and the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    pub questions: Vec<EvalQuestion>,
    pub unreadable: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalReport {
    pub questions: usize,
    /// Question files that could not be read or parsed.
    pub unreadable: usize,
    pub answered: usize,
    pub failed: usize,
    pub correct: usize,
    /// Exact-match accuracy over answered questions.
    pub accuracy: f64,
    /// Mean ROUGE-L F1 over answered questions with a reference explanation.
    pub rouge_l: f64,
    pub rouge_scored: usize,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "questions={} unreadable={} answered={} failed={} accuracy={:.3} rouge_l_f1={:.3} (over {})",
            self.questions, self.unreadable, self.answered, self.failed, self.accuracy, self.rouge_l, self.rouge_scored
        )
    }
}

/// Every `*.json` file directly under `dir`, in file-name order. A file that
/// cannot be read or parsed is logged and listed in `unreadable`.
pub fn load_questions(dir: &Path) -> Result<QuestionSet> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("questions directory {}", dir.display())));
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")))
        .collect();
    paths.sort();

    let mut set = QuestionSet::default();
    for path in paths {
        match read_question(&path) {
            Ok(question) => set.questions.push(question),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable question file, skipping");
                set.unreadable.push(path);
            }
        }
    }
    Ok(set)
}

fn read_question(path: &Path) -> Result<EvalQuestion> {
    let raw = std::fs::read_to_string(path)?;
    let mut question: EvalQuestion = serde_json::from_str(&raw)?;
    question.path = path.to_path_buf();
    Ok(question)
}

pub async fn evaluate(service: &AnsweringService, set: &QuestionSet) -> EvalReport {
    let mut report = EvalReport {
        questions: set.questions.len() + set.unreadable.len(),
        unreadable: set.unreadable.len(),
        ..EvalReport::default()
    };
    let mut rouge_sum = 0.0;
    for question in &set.questions {
        let response = match service.answer(&question.q).await {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %question.path.display(), error = %e, "question failed");
                report.failed += 1;
                continue;
            }
        };
        report.answered += 1;
        if response.answer.decision == question.label {
            report.correct += 1;
        }
        if let Some(reference) = &question.explanation {
            rouge_sum += rouge_l_f1(&response.answer.explanation, reference);
            report.rouge_scored += 1;
        }
    }
    if report.answered > 0 {
        report.accuracy = report.correct as f64 / report.answered as f64;
    }
    if report.rouge_scored > 0 {
        report.rouge_l = rouge_sum / report.rouge_scored as f64;
    }
    info!(%report, "evaluation finished");
    report
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F1 of `hypothesis` against `reference`.
pub fn rouge_l_f1(hypothesis: &str, reference: &str) -> f64 {
    let hyp = tokens(hypothesis);
    let refs = tokens(reference);
    if hyp.is_empty() || refs.is_empty() {
        return 0.0;
    }
    let lcs = lcs_len(&hyp, &refs) as f64;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / hyp.len() as f64;
    let recall = lcs / refs.len() as f64;
    2.0 * precision * recall / (precision + recall)
}
