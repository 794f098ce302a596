//! Baseline-vs-team comparison judged by a model.

use std::path::Path;
use std::sync::Arc;

use babysquad_agents::BaselineAgent;
use babysquad_common::{Message, Result, SquadError};
use babysquad_llm::{LlmClient, complete_with_history};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::orchestrator::TurnOrchestrator;

pub const DEFAULT_QUESTIONS: [&str; 4] = [
    "5개월 아기 이유식 스케줄 짜줘",
    "아기가 밤에 계속 깨는데 수면 교육 어떻게 해?",
    "철분 부족하면 뭘 먹여야 해?",
    "돌 지난 아기 우유 얼마나 마셔?",
];

/// Session the team answers in. All questions share it.
pub const EVAL_SESSION: &str = "eval_user";

const JUDGE_INSTRUCTION: &str = "너는 육아 상담 답변을 비교하는 평가자다. \
한 질문에 대한 두 답변(A, B) 중 더 전문적이고 구체적이며 실제로 도움이 되는 답변을 고르고 이유를 설명하라.\n\n\
평가 기준:\n\
1. 정확성: 참고 자료에 근거했는가?\n\
2. 전문성: 전문가다운 어조와 깊이가 있는가?\n\
3. 구조: 읽기 쉽게 정리되었는가?\n\n\
결과 형식:\n\
- 승자: (A 또는 B)\n\
- 이유: (한 줄 요약)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// Answer A, the single-agent baseline
    Baseline,
    /// Answer B, the routed specialist team
    Team,
}

impl Winner {
    /// Team wins only when the judgement names B explicitly.
    pub fn from_judgement(judgement: &str) -> Self {
        const TEAM_MARKERS: [&str; 3] = ["승자: B", "승자:B", "Winner: B"];
        if TEAM_MARKERS.iter().any(|marker| judgement.contains(marker)) {
            Self::Team
        } else {
            Self::Baseline
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub baseline_answer: String,
    pub team_answer: String,
    pub winner: Winner,
    pub judgement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalReport {
    pub records: Vec<EvalRecord>,
    pub team_wins: usize,
    pub baseline_wins: usize,
}

impl EvalReport {
    fn push(&mut self, record: EvalRecord) {
        match record.winner {
            Winner::Team => self.team_wins += 1,
            Winner::Baseline => self.baseline_wins += 1,
        }
        self.records.push(record);
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }
}

pub struct Evaluator {
    baseline: BaselineAgent,
    orchestrator: Arc<TurnOrchestrator>,
    judge: Arc<dyn LlmClient>,
}

impl Evaluator {
    pub fn new(
        baseline: BaselineAgent,
        orchestrator: Arc<TurnOrchestrator>,
        judge: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            baseline,
            orchestrator,
            judge,
        }
    }

    /// Baseline failures are recorded as answer text. Team and judge
    /// failures abort the run.
    pub async fn run(&self, questions: &[String]) -> Result<EvalReport> {
        let mut report = EvalReport::default();
        info!(questions = questions.len(), "Evaluation started");

        for question in questions {
            let baseline_answer = match self.baseline.ask(question).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(question = %question, error = %e, "Baseline failed");
                    format!("Error: {e}")
                }
            };
            let team_answer = self.orchestrator.process_turn(EVAL_SESSION, question).await?;
            let judgement = self.judge(question, &baseline_answer, &team_answer).await?;
            let winner = Winner::from_judgement(&judgement);
            info!(question = %question, ?winner, "Judged");

            report.push(EvalRecord {
                question: question.clone(),
                baseline_answer,
                team_answer,
                winner,
                judgement,
            });
        }

        info!(
            team_wins = report.team_wins,
            baseline_wins = report.baseline_wins,
            "Evaluation finished"
        );
        Ok(report)
    }

    async fn judge(&self, question: &str, answer_a: &str, answer_b: &str) -> Result<String> {
        let prompt = format!(
            "[질문]: {question}\n\n[답변 A (Single Agent)]:\n{answer_a}\n\n\
             [답변 B (Multi-Agent)]:\n{answer_b}"
        );
        complete_with_history(
            self.judge.as_ref(),
            JUDGE_INSTRUCTION,
            &[Message::user(prompt)],
            Some(0.0),
        )
        .await
    }
}

/// One question per line; blank lines and `#` comments are skipped.
pub async fn load_questions(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    let questions: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();
    if questions.is_empty() {
        return Err(SquadError::InvalidInput(format!(
            "no questions in {}",
            path.display()
        )));
    }
    Ok(questions)
}

pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}
