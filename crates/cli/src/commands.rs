use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use babysquad_common::MessageRole;
use babysquad_coordinator::{BabySquad, BabySquadConfig, default_questions, load_questions};
use babysquad_knowledge::{IngestOutcome, Ingestor, VectorIndex, build_embedder};
use babysquad_sessions::open_store;
use tokio::io::{AsyncBufReadExt, BufReader};

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub async fn ingest(config: &BabySquadConfig, data_dir: &Path) -> Result<()> {
    let knowledge = &config.knowledge;
    let embedder = build_embedder(knowledge)?;
    let ingestor = Ingestor::new(knowledge, embedder.clone())?;
    let index = VectorIndex::open(&knowledge.index_path, &knowledge.collection, embedder).await?;

    let outcome = ingestor.run(data_dir, &index).await;
    index.close().await;

    match outcome? {
        IngestOutcome::DataDirCreated(dir) => {
            println!(
                "Created '{}'. Put .txt, .md or .pdf documents there and run ingest again.",
                dir.display()
            );
        }
        IngestOutcome::NoDocuments { skipped } => {
            println!("No .txt, .md or .pdf documents in '{}'.", data_dir.display());
            for path in skipped {
                println!("  skipped {}", path.display());
            }
        }
        IngestOutcome::Ingested(report) => {
            println!(
                "Indexed {} chunks from {} pages in {} files into '{}'.",
                report.chunks,
                report.pages,
                report.files,
                knowledge.index_path.display()
            );
            if !report.skipped.is_empty() {
                println!("Skipped {} unsupported files.", report.skipped.len());
            }
        }
    }
    Ok(())
}

pub async fn ask(
    config: BabySquadConfig,
    question: &str,
    session: Option<String>,
    baseline: bool,
) -> Result<()> {
    let squad = BabySquad::from_config(config).await?;
    let answer = if baseline {
        squad.baseline().ask(question).await?
    } else {
        let session = session.unwrap_or_else(new_session_id);
        let outcome = squad.orchestrator.run_turn(&session, question).await?;
        eprintln!("[{} | {}]", outcome.session_id, outcome.decision);
        outcome.reply.text().to_string()
    };
    println!("{answer}");
    Ok(())
}

/// The loop keeps only the current session id; history lives in the store.
pub async fn chat(config: BabySquadConfig, session: Option<String>) -> Result<()> {
    let squad = BabySquad::from_config(config).await?;
    let mut session_id = session.unwrap_or_else(new_session_id);

    println!("BabySquad chat. Session {session_id}");
    println!("Commands: /reset starts a new session, /exit quits.");
    if !squad.retriever.is_available() {
        println!("(No knowledge index found; run `babysquad ingest` for cited answers.)");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session_id = new_session_id();
                println!("New session {session_id}");
            }
            message => match squad.orchestrator.run_turn(&session_id, message).await {
                Ok(outcome) => {
                    println!("[{}]\n{}", outcome.decision, outcome.reply.text());
                }
                Err(e) => eprintln!("Error: {e}"),
            },
        }
    }
    Ok(())
}

pub async fn history(config: &BabySquadConfig, session_id: &str) -> Result<()> {
    let store = open_store(&config.sessions).await?;
    let state = store
        .load(session_id)
        .await?
        .with_context(|| format!("no session '{session_id}'"))?;

    for message in state.history() {
        let speaker = match (message.role(), message.source_agent()) {
            (MessageRole::User, _) => "parent".to_string(),
            (_, Some(agent)) => agent.to_string(),
            (role, None) => role.as_str().to_string(),
        };
        println!("[{speaker}] {}\n", message.text());
    }
    if let Some(decision) = state.last_routing_decision() {
        println!("Last routed to {decision}");
    }
    Ok(())
}

pub async fn sessions(config: &BabySquadConfig) -> Result<()> {
    let store = open_store(&config.sessions).await?;
    for summary in store.list_sessions().await? {
        let decision = summary
            .last_routing_decision
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {:>3} messages  {:<16}  {}",
            summary.session_id,
            summary.message_count,
            decision,
            summary.updated_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn eval(
    config: BabySquadConfig,
    questions: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let questions = match questions {
        Some(path) => load_questions(path).await?,
        None => default_questions(),
    };
    let squad = BabySquad::from_config(config).await?;
    let report = squad.evaluator().run(&questions).await?;

    for record in &report.records {
        println!("{:?}\t{}", record.winner, record.question);
    }
    println!(
        "\nTeam {} : {} Baseline",
        report.team_wins, report.baseline_wins
    );

    if let Some(path) = output {
        report.write_json(path).await?;
        println!("Report written to '{}'", path.display());
    }
    Ok(())
}
