//! The `checkride practice` command.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use checkride_core::engine::{ExamEngine, ExamEngineConfig};
use checkride_core::evaluator::Evaluator;
use checkride_core::model::Mode;
use checkride_core::probe::PromptKind;
use checkride_core::report::SessionReport;
use checkride_core::verdict::{Outcome, Verdict};
use checkride_oracle::config::{load_config, load_config_from};
use checkride_oracle::create_oracle;
use checkride_store::{load_bank_directory, MemoryStore};

pub async fn execute(
    mode_str: String,
    bank_dir: Option<PathBuf>,
    user: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => load_config_from(Some(path.as_path()))?,
        None => load_config()?,
    };

    let mode: Mode = mode_str
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid --mode")?;
    let user_id = user.unwrap_or_else(|| config.profile.clone());
    let bank_dir = bank_dir.unwrap_or_else(|| config.bank_dir.clone());

    let banks = load_bank_directory(&bank_dir)
        .with_context(|| format!("failed to load question banks from {}", bank_dir.display()))?;
    let questions: Vec<_> = banks.into_iter().flat_map(|b| b.questions).collect();
    anyhow::ensure!(
        !questions.is_empty(),
        "no questions found under {}; run `checkride init` for a starter bank",
        bank_dir.display()
    );

    let oracle = create_oracle(&config.oracle)?;
    let evaluator = Evaluator::new(oracle, config.retry_policy());
    let store = Arc::new(MemoryStore::with_questions(questions));
    let engine = ExamEngine::new(
        store,
        evaluator,
        ExamEngineConfig {
            max_probes_per_task: config.max_probes_per_task,
        },
    );

    let session_id = engine.start_session(&user_id, mode).await?;

    println!("checkride — {mode} oral exam practice");
    println!("Answer in your own words. Type 'skip' for a new question, 'quit' to finish.\n");

    let mut force_new_base = false;
    loop {
        let prompt = engine.next_prompt(&user_id, session_id, force_new_base).await?;
        force_new_base = false;

        match prompt.kind {
            PromptKind::Base => {
                println!("[{}] {}", prompt.acs_task_code, prompt.acs_area);
            }
            PromptKind::Probe => {
                println!(
                    "[{}] {} — follow-up {}/{}",
                    prompt.acs_task_code, prompt.acs_area, prompt.probe_count, prompt.max_probes
                );
            }
        }
        println!("{}\n", prompt.stem);

        let answer = match read_answer()? {
            Input::Quit => break,
            Input::Skip => {
                force_new_base = true;
                println!();
                continue;
            }
            Input::Answer(text) => text,
        };

        let verdict = engine
            .submit_answer(&user_id, session_id, &prompt.id, &answer)
            .await?;
        print_verdict(&verdict);
    }

    let report = engine.session_results(&user_id, session_id).await?;
    print_results(&report);

    Ok(())
}

enum Input {
    Answer(String),
    Skip,
    Quit,
}

fn read_answer() -> Result<Input> {
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        if read == 0 {
            // EOF counts as quitting.
            return Ok(Input::Quit);
        }

        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "quit" | "exit" => return Ok(Input::Quit),
            "skip" => return Ok(Input::Skip),
            _ => return Ok(Input::Answer(trimmed.to_string())),
        }
    }
}

fn print_verdict(verdict: &Verdict) {
    let label = match verdict.outcome {
        Outcome::Pass => "PASS",
        Outcome::Probe => "PROBE — let's dig deeper",
        Outcome::Remediate => "REMEDIATE — review this area",
        Outcome::Fail => "FAIL — examiner red flag",
    };
    println!("\n{label} (confidence {:.2})", verdict.confidence);
    println!("{}", verdict.feedback);
    if !verdict.missing_points.is_empty() {
        println!("Missing points:");
        for point in &verdict.missing_points {
            println!("  - {point}");
        }
    }
    println!();
}

fn print_results(report: &SessionReport) {
    use comfy_table::{Cell, Table};

    println!("\nSession results — {} answers graded", report.counts.total);
    println!(
        "  PASS {}  PROBE {}  REMEDIATE {}  FAIL {}",
        report.counts.pass, report.counts.probe, report.counts.remediate, report.counts.fail
    );

    if !report.weakest.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["ACS Task", "Mastery", "Attempts", "Passes", "Fails"]);
        for skill in &report.weakest {
            table.add_row(vec![
                Cell::new(&skill.acs_task_code),
                Cell::new(format!("{:.2} / 5.00", skill.mastery)),
                Cell::new(skill.attempts),
                Cell::new(skill.passes),
                Cell::new(skill.fails),
            ]);
        }
        println!("\nWeakest areas:\n{table}");
    }

    if !report.most_probed.is_empty() {
        println!("\nMost probed this session:");
        for probed in &report.most_probed {
            println!("  {} ({} probes)", probed.acs_task_code, probed.probes);
        }
    }
}
