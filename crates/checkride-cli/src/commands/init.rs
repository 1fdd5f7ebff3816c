//! The `checkride init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create checkride.toml
    if std::path::Path::new("checkride.toml").exists() {
        println!("checkride.toml already exists, skipping.");
    } else {
        std::fs::write("checkride.toml", SAMPLE_CONFIG)?;
        println!("Created checkride.toml");
    }

    // Create example question bank
    std::fs::create_dir_all("question-banks")?;
    let example_path = std::path::Path::new("question-banks/example.toml");
    if example_path.exists() {
        println!("question-banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created question-banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit checkride.toml (set an OpenAI key, or keep the offline rules oracle)");
    println!("  2. Run: checkride validate --bank question-banks/example.toml");
    println!("  3. Run: checkride practice --mode PPL");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# checkride configuration

profile = "demo-user"
max_probes_per_task = 2
max_repairs = 2
deadline_secs = 90
bank_dir = "./question-banks"

# Offline rule-based grading by default. For LLM grading:
#
# [oracle]
# type = "openai"
# api_key = "${OPENAI_API_KEY}"
# model = "gpt-4.1"

[oracle]
type = "rules"
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Bank"
description = "A small starter bank covering airworthiness and weather"

[[questions]]
id = "aw-001"
stem = "What documents are required on board the aircraft for flight?"
acs_task_code = "PA.I.B.K1"
acs_area = "Airworthiness Requirements"
modes = ["PPL", "CPL"]

[[questions]]
id = "aw-002"
stem = "Who is responsible for determining whether the aircraft is airworthy?"
acs_task_code = "PA.I.B.K2"
acs_area = "Airworthiness Requirements"
modes = ["PPL", "CPL"]

[[questions]]
id = "wx-001"
stem = "What weather minimums apply to VFR flight in Class E airspace below 10,000 feet MSL?"
acs_task_code = "PA.I.C.K1"
acs_area = "Weather Information"
modes = ["PPL"]

[[questions]]
id = "wx-002"
stem = "Explain how you would obtain and interpret a TAF for your destination."
acs_task_code = "PA.I.C.K2"
acs_area = "Weather Information"
modes = ["PPL", "IR", "CPL"]

[[questions]]
id = "ifr-001"
stem = "What are the required reports to ATC when operating IFR in a non-radar environment?"
acs_task_code = "IR.II.A.K1"
acs_area = "ATC Clearances and Procedures"
modes = ["IR"]
"#;
