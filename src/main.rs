use std::env;
use std::path::Path;
use std::process;

use anyhow::Result;

use employee_loader::{employee_loader_job, ledger, store, DesignationMapper, LoaderConfig};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("run") => run_job(args.get(2).map(Path::new)),
        Some("status") => show_status(args.get(2).map(Path::new)),
        Some(other) => {
            eprintln!("unknown command: {}", other);
            eprintln!("usage: employee-loader [run|status] [config.json]");
            process::exit(1);
        }
    }
}

fn run_job(config_path: Option<&Path>) -> Result<()> {
    println!("Employee Loader - CSV → SQLite batch job");

    let config = LoaderConfig::load(config_path)?;

    let mapper = match &config.designation_rules {
        Some(path) => DesignationMapper::from_file(path)?,
        None => DesignationMapper::new(),
    };

    let conn = store::open_database(&config.database)?;
    store::setup_schema(&conn)?;
    ledger::setup_ledger(&conn)?;
    println!("✓ Database ready ({})", config.database.display());

    let summary = employee_loader_job(&conn, &config, mapper).run()?;

    let count = store::count_employees(&conn)?;
    println!(
        "✓ Run {} complete: {} employees in store",
        summary.run_id, count
    );

    Ok(())
}

fn show_status(config_path: Option<&Path>) -> Result<()> {
    let config = LoaderConfig::load(config_path)?;

    let conn = store::open_database(&config.database)?;
    ledger::setup_ledger(&conn)?;

    let runs = ledger::recent_runs(&conn, 10)?;
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    for run in runs {
        println!(
            "run {} [{}] {} started {}",
            run.id,
            run.status.as_str(),
            run.job_name,
            run.started_at
        );
        if let Some(message) = &run.error_message {
            println!("    error: {}", message);
        }
        for step in ledger::steps_for_run(&conn, run.id)? {
            println!(
                "    step '{}' [{}] read {} written {}",
                step.step_name,
                step.status.as_str(),
                step.records_read,
                step.records_written
            );
        }
    }

    Ok(())
}
