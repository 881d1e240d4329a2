// Job driver - sequences read -> process -> write steps over chunked records

use anyhow::Result;
use rusqlite::Connection;

use crate::config::LoaderConfig;
use crate::ledger::{self, RunStatus, StepStatus};
use crate::reader::{CsvEmployeeReader, EmployeeReader, StoreEmployeeReader};
use crate::store::EmployeeWriter;
use crate::transform::{DesignationMapper, EmployeeProcessor, NameNormalizer};

pub const JOB_NAME: &str = "employee-loader";
pub const STEP_NAME_LOAD: &str = "name-load";
pub const STEP_DESIGNATION_MAP: &str = "designation-map";

/// Records per chunk: read, processed, and committed together.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

// ============================================================================
// STEP
// ============================================================================

/// One stage of a job: a reader, a processor, and chunked writes.
pub struct Step<'a> {
    name: &'static str,
    reader: Box<dyn EmployeeReader + 'a>,
    processor: Box<dyn EmployeeProcessor + 'a>,
    chunk_size: usize,
    rerun_if_complete: bool,
}

impl<'a> Step<'a> {
    pub fn new(
        name: &'static str,
        reader: Box<dyn EmployeeReader + 'a>,
        processor: Box<dyn EmployeeProcessor + 'a>,
    ) -> Self {
        Step {
            name,
            reader,
            processor,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rerun_if_complete: false,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Whether this step executes again on restart even though a prior
    /// failed run already completed it.
    pub fn rerun_if_complete(mut self, rerun: bool) -> Self {
        self.rerun_if_complete = rerun;
        self
    }
}

/// What a single step did during one run.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: &'static str,
    pub records_read: i64,
    pub records_written: i64,
    pub skipped: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub steps: Vec<StepOutcome>,
}

// ============================================================================
// JOB
// ============================================================================

/// An ordered sequence of steps run as one logical execution.
///
/// Every execution opens a new ledger run. When the latest prior run of the
/// same job failed, the new run is a restart: steps that run already
/// completed are skipped unless they opt into re-running.
pub struct Job<'a> {
    name: String,
    conn: &'a Connection,
    steps: Vec<Step<'a>>,
}

impl<'a> Job<'a> {
    pub fn new(conn: &'a Connection, name: impl Into<String>) -> Self {
        Job {
            name: name.into(),
            conn,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step<'a>) -> Self {
        self.steps.push(step);
        self
    }

    /// Execute every step in order, recording the run in the ledger.
    ///
    /// The first error aborts the current step, marks step and run as
    /// failed, and prevents later steps from starting.
    pub fn run(mut self) -> Result<RunSummary> {
        let prior_failed = ledger::latest_run(self.conn, &self.name)?
            .filter(|run| run.status == RunStatus::Failed);

        let run_id = ledger::start_run(self.conn, &self.name)?;
        match &prior_failed {
            Some(prior) => println!(
                "Run {} of '{}' (restarting after failed run {})",
                run_id, self.name, prior.id
            ),
            None => println!("Run {} of '{}'", run_id, self.name),
        }

        let mut outcomes = Vec::with_capacity(self.steps.len());

        for step in &mut self.steps {
            if let Some(prior) = &prior_failed {
                let prior_status = ledger::step_status(self.conn, prior.id, step.name)?;
                if prior_status == Some(StepStatus::Complete) && !step.rerun_if_complete {
                    ledger::skip_step(self.conn, run_id, step.name)?;
                    println!("- step '{}' completed in run {}, skipping", step.name, prior.id);
                    outcomes.push(StepOutcome {
                        name: step.name,
                        records_read: 0,
                        records_written: 0,
                        skipped: true,
                    });
                    continue;
                }
            }

            match Self::execute_step(self.conn, run_id, step) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    let e = e.context(format!("step '{}' failed", step.name));
                    ledger::fail_run(self.conn, run_id, &format!("{:#}", e))?;
                    return Err(e);
                }
            }
        }

        ledger::complete_run(self.conn, run_id)?;

        Ok(RunSummary {
            run_id,
            steps: outcomes,
        })
    }

    fn execute_step(
        conn: &Connection,
        run_id: i64,
        step: &mut Step<'_>,
    ) -> Result<StepOutcome> {
        ledger::start_step(conn, run_id, step.name)?;

        let writer = EmployeeWriter::new(conn);
        let mut records_read: i64 = 0;
        let mut records_written: i64 = 0;

        match Self::chunk_loop(step, &writer, &mut records_read, &mut records_written) {
            Ok(()) => {
                ledger::complete_step(conn, run_id, step.name, records_read, records_written)?;
                println!(
                    "✓ step '{}': {} read, {} written",
                    step.name, records_read, records_written
                );
                Ok(StepOutcome {
                    name: step.name,
                    records_read,
                    records_written,
                    skipped: false,
                })
            }
            Err(e) => {
                ledger::fail_step(
                    conn,
                    run_id,
                    step.name,
                    records_read,
                    records_written,
                    &format!("{:#}", e),
                )?;
                Err(e)
            }
        }
    }

    /// Read, process, and write chunks to exhaustion. Each chunk is
    /// committed as one transaction; a failure discards the current chunk.
    fn chunk_loop(
        step: &mut Step<'_>,
        writer: &EmployeeWriter<'_>,
        records_read: &mut i64,
        records_written: &mut i64,
    ) -> Result<()> {
        loop {
            let mut chunk = Vec::with_capacity(step.chunk_size);
            while chunk.len() < step.chunk_size {
                match step.reader.read()? {
                    Some(employee) => {
                        *records_read += 1;
                        chunk.push(employee);
                    }
                    None => break,
                }
            }

            if chunk.is_empty() {
                break;
            }

            let mut processed = Vec::with_capacity(chunk.len());
            for employee in chunk {
                processed.push(step.processor.process(employee)?);
            }

            *records_written += writer.write(&processed)? as i64;
        }

        Ok(())
    }
}

// ============================================================================
// COMPOSITION
// ============================================================================

/// Build the two-step loader job.
///
/// Step 1 reads the input file, normalizes names, and persists the records.
/// Step 2 reads the store back in id order and rewrites each free-text
/// designation to its canonical category code. Step 1 never re-runs on
/// restart once complete; step 2 always does.
pub fn employee_loader_job<'a>(
    conn: &'a Connection,
    config: &LoaderConfig,
    mapper: DesignationMapper,
) -> Job<'a> {
    Job::new(conn, JOB_NAME)
        .step(
            Step::new(
                STEP_NAME_LOAD,
                Box::new(CsvEmployeeReader::new(&config.input_file)),
                Box::new(NameNormalizer),
            )
            .chunk_size(config.chunk_size)
            .rerun_if_complete(false),
        )
        .step(
            Step::new(
                STEP_DESIGNATION_MAP,
                Box::new(StoreEmployeeReader::new(conn)),
                Box::new(mapper),
            )
            .chunk_size(config.chunk_size)
            .rerun_if_complete(true),
        )
}

// ============================================================================
// TESTS
// ============================================================================
