//! CSV generation log.
//!
//! At every generation end one row per agent ever created is appended to the
//! report file. The file is created with a header if it does not exist.
//!
//! Elites keep the generation they were created in, so `lifetime_steps` keeps
//! growing for an agent that survives several generations as an elite.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::agent::{Agent, AgentId};
use super::context::SimulationContext;
use super::error::Result;

/// Column header of the report file.
pub const HEADER: &str = "generation,dot_id,food_eaten,highest_food,food_when_died,lifetime_steps,status,generation_created";

/// Whether an agent was part of the live population when a row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// In the live set at generation end.
    Alive,
    /// Died or left the population.
    Dead,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Alive => f.write_str("Alive"),
            Status::Dead => f.write_str("Dead"),
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Generation the row was written for.
    pub generation: u32,
    /// Agent id.
    pub dot_id: AgentId,
    /// Last known energy.
    pub food_eaten: f32,
    /// Highest energy reached.
    pub highest_food: f32,
    /// Energy at death; empty for agents that are alive or were retired.
    pub food_when_died: Option<f32>,
    /// `(generation - generation_created) * steps_per_generation`.
    pub lifetime_steps: u64,
    /// Membership in the live set.
    pub status: Status,
    /// Generation the agent was created in.
    pub generation_created: u32,
}

impl ReportRow {
    /// Formats the row as a CSV line without trailing newline.
    pub fn to_csv(&self) -> String {
        let died = self
            .food_when_died
            .map(|energy| format!("{energy:.2}"))
            .unwrap_or_default();
        format!(
            "{},{},{:.2},{:.2},{},{},{},{}",
            self.generation,
            self.dot_id,
            self.food_eaten,
            self.highest_food,
            died,
            self.lifetime_steps,
            self.status,
            self.generation_created
        )
    }
}

/// Builds the rows for every recorded agent. `live` is the terminal population.
pub fn generation_rows(
    context: &SimulationContext,
    live: &[Agent],
    generation: u32,
    steps_per_generation: u32,
) -> Vec<ReportRow> {
    let live_ids: HashSet<AgentId> = live.iter().map(|agent| agent.id).collect();

    context
        .records()
        .map(|record| {
            let status = if live_ids.contains(&record.id) {
                Status::Alive
            } else {
                Status::Dead
            };
            ReportRow {
                generation,
                dot_id: record.id,
                food_eaten: record.energy,
                highest_food: record.peak_energy,
                food_when_died: match status {
                    Status::Alive => None,
                    Status::Dead => record.food_when_died,
                },
                lifetime_steps: u64::from(generation.saturating_sub(record.birth_generation))
                    * u64::from(steps_per_generation),
                status,
                generation_created: record.birth_generation,
            }
        })
        .collect()
}

/// Appends generation rows to a CSV file.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    path: PathBuf,
}

impl GenerationReport {
    /// Creates a writer for `path`. Nothing is written until [`Self::append`].
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `rows`, writing the header first if the file is new.
    pub fn append(&self, rows: &[ReportRow]) -> Result<()> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => writeln!(file, "{HEADER}")?,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err.into()),
        }

        let file: File = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            writeln!(writer, "{}", row.to_csv())?;
        }
        writer.flush()?;
        Ok(())
    }
}
