//! CSV to JSON-lines chat dataset conversion.
//!
//! Each CSV row becomes one [`ChatRecord`]: the configured system prompt, the
//! `instruction` column as the user turn and the `response` column as the
//! assistant turn. Rows are written in input order, one compact JSON object
//! per line.

use crate::dataset::ChatRecord;
use crate::error::{TrainingError, TrainingResult};
use csv::StringRecord;
use std::fs::File;
use std::io::{LineWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant and you are tasked with answer questions about a company called Odd-e. For each input question, provide an answer. The answer should be accurate and truthful. Do not make up facts or answers";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub system_prompt: String,
    pub instruction_column: String,
    pub response_column: String,
    /// Skip rows that are too short instead of aborting.
    pub lenient: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instruction_column: "instruction".to_string(),
            response_column: "response".to_string(),
            lenient: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    pub records_written: u64,
    pub rows_skipped: u64,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    instruction: usize,
    response: usize,
}

/// Convert `csv_path` to `jsonl_path` with the default options.
pub fn convert(csv_path: &Path, jsonl_path: &Path) -> TrainingResult<ConvertStats> {
    convert_with_options(csv_path, jsonl_path, &ConvertOptions::default())
}

/// The output file is only created once the CSV header has the required
/// columns.
pub fn convert_with_options(
    csv_path: &Path,
    jsonl_path: &Path,
    options: &ConvertOptions,
) -> TrainingResult<ConvertStats> {
    let input = File::open(csv_path)
        .map_err(|source| TrainingError::ReadPath { path: csv_path.to_path_buf(), source })?;
    let mut reader = csv_reader(input);
    let columns = locate_columns(reader.headers()?, options)?;

    let output = File::create(jsonl_path)
        .map_err(|source| TrainingError::WritePath { path: jsonl_path.to_path_buf(), source })?;
    let mut writer = LineWriter::new(output);

    let stats = write_records(&mut reader, columns, &mut writer, options)?;
    writer
        .flush()
        .map_err(|source| TrainingError::WritePath { path: jsonl_path.to_path_buf(), source })?;

    info!(
        input = %csv_path.display(),
        output = %jsonl_path.display(),
        records = stats.records_written,
        skipped = stats.rows_skipped,
        "Converted CSV to chat JSONL"
    );
    Ok(stats)
}

/// Convert from any reader into any writer.
pub fn convert_stream<R: Read, W: Write>(
    input: R,
    output: &mut W,
    options: &ConvertOptions,
) -> TrainingResult<ConvertStats> {
    let mut reader = csv_reader(input);
    let columns = locate_columns(reader.headers()?, options)?;
    let stats = write_records(&mut reader, columns, output, options)?;
    output.flush()?;
    Ok(stats)
}

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    // Short rows are reported per column below rather than as a generic
    // length mismatch.
    csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(input)
}

fn locate_columns(headers: &StringRecord, options: &ConvertOptions) -> TrainingResult<Columns> {
    let find = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == column)
            .ok_or_else(|| TrainingError::MissingColumn { column: column.to_string() })
    };

    Ok(Columns { instruction: find(&options.instruction_column)?, response: find(&options.response_column)? })
}

fn write_records<R: Read, W: Write>(
    reader: &mut csv::Reader<R>,
    columns: Columns,
    output: &mut W,
    options: &ConvertOptions,
) -> TrainingResult<ConvertStats> {
    let mut stats = ConvertStats::default();
    let mut row = StringRecord::new();

    while reader.read_record(&mut row)? {
        let line = row.position().map_or(0, csv::Position::line);
        let fields = (row.get(columns.instruction), row.get(columns.response));

        let (instruction, response) = match fields {
            (Some(instruction), Some(response)) => (instruction, response),
            (instruction, _) => {
                let column = if instruction.is_none() { &options.instruction_column } else { &options.response_column };
                if options.lenient {
                    warn!(line, column = %column, "Skipping CSV row with missing field");
                    stats.rows_skipped += 1;
                    continue;
                }
                return Err(TrainingError::MissingField { line, column: column.clone() });
            }
        };

        let record = ChatRecord::single_turn(&options.system_prompt, instruction, response);
        serde_json::to_writer(&mut *output, &record)?;
        output.write_all(b"\n")?;
        stats.records_written += 1;
    }

    Ok(stats)
}
