// src/solution_set.rs

use std::collections::HashSet;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{debug, info};

use crate::catchment::CatchmentModel;
use crate::codec::{self, ActionStates};
use crate::error::CompositeError;
use crate::pool::{AS_IS, SCRATCHPAD};

pub const LABEL_COLUMN: &str = "Solution";
pub const ACTIONS_COLUMN: &str = "Actions";
pub const SUMMARY_COLUMN: &str = "Summary";

// Relative tolerance when checking the As-Is row, so that values rendered
// with limited precision still match.
const VALUE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum SolutionSetError {
    #[error("unable to read solution set: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Invalid(#[from] CompositeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolutionSetRow {
    pub label: String,
    pub values: Vec<f64>,
    pub actions: String,
    pub summary: String,
}

/// A validated table of candidate solutions for the loaded scenario.
#[derive(Debug, Clone)]
pub struct SolutionSet {
    rows: Vec<SolutionSetRow>,
    raw: String,
}

impl SolutionSet {
    /// Validates `text` against the As-Is model and indexes its rows. Nothing
    /// is kept unless every header and cell passes.
    pub fn ingest(text: &str, as_is: &CatchmentModel) -> Result<Self, SolutionSetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let variables: Vec<String> =
            as_is.decision_variable_names().into_iter().map(str::to_string).collect();
        let headers = reader.headers()?.clone();
        check_headers(&headers, &variables)?;

        let mut errors = CompositeError::new("invalid solution set");
        let actions_at = variables.len() + 1;
        let expected_values: Vec<f64> = as_is.decision_variables().iter().map(|v| v.value).collect();
        let mut labels = HashSet::new();
        let mut rows = Vec::new();
        let mut as_is_seen = false;

        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let row = index + 1;
            if record.len() != headers.len() {
                errors.add(format!(
                    "row {row}: expected {} fields, found {}",
                    headers.len(),
                    record.len()
                ));
                continue;
            }

            let label = record.get(0).unwrap_or_default().to_string();
            if label.is_empty() {
                errors.add(format!("row {row}: [{LABEL_COLUMN}] is empty"));
            } else if label == SCRATCHPAD {
                errors.add(format!("row {row}: [{SCRATCHPAD}] is reserved and cannot be a solution label"));
            } else if !labels.insert(label.clone()) {
                errors.add(format!("row {row}: duplicate label [{label}]"));
            }

            let mut values = Vec::with_capacity(variables.len());
            for (offset, variable) in variables.iter().enumerate() {
                let cell = record.get(offset + 1).unwrap_or_default();
                match cell.parse::<f64>() {
                    Ok(value) => values.push(value),
                    Err(_) => errors.add(format!(
                        "row {row} column [{variable}]: [{cell}] is not a number"
                    )),
                }
            }

            let actions = record.get(actions_at).unwrap_or_default().to_string();
            if actions.is_empty() || !codec::is_token_shaped(&actions) {
                errors.add(format!(
                    "row {row} column [{ACTIONS_COLUMN}]: [{actions}] is not an action encoding"
                ));
            } else if let Err(err) = codec::decode_flags(&actions, as_is.action_count()) {
                errors.add(format!("row {row} column [{ACTIONS_COLUMN}]: [{actions}] {err}"));
            }

            let summary = record.get(actions_at + 1).unwrap_or_default().to_string();

            if label == AS_IS {
                as_is_seen = true;
                if values.len() == expected_values.len() {
                    for ((variable, found), expected) in
                        variables.iter().zip(&values).zip(&expected_values)
                    {
                        if !same_value(*found, *expected) {
                            errors.add(format!(
                                "row {row} column [{variable}]: As-Is value {found} does not match scenario value {expected}"
                            ));
                        }
                    }
                }
            }

            rows.push(SolutionSetRow { label, values, actions, summary });
        }

        if !as_is_seen {
            errors.add(format!("no [{AS_IS}] row to check against the scenario"));
        }
        errors.into_result()?;

        info!(rows = rows.len(), "solution set ingested");
        Ok(Self { rows, raw: text.to_string() })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.rows.iter().any(|row| row.label == label)
    }

    pub fn lookup(&self, label: &str) -> Option<&SolutionSetRow> {
        self.rows.iter().find(|row| row.label == label)
    }

    /// Label of the first row whose actions column matches `token`, if any.
    pub fn encoding_found_in_front(&self, token: &str) -> Option<&str> {
        match self.rows.iter().find(|row| row.actions.eq_ignore_ascii_case(token)) {
            Some(row) => {
                info!(token, solution = %row.label, "encoding found in solution set");
                Some(row.label.as_str())
            }
            None => {
                debug!(token, "encoding not found in solution set");
                None
            }
        }
    }

    pub fn rows(&self) -> &[SolutionSetRow] {
        &self.rows
    }

    /// The table exactly as it was posted.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

fn check_headers(headers: &StringRecord, variables: &[String]) -> Result<(), CompositeError> {
    let expected: Vec<&str> = std::iter::once(LABEL_COLUMN)
        .chain(variables.iter().map(String::as_str))
        .chain([ACTIONS_COLUMN, SUMMARY_COLUMN])
        .collect();

    let mut errors = CompositeError::new("invalid solution set header");
    if headers.len() != expected.len() {
        errors.add(format!(
            "expected {} columns [{}], found {}",
            expected.len(),
            expected.join(", "),
            headers.len()
        ));
    }
    for (column, (found, wanted)) in headers.iter().zip(&expected).enumerate() {
        if found != *wanted {
            errors.add(format!("column {}: expected [{wanted}], found [{found}]", column + 1));
        }
    }
    errors.into_result()
}

fn same_value(found: f64, expected: f64) -> bool {
    (found - expected).abs() <= VALUE_TOLERANCE * expected.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{reference_model, SOLUTION_SET_CSV};

    fn composite(result: Result<SolutionSet, SolutionSetError>) -> CompositeError {
        match result {
            Err(SolutionSetError::Invalid(composite)) => composite,
            other => panic!("expected a composite error, got {other:?}"),
        }
    }

    #[test]
    fn ingests_a_consistent_table() {
        let set = SolutionSet::ingest(SOLUTION_SET_CSV, &reference_model()).unwrap();

        assert_eq!(set.rows().len(), 3);
        assert!(set.contains("Front-1"));
        assert!(!set.contains("Front-9"));
        let row = set.lookup("Front-2").unwrap();
        assert_eq!(row.actions, "A3");
        assert_eq!(row.summary, "Adds hill slope at 12");
        assert_eq!(set.raw(), SOLUTION_SET_CSV);
    }

    #[test]
    fn front_membership_ignores_case() {
        let set = SolutionSet::ingest(SOLUTION_SET_CSV, &reference_model()).unwrap();

        assert_eq!(set.encoding_found_in_front("A1"), Some("Front-1"));
        assert_eq!(set.encoding_found_in_front("a3"), Some("Front-2"));
        assert_eq!(set.encoding_found_in_front("FF"), None);
    }

    #[test]
    fn one_mismatched_as_is_cell_rejects_the_table() {
        let text = SOLUTION_SET_CSV.replace("As-Is,1000,0", "As-Is,1000,1");
        let errors = composite(SolutionSet::ingest(&text, &reference_model()));

        assert_eq!(errors.errors().len(), 1);
        assert!(errors.errors()[0].contains("ImplementationCost"));
    }

    #[test]
    fn every_bad_cell_is_reported() {
        let text = "\
Solution,SedimentLoad,ImplementationCost,Actions,Summary
As-Is,1000,0,80,baseline
Broken,lots,none,A1,x
Odd,1,2,ZZ,y
Scratchpad,1,2,A1,z
";
        let errors = composite(SolutionSet::ingest(text, &reference_model()));

        assert_eq!(errors.errors().len(), 4);
        assert!(errors.errors()[0].contains("[lots]"));
        assert!(errors.errors()[1].contains("[none]"));
        assert!(errors.errors()[2].contains("[ZZ]"));
        assert!(errors.errors()[3].contains("reserved"));
    }

    #[test]
    fn tokens_must_fit_the_model() {
        let text = SOLUTION_SET_CSV.replace("A3", "1A3");
        let errors = composite(SolutionSet::ingest(&text, &reference_model()));
        assert_eq!(errors.errors().len(), 1);
    }

    #[test]
    fn header_must_name_every_column() {
        let text = "Solution,Sediment,ImplementationCost,Actions\nAs-Is,1000,0,80\n";
        let errors = composite(SolutionSet::ingest(text, &reference_model()));

        assert_eq!(errors.errors().len(), 2);
        assert!(errors.to_string().contains("expected [SedimentLoad], found [Sediment]"));
    }

    #[test]
    fn as_is_row_is_required() {
        let text = "Solution,SedimentLoad,ImplementationCost,Actions,Summary\nFront-1,870,40000,A1,x\n";
        let errors = composite(SolutionSet::ingest(text, &reference_model()));
        assert!(errors.to_string().contains("As-Is"));
    }

    #[test]
    fn every_ragged_row_is_reported() {
        let text = "\
Solution,SedimentLoad,ImplementationCost,Actions,Summary
As-Is,1000,0,80,baseline
Short,870,40000
Long,840,48000,A3,x,extra
";
        let errors = composite(SolutionSet::ingest(text, &reference_model()));

        assert_eq!(errors.errors().len(), 2);
        assert_eq!(errors.errors()[0], "row 2: expected 5 fields, found 3");
        assert_eq!(errors.errors()[1], "row 3: expected 5 fields, found 6");
    }
}
