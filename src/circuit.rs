/*
 * This file is part of Valvemon.
 *
 * Copyright (C) 2025 Valvemon contributors
 *
 * Valvemon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Valvemon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Valvemon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Table-driven behavioural model loaded from the chassis file
//!
//! The chassis file lists the test points and a truth table. A row fires when
//! every input it names matches the vector; each output it names is then expected
//! to hold the listed value. The first firing row decides.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::load_document;
use crate::constants::limits;
use crate::error::{Result, ValvemonError};
use crate::model::{BehaviouralModel, TestPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitDocument {
    pub test_points: Vec<TestPoint>,
    #[serde(default)]
    pub truth_table: Vec<TruthRowDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TruthRowDocument {
    pub inputs: BTreeMap<String, u8>,
    pub outputs: BTreeMap<String, u8>,
}

/// A truth table row resolved to test point indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruthRow {
    pub inputs: Vec<(usize, u8)>,
    pub outputs: Vec<(usize, u8)>,
}

impl TruthRow {
    fn fires(&self, vector: &[u8]) -> bool {
        self.inputs
            .iter()
            .all(|&(index, bit)| vector.get(index) == Some(&bit))
    }
}

#[derive(Debug, Clone)]
pub struct CircuitModel {
    test_points: Vec<TestPoint>,
    by_name: HashMap<String, usize>,
    rows: Vec<TruthRow>,
    n_inputs: usize,
}

fn is_valid_tp_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= limits::MAX_TP_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl CircuitModel {
    pub fn load(path: &Path) -> Result<Self> {
        let doc: CircuitDocument = load_document(path)?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: CircuitDocument) -> Result<Self> {
        if doc.test_points.is_empty() {
            return Err(ValvemonError::config("chassis defines no test points"));
        }

        let mut by_name = HashMap::with_capacity(doc.test_points.len());
        for (index, tp) in doc.test_points.iter().enumerate() {
            if !is_valid_tp_name(&tp.name) {
                return Err(ValvemonError::config(format!(
                    "test point {} has an invalid name {:?}",
                    index, tp.name
                )));
            }
            if !(tp.min.is_finite() && tp.max.is_finite()) || tp.min > tp.max {
                return Err(ValvemonError::config(format!(
                    "test point {} has an invalid threshold range [{}, {}]",
                    tp.name, tp.min, tp.max
                )));
            }
            if by_name.insert(tp.name.clone(), index).is_some() {
                return Err(ValvemonError::config(format!(
                    "test point {} is defined twice",
                    tp.name
                )));
            }
        }

        let mut rows = Vec::with_capacity(doc.truth_table.len());
        for (row_index, row) in doc.truth_table.iter().enumerate() {
            let resolve = |name: &str, bit: u8, want_input: bool| -> Result<(usize, u8)> {
                let index = *by_name.get(name).ok_or_else(|| {
                    ValvemonError::config(format!(
                        "truth table row {} refers to unknown test point {}",
                        row_index, name
                    ))
                })?;
                if doc.test_points[index].input != want_input {
                    return Err(ValvemonError::config(format!(
                        "truth table row {} uses {} as an {} but it is declared as an {}",
                        row_index,
                        name,
                        if want_input { "input" } else { "output" },
                        if want_input { "output" } else { "input" },
                    )));
                }
                if bit > 1 {
                    return Err(ValvemonError::config(format!(
                        "truth table row {} gives {} the non-bit value {}",
                        row_index, name, bit
                    )));
                }
                Ok((index, bit))
            };

            let inputs = row
                .inputs
                .iter()
                .map(|(name, &bit)| resolve(name.as_str(), bit, true))
                .collect::<Result<Vec<_>>>()?;
            let outputs = row
                .outputs
                .iter()
                .map(|(name, &bit)| resolve(name.as_str(), bit, false))
                .collect::<Result<Vec<_>>>()?;
            rows.push(TruthRow { inputs, outputs });
        }

        let n_inputs = doc.test_points.iter().filter(|tp| tp.input).count();
        Ok(Self {
            test_points: doc.test_points,
            by_name,
            rows,
            n_inputs,
        })
    }

    pub fn test_points(&self) -> &[TestPoint] {
        &self.test_points
    }

    pub fn rows(&self) -> &[TruthRow] {
        &self.rows
    }
}

impl BehaviouralModel for CircuitModel {
    fn tp_count(&self) -> usize {
        self.test_points.len()
    }

    fn input_count(&self) -> usize {
        self.n_inputs
    }

    fn test_point(&self, index: usize) -> Option<&TestPoint> {
        self.test_points.get(index)
    }

    fn tp_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    fn check(&self, vector: &[u8], errors: &mut Vec<usize>) {
        errors.clear();
        if let Some(row) = self.rows.iter().find(|row| row.fires(vector)) {
            errors.extend(
                row.outputs
                    .iter()
                    .filter(|&&(index, bit)| vector.get(index) != Some(&bit))
                    .map(|&(index, _)| index),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tp, two_tp_circuit};

    #[test]
    fn test_counts_and_lookup() {
        let model = two_tp_circuit();
        assert_eq!(model.tp_count(), 2);
        assert_eq!(model.input_count(), 1);
        assert_eq!(model.tp_index("X1"), Some(0));
        assert_eq!(model.tp_index("X2"), Some(1));
        assert_eq!(model.tp_index("X3"), None);
        assert_eq!(model.test_point(1).unwrap().valve, 7);
    }

    #[test]
    fn test_check_reports_mismatched_outputs() {
        let model = two_tp_circuit();
        let mut errors = vec![99];
        model.check(&[1, 0], &mut errors);
        assert!(errors.is_empty());
        model.check(&[1, 1], &mut errors);
        assert_eq!(errors, vec![1]);
        model.check(&[0, 1], &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_no_matching_row_means_no_errors() {
        let doc = CircuitDocument {
            test_points: vec![tp("A", 1, true), tp("B", 2, false)],
            truth_table: vec![TruthRowDocument {
                inputs: BTreeMap::from([("A".to_string(), 1)]),
                outputs: BTreeMap::from([("B".to_string(), 1)]),
            }],
        };
        let model = CircuitModel::from_document(doc).unwrap();
        let mut errors = Vec::new();
        model.check(&[0, 0], &mut errors);
        assert!(errors.is_empty());
        model.check(&[1, 0], &mut errors);
        assert_eq!(errors, vec![1]);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let doc = CircuitDocument {
            test_points: vec![tp("A", 1, true), tp("A", 2, false)],
            truth_table: vec![],
        };
        assert!(CircuitModel::from_document(doc).is_err());
    }

    #[test]
    fn test_rejects_bad_names_and_ranges() {
        let doc = CircuitDocument {
            test_points: vec![tp("has space", 1, true)],
            truth_table: vec![],
        };
        assert!(CircuitModel::from_document(doc).is_err());

        let mut inverted = tp("A", 1, true);
        inverted.min = 3.0;
        inverted.max = 1.0;
        let doc = CircuitDocument {
            test_points: vec![inverted],
            truth_table: vec![],
        };
        assert!(CircuitModel::from_document(doc).is_err());
    }

    #[test]
    fn test_rejects_empty_chassis() {
        let doc = CircuitDocument {
            test_points: vec![],
            truth_table: vec![],
        };
        assert!(CircuitModel::from_document(doc).is_err());
    }

    #[test]
    fn test_rejects_role_confusion_and_non_bits() {
        let points = vec![tp("A", 1, true), tp("B", 2, false)];
        let output_as_input = CircuitDocument {
            test_points: points.clone(),
            truth_table: vec![TruthRowDocument {
                inputs: BTreeMap::from([("B".to_string(), 1)]),
                outputs: BTreeMap::new(),
            }],
        };
        assert!(CircuitModel::from_document(output_as_input).is_err());

        let non_bit = CircuitDocument {
            test_points: points.clone(),
            truth_table: vec![TruthRowDocument {
                inputs: BTreeMap::from([("A".to_string(), 2)]),
                outputs: BTreeMap::new(),
            }],
        };
        assert!(CircuitModel::from_document(non_bit).is_err());

        let unknown = CircuitDocument {
            test_points: points,
            truth_table: vec![TruthRowDocument {
                inputs: BTreeMap::new(),
                outputs: BTreeMap::from([("Z".to_string(), 0)]),
            }],
        };
        assert!(CircuitModel::from_document(unknown).is_err());
    }

    #[test]
    fn test_document_from_json() {
        let json = r#"{
            "test_points": [
                {"name": "X1", "valve": 3, "min": 0.0, "max": 5.0, "input": true},
                {"name": "X2", "valve": 7, "min": 0.0, "max": 5.0}
            ],
            "truth_table": [
                {"inputs": {"X1": 1}, "outputs": {"X2": 0}}
            ]
        }"#;
        let doc: CircuitDocument = serde_json::from_str(json).unwrap();
        let model = CircuitModel::from_document(doc).unwrap();
        assert_eq!(model.rows().len(), 1);
        assert!(!model.test_point(1).unwrap().input);
    }
}
