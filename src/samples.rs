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

//! Replay files
//!
//! A replay file stands in for the hardware. The first line names one test
//! point per column; every following line holds one `0`/`1` per column:
//!
//! ```text
//! X1,X2,
//! 1,0,
//! 0,1,
//! ```
//!
//! Fields are separated by single commas and may be padded with spaces or tabs.
//! A comma after the last field is optional. Lines end in `\n` or `\r\n`; blank
//! lines are ignored. Line numbers in errors count physical lines from 1.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::check_file;
use crate::constants::limits;
use crate::error::{Result, ValvemonError};
use crate::model::{BehaviouralModel, TpVector};
use crate::sampler::TpSource;

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

fn describe(b: Option<u8>) -> String {
    match b {
        None => "end of file".to_string(),
        Some(c) if is_newline(c) => "newline".to_string(),
        Some(c) if c.is_ascii_graphic() || c == b' ' => format!("{:?}", c as char),
        Some(c) => format!("byte 0x{:02x}", c),
    }
}

/// Byte cursor that knows which physical line it is on
struct Scanner<'a> {
    path: &'a Path,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        Self {
            path,
            bytes,
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, reason: impl Into<String>) -> ValvemonError {
        ValvemonError::replay(self.path, self.line, reason)
    }

    fn at_eol(&self) -> bool {
        self.peek().map_or(true, is_newline)
    }

    fn skip_blanks(&mut self) {
        while self.peek().is_some_and(is_blank) {
            self.bump();
        }
    }

    /// Consume one line terminator if present
    fn end_line(&mut self) {
        match self.peek() {
            Some(b'\r') => {
                self.bump();
                if self.peek() == Some(b'\n') {
                    self.bump();
                }
                self.line += 1;
            }
            Some(b'\n') => {
                self.bump();
                self.line += 1;
            }
            _ => {}
        }
    }

    /// Step over lines holding nothing but blanks
    fn skip_empty_lines(&mut self) {
        loop {
            let start = self.pos;
            self.skip_blanks();
            match self.peek() {
                Some(b) if is_newline(b) => self.end_line(),
                None => return,
                Some(_) => {
                    self.pos = start;
                    return;
                }
            }
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_name_byte) {
            self.bump();
        }
        let bytes: &'a [u8] = self.bytes;
        // Name bytes are ASCII
        std::str::from_utf8(&bytes[start..self.pos]).unwrap_or_default()
    }

    fn read_bit(&mut self) -> Result<u8> {
        match self.peek() {
            Some(b'0') => {
                self.bump();
                Ok(0)
            }
            Some(b'1') => {
                self.bump();
                Ok(1)
            }
            other => Err(self.error(format!("{} is not a valid bit", describe(other)))),
        }
    }

    fn start_field(&mut self, column: usize, columns: usize) -> Result<()> {
        self.skip_blanks();
        if self.at_eol() {
            return Err(self.error(format!(
                "line ended early: {} columns expected, found {}",
                columns, column
            )));
        }
        Ok(())
    }

    /// Consume the separator after field `column`. After the last field that is an
    /// optional comma and the end of the line.
    fn finish_field(&mut self, column: usize, columns: usize) -> Result<()> {
        self.skip_blanks();
        if column + 1 < columns {
            return match self.peek() {
                Some(b',') => {
                    self.bump();
                    Ok(())
                }
                _ if self.at_eol() => Err(self.error(format!(
                    "line ended early: {} columns expected, found {}",
                    columns,
                    column + 1
                ))),
                other => Err(self.error(format!("expected ',' but found {}", describe(other)))),
            };
        }

        let had_comma = self.peek() == Some(b',');
        if had_comma {
            self.bump();
            self.skip_blanks();
        }
        if !self.at_eol() {
            let found = if had_comma {
                "','".to_string()
            } else {
                describe(self.peek())
            };
            return Err(self.error(format!("expected newline but found {}", found)));
        }
        self.end_line();
        Ok(())
    }
}

/// Parsed replay file with a forward-only cursor
#[derive(Debug, Clone)]
pub struct SampleFileSource {
    path: PathBuf,
    records: Vec<TpVector>,
    /// `None` until the first advance
    cursor: Option<usize>,
}

impl SampleFileSource {
    pub fn from_file(path: &Path, model: &dyn BehaviouralModel) -> Result<Self> {
        check_file(path, limits::MAX_REPLAY_FILE_SIZE)?;
        let data = fs::read(path).map_err(|source| ValvemonError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::parse(path, &data, model)?;
        info!(
            "Loaded {} samples from {}",
            source.len(),
            path.display()
        );
        Ok(source)
    }

    /// Parse replay data. `path` is only used to label errors.
    pub fn parse(path: &Path, data: &[u8], model: &dyn BehaviouralModel) -> Result<Self> {
        let columns = model.tp_count();
        let mut sc = Scanner::new(path, data);
        if columns == 0 {
            return Err(sc.error("the chassis has no test points to replay"));
        }

        // Header: file column -> test point index
        let mut order: Vec<usize> = Vec::with_capacity(columns);
        for column in 0..columns {
            sc.start_field(column, columns)?;
            let name = sc.read_name();
            if name.is_empty() {
                return Err(sc.error(format!(
                    "name {} is empty (found {})",
                    column,
                    describe(sc.peek())
                )));
            }
            let index = model
                .tp_index(name)
                .ok_or_else(|| sc.error(format!("{:?} is not a known test point", name)))?;
            if let Some(first) = order.iter().position(|&i| i == index) {
                return Err(sc.error(format!(
                    "{:?} is repeated (columns {} and {})",
                    name, first, column
                )));
            }
            order.push(index);
            sc.finish_field(column, columns)?;
        }

        let mut records = Vec::new();
        loop {
            sc.skip_empty_lines();
            if sc.peek().is_none() {
                break;
            }
            let mut record = vec![0u8; columns];
            for (column, &tp_index) in order.iter().enumerate() {
                sc.start_field(column, columns)?;
                record[tp_index] = sc.read_bit()?;
                sc.finish_field(column, columns)?;
            }
            records.push(record);
        }

        Ok(Self {
            path: path.to_path_buf(),
            records,
            cursor: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Move to the next record. Returns `false` once past the last one, and keeps
    /// returning `false` after that.
    pub fn advance(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.records.len() {
            self.cursor = Some(self.records.len());
            return false;
        }
        self.cursor = Some(next);
        true
    }

    /// The record under the cursor, in test point order
    pub fn current(&self) -> Option<&[u8]> {
        self.cursor
            .and_then(|c| self.records.get(c))
            .map(|r| r.as_slice())
    }
}

impl TpSource for SampleFileSource {
    fn next_vector(&mut self, dest: &mut [u8]) -> Result<bool> {
        if !self.advance() {
            return Ok(false);
        }
        if let Some(record) = self.current() {
            for (slot, &bit) in dest.iter_mut().zip(record) {
                *slot = bit;
            }
        }
        Ok(true)
    }
}
