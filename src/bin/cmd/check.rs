// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Check command - read a whole dataset and report whether it is intact.

use std::fmt;

use clap::Args;

use crate::common::Result;
use sdds::{DatasetConfig, ReadOutcome, ReaderBuilder, SddsError, Target};

/// Read every page and print ok, nonexistent, badHeader or corrupted.
#[derive(Args, Clone, Debug)]
pub struct CheckCmd {
    /// Input file, or - for stdin
    #[arg(value_name = "FILE")]
    input: String,

    /// Write the diagnostic to stderr
    #[arg(long)]
    print_errors: bool,
}

/// Outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Nonexistent,
    BadHeader,
    Corrupted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "ok",
            Status::Nonexistent => "nonexistent",
            Status::BadHeader => "badHeader",
            Status::Corrupted => "corrupted",
        })
    }
}

impl CheckCmd {
    pub fn run(self, config: DatasetConfig) -> Result<()> {
        let (status, error) = check(&Target::parse(&self.input), config.with_recover(false));
        if self.print_errors {
            if let Some(error) = error {
                eprintln!("{}: {error}", self.input);
            }
        }
        println!("{status}");
        Ok(())
    }
}

fn check(target: &Target, config: DatasetConfig) -> (Status, Option<SddsError>) {
    if target.path().is_some_and(|path| !path.exists()) {
        return (Status::Nonexistent, None);
    }
    let mut reader = match ReaderBuilder::new().target(target.clone()).config(config).build() {
        Ok(reader) => reader,
        Err(e @ SddsError::ChannelOpen { .. }) => return (Status::Nonexistent, Some(e)),
        Err(e) if e.is_header_error() => return (Status::BadHeader, Some(e)),
        Err(e) => return (Status::Corrupted, Some(e)),
    };
    loop {
        match reader.read_next_page() {
            Ok(ReadOutcome::End) => return (Status::Ok, None),
            Ok(_) => {}
            Err(e) => return (Status::Corrupted, Some(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(Status::Ok.to_string(), "ok");
        assert_eq!(Status::BadHeader.to_string(), "badHeader");
    }

    #[test]
    fn test_check_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Target::from(dir.path().join("missing.sdds"));
        assert_eq!(check(&missing, DatasetConfig::default()).0, Status::Nonexistent);

        let bad = dir.path().join("bad.sdds");
        std::fs::write(&bad, "not a dataset\n").unwrap();
        assert_eq!(check(&Target::from(&bad), DatasetConfig::default()).0, Status::BadHeader);

        let good = dir.path().join("good.sdds");
        std::fs::write(
            &good,
            "SDDS1\n&column name=x, type=long, &end\n&data mode=ascii, &end\n2\n1\n2\n",
        )
        .unwrap();
        assert_eq!(check(&Target::from(&good), DatasetConfig::default()).0, Status::Ok);

        let cut = dir.path().join("cut.sdds");
        std::fs::write(
            &cut,
            "SDDS1\n&column name=x, type=long, &end\n&data mode=ascii, &end\n3\n1\n2\n",
        )
        .unwrap();
        let (status, error) = check(&Target::from(&cut), DatasetConfig::default());
        assert_eq!(status, Status::Corrupted);
        assert!(error.unwrap().is_data_format());
    }
}
