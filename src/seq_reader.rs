use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Error};

use tracing::debug;

/// Line that stands for a missing element.
pub const MISSING_MARKER: &str = "NA";

/// A loaded sequence: `None` is a missing element.
pub type SymbolSequence = Option<Vec<u32>>;

/// Turns one line into a sequence of Unicode codepoints.
pub fn parse_line(line: &str) -> SymbolSequence {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line == MISSING_MARKER {
        return None;
    }
    Some(line.chars().map(u32::from).collect())
}

fn read_sequences(reader: impl BufRead, origin: &str) -> Result<Vec<SymbolSequence>, Error> {
    let mut sequences = Vec::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(|e| Error::new(e.kind(), format!("Error reading line from '{}': {}", origin, e)))?;
        sequences.push(parse_line(&line));
    }
    Ok(sequences)
}

/// Loads one sequence per line (gunzipped if path ends with .gz).
pub fn load_sequences(path: &str) -> Result<Vec<SymbolSequence>, Error> {
    let file = File::open(path)
        .map_err(|e| Error::new(e.kind(), format!("Failed to open sequence file '{}': {}", path, e)))?;

    let reader: Box<dyn BufRead> = if path.ends_with(".gz") {
        debug!(path, "reading gzipped sequence file");
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let sequences = read_sequences(reader, path)?;
    debug!(path, count = sequences.len(), "loaded sequences");
    Ok(sequences)
}

/// In-memory counterpart of [`load_sequences`].
pub fn parse_sequences_from_bytes(content: &[u8], is_gzipped: bool) -> Result<Vec<SymbolSequence>, Error> {
    let reader: Box<dyn BufRead + '_> = if is_gzipped {
        Box::new(BufReader::new(GzDecoder::new(content)))
    } else {
        Box::new(BufReader::new(content))
    };
    read_sequences(reader, "<memory>")
}
