use crate::errors::EvidenceReadingError;
use indexmap::IndexMap;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub seqid: String,
    pub description: String,
    pub sequence: String,
}

/// Streams `>seqid description` records.
///
/// Only the first word of each sequence line is kept, lines before the first
/// header are ignored.
pub struct FastaReader<R: BufRead> {
    lines: std::io::Lines<R>,
    pending: Option<FastaRecord>,
    done: bool,
}

impl FastaReader<BufReader<std::fs::File>> {
    pub fn from_path(path: &Path) -> Result<Self, EvidenceReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| EvidenceReadingError::io_at(e, path))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            lines: inner.lines(),
            pending: None,
            done: false,
        }
    }
}

fn parse_header(line: &str) -> FastaRecord {
    let header = line.trim_start_matches('>');
    let (seqid, description) = match header.split_once(char::is_whitespace) {
        Some((seqid, rest)) => (seqid, rest.trim()),
        None => (header.trim_end(), ""),
    };
    FastaRecord {
        seqid: seqid.to_string(),
        description: description.to_string(),
        sequence: String::new(),
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord, EvidenceReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if line.starts_with('>') {
                        let next = parse_header(&line);
                        if let Some(record) = self.pending.replace(next) {
                            return Some(Ok(record));
                        }
                    } else if let Some(record) = self.pending.as_mut() {
                        if let Some(word) = line.split_whitespace().next() {
                            record.sequence.push_str(word);
                        }
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    return self.pending.take().map(Ok);
                }
            }
        }
    }
}

/// Reference sequences by seqid, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FastaCatalog {
    records: IndexMap<String, FastaRecord>,
}

impl FastaCatalog {
    pub fn read<R: BufRead>(reader: FastaReader<R>) -> Result<Self, EvidenceReadingError> {
        let mut records = IndexMap::new();
        for record in reader {
            let record = record?;
            if records.contains_key(&record.seqid) {
                debug!("Duplicate FASTA entry {}, keeping the first", record.seqid);
                continue;
            }
            records.insert(record.seqid.clone(), record);
        }
        Ok(Self { records })
    }

    pub fn from_path(path: &Path) -> Result<Self, EvidenceReadingError> {
        let out = Self::read(FastaReader::from_path(path)?)?;
        info!("Read {} sequences from {}", out.len(), path.display());
        Ok(out)
    }

    pub fn get(&self, seqid: &str) -> Option<&FastaRecord> {
        self.records.get(seqid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrites every seqid with `f`. On collisions the first record wins.
    pub fn rename(self, f: impl Fn(&str) -> String) -> Self {
        let mut records = IndexMap::with_capacity(self.records.len());
        for (_, mut record) in self.records {
            record.seqid = f(&record.seqid);
            if records.contains_key(&record.seqid) {
                warn!("FASTA seqid {} is ambiguous after renaming", record.seqid);
                continue;
            }
            records.insert(record.seqid.clone(), record);
        }
        Self { records }
    }
}

impl FromIterator<FastaRecord> for FastaCatalog {
    fn from_iter<T: IntoIterator<Item = FastaRecord>>(iter: T) -> Self {
        let mut records = IndexMap::new();
        for record in iter {
            records.entry(record.seqid.clone()).or_insert(record);
        }
        Self { records }
    }
}
