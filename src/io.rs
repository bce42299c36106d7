use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use polars::prelude::*;
use tempfile::NamedTempFile;

/// Line-level preamble handling applied before a table is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableFormat {
    pub skip_lines: usize,
    pub comment_prefix: Option<char>,
}

impl TableFormat {
    pub fn commented() -> Self {
        Self {
            skip_lines: 0,
            comment_prefix: Some('#'),
        }
    }

    /// Score tables that carry a fixed-size banner above the header row.
    pub fn banner(lines: usize) -> Self {
        Self {
            skip_lines: lines,
            comment_prefix: None,
        }
    }

    fn is_plain(&self) -> bool {
        self.skip_lines == 0 && self.comment_prefix.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Plain,
    Gzip,
    Bzip2,
}

impl Codec {
    fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "gz" | "bgz" => Codec::Gzip,
            "bz2" => Codec::Bzip2,
            _ => Codec::Plain,
        }
    }
}

pub fn read_table(path: &Path) -> Result<DataFrame> {
    read_table_with(path, TableFormat::default())
}

/// Reads a delimited table with every column as String. Numeric columns are
/// cast explicitly by the caller, so inference never turns values into nulls.
pub fn read_table_with(path: &Path, format: TableFormat) -> Result<DataFrame> {
    let codec = Codec::from_path(path);
    if codec == Codec::Plain && format.is_plain() {
        return read_table_plain(path);
    }
    let staged = stage_table(path, codec, format)?;
    read_table_plain(staged.path()).with_context(|| format!("read {}", path.display()))
}

fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))?;
    trim_string_columns(df)
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if !first.contains('\t') && first.contains(',') {
        return Ok(b',');
    }
    Ok(b'\t')
}

fn open_decoded(path: &Path, codec: Codec) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader: Box<dyn Read> = match codec {
        Codec::Gzip => Box::new(MultiGzDecoder::new(file)),
        Codec::Bzip2 => Box::new(BzDecoder::new(file)),
        Codec::Plain => Box::new(file),
    };
    Ok(reader)
}

fn stage_table(path: &Path, codec: Codec, format: TableFormat) -> Result<NamedTempFile> {
    let mut decoder = open_decoded(path, codec)?;
    let mut tmp = NamedTempFile::new()?;
    if format.is_plain() {
        std::io::copy(&mut decoder, &mut tmp)
            .with_context(|| format!("decompress {}", path.display()))?;
        return Ok(tmp);
    }

    let reader = BufReader::new(decoder);
    let mut writer = BufWriter::new(tmp.as_file_mut());
    for line in reader.lines().skip(format.skip_lines) {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if let Some(prefix) = format.comment_prefix
            && line.starts_with(prefix)
        {
            continue;
        }
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    drop(writer);
    Ok(tmp)
}

fn trim_series(series: &Series) -> Result<Series> {
    let utf8 = series.str()?;
    let trimmed = utf8
        .apply(|v| v.map(|s| Cow::Owned(s.trim().to_string())))
        .into_series();
    Ok(trimmed)
}

fn trim_string_columns(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if let Ok(column) = df.column(&name)
            && column.dtype() == &DataType::String
        {
            let mut trimmed = trim_series(column.as_materialized_series())?;
            trimmed.rename(name.as_str().into());
            df.with_column(trimmed)?;
        }
    }
    Ok(df)
}

/// Writes a tab-separated table; `.gz` paths are gzip-compressed.
pub fn write_dataframe(df: &DataFrame, path: &Path) -> Result<()> {
    write_tsv(df, path, Codec::from_path(path) == Codec::Gzip)
}

/// Writes a gzip-compressed tab-separated table whatever the file name.
pub fn write_dataframe_gz(df: &DataFrame, path: &Path) -> Result<()> {
    write_tsv(df, path, true)
}

fn write_tsv(df: &DataFrame, path: &Path, gzip: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut df = df.clone();
    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        CsvWriter::new(&mut encoder)
            .with_separator(b'\t')
            .finish(&mut df)
            .with_context(|| format!("write {}", path.display()))?;
        encoder.finish()?;
    } else {
        let mut writer = BufWriter::new(file);
        CsvWriter::new(&mut writer)
            .with_separator(b'\t')
            .finish(&mut df)
            .with_context(|| format!("write {}", path.display()))?;
        writer.flush()?;
    }
    Ok(())
}

pub fn write_vector<T: std::fmt::Display>(vec: &[T], path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    for v in vec {
        writeln!(file, "{v}")?;
    }
    Ok(())
}
