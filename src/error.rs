use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetaRegError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing column {column} in {table} table")]
    MissingColumn { table: String, column: String },

    #[error("malformed locus {value:?} in row {row}; expected CHR:POS")]
    MalformedLocus { row: usize, value: String },

    #[error("malformed alleles {value:?} in row {row}; expected a two-element list")]
    MalformedAlleles { row: usize, value: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetaRegError>;
