use anyhow::{Context, Result};
use polars::prelude::*;

pub fn ensure_utf8(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && column.dtype() != &DataType::String
        {
            let casted = column
                .cast(&DataType::String)
                .with_context(|| format!("cast {col} to String"))?;
            df.with_column(casted)?;
        }
    }
    Ok(df)
}

pub fn ensure_i64(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && column.dtype() != &DataType::Int64
        {
            let casted = column
                .cast(&DataType::Int64)
                .with_context(|| format!("cast {col} to Int64"))?;
            df.with_column(casted)?;
        }
    }
    Ok(df)
}

/// Casts to Float64; unparseable entries become null.
pub fn ensure_f64(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && column.dtype() != &DataType::Float64
        {
            let casted = column
                .cast(&DataType::Float64)
                .with_context(|| format!("cast {col} to Float64"))?;
            df.with_column(casted)?;
        }
    }
    Ok(df)
}

/// Float values of a column with NaN folded into `None`.
pub fn f64_values(df: &DataFrame, col: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(col)?
        .cast(&DataType::Float64)
        .with_context(|| format!("cast {col} to Float64"))?;
    let values = column
        .f64()
        .with_context(|| col.to_string())?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

pub fn str_values(df: &DataFrame, col: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(col)?.cast(&DataType::String)?;
    let values = column
        .str()
        .with_context(|| col.to_string())?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<(DataFrame, usize)> {
    let mask: BooleanChunked = keep.iter().copied().collect();
    let filtered = df.filter(&mask)?;
    let removed = df.height().saturating_sub(filtered.height());
    Ok((filtered, removed))
}

pub fn drop_cols_if_present(df: &mut DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        if df.column(name).is_ok() {
            df.drop_in_place(name)?;
        }
    }
    Ok(())
}
