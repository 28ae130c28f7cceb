/// Errors produced while reconciling simulated and observed tables.
#[derive(Debug, thiserror::Error)]
pub enum AcceptanceError {
    /// A required input column is missing on a provider table.
    #[error("table '{table}': missing column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A cell could not be parsed into the column's type.
    #[error("table '{table}', row {row}: cannot parse {column} value '{value}'")]
    ValueParse {
        table: String,
        row: usize,
        column: String,
        value: String,
    },

    /// A join key expected to be unique repeated on one side.
    #[error("join '{join}': key {key} appears {count} times on the {side} side")]
    JoinCardinality {
        join: String,
        side: &'static str,
        key: String,
        count: usize,
    },

    /// A required output column is absent from every row of a non-empty output.
    #[error("output '{output}': required column '{column}' is absent from every row")]
    MissingOutputColumn { output: String, column: String },

    #[error("unknown criteria number: {0}")]
    UnknownCriteria(u32),

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AcceptanceError>;
