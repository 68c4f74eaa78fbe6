use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Unable to write result: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to encode result: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Result sink failed: {0}")]
    Sink(#[from] SinkError),
}
