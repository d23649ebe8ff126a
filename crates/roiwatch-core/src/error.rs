/// Errors raised by the aggregation core and its wire adapter.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid timestamp: {raw:?}")]
    InvalidTimestamp { raw: String },
    #[error("invalid bucket name: {name:?} (expected morning, afternoon or night)")]
    InvalidBucketName { name: String },
    #[error(
        "batch frame columns disagree: timestamp={timestamps} class={classes} \
         confidence={confidences} restricted_area_violation={violations}"
    )]
    FrameShape {
        timestamps: usize,
        classes: usize,
        confidences: usize,
        violations: usize,
    },
    #[error("batch frame offset {offset} with {rows} rows overflows the log index")]
    OffsetOverflow { offset: u64, rows: usize },
    #[error("invalid violation flag: {raw:?}")]
    InvalidViolationFlag { raw: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
