pub type ShortreelResult<T> = Result<T, ShortreelError>;

#[derive(thiserror::Error, Debug)]
pub enum ShortreelError {
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("font load error: {0}")]
    FontLoad(String),

    #[error("rasterization error: {0}")]
    Rasterization(String),

    #[error("composition inconsistency: {0}")]
    CompositionInconsistency(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShortreelError {
    pub fn missing_field(msg: impl Into<String>) -> Self {
        Self::MissingRequiredField(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn asset_not_found(msg: impl Into<String>) -> Self {
        Self::AssetNotFound(msg.into())
    }

    pub fn font_load(msg: impl Into<String>) -> Self {
        Self::FontLoad(msg.into())
    }

    pub fn rasterization(msg: impl Into<String>) -> Self {
        Self::Rasterization(msg.into())
    }

    pub fn inconsistency(msg: impl Into<String>) -> Self {
        Self::CompositionInconsistency(msg.into())
    }
}
