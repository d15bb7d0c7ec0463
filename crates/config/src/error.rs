#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to serialize TOML: {0}")]
    SerializeTOML(#[from] toml_edit::ser::Error),

    #[error("Failed to deserialize TOML: {0}")]
    DeserializeTOML(#[from] toml_edit::de::Error),

    #[error("Failed to parse TOML document: {0}")]
    ParseTOML(#[from] toml_edit::TomlError),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}
