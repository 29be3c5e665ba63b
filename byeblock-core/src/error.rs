use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	#[error("config: {0}")]
	Config(String),
	#[error("toml: {0}")]
	Toml(String),
	#[error("invalid proxy: {0}")]
	InvalidProxy(String),
	#[error("not found: {0}")]
	NotFound(String),
}

impl Error {
	pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
	pub fn invalid_proxy(msg: impl Into<String>) -> Self { Self::InvalidProxy(msg.into()) }
	pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }
}

impl From<toml::de::Error> for Error {
	fn from(e: toml::de::Error) -> Self { Self::Toml(format!("parse error: {e}")) }
}

impl From<toml::ser::Error> for Error {
	fn from(e: toml::ser::Error) -> Self { Self::Toml(format!("serialize error: {e}")) }
}
