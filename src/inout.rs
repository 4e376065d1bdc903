use std::{convert::Infallible, fmt, path::PathBuf, str::FromStr};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// Where to read bytes from.
///
/// Parsed from a command-line value: `-` is standard input, anything else is a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Source {
	/// Standard input.
	#[default]
	Stdin,

	/// A file on disk.
	File(PathBuf),
}

impl FromStr for Source {
	type Err = Infallible;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(if s == "-" || s.is_empty() {
			Self::Stdin
		} else {
			Self::File(s.into())
		})
	}
}

impl fmt::Display for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Stdin => f.write_str("stdin"),
			Self::File(path) => write!(f, "{}", path.display()),
		}
	}
}

impl Source {
	/// Read the whole source into memory.
	pub(crate) async fn read_raw(&self) -> std::io::Result<Vec<u8>> {
		match self {
			Self::Stdin => {
				let mut buf = Vec::new();
				tokio::io::stdin().read_to_end(&mut buf).await?;
				Ok(buf)
			}
			Self::File(path) => tokio::fs::read(path).await,
		}
	}
}

/// Where to write bytes to.
///
/// Parsed from a command-line value: `-` is standard output, anything else is a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Sink {
	/// Standard output.
	#[default]
	Stdout,

	/// A file on disk, created or truncated.
	File(PathBuf),
}

impl FromStr for Sink {
	type Err = Infallible;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(if s == "-" || s.is_empty() {
			Self::Stdout
		} else {
			Self::File(s.into())
		})
	}
}

impl fmt::Display for Sink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Stdout => f.write_str("stdout"),
			Self::File(path) => write!(f, "{}", path.display()),
		}
	}
}

/// Read the input message.
#[instrument(level = "debug")]
pub async fn read_input(source: &Source) -> Result<Vec<u8>> {
	let bytes = source.read_raw().await.map_err(|source_err| Error::ReadInput {
		from: source.to_string(),
		source: source_err,
	})?;
	trace!(len = bytes.len(), "read input");
	Ok(bytes)
}

/// Write the output message.
///
/// Only called once an operation has fully succeeded, so a failed operation never creates or
/// truncates the output file.
#[instrument(level = "debug", skip(bytes))]
pub async fn write_output(sink: &Sink, bytes: &[u8]) -> Result<()> {
	let written = match sink {
		Sink::Stdout => {
			let mut stdout = tokio::io::stdout();
			match stdout.write_all(bytes).await {
				Ok(()) => stdout.flush().await,
				Err(err) => Err(err),
			}
		}
		Sink::File(path) => tokio::fs::write(path, bytes).await,
	};

	written.map_err(|source| Error::WriteOutput {
		to: sink.to_string(),
		source,
	})?;
	trace!(len = bytes.len(), "wrote output");
	Ok(())
}
