use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing::debug;

use crate::{
	cli::IoArgs,
	envelope::{Envelope, Kind},
	error::Error,
	inout::{read_input, write_output},
};

/// Convert a compact JWE or JWS into the full (flattened JSON) serialization.
///
/// No key is needed: the message is only parsed, never decrypted or verified. Input that is
/// already in JSON form is written back unchanged.
#[derive(Debug, Clone, Parser)]
pub struct ExpandArgs {
	/// Whether the input is a JWE or a JWS.
	///
	/// By default this is detected from the number of segments.
	#[arg(short, long, value_name = "KIND")]
	pub format: Option<Kind>,

	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub io: IoArgs,
}

/// CLI command for the `expand` operation.
pub async fn run(ExpandArgs { format, io }: ExpandArgs) -> Result<()> {
	let input = read_input(&io.input).await?;
	let message = String::from_utf8(input).map_err(Error::parse)?;

	let envelope = match format {
		Some(kind) => Envelope::parse(&message, kind)?,
		None => Envelope::detect(&message)?,
	};
	debug!(kind = ?envelope.kind(), compact = envelope.is_compact(), "expanding");

	let expanded = serde_json::to_string(&envelope.expand()).into_diagnostic()?;
	write_output(&io.output, expanded.as_bytes()).await?;
	Ok(())
}
