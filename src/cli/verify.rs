use clap::Parser;
use miette::Result;

use crate::{
	cli::{one_stdin, IoArgs},
	error::Error,
	inout::{read_input, write_output},
	keys::KeyArgs,
	ops,
};

/// Verify a JWS, using a public or symmetric key, and output its payload.
///
/// Both the compact and the full (JSON) serializations are accepted. The payload is only written
/// if the signature is valid.
#[derive(Debug, Clone, Parser)]
pub struct VerifyArgs {
	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub key: KeyArgs,

	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub io: IoArgs,
}

/// CLI command for the `verify` operation.
pub async fn run(VerifyArgs { key, io }: VerifyArgs) -> Result<()> {
	one_stdin(&key, &io)?;
	let key = key.require_public_key().await?;
	let input = read_input(&io.input).await?;
	let message = String::from_utf8(input).map_err(Error::parse)?;

	let payload = ops::verify(&message, &key)?;

	write_output(&io.output, &payload).await?;
	Ok(())
}
