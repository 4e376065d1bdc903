use clap::Parser;
use miette::Result;

use crate::{
	cli::{one_stdin, IoArgs},
	error::Error,
	inout::{read_input, write_output},
	keys::KeyArgs,
	ops,
};

/// Decrypt a JWE, using a private or symmetric key.
///
/// Both the compact and the full (JSON) serializations are accepted. The plaintext is written
/// as-is, with no trailing newline added.
///
/// For any failure after the message is parsed, only "unable to decrypt message" is reported.
#[derive(Debug, Clone, Parser)]
pub struct DecryptArgs {
	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub key: KeyArgs,

	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub io: IoArgs,
}

/// CLI command for the `decrypt` operation.
pub async fn run(DecryptArgs { key, io }: DecryptArgs) -> Result<()> {
	one_stdin(&key, &io)?;
	let key = key.require_private_key().await?;
	let input = read_input(&io.input).await?;
	let message = String::from_utf8(input).map_err(Error::parse)?;

	let plaintext = ops::decrypt(&message, &key)?;

	write_output(&io.output, &plaintext).await?;
	Ok(())
}
