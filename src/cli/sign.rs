use clap::Parser;
use miette::Result;

use crate::{
	cli::{one_stdin, IoArgs},
	inout::{read_input, write_output},
	keys::KeyArgs,
	ops::{self, Serialization, SignOptions},
};

/// Sign a payload into a JWS, using a private or symmetric key.
///
/// The payload is read from `--in` (default stdin) and the JWS written to `--out` (default
/// stdout). Output is in compact serialization unless `--full` is given.
#[derive(Debug, Clone, Parser)]
pub struct SignArgs {
	/// Signature algorithm, e.g. ES256, RS256, PS384, EdDSA, HS256.
	#[arg(short, long, value_name = "ALG")]
	pub alg: String,

	/// Use the full JSON serialization instead of the compact one.
	#[arg(long)]
	pub full: bool,

	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub key: KeyArgs,

	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub io: IoArgs,
}

/// CLI command for the `sign` operation.
pub async fn run(
	SignArgs {
		alg,
		full,
		key,
		io,
	}: SignArgs,
) -> Result<()> {
	one_stdin(&key, &io)?;
	let key = key.require_private_key().await?;
	let payload = read_input(&io.input).await?;

	let options = SignOptions {
		algorithm: alg,
		serialization: Serialization::full_if(full),
	};
	let message = ops::sign(&payload, &key, &options)?;

	write_output(&io.output, message.as_bytes()).await?;
	Ok(())
}
