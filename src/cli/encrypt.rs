use clap::Parser;
use miette::Result;

use crate::{
	cli::{one_stdin, IoArgs},
	inout::{read_input, write_output},
	keys::KeyArgs,
	ops::{self, EncryptOptions, Serialization},
};

/// Encrypt a plaintext into a JWE, using a public or symmetric key.
///
/// The plaintext is read from `--in` (default stdin) and the JWE written to `--out` (default
/// stdout). Output is in compact serialization unless `--full` is given.
///
/// If the key is a JWK with a key ID, it is recorded in the message's protected header.
#[derive(Debug, Clone, Parser)]
pub struct EncryptArgs {
	/// Key management algorithm, e.g. RSA-OAEP, ECDH-ES+A128KW, A256KW, dir.
	#[arg(short, long, value_name = "ALG")]
	pub alg: String,

	/// Content encryption algorithm, e.g. A128GCM, A256CBC-HS512.
	#[arg(short, long, value_name = "ENC")]
	pub enc: String,

	/// Content type of the plaintext, recorded in the `cty` header.
	#[arg(long, value_name = "TYPE")]
	pub cty: Option<String>,

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

impl From<&EncryptArgs> for EncryptOptions {
	fn from(args: &EncryptArgs) -> Self {
		Self {
			key_management: args.alg.clone(),
			content_encryption: args.enc.clone(),
			content_type: args.cty.clone(),
			serialization: Serialization::full_if(args.full),
		}
	}
}

/// CLI command for the `encrypt` operation.
pub async fn run(args: EncryptArgs) -> Result<()> {
	one_stdin(&args.key, &args.io)?;
	let key = args.key.require_public_key().await?;
	let plaintext = read_input(&args.io.input).await?;

	let message = ops::encrypt(&plaintext, &key, &EncryptOptions::from(&args))?;

	write_output(&args.io.output, message.as_bytes()).await?;
	Ok(())
}
