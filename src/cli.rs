use clap::{Parser, Subcommand};
use miette::Result;
use tracing::{debug, trace};

use crate::{
	error::Error,
	inout::{Sink, Source},
	keys::KeyArgs,
};

macro_rules! commands {
	(
		$(
			$(#[$meta:meta])*
			$modname:ident => $enumname:ident($argname:ident)
		),+ $(,)?
	) => {
		$(
			$(#[$meta])*
			pub mod $modname;
		)*

		/// The jose-util subcommands.
		#[derive(Debug, Clone, Subcommand)]
		#[allow(missing_docs, reason = "documented on the args structs")]
		pub enum Action {
			$(
				$enumname($modname::$argname),
			)*
		}

		/// Run a subcommand.
		pub async fn run(action: Action) -> Result<()> {
			debug!(version=%env!("CARGO_PKG_VERSION"), "starting up");
			trace!(?action, "action");
			match action {
				$(
					Action::$enumname(args) => $modname::run(args).await,
				)*
			}
		}
	};
}

commands! {
	/// Implementation of the `encrypt` command.
	encrypt => Encrypt(EncryptArgs),
	/// Implementation of the `decrypt` command.
	decrypt => Decrypt(DecryptArgs),
	/// Implementation of the `sign` command.
	sign => Sign(SignArgs),
	/// Implementation of the `verify` command.
	verify => Verify(VerifyArgs),
	/// Implementation of the `expand` command.
	expand => Expand(ExpandArgs),
	/// Implementation of the `generate-key` command.
	generate_key => GenerateKey(GenerateKeyArgs),
}

/// [Clap][clap] arguments for the message input and output.
#[derive(Debug, Clone, Parser)]
pub struct IoArgs {
	/// Read the input message from this file, or '-' for stdin.
	#[arg(
		short = 'i',
		long = "in",
		value_name = "PATH",
		default_value = "-",
		hide_default_value = true
	)]
	pub input: Source,

	/// Write the output to this file, or '-' for stdout.
	///
	/// The file is only created once the operation has succeeded.
	#[arg(
		short = 'o',
		long = "out",
		value_name = "PATH",
		default_value = "-",
		hide_default_value = true
	)]
	pub output: Sink,
}

/// Refuse to read both the key and the input message from stdin.
pub(crate) fn one_stdin(key: &KeyArgs, io: &IoArgs) -> crate::error::Result<()> {
	if key.reads_stdin() && io.input == Source::Stdin {
		return Err(Error::KeyLoad {
			from: "stdin".into(),
			source: "the key and the input cannot both be read from stdin; pass --in or a key path"
				.into(),
		});
	}
	Ok(())
}
