use clap::Parser;
use lloggs::{LoggingArgs, PreArgs, WorkerGuard};
use miette::{miette, Result};
use tracing::debug;

/// Encrypt, decrypt, sign, and verify JOSE messages.
///
/// Messages are read from stdin (or `--in`) and results written to stdout (or `--out`). Keys are
/// given with `--key`, as PEM, DER, or JWK.
///
/// To try it out, create a key pair with `jose-util generate-key --use sig --alg ES256`, then sign
/// with the `-priv.json` file and verify with the `-pub.json` one.
#[derive(Debug, Clone, Parser)]
#[command(
	author,
	version,
	max_term_width = 100,
	after_help = "Want more detail? Try the long '--help' flag!",
	after_long_help = "Didn't expect this much output? Use the short '-h' flag to get short help."
)]
pub struct Args {
	#[command(flatten)]
	#[allow(missing_docs, reason = "don't interfere with clap")]
	pub logging: LoggingArgs,

	/// What to do
	#[command(subcommand)]
	pub action: crate::cli::Action,
}

/// Parse the command line and set up logging.
///
/// The returned guard must be held until the program exits, so buffered logs get flushed.
pub fn get_args() -> Result<(Args, WorkerGuard)> {
	let log_guard = PreArgs::parse().setup().map_err(|err| miette!("{err}"))?;

	debug!("parsing arguments");
	let args = Args::parse();

	let log_guard = match log_guard {
		Some(g) => g,
		None => args
			.logging
			.setup(|v| match v {
				0 => "info",
				1 => "info,jose_util=debug",
				2 => "debug",
				3 => "debug,jose_util=trace",
				_ => "trace",
			})
			.map_err(|err| miette!("{err}"))?,
	};

	debug!(?args, "got arguments");
	Ok((args, log_guard))
}

#[test]
fn verify_cli() {
	use clap::CommandFactory;
	Args::command().debug_assert()
}
