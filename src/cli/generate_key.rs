use std::path::{Path, PathBuf};

use clap::Parser;
use miette::{bail, IntoDiagnostic, Result, WrapErr};
use tokio::{fs::OpenOptions, io::AsyncWriteExt as _};
use tracing::info;

use crate::{
	error::Error,
	keygen::{generate, GenerateOptions, KeyUse},
};

/// Generate a new JSON Web Key.
///
/// Writes `jwk-<use>-<kid>-priv.json` and, for asymmetric keys, `jwk-<use>-<kid>-pub.json` to the
/// output directory. Symmetric keys (for HMAC, AES key wrap, or direct encryption) only have the
/// private file, which must be kept secret like any private key.
///
/// The generated files can be passed straight to `--key`.
#[derive(Debug, Clone, Parser)]
pub struct GenerateKeyArgs {
	/// What the key is for.
	#[arg(short = 'u', long = "use", value_name = "USE")]
	pub key_use: KeyUse,

	/// The algorithm the key is for, e.g. ES256, RSA-OAEP, ECDH-ES, HS256, A128KW.
	#[arg(short, long, value_name = "ALG")]
	pub alg: String,

	/// Key size in bits.
	///
	/// For RSA this defaults to 2048, which is also the minimum. For ECDH-ES this picks the curve:
	/// 256 (default), 384, or 521. For symmetric keys it defaults to what the algorithm needs.
	/// Other algorithms have a fixed size and reject this option.
	#[arg(short, long, value_name = "BITS")]
	pub size: Option<u32>,

	/// Key ID to record in the key.
	///
	/// Defaults to a random UUID.
	#[arg(long, value_name = "KID")]
	pub kid: Option<String>,

	/// Directory to write the key files to.
	#[arg(long, value_name = "DIR", default_value = ".")]
	pub output_dir: PathBuf,

	/// Overwrite the key file(s) if they already exist.
	#[arg(long, short = 'F')]
	pub force: bool,
}

async fn write_key(path: &Path, json: &str, force: bool) -> Result<()> {
	let mut options = OpenOptions::new();
	options.write(true);
	if force {
		options.create(true).truncate(true);
	} else {
		options.create_new(true);
	}

	let mut file = options
		.open(path)
		.await
		.into_diagnostic()
		.wrap_err_with(|| format!("creating {path:?}; use --force to overwrite"))?;
	file.write_all(json.as_bytes())
		.await
		.into_diagnostic()
		.wrap_err_with(|| format!("writing {path:?}"))?;
	file.flush().await.into_diagnostic()?;
	Ok(())
}

fn pretty(jwk: &josekit::jwk::Jwk) -> Result<String> {
	let value: serde_json::Value =
		serde_json::from_str(&jwk.to_string()).map_err(|err| Error::KeyGen(err.into()))?;
	let mut json = serde_json::to_string_pretty(&value).map_err(|err| Error::KeyGen(err.into()))?;
	json.push('\n');
	Ok(json)
}

/// CLI command for the `generate-key` operation.
pub async fn run(
	GenerateKeyArgs {
		key_use,
		alg,
		size,
		kid,
		output_dir,
		force,
	}: GenerateKeyArgs,
) -> Result<()> {
	let key = generate(&GenerateOptions {
		key_use,
		algorithm: alg,
		size,
		key_id: kid,
	})?;

	let private_path = output_dir.join(key.private_file_name(key_use));
	let public_path = output_dir.join(key.public_file_name(key_use));

	// check both before writing either, so a clash doesn't leave half a pair behind
	if !force {
		let mut paths = vec![&private_path];
		if key.public.is_some() {
			paths.push(&public_path);
		}
		if let Some(existing) = paths.into_iter().find(|path| path.exists()) {
			bail!("{existing:?} already exists; use --force to overwrite");
		}
	}

	write_key(&private_path, &pretty(&key.private)?, force).await?;
	info!(path = ?private_path, kid = %key.key_id, "wrote private key");

	if let Some(public) = &key.public {
		write_key(&public_path, &pretty(public)?, force).await?;
		info!(path = ?public_path, "wrote public key");
	}

	Ok(())
}
