use josekit::jwk::{
	alg::{ec::EcCurve, ed::EdCurve},
	Jwk,
};
use tracing::{debug, instrument};

use crate::{
	algorithms::{KEY_MANAGEMENT_ALGORITHMS, SIGNATURE_ALGORITHMS},
	error::{Error, Result},
};

/// What a generated key is for, as in the JWK `use` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KeyUse {
	/// Signing and verifying.
	Sig,

	/// Encrypting and decrypting.
	Enc,
}

impl KeyUse {
	/// The `use` parameter value.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Sig => "sig",
			Self::Enc => "enc",
		}
	}
}

/// Options for [`generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
	/// Signing or encryption.
	pub key_use: KeyUse,

	/// The algorithm the key is for, e.g. `ES256` or `RSA-OAEP`.
	pub algorithm: String,

	/// Key size in bits, where the algorithm allows a choice.
	pub size: Option<u32>,

	/// Key ID. A random UUID is used when absent.
	pub key_id: Option<String>,
}

/// A freshly generated key.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
	/// The key ID, as written in both JWKs.
	pub key_id: String,

	/// The full key, including private parameters.
	pub private: Jwk,

	/// The public half, for asymmetric keys.
	pub public: Option<Jwk>,
}

impl GeneratedKey {
	/// File name for the private JWK.
	pub fn private_file_name(&self, key_use: KeyUse) -> String {
		format!("jwk-{}-{}-priv.json", key_use.as_str(), self.key_id)
	}

	/// File name for the public JWK.
	pub fn public_file_name(&self, key_use: KeyUse) -> String {
		format!("jwk-{}-{}-pub.json", key_use.as_str(), self.key_id)
	}
}

fn oct_bits(alg: &str) -> Option<(u32, bool)> {
	// (default size, whether the size is fixed)
	Some(match alg {
		"HS256" => (256, false),
		"HS384" => (384, false),
		"HS512" => (512, false),
		"A128KW" | "A128GCMKW" => (128, true),
		"A192KW" | "A192GCMKW" => (192, true),
		"A256KW" | "A256GCMKW" => (256, true),
		"dir" => (256, false),
		alg if alg.starts_with("PBES2-") => (256, false),
		_ => return None,
	})
}

fn no_size(alg: &str, size: Option<u32>) -> Result<()> {
	match size {
		Some(_) => Err(Error::KeyGen(
			format!("--size does not apply to {alg}").into(),
		)),
		None => Ok(()),
	}
}

fn generate_jwk(alg: &str, size: Option<u32>) -> Result<Jwk> {
	let keygen = |err: josekit::JoseError| Error::KeyGen(err.into());

	match alg {
		"RS256" | "RS384" | "RS512" | "PS256" | "PS384" | "PS512" | "RSA1_5" | "RSA-OAEP"
		| "RSA-OAEP-256" | "RSA-OAEP-384" | "RSA-OAEP-512" => {
			let bits = size.unwrap_or(2048);
			if bits < 2048 {
				return Err(Error::KeyGen(
					format!("RSA keys must be at least 2048 bits, {bits} requested").into(),
				));
			}
			Jwk::generate_rsa_key(bits).map_err(keygen)
		}
		"ES256" | "ES384" | "ES512" | "ES256K" => {
			no_size(alg, size)?;
			let curve = match alg {
				"ES256" => EcCurve::P256,
				"ES384" => EcCurve::P384,
				"ES512" => EcCurve::P521,
				_ => EcCurve::Secp256k1,
			};
			Jwk::generate_ec_key(curve).map_err(keygen)
		}
		"ECDH-ES" | "ECDH-ES+A128KW" | "ECDH-ES+A192KW" | "ECDH-ES+A256KW" => {
			let curve = match size.unwrap_or(256) {
				256 => EcCurve::P256,
				384 => EcCurve::P384,
				521 => EcCurve::P521,
				other => {
					return Err(Error::KeyGen(
						format!("ECDH-ES keys are 256, 384, or 521 bits, {other} requested").into(),
					))
				}
			};
			Jwk::generate_ec_key(curve).map_err(keygen)
		}
		"EdDSA" => {
			no_size(alg, size)?;
			Jwk::generate_ed_key(EdCurve::Ed25519).map_err(keygen)
		}
		alg => {
			let Some((default, fixed)) = oct_bits(alg) else {
				return Err(Error::KeyGen(
					format!("cannot generate keys for {alg:?}").into(),
				));
			};

			let bits = size.unwrap_or(default);
			if fixed && bits != default {
				return Err(Error::KeyGen(
					format!("{alg} keys are exactly {default} bits, {bits} requested").into(),
				));
			}
			if bits < default && alg.starts_with("HS") {
				return Err(Error::KeyGen(
					format!("{alg} keys must be at least {default} bits, {bits} requested").into(),
				));
			}

			let bytes = (bits % 8 == 0)
				.then_some(bits / 8)
				.and_then(|bytes| u8::try_from(bytes).ok())
				.filter(|bytes| *bytes > 0)
				.ok_or_else(|| {
					Error::KeyGen(
						format!("symmetric key size must be a whole number of bytes up to 2040 bits, {bits} requested").into(),
					)
				})?;
			Jwk::generate_oct_key(bytes).map_err(keygen)
		}
	}
}

/// Generate a JWK for an algorithm.
#[instrument(level = "debug")]
pub fn generate(options: &GenerateOptions) -> Result<GeneratedKey> {
	let alg = options.algorithm.as_str();
	let known = match options.key_use {
		KeyUse::Sig => SIGNATURE_ALGORITHMS,
		KeyUse::Enc => KEY_MANAGEMENT_ALGORITHMS,
	};
	if !known.contains(&alg) {
		return Err(Error::KeyGen(
			format!(
				"{alg:?} is not a {} algorithm",
				match options.key_use {
					KeyUse::Sig => "signature",
					KeyUse::Enc => "key management",
				}
			)
			.into(),
		));
	}

	let key_id = options
		.key_id
		.clone()
		.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

	let label = |jwk: &mut Jwk| {
		jwk.set_key_id(&key_id);
		jwk.set_key_use(options.key_use.as_str());
		jwk.set_algorithm(alg);
	};

	let mut private = generate_jwk(alg, options.size)?;
	label(&mut private);

	let public = if private.key_type() == "oct" {
		None
	} else {
		let mut public = private
			.to_public_key()
			.map_err(|err| Error::KeyGen(err.into()))?;
		label(&mut public);
		Some(public)
	};

	debug!(kid = %key_id, kty = private.key_type(), "generated key");
	Ok(GeneratedKey {
		key_id,
		private,
		public,
	})
}
