use std::fmt;

use clap::Parser;
use josekit::jwk::Jwk;
use openssl::{
	pkey::{Id, PKey, Private, Public},
	rsa::Rsa,
	x509::X509,
};
use tracing::{debug, instrument};

use crate::{
	error::{Error, Result},
	inout::Source,
};

/// [Clap][clap] arguments for the key source.
///
/// ```no_run
/// use clap::Parser;
/// use jose_util::keys::KeyArgs;
///
/// /// Your CLI tool
/// #[derive(Parser)]
/// struct Args {
///     #[command(flatten)]
///     key: KeyArgs,
/// }
///
/// #[tokio::main]
/// async fn main() -> miette::Result<()> {
///     let args = Args::parse();
///     let key = args.key.require_private_key().await?;
///     println!("{:?} {:?}", key.role(), key.family());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Parser)]
pub struct KeyArgs {
	/// Path to the key file, or '-' to read it from stdin.
	///
	/// The key can be:
	/// - a PEM file: public key (PKIX or PKCS#1), certificate, or private key (PKCS#8, PKCS#1, SEC1);
	/// - the same in binary DER;
	/// - a JSON Web Key, or a JWK set containing exactly one key.
	///
	/// Symmetric keys must be given as JWKs with `"kty": "oct"`. Password-protected private keys
	/// are not supported.
	///
	/// When the key is a JWK with a `kid`, that key ID is written into the protected header of
	/// messages encrypted or signed with it.
	#[arg(
		short = 'k',
		long,
		value_name = "PATH",
		verbatim_doc_comment,
		required_unless_present = "key_env"
	)]
	pub key: Option<Source>,

	/// Read the key from this environment variable instead of a file.
	#[arg(long, value_name = "ENVVAR", conflicts_with = "key")]
	pub key_env: Option<String>,
}

impl KeyArgs {
	/// Whether the key will be read from standard input.
	pub fn reads_stdin(&self) -> bool {
		matches!(self.key, Some(Source::Stdin))
	}

	/// Read the raw key material from wherever it was specified.
	pub async fn read(&self) -> Result<Vec<u8>> {
		match self {
			Self {
				key_env: Some(var), ..
			} => std::env::var_os(var)
				.map(|value| value.into_encoded_bytes())
				.ok_or_else(|| Error::KeyLoad {
					from: format!("environment variable {var}"),
					source: "variable is not set".into(),
				}),
			Self { key: Some(src), .. } => src.read_raw().await.map_err(|err| Error::KeyLoad {
				from: src.to_string(),
				source: err.into(),
			}),
			_ => Err(Error::KeyLoad {
				from: "arguments".into(),
				source: "one of --key or --key-env must be provided".into(),
			}),
		}
	}

	/// Load a key suitable for encrypting or verifying.
	pub async fn require_public_key(&self) -> Result<Key> {
		load_public_key(&self.read().await?)
	}

	/// Load a key suitable for decrypting or signing.
	pub async fn require_private_key(&self) -> Result<Key> {
		load_private_key(&self.read().await?)
	}
}

/// What a key can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
	/// Public half of a key pair: encrypt and verify.
	Public,

	/// Private half of a key pair: decrypt and sign.
	Private,

	/// Shared secret: everything.
	Symmetric,
}

/// Key family, as in the JWK `kty` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
	/// RSA.
	Rsa,

	/// Elliptic curve (NIST curves, secp256k1).
	Ec,

	/// Octet key pair (Ed25519, Ed448, X25519, X448).
	Okp,

	/// Symmetric octet sequence.
	Oct,
}

/// A loaded key, ready to hand to the JOSE library.
#[derive(Clone)]
pub struct Key {
	role: KeyRole,
	family: KeyFamily,
	material: Material,
}

/// Normalised key material.
#[derive(Clone)]
pub(crate) enum Material {
	/// SubjectPublicKeyInfo for public keys, PKCS#8 for private keys.
	Der(Vec<u8>),
	Jwk(Box<Jwk>),
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Key")
			.field("role", &self.role)
			.field("family", &self.family)
			.field("kid", &self.key_id())
			.finish_non_exhaustive()
	}
}

impl Key {
	/// Wrap a JWK, inferring role and family from its parameters.
	pub fn from_jwk(jwk: Jwk) -> Result<Self> {
		let family = match jwk.key_type() {
			"RSA" => KeyFamily::Rsa,
			"EC" => KeyFamily::Ec,
			"OKP" => KeyFamily::Okp,
			"oct" => KeyFamily::Oct,
			other => {
				return Err(Error::key_parse(format!(
					"unsupported JWK key type {other:?}"
				)))
			}
		};

		let role = if family == KeyFamily::Oct {
			KeyRole::Symmetric
		} else if jwk.parameter("d").is_some() {
			KeyRole::Private
		} else {
			KeyRole::Public
		};

		Ok(Self {
			role,
			family,
			material: Material::Jwk(Box::new(jwk)),
		})
	}

	fn from_public(pkey: PKey<Public>) -> Result<Self> {
		Ok(Self {
			role: KeyRole::Public,
			family: family_of(pkey.id())?,
			material: Material::Der(pkey.public_key_to_der().map_err(Error::key_parse)?),
		})
	}

	fn from_private(pkey: PKey<Private>) -> Result<Self> {
		Ok(Self {
			role: KeyRole::Private,
			family: family_of(pkey.id())?,
			material: Material::Der(pkey.private_key_to_pkcs8().map_err(Error::key_parse)?),
		})
	}

	/// The key's role.
	pub fn role(&self) -> KeyRole {
		self.role
	}

	/// The key's family.
	pub fn family(&self) -> KeyFamily {
		self.family
	}

	/// The key's identifier, if the material carried one.
	///
	/// Only JWKs can carry a key ID; PEM and DER keys never have one.
	pub fn key_id(&self) -> Option<&str> {
		match &self.material {
			Material::Jwk(jwk) => jwk.key_id(),
			Material::Der(_) => None,
		}
	}

	pub(crate) fn material(&self) -> &Material {
		&self.material
	}

	/// The same key with its `kid` removed.
	///
	/// Decrypters and verifiers built from a labelled JWK only accept messages whose header names
	/// that same `kid`; an unlabelled copy accepts any message the key material opens.
	pub(crate) fn unlabelled(&self) -> std::result::Result<Self, josekit::JoseError> {
		let Material::Jwk(jwk) = &self.material else {
			return Ok(self.clone());
		};
		if jwk.key_id().is_none() {
			return Ok(self.clone());
		}

		let mut map: serde_json::Map<String, serde_json::Value> = Jwk::clone(jwk).into();
		map.remove("kid");
		Ok(Self {
			material: Material::Jwk(Box::new(Jwk::from_map(map)?)),
			..self.clone()
		})
	}
}

fn family_of(id: Id) -> Result<KeyFamily> {
	if id == Id::RSA {
		Ok(KeyFamily::Rsa)
	} else if id == Id::EC {
		Ok(KeyFamily::Ec)
	} else if [Id::ED25519, Id::ED448, Id::X25519, Id::X448].contains(&id) {
		Ok(KeyFamily::Okp)
	} else {
		Err(Error::key_parse(format!("unsupported key algorithm {id:?}")))
	}
}

enum Encoding {
	Jwk,
	Pem,
	Der,
}

fn sniff(bytes: &[u8]) -> Result<Encoding> {
	let trimmed = bytes.trim_ascii();
	if trimmed.is_empty() {
		Err(Error::key_parse("key material is empty"))
	} else if trimmed.starts_with(b"{") {
		Ok(Encoding::Jwk)
	} else if contains(trimmed, b"-----BEGIN ") {
		Ok(Encoding::Pem)
	} else {
		Ok(Encoding::Der)
	}
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
	haystack.windows(needle.len()).any(|window| window == needle)
}

fn parse_jwk(bytes: &[u8]) -> Result<Jwk> {
	let value: serde_json::Value = serde_json::from_slice(bytes).map_err(Error::key_parse)?;
	let Some(keys) = value.get("keys") else {
		return Jwk::from_bytes(bytes).map_err(Error::key_parse);
	};

	match keys.as_array().map(Vec::as_slice) {
		Some([single]) => {
			let single = serde_json::to_vec(single).map_err(Error::key_parse)?;
			Jwk::from_bytes(single).map_err(Error::key_parse)
		}
		Some(many) => Err(Error::key_parse(format!(
			"JWK set holds {} keys, exactly one is required",
			many.len()
		))),
		None => Err(Error::key_parse("JWK set `keys` is not an array")),
	}
}

fn public_from_pem(bytes: &[u8]) -> Option<PKey<Public>> {
	PKey::public_key_from_pem(bytes)
		.ok()
		.or_else(|| {
			Rsa::public_key_from_pem_pkcs1(bytes)
				.and_then(PKey::from_rsa)
				.ok()
		})
		.or_else(|| X509::from_pem(bytes).and_then(|cert| cert.public_key()).ok())
}

fn public_from_der(bytes: &[u8]) -> Option<PKey<Public>> {
	PKey::public_key_from_der(bytes)
		.ok()
		.or_else(|| {
			Rsa::public_key_from_der_pkcs1(bytes)
				.and_then(PKey::from_rsa)
				.ok()
		})
		.or_else(|| X509::from_der(bytes).and_then(|cert| cert.public_key()).ok())
}

fn private_from_pem(bytes: &[u8]) -> Result<Option<PKey<Private>>> {
	if contains(bytes, b"ENCRYPTED PRIVATE KEY") || contains(bytes, b"Proc-Type: 4,ENCRYPTED") {
		return Err(Error::key_parse(
			"password-protected private keys are not supported",
		));
	}

	// an empty passphrase stops openssl from prompting on the terminal
	Ok(PKey::private_key_from_pem_passphrase(bytes, b"").ok())
}

fn private_from_der(bytes: &[u8]) -> Option<PKey<Private>> {
	PKey::private_key_from_der(bytes).ok()
}

/// Load a public (or symmetric) key from raw bytes.
///
/// Fails if the material only holds a private key.
#[instrument(level = "debug", skip(bytes))]
pub fn load_public_key(bytes: &[u8]) -> Result<Key> {
	let key = match sniff(bytes)? {
		Encoding::Jwk => Key::from_jwk(parse_jwk(bytes)?)?,
		Encoding::Pem => match public_from_pem(bytes) {
			Some(pkey) => Key::from_public(pkey)?,
			None if private_from_pem(bytes)?.is_some() => {
				return Err(Error::key_parse(
					"expected a public key, found a private key",
				))
			}
			None => return Err(Error::key_parse("no public key found in PEM data")),
		},
		Encoding::Der => match public_from_der(bytes) {
			Some(pkey) => Key::from_public(pkey)?,
			None if private_from_der(bytes).is_some() => {
				return Err(Error::key_parse(
					"expected a public key, found a private key",
				))
			}
			None => return Err(Error::key_parse("not a recognised key encoding")),
		},
	};

	if key.role == KeyRole::Private {
		return Err(Error::key_parse(
			"expected a public key, found a private key",
		));
	}

	debug!(?key, "loaded public key");
	Ok(key)
}

/// Load a private (or symmetric) key from raw bytes.
///
/// Fails if the material only holds a public key.
#[instrument(level = "debug", skip(bytes))]
pub fn load_private_key(bytes: &[u8]) -> Result<Key> {
	let key = match sniff(bytes)? {
		Encoding::Jwk => Key::from_jwk(parse_jwk(bytes)?)?,
		Encoding::Pem => match private_from_pem(bytes)? {
			Some(pkey) => Key::from_private(pkey)?,
			None if public_from_pem(bytes).is_some() => {
				return Err(Error::key_parse(
					"expected a private key, found a public key",
				))
			}
			None => return Err(Error::key_parse("no private key found in PEM data")),
		},
		Encoding::Der => match private_from_der(bytes) {
			Some(pkey) => Key::from_private(pkey)?,
			None if public_from_der(bytes).is_some() => {
				return Err(Error::key_parse(
					"expected a private key, found a public key",
				))
			}
			None => return Err(Error::key_parse("not a recognised key encoding")),
		},
	};

	if key.role == KeyRole::Public {
		return Err(Error::key_parse(
			"expected a private key, found a public key",
		));
	}

	debug!(?key, "loaded private key");
	Ok(key)
}
