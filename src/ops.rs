//! The four JOSE operations.
//!
//! Each takes bytes in, a loaded [`Key`], and explicit options, and returns bytes or a serialized
//! message. They do no I/O; see [`crate::inout`] for that.

use josekit::{
	jwe::{self, JweEncrypter, JweHeader, JweHeaderSet},
	jws::{self, JwsHeader, JwsHeaderSet, JwsSigner},
};
use tracing::{debug, instrument, trace};

use crate::{
	algorithms,
	envelope::{Envelope, Kind},
	error::{Error, Result},
	keys::Key,
};

/// Which serialization to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Serialization {
	/// Dot-separated base64url segments. Exactly one recipient or signature.
	#[default]
	Compact,

	/// JSON. Flattened when there is one recipient or signature, general otherwise.
	Full,
}

impl Serialization {
	/// Full if `full` is set, compact otherwise.
	pub fn full_if(full: bool) -> Self {
		if full {
			Self::Full
		} else {
			Self::Compact
		}
	}
}

/// Options for [`encrypt`].
#[derive(Debug, Clone)]
pub struct EncryptOptions {
	/// Key management algorithm, e.g. `RSA-OAEP`.
	pub key_management: String,

	/// Content encryption algorithm, e.g. `A128GCM`.
	pub content_encryption: String,

	/// Media type of the plaintext, recorded in the `cty` header.
	pub content_type: Option<String>,

	/// Output serialization.
	pub serialization: Serialization,
}

/// Options for [`sign`].
#[derive(Debug, Clone)]
pub struct SignOptions {
	/// Signature algorithm, e.g. `ES256`.
	pub algorithm: String,

	/// Output serialization.
	pub serialization: Serialization,
}

struct Recipient {
	key_id: Option<String>,
	encrypter: Box<dyn JweEncrypter>,
}

/// Encrypts to one or more recipients.
///
/// ```no_run
/// # fn main() -> jose_util::error::Result<()> {
/// use jose_util::{keys::load_public_key, ops::{Encrypter, Serialization}};
///
/// let alice = load_public_key(&std::fs::read("alice.pem").unwrap())?;
/// let bob = load_public_key(&std::fs::read("bob.jwk").unwrap())?;
/// let message = Encrypter::new("RSA-OAEP", &alice, "A256GCM", None)?
///     .with_recipient("ECDH-ES+A256KW", &bob)?
///     .encrypt(b"for both of you", Serialization::Full)?;
/// # Ok(()) }
/// ```
pub struct Encrypter {
	content_encryption: String,
	content_type: Option<String>,
	recipients: Vec<Recipient>,
}

impl Encrypter {
	/// Set up encryption to a first recipient.
	pub fn new(
		key_management: &str,
		key: &Key,
		content_encryption: &str,
		content_type: Option<String>,
	) -> Result<Self> {
		algorithms::check_content_encryption(content_encryption).map_err(|source| {
			Error::EncrypterInit {
				alg: content_encryption.into(),
				source,
			}
		})?;

		Self {
			content_encryption: content_encryption.into(),
			content_type,
			recipients: Vec::with_capacity(1),
		}
		.with_recipient(key_management, key)
	}

	/// Add another recipient.
	pub fn with_recipient(mut self, key_management: &str, key: &Key) -> Result<Self> {
		let encrypter =
			algorithms::encrypter(key_management, key).map_err(|source| Error::EncrypterInit {
				alg: key_management.into(),
				source,
			})?;

		self.recipients.push(Recipient {
			key_id: key.key_id().map(String::from),
			encrypter,
		});
		Ok(self)
	}

	fn protected_header(&self, key_id: Option<&str>) -> JweHeader {
		let mut header = JweHeader::new();
		header.set_content_encryption(&self.content_encryption);
		if let Some(cty) = &self.content_type {
			header.set_content_type(cty);
		}
		if let Some(kid) = key_id {
			header.set_key_id(kid);
		}
		header
	}

	fn shared_header(&self, key_id: Option<&str>) -> JweHeaderSet {
		let mut header = JweHeaderSet::new();
		header.set_content_encryption(&self.content_encryption, true);
		if let Some(cty) = &self.content_type {
			header.set_content_type(cty, true);
		}
		if let Some(kid) = key_id {
			header.set_key_id(kid, true);
		}
		header
	}

	/// Encrypt a plaintext and serialize the result.
	#[instrument(level = "debug", skip_all, fields(recipients = self.recipients.len(), serialization = ?serialization))]
	pub fn encrypt(&self, plaintext: &[u8], serialization: Serialization) -> Result<String> {
		let message = match (serialization, self.recipients.as_slice()) {
			(Serialization::Compact, [recipient]) => jwe::serialize_compact(
				plaintext,
				&self.protected_header(recipient.key_id.as_deref()),
				&*recipient.encrypter,
			),
			(Serialization::Compact, many) => {
				return Err(Error::Serialization(format!(
					"compact serialization holds exactly one recipient, this message has {}",
					many.len()
				)))
			}
			(Serialization::Full, [recipient]) => jwe::serialize_flattened_json(
				plaintext,
				Some(&self.shared_header(recipient.key_id.as_deref())),
				None,
				None,
				&*recipient.encrypter,
			),
			(Serialization::Full, many) => {
				let headers: Vec<Option<JweHeader>> = many
					.iter()
					.map(|recipient| {
						recipient.key_id.as_deref().map(|kid| {
							let mut header = JweHeader::new();
							header.set_key_id(kid);
							header
						})
					})
					.collect();

				let recipients: Vec<(Option<&JweHeader>, &dyn JweEncrypter)> = many
					.iter()
					.zip(&headers)
					.map(|(recipient, header)| {
						(header.as_ref(), &*recipient.encrypter as &dyn JweEncrypter)
					})
					.collect();

				jwe::serialize_general_json(
					plaintext,
					Some(&self.shared_header(None)),
					&recipients,
					None,
				)
			}
		}
		.map_err(Error::Encryption)?;

		trace!(len = message.len(), "encrypted");
		Ok(message)
	}
}

struct SigningKey {
	key_id: Option<String>,
	signer: Box<dyn JwsSigner>,
}

/// Signs with one or more keys.
pub struct Signer {
	signers: Vec<SigningKey>,
}

impl Signer {
	/// Set up signing with a first key.
	pub fn new(algorithm: &str, key: &Key) -> Result<Self> {
		Self {
			signers: Vec::with_capacity(1),
		}
		.with_signer(algorithm, key)
	}

	/// Add another signature.
	pub fn with_signer(mut self, algorithm: &str, key: &Key) -> Result<Self> {
		let signer = algorithms::signer(algorithm, key).map_err(|source| Error::SignerInit {
			alg: algorithm.into(),
			source,
		})?;

		self.signers.push(SigningKey {
			key_id: key.key_id().map(String::from),
			signer,
		});
		Ok(self)
	}

	fn header_set(key_id: Option<&str>) -> JwsHeaderSet {
		let mut header = JwsHeaderSet::new();
		if let Some(kid) = key_id {
			header.set_key_id(kid, true);
		}
		header
	}

	/// Sign a payload and serialize the result.
	#[instrument(level = "debug", skip_all, fields(signers = self.signers.len(), serialization = ?serialization))]
	pub fn sign(&self, payload: &[u8], serialization: Serialization) -> Result<String> {
		let message = match (serialization, self.signers.as_slice()) {
			(Serialization::Compact, [signing]) => {
				let mut header = JwsHeader::new();
				if let Some(kid) = &signing.key_id {
					header.set_key_id(kid);
				}
				jws::serialize_compact(payload, &header, &*signing.signer)
			}
			(Serialization::Compact, many) => {
				return Err(Error::Serialization(format!(
					"compact serialization holds exactly one signature, this message has {}",
					many.len()
				)))
			}
			(Serialization::Full, [signing]) => jws::serialize_flattened_json(
				payload,
				&Self::header_set(signing.key_id.as_deref()),
				&*signing.signer,
			),
			(Serialization::Full, many) => {
				let headers: Vec<JwsHeaderSet> = many
					.iter()
					.map(|signing| Self::header_set(signing.key_id.as_deref()))
					.collect();

				let signers: Vec<(&JwsHeaderSet, &dyn JwsSigner)> = many
					.iter()
					.zip(&headers)
					.map(|(signing, header)| (header, &*signing.signer as &dyn JwsSigner))
					.collect();

				jws::serialize_general_json(payload, &signers)
			}
		}
		.map_err(Error::Signature)?;

		trace!(len = message.len(), "signed");
		Ok(message)
	}
}

/// Encrypt a plaintext to a single public or symmetric key.
pub fn encrypt(plaintext: &[u8], key: &Key, options: &EncryptOptions) -> Result<String> {
	debug!(
		alg = %options.key_management,
		enc = %options.content_encryption,
		kid = ?key.key_id(),
		"encrypting"
	);
	Encrypter::new(
		&options.key_management,
		key,
		&options.content_encryption,
		options.content_type.clone(),
	)?
	.encrypt(plaintext, options.serialization)
}

/// Decrypt a JWE, in compact or JSON form, with a private or symmetric key.
///
/// Each recipient of a general JSON message is tried in turn, and the first one the key opens
/// wins. Every failure after the message has been parsed is reported as [`Error::Decryption`],
/// without detail.
#[instrument(level = "debug", skip_all)]
pub fn decrypt(message: &str, key: &Key) -> Result<Vec<u8>> {
	let envelope = Envelope::parse(message, Kind::Jwe)?;

	for (index, entry) in envelope.entries().iter().enumerate() {
		for alg in entry.algorithms()? {
			let Ok(decrypter) = algorithms::decrypter(&alg, key) else {
				trace!(index, %alg, "key does not fit this algorithm");
				continue;
			};

			let decrypted = if entry.is_compact() {
				jwe::deserialize_compact(entry.as_str(), &*decrypter)
			} else {
				jwe::deserialize_json(entry.as_str(), &*decrypter)
			};

			match decrypted {
				Ok((plaintext, _header)) => {
					trace!(index, %alg, len = plaintext.len(), "decrypted");
					return Ok(plaintext);
				}
				Err(err) => trace!(index, %alg, "recipient did not open: {err}"),
			}
		}
	}

	Err(Error::Decryption)
}

/// Sign a payload with a single private or symmetric key.
pub fn sign(payload: &[u8], key: &Key, options: &SignOptions) -> Result<String> {
	debug!(alg = %options.algorithm, kid = ?key.key_id(), "signing");
	Signer::new(&options.algorithm, key)?.sign(payload, options.serialization)
}

/// Verify a JWS, in compact or JSON form, with a public or symmetric key, and return its payload.
///
/// Each signature of a general JSON message is tried in turn, and the first one that verifies
/// wins. Every failure after the message has been parsed is reported as [`Error::Verification`],
/// without detail.
#[instrument(level = "debug", skip_all)]
pub fn verify(message: &str, key: &Key) -> Result<Vec<u8>> {
	let envelope = Envelope::parse(message, Kind::Jws)?;

	for (index, entry) in envelope.entries().iter().enumerate() {
		for alg in entry.algorithms()? {
			let Ok(verifier) = algorithms::verifier(&alg, key) else {
				trace!(index, %alg, "key does not fit this algorithm");
				continue;
			};

			let verified = if entry.is_compact() {
				jws::deserialize_compact(entry.as_str(), &*verifier)
			} else {
				jws::deserialize_json(entry.as_str(), &*verifier)
			};

			match verified {
				Ok((payload, _header)) => {
					trace!(index, %alg, len = payload.len(), "verified");
					return Ok(payload);
				}
				Err(err) => trace!(index, %alg, "signature did not verify: {err}"),
			}
		}
	}

	Err(Error::Verification)
}
