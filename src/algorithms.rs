//! Mapping from JOSE algorithm identifiers and loaded keys to the JOSE library's primitives.
//!
//! Algorithm names are not validated anywhere else: an unknown name, or a key that does not suit
//! the algorithm, surfaces here when the primitive is built.

use josekit::{
	jwe::{self, JweDecrypter, JweEncrypter},
	jws::{self, JwsSigner, JwsVerifier},
};

use crate::{
	error::Cause,
	keys::{Key, Material},
};

/// Key management algorithms (JWE `alg`).
pub const KEY_MANAGEMENT_ALGORITHMS: &[&str] = &[
	"RSA1_5",
	"RSA-OAEP",
	"RSA-OAEP-256",
	"RSA-OAEP-384",
	"RSA-OAEP-512",
	"ECDH-ES",
	"ECDH-ES+A128KW",
	"ECDH-ES+A192KW",
	"ECDH-ES+A256KW",
	"A128KW",
	"A192KW",
	"A256KW",
	"A128GCMKW",
	"A192GCMKW",
	"A256GCMKW",
	"PBES2-HS256+A128KW",
	"PBES2-HS384+A192KW",
	"PBES2-HS512+A256KW",
	"dir",
];

/// Content encryption algorithms (JWE `enc`).
pub const CONTENT_ENCRYPTION_ALGORITHMS: &[&str] = &[
	"A128CBC-HS256",
	"A192CBC-HS384",
	"A256CBC-HS512",
	"A128GCM",
	"A192GCM",
	"A256GCM",
];

/// Signature algorithms (JWS `alg`).
pub const SIGNATURE_ALGORITHMS: &[&str] = &[
	"HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256",
	"ES384", "ES512", "ES256K", "EdDSA",
];

// Algorithms keyed by a public/private key pair, given as DER or as a JWK.
macro_rules! asymmetric {
	($alg:expr, $key:expr, $trait:ident, $from_der:ident, $from_jwk:ident) => {
		match $key.material() {
			Material::Der(der) => Box::new($alg.$from_der(der)?) as Box<dyn $trait>,
			Material::Jwk(jwk) => Box::new($alg.$from_jwk(jwk)?) as Box<dyn $trait>,
		}
	};
}

// Algorithms keyed by a shared secret, which can only come in as an `oct` JWK.
macro_rules! symmetric {
	($alg:expr, $key:expr, $trait:ident, $from_jwk:ident) => {
		match $key.material() {
			Material::Jwk(jwk) => Box::new($alg.$from_jwk(jwk)?) as Box<dyn $trait>,
			Material::Der(_) => return Err("this algorithm needs a symmetric (oct JWK) key".into()),
		}
	};
}

macro_rules! jwe_algorithm {
	($name:expr, $key:expr, $trait:ident, $from_der:ident, $from_jwk:ident) => {
		match $name {
			"RSA1_5" => asymmetric!(jwe::RSA1_5, $key, $trait, $from_der, $from_jwk),
			"RSA-OAEP" => asymmetric!(jwe::RSA_OAEP, $key, $trait, $from_der, $from_jwk),
			"RSA-OAEP-256" => asymmetric!(jwe::RSA_OAEP_256, $key, $trait, $from_der, $from_jwk),
			"RSA-OAEP-384" => asymmetric!(jwe::RSA_OAEP_384, $key, $trait, $from_der, $from_jwk),
			"RSA-OAEP-512" => asymmetric!(jwe::RSA_OAEP_512, $key, $trait, $from_der, $from_jwk),
			"ECDH-ES" => asymmetric!(jwe::ECDH_ES, $key, $trait, $from_der, $from_jwk),
			"ECDH-ES+A128KW" => asymmetric!(jwe::ECDH_ES_A128KW, $key, $trait, $from_der, $from_jwk),
			"ECDH-ES+A192KW" => asymmetric!(jwe::ECDH_ES_A192KW, $key, $trait, $from_der, $from_jwk),
			"ECDH-ES+A256KW" => asymmetric!(jwe::ECDH_ES_A256KW, $key, $trait, $from_der, $from_jwk),
			"A128KW" => symmetric!(jwe::A128KW, $key, $trait, $from_jwk),
			"A192KW" => symmetric!(jwe::A192KW, $key, $trait, $from_jwk),
			"A256KW" => symmetric!(jwe::A256KW, $key, $trait, $from_jwk),
			"A128GCMKW" => symmetric!(jwe::A128GCMKW, $key, $trait, $from_jwk),
			"A192GCMKW" => symmetric!(jwe::A192GCMKW, $key, $trait, $from_jwk),
			"A256GCMKW" => symmetric!(jwe::A256GCMKW, $key, $trait, $from_jwk),
			"PBES2-HS256+A128KW" => symmetric!(jwe::PBES2_HS256_A128KW, $key, $trait, $from_jwk),
			"PBES2-HS384+A192KW" => symmetric!(jwe::PBES2_HS384_A192KW, $key, $trait, $from_jwk),
			"PBES2-HS512+A256KW" => symmetric!(jwe::PBES2_HS512_A256KW, $key, $trait, $from_jwk),
			"dir" => symmetric!(jwe::Dir, $key, $trait, $from_jwk),
			other => {
				return Err(format!("unsupported key management algorithm {other:?}").into())
			}
		}
	};
}

macro_rules! jws_algorithm {
	($name:expr, $key:expr, $trait:ident, $from_der:ident, $from_jwk:ident) => {
		match $name {
			"HS256" => symmetric!(jws::HS256, $key, $trait, $from_jwk),
			"HS384" => symmetric!(jws::HS384, $key, $trait, $from_jwk),
			"HS512" => symmetric!(jws::HS512, $key, $trait, $from_jwk),
			"RS256" => asymmetric!(jws::RS256, $key, $trait, $from_der, $from_jwk),
			"RS384" => asymmetric!(jws::RS384, $key, $trait, $from_der, $from_jwk),
			"RS512" => asymmetric!(jws::RS512, $key, $trait, $from_der, $from_jwk),
			"PS256" => asymmetric!(jws::PS256, $key, $trait, $from_der, $from_jwk),
			"PS384" => asymmetric!(jws::PS384, $key, $trait, $from_der, $from_jwk),
			"PS512" => asymmetric!(jws::PS512, $key, $trait, $from_der, $from_jwk),
			"ES256" => asymmetric!(jws::ES256, $key, $trait, $from_der, $from_jwk),
			"ES384" => asymmetric!(jws::ES384, $key, $trait, $from_der, $from_jwk),
			"ES512" => asymmetric!(jws::ES512, $key, $trait, $from_der, $from_jwk),
			"ES256K" => asymmetric!(jws::ES256K, $key, $trait, $from_der, $from_jwk),
			"EdDSA" => asymmetric!(jws::EdDSA, $key, $trait, $from_der, $from_jwk),
			other => return Err(format!("unsupported signature algorithm {other:?}").into()),
		}
	};
}

/// Build an encrypter for a key management algorithm and a public or symmetric key.
pub(crate) fn encrypter(alg: &str, key: &Key) -> Result<Box<dyn JweEncrypter>, Cause> {
	Ok(jwe_algorithm!(
		alg,
		key,
		JweEncrypter,
		encrypter_from_der,
		encrypter_from_jwk
	))
}

/// Build a decrypter for a key management algorithm and a private or symmetric key.
///
/// The key's `kid` is a label for choosing keys, not a condition on the message, so it is dropped.
pub(crate) fn decrypter(alg: &str, key: &Key) -> Result<Box<dyn JweDecrypter>, Cause> {
	let key = key.unlabelled()?;
	Ok(jwe_algorithm!(
		alg,
		key,
		JweDecrypter,
		decrypter_from_der,
		decrypter_from_jwk
	))
}

/// Build a signer for a signature algorithm and a private or symmetric key.
pub(crate) fn signer(alg: &str, key: &Key) -> Result<Box<dyn JwsSigner>, Cause> {
	Ok(jws_algorithm!(
		alg,
		key,
		JwsSigner,
		signer_from_der,
		signer_from_jwk
	))
}

/// Build a verifier for a signature algorithm and a public or symmetric key.
///
/// As with [`decrypter`], the key's `kid` is dropped.
pub(crate) fn verifier(alg: &str, key: &Key) -> Result<Box<dyn JwsVerifier>, Cause> {
	let key = key.unlabelled()?;
	Ok(jws_algorithm!(
		alg,
		key,
		JwsVerifier,
		verifier_from_der,
		verifier_from_jwk
	))
}

/// Check a content encryption algorithm name.
pub(crate) fn check_content_encryption(enc: &str) -> Result<(), Cause> {
	if CONTENT_ENCRYPTION_ALGORITHMS.contains(&enc) {
		Ok(())
	} else {
		Err(format!("unsupported content encryption algorithm {enc:?}").into())
	}
}
