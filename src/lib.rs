//! JOSE (JWE, JWS, JWK) command set: support routines and implementation library.
//!
//! # The CLI
//!
//! `jose-util` encrypts, decrypts, signs, and verifies messages in the compact or full (JSON)
//! serializations of JSON Web Encryption and JSON Web Signature:
//!
//! ```console
//! $ jose-util encrypt --key bob.pub.pem --alg RSA-OAEP --enc A128GCM --in secret.txt > secret.jwe
//! $ jose-util decrypt --key bob.pem --in secret.jwe
//! $ echo 'hello' | jose-util sign --key alice.jwk --alg ES256 > hello.jws
//! $ jose-util verify --key alice.pub.jwk --in hello.jws
//! ```
//!
//! Two helpers round it out: `expand` turns a compact message into its JSON form, and
//! `generate-key` creates JWKs for any of the supported algorithms.
//!
//! Keys may be PEM or DER (public keys, certificates, PKCS#8/PKCS#1/SEC1 private keys) or JWKs.
//! Symmetric keys are JWKs with `"kty": "oct"`.
//!
//! # The library
//!
//! The operations are usable without the CLI:
//!
//! ```no_run
//! use jose_util::{
//!     keys::{load_private_key, load_public_key},
//!     ops::{self, Serialization, SignOptions},
//! };
//!
//! # fn main() -> jose_util::error::Result<()> {
//! let private = load_private_key(&std::fs::read("alice.jwk").unwrap())?;
//! let public = load_public_key(&std::fs::read("alice.pub.jwk").unwrap())?;
//! let jws = ops::sign(b"hello", &private, &SignOptions {
//!     algorithm: "ES256".into(),
//!     serialization: Serialization::Compact,
//! })?;
//! assert_eq!(ops::verify(&jws, &public)?, b"hello");
//! # Ok(()) }
//! ```
//!
//! As with the CLI, failures to decrypt or verify say nothing about what went wrong.

#![deny(rust_2018_idioms)]
#![deny(unsafe_code)]
#![deny(missing_docs)]

pub use crate::args::get_args as args;
pub use crate::cli::run;

/// Algorithm identifiers and how they map to keys.
pub mod algorithms;

/// Top-level argument parsing and logging setup.
pub mod args;

/// Clap argument parsers and implementations for the jose-util commands.
pub mod cli;

/// Parsing of serialized JWE and JWS messages, before any cryptography.
pub mod envelope;

/// Error type.
pub mod error;

/// Reading inputs and writing outputs.
pub mod inout;

/// Generating new JWKs.
pub mod keygen;

/// Support for obtaining public, private, and symmetric keys.
pub mod keys;

/// Encrypt, decrypt, sign, and verify.
pub mod ops;
