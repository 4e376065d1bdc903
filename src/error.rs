use miette::Diagnostic;

/// Boxed underlying cause, from the JOSE library or from our own checks.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all JOSE operations.
///
/// Decryption and verification failures deliberately carry no cause: they must not reveal whether
/// the key, the algorithm, or the ciphertext was at fault.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
	/// The key source could not be read.
	#[error("unable to read key from {from}")]
	#[diagnostic(help("pass a readable path (or '-' for stdin) to --key, or a set variable to --key-env"))]
	KeyLoad {
		/// Description of the source (path, stdin, env var).
		from: String,
		/// What went wrong.
		source: Cause,
	},

	/// The key material was read but could not be interpreted.
	#[error("unable to parse key")]
	#[diagnostic(help("keys may be PEM, DER, a JWK, or a JWK set with a single key"))]
	KeyParse(#[source] Cause),

	/// The encrypter could not be built for this algorithm and key.
	#[error("unable to instantiate encrypter for {alg}")]
	#[diagnostic(help("check that the key type matches the key management algorithm"))]
	EncrypterInit {
		/// Key management algorithm requested.
		alg: String,
		/// What went wrong.
		source: Cause,
	},

	/// The signer could not be built for this algorithm and key.
	#[error("unable to make signer for {alg}")]
	#[diagnostic(help("check that the key type matches the signature algorithm"))]
	SignerInit {
		/// Signature algorithm requested.
		alg: String,
		/// What went wrong.
		source: Cause,
	},

	/// Encryption failed inside the JOSE library.
	#[error("unable to encrypt")]
	Encryption(#[source] josekit::JoseError),

	/// Decryption failed, for whatever reason.
	#[error("unable to decrypt message")]
	Decryption,

	/// Signing failed inside the JOSE library.
	#[error("unable to sign")]
	Signature(#[source] josekit::JoseError),

	/// Signature verification failed, for whatever reason.
	#[error("invalid signature")]
	Verification,

	/// The input is not a well-formed JOSE envelope.
	#[error("unable to parse message")]
	Parse(#[source] Cause),

	/// The requested serialization cannot represent the object.
	#[error("unable to serialize message: {0}")]
	#[diagnostic(help("use --full for the JSON serialization"))]
	Serialization(String),

	/// Generating a key failed.
	#[error("unable to generate key")]
	KeyGen(#[source] Cause),

	/// The input could not be read.
	#[error("unable to read input from {from}")]
	ReadInput {
		/// Description of the source.
		from: String,
		/// What went wrong.
		source: std::io::Error,
	},

	/// The output could not be written.
	#[error("unable to write output to {to}")]
	WriteOutput {
		/// Description of the destination.
		to: String,
		/// What went wrong.
		source: std::io::Error,
	},
}

impl Error {
	pub(crate) fn key_parse(reason: impl Into<Cause>) -> Self {
		Self::KeyParse(reason.into())
	}

	pub(crate) fn parse(reason: impl Into<Cause>) -> Self {
		Self::Parse(reason.into())
	}
}

/// Convenience type for Results in this crate.
pub type Result<T> = std::result::Result<T, Error>;
