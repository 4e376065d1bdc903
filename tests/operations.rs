use josekit::jwk::{alg::ed::EdKeyPair, Jwk, KeyPair};
use jose_util::{
	envelope::{Envelope, Kind},
	error::Error,
	keygen::{generate, GenerateOptions, KeyUse},
	keys::{load_private_key, load_public_key, Key},
	ops::{self, EncryptOptions, Encrypter, Serialization, SignOptions, Signer},
};
use openssl::{
	ec::{EcGroup, EcKey},
	nid::Nid,
	pkey::{PKey, Private},
	rsa::Rsa,
};

struct Pair {
	private: Key,
	public: Key,
}

impl Pair {
	fn from_pkey(pkey: PKey<Private>) -> Self {
		Self {
			private: load_private_key(&pkey.private_key_to_pem_pkcs8().unwrap()).unwrap(),
			public: load_public_key(&pkey.public_key_to_pem().unwrap()).unwrap(),
		}
	}

	fn rsa() -> Self {
		Self::from_pkey(PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap())
	}

	fn ec(nid: Nid) -> Self {
		let group = EcGroup::from_curve_name(nid).unwrap();
		Self::from_pkey(PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap())
	}

	fn ed25519() -> Self {
		Self::from_pkey(PKey::generate_ed25519().unwrap())
	}

	fn jwk(key_use: KeyUse, alg: &str, kid: Option<&str>) -> Self {
		let key = generate(&GenerateOptions {
			key_use,
			algorithm: alg.into(),
			size: None,
			key_id: kid.map(String::from),
		})
		.unwrap();
		let private = load_private_key(key.private.to_string().as_bytes()).unwrap();
		let public = match key.public {
			Some(public) => load_public_key(public.to_string().as_bytes()).unwrap(),
			None => private.clone(),
		};
		Self { private, public }
	}
}

fn encrypt_options(alg: &str, enc: &str, serialization: Serialization) -> EncryptOptions {
	EncryptOptions {
		key_management: alg.into(),
		content_encryption: enc.into(),
		content_type: None,
		serialization,
	}
}

fn sign_options(alg: &str, serialization: Serialization) -> SignOptions {
	SignOptions {
		algorithm: alg.into(),
		serialization,
	}
}

/// Change one character in the middle of a compact segment.
fn tamper(message: &str, segment: usize) -> String {
	let mut segments: Vec<String> = message.split('.').map(String::from).collect();
	let target = &mut segments[segment];
	let mid = target.len() / 2;
	let replacement = if &target[mid..=mid] == "A" { "B" } else { "A" };
	target.replace_range(mid..=mid, replacement);
	segments.join(".")
}

/// Set or remove a JWK's `kid` and load it.
fn labelled(jwk: Jwk, kid: Option<&str>) -> Key {
	let mut map: serde_json::Map<String, serde_json::Value> = jwk.into();
	map.remove("kid");
	let mut jwk = Jwk::from_map(map).unwrap();
	if let Some(kid) = kid {
		jwk.set_key_id(kid);
	}
	Key::from_jwk(jwk).unwrap()
}

/// A generated key pair whose halves carry the given, possibly different, key IDs.
fn relabelled(
	key_use: KeyUse,
	alg: &str,
	private_kid: Option<&str>,
	public_kid: Option<&str>,
) -> Pair {
	let key = generate(&GenerateOptions {
		key_use,
		algorithm: alg.into(),
		size: None,
		key_id: None,
	})
	.unwrap();

	Pair {
		private: labelled(key.private, private_kid),
		public: labelled(key.public.unwrap(), public_kid),
	}
}

fn header(message: &str, kind: Kind) -> serde_json::Map<String, serde_json::Value> {
	Envelope::parse(message, kind).unwrap().headers().unwrap().remove(0)
}

#[test]
fn hello_world_rsa_oaep() {
	let pair = Pair::rsa();
	let message = ops::encrypt(
		b"hello world",
		&pair.public,
		&encrypt_options("RSA-OAEP", "A128GCM", Serialization::Compact),
	)
	.unwrap();

	assert_eq!(message.split('.').count(), 5);
	assert_eq!(ops::decrypt(&message, &pair.private).unwrap(), b"hello world");
}

#[test]
fn encryption_roundtrips() {
	let rsa = Pair::rsa();
	let p256 = Pair::ec(Nid::X9_62_PRIME256V1);
	let p384 = Pair::ec(Nid::SECP384R1);
	let kw = Pair::jwk(KeyUse::Enc, "A128KW", None);
	let gcmkw = Pair::jwk(KeyUse::Enc, "A256GCMKW", None);
	let dir = Pair::jwk(KeyUse::Enc, "dir", None);

	let cases = [
		(&rsa, "RSA-OAEP-256", "A256GCM"),
		(&rsa, "RSA-OAEP", "A128CBC-HS256"),
		(&p256, "ECDH-ES", "A128GCM"),
		(&p256, "ECDH-ES+A128KW", "A256CBC-HS512"),
		(&p384, "ECDH-ES+A256KW", "A192GCM"),
		(&kw, "A128KW", "A128GCM"),
		(&gcmkw, "A256GCMKW", "A256GCM"),
		(&dir, "dir", "A256GCM"),
	];

	for (pair, alg, enc) in cases {
		for serialization in [Serialization::Compact, Serialization::Full] {
			let message = ops::encrypt(
				b"some plaintext",
				&pair.public,
				&encrypt_options(alg, enc, serialization),
			)
			.unwrap_or_else(|err| panic!("{alg}/{enc}: {err:?}"));
			assert_eq!(
				ops::decrypt(&message, &pair.private).unwrap_or_else(|err| panic!("{alg}/{enc}: {err:?}")),
				b"some plaintext",
				"{alg}/{enc} {serialization:?}"
			);
		}
	}
}

#[test]
fn signature_roundtrips() {
	let rsa = Pair::rsa();
	let p256 = Pair::ec(Nid::X9_62_PRIME256V1);
	let p384 = Pair::ec(Nid::SECP384R1);
	let ed = Pair::ed25519();
	let ps = Pair::jwk(KeyUse::Sig, "PS256", None);
	let hs = Pair::jwk(KeyUse::Sig, "HS384", None);

	let cases = [
		(&rsa, "RS256"),
		(&rsa, "RS512"),
		(&ps, "PS256"),
		(&p256, "ES256"),
		(&p384, "ES384"),
		(&ed, "EdDSA"),
		(&hs, "HS384"),
	];

	for (pair, alg) in cases {
		for serialization in [Serialization::Compact, Serialization::Full] {
			let message = ops::sign(b"a payload", &pair.private, &sign_options(alg, serialization))
				.unwrap_or_else(|err| panic!("{alg}: {err:?}"));
			assert_eq!(
				ops::verify(&message, &pair.public).unwrap_or_else(|err| panic!("{alg}: {err:?}")),
				b"a payload",
				"{alg} {serialization:?}"
			);
		}
	}
}

#[test]
fn es256_test_message() {
	let pair = Pair::ec(Nid::X9_62_PRIME256V1);
	let message = ops::sign(
		b"test message",
		&pair.private,
		&sign_options("ES256", Serialization::Compact),
	)
	.unwrap();
	assert_eq!(message.split('.').count(), 3);
	assert_eq!(ops::verify(&message, &pair.public).unwrap(), b"test message");

	let stranger = Pair::ec(Nid::X9_62_PRIME256V1);
	assert!(matches!(
		ops::verify(&message, &stranger.public),
		Err(Error::Verification)
	));
}

#[test]
fn tampered_ciphertext_is_rejected() {
	let pair = Pair::ec(Nid::X9_62_PRIME256V1);
	let message = ops::encrypt(
		b"a message long enough to have a middle",
		&pair.public,
		&encrypt_options("ECDH-ES+A128KW", "A128GCM", Serialization::Compact),
	)
	.unwrap();

	// encrypted key, iv, ciphertext, tag
	for segment in [1, 2, 3, 4] {
		assert!(
			matches!(
				ops::decrypt(&tamper(&message, segment), &pair.private),
				Err(Error::Decryption)
			),
			"segment {segment}"
		);
	}

	// a changed header may no longer be JSON at all, which is a parse error
	assert!(matches!(
		ops::decrypt(&tamper(&message, 0), &pair.private),
		Err(Error::Parse(_) | Error::Decryption)
	));
}

#[test]
fn tampered_wrapped_key_is_rejected() {
	let pair = Pair::rsa();
	let message = ops::encrypt(
		b"hello world",
		&pair.public,
		&encrypt_options("RSA-OAEP", "A128GCM", Serialization::Compact),
	)
	.unwrap();
	assert!(matches!(
		ops::decrypt(&tamper(&message, 1), &pair.private),
		Err(Error::Decryption)
	));
}

#[test]
fn tampered_signature_is_rejected() {
	let pair = Pair::ed25519();
	let message = ops::sign(
		b"a payload long enough to have a middle",
		&pair.private,
		&sign_options("EdDSA", Serialization::Compact),
	)
	.unwrap();

	for segment in [1, 2] {
		assert!(matches!(
			ops::verify(&tamper(&message, segment), &pair.public),
			Err(Error::Verification)
		));
	}

	// a changed header may no longer be JSON at all, which is a parse error
	assert!(matches!(
		ops::verify(&tamper(&message, 0), &pair.public),
		Err(Error::Parse(_) | Error::Verification)
	));
}

#[test]
fn wrong_key_is_rejected() {
	let pair = Pair::rsa();
	let message = ops::encrypt(
		b"hello world",
		&pair.public,
		&encrypt_options("RSA-OAEP", "A128GCM", Serialization::Compact),
	)
	.unwrap();

	let other = Pair::rsa();
	assert!(matches!(
		ops::decrypt(&message, &other.private),
		Err(Error::Decryption)
	));

	// a key that can't even be used with the message's algorithm fails the same way
	let oct = Pair::jwk(KeyUse::Enc, "A128KW", None);
	assert!(matches!(
		ops::decrypt(&message, &oct.private),
		Err(Error::Decryption)
	));
}

#[test]
fn full_and_compact_decrypt_the_same() {
	let pair = Pair::jwk(KeyUse::Enc, "A192KW", None);
	let compact = ops::encrypt(
		b"same",
		&pair.public,
		&encrypt_options("A192KW", "A128GCM", Serialization::Compact),
	)
	.unwrap();
	let full = ops::encrypt(
		b"same",
		&pair.public,
		&encrypt_options("A192KW", "A128GCM", Serialization::Full),
	)
	.unwrap();

	assert!(full.starts_with('{'));
	let doc: serde_json::Value = serde_json::from_str(&full).unwrap();
	assert!(doc.get("recipients").is_none(), "one recipient is flattened");
	assert_eq!(
		ops::decrypt(&compact, &pair.private).unwrap(),
		ops::decrypt(&full, &pair.private).unwrap()
	);
}

#[test]
fn multiple_recipients_need_full_serialization() {
	let alice = Pair::jwk(KeyUse::Enc, "RSA-OAEP", Some("alice"));
	let bob = Pair::jwk(KeyUse::Enc, "ECDH-ES+A128KW", Some("bob"));

	let encrypter = Encrypter::new("RSA-OAEP", &alice.public, "A128GCM", None)
		.unwrap()
		.with_recipient("ECDH-ES+A128KW", &bob.public)
		.unwrap();

	assert!(matches!(
		encrypter.encrypt(b"to both", Serialization::Compact),
		Err(Error::Serialization(_))
	));

	let message = encrypter.encrypt(b"to both", Serialization::Full).unwrap();
	let envelope = Envelope::parse(&message, Kind::Jwe).unwrap();
	let kids: Vec<_> = envelope
		.headers()
		.unwrap()
		.into_iter()
		.map(|header| header["kid"].clone())
		.collect();
	assert_eq!(kids, ["alice", "bob"]);

	assert_eq!(ops::decrypt(&message, &alice.private).unwrap(), b"to both");
	assert_eq!(ops::decrypt(&message, &bob.private).unwrap(), b"to both");
}

#[test]
fn multiple_signers_need_full_serialization() {
	let rsa = Pair::rsa();
	let ec = Pair::ec(Nid::X9_62_PRIME256V1);

	let signer = Signer::new("RS256", &rsa.private)
		.unwrap()
		.with_signer("ES256", &ec.private)
		.unwrap();

	assert!(matches!(
		signer.sign(b"from both", Serialization::Compact),
		Err(Error::Serialization(_))
	));

	let message = signer.sign(b"from both", Serialization::Full).unwrap();
	assert_eq!(ops::verify(&message, &rsa.public).unwrap(), b"from both");
	assert_eq!(ops::verify(&message, &ec.public).unwrap(), b"from both");
}

#[test]
fn every_recipient_can_decrypt() {
	let alice = Pair::rsa();
	let bob = Pair::rsa();

	let message = Encrypter::new("RSA-OAEP", &alice.public, "A256GCM", None)
		.unwrap()
		.with_recipient("RSA-OAEP", &bob.public)
		.unwrap()
		.encrypt(b"same alg for both", Serialization::Full)
		.unwrap();
	assert_eq!(
		Envelope::parse(&message, Kind::Jwe).unwrap().algorithms().unwrap(),
		["RSA-OAEP"]
	);

	assert_eq!(ops::decrypt(&message, &alice.private).unwrap(), b"same alg for both");
	assert_eq!(ops::decrypt(&message, &bob.private).unwrap(), b"same alg for both");

	let eve = Pair::rsa();
	assert!(matches!(
		ops::decrypt(&message, &eve.private),
		Err(Error::Decryption)
	));
}

#[test]
fn every_signature_can_verify() {
	let first = Pair::ec(Nid::X9_62_PRIME256V1);
	let second = Pair::ec(Nid::X9_62_PRIME256V1);

	let message = Signer::new("ES256", &first.private)
		.unwrap()
		.with_signer("ES256", &second.private)
		.unwrap()
		.sign(b"same alg for both", Serialization::Full)
		.unwrap();
	assert!(message.contains("\"signatures\""));

	assert_eq!(ops::verify(&message, &first.public).unwrap(), b"same alg for both");
	assert_eq!(ops::verify(&message, &second.public).unwrap(), b"same alg for both");

	let stranger = Pair::ec(Nid::X9_62_PRIME256V1);
	assert!(matches!(
		ops::verify(&message, &stranger.public),
		Err(Error::Verification)
	));
}

#[test]
fn key_id_does_not_gate_verification() {
	// unlabelled message, labelled key
	let pair = relabelled(KeyUse::Sig, "ES256", None, Some("k1"));
	let message = ops::sign(b"x", &pair.private, &sign_options("ES256", Serialization::Compact))
		.unwrap();
	assert!(header(&message, Kind::Jws).get("kid").is_none());
	assert_eq!(ops::verify(&message, &pair.public).unwrap(), b"x");

	// message labelled differently from the key
	let pair = relabelled(KeyUse::Sig, "EdDSA", Some("old"), Some("new"));
	let message = ops::sign(b"y", &pair.private, &sign_options("EdDSA", Serialization::Full))
		.unwrap();
	assert_eq!(header(&message, Kind::Jws)["kid"], "old");
	assert_eq!(ops::verify(&message, &pair.public).unwrap(), b"y");

	// PEM-signed message, JWK-labelled public key
	let pkey = PKey::generate_ed25519().unwrap();
	let pem = pkey.private_key_to_pem_pkcs8().unwrap();
	let mut public = EdKeyPair::from_pem(&pem).unwrap().to_jwk_public_key();
	public.set_key_id("k1");
	let public = Key::from_jwk(public).unwrap();
	let private = load_private_key(&pem).unwrap();
	let message = ops::sign(b"z", &private, &sign_options("EdDSA", Serialization::Compact))
		.unwrap();
	assert_eq!(ops::verify(&message, &public).unwrap(), b"z");
}

#[test]
fn key_id_does_not_gate_decryption() {
	// unlabelled message, labelled key
	let pair = relabelled(KeyUse::Enc, "RSA-OAEP", Some("r1"), None);
	let message = ops::encrypt(
		b"x",
		&pair.public,
		&encrypt_options("RSA-OAEP", "A128GCM", Serialization::Compact),
	)
	.unwrap();
	assert!(header(&message, Kind::Jwe).get("kid").is_none());
	assert_eq!(pair.private.key_id(), Some("r1"));
	assert_eq!(ops::decrypt(&message, &pair.private).unwrap(), b"x");

	// message labelled differently from the key
	let pair = relabelled(KeyUse::Enc, "ECDH-ES+A128KW", Some("r2"), Some("elsewhere"));
	let message = ops::encrypt(
		b"y",
		&pair.public,
		&encrypt_options("ECDH-ES+A128KW", "A128GCM", Serialization::Full),
	)
	.unwrap();
	assert_eq!(header(&message, Kind::Jwe)["kid"], "elsewhere");
	assert_eq!(ops::decrypt(&message, &pair.private).unwrap(), b"y");
}

#[test]
fn key_id_is_propagated() {
	let pair = Pair::jwk(KeyUse::Sig, "ES256", Some("signing-key-1"));
	let message = ops::sign(b"x", &pair.private, &sign_options("ES256", Serialization::Compact))
		.unwrap();
	assert_eq!(header(&message, Kind::Jws)["kid"], "signing-key-1");

	let pair = Pair::jwk(KeyUse::Enc, "RSA-OAEP", Some("enc-key-1"));
	let message = ops::encrypt(
		b"x",
		&pair.public,
		&EncryptOptions {
			content_type: Some("application/json".into()),
			..encrypt_options("RSA-OAEP", "A128GCM", Serialization::Full)
		},
	)
	.unwrap();
	let header = header(&message, Kind::Jwe);
	assert_eq!(header["kid"], "enc-key-1");
	assert_eq!(header["cty"], "application/json");

	// PEM keys have no ID to propagate
	let pair = Pair::ed25519();
	let message = ops::sign(b"x", &pair.private, &sign_options("EdDSA", Serialization::Compact))
		.unwrap();
	assert!(self::header(&message, Kind::Jws).get("kid").is_none());
}

#[test]
fn expanded_messages_still_open() {
	let pair = Pair::jwk(KeyUse::Sig, "ES256", None);
	let message = ops::sign(b"expand me", &pair.private, &sign_options("ES256", Serialization::Compact))
		.unwrap();
	let expanded = Envelope::detect(&message).unwrap().expand().to_string();
	assert_eq!(ops::verify(&expanded, &pair.public).unwrap(), b"expand me");

	let pair = Pair::jwk(KeyUse::Enc, "ECDH-ES", None);
	let message = ops::encrypt(
		b"expand me too",
		&pair.public,
		&encrypt_options("ECDH-ES", "A128GCM", Serialization::Compact),
	)
	.unwrap();
	let expanded = Envelope::detect(&message).unwrap().expand().to_string();
	assert_eq!(ops::decrypt(&expanded, &pair.private).unwrap(), b"expand me too");
}

#[test]
fn malformed_messages_are_parse_errors() {
	let pair = Pair::jwk(KeyUse::Enc, "A128KW", None);
	for input in ["", "a.b.c", "{\"ciphertext\": 5}", "not base64!.a.b.c.d"] {
		assert!(
			matches!(ops::decrypt(input, &pair.private), Err(Error::Parse(_))),
			"{input:?}"
		);
	}
	for input in ["a.b", "{}", "{\"payload\":\"x\"}"] {
		assert!(
			matches!(ops::verify(input, &pair.private), Err(Error::Parse(_))),
			"{input:?}"
		);
	}
}
