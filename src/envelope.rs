use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

type Header = Map<String, Value>;

/// Which kind of JOSE object an envelope holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Kind {
	/// JSON Web Encryption.
	Jwe,

	/// JSON Web Signature.
	Jws,
}

impl Kind {
	fn compact_segments(self) -> usize {
		match self {
			Self::Jwe => 5,
			Self::Jws => 3,
		}
	}
}

#[derive(Debug, Clone)]
enum Form {
	Compact(Vec<String>),
	Json(Map<String, Value>),
}

/// A parsed, not yet decrypted or verified, JOSE message.
///
/// Parsing checks structure only: segment count or JSON members, and that every protected header
/// decodes to a JSON object. Nothing cryptographic happens here.
#[derive(Debug, Clone)]
pub struct Envelope {
	kind: Kind,
	form: Form,
	raw: String,
}

impl Envelope {
	/// Parse a serialized message of a known kind, in compact or JSON form.
	pub fn parse(input: &str, kind: Kind) -> Result<Self> {
		let raw = input.trim();
		let form = if raw.starts_with('{') {
			Form::Json(parse_json(raw, kind)?)
		} else {
			Form::Compact(parse_compact(raw, kind)?)
		};

		let envelope = Self {
			kind,
			form,
			raw: raw.into(),
		};

		// surface malformed headers as parse errors, before any key is involved
		envelope.headers()?;
		Ok(envelope)
	}

	/// Parse a serialized message, guessing whether it is a JWE or a JWS.
	pub fn detect(input: &str) -> Result<Self> {
		let raw = input.trim();
		let kind = if raw.starts_with('{') {
			let doc: Value = serde_json::from_str(raw).map_err(Error::parse)?;
			if doc.get("ciphertext").is_some() {
				Kind::Jwe
			} else if doc.get("payload").is_some() {
				Kind::Jws
			} else {
				return Err(Error::parse("JSON message is neither a JWE nor a JWS"));
			}
		} else {
			match raw.split('.').count() {
				5 => Kind::Jwe,
				3 => Kind::Jws,
				n => {
					return Err(Error::parse(format!(
						"compact message has {n} segments, expected 3 (JWS) or 5 (JWE)"
					)))
				}
			}
		};

		Self::parse(raw, kind)
	}

	/// What kind of object this is.
	pub fn kind(&self) -> Kind {
		self.kind
	}

	/// Whether this is in compact form.
	pub fn is_compact(&self) -> bool {
		matches!(self.form, Form::Compact(_))
	}

	/// The serialized message, trimmed of surrounding whitespace.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// The effective header of each recipient (JWE) or signature (JWS).
	///
	/// Protected, shared unprotected, and per-recipient/signature headers are merged.
	pub fn headers(&self) -> Result<Vec<Header>> {
		match &self.form {
			Form::Compact(segments) => Ok(vec![decode_header(&segments[0])?]),
			Form::Json(doc) => {
				let shared = match self.kind {
					Kind::Jwe => {
						let mut shared = protected(doc)?;
						merge(&mut shared, doc.get("unprotected"));
						shared
					}
					Kind::Jws => Header::new(),
				};

				let entries = match self.kind {
					Kind::Jwe => doc.get("recipients"),
					Kind::Jws => doc.get("signatures"),
				};

				let entries: Vec<&Map<String, Value>> = match entries {
					Some(Value::Array(entries)) => entries
						.iter()
						.map(|entry| {
							entry
								.as_object()
								.ok_or_else(|| Error::parse("recipient or signature is not an object"))
						})
						.collect::<Result<_>>()?,
					Some(_) => return Err(Error::parse("recipients or signatures is not an array")),
					None => vec![doc],
				};

				entries
					.into_iter()
					.map(|entry| -> Result<Header> {
						let mut header = shared.clone();
						if self.kind == Kind::Jws {
							header.extend(protected(entry)?);
						}
						merge(&mut header, entry.get("header"));
						Ok(header)
					})
					.collect()
			}
		}
	}

	/// The distinct `alg` values declared, in order of appearance.
	pub fn algorithms(&self) -> Result<Vec<String>> {
		let mut algs: Vec<String> = Vec::new();
		for header in self.headers()? {
			if let Some(alg) = header.get("alg").and_then(Value::as_str) {
				if !algs.iter().any(|seen| seen == alg) {
					algs.push(alg.into());
				}
			}
		}
		Ok(algs)
	}

	/// One message per recipient (JWE) or signature (JWS).
	///
	/// Compact and flattened messages hold a single entry and come back unchanged. A general JSON
	/// message is split into flattened messages, each with the shared members and one entry, so
	/// that every entry can be tried on its own.
	pub fn entries(&self) -> Vec<Self> {
		let Form::Json(doc) = &self.form else {
			return vec![self.clone()];
		};

		let list = match self.kind {
			Kind::Jwe => "recipients",
			Kind::Jws => "signatures",
		};
		let Some(Value::Array(entries)) = doc.get(list) else {
			return vec![self.clone()];
		};

		entries
			.iter()
			.filter_map(Value::as_object)
			.map(|entry| {
				let mut flat: Map<String, Value> = doc
					.iter()
					.filter(|(name, _)| name.as_str() != list)
					.map(|(name, value)| (name.clone(), value.clone()))
					.collect();
				flat.extend(entry.iter().map(|(name, value)| (name.clone(), value.clone())));

				let raw = Value::Object(flat.clone()).to_string();
				Self {
					kind: self.kind,
					form: Form::Json(flat),
					raw,
				}
			})
			.collect()
	}

	/// The flattened JSON serialization of this message.
	///
	/// Messages already in JSON form are returned as they are.
	pub fn expand(&self) -> Value {
		match &self.form {
			Form::Json(doc) => Value::Object(doc.clone()),
			Form::Compact(segments) => {
				let mut doc = Map::new();
				let names: &[&str] = match self.kind {
					Kind::Jws => &["protected", "payload", "signature"],
					Kind::Jwe => &["protected", "encrypted_key", "iv", "ciphertext", "tag"],
				};

				for (name, segment) in names.iter().zip(segments) {
					// direct encryption has no encrypted key
					if *name == "encrypted_key" && segment.is_empty() {
						continue;
					}
					doc.insert((*name).into(), Value::String(segment.clone()));
				}

				Value::Object(doc)
			}
		}
	}
}

fn parse_compact(raw: &str, kind: Kind) -> Result<Vec<String>> {
	let segments: Vec<String> = raw.split('.').map(String::from).collect();
	if segments.len() != kind.compact_segments() {
		return Err(Error::parse(format!(
			"compact {kind:?} must have {} segments, found {}",
			kind.compact_segments(),
			segments.len()
		)));
	}

	if segments[0].is_empty() {
		return Err(Error::parse("missing protected header"));
	}

	Ok(segments)
}

fn parse_json(raw: &str, kind: Kind) -> Result<Map<String, Value>> {
	let doc: Map<String, Value> = serde_json::from_str(raw).map_err(Error::parse)?;

	let required: &[&str] = match kind {
		Kind::Jwe => &["ciphertext"],
		Kind::Jws => &["payload"],
	};
	for member in required {
		if !doc.get(*member).is_some_and(Value::is_string) {
			return Err(Error::parse(format!("missing or invalid `{member}` member")));
		}
	}

	if kind == Kind::Jws && doc.get("signature").is_none() && doc.get("signatures").is_none() {
		return Err(Error::parse("missing `signature` or `signatures` member"));
	}

	Ok(doc)
}

fn decode_header(segment: &str) -> Result<Header> {
	let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(Error::parse)?;
	serde_json::from_slice(&bytes).map_err(Error::parse)
}

fn protected(doc: &Map<String, Value>) -> Result<Header> {
	match doc.get("protected") {
		Some(Value::String(segment)) => decode_header(segment),
		Some(_) => Err(Error::parse("protected header is not a string")),
		None => Ok(Header::new()),
	}
}

fn merge(header: &mut Header, extra: Option<&Value>) {
	if let Some(Value::Object(extra)) = extra {
		header.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn b64(value: Value) -> String {
		URL_SAFE_NO_PAD.encode(value.to_string())
	}

	#[test]
	fn compact_jws() {
		let input = format!("{}.cGF5bG9hZA.c2ln\n", b64(json!({"alg": "ES256"})));
		let envelope = Envelope::parse(&input, Kind::Jws).unwrap();
		assert!(envelope.is_compact());
		assert_eq!(envelope.algorithms().unwrap(), vec!["ES256"]);
		assert!(!envelope.as_str().ends_with('\n'));
	}

	#[test]
	fn wrong_segment_count() {
		let input = format!("{}.cGF5bG9hZA.c2ln", b64(json!({"alg": "ES256"})));
		let err = Envelope::parse(&input, Kind::Jwe).unwrap_err();
		assert!(matches!(err, Error::Parse(_)));
	}

	#[test]
	fn garbage_header() {
		assert!(matches!(
			Envelope::parse("!!!.cGF5bG9hZA.c2ln", Kind::Jws),
			Err(Error::Parse(_))
		));
		assert!(matches!(
			Envelope::parse("{not json", Kind::Jws),
			Err(Error::Parse(_))
		));
	}

	#[test]
	fn general_jwe_algorithms() {
		let doc = json!({
			"protected": b64(json!({"enc": "A128GCM"})),
			"unprotected": {"jku": "https://example.com/keys"},
			"recipients": [
				{"header": {"alg": "RSA-OAEP", "kid": "a"}, "encrypted_key": "AAAA"},
				{"header": {"alg": "A128KW", "kid": "b"}, "encrypted_key": "BBBB"},
				{"header": {"alg": "RSA-OAEP", "kid": "c"}, "encrypted_key": "CCCC"},
			],
			"iv": "AAAA",
			"ciphertext": "AAAA",
			"tag": "AAAA",
		});
		let envelope = Envelope::parse(&doc.to_string(), Kind::Jwe).unwrap();
		assert_eq!(envelope.algorithms().unwrap(), vec!["RSA-OAEP", "A128KW"]);

		let headers = envelope.headers().unwrap();
		assert_eq!(headers.len(), 3);
		assert_eq!(headers[1]["enc"], "A128GCM");
		assert_eq!(headers[1]["kid"], "b");
		assert_eq!(headers[2]["jku"], "https://example.com/keys");
	}

	#[test]
	fn general_jwe_splits_per_recipient() {
		let protected = b64(json!({"enc": "A128GCM"}));
		let doc = json!({
			"protected": protected,
			"recipients": [
				{"header": {"alg": "RSA-OAEP", "kid": "a"}, "encrypted_key": "AAAA"},
				{"header": {"alg": "RSA-OAEP", "kid": "b"}, "encrypted_key": "BBBB"},
			],
			"iv": "aXY",
			"ciphertext": "Y2lwaGVy",
			"tag": "dGFn",
		});
		let envelope = Envelope::parse(&doc.to_string(), Kind::Jwe).unwrap();

		let entries = envelope.entries();
		assert_eq!(entries.len(), 2);
		let second: Value = serde_json::from_str(entries[1].as_str()).unwrap();
		assert_eq!(
			second,
			json!({
				"protected": protected,
				"header": {"alg": "RSA-OAEP", "kid": "b"},
				"encrypted_key": "BBBB",
				"iv": "aXY",
				"ciphertext": "Y2lwaGVy",
				"tag": "dGFn",
			})
		);
		assert_eq!(entries[1].headers().unwrap()[0]["enc"], "A128GCM");
	}

	#[test]
	fn general_jws_splits_per_signature() {
		let doc = json!({
			"payload": "cGF5bG9hZA",
			"signatures": [
				{"protected": b64(json!({"alg": "ES256"})), "header": {"kid": "a"}, "signature": "c2ln"},
				{"protected": b64(json!({"alg": "ES256"})), "header": {"kid": "b"}, "signature": "b3RoZXI"},
			],
		});
		let envelope = Envelope::parse(&doc.to_string(), Kind::Jws).unwrap();
		assert_eq!(envelope.algorithms().unwrap(), vec!["ES256"]);

		let entries = envelope.entries();
		assert_eq!(entries.len(), 2);
		for (entry, kid) in entries.iter().zip(["a", "b"]) {
			assert!(!entry.is_compact());
			assert_eq!(entry.headers().unwrap()[0]["kid"], kid);
			assert!(!entry.as_str().contains("signatures"));
		}
	}

	#[test]
	fn single_entry_messages_are_not_split() {
		let input = format!("{}.cGF5bG9hZA.c2ln", b64(json!({"alg": "ES256"})));
		let envelope = Envelope::parse(&input, Kind::Jws).unwrap();
		let entries = envelope.entries();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].as_str(), input);
	}

	#[test]
	fn flattened_jws_algorithms() {
		let doc = json!({
			"payload": "cGF5bG9hZA",
			"protected": b64(json!({"alg": "HS256"})),
			"header": {"kid": "k"},
			"signature": "c2ln",
		});
		let envelope = Envelope::parse(&doc.to_string(), Kind::Jws).unwrap();
		assert_eq!(envelope.algorithms().unwrap(), vec!["HS256"]);
		assert_eq!(envelope.headers().unwrap()[0]["kid"], "k");
	}

	#[test]
	fn json_jws_needs_signature() {
		let doc = json!({"payload": "cGF5bG9hZA"});
		assert!(matches!(
			Envelope::parse(&doc.to_string(), Kind::Jws),
			Err(Error::Parse(_))
		));
	}

	#[test]
	fn expand_compact_jwe() {
		let header = b64(json!({"alg": "dir", "enc": "A128GCM"}));
		let input = format!("{header}..aXY.Y2lwaGVy.dGFn");
		let envelope = Envelope::detect(&input).unwrap();
		assert_eq!(envelope.kind(), Kind::Jwe);
		assert_eq!(
			envelope.expand(),
			json!({
				"protected": header,
				"iv": "aXY",
				"ciphertext": "Y2lwaGVy",
				"tag": "dGFn",
			})
		);
	}

	#[test]
	fn expand_writes_protected_first() {
		let envelope = Envelope::detect("eyJhbGciOiJIUzI1NiJ9.cGF5bG9hZA.c2ln").unwrap();
		assert_eq!(
			envelope.expand().to_string(),
			r#"{"protected":"eyJhbGciOiJIUzI1NiJ9","payload":"cGF5bG9hZA","signature":"c2ln"}"#
		);
	}

	#[test]
	fn detect_rejects_unknown_shapes() {
		assert!(matches!(Envelope::detect("a.b"), Err(Error::Parse(_))));
		assert!(matches!(Envelope::detect("{\"x\":1}"), Err(Error::Parse(_))));
	}
}
