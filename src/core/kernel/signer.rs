use crate::core::types::{ParamValue, ParameterSet};
use md5::{Digest, Md5};

/// Signer trait for request authentication
///
/// Produces the `sig` parameter for a fully populated parameter set. The
/// output must depend only on the parameter contents and the secret, never on
/// iteration order.
pub trait Signer: Send + Sync {
    /// Sign `params` with `secret`, returning the lowercase hex signature
    fn sign(&self, params: &ParameterSet, secret: &str) -> String;
}

/// MD5 signer implementing the legacy REST server signature scheme.
///
/// MD5 is mandated by the remote wire contract and must not be swapped for a
/// stronger digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Signer;

impl Signer for Md5Signer {
    fn sign(&self, params: &ParameterSet, secret: &str) -> String {
        sign_pairs(params.iter().map(|(k, v)| (k.as_str(), v)), secret)
    }
}

/// Canonical signature base: `key=value` pairs, unescaped, sorted by the whole
/// pair and concatenated with no separator.
pub fn sig_encode<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a ParamValue)>,
{
    let mut encoded: Vec<String> = pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    encoded.sort_unstable();
    encoded.concat()
}

/// Sign arbitrary `(key, value)` pairs; order of the input does not matter.
pub fn sign_pairs<'a, I>(pairs: I, secret: &str) -> String
where
    I: IntoIterator<Item = (&'a str, &'a ParamValue)>,
{
    let mut hasher = Md5::new();
    hasher.update(sig_encode(pairs).as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::params;

    fn sample() -> Vec<(&'static str, ParamValue)> {
        vec![
            ("method", "fql.query".into()),
            ("api_key", "abc".into()),
            ("call_id", "1".into()),
            ("format", "json".into()),
            ("v", "1.0".into()),
        ]
    }

    #[test]
    fn test_known_signature() {
        let p = params(sample());
        assert_eq!(
            Md5Signer.sign(&p, "secret"),
            "32fb218309b6c4d5d82e8c213769babc"
        );
    }

    #[test]
    fn test_empty_params_sign_secret_only() {
        assert_eq!(
            Md5Signer.sign(&ParameterSet::new(), "secret"),
            "5ebe2294ecd0e0f08eab7690d2a6ee69"
        );
    }

    #[test]
    fn test_signature_is_order_independent() {
        let pairs = sample();
        let forward = sign_pairs(pairs.iter().map(|(k, v)| (*k, v)), "secret");
        let backward = sign_pairs(pairs.iter().rev().map(|(k, v)| (*k, v)), "secret");
        let rotated = sign_pairs(
            pairs.iter().cycle().skip(2).take(pairs.len()).map(|(k, v)| (*k, v)),
            "secret",
        );

        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
        assert_eq!(forward, Md5Signer.sign(&params(sample()), "secret"));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let p = params(sample());
        assert_eq!(Md5Signer.sign(&p, "s"), Md5Signer.sign(&p, "s"));
        assert_ne!(Md5Signer.sign(&p, "s"), Md5Signer.sign(&p, "t"));
    }

    #[test]
    fn test_sorts_by_whole_pair_not_key() {
        // '.' sorts before '=', so "a.b=2" precedes "a=1"
        let pairs: Vec<(&str, ParamValue)> = vec![("a", "1".into()), ("a.b", "2".into())];
        assert_eq!(sig_encode(pairs.iter().map(|(k, v)| (*k, v))), "a.b=2a=1");
        assert_eq!(
            sign_pairs(pairs.iter().map(|(k, v)| (*k, v)), "s"),
            "eeeb14b85ade0c2e6c00508419ee1ea9"
        );
    }

    #[test]
    fn test_values_are_not_escaped() {
        let pairs: Vec<(&str, ParamValue)> =
            vec![("query", "SELECT name FROM user WHERE uid = 1160".into())];
        assert_eq!(
            sig_encode(pairs.iter().map(|(k, v)| (*k, v))),
            "query=SELECT name FROM user WHERE uid = 1160"
        );
    }
}
