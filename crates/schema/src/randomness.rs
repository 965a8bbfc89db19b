//! # Randomness Oracle Rules
//!
//! A vector carries an ordered list of rules that make VM randomness
//! replayable. The persisted form is:
//!
//! ```text
//! "randomness": [
//!   { "on": ["beacon", 12, 49327, "yxpTbzLhr4uaj7bK0Hl4Vw=="], "ret": "iKyZ2N83N8IoiK2tNJ/H9g==" },
//!   { "on": ["chain", 8, 61002, "aacQWICNcMJWtuwTnU+1Hg=="], "ret": "M6HqmihwZ5fXcbQQHhbtsg==" }
//! ]
//! ```
//!
//! The `on` array is positional: kind, domain separation tag, epoch, entropy.
//! Rules are matched top to bottom on all four fields and the first match
//! wins. An unmatched request resolves to [`RANDOMNESS_FALLBACK`], never to
//! an error, so drivers can detect it.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};

use crate::encoding::Base64Bytes;

/// Returned for every request that matches no rule: the utf-8 bytes of
/// `i_am_random_____i_am_random_____`.
pub const RANDOMNESS_FALLBACK: &[u8; 32] = b"i_am_random_____i_am_random_____";

/// Source the randomness is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RandomnessKind {
    /// Drand beacon randomness.
    Beacon,
    /// Chain ticket randomness.
    Chain,
}

/// The request pattern of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RandomnessRule {
    pub kind: RandomnessKind,
    pub domain_separation_tag: i64,
    pub epoch: i64,
    pub entropy: Base64Bytes,
}

impl RandomnessRule {
    pub fn new(
        kind: RandomnessKind,
        domain_separation_tag: i64,
        epoch: i64,
        entropy: impl Into<Base64Bytes>,
    ) -> Self {
        Self {
            kind,
            domain_separation_tag,
            epoch,
            entropy: entropy.into(),
        }
    }

    /// Exact match on all four fields.
    pub fn matches(&self, kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> bool {
        self.kind == kind
            && self.domain_separation_tag == tag
            && self.epoch == epoch
            && self.entropy.as_slice() == entropy
    }
}

impl Serialize for RandomnessRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            self.kind,
            self.domain_separation_tag,
            self.epoch,
            &self.entropy,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RandomnessRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, domain_separation_tag, epoch, entropy) =
            <(RandomnessKind, i64, i64, Base64Bytes)>::deserialize(deserializer)?;
        Ok(Self {
            kind,
            domain_separation_tag,
            epoch,
            entropy,
        })
    }
}

/// One rule paired with the bytes it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessMatch {
    pub on: RandomnessRule,
    #[serde(rename = "ret")]
    pub ret: Base64Bytes,
}

/// Ordered list of randomness rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Randomness(Vec<RandomnessMatch>);

impl Randomness {
    pub fn new(rules: Vec<RandomnessMatch>) -> Self {
        Self(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RandomnessMatch> {
        self.0.iter()
    }

    /// Whether a rule with exactly this request pattern is declared.
    pub fn contains(&self, rule: &RandomnessRule) -> bool {
        self.0.iter().any(|m| &m.on == rule)
    }

    /// Appends a rule at the end of the match order.
    pub fn push(&mut self, on: RandomnessRule, ret: impl Into<Base64Bytes>) {
        self.0.push(RandomnessMatch {
            on,
            ret: ret.into(),
        });
    }

    /// Return bytes of the first matching rule, in declaration order.
    pub fn lookup(
        &self,
        kind: RandomnessKind,
        tag: i64,
        epoch: i64,
        entropy: &[u8],
    ) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|m| m.on.matches(kind, tag, epoch, entropy))
            .map(|m| m.ret.as_slice())
    }

    /// Like [`lookup`](Self::lookup), falling back to [`RANDOMNESS_FALLBACK`].
    pub fn resolve(&self, kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> Vec<u8> {
        self.lookup(kind, tag, epoch, entropy)
            .unwrap_or(RANDOMNESS_FALLBACK)
            .to_vec()
    }
}

impl<'a> IntoIterator for &'a Randomness {
    type Item = &'a RandomnessMatch;
    type IntoIter = std::slice::Iter<'a, RandomnessMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> RandomnessRule {
        RandomnessRule::new(kind, tag, epoch, entropy)
    }

    #[test]
    fn fallback_is_32_bytes() {
        assert_eq!(RANDOMNESS_FALLBACK.len(), 32);
    }

    #[test]
    fn on_serializes_as_positional_array() {
        let mut r = Randomness::default();
        r.push(
            rule(RandomnessKind::Beacon, 12, 49327, b"entropy"),
            b"ret-bytes".to_vec(),
        );
        let json = serde_json::to_value(&r).expect("encode");
        assert_eq!(
            json,
            serde_json::json!([
                { "on": ["beacon", 12, 49327, "ZW50cm9weQ=="], "ret": "cmV0LWJ5dGVz" }
            ])
        );
        let back: Randomness = serde_json::from_value(json).expect("decode");
        assert_eq!(back, r);
    }

    #[test]
    fn on_array_with_wrong_arity_is_rejected() {
        let json = r#"[{"on":["chain", 1, 2], "ret": ""}]"#;
        assert!(serde_json::from_str::<Randomness>(json).is_err());
        let json = r#"[{"on":["lottery", 1, 2, ""], "ret": ""}]"#;
        assert!(serde_json::from_str::<Randomness>(json).is_err());
    }

    #[test]
    fn first_match_wins_and_all_fields_must_match() {
        let mut r = Randomness::default();
        r.push(rule(RandomnessKind::Chain, 8, 10, b"e"), vec![1]);
        r.push(rule(RandomnessKind::Chain, 8, 10, b"e"), vec![2]);
        r.push(rule(RandomnessKind::Beacon, 8, 10, b"e"), vec![3]);

        assert_eq!(r.lookup(RandomnessKind::Chain, 8, 10, b"e"), Some(&[1u8][..]));
        assert_eq!(r.lookup(RandomnessKind::Beacon, 8, 10, b"e"), Some(&[3u8][..]));
        assert_eq!(r.lookup(RandomnessKind::Chain, 9, 10, b"e"), None);
        assert_eq!(r.lookup(RandomnessKind::Chain, 8, 11, b"e"), None);
        assert_eq!(r.lookup(RandomnessKind::Chain, 8, 10, b"f"), None);
    }

    #[test]
    fn unmatched_request_resolves_to_fallback() {
        let r = Randomness::default();
        assert_eq!(
            r.resolve(RandomnessKind::Beacon, 0, 0, b""),
            RANDOMNESS_FALLBACK.to_vec()
        );
    }
}
